use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Key used for messages that are not tied to a single field.
pub const DETAIL_KEY: &str = "detail";

/// Key the backend uses for object-level validation failures.
pub const NON_FIELD_KEY: &str = "non_field_errors";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Coarse classification of an [`ApiError`], for callers that only need to
/// decide between showing field errors, sending the user to login, or
/// reporting a generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Auth,
    Transport,
    Status,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull a human-readable message out of an error body.
    /// Prefers `{detail}` then `{error}`, falling back to the raw body.
    fn detail_of(body: &str) -> String {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
            for key in [DETAIL_KEY, "error"] {
                if let Some(Value::String(msg)) = map.get(key) {
                    return msg.clone();
                }
            }
        }
        Self::truncate_body(body)
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 => ApiError::Validation(FieldErrors::from_body(body)),
            401 => ApiError::Unauthorized(Self::detail_of(body)),
            403 => ApiError::AccessDenied(Self::detail_of(body)),
            404 => ApiError::NotFound(Self::detail_of(body)),
            409 => ApiError::Conflict(Self::detail_of(body)),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(Self::detail_of(body)),
            _ => ApiError::InvalidResponse(format!(
                "Status {}: {}",
                status,
                Self::truncate_body(body)
            )),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Unauthorized(_) => ErrorKind::Auth,
            ApiError::Network(_) => ErrorKind::Transport,
            _ => ErrorKind::Status,
        }
    }

    /// The message carried by this error, without the variant prefix
    pub fn detail(&self) -> String {
        match self {
            ApiError::Validation(fields) => fields
                .general_message()
                .map(str::to_string)
                .unwrap_or_else(|| fields.to_string()),
            ApiError::Unauthorized(msg)
            | ApiError::AccessDenied(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::ServerError(msg)
            | ApiError::Network(msg)
            | ApiError::InvalidResponse(msg)
            | ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::RateLimited => self.to_string(),
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Field errors for per-field display, if this is a validation failure
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ApiError::Validation(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Per-field validation messages, normalised from the shapes the backend
/// produces: `{detail}`, `{non_field_errors: [...]}`, `{field: [...]}`,
/// `{field: "..."}`, a bare list, or a plain-text body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(_) if body.trim().is_empty() => Self::default(),
            Err(_) => Self::single(DETAIL_KEY, &ApiError::truncate_body(body)),
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let mut fields = BTreeMap::new();
        match value {
            Value::Object(map) => {
                for (key, v) in map {
                    fields.insert(key.clone(), flatten_messages(v));
                }
            }
            Value::Array(_) => {
                fields.insert(NON_FIELD_KEY.to_string(), flatten_messages(value));
            }
            Value::Null => {}
            other => {
                fields.insert(DETAIL_KEY.to_string(), flatten_messages(other));
            }
        }
        Self(fields)
    }

    pub fn single(field: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.to_string());
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Message to show when no specific field is involved
    pub fn general_message(&self) -> Option<&str> {
        self.get(DETAIL_KEY).or_else(|| self.get(NON_FIELD_KEY))
    }
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no details provided");
        }
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_field_errors_from_field_arrays() {
        let body = r#"{"username": ["This username is already in use."], "password": ["Too short.", "Too common."]}"#;
        let fields = FieldErrors::from_body(body);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("username"), Some("This username is already in use."));
        assert_eq!(fields.get("password"), Some("Too short. Too common."));
    }

    #[test]
    fn test_field_errors_detail_and_non_field() {
        let detail = FieldErrors::from_body(r#"{"detail": "No active account found"}"#);
        assert_eq!(detail.general_message(), Some("No active account found"));

        let non_field =
            FieldErrors::from_body(r#"{"non_field_errors": ["End time must be after start time."]}"#);
        assert_eq!(
            non_field.general_message(),
            Some("End time must be after start time.")
        );

        let bare_list = FieldErrors::from_body(r#"["Slot overlaps."]"#);
        assert_eq!(bare_list.get(NON_FIELD_KEY), Some("Slot overlaps."));
    }

    #[test]
    fn test_field_errors_plain_text_body() {
        let fields = FieldErrors::from_body("Bad Request");
        assert_eq!(fields.get(DETAIL_KEY), Some("Bad Request"));
        assert!(FieldErrors::from_body("   ").is_empty());
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"email": "taken"}"#),
            ApiError::Validation(_)
        ));
        assert_eq!(
            ApiError::from_status(
                StatusCode::UNAUTHORIZED,
                r#"{"detail": "Given token not valid for any token type"}"#
            ),
            ApiError::Unauthorized("Given token not valid for any token type".to_string())
        );
        assert_eq!(
            ApiError::from_status(StatusCode::CONFLICT, r#"{"detail": "Slot already booked."}"#),
            ApiError::Conflict("Slot already booked.".to_string())
        );
        assert_eq!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        );
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_kind_taxonomy() {
        assert_eq!(
            ApiError::Validation(FieldErrors::default()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(ApiError::Unauthorized(String::new()).kind(), ErrorKind::Auth);
        assert_eq!(ApiError::Network("reset".into()).kind(), ErrorKind::Transport);
        assert_eq!(ApiError::NotFound("x".into()).kind(), ErrorKind::Status);
        assert!(ApiError::Unauthorized(String::new()).is_auth_failure());
    }

    #[test]
    fn test_detail_drops_variant_prefix() {
        let err = ApiError::from_status(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"detail": "Maintenance in progress"}"#,
        );
        assert_eq!(err, ApiError::ServerError("Maintenance in progress".to_string()));
        assert_eq!(err.detail(), "Maintenance in progress");
        assert_eq!(ApiError::ServerError(String::new()).detail(), "");

        let fields = ApiError::Validation(FieldErrors::from_body(r#"{"detail": "Bad token"}"#));
        assert_eq!(fields.detail(), "Bad token");
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(2000);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        let msg = err.to_string();
        assert!(msg.contains("truncated, 2000 total bytes"));
        assert!(msg.len() < 700);
    }
}
