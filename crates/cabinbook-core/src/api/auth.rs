//! Credential endpoints: login, registration and password reset.
//!
//! These calls carry no bearer token and never enter the refresh cycle; a
//! 401 from them means the submitted credentials were wrong.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{TherapistRegistration, User};

use super::client::ApiRequest;
use super::{ApiClient, ApiError};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    user_id: i64,
    username: String,
    #[serde(default)]
    is_therapist: bool,
    #[serde(default)]
    is_admin: bool,
}

impl LoginResponse {
    fn user(&self) -> User {
        User {
            id: self.user_id,
            username: self.username.clone(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone_number: String::new(),
            is_therapist: self.is_therapist,
            is_admin: self.is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
struct PasswordResetRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordResetConfirm<'a> {
    token: &'a str,
    new_password: &'a str,
    confirm_new_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

impl ApiClient {
    /// Authenticate and start a session in the store
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let req = ApiRequest::new(Method::POST, "auth/login/")
            .anonymous()
            .json(&LoginRequest { username, password })?;
        let response: LoginResponse = self.fetch(req).await?;

        let user = response.user();
        let Some(access) = response.access.filter(|t| !t.is_empty()) else {
            return Err(ApiError::InvalidResponse(
                "Login response carried no access token".to_string(),
            ));
        };

        if let Err(e) = self.session().login(user.clone(), access, response.refresh) {
            warn!(error = %e, "Failed to save session");
        }
        Ok(user)
    }

    /// End the session locally; the backend keeps no server-side session
    pub fn logout(&self) {
        if let Err(e) = self.session().logout() {
            warn!(error = %e, "Failed to clear session record");
        }
    }

    pub async fn register_therapist(
        &self,
        registration: &TherapistRegistration,
    ) -> Result<User, ApiError> {
        let req = ApiRequest::new(Method::POST, "auth/register/therapist/")
            .anonymous()
            .json(registration)?;
        let user: User = self.fetch(req).await?;
        debug!(user_id = user.id, "Therapist registered");
        Ok(user)
    }

    /// Ask the backend to email a reset token. Returns the server's message.
    pub async fn request_password_reset(&self, email: &str) -> Result<String, ApiError> {
        let req = ApiRequest::new(Method::POST, "auth/password-reset/request/")
            .anonymous()
            .json(&PasswordResetRequest { email })?;
        let response: MessageResponse = self.fetch(req).await?;
        Ok(response.message.unwrap_or_default())
    }

    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
        confirm_new_password: &str,
    ) -> Result<String, ApiError> {
        let req = ApiRequest::new(Method::POST, "auth/password-reset/confirm/")
            .anonymous()
            .json(&PasswordResetConfirm {
                token,
                new_password,
                confirm_new_password,
            })?;
        let response: MessageResponse = self.fetch(req).await?;
        Ok(response.message.unwrap_or_default())
    }
}
