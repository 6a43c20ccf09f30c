//! API gateway for the booking backend.
//!
//! Every backend call goes through [`ApiClient`]. It attaches the current
//! access token from the [`SessionStore`], and on a 401 it exchanges the
//! refresh token for a new access token and replays the call once. Only one
//! refresh exchange runs at a time; calls that hit a 401 while it is running
//! wait for its outcome and are released in arrival order. When the session
//! cannot be recovered the store is cleared before the error is returned.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::SessionStore;
use crate::config::{Config, DEFAULT_REFRESH_TIMEOUT_SECS};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Token refresh endpoint, relative to the base URL
const REFRESH_PATH: &str = "auth/token/refresh/";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present only when the backend rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

type RefreshOutcome = std::result::Result<String, ApiError>;

/// Why a refresh exchange produced no usable token
enum RefreshFailure {
    /// The session cannot be recovered and must be cleared
    Fatal(ApiError),
    /// The session was logged out or replaced while the exchange ran
    Superseded,
}

impl From<ApiError> for RefreshFailure {
    fn from(err: ApiError) -> Self {
        RefreshFailure::Fatal(err)
    }
}

/// Shared refresh bookkeeping: the in-progress flag and the callers
/// waiting on the current cycle.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Ownership of one refresh cycle. Closing it clears the flag and takes the
/// waiters in a single critical section, so a new cycle cannot start while
/// the previous one is being drained. Dropping an unsettled cycle still
/// closes it and the waiters see their channel close.
struct RefreshCycle {
    state: Arc<Mutex<RefreshState>>,
    open: bool,
}

impl RefreshCycle {
    fn close(&mut self) -> Vec<oneshot::Sender<RefreshOutcome>> {
        self.open = false;
        let mut state = lock(&self.state);
        state.in_flight = false;
        std::mem::take(&mut state.waiters)
    }

    fn settle(mut self, outcome: &RefreshOutcome) {
        let waiters = self.close();
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Releasing queued requests");
        for waiter in waiters {
            // A waiter whose caller went away is simply skipped
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl Drop for RefreshCycle {
    fn drop(&mut self) {
        if self.open {
            warn!("Token refresh abandoned before completion");
            drop(self.close());
        }
    }
}

/// A backend call kept in replayable form
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    /// Credential endpoints skip the bearer token and the refresh cycle
    authenticated: bool,
    /// Set once the call has been replayed after a refresh
    retried: bool,
}

impl ApiRequest {
    pub(crate) fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
            retried: false,
        }
    }

    pub(crate) fn query<Q: Serialize>(mut self, query: &Q) -> std::result::Result<Self, ApiError> {
        self.query = query_pairs(query)?;
        Ok(self)
    }

    pub(crate) fn json<B: Serialize>(mut self, body: &B) -> std::result::Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub(crate) fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// Flatten a serializable filter into query pairs, dropping null fields
fn query_pairs<Q: Serialize>(query: &Q) -> std::result::Result<Vec<(String, String)>, ApiError> {
    let value = serde_json::to_value(query)
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode query: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .filter_map(|(key, v)| match v {
                Value::Null => None,
                Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(ApiError::InvalidRequest(format!(
            "Query must be an object, got {}",
            other
        ))),
    }
}

/// API gateway.
/// Clone is cheap - clones share the connection pool, the session store
/// and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
    refresh: Arc<Mutex<RefreshState>>,
    refresh_timeout: Duration,
}

impl ApiClient {
    /// Create a new gateway for `base_url` backed by `session`
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            session,
            refresh: Arc::new(Mutex::new(RefreshState::default())),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        })
    }

    pub fn from_config(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        Ok(Self::new(config.api_base_url(), session)?.with_refresh_timeout(config.refresh_timeout()))
    }

    /// Bound the refresh exchange. Expiry counts as a failed refresh.
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    // ===== Request pipeline =====

    async fn send(&self, req: &ApiRequest, token: Option<&str>) -> std::result::Result<Response, ApiError> {
        debug!(method = %req.method, path = %req.path, retried = req.retried, "Sending request");

        let mut builder = self
            .client
            .request(req.method.clone(), self.endpoint(&req.path))
            .header(header::ACCEPT, "application/json");
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = req.body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// Turn a failed response into an error, consuming its body
    async fn error_for(response: Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, &body)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> std::result::Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_for(response).await)
        }
    }

    /// Run a call through the credential and refresh state machine
    pub(crate) async fn execute(&self, mut req: ApiRequest) -> std::result::Result<Response, ApiError> {
        let mut token = if req.authenticated {
            self.session.access_token()
        } else {
            None
        };

        loop {
            let response = self.send(&req, token.as_deref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED || !req.authenticated {
                return Self::check_response(response).await;
            }

            let rejection = Self::error_for(response).await;
            if req.retried {
                warn!(path = %req.path, "Access token rejected after refresh");
                self.force_logout();
                return Err(rejection);
            }

            debug!(path = %req.path, "Access token rejected, refreshing");
            req.retried = true;
            token = Some(self.refreshed_token(rejection).await?);
        }
    }

    // ===== Refresh coordination =====

    /// Obtain a fresh access token, either by running the refresh exchange
    /// or by waiting for the one already in flight.
    async fn refreshed_token(&self, rejection: ApiError) -> RefreshOutcome {
        let waiter = {
            let mut state = lock(&self.refresh);
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            debug!("Waiting for in-flight token refresh");
            return rx.await.unwrap_or_else(|_| {
                Err(ApiError::Network("Token refresh was cancelled".to_string()))
            });
        }

        let cycle = RefreshCycle {
            state: Arc::clone(&self.refresh),
            open: true,
        };
        let outcome = match self.run_refresh(rejection).await {
            Ok(token) => Ok(token),
            Err(RefreshFailure::Fatal(err)) => {
                self.force_logout();
                Err(err)
            }
            Err(RefreshFailure::Superseded) => Err(ApiError::Unauthorized(
                "Session ended during token refresh".to_string(),
            )),
        };
        cycle.settle(&outcome);
        outcome
    }

    async fn run_refresh(&self, rejection: ApiError) -> std::result::Result<String, RefreshFailure> {
        let Some(refresh_token) = self.session.refresh_token() else {
            info!("No refresh token available");
            return Err(RefreshFailure::Fatal(rejection));
        };

        let exchanged = match tokio::time::timeout(
            self.refresh_timeout,
            self.exchange_refresh_token(&refresh_token),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout_secs = self.refresh_timeout.as_secs_f64(), "Token refresh timed out");
                return Err(RefreshFailure::Fatal(ApiError::Network(format!(
                    "Token refresh timed out after {:?}",
                    self.refresh_timeout
                ))));
            }
        };

        // Keep the current refresh token unless the backend rotated it
        let next_refresh = exchanged
            .refresh
            .unwrap_or_else(|| refresh_token.clone());
        match self
            .session
            .set_token_if(&refresh_token, exchanged.access.clone(), Some(next_refresh))
        {
            Ok(true) => {}
            Ok(false) => {
                info!("Session changed during token refresh");
                return Err(RefreshFailure::Superseded);
            }
            // Committed in memory; only the record write failed
            Err(e) => warn!(error = %e, "Failed to persist refreshed token"),
        }
        info!("Access token refreshed");
        Ok(exchanged.access)
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> std::result::Result<RefreshResponse, ApiError> {
        let response = self
            .client
            .post(self.endpoint(REFRESH_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest {
                refresh: refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Token refresh rejected");
            return Err(match Self::error_for(response).await {
                err @ ApiError::Unauthorized(_) => err,
                other => {
                    let detail = other.detail();
                    ApiError::Unauthorized(if detail.trim().is_empty() {
                        format!("Token refresh failed with status {}", status)
                    } else {
                        detail
                    })
                }
            });
        }

        let exchanged: RefreshResponse = response.json().await?;
        if exchanged.access.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Refresh response carried an empty access token".to_string(),
            ));
        }
        Ok(exchanged)
    }

    fn force_logout(&self) {
        warn!("Session could not be recovered, logging out");
        if let Err(e) = self.session.logout() {
            warn!(error = %e, "Failed to clear session record");
        }
    }

    // ===== Typed helpers =====

    pub(crate) async fn fetch<T: DeserializeOwned>(&self, req: ApiRequest) -> std::result::Result<T, ApiError> {
        let path = req.path.clone();
        let response = self.execute(req).await?;
        response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    pub(crate) async fn fetch_unit(&self, req: ApiRequest) -> std::result::Result<(), ApiError> {
        self.execute(req).await.map(|_| ())
    }

    /// GET `path` and decode the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ApiError> {
        self.fetch(ApiRequest::new(Method::GET, path)).await
    }

    /// GET `path` with query parameters taken from `query`'s fields
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> std::result::Result<T, ApiError> {
        self.fetch(ApiRequest::new(Method::GET, path).query(query)?).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<T, ApiError> {
        self.fetch(ApiRequest::new(Method::POST, path).json(body)?).await
    }

    /// POST with no body, for action endpoints
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ApiError> {
        self.fetch(ApiRequest::new(Method::POST, path)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> std::result::Result<T, ApiError> {
        self.fetch(ApiRequest::new(Method::PUT, path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> std::result::Result<(), ApiError> {
        self.fetch_unit(ApiRequest::new(Method::DELETE, path)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdminBookingFilter, BookingStatus};

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Arc::new(SessionStore::in_memory())).expect("client")
    }

    #[test]
    fn test_endpoint_joins_slashes() {
        let api = client("http://localhost:8000/api/");
        assert_eq!(
            api.endpoint("/admin/cabins/"),
            "http://localhost:8000/api/admin/cabins/"
        );
        assert_eq!(
            api.endpoint("auth/token/refresh/"),
            "http://localhost:8000/api/auth/token/refresh/"
        );

        let api = client("http://localhost:8000/api");
        assert_eq!(
            api.endpoint("therapist/profile/"),
            "http://localhost:8000/api/therapist/profile/"
        );
    }

    #[test]
    fn test_query_pairs_skip_missing_fields() {
        let filter = AdminBookingFilter {
            cabin_id: Some(3),
            status: Some(BookingStatus::Booked),
            ..Default::default()
        };
        let mut pairs = query_pairs(&filter).expect("pairs");
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("cabin_id".to_string(), "3".to_string()),
                ("status".to_string(), "booked".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_reject_non_object() {
        assert!(matches!(
            query_pairs(&vec![1, 2]),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(query_pairs(&()).expect("unit").is_empty());
    }

    #[test]
    fn test_anonymous_request() {
        let req = ApiRequest::new(Method::POST, "auth/login/").anonymous();
        assert!(!req.authenticated);
        assert!(!req.retried);
    }

    #[tokio::test]
    async fn test_cycle_drop_releases_waiters() {
        let state = Arc::new(Mutex::new(RefreshState::default()));
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = lock(&state);
            guard.in_flight = true;
            guard.waiters.push(tx);
        }

        drop(RefreshCycle {
            state: Arc::clone(&state),
            open: true,
        });

        assert!(rx.await.is_err());
        let guard = lock(&state);
        assert!(!guard.in_flight);
        assert!(guard.waiters.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_settle_releases_in_arrival_order() {
        let state = Arc::new(Mutex::new(RefreshState::default()));
        lock(&state).in_flight = true;
        let released = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..4 {
            let (tx, rx) = oneshot::channel();
            lock(&state).waiters.push(tx);
            let released = Arc::clone(&released);
            handles.push(tokio::spawn(async move {
                let outcome = rx.await.expect("delivered");
                released.lock().expect("released").push(i);
                outcome
            }));
        }
        // Park every waiter on its channel before settling
        tokio::task::yield_now().await;

        let cycle = RefreshCycle {
            state: Arc::clone(&state),
            open: true,
        };
        cycle.settle(&Ok("A2".to_string()));

        for handle in handles {
            assert_eq!(handle.await.expect("join"), Ok("A2".to_string()));
        }
        assert_eq!(*released.lock().expect("released"), vec![0, 1, 2, 3]);
        assert!(!lock(&state).in_flight);
    }
}
