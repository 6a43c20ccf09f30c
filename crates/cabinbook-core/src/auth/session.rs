use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::User;

/// Session record file name in the data directory
pub const SESSION_FILE: &str = "auth-storage.json";

/// Authentication state. `is_authenticated` is true iff `token` is set;
/// `refresh_token` may be absent for a non-refreshable session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl Credential {
    fn authenticated(user: Option<User>, token: String, refresh_token: Option<String>) -> Self {
        Self {
            user,
            token: Some(token),
            refresh_token,
            is_authenticated: true,
        }
    }

    /// Rebuild state from a persisted record. Only a record carrying both
    /// an access token and an identity starts out authenticated.
    fn from_record(record: Credential) -> Self {
        match (record.token, record.user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                Self::authenticated(Some(user), token, record.refresh_token)
            }
            _ => Self::default(),
        }
    }
}

/// Single source of truth for authentication state, mirrored to a JSON
/// record on disk so a session survives restarts.
///
/// All reads are synchronous so the API gateway can attach credentials
/// without awaiting. Share it behind an `Arc`.
#[derive(Debug)]
pub struct SessionStore {
    path: Option<PathBuf>,
    state: RwLock<Credential>,
}

impl SessionStore {
    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: RwLock::new(Credential::default()),
        }
    }

    /// Open the store backed by `data_dir/auth-storage.json`.
    /// A missing or unreadable record yields a logged-out store.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join(SESSION_FILE);
        let state = match Self::read_record(&path) {
            Ok(Some(record)) => Credential::from_record(record),
            Ok(None) => {
                debug!("No session record found");
                Credential::default()
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session record");
                Credential::default()
            }
        };
        debug!(authenticated = state.is_authenticated, "Session loaded");
        Self {
            path: Some(path),
            state: RwLock::new(state),
        }
    }

    fn read_record(path: &Path) -> Result<Option<Credential>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        let record: Credential =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(record))
    }

    fn read(&self) -> RwLockReadGuard<'_, Credential> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Credential> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current credential
    pub fn state(&self) -> Credential {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated
    }

    /// Start a new session, replacing whatever was there
    pub fn login(&self, user: User, token: String, refresh_token: Option<String>) -> Result<()> {
        let mut state = self.write();
        info!(user_id = user.id, username = %user.username, "Logged in");
        *state = Credential::authenticated(Some(user), token, refresh_token);
        self.persist(&state)
    }

    /// Clear all credentials and erase the record. Safe to call repeatedly.
    pub fn logout(&self) -> Result<()> {
        let mut state = self.write();
        if state.is_authenticated {
            info!("Logged out");
        }
        *state = Credential::default();
        self.erase()
    }

    /// Replace the tokens after a refresh, keeping the identity
    pub fn set_token(&self, token: String, refresh_token: Option<String>) -> Result<()> {
        let mut state = self.write();
        Self::apply_tokens(&mut state, token, refresh_token);
        self.persist(&state)
    }

    /// Like [`set_token`](Self::set_token), but commits only while the
    /// session is still the one whose `expected_refresh` token was
    /// exchanged. Returns `Ok(false)` and leaves the state untouched when
    /// the session was logged out or replaced in the meantime.
    pub fn set_token_if(
        &self,
        expected_refresh: &str,
        token: String,
        refresh_token: Option<String>,
    ) -> Result<bool> {
        let mut state = self.write();
        if !state.is_authenticated || state.refresh_token.as_deref() != Some(expected_refresh) {
            debug!("Session changed during token refresh, discarding new token");
            return Ok(false);
        }
        Self::apply_tokens(&mut state, token, refresh_token);
        self.persist(&state).map(|()| true)
    }

    fn apply_tokens(state: &mut Credential, token: String, refresh_token: Option<String>) {
        state.token = Some(token);
        state.refresh_token = refresh_token;
        state.is_authenticated = true;
    }

    /// Replace the identity. `None` clears the stored identity without
    /// ending the session.
    pub fn set_identity(&self, user: Option<User>) -> Result<()> {
        let mut state = self.write();
        state.user = user;
        self.persist(&state)
    }

    fn persist(&self, state: &Credential) -> Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, path).context("Failed to replace session file")?;
        Ok(())
    }

    fn erase(&self) -> Result<()> {
        if let Some(ref path) = self.path {
            if path.exists() {
                std::fs::remove_file(path).context("Failed to remove session file")?;
            }
        }
        Ok(())
    }
}
