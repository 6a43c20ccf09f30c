//! Authentication state and credential storage.
//!
//! This module provides:
//! - `SessionStore`: the authoritative login/logout/refresh state, persisted
//!   as `auth-storage.json` in the data directory
//! - `CredentialStore`: optional OS keychain storage for a login password

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Credential, SessionStore, SESSION_FILE};
