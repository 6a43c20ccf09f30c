//! Core library for cabinbook.
//!
//! Provides the session store that owns authentication state, the API
//! gateway every backend call goes through, and the models for cabins,
//! slots and bookings.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ErrorKind, FieldErrors};
pub use auth::{Credential, CredentialStore, SessionStore};
pub use config::Config;
