//! REST API gateway for the booking backend.
//!
//! This module provides the `ApiClient` every backend call goes through,
//! the `ApiError` taxonomy decided at that boundary, and the resource
//! calls for authentication, therapists and administrators.
//!
//! Protected routes use JWT bearer authentication; expired access tokens
//! are refreshed transparently through `auth/token/refresh/`.

pub mod admin;
pub mod auth;
pub mod client;
pub mod error;
pub mod therapist;

pub use client::ApiClient;
pub use error::{ApiError, ErrorKind, FieldErrors};
