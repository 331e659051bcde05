//! REST API client module for the Pawbase service.
//!
//! Provides the `ApiClient` for the auth, user, pet, and organisation
//! endpoints. Authentication uses JWT bearer tokens; expired tokens
//! are refreshed transparently by the session coordinator in
//! `crate::auth`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ErrorResponse};
