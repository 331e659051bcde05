//! Pawbase client core - typed REST client and session management for
//! the Pawbase pet-registry service.
//!
//! The centerpiece is the authenticated session coordinator: every
//! request carries the current access token, and when the server
//! rejects it, one token refresh is performed per cycle no matter how
//! many requests fail at once. Recovered requests replay transparently;
//! unrecoverable sessions are cleared and a forced-logout signal is
//! raised for the UI/routing layer to act on.
//!
//! ```no_run
//! use pawbase::models::{LoginRequest, PageQuery};
//! use pawbase::ApiClient;
//!
//! # async fn example() -> Result<(), pawbase::ApiError> {
//! let client = ApiClient::new("https://api.pawbase.example")?;
//! client
//!     .login(
//!         &LoginRequest {
//!             email: "jo@example.org".into(),
//!             password: "hunter2".into(),
//!         },
//!         false,
//!     )
//!     .await?;
//!
//! let pets = client.list_pets(&PageQuery::default()).await?;
//! println!("{} pets on page", pets.results.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{Session, SessionStore};
pub use config::Config;
