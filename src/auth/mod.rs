//! Authentication module: session state, refresh coordination, and
//! credential storage.
//!
//! This module provides:
//! - `Session`: the all-or-nothing token pair with decoded claims
//! - `SessionStore`: process-wide session state with a logout signal
//! - `RefreshCoordinator`: single-flight token refresh across
//!   concurrently failing requests
//! - `CredentialStore`: refresh-token-at-rest via the OS keychain
//!
//! Sessions older than 24 hours are never refreshed; they are cleared
//! and the logout signal is raised instead.

pub mod credentials;
pub mod refresh;
pub mod session;
pub mod store;

pub use credentials::CredentialStore;
pub use refresh::{Recovery, RefreshBackend, RefreshCoordinator};
pub use session::Session;
pub use store::SessionStore;
