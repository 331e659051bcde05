//! Wire types for the Pawbase REST API.
//!
//! All request/response bodies use camelCase field names on the wire,
//! matching the service's JSON conventions.

pub mod auth;
pub mod content;
pub mod page;
pub mod pet;
pub mod user;

pub use auth::{
    AuthTokens, ForgotPasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, VerifyCodeRequest, VerifyEmailRequest,
};
pub use content::{FaqEntry, LiabilityForm};
pub use page::{Page, PageQuery};
pub use pet::{NewPet, Pet, SearchRecord};
pub use user::{User, UserRole, UserUpdate};
