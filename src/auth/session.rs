use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserRole;

/// Sessions older than this are treated as unrecoverable: the server
/// will reject the refresh token anyway, so we log out instead of
/// attempting a refresh.
pub(crate) const MAX_SESSION_AGE_HOURS: i64 = 24;

/// Token pair held by an authenticated session. Kept as one value so a
/// session can never hold an access token without its refresh token or
/// vice versa.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

/// Current authentication state: either fully authenticated (both
/// tokens present) or fully anonymous.
///
/// A `Session` is only ever created through [`Session::authenticated`]
/// (login, registration, or refresh success) or [`Session::anonymous`]
/// (startup, logout, unrecoverable refresh failure), and is replaced
/// wholesale, never patched in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    tokens: Option<TokenPair>,
    role: Option<UserRole>,
    issued_at: Option<DateTime<Utc>>,
}

/// JWT payload claims the client cares about. Decoded without
/// signature verification; the server remains the authority, the
/// client only reads issue time and role for local decisions.
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    iat: i64,
    #[serde(default)]
    role: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build an authenticated session from a token pair, decoding the
    /// access token's `iat` and `role` claims.
    ///
    /// Fails if the access token is not a decodable JWT. A missing
    /// `iat` claim yields an epoch issue time, which the freshness
    /// policy will treat as too old to refresh.
    pub fn authenticated(access_token: String, refresh_token: String) -> Result<Self> {
        let claims = decode_claims(&access_token)?;
        let role = claims.role.as_deref().and_then(UserRole::parse);
        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .unwrap_or_default();

        Ok(Self {
            tokens: Some(TokenPair {
                access: access_token,
                refresh: refresh_token,
            }),
            role,
            issued_at: Some(issued_at),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh.as_str())
    }

    pub fn role(&self) -> Option<UserRole> {
        self.role
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    /// Whether a refresh attempt is worth making for this session.
    /// False for anonymous sessions and for tokens issued more than
    /// [`MAX_SESSION_AGE_HOURS`] ago.
    pub fn is_refreshable(&self) -> bool {
        if self.tokens.is_none() {
            return false;
        }
        match self.issued_at {
            Some(issued) => Utc::now() - issued <= Duration::hours(MAX_SESSION_AGE_HOURS),
            None => false,
        }
    }
}

/// Decode the payload segment of a compact JWT without verifying the
/// signature, the same way the web client reads its own token.
fn decode_claims(token: &str) -> Result<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(anyhow!("access token is not a compact JWT"));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .context("invalid base64 in JWT payload")?;
    serde_json::from_slice(&bytes).context("invalid JSON in JWT payload")
}

#[cfg(test)]
pub(crate) fn test_jwt(iat: i64, role: &str, jti: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::json!({ "iat": iat, "role": role, "jti": jti })
            .to_string()
            .as_bytes(),
    );
    format!("{}.{}.sig", header, payload)
}
