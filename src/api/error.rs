use serde::Deserialize;
use thiserror::Error;

/// Structured error body returned by the Pawbase API.
///
/// `error` is a machine-readable code such as `InvalidEmailOrPassword`,
/// `EmailInUse`, or `InvalidOrExpiredCode`; `field` is set for
/// validation errors tied to a single input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - access token expired or invalid")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("{}", .0.message.as_deref().unwrap_or(.0.error.as_str()))]
    Api(ErrorResponse),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        // Back off to a char boundary; byte 500 may fall inside a
        // multibyte character.
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..end],
            body.len()
        )
    }

    /// Map a non-success response to the error taxonomy. Bodies that
    /// parse as the service's structured error become `Api`; anything
    /// else falls back to status-based variants.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if let Ok(response) = serde_json::from_str::<ErrorResponse>(body) {
            if status.as_u16() == 401 {
                // 401 bodies are reported, but stay in the
                // authorization-failure branch of the taxonomy so the
                // refresh path sees a uniform error.
                return ApiError::Unauthorized;
            }
            return ApiError::Api(response);
        }

        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// The authorization-failure predicate used by the refresh path.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, "nope"),
            ApiError::AccessDenied(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "boom"),
            ApiError::ServerError(_)
        ));
    }

    #[test]
    fn test_structured_body_wins_for_client_errors() {
        let body = r#"{"error":"EmailInUse","message":"Email address is already in use."}"#;
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, body);
        match err {
            ApiError::Api(response) => assert_eq!(response.error, "EmailInUse"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_401_with_body_stays_unauthorized() {
        let body = r#"{"error":"ActionForbidden"}"#;
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, body);
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_truncation_lands_on_char_boundary() {
        // 200 euro signs = 600 bytes, and byte 500 falls mid-character.
        let body = "€".repeat(200);
        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ApiError::ServerError(msg) => {
                assert!(msg.contains("truncated"));
                assert!(msg.contains("600 total bytes"));
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn test_body_truncation() {
        let long = "x".repeat(600);
        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &long) {
            ApiError::ServerError(msg) => {
                assert!(msg.contains("truncated"));
                assert!(msg.len() < 600);
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }
}
