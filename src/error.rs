use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

use crate::route_table::RouteTableError;
use crate::services::forwarder::ForwardError;
use crate::services::token::TokenError;

/// Application-wide error type with the HTTP status each failure maps to.
///
/// # Taxonomy
///
/// - Input errors (malformed login payload, dot-segment path, unreadable write body) → 400
/// - Authentication errors (missing/invalid/expired token, bad credentials) → 401
/// - Upstream errors (backend unreachable, failed, or too slow) → 502 / 504
/// - Internal errors (signing failure, misconfiguration) → 500
///
/// Every variant is terminal for its request: the stage that produced it
/// owns the final response.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<RouteTableError> for AppError {
    fn from(err: RouteTableError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

/// Error response body for API endpoints.
///
/// `details` is only populated where it cannot leak secrets or internal state.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AppError {
    /// HTTP status code, client-facing message, and optional details.
    fn parts(&self) -> (StatusCode, &'static str, Option<String>) {
        match self {
            AppError::Token(err) => match err {
                TokenError::MissingToken => (
                    StatusCode::UNAUTHORIZED,
                    "Authorization header required",
                    None,
                ),
                TokenError::InvalidSignature(details) => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid token",
                    Some(details.clone()),
                ),
                TokenError::Expired => (StatusCode::UNAUTHORIZED, "Token expired", None),
                TokenError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "Invalid credentials", None)
                }
                TokenError::MalformedInput(_) => (StatusCode::BAD_REQUEST, "Invalid input", None),
                // Never expose signing internals
                TokenError::Signing(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not create token",
                    None,
                ),
            },
            AppError::Forward(err) => match err {
                ForwardError::DotSegment(_) => {
                    (StatusCode::BAD_REQUEST, "Invalid request path", None)
                }
                ForwardError::BodyRead(_) => (
                    StatusCode::BAD_REQUEST,
                    "Failed to read request body",
                    None,
                ),
                ForwardError::Timeout { .. } => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Upstream service timed out",
                    None,
                ),
                ForwardError::Upstream { .. } => (
                    StatusCode::BAD_GATEWAY,
                    "Upstream service unavailable",
                    None,
                ),
                ForwardError::Client(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                ),
            },
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Route not found", None),
            AppError::Internal(_) | AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                None,
            ),
        }
    }

    /// Whether the failure concerns a bearer token presented to a protected route.
    fn is_bearer_challenge(&self) -> bool {
        matches!(
            self,
            AppError::Token(
                TokenError::MissingToken | TokenError::InvalidSignature(_) | TokenError::Expired
            )
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = self.parts();

        // Full error server-side, sanitized message client-side
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if self.is_bearer_challenge() {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_is_unauthorized_without_details() {
        let (status, error, details) = AppError::from(TokenError::MissingToken).parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error, "Authorization header required");
        assert!(details.is_none());
    }

    #[test]
    fn test_invalid_signature_carries_details() {
        let err = AppError::from(TokenError::InvalidSignature("InvalidSignature".to_string()));
        let (status, error, details) = err.parts();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error, "Invalid token");
        assert_eq!(details.as_deref(), Some("InvalidSignature"));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AppError::from(TokenError::MalformedInput("eof".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(TokenError::Signing("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::from(ForwardError::BodyRead("reset".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ForwardError::DotSegment("/api/settings/..".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ForwardError::Timeout {
                    url: "http://settings:8081/x".into(),
                }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                AppError::from(ForwardError::Upstream {
                    url: "http://settings:8081/x".into(),
                    reason: "connection refused".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::NotFound("/api/x".into()), StatusCode::NOT_FOUND),
        ];

        for (err, expected) in cases {
            assert_eq!(err.parts().0, expected, "{err}");
        }
    }

    #[test]
    fn test_signing_failure_hides_internal_message() {
        let response = AppError::from(TokenError::Signing("key material".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_bearer_challenge_header_on_token_failures() {
        let response = AppError::from(TokenError::Expired).into_response();
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");

        // Login failures are not bearer challenges
        let response = AppError::from(TokenError::InvalidCredentials).into_response();
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_error_response_skips_empty_details() {
        let body = ErrorResponse {
            error: "Authorization header required".to_string(),
            details: None,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"error":"Authorization header required"}"#
        );
    }
}
