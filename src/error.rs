/// Unified error types for the portfolio backend
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or missing request fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid credential
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Valid credential, wrong identity
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// Resource absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Third-party API failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Non-SQL storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Missing or invalid server configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert ApiError to HTTP response
///
/// Server-side failures are reported with a generic message in release
/// builds; the detailed message is logged and only echoed to the client
/// in debug builds.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            ApiError::Auth(_) => (StatusCode::UNAUTHORIZED, "Unauthorized", self.to_string()),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            ApiError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "UpstreamError",
                sanitized(&self),
            ),
            ApiError::Database(_) | ApiError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "StorageError",
                sanitized(&self),
            ),
            ApiError::Config(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                sanitized(&self),
            ),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

fn sanitized(err: &ApiError) -> String {
    if cfg!(debug_assertions) {
        err.to_string()
    } else {
        "Internal server error".to_string()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (
                ApiError::Storage("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = err.into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let response = ApiError::NotFound("message 42".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
