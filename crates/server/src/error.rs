//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::CONTENT_RANGE;
use axum::response::{IntoResponse, Response};
use reel_core::UnsatisfiableRange;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRange(#[from] UnsatisfiableRange),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body stalled for more than {secs}s")]
    BodyTimeout { secs: u64 },

    #[error("storage error: {0}")]
    Storage(#[from] reel_storage::StorageError),

    #[error("core error: {0}")]
    Core(#[from] reel_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::InvalidRange(_) => "invalid_range",
            Self::BodyRead(_) => "body_read_error",
            Self::BodyTimeout { .. } => "body_timeout",
            Self::Storage(_) => "storage_error",
            Self::Core(_) => "core_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRange(_) => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::BodyRead(_) => StatusCode::BAD_REQUEST,
            Self::BodyTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::Storage(e) => match e {
                reel_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                reel_storage::StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };

        if let Self::InvalidRange(range) = &self {
            let unsatisfied = format!("bytes */{}", range.size);
            return (status, [(CONTENT_RANGE, unsatisfied)], Json(body)).into_response();
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_range_advertises_size() {
        let response = ApiError::from(UnsatisfiableRange {
            start: 1000,
            size: 1000,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes */1000");
    }

    #[test]
    fn storage_errors_map_to_client_or_server_status() {
        let not_found = ApiError::from(reel_storage::StorageError::NotFound("a.mp4".into()));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let io = ApiError::from(reel_storage::StorageError::Io(std::io::Error::other("disk")));
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(io.code(), "storage_error");
    }
}
