//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use mucache_core::{CacheError, FetchError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub details: Value,
    pub success: bool,
}

/// An error that renders as `(status, {error, details, success: false})`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub details: Value,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, details: impl Into<Value>) -> Self {
        Self {
            status,
            code,
            details: details.into(),
        }
    }

    pub fn bad_request(code: &'static str, details: impl Into<Value>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, details)
    }

    pub fn not_found(details: impl Into<Value>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", details)
    }

    pub fn internal(details: impl Into<Value>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.code.to_string(),
                details: self.details,
                success: false,
            }),
        )
            .into_response()
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::InvalidUrl(msg) => ApiError::bad_request("invalid_url", msg),
            FetchError::Unsupported(msg) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "unsupported_url", msg)
            }
            FetchError::Extraction(e) => {
                let attempts = serde_json::to_value(e.attempts()).unwrap_or(Value::Null);
                ApiError::new(StatusCode::BAD_GATEWAY, "extraction_failed", attempts)
            }
            FetchError::Storage(e) => e.into(),
            FetchError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ApiError::internal(msg)
            }
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InvalidUrl(msg) => ApiError::bad_request("invalid_url", msg),
            CacheError::InvalidFilename(msg) => ApiError::bad_request("invalid_filename", msg),
            CacheError::NotFound(name) => ApiError::not_found(format!("{} not found", name)),
            other => {
                error!("Storage error: {}", other);
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    other.to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mucache_core::{AttemptFailure, ExtractionError};

    #[test]
    fn test_fetch_error_statuses() {
        let cases = [
            (FetchError::InvalidUrl("x".into()), StatusCode::BAD_REQUEST, "invalid_url"),
            (
                FetchError::Unsupported("blob:x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "unsupported_url",
            ),
            (
                FetchError::Storage(CacheError::TooSmall { size: 1, min: 2 }),
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
            ),
        ];
        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn test_extraction_failure_lists_attempts() {
        let err = FetchError::Extraction(ExtractionError::AllStrategiesFailed {
            url: "https://example.com".into(),
            attempts: vec![AttemptFailure {
                strategy: "yt-dlp".into(),
                reason: "timed out after 600s".into(),
            }],
        });
        let api: ApiError = err.into();
        assert_eq!(api.status, StatusCode::BAD_GATEWAY);
        assert_eq!(api.details[0]["strategy"], "yt-dlp");
    }
}
