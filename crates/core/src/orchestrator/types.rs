//! Types for the download orchestrator.

use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::CacheEntry;
use crate::extractor::ExtractionError;

/// Errors returned by a fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or is not http(s).
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// No strategy can handle the URL.
    #[error("unsupported URL: {0}")]
    Unsupported(String),

    /// Every strategy failed.
    #[error(transparent)]
    Extraction(ExtractionError),

    /// Moving the file into the cache or persisting the catalog failed.
    #[error("storage error: {0}")]
    Storage(CacheError),

    /// A blocking task panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CacheError> for FetchError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InvalidUrl(msg) => FetchError::InvalidUrl(msg),
            other => FetchError::Storage(other),
        }
    }
}

impl From<ExtractionError> for FetchError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::UnsupportedUrl(msg) => FetchError::Unsupported(msg),
            other => FetchError::Extraction(other),
        }
    }
}

/// Result of a successful fetch.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub entry: CacheEntry,
    /// True when no download was needed, including when another caller
    /// finished the same download first.
    pub from_cache: bool,
}

/// Snapshot of orchestrator activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorStatus {
    /// URLs with a download in progress or callers waiting on one.
    pub in_flight: usize,
    pub catalog_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_mapping() {
        let err: FetchError = CacheError::InvalidUrl("ftp://x".to_string()).into();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let err: FetchError = CacheError::NotFound("a.mp4".to_string()).into();
        assert!(matches!(err, FetchError::Storage(_)));
    }

    #[test]
    fn test_extraction_error_mapping() {
        let err: FetchError = ExtractionError::UnsupportedUrl("blob:x".to_string()).into();
        assert_eq!(err.to_string(), "unsupported URL: blob:x");

        let err: FetchError = ExtractionError::AllStrategiesFailed {
            url: "https://example.com".to_string(),
            attempts: vec![],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "All strategies failed for https://example.com"
        );
    }
}
