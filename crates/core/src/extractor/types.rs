use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A media file produced by a strategy inside its work directory.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Location inside the work directory.
    pub path: PathBuf,
    /// Bytes written.
    pub size: u64,
    pub title: Option<String>,
    /// Preferred extension for the cached file name.
    pub extension: Option<String>,
    /// URL the bytes were actually fetched from.
    pub media_url: Option<String>,
    /// SHA-256 (lowercase hex) computed while writing.
    pub content_hash: Option<String>,
    /// Extra details worth keeping in the sidecar.
    pub metadata: Option<serde_json::Value>,
    /// Name of the strategy that produced the file.
    pub strategy: String,
}

impl MediaFile {
    pub fn new(path: PathBuf, strategy: impl Into<String>) -> Self {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        Self {
            path,
            size,
            title: None,
            extension: None,
            media_url: None,
            content_hash: None,
            metadata: None,
            strategy: strategy.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Why a single strategy attempt failed.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("not applicable: {0}")]
    Unsupported(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no media found: {0}")]
    NoMedia(String),

    #[error("external tool failed: {0}")]
    Process(String),

    #[error("file too small ({size} bytes, minimum {min})")]
    TooSmall { size: u64, min: u64 },

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl From<reqwest::Error> for StrategyError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => StrategyError::Http {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => StrategyError::Network(e.to_string()),
        }
    }
}

/// One failed attempt, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub strategy: String,
    pub reason: String,
}

/// Errors from the extraction dispatcher.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("All strategies failed for {url}")]
    AllStrategiesFailed {
        url: String,
        attempts: Vec<AttemptFailure>,
    },

    #[error("Work directory error: {0}")]
    WorkDir(String),
}

impl ExtractionError {
    /// Per-attempt failures, empty for errors raised before any attempt.
    pub fn attempts(&self) -> &[AttemptFailure] {
        match self {
            ExtractionError::AllStrategiesFailed { attempts, .. } => attempts,
            _ => &[],
        }
    }
}
