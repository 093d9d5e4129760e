use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::platform::Platform;

/// Errors from the cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Downloaded file is too small ({size} bytes, minimum {min})")]
    TooSmall { size: u64, min: u64 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairReport {
    /// Entries re-pointed at an existing file, as `(old, new)` filenames.
    pub fixed: Vec<(String, String)>,
    /// Source URLs whose entry was dropped because the file is gone.
    pub dropped: Vec<String>,
    /// Files re-indexed from their sidecar.
    pub adopted: Vec<String>,
    /// Media files on disk with no entry and nothing to adopt them from.
    pub orphans: Vec<String>,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        !self.fixed.is_empty() || !self.dropped.is_empty() || !self.adopted.is_empty()
    }
}

/// Filesystem details of a cached file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStats {
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Parsed sidecar, when one exists.
    pub enhanced_metadata: Option<serde_json::Value>,
}

/// Contents of `<filename>.metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    pub source_url: String,
    pub title: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub downloaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
