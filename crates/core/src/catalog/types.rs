//! Types for the media catalog (the persisted playlist).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::Platform;

/// One cached media file, keyed by its normalized source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Normalized source URL (unique key).
    pub source_url: String,
    /// File name inside the cache directory.
    pub filename: String,
    /// Media title, or the URL when none was extracted.
    pub title: String,
    pub platform: Platform,
    /// When the entry was first stored. Never updated.
    pub added_at: DateTime<Utc>,
    /// Size on disk, refreshed from the filesystem whenever the entry is read.
    #[serde(default)]
    pub file_size: u64,
    /// SHA-256 of the stored file (lowercase hex).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// Sort order for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Case-insensitive title, ties broken by `added_at` ascending.
    #[default]
    Title,
    /// Oldest first.
    AddedAt,
    /// Largest first.
    Size,
}

impl SortKey {
    pub fn parse(s: &str) -> Option<SortKey> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" | "name" => Some(SortKey::Title),
            "added_at" | "added" | "date" => Some(SortKey::AddedAt),
            "size" => Some(SortKey::Size),
            _ => None,
        }
    }
}

/// Filter and ordering for a catalog listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Only entries from this platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Case-insensitive substring matched against title and URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Catalog statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    /// Number of entries with a file on disk.
    pub total_entries: u64,
    /// Sum of file sizes in bytes.
    pub total_bytes: u64,
    /// Entry count per platform name.
    pub by_platform: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),
}
