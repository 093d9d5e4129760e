//! archive.org strategy: pick a file from the item metadata API and download it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use super::http::{download_to_file, fetch_json};
use super::traits::ExtractionStrategy;
use super::types::{MediaFile, StrategyError};
use crate::platform::archive_identifier;

const DEFAULT_BASE_URL: &str = "https://archive.org";
const MIN_CANDIDATE_SIZE: u64 = 1_000_000;
const SKIP_MARKERS: &[&str] = &["thumb", "screenshot", ".png", ".jpg", ".jpeg", ".gif"];
const HD_MARKERS: &[&str] = &["hd", "720", "1080", "high"];

/// Item metadata fields copied into the sidecar.
const KEPT_FIELDS: &[&str] = &[
    "title",
    "description",
    "creator",
    "date",
    "subject",
    "language",
    "runtime",
    "source",
    "collection",
    "uploader",
    "addeddate",
    "publicdate",
    "mediatype",
];

#[derive(Debug, Deserialize)]
struct ItemMetadata {
    #[serde(default)]
    metadata: Map<String, Value>,
    #[serde(default)]
    files: Vec<ItemFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ItemFile {
    pub name: String,
    #[serde(default)]
    pub format: Option<String>,
    /// archive.org reports sizes as strings.
    #[serde(default)]
    pub size: Option<Value>,
    #[serde(default)]
    pub md5: Option<String>,
}

impl ItemFile {
    fn size_bytes(&self) -> u64 {
        match &self.size {
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        }
    }
}

/// A file chosen for download, with its rank.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub file: ItemFile,
    pub extension: String,
    pub priority: u8,
    pub size: u64,
}

pub struct ArchiveStrategy {
    client: Client,
    timeout: Duration,
    base_url: String,
}

impl ArchiveStrategy {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self::with_base_url(client, timeout, DEFAULT_BASE_URL)
    }

    /// Use a different archive.org host (mirrors, local test servers).
    pub fn with_base_url(client: Client, timeout: Duration, base_url: impl Into<String>) -> Self {
        Self {
            client,
            timeout,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ExtractionStrategy for ArchiveStrategy {
    fn name(&self) -> &'static str {
        "archive-metadata"
    }

    fn supports(&self, url: &Url) -> bool {
        archive_identifier(url.path()).is_some()
    }

    async fn attempt(&self, url: &Url, work_dir: &Path) -> Result<MediaFile, StrategyError> {
        let identifier = archive_identifier(url.path())
            .ok_or_else(|| StrategyError::Unsupported("no item identifier in URL".to_string()))?
            .to_string();

        let metadata_url = format!("{}/metadata/{}", self.base_url, identifier);
        let item: ItemMetadata = fetch_json(&self.client, &metadata_url, self.timeout).await?;

        let candidate = select_file(&item.files).ok_or_else(|| {
            StrategyError::NoMedia(format!(
                "no suitable video among {} files of {}",
                item.files.len(),
                identifier
            ))
        })?;
        debug!(
            identifier = %identifier,
            file = %candidate.file.name,
            size = candidate.size,
            "Selected archive.org file"
        );

        let download_url = format!(
            "{}/download/{}/{}",
            self.base_url,
            identifier,
            urlencoding::encode(&candidate.file.name)
        );
        let path = work_dir.join(format!("download.{}", candidate.extension));
        let downloaded = download_to_file(&self.client, &download_url, &path, None).await?;

        if let Some(expected) = candidate.file.md5.as_deref().filter(|m| !m.is_empty()) {
            if !expected.eq_ignore_ascii_case(&downloaded.md5) {
                return Err(StrategyError::Integrity(format!(
                    "md5 mismatch for {}: expected {}, got {}",
                    candidate.file.name, expected, downloaded.md5
                )));
            }
        } else {
            warn!(file = %candidate.file.name, "archive.org published no md5, skipping verification");
        }

        let title = item
            .metadata
            .get("title")
            .and_then(first_string)
            .unwrap_or_else(|| identifier.clone());

        Ok(MediaFile::new(path, self.name())
            .with_title(title)
            .with_extension(candidate.extension.clone())
            .with_media_url(download_url)
            .with_content_hash(downloaded.sha256)
            .with_metadata(sidecar_metadata(&identifier, url, &item.metadata, &candidate)))
    }
}

/// Rank downloadable files: HD mp4, mp4, webm, avi, then mkv/mov/flv; larger first.
pub(crate) fn select_file(files: &[ItemFile]) -> Option<Candidate> {
    let mut candidates: Vec<Candidate> = files
        .iter()
        .filter_map(|file| {
            let name = file.name.to_ascii_lowercase();
            if SKIP_MARKERS.iter().any(|m| name.contains(m)) {
                return None;
            }
            let size = file.size_bytes();
            if size < MIN_CANDIDATE_SIZE {
                return None;
            }
            let format = file.format.as_deref().unwrap_or("").to_ascii_lowercase();
            let (extension, priority) = classify_file(&name, &format)?;
            Some(Candidate {
                file: file.clone(),
                extension: extension.to_string(),
                priority,
                size,
            })
        })
        .collect();

    candidates.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.size.cmp(&a.size)));
    candidates.into_iter().next()
}

fn classify_file(name: &str, format: &str) -> Option<(&'static str, u8)> {
    if format.contains("mp4") || format.contains("mpeg4") || name.ends_with(".mp4") {
        let hd = HD_MARKERS.iter().any(|m| name.contains(m));
        return Some(("mp4", if hd { 0 } else { 1 }));
    }
    if format.contains("webm") || name.ends_with(".webm") {
        return Some(("webm", 2));
    }
    if format.contains("avi") || name.ends_with(".avi") {
        return Some(("avi", 3));
    }
    for ext in ["mkv", "mov", "flv"] {
        if format.contains(ext) || name.ends_with(&format!(".{}", ext)) {
            return Some((ext, 4));
        }
    }
    None
}

fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

fn sidecar_metadata(
    identifier: &str,
    url: &Url,
    metadata: &Map<String, Value>,
    candidate: &Candidate,
) -> Value {
    let mut out = Map::new();
    for field in KEPT_FIELDS {
        if let Some(value) = metadata.get(*field) {
            out.insert((*field).to_string(), value.clone());
        }
    }
    out.insert("identifier".into(), Value::from(identifier));
    out.insert("archive_url".into(), Value::from(url.as_str()));
    out.insert("original_filename".into(), Value::from(candidate.file.name.clone()));
    out.insert("file_format".into(), Value::from(candidate.extension.clone()));
    out.insert("file_size".into(), Value::from(candidate.size));
    if let Some(md5) = &candidate.file.md5 {
        out.insert("file_md5".into(), Value::from(md5.clone()));
    }
    Value::Object(out)
}
