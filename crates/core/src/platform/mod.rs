//! Platform classification for source URLs.
//!
//! Rules run in a fixed priority order and the first match wins. Anything that
//! cannot be parsed or matched is `Generic`.

use serde::{Deserialize, Serialize};
use url::Url;

/// Source platform of a media URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Twitter,
    ArchiveOrg,
    Vimeo,
    Direct,
    Generic,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Youtube,
        Platform::Twitter,
        Platform::ArchiveOrg,
        Platform::Vimeo,
        Platform::Direct,
        Platform::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
            Platform::ArchiveOrg => "archive_org",
            Platform::Vimeo => "vimeo",
            Platform::Direct => "direct",
            Platform::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        Platform::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File extensions that mark a URL as a direct media link.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "webm", "mkv", "mov", "avi", "flv", "mp3", "m4a", "ogg", "opus", "wav", "flac",
];

/// Classify a URL string. Never fails.
pub fn classify(url: &str) -> Platform {
    match Url::parse(url.trim()) {
        Ok(parsed) => classify_url(&parsed),
        Err(_) => Platform::Generic,
    }
}

/// Classify an already parsed URL.
pub fn classify_url(url: &Url) -> Platform {
    let host = match url.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => return Platform::Generic,
    };
    let path = url.path();

    if host_matches(&host, &["youtube.com", "youtu.be", "youtube-nocookie.com"]) {
        return Platform::Youtube;
    }
    if host_matches(&host, &["twitter.com", "x.com"]) && twitter_status_id(path).is_some() {
        return Platform::Twitter;
    }
    if host_matches(&host, &["archive.org"]) && archive_identifier(path).is_some() {
        return Platform::ArchiveOrg;
    }
    if host_matches(&host, &["vimeo.com"]) {
        return Platform::Vimeo;
    }
    if has_media_extension(path) {
        return Platform::Direct;
    }
    Platform::Generic
}

/// True if `host` equals one of `domains` or is a subdomain of it.
pub(crate) fn host_matches(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
}

/// Numeric status id from a `/<user>/status/<id>` path.
pub fn twitter_status_id(path: &str) -> Option<&str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if segment == "status" || segment == "statuses" {
            let id = segments.next()?;
            if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
                return Some(id);
            }
            return None;
        }
    }
    None
}

/// Item identifier from a `/details/<id>` or `/embed/<id>` path.
pub fn archive_identifier(path: &str) -> Option<&str> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match segments.next() {
        Some("details") | Some("embed") => segments.next(),
        _ => None,
    }
}

/// Lowercased extension of the last path segment, if any.
pub fn path_extension(path: &str) -> Option<String> {
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn has_media_extension(path: &str) -> bool {
    path_extension(path)
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
