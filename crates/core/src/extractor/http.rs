//! Shared HTTP plumbing for the strategies.

use std::path::Path;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::types::StrategyError;
use crate::cache::hex;
use crate::config::ExtractorConfig;
use crate::platform::{path_extension, MEDIA_EXTENSIONS};

/// Build the client shared by all HTTP strategies.
pub fn build_client(config: &ExtractorConfig) -> Result<Client, StrategyError> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(Duration::from_secs(config.http_timeout_secs))
        .cookie_store(true)
        .build()
        .map_err(|e| StrategyError::Network(format!("failed to build HTTP client: {}", e)))
}

/// Result of streaming a response body to disk.
#[derive(Debug, Clone)]
pub struct Downloaded {
    pub size: u64,
    pub sha256: String,
    pub md5: String,
    pub content_type: Option<String>,
}

/// Stream `url` into `destination` chunk by chunk, hashing as it goes.
///
/// HTML responses are rejected so a landing page is never mistaken for media.
pub async fn download_to_file(
    client: &Client,
    url: &str,
    destination: &Path,
    referer: Option<&str>,
) -> Result<Downloaded, StrategyError> {
    let mut request = client.get(url);
    if let Some(referer) = referer {
        request = request.header(REFERER, referer);
    }

    let mut response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StrategyError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_ascii_lowercase());
    if content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("text/html"))
    {
        return Err(StrategyError::NoMedia(format!("{} returned an HTML page", url)));
    }

    let mut file = tokio::fs::File::create(destination).await?;
    let mut sha = Sha256::new();
    let mut md5 = md5::Context::new();
    let mut size = 0u64;

    while let Some(chunk) = response.chunk().await? {
        sha.update(&chunk);
        md5.consume(&chunk);
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;

    debug!(url = %url, size, "Downloaded media");

    Ok(Downloaded {
        size,
        sha256: hex(&sha.finalize()),
        md5: format!("{:x}", md5.compute()),
        content_type,
    })
}

/// Largest page body the scrapers will read.
pub const MAX_PAGE_BYTES: u64 = 4 * 1024 * 1024;

/// Fetch a page as text. Returns the body and the final URL after redirects.
///
/// Only textual responses up to [`MAX_PAGE_BYTES`] are read; anything else
/// fails before the body is pulled.
pub async fn fetch_text(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<(String, Url), StrategyError> {
    let mut response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StrategyError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_ascii_lowercase());
    if let Some(ct) = content_type.as_deref() {
        if !is_page_type(ct) {
            return Err(StrategyError::NoMedia(format!("{} is {}, not a page", url, ct)));
        }
    }
    if let Some(len) = response.content_length() {
        if len > MAX_PAGE_BYTES {
            return Err(StrategyError::NoMedia(format!(
                "{} is {} bytes, larger than a page",
                url, len
            )));
        }
    }

    let final_url = response.url().clone();
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if (body.len() + chunk.len()) as u64 > MAX_PAGE_BYTES {
            return Err(StrategyError::NoMedia(format!(
                "{} is larger than {} bytes",
                url, MAX_PAGE_BYTES
            )));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((String::from_utf8_lossy(&body).into_owned(), final_url))
}

fn is_page_type(content_type: &str) -> bool {
    content_type.starts_with("text/") || content_type.starts_with("application/xhtml+xml")
}

/// Fetch and decode a JSON document.
pub async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<T, StrategyError> {
    let response = client.get(url).timeout(timeout).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(StrategyError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| StrategyError::Parse(e.to_string()))
}

/// Best guess at a file extension from the URL path, then the content type.
pub fn media_extension(url: &str, content_type: Option<&str>) -> Option<String> {
    let from_path = Url::parse(url)
        .ok()
        .and_then(|u| path_extension(u.path()))
        .filter(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()));
    from_path.or_else(|| content_type.and_then(extension_for_content_type))
}

fn extension_for_content_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    let ext = match essence {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/x-flv" => "flv",
        "audio/mpeg" => "mp3",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => return None,
    };
    Some(ext.to_string())
}

/// True for URLs that only make sense inside a browser (blob/mediastream/data).
pub fn is_streaming_only(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("blob:") || lower.starts_with("mediastream:") || lower.starts_with("data:")
}

/// True for adaptive streaming manifests that cannot be saved as one file.
pub fn is_manifest(url: &Url) -> bool {
    matches!(
        path_extension(url.path()).as_deref(),
        Some("m3u8") | Some("mpd")
    )
}
