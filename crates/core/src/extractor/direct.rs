use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::http::{download_to_file, is_manifest, media_extension};
use super::traits::ExtractionStrategy;
use super::types::{MediaFile, StrategyError};

/// Streams a direct media link to disk.
pub struct DirectStrategy {
    client: Client,
}

impl DirectStrategy {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExtractionStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct-download"
    }

    fn supports(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https") && !is_manifest(url)
    }

    async fn attempt(&self, url: &Url, work_dir: &Path) -> Result<MediaFile, StrategyError> {
        let path = work_dir.join("download");
        let downloaded = download_to_file(&self.client, url.as_str(), &path, None).await?;
        let extension = media_extension(url.as_str(), downloaded.content_type.as_deref());

        let mut media = MediaFile::new(path, self.name())
            .with_media_url(url.as_str())
            .with_content_hash(downloaded.sha256);
        if let Some(title) = title_from_path(url) {
            media = media.with_title(title);
        }
        if let Some(ext) = extension {
            media = media.with_extension(ext);
        }
        Ok(media)
    }
}

/// Last path segment, percent-decoded, without its extension.
pub(crate) fn title_from_path(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let stem = match decoded.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => decoded,
    };
    Some(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_path() {
        let url = Url::parse("https://cdn.example.com/media/My%20Clip.mp4?x=1").unwrap();
        assert_eq!(title_from_path(&url), Some("My Clip".to_string()));

        let url = Url::parse("https://cdn.example.com/").unwrap();
        assert_eq!(title_from_path(&url), None);
    }

    #[test]
    fn test_supports_rejects_manifests() {
        let strategy = DirectStrategy::new(Client::new());
        assert!(strategy.supports(&Url::parse("https://cdn.example.com/a.mp4").unwrap()));
        assert!(!strategy.supports(&Url::parse("https://cdn.example.com/master.m3u8").unwrap()));
        assert!(!strategy.supports(&Url::parse("https://cdn.example.com/dash.mpd").unwrap()));
    }
}
