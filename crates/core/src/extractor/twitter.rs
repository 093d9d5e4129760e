//! Twitter/X strategy: scan the status page for `video.twimg.com` MP4 links.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::http::{download_to_file, fetch_text};
use super::traits::ExtractionStrategy;
use super::types::{MediaFile, StrategyError};
use crate::platform::twitter_status_id;

static VIDEO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https://video\.twimg\.com/[^"'\s<>\\]+?\.mp4[^"'\s<>\\]*"#)
        .expect("valid twimg regex")
});

static RESOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{2,5})x(\d{2,5})/").expect("valid resolution regex"));

pub struct TwitterPageStrategy {
    client: Client,
    timeout: Duration,
}

impl TwitterPageStrategy {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ExtractionStrategy for TwitterPageStrategy {
    fn name(&self) -> &'static str {
        "twitter-page-scan"
    }

    fn supports(&self, url: &Url) -> bool {
        twitter_status_id(url.path()).is_some()
    }

    async fn attempt(&self, url: &Url, work_dir: &Path) -> Result<MediaFile, StrategyError> {
        let status_id = twitter_status_id(url.path())
            .ok_or_else(|| StrategyError::Unsupported("no status id in URL".to_string()))?
            .to_string();

        let mut page_url = url.clone();
        if page_url.host_str() == Some("x.com") {
            let _ = page_url.set_host(Some("twitter.com"));
        }

        let (html, _) = fetch_text(&self.client, page_url.as_str(), self.timeout).await?;
        let video_url = best_variant(&scan_video_urls(&html))
            .ok_or_else(|| StrategyError::NoMedia("no video.twimg.com links on page".to_string()))?;
        debug!(status_id = %status_id, video_url = %video_url, "Found Twitter video");

        let path = work_dir.join(format!("{}.mp4", status_id));
        let downloaded =
            download_to_file(&self.client, &video_url, &path, Some(page_url.as_str())).await?;

        Ok(MediaFile::new(path, self.name())
            .with_title(format!("X_Video_{}", status_id))
            .with_extension("mp4")
            .with_media_url(video_url)
            .with_content_hash(downloaded.sha256)
            .with_metadata(serde_json::json!({ "status_id": status_id })))
    }
}

/// All distinct twimg MP4 URLs in the page, in order of appearance.
pub(crate) fn scan_video_urls(html: &str) -> Vec<String> {
    let unescaped = html.replace("\\/", "/").replace("\\u002F", "/").replace("&amp;", "&");
    let mut found: Vec<String> = Vec::new();
    for m in VIDEO_URL.find_iter(&unescaped) {
        let url = m.as_str().to_string();
        if !found.contains(&url) {
            found.push(url);
        }
    }
    found
}

/// Variant with the largest `WxH` in its path; first one when none carry a size.
pub(crate) fn best_variant(urls: &[String]) -> Option<String> {
    let mut best: Option<(u64, &String)> = None;
    for url in urls {
        let area = RESOLUTION
            .captures(url)
            .and_then(|c| {
                let w: u64 = c.get(1)?.as_str().parse().ok()?;
                let h: u64 = c.get(2)?.as_str().parse().ok()?;
                Some(w * h)
            })
            .unwrap_or(0);
        if best.map_or(true, |(a, _)| area > a) {
            best = Some((area, url));
        }
    }
    best.map(|(_, url)| url.clone())
}
