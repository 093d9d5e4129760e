//! Generic HTML5 strategy: find `<video>` sources on a page.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::http::{download_to_file, fetch_text, is_manifest, is_streaming_only, media_extension};
use super::traits::ExtractionStrategy;
use super::types::{MediaFile, StrategyError};

static VIDEO_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<video\b([^>]*)>").expect("valid video regex"));
static VIDEO_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</video\s*>").expect("valid closing video regex"));
static SOURCE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<source\b([^>]*)>").expect("valid source regex"));
static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<meta\b([^>]*)>").expect("valid meta regex"));
static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid attribute regex")
});
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid number regex"));

const QUALITY_ATTRS: &[&str] = &["res", "size", "label", "data-quality", "title"];
const OG_VIDEO_PROPERTIES: &[&str] = &["og:video", "og:video:url", "og:video:secure_url"];

/// A media URL found on the page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Source {
    pub url: Url,
    pub quality: Option<u64>,
}

pub struct Html5Strategy {
    client: Client,
    timeout: Duration,
}

impl Html5Strategy {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ExtractionStrategy for Html5Strategy {
    fn name(&self) -> &'static str {
        "html5"
    }

    fn supports(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn attempt(&self, url: &Url, work_dir: &Path) -> Result<MediaFile, StrategyError> {
        let (html, final_url) = fetch_text(&self.client, url.as_str(), self.timeout).await?;

        let sources = find_sources(&html, &final_url);
        let source = pick_best(&sources)
            .ok_or_else(|| StrategyError::NoMedia("no <video> sources on page".to_string()))?;
        debug!(page = %url, source = %source.url, candidates = sources.len(), "Selected HTML5 source");

        let path = work_dir.join("download");
        let downloaded =
            download_to_file(&self.client, source.url.as_str(), &path, Some(final_url.as_str()))
                .await?;

        let mut media = MediaFile::new(path, self.name())
            .with_media_url(source.url.as_str())
            .with_content_hash(downloaded.sha256)
            .with_metadata(serde_json::json!({ "page_url": url.as_str() }));
        if let Some(title) = page_title(&html) {
            media = media.with_title(title);
        }
        if let Some(ext) = media_extension(source.url.as_str(), downloaded.content_type.as_deref()) {
            media = media.with_extension(ext);
        }
        Ok(media)
    }
}

/// Video candidates in document order: each `<video src>` followed by its
/// `<source>` children, then `og:video` meta tags.
pub(crate) fn find_sources(html: &str, base: &Url) -> Vec<Source> {
    let mut found: Vec<Source> = Vec::new();

    for open in VIDEO_OPEN.captures_iter(html) {
        let (Some(whole), Some(attrs)) = (open.get(0), open.get(1)) else {
            continue;
        };
        let attrs = parse_attributes(attrs.as_str());
        if let Some(src) = attrs.get("src") {
            push_source(&mut found, base, src, quality_hint(&attrs));
        }

        let rest = &html[whole.end()..];
        let body_end = VIDEO_CLOSE.find(rest).map(|m| m.start()).unwrap_or(rest.len());
        for source in SOURCE_TAG.captures_iter(&rest[..body_end]) {
            let Some(attrs) = source.get(1) else {
                continue;
            };
            let attrs = parse_attributes(attrs.as_str());
            if let Some(src) = attrs.get("src") {
                push_source(&mut found, base, src, quality_hint(&attrs));
            }
        }
    }

    for meta in META_TAG.captures_iter(html) {
        let Some(attrs) = meta.get(1) else {
            continue;
        };
        let attrs = parse_attributes(attrs.as_str());
        let property = attrs
            .get("property")
            .or_else(|| attrs.get("name"))
            .map(|p| p.to_ascii_lowercase());
        if property.is_some_and(|p| OG_VIDEO_PROPERTIES.contains(&p.as_str())) {
            if let Some(content) = attrs.get("content") {
                push_source(&mut found, base, content, None);
            }
        }
    }

    found
}

fn push_source(found: &mut Vec<Source>, base: &Url, raw: &str, quality: Option<u64>) {
    let raw = raw.trim();
    if raw.is_empty() || is_streaming_only(raw) {
        return;
    }
    let Ok(url) = base.join(raw) else {
        return;
    };
    if !matches!(url.scheme(), "http" | "https") || is_manifest(&url) {
        return;
    }
    if found.iter().any(|s| s.url == url) {
        return;
    }
    found.push(Source { url, quality });
}

/// Highest quality hint; the first declared source when none carry a hint.
pub(crate) fn pick_best(sources: &[Source]) -> Option<&Source> {
    let mut best: Option<&Source> = None;
    for source in sources {
        best = match best {
            None => Some(source),
            Some(current) if source.quality.unwrap_or(0) > current.quality.unwrap_or(0) => {
                Some(source)
            }
            keep => keep,
        };
    }
    best
}

fn quality_hint(attrs: &HashMap<String, String>) -> Option<u64> {
    QUALITY_ATTRS
        .iter()
        .filter_map(|name| attrs.get(*name))
        .flat_map(|value| NUMBER.find_iter(value).filter_map(|m| m.as_str().parse().ok()))
        .max()
}

fn parse_attributes(raw: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|c| {
            let name = c.get(1)?.as_str().to_ascii_lowercase();
            let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4))?;
            Some((name, decode_entities(value.as_str())))
        })
        .collect()
}

/// `og:title`, else the `<title>` element.
pub(crate) fn page_title(html: &str) -> Option<String> {
    let og_title = META_TAG.captures_iter(html).find_map(|meta| {
        let attrs = parse_attributes(meta.get(1)?.as_str());
        let property = attrs.get("property").or_else(|| attrs.get("name"))?;
        if property.eq_ignore_ascii_case("og:title") {
            attrs.get("content").cloned()
        } else {
            None
        }
    });

    og_title
        .or_else(|| {
            TITLE_TAG
                .captures(html)
                .and_then(|c| c.get(1))
                .map(|m| decode_entities(m.as_str()))
        })
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
