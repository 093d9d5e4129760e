//! Canonical form of source URLs, used as the cache key.

use url::Url;

use super::CacheError;
use crate::platform::host_matches;

const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "igshid", "si", "feature", "ref_src", "ref_url",
];
const TWITTER_TRACKING_PARAMS: &[&str] = &["s", "t"];
const HTTPS_HOSTS: &[&str] = &["youtube.com", "twitter.com", "archive.org", "vimeo.com"];

/// Normalize a source URL so equivalent links map to one cache entry.
pub fn normalize_url(raw: &str) -> Result<String, CacheError> {
    let trimmed = raw.trim();
    let mut url =
        Url::parse(trimmed).map_err(|e| CacheError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CacheError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| CacheError::InvalidUrl(format!("{}: missing host", trimmed)))?
        .to_ascii_lowercase();
    let host = canonical_host(&host);
    url.set_host(Some(&host))
        .map_err(|e| CacheError::InvalidUrl(e.to_string()))?;

    rewrite_youtube(&mut url, &host);

    // default ports are already dropped by the parser
    url.set_fragment(None);

    let is_twitter = host == "twitter.com";
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k, is_twitter))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    if host_matches(&host, HTTPS_HOSTS) && url.scheme() == "http" {
        let _ = url.set_scheme("https");
    }

    Ok(url.to_string())
}

fn canonical_host(host: &str) -> String {
    let stripped = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);
    match stripped {
        "x.com" | "mobile.twitter.com" => "twitter.com".to_string(),
        other => other.to_string(),
    }
}

fn rewrite_youtube(url: &mut Url, host: &str) {
    let id = if host == "youtu.be" {
        url.path_segments()
            .and_then(|mut s| s.next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    } else if host == "youtube.com" {
        let mut segments = url.path_segments().into_iter().flatten();
        match (segments.next(), segments.next()) {
            (Some("shorts"), Some(id)) if !id.is_empty() => Some(id.to_string()),
            _ => None,
        }
    } else {
        None
    };

    if let Some(id) = id {
        let rest: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "v")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let _ = url.set_host(Some("youtube.com"));
        url.set_path("/watch");
        url.query_pairs_mut()
            .clear()
            .append_pair("v", &id)
            .extend_pairs(rest.iter());
    }
}

fn is_tracking_param(key: &str, is_twitter: bool) -> bool {
    key.starts_with("utm_")
        || TRACKING_PARAMS.contains(&key)
        || (is_twitter && TWITTER_TRACKING_PARAMS.contains(&key))
}
