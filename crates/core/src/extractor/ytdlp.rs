//! yt-dlp strategy: delegates to the external `yt-dlp` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use super::traits::ExtractionStrategy;
use super::types::{MediaFile, StrategyError};
use crate::cache::hash_file;

/// Best video plus best audio, else best single file.
const FORMAT: &str = "bestvideo*+bestaudio/best";
const FORMAT_SORT: &str = "res,br";

/// Fields of yt-dlp's JSON output that we keep.
#[derive(Debug, Default, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    ext: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    upload_date: Option<String>,
    webpage_url: Option<String>,
    extractor: Option<String>,
    url: Option<String>,
}

pub struct YtDlpStrategy {
    binary: String,
}

impl YtDlpStrategy {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn build_args(&self, url: &Url, work_dir: &Path) -> Vec<String> {
        let template = work_dir.join("%(id)s.%(ext)s");
        vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--print-json".to_string(),
            "-f".to_string(),
            FORMAT.to_string(),
            "-S".to_string(),
            FORMAT_SORT.to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl ExtractionStrategy for YtDlpStrategy {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn supports(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    async fn attempt(&self, url: &Url, work_dir: &Path) -> Result<MediaFile, StrategyError> {
        let args = self.build_args(url, work_dir);
        debug!(binary = %self.binary, url = %url, "Running yt-dlp");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StrategyError::Process(format!("{} not found", self.binary))
                } else {
                    StrategyError::Process(format!("failed to run {}: {}", self.binary, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StrategyError::Process(last_error_line(&stderr, output.status.code())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = parse_info(&stdout)?;

        let path = find_output_file(work_dir)
            .await?
            .ok_or_else(|| StrategyError::NoMedia("yt-dlp produced no file".to_string()))?;
        let content_hash = hash_file(&path).await?;

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .or(info.ext.clone());

        let metadata = serde_json::json!({
            "id": info.id,
            "uploader": info.uploader,
            "duration": info.duration,
            "upload_date": info.upload_date,
            "webpage_url": info.webpage_url,
            "extractor": info.extractor,
        });

        let mut media = MediaFile::new(path, self.name())
            .with_content_hash(content_hash)
            .with_metadata(metadata);
        if let Some(title) = info.title {
            media = media.with_title(title);
        }
        if let Some(ext) = extension {
            media = media.with_extension(ext);
        }
        if let Some(media_url) = info.url {
            media = media.with_media_url(media_url);
        }
        Ok(media)
    }
}

/// yt-dlp prints one JSON object per line; the last one describes the download.
fn parse_info(stdout: &str) -> Result<YtDlpInfo, StrategyError> {
    let line = stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with('{'))
        .ok_or_else(|| StrategyError::Parse("yt-dlp printed no JSON".to_string()))?;
    serde_json::from_str(line).map_err(|e| StrategyError::Parse(e.to_string()))
}

fn last_error_line(stderr: &str, code: Option<i32>) -> String {
    let line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output");
    match code {
        Some(code) => format!("yt-dlp exited with {}: {}", code, line),
        None => format!("yt-dlp terminated: {}", line),
    }
}

/// Largest finished file in the work dir (skips `.part`, `.ytdl` and fragments).
async fn find_output_file(work_dir: &Path) -> Result<Option<PathBuf>, StrategyError> {
    let mut best: Option<(u64, PathBuf)> = None;
    let mut dir = tokio::fs::read_dir(work_dir).await?;
    while let Some(item) = dir.next_entry().await? {
        let path = item.path();
        let name = item.file_name().to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".part") || name.ends_with(".ytdl") || name.contains(".part-frag") {
            continue;
        }
        let meta = item.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        if best.as_ref().map_or(true, |(size, _)| meta.len() > *size) {
            best = Some((meta.len(), path));
        }
    }
    Ok(best.map(|(_, path)| path))
}
