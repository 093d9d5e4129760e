//! Strategy table and the fallback loop over it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use url::Url;

use super::archive::ArchiveStrategy;
use super::direct::DirectStrategy;
use super::html5::Html5Strategy;
use super::http::{build_client, is_streaming_only};
use super::traits::ExtractionStrategy;
use super::twitter::TwitterPageStrategy;
use super::types::{AttemptFailure, ExtractionError, MediaFile, StrategyError};
use super::ytdlp::YtDlpStrategy;
use crate::config::ExtractorConfig;
use crate::metrics;
use crate::platform::Platform;

/// Ordered strategy chain per platform.
#[derive(Clone, Default)]
pub struct StrategyTable {
    chains: HashMap<Platform, Vec<Arc<dyn ExtractionStrategy>>>,
}

impl StrategyTable {
    /// Empty table. Platforms without a chain fail with no attempts.
    pub fn new() -> Self {
        Self::default()
    }

    /// The production table.
    pub fn standard(config: &ExtractorConfig) -> Result<Self, StrategyError> {
        let client = build_client(config)?;
        let timeout = Duration::from_secs(config.http_timeout_secs);

        let ytdlp: Arc<dyn ExtractionStrategy> =
            Arc::new(YtDlpStrategy::new(config.ytdlp_path.clone()));
        let html5: Arc<dyn ExtractionStrategy> =
            Arc::new(Html5Strategy::new(client.clone(), timeout));
        let twitter: Arc<dyn ExtractionStrategy> =
            Arc::new(TwitterPageStrategy::new(client.clone(), timeout));
        let archive: Arc<dyn ExtractionStrategy> =
            Arc::new(ArchiveStrategy::new(client.clone(), timeout));
        let direct: Arc<dyn ExtractionStrategy> = Arc::new(DirectStrategy::new(client));

        let mut table = Self::new();
        for platform in Platform::ALL {
            let chain = match platform {
                Platform::Youtube => vec![ytdlp.clone()],
                Platform::Twitter => vec![twitter.clone(), ytdlp.clone()],
                Platform::ArchiveOrg => vec![archive.clone(), ytdlp.clone()],
                Platform::Vimeo => vec![ytdlp.clone(), html5.clone()],
                Platform::Direct => vec![direct.clone()],
                Platform::Generic => vec![ytdlp.clone(), html5.clone()],
            };
            table = table.with_chain(platform, chain);
        }
        Ok(table)
    }

    /// Replace the chain for one platform.
    pub fn with_chain(
        mut self,
        platform: Platform,
        chain: Vec<Arc<dyn ExtractionStrategy>>,
    ) -> Self {
        self.chains.insert(platform, chain);
        self
    }

    pub fn chain(&self, platform: Platform) -> &[Arc<dyn ExtractionStrategy>] {
        self.chains.get(&platform).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Strategy names per platform, for diagnostics.
    pub fn describe(&self) -> Vec<(Platform, Vec<&'static str>)> {
        Platform::ALL
            .into_iter()
            .map(|p| (p, self.chain(p).iter().map(|s| s.name()).collect()))
            .collect()
    }
}

/// Runs a platform's strategy chain until one produces a usable file.
pub struct Dispatcher {
    table: StrategyTable,
    attempt_timeout: Duration,
    min_file_size: u64,
}

impl Dispatcher {
    pub fn new(table: StrategyTable, attempt_timeout: Duration, min_file_size: u64) -> Self {
        Self {
            table,
            attempt_timeout,
            min_file_size,
        }
    }

    pub fn table(&self) -> &StrategyTable {
        &self.table
    }

    /// Extract `url` into `work_dir` using the chain for `platform`.
    ///
    /// Each attempt gets its own subdirectory. On failure the whole work
    /// directory is removed.
    pub async fn extract(
        &self,
        url: &str,
        platform: Platform,
        work_dir: &Path,
    ) -> Result<MediaFile, ExtractionError> {
        let result = self.run_chain(url, platform, work_dir).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %work_dir.display(), error = %e, "Failed to remove work directory");
                }
            }
        }
        result
    }

    async fn run_chain(
        &self,
        url: &str,
        platform: Platform,
        work_dir: &Path,
    ) -> Result<MediaFile, ExtractionError> {
        if is_streaming_only(url) {
            return Err(ExtractionError::UnsupportedUrl(format!(
                "{} is a browser-only stream reference",
                url
            )));
        }
        let parsed = Url::parse(url)
            .map_err(|e| ExtractionError::UnsupportedUrl(format!("{}: {}", url, e)))?;

        let chain: Vec<&Arc<dyn ExtractionStrategy>> = self
            .table
            .chain(platform)
            .iter()
            .filter(|s| {
                let supported = s.supports(&parsed);
                if !supported {
                    debug!(strategy = s.name(), url = %url, "Strategy does not apply");
                    metrics::EXTRACTION_ATTEMPTS
                        .with_label_values(&[s.name(), "skipped"])
                        .inc();
                }
                supported
            })
            .collect();

        if chain.is_empty() {
            return Err(ExtractionError::UnsupportedUrl(format!(
                "no extraction strategy applies to {}",
                url
            )));
        }

        let mut attempts = Vec::with_capacity(chain.len());
        for (index, strategy) in chain.into_iter().enumerate() {
            let name = strategy.name();
            let attempt_dir = work_dir.join(format!("{}-{}", index, name));
            tokio::fs::create_dir_all(&attempt_dir)
                .await
                .map_err(|e| ExtractionError::WorkDir(format!("{}: {}", attempt_dir.display(), e)))?;

            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(self.attempt_timeout, strategy.attempt(&parsed, &attempt_dir))
                    .await
                {
                    Ok(Ok(media)) if media.size < self.min_file_size => Err(StrategyError::TooSmall {
                        size: media.size,
                        min: self.min_file_size,
                    }),
                    Ok(result) => result,
                    Err(_) => Err(StrategyError::Timeout(self.attempt_timeout.as_secs())),
                };

            metrics::EXTRACTION_DURATION
                .with_label_values(&[name])
                .observe(started.elapsed().as_secs_f64());

            match outcome {
                Ok(media) => {
                    metrics::EXTRACTION_ATTEMPTS
                        .with_label_values(&[name, "success"])
                        .inc();
                    info!(strategy = name, url = %url, size = media.size, "Extraction succeeded");
                    return Ok(media);
                }
                Err(e) => {
                    let label = if matches!(e, StrategyError::Timeout(_)) {
                        "timeout"
                    } else {
                        "failure"
                    };
                    metrics::EXTRACTION_ATTEMPTS
                        .with_label_values(&[name, label])
                        .inc();
                    warn!(strategy = name, url = %url, error = %e, "Extraction strategy failed");
                    let _ = tokio::fs::remove_dir_all(&attempt_dir).await;
                    attempts.push(AttemptFailure {
                        strategy: name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(ExtractionError::AllStrategiesFailed {
            url: url.to_string(),
            attempts,
        })
    }
}
