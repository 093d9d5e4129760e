use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use mucache_core::{
    CacheStore, Config, Dispatcher, DownloadOrchestrator, LivenessMonitor, StrategyTable,
};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<DownloadOrchestrator>,
    liveness: Arc<LivenessMonitor>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<DownloadOrchestrator>,
        liveness: Arc<LivenessMonitor>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            liveness,
        }
    }

    /// Open the cache and build the production strategy table.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store = CacheStore::open(&config.cache).with_context(|| {
            format!(
                "Failed to open cache directory {:?}",
                config.cache.resolved_dir()
            )
        })?;
        let store = Arc::new(store);

        let table = StrategyTable::standard(&config.extractor)
            .context("Failed to build extraction strategies")?;
        for (platform, chain) in table.describe() {
            info!("Strategy chain for {}: {}", platform, chain.join(" -> "));
        }
        let dispatcher = Dispatcher::new(
            table,
            Duration::from_secs(config.extractor.attempt_timeout_secs),
            config.cache.min_file_size,
        );

        let orchestrator = Arc::new(DownloadOrchestrator::new(store, dispatcher));
        let report = orchestrator
            .repair()
            .await
            .context("Failed to repair catalog")?;
        if report.changed() {
            info!(
                "Catalog repaired: {} fixed, {} dropped, {} adopted",
                report.fixed.len(),
                report.dropped.len(),
                report.adopted.len()
            );
        }

        let liveness = Arc::new(LivenessMonitor::new(config.liveness.clone()));
        Ok(Self::new(config, orchestrator, liveness))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &DownloadOrchestrator {
        &self.orchestrator
    }

    pub fn store(&self) -> &CacheStore {
        self.orchestrator.store()
    }

    pub fn liveness(&self) -> &Arc<LivenessMonitor> {
        &self.liveness
    }
}
