use std::path::Path;

use async_trait::async_trait;
use url::Url;

use super::types::{MediaFile, StrategyError};

/// One way of turning a URL into a playable file on disk.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Short stable name used in logs, metrics and error reports.
    fn name(&self) -> &'static str;

    /// Cheap prefilter. Strategies returning false are skipped without an attempt.
    fn supports(&self, url: &Url) -> bool;

    /// Fetch the media into `work_dir`.
    ///
    /// Implementations must write only inside `work_dir`.
    async fn attempt(&self, url: &Url, work_dir: &Path) -> Result<MediaFile, StrategyError>;
}
