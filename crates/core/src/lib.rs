pub mod cache;
pub mod catalog;
pub mod config;
pub mod extractor;
pub mod liveness;
pub mod metrics;
pub mod orchestrator;
pub mod platform;
pub mod testing;

pub use cache::{normalize_url, sanitize, CacheError, CacheStore, FileStats, RepairReport};
pub use catalog::{CacheEntry, CatalogError, CatalogQuery, CatalogStats, JsonCatalog, SortKey};
pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, CacheConfig,
    Config, ConfigError, ExtractorConfig, LivenessConfig, LogFormat, LoggingConfig, ServerConfig,
};
pub use extractor::{
    AttemptFailure, Dispatcher, ExtractionError, ExtractionStrategy, MediaFile, StrategyError,
    StrategyTable,
};
pub use liveness::{LivenessMonitor, LivenessState, LivenessStatus, ShutdownReason};
pub use orchestrator::{DownloadOrchestrator, FetchError, FetchOutcome, OrchestratorStatus};
pub use platform::{classify, Platform};
