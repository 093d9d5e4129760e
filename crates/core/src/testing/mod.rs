//! Testing utilities and mock implementations.
//!
//! `MockStrategy` stands in for network-backed extraction strategies so the
//! dispatcher, orchestrator and HTTP API can be exercised offline.
//!
//! # Example
//!
//! ```rust,ignore
//! use mucache_core::testing::{fixtures, MockStrategy};
//!
//! let dir = tempfile::TempDir::new()?;
//! let store = CacheStore::open(&fixtures::cache_config(dir.path()))?;
//! let strategy = Arc::new(MockStrategy::succeeding("mock", 20_000, "Clip"));
//! ```

mod mock_strategy;

pub use mock_strategy::MockStrategy;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::CacheConfig;
    use crate::extractor::{Dispatcher, ExtractionStrategy, StrategyTable};
    use crate::platform::Platform;

    /// Cache config rooted at `dir` with default limits.
    pub fn cache_config(dir: &Path) -> CacheConfig {
        CacheConfig {
            dir: dir.to_path_buf(),
            catalog_file: "playlist.json".to_string(),
            ..CacheConfig::default()
        }
    }

    /// Write a file of `size` zero bytes at `dir/name`.
    pub fn write_media(dir: &Path, name: &str, size: usize) -> PathBuf {
        std::fs::create_dir_all(dir).expect("create media dir");
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; size]).expect("write media file");
        path
    }

    /// Dispatcher using `strategy` for every platform.
    pub fn single_strategy_dispatcher(
        strategy: Arc<dyn ExtractionStrategy>,
        min_file_size: u64,
    ) -> Dispatcher {
        let table = Platform::ALL.into_iter().fold(StrategyTable::new(), |table, p| {
            table.with_chain(p, vec![strategy.clone()])
        });
        Dispatcher::new(table, Duration::from_secs(30), min_file_size)
    }
}
