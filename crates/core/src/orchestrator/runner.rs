//! Download orchestrator implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, RepairReport};
use crate::catalog::{CacheEntry, CatalogQuery, CatalogStats};
use crate::extractor::http::is_streaming_only;
use crate::extractor::Dispatcher;
use crate::metrics;
use crate::platform::classify;

use super::types::{FetchError, FetchOutcome, OrchestratorStatus};

type SlotMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Holds a per-URL slot; removes it from the map when the last holder leaves.
struct Slot {
    slots: Arc<SlotMap>,
    key: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Slot {
    /// Wait until no other holder is downloading this URL.
    async fn lock(&mut self) {
        self.guard = Some(self.lock.clone().lock_owned().await);
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        // The guard keeps its own reference to the lock.
        self.guard.take();
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus ours.
        if Arc::strong_count(&self.lock) == 2 {
            slots.remove(&self.key);
        }
    }
}

/// Tracks the downloads-in-flight gauge for the lifetime of one download.
struct InFlight;

impl InFlight {
    fn start() -> Self {
        metrics::DOWNLOADS_IN_FLIGHT.inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        metrics::DOWNLOADS_IN_FLIGHT.dec();
    }
}

/// Turns URLs into cache entries, downloading at most once per URL.
pub struct DownloadOrchestrator {
    store: Arc<CacheStore>,
    dispatcher: Arc<Dispatcher>,
    slots: Arc<SlotMap>,
}

impl DownloadOrchestrator {
    pub fn new(store: Arc<CacheStore>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher: Arc::new(dispatcher),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Return the cached entry for `url`, downloading it first if needed.
    ///
    /// Concurrent calls for the same normalized URL share one download: the
    /// first caller extracts, the rest wait and then read the cache. If the
    /// first caller fails, the next waiter makes its own attempt.
    ///
    /// The download runs on its own task. Dropping the returned future stops
    /// the wait but not the download, which still lands in the cache.
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        if is_streaming_only(url) {
            return Err(FetchError::Unsupported(format!(
                "{} is a browser-only stream reference",
                url.trim()
            )));
        }
        let key = CacheStore::key(url)?;

        if let Some(entry) = self.lookup(&key).await? {
            metrics::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
            debug!(url = %key, filename = %entry.filename, "Cache hit");
            return Ok(FetchOutcome {
                entry,
                from_cache: true,
            });
        }
        metrics::CACHE_LOOKUPS.with_label_values(&["miss"]).inc();

        let mut slot = self.acquire_slot(&key);
        slot.lock().await;

        // Another caller may have finished while we waited.
        if let Some(entry) = self.lookup(&key).await? {
            debug!(url = %key, "Served by concurrent download");
            return Ok(FetchOutcome {
                entry,
                from_cache: true,
            });
        }

        let store = Arc::clone(&self.store);
        let dispatcher = Arc::clone(&self.dispatcher);
        let task = tokio::spawn(async move {
            let _slot = slot;
            download(&store, &dispatcher, &key).await
        });
        let entry = task
            .await
            .map_err(|e| FetchError::Internal(e.to_string()))??;
        Ok(FetchOutcome {
            entry,
            from_cache: false,
        })
    }

    /// Catalog lookup on the blocking pool; it stats the file and may
    /// rewrite the catalog.
    async fn lookup(&self, key: &str) -> Result<Option<CacheEntry>, FetchError> {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.lookup(&key))
            .await
            .map_err(|e| FetchError::Internal(e.to_string()))?
            .map_err(FetchError::from)
    }

    fn acquire_slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        Slot {
            slots: Arc::clone(&self.slots),
            key: key.to_string(),
            lock,
            guard: None,
        }
    }

    /// URLs with a download running or callers waiting on one.
    pub fn in_flight_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            in_flight: self.in_flight_count(),
            catalog_entries: self.store.catalog().len(),
        }
    }

    /// Remove the entry for `url`. Returns `false` if it was not cached.
    pub fn remove(&self, url: &str) -> Result<bool, FetchError> {
        let key = CacheStore::key(url)?;
        Ok(self.store.remove(&key)?)
    }

    pub fn list(&self, query: &CatalogQuery) -> Result<Vec<CacheEntry>, FetchError> {
        Ok(self.store.list(query)?)
    }

    pub fn stats(&self) -> Result<CatalogStats, FetchError> {
        Ok(self.store.stats()?)
    }

    pub async fn repair(&self) -> Result<RepairReport, FetchError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.repair())
            .await
            .map_err(|e| FetchError::Internal(e.to_string()))?
            .map_err(FetchError::from)
    }
}

/// Extract `key` and move the result into the cache.
async fn download(
    store: &Arc<CacheStore>,
    dispatcher: &Dispatcher,
    key: &str,
) -> Result<CacheEntry, FetchError> {
    let _in_flight = InFlight::start();
    let platform = classify(key);
    info!(url = %key, platform = %platform, "Downloading");

    let work_dir = store.create_work_dir()?;
    let media = match dispatcher.extract(key, platform, &work_dir).await {
        Ok(media) => media,
        Err(e) => {
            metrics::DOWNLOADS
                .with_label_values(&[platform.as_str(), "failed"])
                .inc();
            warn!(url = %key, error = %e, attempts = e.attempts().len(), "Download failed");
            return Err(e.into());
        }
    };

    let put_store = Arc::clone(store);
    let put_key = key.to_string();
    let put_work_dir = work_dir.clone();
    let stored = tokio::task::spawn_blocking(move || {
        let result = put_store.put(&put_key, &media, platform);
        put_store.discard_work_dir(&put_work_dir);
        result
    })
    .await;

    let entry = match stored {
        Ok(Ok(entry)) => entry,
        Ok(Err(e)) => {
            metrics::DOWNLOADS
                .with_label_values(&[platform.as_str(), "failed"])
                .inc();
            warn!(url = %key, error = %e, "Failed to store download");
            return Err(e.into());
        }
        Err(e) => {
            store.discard_work_dir(&work_dir);
            return Err(FetchError::Internal(e.to_string()));
        }
    };

    metrics::DOWNLOADS
        .with_label_values(&[platform.as_str(), "success"])
        .inc();
    metrics::BYTES_CACHED.inc_by(entry.file_size);
    info!(
        url = %key,
        filename = %entry.filename,
        size = entry.file_size,
        "Download cached"
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractionStrategy, StrategyTable};
    use crate::platform::Platform;
    use crate::testing::fixtures::{cache_config, single_strategy_dispatcher};
    use crate::testing::MockStrategy;
    use tempfile::TempDir;

    fn orchestrator(dir: &TempDir, strategy: Arc<dyn ExtractionStrategy>) -> DownloadOrchestrator {
        let store = Arc::new(CacheStore::open(&cache_config(dir.path())).unwrap());
        DownloadOrchestrator::new(store, single_strategy_dispatcher(strategy, 10_000))
    }

    #[tokio::test]
    async fn test_fetch_downloads_then_hits_cache() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockStrategy::succeeding("mock", 20_000, "First Clip"));
        let orch = orchestrator(&dir, mock.clone());

        let first = orch.fetch("https://example.com/video-a").await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.entry.filename, "First Clip.mp4");
        assert_eq!(first.entry.platform, Platform::Generic);

        let second = orch.fetch("https://example.com/video-a/").await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.entry.filename, first.entry.filename);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(orch.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, Arc::new(MockStrategy::succeeding("mock", 20_000, "x")));
        let err = orch.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_fetch_browser_stream_reference_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockStrategy::succeeding("mock", 20_000, "x"));
        let orch = orchestrator(&dir, mock.clone());

        for url in [
            "blob:https://example.com/1234",
            "mediastream:abcd",
            "data:video/mp4;base64,AAAA",
        ] {
            let err = orch.fetch(url).await.unwrap_err();
            assert!(matches!(err, FetchError::Unsupported(_)), "{url}: {err:?}");
        }
        assert_eq!(mock.call_count(), 0);
        assert_eq!(orch.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_entry_or_work_dir() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, Arc::new(MockStrategy::failing("mock", "nothing here")));

        let err = orch.fetch("https://example.com/nothing").await.unwrap_err();
        match err {
            FetchError::Extraction(e) => assert_eq!(e.attempts().len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(orch.list(&CatalogQuery::default()).unwrap().is_empty());
        let partial = dir.path().join(crate::cache::PARTIAL_DIR);
        let leftovers = std::fs::read_dir(&partial).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
        assert_eq!(orch.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_unsupported_when_no_strategy_applies() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::open(&cache_config(dir.path())).unwrap());
        let dispatcher = Dispatcher::new(StrategyTable::new(), std::time::Duration::from_secs(5), 1);
        let orch = DownloadOrchestrator::new(store, dispatcher);

        let err = orch.fetch("https://example.com/page").await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_fetch_drops_entry_whose_file_vanished() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockStrategy::succeeding("mock", 20_000, "Gone"));
        let orch = orchestrator(&dir, mock.clone());

        let first = orch.fetch("https://example.com/gone").await.unwrap();
        std::fs::remove_file(dir.path().join(&first.entry.filename)).unwrap();

        let again = orch.fetch("https://example.com/gone").await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(mock.call_count(), 2);
        assert!(dir.path().join(&again.entry.filename).is_file());
    }

    #[tokio::test]
    async fn test_remove_then_fetch_downloads_again() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockStrategy::succeeding("mock", 20_000, "Clip"));
        let orch = orchestrator(&dir, mock.clone());

        orch.fetch("https://example.com/v").await.unwrap();
        assert!(orch.remove("https://example.com/v").unwrap());
        assert!(!orch.remove("https://example.com/v").unwrap());

        let again = orch.fetch("https://example.com/v").await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(mock.call_count(), 2);
    }
}
