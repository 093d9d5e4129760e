//! Mock extraction strategy for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::extractor::{ExtractionStrategy, MediaFile, StrategyError};

/// What the mock does on each attempt.
#[derive(Debug, Clone)]
enum Behavior {
    Succeed { size: u64, title: String },
    Fail(String),
}

/// Mock implementation of the ExtractionStrategy trait.
///
/// Provides controllable behavior for testing:
/// - Write a file of a given size or fail with a reason, scripted per call
/// - Simulate slow attempts
/// - Count attempts and record requested URLs
///
/// # Example
///
/// ```rust,ignore
/// use mucache_core::testing::MockStrategy;
///
/// let strategy = Arc::new(MockStrategy::succeeding("mock", 20_000, "Clip"));
/// let table = StrategyTable::new().with_chain(Platform::Generic, vec![strategy.clone()]);
///
/// // ... run a fetch ...
/// assert_eq!(strategy.call_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockStrategy {
    name: &'static str,
    /// Behavior per call; the last one repeats.
    script: Vec<Behavior>,
    supported: bool,
    delay: Option<Duration>,
    extension: String,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockStrategy {
    /// A strategy that writes `size` bytes and reports `title`.
    pub fn succeeding(name: &'static str, size: u64, title: &str) -> Self {
        Self::with_behavior(
            name,
            Behavior::Succeed {
                size,
                title: title.to_string(),
            },
        )
    }

    /// A strategy that always fails with `reason`.
    pub fn failing(name: &'static str, reason: &str) -> Self {
        Self::with_behavior(name, Behavior::Fail(reason.to_string()))
    }

    fn with_behavior(name: &'static str, behavior: Behavior) -> Self {
        Self {
            name,
            script: vec![behavior],
            supported: true,
            delay: None,
            extension: "mp4".to_string(),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// After the calls scripted so far, succeed.
    pub fn then_succeeding(mut self, size: u64, title: &str) -> Self {
        self.script.push(Behavior::Succeed {
            size,
            title: title.to_string(),
        });
        self
    }

    /// After the calls scripted so far, fail.
    pub fn then_failing(mut self, reason: &str) -> Self {
        self.script.push(Behavior::Fail(reason.to_string()));
        self
    }

    /// Report every URL as unsupported.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Sleep before producing a result.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.extension = ext.to_string();
        self
    }

    /// Number of attempts made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs passed to `attempt`, in call order.
    pub fn recorded_urls(&self) -> Vec<String> {
        self.urls.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ExtractionStrategy for MockStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, _url: &Url) -> bool {
        self.supported
    }

    async fn attempt(&self, url: &Url, work_dir: &Path) -> Result<MediaFile, StrategyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let behavior = &self.script[call.min(self.script.len() - 1)];
        match behavior {
            Behavior::Fail(reason) => Err(StrategyError::NoMedia(reason.clone())),
            Behavior::Succeed { size, title } => {
                let path = work_dir.join(format!("mock.{}", self.extension));
                tokio::fs::write(&path, vec![0u8; *size as usize]).await?;
                Ok(MediaFile::new(path, self.name)
                    .with_title(title.clone())
                    .with_extension(self.extension.clone())
                    .with_media_url(url.as_str())
                    .with_metadata(serde_json::json!({ "mock": true })))
            }
        }
    }
}
