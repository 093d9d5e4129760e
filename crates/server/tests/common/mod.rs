//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock extraction strategy injected, so the whole HTTP surface can
//! be driven without network access or yt-dlp.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use mucache_core::{
    testing::MockStrategy, CacheStore, Config, Dispatcher, DownloadOrchestrator, LivenessConfig,
    LivenessMonitor,
};
use mucache_server::state::AppState;

/// Re-export fixtures for test convenience
pub use mucache_core::testing::fixtures;

/// Minimum file size used by fixtures.
pub const MIN_FILE_SIZE: u64 = 10_000;

/// Test fixture for E2E testing with a mock strategy.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_download() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.get("/api/v1/download?url=https://example.com/a").await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state, for inspecting liveness and the store
    pub state: Arc<AppState>,
    /// Mock strategy serving every platform
    pub strategy: Arc<MockStrategy>,
    /// Cache directory and UI directory live here
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

impl TestFixture {
    /// Create a fixture whose strategy downloads a 20 KB "Test Video".
    pub async fn new() -> Self {
        Self::with_strategy(MockStrategy::succeeding("mock", 20_000, "Test Video")).await
    }

    /// Create a fixture around a custom mock strategy.
    pub async fn with_strategy(strategy: MockStrategy) -> Self {
        let strategy = Arc::new(strategy);
        let dispatcher = fixtures::single_strategy_dispatcher(strategy.clone(), MIN_FILE_SIZE);
        Self::with_dispatcher(dispatcher, strategy).await
    }

    /// Create a fixture with an arbitrary dispatcher. `strategy` is kept only
    /// for inspection.
    pub async fn with_dispatcher(dispatcher: Dispatcher, strategy: Arc<MockStrategy>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache_dir = temp_dir.path().join("cache");
        let ui_dir = temp_dir.path().join("web");
        std::fs::create_dir_all(&ui_dir).expect("Failed to create UI dir");
        std::fs::write(ui_dir.join("player.html"), "<html>player</html>")
            .expect("Failed to write player page");
        std::fs::write(ui_dir.join("app.js"), "console.log('player');")
            .expect("Failed to write script");

        let mut config = Config {
            cache: fixtures::cache_config(&cache_dir),
            liveness: LivenessConfig {
                enabled: false,
                ..LivenessConfig::default()
            },
            ..Config::default()
        };
        config.server.ui_dir = ui_dir;
        config.cache.min_file_size = MIN_FILE_SIZE;

        let store = Arc::new(CacheStore::open(&config.cache).expect("Failed to open cache"));
        let orchestrator = Arc::new(DownloadOrchestrator::new(store, dispatcher));
        let liveness = Arc::new(LivenessMonitor::new(config.liveness.clone()));
        let state = Arc::new(AppState::new(config, orchestrator, liveness));

        let router = mucache_server::api::create_router(state.clone());

        Self {
            router,
            state,
            strategy,
            temp_dir,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.temp_dir.path().join("cache")
    }

    /// Place a file with a recognizable byte pattern in the cache directory.
    pub fn write_cached_file(&self, name: &str, size: usize) -> PathBuf {
        let path = self.cache_dir().join(name);
        let content: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, content).expect("Failed to write cached file");
        path
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, &[]).await
    }

    /// Send a POST request without a body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path, &[]).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, headers).await
    }

    async fn request(&self, method: &str, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }
}

/// Percent-encode a URL for use as a query parameter.
pub fn encode(url: &str) -> String {
    urlencoding::encode(url).into_owned()
}

/// Media files in `dir`, ignoring the catalog and sidecars.
pub fn media_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read cache dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| {
            !n.starts_with('.') && !n.ends_with(".metadata.json") && !n.starts_with("playlist.json")
        })
        .collect();
    names.sort();
    names
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status,
            $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            $response.text()
        );
    };
}
