//! HTTP API integration tests.
//!
//! Every test drives the in-process router with a mock extraction strategy.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{encode, media_files, TestFixture};
use mucache_core::testing::MockStrategy;

const VIDEO_URL: &str = "https://example.com/video-a";

// =============================================================================
// Health, config, metrics
// =============================================================================

#[tokio::test]
async fn test_health_reports_liveness_and_downloads() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["liveness"]["state"], "active");
    assert_eq!(response.body["liveness"]["watchdog_enabled"], false);
    assert_eq!(response.body["downloads"]["in_flight"], 0);
    assert_eq!(response.body["downloads"]["catalog_entries"], 0);
}

#[tokio::test]
async fn test_config_endpoint_returns_effective_config() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["cache"]["catalog_file"], "playlist.json");
    assert_eq!(response.body["cache"]["min_file_size"], 10_000);
    assert_eq!(response.body["liveness"]["enabled"], false);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_prometheus_text() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;

    assert_status!(response, StatusCode::OK);
    assert!(response
        .header("content-type")
        .unwrap_or_default()
        .starts_with("text/plain"));
    let text = response.text();
    assert!(text.contains("mucache_http_requests_total"));
    assert!(text.contains("mucache_catalog_entries"));
}

// =============================================================================
// Download
// =============================================================================

#[tokio::test]
async fn test_download_then_cache_hit() {
    let fixture = TestFixture::new().await;
    let path = format!("/api/v1/download?url={}", encode(VIDEO_URL));

    let first = fixture.get(&path).await;
    assert_status!(first, StatusCode::OK);
    assert_eq!(first.body["success"], true);
    assert_eq!(first.body["fromCache"], false);
    assert_eq!(first.body["filename"], "Test Video.mp4");
    assert_eq!(first.body["title"], "Test Video");
    assert_eq!(first.body["platform"], "generic");
    assert_eq!(first.body["source_url"], VIDEO_URL);

    let second = fixture.post(&path).await;
    assert_status!(second, StatusCode::OK);
    assert_eq!(second.body["fromCache"], true);
    assert_eq!(second.body["filename"], "Test Video.mp4");

    assert_eq!(fixture.strategy.call_count(), 1);
    assert_eq!(media_files(&fixture.cache_dir()), vec!["Test Video.mp4"]);
}

#[tokio::test]
async fn test_download_compat_alias() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .get(&format!("/download?url={}", encode(VIDEO_URL)))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["fromCache"], false);
}

#[tokio::test]
async fn test_download_missing_url_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/download").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "invalid_url");
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_download_invalid_url_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .get(&format!("/api/v1/download?url={}", encode("ftp://example.com/a")))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "invalid_url");
    assert_eq!(fixture.strategy.call_count(), 0);
}

#[tokio::test]
async fn test_download_unsupported_url() {
    let fixture =
        TestFixture::with_strategy(MockStrategy::succeeding("mock", 20_000, "x").unsupported())
            .await;

    let response = fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "unsupported_url");
}

#[tokio::test]
async fn test_download_browser_stream_reference() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .get(&format!(
            "/api/v1/download?url={}",
            encode("blob:https://example.com/1234")
        ))
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "unsupported_url");
    assert_eq!(fixture.strategy.call_count(), 0);
}

#[tokio::test]
async fn test_download_failure_reports_attempts() {
    let fixture =
        TestFixture::with_strategy(MockStrategy::failing("mock", "nothing to see")).await;

    let response = fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert_eq!(response.body["error"], "extraction_failed");
    let attempts = response.body["details"].as_array().unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0]["strategy"], "mock");
    assert!(attempts[0]["reason"]
        .as_str()
        .unwrap()
        .contains("nothing to see"));

    assert!(media_files(&fixture.cache_dir()).is_empty());
    let catalog = fixture.get("/api/v1/catalog").await;
    assert_eq!(catalog.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_download_too_small_fails() {
    let fixture = TestFixture::with_strategy(MockStrategy::succeeding("mock", 500, "Tiny")).await;

    let response = fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    assert_status!(response, StatusCode::BAD_GATEWAY);
    assert!(media_files(&fixture.cache_dir()).is_empty());
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_lists_downloads_with_url() {
    let fixture = TestFixture::new().await;
    fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    let response = fixture.get("/api/v1/catalog").await;

    assert_status!(response, StatusCode::OK);
    let entries = response.body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["filename"], "Test Video.mp4");
    assert_eq!(entries[0]["url"], VIDEO_URL);
    assert_eq!(entries[0]["source_url"], VIDEO_URL);
    assert_eq!(entries[0]["file_size"], 20_000);

    let playlist = fixture.get("/playlist").await;
    assert_status!(playlist, StatusCode::OK);
    assert_eq!(playlist.body, response.body);
}

#[tokio::test]
async fn test_catalog_filters_and_limits() {
    let fixture = TestFixture::with_strategy(
        MockStrategy::succeeding("mock", 20_000, "Beta")
            .then_succeeding(30_000, "Alpha")
            .then_succeeding(25_000, "Gamma"),
    )
    .await;
    for url in [
        "https://example.com/b",
        "https://example.com/a",
        "https://example.com/g",
    ] {
        let response = fixture
            .get(&format!("/api/v1/download?url={}", encode(url)))
            .await;
        assert_status!(response, StatusCode::OK);
    }

    let by_title = fixture.get("/api/v1/catalog").await;
    let titles: Vec<&str> = by_title
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Alpha", "Beta", "Gamma"]);

    let by_size = fixture.get("/api/v1/catalog?sort=size&limit=2").await;
    let sizes: Vec<u64> = by_size
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["file_size"].as_u64().unwrap())
        .collect();
    assert_eq!(sizes, vec![30_000, 25_000]);

    let search = fixture.get("/api/v1/catalog?search=gam").await;
    assert_eq!(search.body.as_array().unwrap().len(), 1);
    assert_eq!(search.body[0]["title"], "Gamma");

    let other_platform = fixture.get("/api/v1/catalog?platform=youtube").await;
    assert_eq!(other_platform.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_catalog_rejects_unknown_sort() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/catalog?sort=random").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "invalid_query");
}

#[tokio::test]
async fn test_catalog_hides_entries_whose_file_is_gone() {
    let fixture = TestFixture::new().await;
    fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;
    std::fs::remove_file(fixture.cache_dir().join("Test Video.mp4")).unwrap();

    let response = fixture.get("/api/v1/catalog").await;

    assert_eq!(response.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_catalog_stats() {
    let fixture = TestFixture::new().await;
    fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    let response = fixture.get("/api/v1/catalog/stats").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total_entries"], 1);
    assert_eq!(response.body["total_bytes"], 20_000);
    assert_eq!(response.body["by_platform"]["generic"], 1);
}

#[tokio::test]
async fn test_repair_endpoint_reports_orphans() {
    let fixture = TestFixture::new().await;
    fixture.write_cached_file("stray.webm", 12_000);

    let response = fixture.post("/api/v1/catalog/repair").await;

    assert_status!(response, StatusCode::OK);
    let orphans = response.body["orphans"].as_array().unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0], "stray.webm");
}

// =============================================================================
// File stats
// =============================================================================

#[tokio::test]
async fn test_file_stats_includes_sidecar_metadata() {
    let fixture = TestFixture::new().await;
    fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    let response = fixture
        .get(&format!("/filestats?filename={}", encode("Test Video.mp4")))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["size"], 20_000);
    assert_eq!(response.body["enhanced_metadata"]["source_url"], VIDEO_URL);
    assert_eq!(response.body["enhanced_metadata"]["strategy"], "mock");
}

#[tokio::test]
async fn test_file_stats_errors() {
    let fixture = TestFixture::new().await;

    let missing_param = fixture.get("/api/v1/filestats").await;
    assert_status!(missing_param, StatusCode::BAD_REQUEST);
    assert_eq!(missing_param.body["error"], "invalid_filename");

    let traversal = fixture
        .get(&format!("/api/v1/filestats?filename={}", encode("../etc/passwd")))
        .await;
    assert_status!(traversal, StatusCode::BAD_REQUEST);

    let missing_file = fixture.get("/api/v1/filestats?filename=nope.mp4").await;
    assert_status!(missing_file, StatusCode::NOT_FOUND);
    assert_eq!(missing_file.body["error"], "not_found");
}

// =============================================================================
// Remove
// =============================================================================

#[tokio::test]
async fn test_remove_deletes_file_and_entry() {
    let fixture = TestFixture::new().await;
    fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    let response = fixture
        .post(&format!("/remove?url={}", encode(VIDEO_URL)))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert!(media_files(&fixture.cache_dir()).is_empty());
    assert!(!fixture
        .cache_dir()
        .join("Test Video.mp4.metadata.json")
        .exists());

    let again = fixture
        .post(&format!("/api/v1/remove?url={}", encode(VIDEO_URL)))
        .await;
    assert_status!(again, StatusCode::NOT_FOUND);
}

// =============================================================================
// Media streaming
// =============================================================================

#[tokio::test]
async fn test_stream_full_file() {
    let fixture = TestFixture::new().await;
    fixture.write_cached_file("clip.mp4", 4096);

    let response = fixture.get("/media/clip.mp4").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.bytes.len(), 4096);
    assert_eq!(response.header("accept-ranges"), Some("bytes"));
    assert_eq!(response.header("content-type"), Some("video/mp4"));
    assert_eq!(response.header("content-length"), Some("4096"));
}

#[tokio::test]
async fn test_stream_partial_range() {
    let fixture = TestFixture::new().await;
    let path = fixture.write_cached_file("clip.mp4", 4096);
    let content = std::fs::read(path).unwrap();

    let response = fixture
        .get_with_headers("/media/clip.mp4", &[("range", "bytes=100-199")])
        .await;

    assert_status!(response, StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.header("content-range"), Some("bytes 100-199/4096"));
    assert_eq!(response.header("content-length"), Some("100"));
    assert_eq!(response.bytes, content[100..200].to_vec());
}

#[tokio::test]
async fn test_stream_not_blocked_by_slow_download() {
    let fixture = TestFixture::with_strategy(
        MockStrategy::succeeding("mock", 20_000, "Slow Clip").with_delay(Duration::from_millis(500)),
    )
    .await;
    let path = fixture.write_cached_file("clip.mp4", 4096);
    let content = std::fs::read(path).unwrap();

    let download_path = format!("/api/v1/download?url={}", encode(VIDEO_URL));
    let download = fixture.get(&download_path);
    tokio::pin!(download);

    let streamed = tokio::select! {
        biased;
        response = &mut download => panic!("download finished first: {}", response.status),
        response = fixture.get_with_headers("/media/clip.mp4", &[("range", "bytes=0-99")]) => response,
    };

    assert_status!(streamed, StatusCode::PARTIAL_CONTENT);
    assert_eq!(streamed.bytes, content[..100].to_vec());

    let downloaded = download.await;
    assert_status!(downloaded, StatusCode::OK);
    assert_eq!(downloaded.body["filename"], "Slow Clip.mp4");
    assert_eq!(fixture.state.orchestrator().in_flight_count(), 0);
}

#[tokio::test]
async fn test_stream_suffix_range_on_compat_path() {
    let fixture = TestFixture::new().await;
    let path = fixture.write_cached_file("clip.webm", 1000);
    let content = std::fs::read(path).unwrap();

    let response = fixture
        .get_with_headers("/mucache/clip.webm", &[("range", "bytes=-10")])
        .await;

    assert_status!(response, StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.header("content-range"), Some("bytes 990-999/1000"));
    assert_eq!(response.bytes, content[990..].to_vec());
}

#[tokio::test]
async fn test_stream_unsatisfiable_range() {
    let fixture = TestFixture::new().await;
    fixture.write_cached_file("clip.mp4", 1000);

    let response = fixture
        .get_with_headers("/media/clip.mp4", &[("range", "bytes=5000-")])
        .await;

    assert_status!(response, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.header("content-range"), Some("bytes */1000"));
}

#[tokio::test]
async fn test_stream_rejects_missing_and_reserved_files() {
    let fixture = TestFixture::new().await;
    fixture
        .get(&format!("/api/v1/download?url={}", encode(VIDEO_URL)))
        .await;

    let missing = fixture.get("/media/nope.mp4").await;
    assert_status!(missing, StatusCode::NOT_FOUND);

    let catalog = fixture.get("/media/playlist.json").await;
    assert_status!(catalog, StatusCode::BAD_REQUEST);

    let sidecar = fixture
        .get(&format!("/media/{}", encode("Test Video.mp4.metadata.json")))
        .await;
    assert_status!(sidecar, StatusCode::BAD_REQUEST);
}

// =============================================================================
// UI
// =============================================================================

#[tokio::test]
async fn test_root_serves_player_page() {
    let fixture = TestFixture::new().await;

    let root = fixture.get("/").await;
    assert_status!(root, StatusCode::OK);
    assert!(root.text().contains("player"));

    let script = fixture.get("/app.js").await;
    assert_status!(script, StatusCode::OK);
    assert!(script.text().contains("console.log"));

    let unknown = fixture.get("/missing.css").await;
    assert_status!(unknown, StatusCode::NOT_FOUND);
}

// =============================================================================
// Liveness
// =============================================================================

#[tokio::test]
async fn test_heartbeat_answers_alive() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/heartbeat").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.text(), "alive");
}

#[tokio::test]
async fn test_shutdown_then_requests_are_refused() {
    let fixture = TestFixture::new().await;

    let response = fixture.post("/api/v1/shutdown").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.text(), "Shutting down...");
    assert!(!fixture.state.liveness().is_active());

    let health = fixture.get("/api/v1/health").await;
    assert_status!(health, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health.body["error"], "shutting_down");

    let download = fixture
        .get(&format!("/download?url={}", encode(VIDEO_URL)))
        .await;
    assert_status!(download, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(fixture.strategy.call_count(), 0);
}
