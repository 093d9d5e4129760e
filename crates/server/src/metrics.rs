//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the mucache server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Bytes streamed to the player
//! - Liveness state (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use tracing::warn;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mucache_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0, 300.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mucache_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mucache_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Requests refused because the server is shutting down.
pub static REQUESTS_REJECTED_SHUTDOWN: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mucache_requests_rejected_shutdown_total",
        "Requests answered with 503 during shutdown",
    )
    .unwrap()
});

// =============================================================================
// Streaming Metrics
// =============================================================================

/// Media responses by kind.
pub static STREAM_RESPONSES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mucache_stream_responses_total", "Media stream responses"),
        &["kind"], // "full", "partial", "unsatisfiable"
    )
    .unwrap()
});

/// Bytes scheduled for streaming to clients.
pub static STREAM_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "mucache_stream_bytes_total",
        "Bytes of media scheduled for streaming",
    )
    .unwrap()
});

// =============================================================================
// Liveness Metrics (collected dynamically)
// =============================================================================

/// 0 = active, 1 = shutting down, 2 = stopped.
pub static LIVENESS_STATE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mucache_liveness_state",
        "Server lifecycle state (0 active, 1 shutting down, 2 stopped)",
    )
    .unwrap()
});

/// Seconds since the last client heartbeat.
pub static SECONDS_SINCE_HEARTBEAT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mucache_seconds_since_heartbeat",
        "Seconds since the last client heartbeat",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(REQUESTS_REJECTED_SHUTDOWN.clone()))
        .unwrap();

    // Streaming
    registry
        .register(Box::new(STREAM_RESPONSES.clone()))
        .unwrap();
    registry.register(Box::new(STREAM_BYTES.clone())).unwrap();

    // Liveness
    registry
        .register(Box::new(LIVENESS_STATE.clone()))
        .unwrap();
    registry
        .register(Box::new(SECONDS_SINCE_HEARTBEAT.clone()))
        .unwrap();

    // Core metrics (cache, extraction, downloads)
    for metric in mucache_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let liveness = state.liveness();
    LIVENESS_STATE.set(match liveness.state() {
        mucache_core::LivenessState::Active => 0,
        mucache_core::LivenessState::ShuttingDown => 1,
        mucache_core::LivenessState::Stopped => 2,
    });
    SECONDS_SINCE_HEARTBEAT.set(liveness.since_last_heartbeat().as_secs() as i64);

    mucache_core::metrics::CATALOG_ENTRIES.set(state.store().catalog().len() as i64);
}

/// Normalize a path for metric labels (collapse media filenames).
pub fn normalize_path(path: &str) -> String {
    for prefix in ["/media/", "/mucache/"] {
        if path.starts_with(prefix) && path.len() > prefix.len() {
            return format!("{}{{filename}}", prefix);
        }
    }
    if path.starts_with("/api/") || path == "/metrics" {
        return path.to_string();
    }
    // Everything else is the static UI or an unknown path.
    if [
        "/download",
        "/playlist",
        "/filestats",
        "/remove",
        "/heartbeat",
        "/shutdown",
    ]
    .contains(&path)
    {
        return path.to_string();
    }
    "/{static}".to_string()
}
