//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Cache lookups and catalog size
//! - Extraction attempts per strategy
//! - Downloads and the liveness watchdog

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Cache Metrics
// =============================================================================

/// Entries currently recorded in the catalog.
pub static CATALOG_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("mucache_catalog_entries", "Entries in the cache catalog").unwrap()
});

/// Cache lookups by result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mucache_cache_lookups_total", "Total cache lookups"),
        &["result"], // "hit", "miss"
    )
    .unwrap()
});

// =============================================================================
// Extraction Metrics
// =============================================================================

/// Strategy attempts by outcome.
pub static EXTRACTION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "mucache_extraction_attempts_total",
            "Extraction strategy attempts",
        ),
        &["strategy", "result"], // "success", "failure", "timeout", "skipped"
    )
    .unwrap()
});

/// Time spent in a single strategy attempt.
pub static EXTRACTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "mucache_extraction_duration_seconds",
            "Duration of one extraction strategy attempt",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["strategy"],
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Completed fetch requests that went to the network, by result.
pub static DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("mucache_downloads_total", "Downloads by result"),
        &["platform", "result"], // "success", "failed"
    )
    .unwrap()
});

/// Downloads currently running.
pub static DOWNLOADS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "mucache_downloads_in_flight",
        "Downloads currently in progress",
    )
    .unwrap()
});

/// Bytes added to the cache.
pub static BYTES_CACHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("mucache_bytes_cached_total", "Bytes added to the cache").unwrap()
});

// =============================================================================
// Liveness Metrics
// =============================================================================

/// Heartbeats accepted from the client.
pub static HEARTBEATS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("mucache_heartbeats_total", "Client heartbeats received").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Cache
        Box::new(CATALOG_ENTRIES.clone()),
        Box::new(CACHE_LOOKUPS.clone()),
        // Extraction
        Box::new(EXTRACTION_ATTEMPTS.clone()),
        Box::new(EXTRACTION_DURATION.clone()),
        // Downloads
        Box::new(DOWNLOADS.clone()),
        Box::new(DOWNLOADS_IN_FLIGHT.clone()),
        Box::new(BYTES_CACHED.clone()),
        // Liveness
        Box::new(HEARTBEATS.clone()),
    ]
}
