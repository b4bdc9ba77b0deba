//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Fetch lifecycle (starts, results, durations)
//! - Tool process spawns (probe and fetch)
//! - Playlist hook invocations

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Fetch lifecycle
// =============================================================================

/// Fetch requests accepted for processing.
pub static FETCHES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("marquee_fetches_started_total", "Total fetch requests started").unwrap()
});

/// Fetches currently being supervised.
pub static FETCHES_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("marquee_fetches_active", "Fetches currently in progress").unwrap()
});

/// Fetch outcomes by result.
pub static FETCH_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_fetch_results_total", "Total fetches by terminal result"),
        &["result"], // "success", "invalid_url", "tool_failed", ...
    )
    .unwrap()
});

/// Wall-clock duration of a fetch, validation to terminal event.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("marquee_fetch_duration_seconds", "Duration of fetches").buckets(
            vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0],
        ),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// External processes
// =============================================================================

/// Tool processes spawned, by kind.
pub static TOOL_SPAWNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_tool_spawns_total", "Total fetch tool processes spawned"),
        &["kind"], // "probe", "fetch"
    )
    .unwrap()
});

/// Playlist hook runs by result.
pub static PLAYLIST_HOOK_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_playlist_hook_runs_total", "Total playlist hook invocations"),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FETCHES_STARTED.clone()),
        Box::new(FETCHES_ACTIVE.clone()),
        Box::new(FETCH_RESULTS.clone()),
        Box::new(FETCH_DURATION.clone()),
        Box::new(TOOL_SPAWNS.clone()),
        Box::new(PLAYLIST_HOOK_RUNS.clone()),
    ]
}
