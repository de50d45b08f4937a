//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Pipeline (stage results, run outcomes, duration)
//! - Batch scheduler (item outcomes, session cap hits)
//! - Run history (write failures, name resolution retries)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Stage results by stage and status.
pub static STAGE_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("curator_stage_results_total", "Pipeline stage results"),
        &["stage", "status"], // status: "success", "warning", "error"
    )
    .unwrap()
});

/// Pipeline runs by overall result.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("curator_pipeline_runs_total", "Total pipeline runs"),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Full pipeline duration in seconds.
pub static PIPELINE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "curator_pipeline_duration_seconds",
            "Duration of a full pipeline run for one item",
        )
        .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batch items processed by result.
pub static BATCH_ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("curator_batch_items_total", "Items processed by batches"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

/// Items currently being processed across all batches.
pub static BATCH_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "curator_batch_items_in_flight",
        "Items currently being processed",
    )
    .unwrap()
});

/// Batches that stopped because the session cap was reached.
pub static SESSION_CAP_HITS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "curator_session_cap_hits_total",
        "Batches stopped by the session cap with items still queued",
    )
    .unwrap()
});

// =============================================================================
// History Metrics
// =============================================================================

/// Run history writes that failed and were dropped.
pub static HISTORY_WRITE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "curator_history_write_failures_total",
        "Run history records that could not be written",
    )
    .unwrap()
});

/// Name resolution retries (attempts after the first).
pub static NAME_RESOLUTION_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "curator_name_resolution_retries_total",
        "Retried item name lookups",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Pipeline
        Box::new(STAGE_RESULTS.clone()),
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(PIPELINE_DURATION.clone()),
        // Batch
        Box::new(BATCH_ITEMS.clone()),
        Box::new(BATCH_IN_FLIGHT.clone()),
        Box::new(SESSION_CAP_HITS.clone()),
        // History
        Box::new(HISTORY_WRITE_FAILURES.clone()),
        Box::new(NAME_RESOLUTION_RETRIES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        STAGE_RESULTS.with_label_values(&["reachability", "success"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"curator_stage_results_total".to_string()));
    }
}
