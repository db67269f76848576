//! Prometheus metrics for the ingestion engine.
//!
//! This module provides metrics for:
//! - Row outcomes (created, rejected, unreadable, panicked)
//! - File completion by final status
//! - Ingestion run duration

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Row Metrics
// =============================================================================

/// Rows processed total by outcome.
pub static ROWS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("accounts_rows_processed_total", "Total rows processed"),
        &["outcome"], // "created", "invalid", "duplicate", "unreadable", "panicked"
    )
    .unwrap()
});

// =============================================================================
// File Metrics
// =============================================================================

/// Ingestion runs finished total by resulting status.
pub static FILES_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "accounts_files_finished_total",
            "Total ingestion runs finished",
        ),
        &["status"], // "success", "timed_out", "cancelled", "loading"
    )
    .unwrap()
});

/// Ingestion run duration in seconds.
pub static INGEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "accounts_ingest_duration_seconds",
            "Duration of ingestion runs, from first row read to drain",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0]),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ROWS_PROCESSED.clone()),
        Box::new(FILES_FINISHED.clone()),
        Box::new(INGEST_DURATION.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        ROWS_PROCESSED.with_label_values(&["created"]).inc();
        FILES_FINISHED.with_label_values(&["success"]).inc();
        INGEST_DURATION.with_label_values(&["success"]).observe(0.2);

        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();
        assert!(names.contains(&"accounts_rows_processed_total".to_string()));
        assert!(names.contains(&"accounts_files_finished_total".to_string()));
        assert!(names.contains(&"accounts_ingest_duration_seconds".to_string()));
    }
}
