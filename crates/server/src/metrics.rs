//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the accounts server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Worker pool status (collected dynamically)
//! - Files by status and registered accounts (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;

use accounts_core::FileStatus;

use crate::state::AppState;

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
            "accounts_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("accounts_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "accounts_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Ingestion Metrics (collected dynamically)
// =============================================================================

/// Rows being processed right now.
pub static POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("accounts_pool_active", "Number of rows being processed").unwrap()
});

/// Highest number of rows processed at once since startup.
pub static POOL_PEAK: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "accounts_pool_peak",
        "Peak number of rows processed concurrently",
    )
    .unwrap()
});

/// Files by current status.
pub static FILES_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("accounts_files_by_status", "Current file count by status"),
        &["status"],
    )
    .unwrap()
});

/// Accounts in the registry.
pub static REGISTERED_ACCOUNTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "accounts_registered_total",
        "Number of accounts registered since startup",
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

    // Ingestion
    registry.register(Box::new(POOL_ACTIVE.clone())).unwrap();
    registry.register(Box::new(POOL_PEAK.clone())).unwrap();
    registry
        .register(Box::new(FILES_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(REGISTERED_ACCOUNTS.clone()))
        .unwrap();

    // Core metrics (rows, files, durations)
    for metric in accounts_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the pool, tracker and registry
/// at scrape time.
pub fn collect_dynamic_metrics(state: &AppState) {
    let ingestor = state.ingestor();

    let pool = ingestor.pool_status();
    POOL_ACTIVE.set(pool.active_jobs as i64);
    POOL_PEAK.set(pool.peak_active as i64);

    let counts = ingestor.tracker().count_by_status();
    for status in FileStatus::ALL {
        let count = counts.get(&status).copied().unwrap_or(0);
        FILES_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }

    REGISTERED_ACCOUNTS.set(ingestor.registry().len() as i64);
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_REGEX.replace_all(path, "{id}");
    let result = NUMERIC_REGEX.replace_all(&result, "/{id}$1");
    result.to_string()
}
