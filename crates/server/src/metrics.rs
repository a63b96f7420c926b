//! Prometheus metrics for the folio server.
//!
//! Exposes cache effectiveness, archive build timing and delivery volume.
//! The `/metrics` endpoint is unauthenticated for scraping; restrict it at
//! the network level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Cache metrics
pub static CACHE_HITS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_cache_hits_total",
        "Total number of downloads served from an existing archive",
    )
    .expect("metric creation failed")
});

pub static CACHE_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_cache_misses_total",
        "Total number of downloads that required an archive build",
    )
    .expect("metric creation failed")
});

pub static ARCHIVE_BUILDS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_archive_builds_total",
        "Total number of archives built",
    )
    .expect("metric creation failed")
});

pub static ARCHIVE_BUILD_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_archive_build_failures_total",
        "Total number of archive builds that failed",
    )
    .expect("metric creation failed")
});

pub static ARCHIVE_BUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "folio_archive_build_duration_seconds",
            "Time taken to build an archive",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
    )
    .expect("metric creation failed")
});

// Delivery metrics
pub static BYTES_SERVED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_bytes_served_total",
        "Total archive bytes written to clients",
    )
    .expect("metric creation failed")
});

pub static ACTIVE_DOWNLOADS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "folio_active_downloads",
        "Number of archive transfers currently streaming",
    )
    .expect("metric creation failed")
});

pub static DOWNLOADS_ABORTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_downloads_aborted_total",
        "Total number of transfers that ended before the last byte",
    )
    .expect("metric creation failed")
});

pub static RANGE_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "folio_range_requests_total",
            "Total number of archive requests by range outcome",
        ),
        &["outcome"], // full, partial, unsatisfiable
    )
    .expect("metric creation failed")
});

// Reaper metrics
pub static CACHE_SWEPT_FILES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "folio_cache_swept_files_total",
        "Total number of cache files deleted by the reaper",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so integration tests can build many routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(CACHE_HITS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_MISSES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ARCHIVE_BUILDS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ARCHIVE_BUILD_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ARCHIVE_BUILD_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_SERVED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACTIVE_DOWNLOADS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(DOWNLOADS_ABORTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RANGE_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CACHE_SWEPT_FILES.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Record the range outcome of an archive request.
pub fn record_range_outcome(outcome: &str) {
    RANGE_REQUESTS.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // This would panic if any metric creation failed
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_range_outcome_labels() {
        register_metrics();
        let before = RANGE_REQUESTS.with_label_values(&["partial"]).get();
        record_range_outcome("partial");
        assert_eq!(RANGE_REQUESTS.with_label_values(&["partial"]).get(), before + 1);
    }
}
