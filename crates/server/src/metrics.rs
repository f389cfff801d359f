//! Prometheus metrics for the reel server.
//!
//! Exposes metrics for upload sessions, range streaming, and the reclamation
//! sweep.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no media identifiers, only aggregate counts.
//! Restrict the endpoint to scraper addresses at the network level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Upload session metrics
pub static UPLOAD_SESSIONS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "reel_upload_sessions_created_total",
        "Total number of upload sessions created",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_COMPLETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "reel_upload_sessions_completed_total",
        "Total number of upload sessions that reached their declared size",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_SESSIONS_EVICTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "reel_upload_sessions_evicted_total",
        "Total number of idle upload sessions evicted by the reclaimer",
    )
    .expect("metric creation failed")
});

pub static ACTIVE_UPLOAD_SESSIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "reel_upload_sessions_active",
        "Number of upload sessions currently in the registry",
    )
    .expect("metric creation failed")
});

pub static BYTES_UPLOADED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "reel_bytes_uploaded_total",
        "Total bytes appended to media files",
    )
    .expect("metric creation failed")
});

pub static UPLOAD_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("reel_upload_errors_total", "Total upload errors by type"),
        &["error_type"],
    )
    .expect("metric creation failed")
});

pub static CHUNK_APPEND_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "reel_chunk_append_duration_seconds",
            "Time taken to ingest one upload request body",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

// Streaming metrics
pub static WATCH_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reel_watch_requests_total",
            "Total watch requests by response kind",
        ),
        &["kind"],
    )
    .expect("metric creation failed")
});

pub static ACTIVE_VIEWERS: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "reel_active_viewers",
        "Number of streams currently being served",
    )
    .expect("metric creation failed")
});

pub static BYTES_STREAMED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "reel_bytes_streamed_total",
        "Total media bytes sent to viewers",
    )
    .expect("metric creation failed")
});

// Reclamation metrics
pub static STREAM_SESSIONS_EVICTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "reel_stream_sessions_evicted_total",
        "Total number of idle, unwatched stream sessions evicted",
    )
    .expect("metric creation failed")
});

pub static SWEEP_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "reel_reclaim_sweep_duration_seconds",
            "Time taken by one reclamation sweep",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so integration tests may build as many routers as they like.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(UPLOAD_SESSIONS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_SESSIONS_COMPLETED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_SESSIONS_EVICTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACTIVE_UPLOAD_SESSIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_UPLOADED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(UPLOAD_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CHUNK_APPEND_DURATION.clone()))
            .expect("metric registration failed");

        // Streaming metrics
        REGISTRY
            .register(Box::new(WATCH_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACTIVE_VIEWERS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(BYTES_STREAMED.clone()))
            .expect("metric registration failed");

        // Reclamation metrics
        REGISTRY
            .register(Box::new(STREAM_SESSIONS_EVICTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_DURATION.clone()))
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

/// Helper to record upload errors by type.
pub fn record_upload_error(error_type: &str) {
    UPLOAD_ERRORS.with_label_values(&[error_type]).inc();
}

/// Helper to record a watch request by response kind.
pub fn record_watch(kind: &str) {
    WATCH_REQUESTS.with_label_values(&[kind]).inc();
}
