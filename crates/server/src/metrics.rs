//! Prometheus metrics for the depot server.

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static ARTIFACT_DOWNLOADS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "depot_artifact_downloads_total",
            "Artifact downloads served, by repository type",
        ),
        &["repository_type"],
    )
    .unwrap()
});

pub static ARTIFACT_DOWNLOAD_MISSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_artifact_download_misses_total",
        "Download requests that resolved to nothing",
    )
    .unwrap()
});

pub static ARTIFACT_UPLOADS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("depot_artifact_uploads_total", "Artifacts deployed").unwrap()
});

pub static ARTIFACT_DELETES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("depot_artifact_deletes_total", "Artifacts deleted").unwrap()
});

pub static CLEANUP_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_cleanup_artifacts_deleted_total",
        "Expired proxied artifacts evicted by cleanup sweeps",
    )
    .unwrap()
});

pub static CLEANUP_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "depot_cleanup_failures_total",
        "Artifacts a cleanup sweep failed to evict",
    )
    .unwrap()
});

pub static CLEANUP_SWEEP_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(HistogramOpts::new(
        "depot_cleanup_sweep_duration_seconds",
        "Wall time of cleanup sweeps",
    ))
    .unwrap()
});

pub static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "depot_http_request_duration_seconds",
            "HTTP request wall time, by method and status",
        ),
        &["method", "status"],
    )
    .unwrap()
});

pub static REMOTES_DOWN: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "depot_remotes_down",
        "Proxy remotes currently considered down",
    )
    .unwrap()
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the registry. Idempotent.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(ARTIFACT_DOWNLOADS.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(ARTIFACT_DOWNLOAD_MISSES.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(ARTIFACT_UPLOADS.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(ARTIFACT_DELETES.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(CLEANUP_DELETED.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(CLEANUP_FAILURES.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(CLEANUP_SWEEP_DURATION.clone()))
            .unwrap();
        REGISTRY
            .register(Box::new(HTTP_REQUEST_DURATION.clone()))
            .unwrap();
        REGISTRY.register(Box::new(REMOTES_DOWN.clone())).unwrap();
    });
}

/// Render the registry in the Prometheus text exposition format.
pub async fn metrics_handler() -> impl axum::response::IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    match encoder.encode_to_string(&metric_families) {
        Ok(body) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        ),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            [(axum::http::header::CONTENT_TYPE, "text/plain")],
            format!("failed to encode metrics: {e}"),
        ),
    }
}
