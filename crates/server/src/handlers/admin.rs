//! Health and administrative endpoints.

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use depot_metadata::MetadataStore;
use depot_storage::ArtifactStore;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// GET /healthz
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.store.health_check().await?;
    state.records.health_check().await?;
    Ok(Json(serde_json::json!({ "status": "healthy" })))
}

/// Outcome of a cleanup sweep.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub examined: u64,
    pub deleted: u64,
    pub failed: u64,
    pub skipped_repositories: u64,
}

/// Optional threshold overrides for an on-demand sweep.
#[derive(Debug, Deserialize)]
pub struct CleanupParams {
    pub min_days_unused: Option<u64>,
    pub min_size_bytes: Option<u64>,
}

/// POST /admin/cleanup
///
/// Runs one eviction sweep regardless of whether the background schedule
/// is enabled. Query parameters override the configured thresholds.
#[instrument(skip(state))]
pub async fn trigger_cleanup(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> ApiResult<Json<CleanupResponse>> {
    let min_days_unused = params
        .min_days_unused
        .unwrap_or(state.config.cleanup.min_days_unused);
    let min_size_bytes = params
        .min_size_bytes
        .unwrap_or(state.config.cleanup.min_size_bytes);

    let timer = metrics::CLEANUP_SWEEP_DURATION.start_timer();
    let stats = state
        .cleaner
        .cleanup(min_days_unused, min_size_bytes)
        .await?;
    timer.observe_duration();

    metrics::CLEANUP_DELETED.inc_by(stats.deleted);
    metrics::CLEANUP_FAILURES.inc_by(stats.failed);
    info!(
        deleted = stats.deleted,
        failed = stats.failed,
        "cleanup sweep triggered via admin endpoint"
    );

    Ok(Json(CleanupResponse {
        examined: stats.examined,
        deleted: stats.deleted,
        failed: stats.failed,
        skipped_repositories: stats.skipped_repositories,
    }))
}
