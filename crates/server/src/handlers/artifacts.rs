//! Artifact download, deploy, and delete handlers.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use depot_core::RepositoryPath;
use depot_storage::ArtifactStore;
use futures::StreamExt;
use serde::Deserialize;
use tracing::instrument;

fn parse_path(storage: &str, repository: &str, rel: &str) -> ApiResult<RepositoryPath> {
    Ok(RepositoryPath::new(storage, repository, rel)?)
}

fn content_type_for(path: &RepositoryPath) -> &'static str {
    match path.file_name().rsplit('.').next() {
        Some("xml") | Some("pom") => "application/xml",
        Some("jar") | Some("war") | Some("ear") => "application/java-archive",
        Some("md5") | Some("sha1") | Some("sha256") | Some("asc") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// GET /storages/{storage}/{repository}/{*path}
///
/// Resolves through the repository named in the path, which for proxies
/// may fetch from the remote and for groups fans out across members.
#[instrument(skip(state))]
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((storage, repository, rel)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let path = parse_path(&storage, &repository, &rel)?;
    let repository_type = state
        .index
        .get(&storage, &repository)
        .map(|r| r.repository_type.as_str())
        .unwrap_or("unknown");

    match state.resolver.open_stream(&path).await? {
        Some(stream) => {
            metrics::ARTIFACT_DOWNLOADS
                .with_label_values(&[repository_type])
                .inc();
            let response = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type_for(&path))
                .body(Body::from_stream(stream))
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok(response)
        }
        None => {
            metrics::ARTIFACT_DOWNLOAD_MISSES.inc();
            Err(ApiError::NotFound(format!("artifact not found: {path}")))
        }
    }
}

/// HEAD /storages/{storage}/{repository}/{*path}
///
/// Resolves without counting a download and reports the size of the
/// backing content where one exists.
#[instrument(skip(state))]
pub async fn head_artifact(
    State(state): State<AppState>,
    Path((storage, repository, rel)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let path = parse_path(&storage, &repository, &rel)?;
    let Some(resolved) = state.resolver.fetch_path(&path).await? else {
        return Err(ApiError::NotFound(format!("artifact not found: {path}")));
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&path));
    if let Some(meta) = state.store.meta(&resolved).await? {
        builder = builder.header(header::CONTENT_LENGTH, meta.size.to_string());
    }
    builder
        .body(Body::empty())
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// PUT /storages/{storage}/{repository}/{*path}
///
/// Deploys the request body. Policy checks (deployment flags, version
/// policy, redeployment) are enforced by the management service.
#[instrument(skip(state, body))]
pub async fn deploy_artifact(
    State(state): State<AppState>,
    Path((storage, repository, rel)): Path<(String, String, String)>,
    body: Body,
) -> ApiResult<impl IntoResponse> {
    let path = parse_path(&storage, &repository, &rel)?;
    let stream = Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other)),
    );
    let written = state.management.store(&path, stream).await?;
    metrics::ARTIFACT_UPLOADS.inc();
    tracing::info!(path = %path, bytes = written, "artifact deployed");
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub force: bool,
}

/// DELETE /storages/{storage}/{repository}/{*path}
#[instrument(skip(state))]
pub async fn delete_artifact(
    State(state): State<AppState>,
    Path((storage, repository, rel)): Path<(String, String, String)>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<impl IntoResponse> {
    let path = parse_path(&storage, &repository, &rel)?;
    if state.management.delete(&path, params.force).await? {
        metrics::ARTIFACT_DELETES.inc();
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("artifact not found: {path}")))
    }
}
