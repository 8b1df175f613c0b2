//! API error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depot_metadata::MetadataError;
use depot_resolver::ResolveError;
use depot_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] MetadataError),

    #[error(transparent)]
    Core(#[from] depot_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body returned for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Forbidden(_) => "forbidden",
            Self::Resolve(e) => match e {
                ResolveError::PolicyViolation(_) => "policy_violation",
                ResolveError::RemoteUnavailable(_) => "remote_unavailable",
                ResolveError::Transport(_) => "transport_error",
                ResolveError::LockTimeout(_) => "lock_timeout",
                ResolveError::GroupCycle(_) => "group_cycle",
                ResolveError::Core(e) => core_code(e),
                _ => "internal_error",
            },
            Self::Storage(StorageError::NotFound(_)) => "not_found",
            Self::Ledger(MetadataError::NotFound(_)) => "not_found",
            Self::Core(e) => core_code(e),
            _ => "internal_error",
        }
    }

    /// HTTP status for the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Resolve(e) => match e {
                ResolveError::PolicyViolation(_) => StatusCode::FORBIDDEN,
                ResolveError::RemoteUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ResolveError::Transport(_) => StatusCode::BAD_GATEWAY,
                ResolveError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                ResolveError::GroupCycle(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ResolveError::Core(e) => core_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Ledger(MetadataError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Core(e) => core_status(e),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn core_code(e: &depot_core::Error) -> &'static str {
    match e {
        depot_core::Error::InvalidRepositoryPath(_) => "bad_request",
        depot_core::Error::UnknownStorage(_) | depot_core::Error::UnknownRepository { .. } => {
            "not_found"
        }
        _ => "internal_error",
    }
}

fn core_status(e: &depot_core::Error) -> StatusCode {
    match e {
        depot_core::Error::InvalidRepositoryPath(_) => StatusCode::BAD_REQUEST,
        depot_core::Error::UnknownStorage(_) | depot_core::Error::UnknownRepository { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "request failed: {self}");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
