//! In-process test server over temporary storage and an on-disk ledger.

#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use depot_core::{AppConfig, RemoteRepository, Repository, Storage};
use depot_server::{AppState, create_router, metrics};
use tempfile::TempDir;
use tower::ServiceExt;

pub struct TestServer {
    pub router: Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

impl TestServer {
    /// Hosted "releases" plus a "public" group over it, under "storage0".
    pub async fn new() -> Self {
        let storages = vec![Storage {
            id: "storage0".to_string(),
            repositories: vec![
                Repository::hosted("releases"),
                Repository::group("public", vec!["releases".to_string()]),
            ],
        }];
        Self::with_storages(storages).await
    }

    /// Same topology with a proxy of `origin` in the group's fan-out.
    pub async fn with_origin(origin: &str) -> Self {
        let storages = vec![Storage {
            id: "storage0".to_string(),
            repositories: vec![
                Repository::hosted("releases"),
                Repository::proxy("central", RemoteRepository::new(origin)),
                Repository::group(
                    "public",
                    vec!["releases".to_string(), "central".to_string()],
                ),
            ],
        }];
        Self::with_storages(storages).await
    }

    pub async fn with_storages(storages: Vec<Storage>) -> Self {
        metrics::register_metrics();

        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_testing();
        config.storage.root = temp_dir.path().join("storage");
        config.ledger.path = temp_dir.path().join("depot.db");
        config.storages = storages;

        let store = depot_storage::open(&config.storage.root).await.unwrap();
        let records = depot_metadata::open(&config.ledger.path).await.unwrap();
        let state = AppState::new(config, store, records).unwrap();
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Bytes) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn head(&self, uri: &str) -> axum::http::Response<Body> {
        self.router
            .clone()
            .oneshot(Request::head(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn put(&self, uri: &str, body: impl Into<Body>) -> (StatusCode, Bytes) {
        self.send(Request::put(uri).body(body.into()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Bytes) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str) -> (StatusCode, Bytes) {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }
}

/// Parse a JSON error body and return its `code` field.
pub fn error_code(body: &Bytes) -> String {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap();
    value["code"].as_str().unwrap().to_string()
}
