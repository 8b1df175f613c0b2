//! Route table.

use crate::handlers;
use crate::metrics;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/admin/cleanup", post(handlers::trigger_cleanup))
        .route(
            "/storages/{storage}/{repository}/{*path}",
            get(handlers::download_artifact)
                .head(handlers::head_artifact)
                .put(handlers::deploy_artifact)
                .delete(handlers::delete_artifact),
        );

    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(middleware::from_fn(track_request_duration))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_request_duration(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let start = std::time::Instant::now();
    let response = next.run(request).await;
    metrics::HTTP_REQUEST_DURATION
        .with_label_values(&[&method, response.status().as_str()])
        .observe(start.elapsed().as_secs_f64());
    response
}
