//! HTTP surface of the depot artifact repository manager.
//!
//! Exposes artifact resolution under
//! `/storages/{storage}/{repository}/{path}`, deployment and deletion on
//! the same URLs, a health endpoint, an on-demand cleanup trigger, and an
//! optional Prometheus scrape endpoint.

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
