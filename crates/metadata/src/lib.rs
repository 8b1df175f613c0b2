//! Artifact record ledger for depot.
//!
//! Tracks one record per stored artifact: size, timestamps, download
//! counts, decomposed coordinates, and named tags. The ledger backs the
//! proxy cache bookkeeping and the expired-artifact cleaner.

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{ArtifactRecordRow, RecordCriteria, TAG_LAST_VERSION};
pub use repos::ArtifactRecordRepo;
pub use store::{MetadataStore, SqliteStore};

use std::path::Path;
use std::sync::Arc;

/// Open the ledger at `path` and apply the schema.
pub async fn open(path: impl AsRef<Path>) -> MetadataResult<Arc<dyn MetadataStore>> {
    let store = SqliteStore::new(path).await?;
    store.migrate().await?;
    Ok(Arc::new(store) as Arc<dyn MetadataStore>)
}
