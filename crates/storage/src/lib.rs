//! Artifact content storage for depot.
//!
//! Physical bytes live under a single local root laid out as
//! `<root>/<storage>/<repository>/<path>`, with atomic publish-on-finish
//! writes and per-repository trash for soft deletion.

pub mod error;
pub mod fs;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use fs::FilesystemStore;
pub use traits::{ArtifactStore, ByteStream, ObjectMeta, StreamingWrite};

use std::path::Path;
use std::sync::Arc;

/// Open the artifact store rooted at `root`.
pub async fn open(root: impl AsRef<Path>) -> StorageResult<Arc<dyn ArtifactStore>> {
    let store = FilesystemStore::new(root).await?;
    Ok(Arc::new(store) as Arc<dyn ArtifactStore>)
}
