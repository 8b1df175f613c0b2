//! Local filesystem artifact store.
//!
//! Layout mirrors the logical hierarchy: `<root>/<storage>/<repository>/<path>`.
//! Trashed artifacts move to `<root>/<storage>/<repository>/.trash/<path>`.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ArtifactStore, ByteStream, ObjectMeta, StreamingWrite};
use async_trait::async_trait;
use bytes::Bytes;
use depot_core::RepositoryPath;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Directory name for soft-deleted artifacts, kept out of the
/// artifact namespace by its leading dot.
const TRASH_DIR: &str = ".trash";

/// Local filesystem artifact store.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Create a new filesystem store rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Physical location for an artifact. `RepositoryPath` canonicalization
    /// guarantees the relative path cannot escape the root.
    fn artifact_path(&self, path: &RepositoryPath) -> PathBuf {
        self.root
            .join(path.storage_id())
            .join(path.repository_id())
            .join(path.relative_path())
    }

    /// Physical location for a trashed artifact.
    fn trash_path(&self, path: &RepositoryPath) -> PathBuf {
        self.root
            .join(path.storage_id())
            .join(path.repository_id())
            .join(TRASH_DIR)
            .join(path.relative_path())
    }

    fn temp_path(final_path: &Path) -> PathBuf {
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        final_path.with_file_name(
            final_path
                .file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        )
    }

    async fn ensure_parent(path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for FilesystemStore {
    #[instrument(skip(self, path), fields(backend = "filesystem", path = %path))]
    async fn exists(&self, path: &RepositoryPath) -> StorageResult<bool> {
        let file = self.artifact_path(path);
        fs::try_exists(&file).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self, path), fields(backend = "filesystem", path = %path))]
    async fn meta(&self, path: &RepositoryPath) -> StorageResult<Option<ObjectMeta>> {
        let file = self.artifact_path(path);
        match fs::metadata(&file).await {
            Ok(metadata) => Ok(Some(ObjectMeta {
                size: metadata.len(),
                last_modified: metadata.modified().ok().map(|t| t.into()),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self, path), fields(backend = "filesystem", path = %path))]
    async fn read_bytes(&self, path: &RepositoryPath) -> StorageResult<Option<Bytes>> {
        let file = self.artifact_path(path);
        match fs::read(&file).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self, path), fields(backend = "filesystem", path = %path))]
    async fn open_stream(&self, path: &RepositoryPath) -> StorageResult<Option<ByteStream>> {
        use tokio::io::AsyncReadExt;

        let file_path = self.artifact_path(path);
        let file = match fs::File::open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        // Stream in chunks instead of loading the artifact into memory
        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Some(Box::pin(stream)))
    }

    #[instrument(skip(self, path), fields(backend = "filesystem", path = %path))]
    async fn begin_write(&self, path: &RepositoryPath) -> StorageResult<Box<dyn StreamingWrite>> {
        let final_path = self.artifact_path(path);
        Self::ensure_parent(&final_path).await?;

        // UUID suffix avoids collisions between concurrent writers of the
        // same path; only the finishing writer's rename wins.
        let temp_path = Self::temp_path(&final_path);
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemWrite {
            file,
            temp_path,
            final_path,
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self, path, data), fields(backend = "filesystem", path = %path, size = data.len()))]
    async fn put_bytes(&self, path: &RepositoryPath, data: Bytes) -> StorageResult<()> {
        let final_path = self.artifact_path(path);
        Self::ensure_parent(&final_path).await?;

        // Write to temp file, fsync, then rename so readers never see a
        // partial artifact
        let temp_path = Self::temp_path(&final_path);
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &final_path).await?;

        Ok(())
    }

    #[instrument(skip(self, path), fields(backend = "filesystem", path = %path))]
    async fn delete(&self, path: &RepositoryPath) -> StorageResult<bool> {
        let file = self.artifact_path(path);
        match fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self, path), fields(backend = "filesystem", path = %path))]
    async fn move_to_trash(&self, path: &RepositoryPath) -> StorageResult<bool> {
        let file = self.artifact_path(path);
        match fs::try_exists(&file).await {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => return Err(StorageError::Io(e)),
        }

        let trash = self.trash_path(path);
        Self::ensure_parent(&trash).await?;
        fs::rename(&file, &trash).await?;
        Ok(true)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }

        Ok(())
    }
}

/// Streaming write staged in a temp file next to the final location.
struct FilesystemWrite {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StreamingWrite for FilesystemWrite {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        // Flush to disk before the rename publishes the artifact
        self.file.sync_all().await?;
        drop(self.file);
        fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(self.bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        drop(self.file);
        let _ = fs::remove_file(&self.temp_path).await;
        Ok(())
    }
}
