//! Repository path identifiers and canonicalization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical artifact location: (storage, repository, repository-relative path).
///
/// The relative path is canonicalized at construction: forward slashes only,
/// no empty/`.`/`..` segments, no leading slash. Two `RepositoryPath` values
/// naming the same artifact always compare equal, which makes the canonical
/// key safe to use for per-path locking.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryPath {
    storage_id: String,
    repository_id: String,
    path: String,
}

impl RepositoryPath {
    /// Create a repository path, validating and canonicalizing the relative path.
    pub fn new(
        storage_id: impl Into<String>,
        repository_id: impl Into<String>,
        path: &str,
    ) -> crate::Result<Self> {
        let storage_id = storage_id.into();
        let repository_id = repository_id.into();
        if storage_id.is_empty() {
            return Err(crate::Error::InvalidRepositoryPath(
                "storage id cannot be empty".to_string(),
            ));
        }
        if repository_id.is_empty() {
            return Err(crate::Error::InvalidRepositoryPath(
                "repository id cannot be empty".to_string(),
            ));
        }
        let path = canonicalize_relative(path)?;
        Ok(Self {
            storage_id,
            repository_id,
            path,
        })
    }

    /// The owning storage id.
    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    /// The owning repository id.
    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    /// The canonical repository-relative path.
    pub fn relative_path(&self) -> &str {
        &self.path
    }

    /// The final path segment.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Canonical key used for per-path locking and ledger lookups.
    pub fn canonical_key(&self) -> String {
        format!("{}/{}/{}", self.storage_id, self.repository_id, self.path)
    }

    /// Same relative path under a different (storage, repository).
    pub fn relocated(&self, storage_id: &str, repository_id: &str) -> Self {
        Self {
            storage_id: storage_id.to_string(),
            repository_id: repository_id.to_string(),
            path: self.path.clone(),
        }
    }

    /// Whether this path names a repository metadata file
    /// (`maven-metadata.xml` or one of its checksum siblings).
    pub fn is_metadata(&self) -> bool {
        let name = self.file_name();
        name == crate::METADATA_BASENAME
            || name
                .strip_prefix(crate::METADATA_BASENAME)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    /// Whether this path names a checksum file.
    pub fn is_checksum(&self) -> bool {
        let name = self.file_name();
        name.ends_with(".md5") || name.ends_with(".sha1") || name.ends_with(".sha256")
    }
}

impl fmt::Debug for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepositoryPath({self})")
    }
}

impl fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.storage_id, self.repository_id, self.path)
    }
}

/// Canonicalize a repository-relative path.
///
/// Rejects anything that could escape the repository root once joined onto a
/// filesystem directory: absolute paths, backslashes, `.`/`..` segments,
/// empty segments, and control characters.
fn canonicalize_relative(path: &str) -> crate::Result<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(crate::Error::InvalidRepositoryPath(
            "path cannot be empty".to_string(),
        ));
    }
    if trimmed.contains('\\') {
        return Err(crate::Error::InvalidRepositoryPath(format!(
            "path contains backslash: {path}"
        )));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(crate::Error::InvalidRepositoryPath(
            "path contains control characters".to_string(),
        ));
    }
    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" => {
                return Err(crate::Error::InvalidRepositoryPath(format!(
                    "path contains empty segment: {path}"
                )));
            }
            "." | ".." => {
                return Err(crate::Error::InvalidRepositoryPath(format!(
                    "path contains traversal segment: {path}"
                )));
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}
