//! Database models mapping to the ledger schema.

use sqlx::FromRow;
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

/// Tag marking the newest stored version of an artifact.
pub const TAG_LAST_VERSION: &str = "last-version";

/// One ledger entry per distinct (storage_id, repository_id, path).
///
/// `coordinates` and `tags` are persisted as JSON text columns; use
/// [`ArtifactRecordRow::coordinates_map`] and [`ArtifactRecordRow::tag_set`]
/// to decode them.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactRecordRow {
    pub storage_id: String,
    pub repository_id: String,
    pub path: String,
    /// Byte length of the physical artifact at `last_updated` time.
    /// NULL until the first successful write completes.
    pub size_bytes: Option<i64>,
    /// Set whenever content changes.
    pub last_updated: OffsetDateTime,
    /// Set on every successful read.
    pub last_used: OffsetDateTime,
    /// Incremented atomically on each completed read.
    pub download_count: i64,
    /// JSON object of structured coordinates decomposed from the path.
    pub coordinates: Option<String>,
    /// JSON array of named tags.
    pub tags: Option<String>,
}

impl ArtifactRecordRow {
    /// Decode the coordinates column. An absent or malformed column decodes
    /// to an empty map; the ledger never fails a read over derived data.
    pub fn coordinates_map(&self) -> BTreeMap<String, String> {
        self.coordinates
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    /// Decode the tags column.
    pub fn tag_set(&self) -> BTreeSet<String> {
        self.tags
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_set().contains(tag)
    }
}

/// AND-composable search criteria over artifact records.
///
/// Every populated field narrows the result set; an empty criteria matches
/// all records.
#[derive(Debug, Clone, Default)]
pub struct RecordCriteria {
    pub storage_id: Option<String>,
    pub repository_id: Option<String>,
    /// Prefix match on the repository-relative path.
    pub path_prefix: Option<String>,
    /// Only records at least this large.
    pub min_size_bytes: Option<i64>,
    /// Only records last used at or before this instant.
    pub last_used_before: Option<OffsetDateTime>,
}

impl RecordCriteria {
    /// Criteria scoped to one repository.
    pub fn for_repository(storage_id: impl Into<String>, repository_id: impl Into<String>) -> Self {
        Self {
            storage_id: Some(storage_id.into()),
            repository_id: Some(repository_id.into()),
            ..Self::default()
        }
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn with_min_size(mut self, min_size_bytes: i64) -> Self {
        self.min_size_bytes = Some(min_size_bytes);
        self
    }

    /// Match records last used at or before `instant` (inclusive).
    pub fn with_last_used_before(mut self, instant: OffsetDateTime) -> Self {
        self.last_used_before = Some(instant);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ArtifactRecordRow {
        ArtifactRecordRow {
            storage_id: "storage0".to_string(),
            repository_id: "releases".to_string(),
            path: "com/acme/app/1.0/app-1.0.jar".to_string(),
            size_bytes: Some(1024),
            last_updated: OffsetDateTime::now_utc(),
            last_used: OffsetDateTime::now_utc(),
            download_count: 3,
            coordinates: Some(r#"{"artifactId":"app","version":"1.0"}"#.to_string()),
            tags: Some(r#"["last-version"]"#.to_string()),
        }
    }

    #[test]
    fn test_coordinates_map_decodes() {
        let map = row().coordinates_map();
        assert_eq!(map.get("artifactId").map(String::as_str), Some("app"));
        assert_eq!(map.get("version").map(String::as_str), Some("1.0"));
    }

    #[test]
    fn test_coordinates_map_tolerates_malformed() {
        let mut record = row();
        record.coordinates = Some("not json".to_string());
        assert!(record.coordinates_map().is_empty());
        record.coordinates = None;
        assert!(record.coordinates_map().is_empty());
    }

    #[test]
    fn test_tag_set() {
        assert!(row().has_tag(TAG_LAST_VERSION));
        assert!(!row().has_tag("other"));
    }

    #[test]
    fn test_criteria_builder() {
        let criteria = RecordCriteria::for_repository("storage0", "central")
            .with_min_size(100)
            .with_path_prefix("com/acme/");
        assert_eq!(criteria.storage_id.as_deref(), Some("storage0"));
        assert_eq!(criteria.min_size_bytes, Some(100));
        assert!(criteria.last_used_before.is_none());
    }
}
