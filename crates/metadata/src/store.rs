//! SQLite-backed artifact record ledger.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{ArtifactRecordRow, RecordCriteria};
use crate::repos::ArtifactRecordRepo;
use async_trait::async_trait;
use depot_core::RepositoryPath;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{info, instrument};

/// Full ledger interface: record operations plus lifecycle hooks.
#[async_trait]
pub trait MetadataStore: ArtifactRecordRepo {
    /// Apply the schema. Idempotent.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS artifact_records (
    storage_id      TEXT NOT NULL,
    repository_id   TEXT NOT NULL,
    path            TEXT NOT NULL,
    size_bytes      INTEGER,
    last_updated    TEXT NOT NULL,
    last_used       TEXT NOT NULL,
    download_count  INTEGER NOT NULL DEFAULT 0,
    coordinates     TEXT,
    tags            TEXT,
    PRIMARY KEY (storage_id, repository_id, path)
);

CREATE INDEX IF NOT EXISTS idx_artifact_records_last_used
    ON artifact_records (last_used);

CREATE INDEX IF NOT EXISTS idx_artifact_records_size
    ON artifact_records (size_bytes);
"#;

/// SQLite ledger store.
///
/// Single-connection pool: SQLite serializes writers anyway and a lone
/// connection avoids SQLITE_BUSY churn under concurrent upserts.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the ledger database at `path`.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "opened ledger database");
        Ok(Self { pool })
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> MetadataResult<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn apply_criteria(builder: &mut QueryBuilder<'_, Sqlite>, criteria: &RecordCriteria) {
        builder.push(" WHERE 1 = 1");
        if let Some(storage_id) = &criteria.storage_id {
            builder
                .push(" AND storage_id = ")
                .push_bind(storage_id.clone());
        }
        if let Some(repository_id) = &criteria.repository_id {
            builder
                .push(" AND repository_id = ")
                .push_bind(repository_id.clone());
        }
        if let Some(prefix) = &criteria.path_prefix {
            let mut pattern = prefix
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            pattern.push('%');
            builder
                .push(" AND path LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\'");
        }
        if let Some(min_size) = criteria.min_size_bytes {
            builder.push(" AND size_bytes >= ").push_bind(min_size);
        }
        if let Some(before) = criteria.last_used_before {
            builder.push(" AND last_used <= ").push_bind(before);
        }
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactRecordRepo for SqliteStore {
    #[instrument(skip(self, record), fields(path = %record.path))]
    async fn upsert_stored(&self, record: &ArtifactRecordRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO artifact_records
                (storage_id, repository_id, path, size_bytes, last_updated,
                 last_used, download_count, coordinates, tags)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, NULL)
            ON CONFLICT (storage_id, repository_id, path) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                last_updated = excluded.last_updated,
                coordinates = excluded.coordinates
            "#,
        )
        .bind(&record.storage_id)
        .bind(&record.repository_id)
        .bind(&record.path)
        .bind(record.size_bytes)
        .bind(record.last_updated)
        .bind(record.last_used)
        .bind(&record.coordinates)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.canonical_key()))]
    async fn touch_download(
        &self,
        path: &RepositoryPath,
        used_at: OffsetDateTime,
    ) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO artifact_records
                (storage_id, repository_id, path, last_updated, last_used, download_count)
            VALUES (?, ?, ?, ?, ?, 1)
            ON CONFLICT (storage_id, repository_id, path) DO UPDATE SET
                download_count = download_count + 1,
                last_used = excluded.last_used
            "#,
        )
        .bind(path.storage_id())
        .bind(path.repository_id())
        .bind(path.relative_path())
        .bind(used_at)
        .bind(used_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_record(&self, path: &RepositoryPath) -> MetadataResult<Option<ArtifactRecordRow>> {
        let record = sqlx::query_as::<_, ArtifactRecordRow>(
            r#"
            SELECT storage_id, repository_id, path, size_bytes, last_updated,
                   last_used, download_count, coordinates, tags
            FROM artifact_records
            WHERE storage_id = ? AND repository_id = ? AND path = ?
            "#,
        )
        .bind(path.storage_id())
        .bind(path.repository_id())
        .bind(path.relative_path())
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn record_exists(&self, path: &RepositoryPath) -> MetadataResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM artifact_records
            WHERE storage_id = ? AND repository_id = ? AND path = ?
            "#,
        )
        .bind(path.storage_id())
        .bind(path.repository_id())
        .bind(path.relative_path())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn set_tag(&self, path: &RepositoryPath, tag: &str) -> MetadataResult<()> {
        let Some(record) = self.get_record(path).await? else {
            return Err(MetadataError::NotFound(path.canonical_key()));
        };
        let mut tags = record.tag_set();
        if !tags.insert(tag.to_string()) {
            return Ok(());
        }
        let encoded = serde_json::to_string(&tags)
            .map_err(|e| MetadataError::InvalidRecord(e.to_string()))?;
        sqlx::query(
            r#"
            UPDATE artifact_records SET tags = ?
            WHERE storage_id = ? AND repository_id = ? AND path = ?
            "#,
        )
        .bind(encoded)
        .bind(path.storage_id())
        .bind(path.repository_id())
        .bind(path.relative_path())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_tag(&self, path: &RepositoryPath, tag: &str) -> MetadataResult<()> {
        let Some(record) = self.get_record(path).await? else {
            return Ok(());
        };
        let mut tags = record.tag_set();
        if !tags.remove(tag) {
            return Ok(());
        }
        let encoded = if tags.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&tags)
                    .map_err(|e| MetadataError::InvalidRecord(e.to_string()))?,
            )
        };
        sqlx::query(
            r#"
            UPDATE artifact_records SET tags = ?
            WHERE storage_id = ? AND repository_id = ? AND path = ?
            "#,
        )
        .bind(encoded)
        .bind(path.storage_id())
        .bind(path.repository_id())
        .bind(path.relative_path())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn search_records(
        &self,
        criteria: &RecordCriteria,
    ) -> MetadataResult<Vec<ArtifactRecordRow>> {
        let mut builder = QueryBuilder::new(
            "SELECT storage_id, repository_id, path, size_bytes, last_updated, \
             last_used, download_count, coordinates, tags FROM artifact_records",
        );
        Self::apply_criteria(&mut builder, criteria);
        builder.push(" ORDER BY storage_id, repository_id, path");
        let records = builder
            .build_query_as::<ArtifactRecordRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn count_records(&self, criteria: &RecordCriteria) -> MetadataResult<u64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) AS n FROM artifact_records");
        Self::apply_criteria(&mut builder, criteria);
        let row = builder.build().fetch_one(&self.pool).await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn delete_record(&self, path: &RepositoryPath) -> MetadataResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM artifact_records
            WHERE storage_id = ? AND repository_id = ? AND path = ?
            "#,
        )
        .bind(path.storage_id())
        .bind(path.repository_id())
        .bind(path.relative_path())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_records_batch(
        &self,
        storage_id: &str,
        repository_id: &str,
        paths: &[String],
    ) -> MetadataResult<u64> {
        if paths.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut removed = 0u64;
        for path in paths {
            let result = sqlx::query(
                r#"
                DELETE FROM artifact_records
                WHERE storage_id = ? AND repository_id = ? AND path = ?
                "#,
            )
            .bind(storage_id)
            .bind(repository_id)
            .bind(path)
            .execute(&mut *tx)
            .await?;
            removed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TAG_LAST_VERSION;

    async fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn path(raw: &str) -> RepositoryPath {
        let mut parts = raw.splitn(3, '/');
        RepositoryPath::new(
            parts.next().unwrap(),
            parts.next().unwrap(),
            parts.next().unwrap(),
        )
        .unwrap()
    }

    fn stored_row(path: &RepositoryPath, size: i64) -> ArtifactRecordRow {
        let now = OffsetDateTime::now_utc();
        ArtifactRecordRow {
            storage_id: path.storage_id().to_string(),
            repository_id: path.repository_id().to_string(),
            path: path.relative_path().to_string(),
            size_bytes: Some(size),
            last_updated: now,
            last_used: now,
            download_count: 0,
            coordinates: Some(r#"{"artifactId":"app","version":"1.0"}"#.to_string()),
            tags: None,
        }
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = store().await;
        store.migrate().await.unwrap();
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = store().await;
        let p = path("storage0/releases/com/acme/app/1.0/app-1.0.jar");
        store.upsert_stored(&stored_row(&p, 1024)).await.unwrap();

        let record = store.get_record(&p).await.unwrap().unwrap();
        assert_eq!(record.size_bytes, Some(1024));
        assert_eq!(record.download_count, 0);
        assert_eq!(
            record.coordinates_map().get("version").map(String::as_str),
            Some("1.0")
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = store().await;
        let p = path("storage0/releases/missing.jar");
        assert!(store.get_record(&p).await.unwrap().is_none());
        assert!(!store.record_exists(&p).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_preserves_count_and_tags() {
        let store = store().await;
        let p = path("storage0/releases/com/acme/app/1.0/app-1.0.jar");
        store.upsert_stored(&stored_row(&p, 100)).await.unwrap();
        store
            .touch_download(&p, OffsetDateTime::now_utc())
            .await
            .unwrap();
        store.set_tag(&p, TAG_LAST_VERSION).await.unwrap();

        // Re-deploy with new content: size changes, usage history survives.
        store.upsert_stored(&stored_row(&p, 200)).await.unwrap();
        let record = store.get_record(&p).await.unwrap().unwrap();
        assert_eq!(record.size_bytes, Some(200));
        assert_eq!(record.download_count, 1);
        assert!(record.has_tag(TAG_LAST_VERSION));
    }

    #[tokio::test]
    async fn test_touch_download_increments() {
        let store = store().await;
        let p = path("storage0/releases/com/acme/app/1.0/app-1.0.jar");
        store.upsert_stored(&stored_row(&p, 1)).await.unwrap();
        for _ in 0..5 {
            store
                .touch_download(&p, OffsetDateTime::now_utc())
                .await
                .unwrap();
        }
        let record = store.get_record(&p).await.unwrap().unwrap();
        assert_eq!(record.download_count, 5);
    }

    #[tokio::test]
    async fn test_touch_download_creates_missing_record() {
        let store = store().await;
        let p = path("storage0/releases/com/acme/app/1.0/app-1.0.jar");
        store
            .touch_download(&p, OffsetDateTime::now_utc())
            .await
            .unwrap();
        let record = store.get_record(&p).await.unwrap().unwrap();
        assert_eq!(record.download_count, 1);
        assert!(record.size_bytes.is_none());
    }

    #[tokio::test]
    async fn test_tag_round_trip() {
        let store = store().await;
        let p = path("storage0/releases/a/b/1.0/b-1.0.jar");
        store.upsert_stored(&stored_row(&p, 1)).await.unwrap();

        store.set_tag(&p, TAG_LAST_VERSION).await.unwrap();
        store.set_tag(&p, TAG_LAST_VERSION).await.unwrap();
        assert!(
            store
                .get_record(&p)
                .await
                .unwrap()
                .unwrap()
                .has_tag(TAG_LAST_VERSION)
        );

        store.clear_tag(&p, TAG_LAST_VERSION).await.unwrap();
        assert!(
            !store
                .get_record(&p)
                .await
                .unwrap()
                .unwrap()
                .has_tag(TAG_LAST_VERSION)
        );
        // Clearing an absent tag is a no-op.
        store.clear_tag(&p, TAG_LAST_VERSION).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_tag_on_missing_record_fails() {
        let store = store().await;
        let p = path("storage0/releases/missing.jar");
        let err = store.set_tag(&p, TAG_LAST_VERSION).await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_search_by_criteria() {
        let store = store().await;
        let old = path("storage0/central/com/acme/old/1.0/old-1.0.jar");
        let fresh = path("storage0/central/com/acme/new/1.0/new-1.0.jar");
        let other = path("storage0/releases/com/acme/app/1.0/app-1.0.jar");
        for p in [&old, &fresh, &other] {
            store.upsert_stored(&stored_row(p, 4096)).await.unwrap();
        }
        let week_ago = OffsetDateTime::now_utc() - time::Duration::days(7);
        store.touch_download(&old, week_ago).await.unwrap();
        store
            .touch_download(&fresh, OffsetDateTime::now_utc())
            .await
            .unwrap();

        let criteria = RecordCriteria::for_repository("storage0", "central")
            .with_min_size(1000)
            .with_last_used_before(OffsetDateTime::now_utc() - time::Duration::days(1));
        let matches = store.search_records(&criteria).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, old.relative_path());
        assert_eq!(store.count_records(&criteria).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_last_used_cutoff_is_inclusive() {
        let store = store().await;
        let p = path("storage0/central/com/acme/app/1.0/app-1.0.jar");
        let boundary = OffsetDateTime::now_utc() - time::Duration::days(30);
        let mut row = stored_row(&p, 4096);
        row.last_used = boundary;
        store.upsert_stored(&row).await.unwrap();

        // A record last used exactly at the cutoff is still a match.
        let at_cutoff =
            RecordCriteria::for_repository("storage0", "central").with_last_used_before(boundary);
        let matches = store.search_records(&at_cutoff).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, p.relative_path());

        let before_cutoff = RecordCriteria::for_repository("storage0", "central")
            .with_last_used_before(boundary - time::Duration::seconds(1));
        assert_eq!(store.count_records(&before_cutoff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_search_path_prefix_escapes_like_wildcards() {
        let store = store().await;
        let literal = path("storage0/releases/com/a_b/app/1.0/app-1.0.jar");
        let similar = path("storage0/releases/com/axb/app/1.0/app-1.0.jar");
        store.upsert_stored(&stored_row(&literal, 1)).await.unwrap();
        store.upsert_stored(&stored_row(&similar, 1)).await.unwrap();

        let criteria =
            RecordCriteria::for_repository("storage0", "releases").with_path_prefix("com/a_b/");
        let matches = store.search_records(&criteria).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, literal.relative_path());
    }

    #[tokio::test]
    async fn test_delete_record() {
        let store = store().await;
        let p = path("storage0/releases/com/acme/app/1.0/app-1.0.jar");
        store.upsert_stored(&stored_row(&p, 1)).await.unwrap();
        assert!(store.delete_record(&p).await.unwrap());
        assert!(!store.delete_record(&p).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_batch() {
        let store = store().await;
        let paths: Vec<RepositoryPath> = (0..3)
            .map(|i| path(&format!("storage0/central/com/acme/app/1.{i}/app-1.{i}.jar")))
            .collect();
        for p in &paths {
            store.upsert_stored(&stored_row(p, 1)).await.unwrap();
        }
        let keys: Vec<String> = paths
            .iter()
            .map(|p| p.relative_path().to_string())
            .collect();
        let removed = store
            .delete_records_batch("storage0", "central", &keys)
            .await
            .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(
            store
                .count_records(&RecordCriteria::for_repository("storage0", "central"))
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .delete_records_batch("storage0", "central", &[])
                .await
                .unwrap(),
            0
        );
    }
}
