//! SQLite-backed [`VectorStore`] implementation.
//!
//! Collections and records live in two tables (see [`crate::migrate`]).
//! Embeddings are stored as little-endian f32 BLOBs and each collection
//! records its dimension on the first add. Queries load every vector of
//! the collection and rank by cosine distance in Rust, which is fine for
//! the corpus sizes a single-user pipeline handles.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::StoreError;
use crate::migrate;
use crate::models::{QueryHit, RecordMetadata, StoredRecord};

use super::{
    batch_dimension, check_query_dimension, cosine_distance, nearest, CollectionInfo, VectorStore,
};

/// Persistent store in a single SQLite file.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open the database at `path`, creating file and schema if missing.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_live(&self, collection: &CollectionInfo) -> Result<Option<usize>, StoreError> {
        let row = sqlx::query("SELECT dimension FROM collections WHERE id = ? AND name = ?")
            .bind(&collection.id)
            .bind(&collection.name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.get::<Option<i64>, _>("dimension").map(|d| d as usize)),
            None => Err(StoreError::NotFound(collection.name.clone())),
        }
    }
}

fn map_create_error(name: &str, err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::AlreadyExists(name.to_string())
        }
        _ => err.into(),
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| CollectionInfo {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionInfo, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("INSERT INTO collections (id, name, dimension, created_at) VALUES (?, ?, NULL, ?)")
            .bind(&id)
            .bind(name)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_create_error(name, e))?;

        tracing::debug!(collection = name, "created sqlite collection");
        Ok(CollectionInfo {
            id,
            name: name.to_string(),
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let id: Option<String> = sqlx::query_scalar("SELECT id FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(id) = id else {
            return Err(StoreError::NotFound(name.to_string()));
        };

        sqlx::query("DELETE FROM records WHERE collection_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn add(&self, collection: &CollectionInfo, records: &[StoredRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT dimension FROM collections WHERE id = ? AND name = ?")
            .bind(&collection.id)
            .bind(&collection.name)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(StoreError::NotFound(collection.name.clone()));
        };
        let existing = row.get::<Option<i64>, _>("dimension").map(|d| d as usize);

        let Some(dim) = batch_dimension(existing, records)? else {
            return Ok(());
        };
        if existing.is_none() {
            sqlx::query("UPDATE collections SET dimension = ? WHERE id = ?")
                .bind(dim as i64)
                .bind(&collection.id)
                .execute(&mut *tx)
                .await?;
        }

        let next_seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq), -1) + 1 FROM records WHERE collection_id = ?")
                .bind(&collection.id)
                .fetch_one(&mut *tx)
                .await?;

        for (i, record) in records.iter().enumerate() {
            let metadata_json = serde_json::to_string(&record.metadata)
                .map_err(|e| StoreError::backend(format!("cannot encode metadata: {}", e)))?;
            sqlx::query(
                "INSERT INTO records (id, collection_id, seq, document, embedding, metadata_json) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&collection.id)
            .bind(next_seq + i as i64)
            .bind(&record.document)
            .bind(vec_to_blob(&record.embedding))
            .bind(&metadata_json)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::debug!(collection = %collection.name, count = records.len(), "added records");
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionInfo,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<QueryHit>, StoreError> {
        let dimension = self.ensure_live(collection).await?;
        check_query_dimension(dimension, embedding)?;

        let rows = sqlx::query(
            "SELECT id, document, embedding, metadata_json FROM records WHERE collection_id = ? ORDER BY seq",
        )
        .bind(&collection.id)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                let metadata: RecordMetadata =
                    serde_json::from_str(&metadata_json).unwrap_or_default();
                QueryHit {
                    id: row.get("id"),
                    document: row.get("document"),
                    metadata,
                    distance: cosine_distance(embedding, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(nearest(hits, n_results))
    }

    async fn count(&self, collection: &CollectionInfo) -> Result<usize, StoreError> {
        self.ensure_live(collection).await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection_id = ?")
            .bind(&collection.id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, embedding: Vec<f32>, file: &str) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            document: format!("text of {}", id),
            embedding,
            metadata: RecordMetadata {
                source_file_name: file.to_string(),
                chunk_index: 0,
                start_offset: 0,
                ingestion_timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data").join("store.sqlite");

        let store = SqliteVectorStore::open(&path).await.unwrap();
        let info = store.create_collection("docs").await.unwrap();
        store
            .add(&info, &[record("a", vec![1.0, 0.0], "a.txt"), record("b", vec![0.0, 1.0], "b.txt")])
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteVectorStore::open(&path).await.unwrap();
        let info2 = reopened.get_collection("docs").await.unwrap().unwrap();
        assert_eq!(info2, info);
        assert_eq!(reopened.count(&info2).await.unwrap(), 2);

        let hits = reopened.query(&info2, &[0.0, 1.0], 1).await.unwrap();
        assert_eq!(hits[0].id, "b");
        assert_eq!(hits[0].metadata.source_file_name, "b.txt");
    }

    #[tokio::test]
    async fn test_duplicate_create_is_already_exists() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&tmp.path().join("s.sqlite")).await.unwrap();
        store.create_collection("docs").await.unwrap();
        let err = store.create_collection("docs").await.unwrap_err();
        assert_eq!(err, StoreError::AlreadyExists("docs".into()));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_collection_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&tmp.path().join("s.sqlite")).await.unwrap();
        let info = store.create_collection("docs").await.unwrap();
        store.add(&info, &[record("a", vec![0.5; 4], "a")]).await.unwrap();

        let err = store.add(&info, &[record("b", vec![0.5; 8], "b")]).await.unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch(_)));
        assert_eq!(store.count(&info).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_of_other_dimension_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&tmp.path().join("s.sqlite")).await.unwrap();
        let info = store.create_collection("docs").await.unwrap();
        assert!(store.query(&info, &[1.0; 8], 1).await.unwrap().is_empty());

        store.add(&info, &[record("a", vec![0.5; 4], "a")]).await.unwrap();
        let err = store.query(&info, &[0.5; 8], 1).await.unwrap_err();
        assert_eq!(err, StoreError::dimension_mismatch(4, 8));
    }

    #[tokio::test]
    async fn test_delete_then_recreate_resets_dimension() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&tmp.path().join("s.sqlite")).await.unwrap();
        let info = store.create_collection("docs").await.unwrap();
        store.add(&info, &[record("a", vec![0.5; 4], "a")]).await.unwrap();

        store.delete_collection("docs").await.unwrap();
        assert!(matches!(
            store.count(&info).await.unwrap_err(),
            StoreError::NotFound(_)
        ));

        let fresh = store.create_collection("docs").await.unwrap();
        store.add(&fresh, &[record("b", vec![0.5; 8], "b")]).await.unwrap();
        assert_eq!(store.count(&fresh).await.unwrap(), 1);
        assert!(matches!(
            store.delete_collection("missing").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
