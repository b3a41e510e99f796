//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the narrow interface the collection manager
//! needs from a vector database: named collections of records that can be
//! created, deleted, appended to and queried by similarity.
//!
//! | Backend | Type | Persistence |
//! |---------|------|-------------|
//! | `memory` | [`InMemoryVectorStore`] | process lifetime |
//! | `sqlite` | [`SqliteVectorStore`] | local database file |
//! | `chroma` | [`ChromaStore`] | remote Chroma server |
//!
//! A collection is either empty or holds records of a single embedding
//! dimension. Adding vectors of a different dimension fails with
//! [`StoreError::DimensionMismatch`] and leaves the collection unchanged;
//! so does querying it with a vector of another dimension.

pub mod chroma;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::embedding::cosine_similarity;
use crate::error::{Error, Result, StoreError};
use crate::models::{QueryHit, StoredRecord};

pub use chroma::{ChromaSettings, ChromaStore};
pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

/// Identity of a collection in a backend.
///
/// `id` changes when a collection is deleted and recreated under the same
/// name, so a stale handle is rejected with [`StoreError::NotFound`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub id: String,
    pub name: String,
}

/// Abstract vector database.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_collection`](VectorStore::get_collection) | Look up a collection by name |
/// | [`create_collection`](VectorStore::create_collection) | Create an empty collection |
/// | [`delete_collection`](VectorStore::delete_collection) | Drop a collection and its records |
/// | [`add`](VectorStore::add) | Append records atomically |
/// | [`query`](VectorStore::query) | Nearest records by distance |
/// | [`count`](VectorStore::count) | Number of records |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for diagnostics (`"memory"`, `"sqlite"`, `"chroma"`).
    fn backend_name(&self) -> &'static str;

    async fn get_collection(&self, name: &str) -> std::result::Result<Option<CollectionInfo>, StoreError>;

    /// Fails with [`StoreError::AlreadyExists`] if the name is taken.
    async fn create_collection(&self, name: &str) -> std::result::Result<CollectionInfo, StoreError>;

    /// Fails with [`StoreError::NotFound`] if there is no such collection.
    async fn delete_collection(&self, name: &str) -> std::result::Result<(), StoreError>;

    /// Append `records`. Either every record is stored or none is.
    async fn add(
        &self,
        collection: &CollectionInfo,
        records: &[StoredRecord],
    ) -> std::result::Result<(), StoreError>;

    /// Return up to `n_results` records ordered by ascending distance.
    async fn query(
        &self,
        collection: &CollectionInfo,
        embedding: &[f32],
        n_results: usize,
    ) -> std::result::Result<Vec<QueryHit>, StoreError>;

    async fn count(&self, collection: &CollectionInfo) -> std::result::Result<usize, StoreError>;
}

/// Check that every record in a batch has dimension `expected` (or the
/// first record's dimension when the collection is still empty).
///
/// Returns the batch dimension, or `None` for an empty batch.
pub(crate) fn batch_dimension(
    expected: Option<usize>,
    records: &[StoredRecord],
) -> std::result::Result<Option<usize>, StoreError> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let dim = expected.unwrap_or(first.embedding.len());
    for record in records {
        if record.embedding.len() != dim {
            return Err(StoreError::dimension_mismatch(dim, record.embedding.len()));
        }
    }
    Ok(Some(dim))
}

/// Reject a query vector whose length differs from the collection's
/// dimension. A collection with no dimension yet (never written) accepts any.
pub(crate) fn check_query_dimension(
    dimension: Option<usize>,
    embedding: &[f32],
) -> std::result::Result<(), StoreError> {
    match dimension {
        Some(dim) if dim != embedding.len() => {
            Err(StoreError::dimension_mismatch(dim, embedding.len()))
        }
        _ => Ok(()),
    }
}

/// Cosine distance (`1 - cosine similarity`) used by the local backends.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Keep the `n_results` closest hits. The sort is stable, so ties keep
/// insertion order.
pub(crate) fn nearest(mut hits: Vec<QueryHit>, n_results: usize) -> Vec<QueryHit> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(n_results);
    hits
}

/// Build the store selected by `[store].backend`.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryVectorStore::new())),
        "sqlite" => Ok(Arc::new(SqliteVectorStore::open(&config.path).await?)),
        "chroma" => Ok(Arc::new(ChromaStore::new(ChromaSettings::from_env()?)?)),
        other => Err(Error::config(format!(
            "unknown store backend: '{}'. Must be sqlite, memory, or chroma.",
            other
        ))),
    }
}
