//! Collection lifecycle and dimension-drift recovery.
//!
//! A collection moves through these states:
//!
//! ```text
//! ABSENT ──get_or_create──▶ EMPTY ──store(D)──▶ NON_EMPTY(D)
//!                             ▲                      │
//!                             └────────reset─────────┘
//! ```
//!
//! `NON_EMPTY(D)` rejects vectors of any other dimension. When that happens
//! during ingestion (typically after switching embedding models),
//! [`CollectionManager::store_with_recovery`] resets the collection and
//! retries the store exactly once. Resetting discards every previously
//! stored record; the retry's outcome is reported either way.

use std::sync::Arc;

use crate::error::{Error, Result, StoreError};
use crate::models::{Chunk, QueryHit, RecordMetadata, StoredRecord};
use crate::store::{CollectionInfo, VectorStore};

/// Handle to a live collection in a [`VectorStore`].
#[derive(Clone)]
pub struct Collection {
    info: CollectionInfo,
    store: Arc<dyn VectorStore>,
}

impl Collection {
    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.info
    }

    pub async fn add(&self, records: &[StoredRecord]) -> Result<()> {
        Ok(self.store.add(&self.info, records).await?)
    }

    pub async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<QueryHit>> {
        Ok(self.store.query(&self.info, embedding, n_results).await?)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.store.count(&self.info).await?)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("info", &self.info)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

/// Result of [`CollectionManager::store_with_recovery`].
#[derive(Debug)]
pub struct StoreOutcome {
    /// The collection the records ended up in (a new handle after a reset).
    pub collection: Collection,
    pub stored: usize,
    /// Whether a dimension mismatch forced a reset.
    pub reset: bool,
}

pub struct CollectionManager {
    store: Arc<dyn VectorStore>,
}

impl CollectionManager {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    fn handle(&self, info: CollectionInfo) -> Collection {
        Collection {
            info,
            store: self.store.clone(),
        }
    }

    /// Look up a collection without creating it.
    pub async fn get(&self, name: &str) -> Result<Option<Collection>> {
        Ok(self.store.get_collection(name).await?.map(|i| self.handle(i)))
    }

    /// Fetch the collection, creating it if absent.
    ///
    /// A concurrent creator winning the race shows up as
    /// [`StoreError::AlreadyExists`]; the collection is then fetched again.
    pub async fn get_or_create(&self, name: &str) -> Result<Collection> {
        if let Some(info) = self.store.get_collection(name).await? {
            return Ok(self.handle(info));
        }
        match self.store.create_collection(name).await {
            Ok(info) => {
                tracing::info!(collection = name, "created collection");
                Ok(self.handle(info))
            }
            Err(StoreError::AlreadyExists(_)) => self
                .store
                .get_collection(name)
                .await?
                .map(|info| self.handle(info))
                .ok_or_else(|| StoreError::NotFound(name.to_string()).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist `chunks` with their `embeddings` under `source_label`.
    ///
    /// Record ids are `"{source_label}_{chunk index}_{uuid}"`. All records
    /// are written in a single backend call.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] when the counts differ or the batch mixes
    ///   dimensions (nothing is written)
    /// - [`Error::Store`] for backend failures, including
    ///   [`StoreError::DimensionMismatch`]
    pub async fn store(
        &self,
        collection: &Collection,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        source_label: &str,
    ) -> Result<usize> {
        if chunks.len() != embeddings.len() {
            return Err(Error::validation(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        if let Some(first) = embeddings.first() {
            if let Some(bad) = embeddings.iter().find(|e| e.len() != first.len()) {
                return Err(Error::validation(format!(
                    "mixed embedding dimensions in one batch: {} and {}",
                    first.len(),
                    bad.len()
                )));
            }
        }
        if chunks.is_empty() {
            return Ok(0);
        }

        let timestamp = chrono::Utc::now().to_rfc3339();
        let records: Vec<StoredRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredRecord {
                id: format!(
                    "{}_{}_{}",
                    source_label,
                    chunk.index,
                    uuid::Uuid::new_v4().simple()
                ),
                document: chunk.text.clone(),
                embedding: embedding.clone(),
                metadata: RecordMetadata {
                    source_file_name: source_label.to_string(),
                    chunk_index: chunk.index,
                    start_offset: chunk.start_offset,
                    ingestion_timestamp: timestamp.clone(),
                },
            })
            .collect();

        collection.add(&records).await?;
        tracing::debug!(
            collection = collection.name(),
            source = source_label,
            count = records.len(),
            "stored chunks"
        );
        Ok(records.len())
    }

    /// Delete the collection if present. Absence is not an error.
    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.store.delete_collection(name).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop every record by deleting and recreating the collection.
    pub async fn reset(&self, name: &str) -> Result<Collection> {
        self.delete(name).await?;
        let collection = self.get_or_create(name).await?;
        tracing::info!(collection = name, "collection reset");
        Ok(collection)
    }

    /// [`store`](Self::store), resetting the collection and retrying once if
    /// the backend reports a dimension mismatch.
    pub async fn store_with_recovery(
        &self,
        collection: Collection,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        source_label: &str,
    ) -> Result<StoreOutcome> {
        match self.store(&collection, chunks, embeddings, source_label).await {
            Ok(stored) => Ok(StoreOutcome {
                collection,
                stored,
                reset: false,
            }),
            Err(e) if e.is_dimension_mismatch() => {
                tracing::warn!(
                    collection = collection.name(),
                    error = %e,
                    "embedding dimension changed; resetting collection and retrying"
                );
                let fresh = self.reset(collection.name()).await?;
                match self.store(&fresh, chunks, embeddings, source_label).await {
                    Ok(stored) => {
                        tracing::info!(
                            collection = fresh.name(),
                            stored,
                            "stored after collection reset"
                        );
                        Ok(StoreOutcome {
                            collection: fresh,
                            stored,
                            reset: true,
                        })
                    }
                    Err(retry_err) => {
                        tracing::error!(error = %retry_err, "store failed after collection reset");
                        Err(retry_err)
                    }
                }
            }
            Err(e) => Err(e),
        }
    }
}
