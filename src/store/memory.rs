//! In-memory [`VectorStore`] implementation for tests and throwaway runs.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety.
//! Queries are brute-force cosine distance over every record.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{QueryHit, StoredRecord};

use super::{
    batch_dimension, check_query_dimension, cosine_distance, nearest, CollectionInfo, VectorStore,
};

struct MemCollection {
    id: String,
    dimension: Option<usize>,
    records: Vec<StoredRecord>,
}

/// Volatile store; everything is lost when the process exits.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn live<'a>(
    map: &'a HashMap<String, MemCollection>,
    info: &CollectionInfo,
) -> Result<&'a MemCollection, StoreError> {
    map.get(&info.name)
        .filter(|c| c.id == info.id)
        .ok_or_else(|| StoreError::NotFound(info.name.clone()))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_collection(&self, name: &str) -> Result<Option<CollectionInfo>, StoreError> {
        let map = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(name).map(|c| CollectionInfo {
            id: c.id.clone(),
            name: name.to_string(),
        }))
    }

    async fn create_collection(&self, name: &str) -> Result<CollectionInfo, StoreError> {
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        map.insert(
            name.to_string(),
            MemCollection {
                id: id.clone(),
                dimension: None,
                records: Vec::new(),
            },
        );
        Ok(CollectionInfo {
            id,
            name: name.to_string(),
        })
    }

    async fn delete_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn add(&self, collection: &CollectionInfo, records: &[StoredRecord]) -> Result<(), StoreError> {
        let mut map = self.collections.write().unwrap_or_else(PoisonError::into_inner);
        let stored = map
            .get_mut(&collection.name)
            .filter(|c| c.id == collection.id)
            .ok_or_else(|| StoreError::NotFound(collection.name.clone()))?;

        if let Some(dim) = batch_dimension(stored.dimension, records)? {
            stored.dimension = Some(dim);
            stored.records.extend_from_slice(records);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionInfo,
        embedding: &[f32],
        n_results: usize,
    ) -> Result<Vec<QueryHit>, StoreError> {
        let map = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        let stored = live(&map, collection)?;
        check_query_dimension(stored.dimension, embedding)?;

        let hits = stored
            .records
            .iter()
            .map(|r| QueryHit {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(embedding, &r.embedding),
            })
            .collect();
        Ok(nearest(hits, n_results))
    }

    async fn count(&self, collection: &CollectionInfo) -> Result<usize, StoreError> {
        let map = self.collections.read().unwrap_or_else(PoisonError::into_inner);
        Ok(live(&map, collection)?.records.len())
    }
}
