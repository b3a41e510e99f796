//! Remote [`VectorStore`] backed by a Chroma server (v2 REST API).
//!
//! Connection settings come from the environment:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `CHROMA_URL` | server base URL |
//! | `CHROMA_API_KEY` | bearer token |
//! | `CHROMA_TENANT` | tenant name |
//! | `CHROMA_DATABASE` | database name |
//!
//! Chroma error responses are mapped into [`StoreError`]: HTTP 409 or
//! "already exists" → `AlreadyExists`, HTTP 404 or "does not exist" →
//! `NotFound`, any message mentioning a dimension → `DimensionMismatch`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result, StoreError};
use crate::models::{QueryHit, RecordMetadata, StoredRecord};

use super::{CollectionInfo, VectorStore};

pub const ENV_URL: &str = "CHROMA_URL";
pub const ENV_API_KEY: &str = "CHROMA_API_KEY";
pub const ENV_TENANT: &str = "CHROMA_TENANT";
pub const ENV_DATABASE: &str = "CHROMA_DATABASE";

#[derive(Debug, Clone)]
pub struct ChromaSettings {
    pub url: String,
    pub api_key: String,
    pub tenant: String,
    pub database: String,
}

impl ChromaSettings {
    /// Read all four settings; any missing variable is a configuration error.
    pub fn from_env() -> Result<Self> {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        match (read(ENV_URL), read(ENV_API_KEY), read(ENV_TENANT), read(ENV_DATABASE)) {
            (Some(url), Some(api_key), Some(tenant), Some(database)) => Ok(Self {
                url,
                api_key,
                tenant,
                database,
            }),
            _ => Err(Error::config(format!(
                "{}, {}, {}, and {} must be set to use the chroma backend",
                ENV_URL, ENV_API_KEY, ENV_TENANT, ENV_DATABASE
            ))),
        }
    }
}

pub struct ChromaStore {
    http: reqwest::Client,
    settings: ChromaSettings,
}

#[derive(Deserialize)]
struct CollectionModel {
    id: String,
    name: String,
}

#[derive(Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<RecordMetadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl ChromaStore {
    pub fn new(settings: ChromaSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, settings })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.settings.url.trim_end_matches('/'),
            self.settings.tenant,
            self.settings.database
        )
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.settings.api_key)
    }

    async fn send(&self, builder: reqwest::RequestBuilder, name: &str) -> std::result::Result<reqwest::Response, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(name, status, &body))
    }
}

fn classify_error(name: &str, status: reqwest::StatusCode, body: &str) -> StoreError {
    let lower = body.to_lowercase();
    if status == reqwest::StatusCode::CONFLICT || lower.contains("already exists") {
        StoreError::AlreadyExists(name.to_string())
    } else if status == reqwest::StatusCode::NOT_FOUND || lower.contains("does not exist") {
        StoreError::NotFound(name.to_string())
    } else if lower.contains("dimension") {
        StoreError::DimensionMismatch(body.to_string())
    } else {
        StoreError::backend(format!("chroma error {}: {}", status, body))
    }
}

fn hits_from_response(response: QueryResponse) -> Vec<QueryHit> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = response
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();
    let distances = response
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| QueryHit {
            id,
            document: documents.get(i).cloned().flatten().unwrap_or_default(),
            metadata: metadatas.get(i).cloned().flatten().unwrap_or_default(),
            distance: distances.get(i).copied().flatten().unwrap_or(f32::MAX),
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaStore {
    fn backend_name(&self) -> &'static str {
        "chroma"
    }

    async fn get_collection(&self, name: &str) -> std::result::Result<Option<CollectionInfo>, StoreError> {
        let url = format!("{}/{}", self.collections_url(), name);
        match self.send(self.request(reqwest::Method::GET, url), name).await {
            Ok(response) => {
                let model: CollectionModel = response.json().await?;
                Ok(Some(CollectionInfo {
                    id: model.id,
                    name: model.name,
                }))
            }
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_collection(&self, name: &str) -> std::result::Result<CollectionInfo, StoreError> {
        let body = serde_json::json!({ "name": name, "get_or_create": false });
        let builder = self
            .request(reqwest::Method::POST, self.collections_url())
            .json(&body);
        let model: CollectionModel = self.send(builder, name).await?.json().await?;
        Ok(CollectionInfo {
            id: model.id,
            name: model.name,
        })
    }

    async fn delete_collection(&self, name: &str) -> std::result::Result<(), StoreError> {
        let url = format!("{}/{}", self.collections_url(), name);
        self.send(self.request(reqwest::Method::DELETE, url), name)
            .await?;
        Ok(())
    }

    async fn add(
        &self,
        collection: &CollectionInfo,
        records: &[StoredRecord],
    ) -> std::result::Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let body = serde_json::json!({
            "ids": records.iter().map(|r| &r.id).collect::<Vec<_>>(),
            "embeddings": records.iter().map(|r| &r.embedding).collect::<Vec<_>>(),
            "documents": records.iter().map(|r| &r.document).collect::<Vec<_>>(),
            "metadatas": records.iter().map(|r| &r.metadata).collect::<Vec<_>>(),
        });
        let url = format!("{}/{}/add", self.collections_url(), collection.id);
        self.send(
            self.request(reqwest::Method::POST, url).json(&body),
            &collection.name,
        )
        .await?;
        Ok(())
    }

    async fn query(
        &self,
        collection: &CollectionInfo,
        embedding: &[f32],
        n_results: usize,
    ) -> std::result::Result<Vec<QueryHit>, StoreError> {
        let body = serde_json::json!({
            "query_embeddings": [embedding],
            "n_results": n_results,
            "include": ["documents", "metadatas", "distances"],
        });
        let url = format!("{}/{}/query", self.collections_url(), collection.id);
        let response: QueryResponse = self
            .send(
                self.request(reqwest::Method::POST, url).json(&body),
                &collection.name,
            )
            .await?
            .json()
            .await?;
        Ok(hits_from_response(response))
    }

    async fn count(&self, collection: &CollectionInfo) -> std::result::Result<usize, StoreError> {
        let url = format!("{}/{}/count", self.collections_url(), collection.id);
        let count: usize = self
            .send(self.request(reqwest::Method::GET, url), &collection.name)
            .await?
            .json()
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_classify_error() {
        assert_eq!(
            classify_error("c", StatusCode::CONFLICT, ""),
            StoreError::AlreadyExists("c".into())
        );
        assert_eq!(
            classify_error("c", StatusCode::BAD_REQUEST, "Collection c does not exist."),
            StoreError::NotFound("c".into())
        );
        assert!(matches!(
            classify_error(
                "c",
                StatusCode::BAD_REQUEST,
                "Collection expecting embedding with dimension of 384, got 768"
            ),
            StoreError::DimensionMismatch(_)
        ));
        assert!(matches!(
            classify_error("c", StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn test_hits_from_response() {
        let json = r#"{
            "ids": [["a", "b"]],
            "documents": [["first", null]],
            "metadatas": [[{"source_file_name": "f.txt", "chunk_index": 2}, null]],
            "distances": [[0.1, 0.4]]
        }"#;
        let response: QueryResponse = serde_json::from_str(json).unwrap();
        let hits = hits_from_response(response);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document, "first");
        assert_eq!(hits[0].metadata.chunk_index, 2);
        assert_eq!(hits[1].document, "");
        assert!((hits[1].distance - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_collections_url() {
        let store = ChromaStore::new(ChromaSettings {
            url: "https://chroma.example.com/".into(),
            api_key: "k".into(),
            tenant: "t".into(),
            database: "d".into(),
        })
        .unwrap();
        assert_eq!(
            store.collections_url(),
            "https://chroma.example.com/api/v2/tenants/t/databases/d/collections"
        );
    }
}
