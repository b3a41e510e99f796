//! Embedding generation with dimension-consistency enforcement.
//!
//! [`EmbeddingService`] is the narrow interface to an external embedding
//! API (one text in, one vector out). [`EmbeddingClient`] drives it over a
//! batch of chunks and guarantees that its output is always usable for
//! storage:
//!
//! - exactly one vector per input chunk, in input order;
//! - every vector has the same dimension;
//! - a failed chunk becomes a zero vector instead of an error.
//!
//! # Dimension Policy
//!
//! The reference dimension is the length of the first successful vector
//! *by input position* (never by completion order, so concurrent requests
//! stay deterministic). Failed chunks are zero-filled to that dimension.
//! If every chunk failed, all vectors use the fallback dimension
//! ([`DEFAULT_FALLBACK_DIMS`] unless configured). Successful vectors whose
//! length differs from the reference are zero-padded or truncated.
//!
//! Also provides vector utilities shared by the local stores:
//! - [`cosine_similarity`]: similarity between two vectors
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian f32 BLOB encoding

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::error::ServiceError;

/// Dimension used when no chunk in a batch could be embedded.
pub const DEFAULT_FALLBACK_DIMS: usize = 768;

/// An external embedding API.
///
/// Implementations map provider failures into [`ServiceError`]; the
/// [`EmbeddingClient`] decides what to do with them.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-embedding-001"`).
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

/// Output of [`EmbeddingClient::embed_batch`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    /// One vector per input chunk, all of length `dimension`.
    pub vectors: Vec<Vec<f32>>,
    /// `true` where the chunk failed and its vector is a zero placeholder.
    pub degraded: Vec<bool>,
    /// Shared dimension of `vectors` (0 for an empty batch).
    pub dimension: usize,
}

impl EmbeddingBatch {
    pub fn degraded_count(&self) -> usize {
        self.degraded.iter().filter(|d| **d).count()
    }
}

/// Batch embedding driver over an [`EmbeddingService`].
#[derive(Clone)]
pub struct EmbeddingClient {
    service: Arc<dyn EmbeddingService>,
    fallback_dims: usize,
    concurrency: usize,
}

impl EmbeddingClient {
    /// Sequential client with the default fallback dimension.
    pub fn new(service: Arc<dyn EmbeddingService>) -> Self {
        Self {
            service,
            fallback_dims: DEFAULT_FALLBACK_DIMS,
            concurrency: 1,
        }
    }

    pub fn with_fallback_dims(mut self, dims: usize) -> Self {
        self.fallback_dims = dims.max(1);
        self
    }

    /// Maximum number of in-flight requests (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn model_name(&self) -> &str {
        self.service.model_name()
    }

    /// Embed `chunks`, returning one vector per chunk.
    pub async fn embed(&self, chunks: &[String]) -> Vec<Vec<f32>> {
        self.embed_batch(chunks).await.vectors
    }

    /// Embed a single query text.
    pub async fn embed_query(&self, text: &str) -> EmbeddingBatch {
        self.embed_batch(&[text.to_string()]).await
    }

    /// Embed `chunks`, returning vectors together with per-chunk failure flags.
    pub async fn embed_batch(&self, chunks: &[String]) -> EmbeddingBatch {
        if chunks.is_empty() {
            return EmbeddingBatch {
                vectors: Vec::new(),
                degraded: Vec::new(),
                dimension: 0,
            };
        }

        let service = &self.service;
        let results: Vec<Result<Vec<f32>, ServiceError>> = stream::iter(chunks.iter())
            .map(|text| async move { service.embed_one(text).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (i, result) in results.iter().enumerate() {
            match result {
                Err(e) => {
                    tracing::warn!(chunk = i, error = %e, "embedding failed, substituting zero vector")
                }
                Ok(v) if v.is_empty() => {
                    tracing::warn!(chunk = i, "empty embedding returned, substituting zero vector")
                }
                Ok(_) => {}
            }
        }

        let batch = standardize(results, self.fallback_dims);
        tracing::info!(
            count = batch.vectors.len(),
            dimension = batch.dimension,
            degraded = batch.degraded_count(),
            "generated embeddings"
        );
        batch
    }
}

/// Apply the dimension policy to raw per-chunk results.
fn standardize(results: Vec<Result<Vec<f32>, ServiceError>>, fallback_dims: usize) -> EmbeddingBatch {
    // An empty vector counts as a failure, not as a dimension of zero.
    let results: Vec<Option<Vec<f32>>> = results
        .into_iter()
        .map(|r| r.ok().filter(|v| !v.is_empty()))
        .collect();
    let dimension = results
        .iter()
        .find_map(|r| r.as_ref().map(Vec::len))
        .unwrap_or(fallback_dims);

    let mut vectors = Vec::with_capacity(results.len());
    let mut degraded = Vec::with_capacity(results.len());

    for result in results {
        match result {
            Some(mut v) => {
                v.resize(dimension, 0.0);
                vectors.push(v);
                degraded.push(false);
            }
            None => {
                vectors.push(vec![0.0; dimension]);
                degraded.push(true);
            }
        }
    }

    EmbeddingBatch {
        vectors,
        degraded,
        dimension,
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docrag::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, and zero vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails for texts starting with "fail", otherwise returns `dims` copies of `len`.
    struct FakeService {
        dims: usize,
        calls: AtomicUsize,
    }

    impl FakeService {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingService for FakeService {
        fn model_name(&self) -> &str {
            "fake"
        }

        async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.starts_with("fail") {
                return Err(ServiceError::Other("boom".into()));
            }
            Ok(vec![text.len() as f32; self.dims])
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let service = Arc::new(FakeService::new(4));
        let client = EmbeddingClient::new(service.clone());
        let batch = client.embed_batch(&[]).await;
        assert!(batch.vectors.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_success() {
        let client = EmbeddingClient::new(Arc::new(FakeService::new(4)));
        let vectors = client.embed(&strings(&["a", "bb", "ccc"])).await;
        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 4));
        assert_eq!(vectors[2][0], 3.0);
    }

    #[tokio::test]
    async fn test_first_fails_later_succeeds() {
        let client = EmbeddingClient::new(Arc::new(FakeService::new(5)));
        let batch = client.embed_batch(&strings(&["fail-0", "ok"])).await;
        assert_eq!(batch.dimension, 5);
        assert_eq!(batch.vectors[0], vec![0.0; 5]);
        assert_eq!(batch.vectors[1], vec![2.0; 5]);
        assert_eq!(batch.degraded, vec![true, false]);
    }

    #[tokio::test]
    async fn test_all_fail_uses_fallback() {
        let client = EmbeddingClient::new(Arc::new(FakeService::new(5))).with_fallback_dims(16);
        let batch = client.embed_batch(&strings(&["fail-a", "fail-b"])).await;
        assert_eq!(batch.dimension, 16);
        assert!(batch.vectors.iter().all(|v| v == &vec![0.0; 16]));
        assert_eq!(batch.degraded_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_preserves_order() {
        let client = EmbeddingClient::new(Arc::new(FakeService::new(2))).with_concurrency(4);
        let input = strings(&["a", "bb", "fail", "dddd", "eeeee"]);
        let batch = client.embed_batch(&input).await;
        let firsts: Vec<f32> = batch.vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 0.0, 4.0, 5.0]);
    }

    #[test]
    fn test_standardize_pads_and_truncates() {
        let results = vec![
            Ok(vec![1.0, 1.0, 1.0]),
            Ok(vec![2.0]),
            Ok(vec![3.0, 3.0, 3.0, 3.0]),
        ];
        let batch = standardize(results, 768);
        assert_eq!(batch.dimension, 3);
        assert_eq!(batch.vectors[1], vec![2.0, 0.0, 0.0]);
        assert_eq!(batch.vectors[2], vec![3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_empty_success_is_degraded() {
        let results = vec![Ok(vec![]), Ok(vec![1.0, 2.0]), Ok(vec![])];
        let batch = standardize(results, 768);
        assert_eq!(batch.dimension, 2);
        assert_eq!(batch.degraded, vec![true, false, true]);
        assert_eq!(batch.vectors[0], vec![0.0, 0.0]);

        let batch = standardize(vec![Ok(vec![])], 8);
        assert_eq!(batch.dimension, 8);
        assert_eq!(batch.degraded_count(), 1);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
