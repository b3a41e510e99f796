//! Error taxonomy for the retrieval pipeline.
//!
//! Three layers of errors flow through the crate:
//!
//! | Type | Raised by | Handling |
//! |------|-----------|----------|
//! | [`ServiceError`] | embedding / generation adapters | absorbed into zero vectors or advisory strings |
//! | [`StoreError`] | [`VectorStore`](crate::store::VectorStore) backends | dimension mismatches trigger one reset + retry |
//! | [`Error`] | collection manager, pipeline, config | surfaced to the caller |
//!
//! Provider-specific failure shapes are mapped into [`ServiceError`] once,
//! at the adapter boundary, so call sites match on variants instead of
//! re-parsing error strings.

use thiserror::Error;

use crate::extract::ExtractError;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the pipeline to its caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration. Fatal before any operation runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller misuse: chunk/embedding count mismatch or mixed dimensions.
    #[error("validation error: {0}")]
    Validation(String),

    /// Vector store failure (including unrecovered dimension mismatches).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Text extraction failed for a file.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// A query was issued against an empty or absent collection.
    #[error("no documents in collection '{0}'; ingest documents first")]
    NoDocuments(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is a dimension mismatch reported by the store.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Error::Store(StoreError::DimensionMismatch(_)))
    }
}

/// Errors reported by a [`VectorStore`](crate::store::VectorStore) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("collection '{0}' does not exist")]
    NotFound(String),

    #[error("collection '{0}' already exists")]
    AlreadyExists(String),

    /// Vectors of a different dimension than the collection already holds.
    #[error("embedding dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("vector store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch(format!(
            "collection expects dimension {}, got {}",
            expected, actual
        ))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Failure of an external embedding or generation call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Quota or rate limit exhausted (HTTP 429 / `RESOURCE_EXHAUSTED`). Terminal.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Transient overload (HTTP 503 / `UNAVAILABLE`). Retryable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Any other failure. Terminal.
    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Classify a provider error description.
    ///
    /// - contains `429` or `RESOURCE_EXHAUSTED` → [`ServiceError::QuotaExhausted`]
    /// - contains `503` or `UNAVAILABLE` → [`ServiceError::Unavailable`]
    /// - anything else → [`ServiceError::Other`]
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("429") || message.contains("RESOURCE_EXHAUSTED") {
            ServiceError::QuotaExhausted(message)
        } else if message.contains("503") || message.contains("UNAVAILABLE") {
            ServiceError::Unavailable(message)
        } else {
            ServiceError::Other(message)
        }
    }

    /// Classify a non-success HTTP response from a provider.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("{} API error {}: {}", provider, status, body);
        match status.as_u16() {
            429 => ServiceError::QuotaExhausted(message),
            503 => ServiceError::Unavailable(message),
            _ => ServiceError::classify(message),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Other(err.to_string())
    }
}
