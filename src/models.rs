//! Core data models used throughout the pipeline.
//!
//! These types represent the chunks, stored records, and query hits that
//! flow through ingestion and retrieval.

use serde::{Deserialize, Serialize};

/// A contiguous window of a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position within the source's chunk sequence.
    pub index: usize,
    /// Offset of the first character, counted in characters.
    pub start_offset: usize,
    pub text: String,
}

/// Per-record metadata persisted alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecordMetadata {
    #[serde(default)]
    pub source_file_name: String,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub start_offset: usize,
    /// RFC 3339 UTC timestamp of the ingestion run.
    #[serde(default)]
    pub ingestion_timestamp: String,
}

/// A record ready to be added to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A ranked result of a similarity query (lower distance = closer).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub document: String,
    pub metadata: RecordMetadata,
    pub distance: f32,
}
