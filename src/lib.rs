//! # docrag
//!
//! Retrieval-augmented question answering over local documents.
//!
//! Documents are split into overlapping character windows, embedded through
//! an external embedding API, and stored in a vector collection. Questions
//! are embedded the same way; the nearest chunks become the context for a
//! text-generation model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │ extract  │──▶│  chunk   │──▶│  embedding   │──▶│  collection  │
//! │ txt/pdf/ │   │ sliding  │   │ zero-vector  │   │ reset + retry│
//! │ docx     │   │ window   │   │ degradation  │   │ on dim drift │
//! └──────────┘   └──────────┘   └──────────────┘   └──────┬───────┘
//!                                                         │ top-K
//!                           ┌──────────────┐       ┌──────▼───────┐
//!                           │    cache     │◀─────▶│   generate   │
//!                           └──────────────┘       │ retry/quota  │
//!                                                  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`embedding`] | Embedding client and vector utilities |
//! | [`cache`] | Response cache |
//! | [`generate`] | Prompt building, retries and quota handling |
//! | [`gemini`] | Google Gemini adapter |
//! | [`ollama`] | Local Ollama adapter |
//! | [`store`] | Vector store trait and backends |
//! | [`collection`] | Collection lifecycle |
//! | [`extract`] | Text extraction |
//! | [`sources`] | Input file discovery |
//! | [`progress`] | Ingest progress reporting |
//! | [`pipeline`] | Ingest and ask orchestration |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | SQLite schema |

pub mod cache;
pub mod chunk;
pub mod collection;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod gemini;
pub mod generate;
pub mod migrate;
pub mod models;
pub mod ollama;
pub mod pipeline;
pub mod progress;
pub mod sources;
pub mod store;
