//! Ingestion and question-answering orchestration.
//!
//! ```text
//! ingest:  files ─▶ extract ─▶ chunk ─▶ embed ─▶ store_with_recovery
//! ask:     question ─▶ embed ─▶ top-K query ─▶ context ─▶ generate
//! ```
//!
//! The [`Pipeline`] owns every collaborator explicitly: the embedding
//! client, the response generator (with its cache) and the collection
//! manager are built once in [`Pipeline::from_config`] or injected through
//! [`Pipeline::new`] (tests pass fakes this way).

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::chunk::chunk_text;
use crate::collection::{Collection, CollectionManager};
use crate::config::{Config, EmbeddingConfig, GenerationConfig, IngestConfig};
use crate::embedding::{EmbeddingClient, EmbeddingService};
use crate::error::{Error, Result};
use crate::extract::extract_file;
use crate::gemini::GeminiClient;
use crate::generate::{GenerationService, ResponseGenerator};
use crate::models::QueryHit;
use crate::ollama::OllamaClient;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::sources::collect_files;
use crate::store::{create_store, VectorStore};

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_ingested: usize,
    pub files_skipped: usize,
    pub chunks_stored: usize,
    /// Chunks whose embedding failed (stored as zero vectors unless skipped).
    pub degraded_chunks: usize,
    /// Number of collection resets caused by a dimension change.
    pub resets: usize,
}

/// A generated answer with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<QueryHit>,
}

pub struct Pipeline {
    embedder: EmbeddingClient,
    generator: ResponseGenerator,
    collections: CollectionManager,
    collection_name: String,
    chunk_size: usize,
    overlap: usize,
    top_k: usize,
    skip_degraded: bool,
    ingest: IngestConfig,
}

impl Pipeline {
    /// Assemble a pipeline from already-built collaborators.
    pub fn new(
        config: &Config,
        embedder: EmbeddingClient,
        generator: ResponseGenerator,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            embedder,
            generator,
            collections: CollectionManager::new(store),
            collection_name: config.store.collection.clone(),
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            top_k: config.retrieval.top_k,
            skip_degraded: config.embedding.skip_degraded,
            ingest: config.ingest.clone(),
        }
    }

    /// Build the configured providers and store.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when a provider's credentials are missing
    /// (`GOOGLE_API_KEY`, `CHROMA_*`) or the store cannot be opened.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = EmbeddingClient::new(embedding_service(&config.embedding)?)
            .with_fallback_dims(config.embedding.fallback_dims)
            .with_concurrency(config.embedding.concurrency);
        let generator = response_generator(&config.generation)?;
        let store = create_store(&config.store).await?;
        Ok(Self::new(config, embedder, generator, store))
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn generator(&self) -> &ResponseGenerator {
        &self.generator
    }

    /// Ingest every supported file under `paths`.
    pub async fn ingest_paths(
        &self,
        paths: &[PathBuf],
        progress: &dyn IngestProgressReporter,
    ) -> Result<IngestReport> {
        progress.report(IngestProgressEvent::Discovering);
        let files = collect_files(paths, &self.ingest.exclude_globs, self.ingest.follow_symlinks)?;
        let total = files.len() as u64;

        let mut collection = self.collections.get_or_create(&self.collection_name).await?;
        let mut report = IngestReport::default();

        for (i, path) in files.iter().enumerate() {
            let label = source_label(path);
            progress.report(IngestProgressEvent::Processing {
                file: label.clone(),
                n: i as u64 + 1,
                total,
            });

            let text = match extract_file(path) {
                Ok(Some(text)) if !text.trim().is_empty() => text,
                Ok(Some(_)) => {
                    report.files_skipped += 1;
                    progress.report(skipped(&label, "no extractable text"));
                    continue;
                }
                Ok(None) => {
                    tracing::debug!(file = %path.display(), "unsupported file type, skipping");
                    report.files_skipped += 1;
                    progress.report(skipped(&label, "unsupported file type"));
                    continue;
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "extraction failed, skipping");
                    report.files_skipped += 1;
                    progress.report(skipped(&label, &e.to_string()));
                    continue;
                }
            };

            collection = self
                .ingest_into(collection, &label, &text, &mut report, progress)
                .await?;
        }

        tracing::info!(
            files = report.files_ingested,
            skipped = report.files_skipped,
            chunks = report.chunks_stored,
            degraded = report.degraded_chunks,
            resets = report.resets,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Ingest in-memory text under `label`.
    pub async fn ingest_text(&self, label: &str, text: &str) -> Result<IngestReport> {
        let collection = self.collections.get_or_create(&self.collection_name).await?;
        let mut report = IngestReport::default();
        self.ingest_into(collection, label, text, &mut report, &NoProgress)
            .await?;
        Ok(report)
    }

    async fn ingest_into(
        &self,
        collection: Collection,
        label: &str,
        text: &str,
        report: &mut IngestReport,
        progress: &dyn IngestProgressReporter,
    ) -> Result<Collection> {
        let mut chunks = chunk_text(text, self.chunk_size, self.overlap)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let batch = self.embedder.embed_batch(&texts).await;
        let degraded = batch.degraded_count();
        let mut vectors = batch.vectors;

        if self.skip_degraded && degraded > 0 {
            tracing::warn!(file = label, degraded, "dropping chunks whose embedding failed");
            let keep = batch.degraded.iter().map(|d| !d);
            let (kept_chunks, kept_vectors): (Vec<_>, Vec<_>) = chunks
                .into_iter()
                .zip(vectors)
                .zip(keep)
                .filter(|(_, keep)| *keep)
                .map(|(pair, _)| pair)
                .unzip();
            chunks = kept_chunks;
            vectors = kept_vectors;
        }

        let outcome = self
            .collections
            .store_with_recovery(collection, &chunks, &vectors, label)
            .await?;

        report.files_ingested += 1;
        report.chunks_stored += outcome.stored;
        report.degraded_chunks += degraded;
        if outcome.reset {
            report.resets += 1;
        }
        progress.report(IngestProgressEvent::Stored {
            file: label.to_string(),
            chunks: outcome.stored as u64,
            degraded: degraded as u64,
            reset: outcome.reset,
        });
        Ok(outcome.collection)
    }

    /// Retrieve the closest chunks for `question` without generating.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<QueryHit>> {
        let collection = match self.collections.get(&self.collection_name).await? {
            Some(c) if c.count().await? > 0 => c,
            _ => return Err(Error::NoDocuments(self.collection_name.clone())),
        };
        let batch = self.embedder.embed_query(question).await;
        if batch.degraded_count() > 0 {
            tracing::warn!("question embedding failed; results are not meaningful");
        }
        let query = batch.vectors.into_iter().next().unwrap_or_default();
        collection.query(&query, top_k.max(1)).await
    }

    /// Answer `question` from the top-K retrieved chunks.
    ///
    /// # Errors
    ///
    /// [`Error::NoDocuments`] when nothing has been ingested yet, and a
    /// store dimension mismatch when the question embedding does not match
    /// the stored vectors (e.g. after switching embedding models without
    /// re-ingesting). Generation failures are not errors; they come back as
    /// the answer text.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        self.ask_with_top_k(question, self.top_k).await
    }

    pub async fn ask_with_top_k(&self, question: &str, top_k: usize) -> Result<Answer> {
        let sources = self.retrieve(question, top_k).await?;
        let context = sources
            .iter()
            .map(|h| h.document.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let text = self.generator.generate(question, &context).await;
        Ok(Answer { text, sources })
    }

    /// Remove every stored record.
    pub async fn reset(&self) -> Result<()> {
        self.collections.reset(&self.collection_name).await?;
        Ok(())
    }

    /// Number of stored records (0 when the collection does not exist).
    pub async fn count(&self) -> Result<usize> {
        match self.collections.get(&self.collection_name).await? {
            Some(c) => c.count().await,
            None => Ok(0),
        }
    }
}

fn skipped(file: &str, reason: &str) -> IngestProgressEvent {
    IngestProgressEvent::Skipped {
        file: file.to_string(),
        reason: reason.to_string(),
    }
}

/// File name used as the record label.
fn source_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Build the embedding adapter selected by `[embedding].provider`.
pub fn embedding_service(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingService>> {
    match config.provider.as_str() {
        "gemini" => {
            let mut client = GeminiClient::from_env(config.model.clone(), config.timeout_secs)?
                .with_output_dims(config.dims);
            if let Some(url) = &config.url {
                client = client.with_base_url(url.clone());
            }
            Ok(Arc::new(client))
        }
        "ollama" => Ok(Arc::new(OllamaClient::new(
            config.url.as_deref(),
            config.model.clone(),
            config.timeout_secs,
        )?)),
        other => Err(Error::config(format!("unknown embedding provider: '{}'", other))),
    }
}

/// Build the generation adapter selected by `[generation].provider`.
pub fn generation_service(config: &GenerationConfig) -> Result<Arc<dyn GenerationService>> {
    match config.provider.as_str() {
        "gemini" => {
            let mut client = GeminiClient::from_env(config.model.clone(), config.timeout_secs)?;
            if let Some(url) = &config.url {
                client = client.with_base_url(url.clone());
            }
            Ok(Arc::new(client))
        }
        "ollama" => Ok(Arc::new(OllamaClient::new(
            config.url.as_deref(),
            config.model.clone(),
            config.timeout_secs,
        )?)),
        other => Err(Error::config(format!("unknown generation provider: '{}'", other))),
    }
}

fn response_generator(config: &GenerationConfig) -> Result<ResponseGenerator> {
    let cache = match config.cache_capacity {
        Some(capacity) => ResponseCache::with_capacity(capacity),
        None => ResponseCache::new(),
    };
    Ok(
        ResponseGenerator::new(generation_service(config)?, Arc::new(cache))
            .with_max_retries(config.max_retries)
            .with_context_prefix_chars(config.context_prefix_chars),
    )
}
