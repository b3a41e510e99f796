//! TOML configuration.
//!
//! Every section and key is optional; omitted values take the defaults
//! below. Secrets never live in the file: API keys and Chroma connection
//! settings are read from the environment when the matching provider or
//! backend is built.
//!
//! ```toml
//! [chunking]
//! chunk_size = 500
//! overlap = 50
//!
//! [embedding]
//! provider = "gemini"            # gemini | ollama
//! model = "gemini-embedding-001"
//! fallback_dims = 768
//!
//! [generation]
//! provider = "gemini"
//! model = "gemini-2.5-flash"
//! max_retries = 3
//!
//! [retrieval]
//! top_k = 3
//!
//! [store]
//! backend = "sqlite"             # sqlite | memory | chroma
//! path = "./data/docrag.sqlite"
//! collection = "rag_documents"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{self, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "./config/docrag.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Requested output dimensionality (Gemini only).
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_fallback_dims")]
    pub fallback_dims: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Drop chunks whose embedding failed instead of storing zero vectors.
    #[serde(default)]
    pub skip_degraded: bool,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dims: None,
            fallback_dims: default_fallback_dims(),
            concurrency: default_concurrency(),
            skip_degraded: false,
            timeout_secs: default_embedding_timeout(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    crate::gemini::DEFAULT_EMBEDDING_MODEL.to_string()
}
fn default_fallback_dims() -> usize {
    crate::embedding::DEFAULT_FALLBACK_DIMS
}
fn default_concurrency() -> usize {
    1
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_context_prefix_chars")]
    pub context_prefix_chars: usize,
    /// Bound the response cache (LRU). Unbounded when absent.
    #[serde(default)]
    pub cache_capacity: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_generation_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout(),
            context_prefix_chars: default_context_prefix_chars(),
            cache_capacity: None,
            url: None,
        }
    }
}

fn default_generation_model() -> String {
    crate::gemini::DEFAULT_GENERATION_MODEL.to_string()
}
fn default_max_retries() -> u32 {
    crate::generate::DEFAULT_MAX_RETRIES
}
fn default_generation_timeout() -> u64 {
    60
}
fn default_context_prefix_chars() -> usize {
    crate::cache::DEFAULT_CONTEXT_PREFIX_CHARS
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_store_path(),
            collection: default_collection(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_store_path() -> PathBuf {
    PathBuf::from("./data/docrag.sqlite")
}
fn default_collection() -> String {
    "rag_documents".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// Load and validate the config at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        validate(&config)?;
        Ok(config)
    }
}

/// Parse and validate TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| Error::config(format!("failed to parse config file: {}", e)))?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    chunk::validate_window(config.chunking.chunk_size, config.chunking.overlap)?;

    // Validate embedding
    check_provider("embedding", &config.embedding.provider)?;
    if config.embedding.model.trim().is_empty() {
        return Err(Error::config("embedding.model must not be empty"));
    }
    if config.embedding.fallback_dims == 0 {
        return Err(Error::config("embedding.fallback_dims must be > 0"));
    }
    if config.embedding.dims == Some(0) {
        return Err(Error::config("embedding.dims must be > 0 when set"));
    }
    if config.embedding.concurrency == 0 {
        return Err(Error::config("embedding.concurrency must be >= 1"));
    }

    // Validate generation
    check_provider("generation", &config.generation.provider)?;
    if config.generation.model.trim().is_empty() {
        return Err(Error::config("generation.model must not be empty"));
    }
    if config.generation.max_retries == 0 {
        return Err(Error::config("generation.max_retries must be >= 1"));
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        return Err(Error::config("retrieval.top_k must be >= 1"));
    }

    // Validate store
    match config.store.backend.as_str() {
        "sqlite" | "memory" | "chroma" => {}
        other => {
            return Err(Error::config(format!(
                "unknown store backend: '{}'. Must be sqlite, memory, or chroma.",
                other
            )))
        }
    }
    if config.store.collection.trim().is_empty() {
        return Err(Error::config("store.collection must not be empty"));
    }

    Ok(())
}

fn check_provider(section: &str, provider: &str) -> Result<()> {
    match provider {
        "gemini" | "ollama" => Ok(()),
        other => Err(Error::config(format!(
            "unknown {} provider: '{}'. Must be gemini or ollama.",
            section, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.embedding.provider, "gemini");
        assert_eq!(config.embedding.model, "gemini-embedding-001");
        assert_eq!(config.embedding.fallback_dims, 768);
        assert_eq!(config.generation.model, "gemini-2.5-flash");
        assert_eq!(config.generation.max_retries, 3);
        assert_eq!(config.generation.cache_capacity, None);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.store.backend, "sqlite");
        assert_eq!(config.store.collection, "rag_documents");
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            url = "http://localhost:11434"
            concurrency = 4

            [store]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.embedding.timeout_secs, 30);
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.store.collection, "rag_documents");
    }

    #[test]
    fn test_overlap_not_smaller_than_chunk_size_rejected() {
        let err = parse_config("[chunking]\nchunk_size = 100\noverlap = 100\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_zero_values_rejected() {
        for toml in [
            "[retrieval]\ntop_k = 0\n",
            "[generation]\nmax_retries = 0\n",
            "[embedding]\nconcurrency = 0\n",
            "[embedding]\nfallback_dims = 0\n",
            "[chunking]\nchunk_size = 0\noverlap = 0\n",
        ] {
            assert!(matches!(parse_config(toml), Err(Error::Config(_))), "{}", toml);
        }
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert!(parse_config("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse_config("[generation]\nprovider = \"x\"\n").is_err());
        assert!(parse_config("[store]\nbackend = \"postgres\"\n").is_err());
        assert!(parse_config("[server]\nbind = \"x\"\n").is_err());
    }

    #[test]
    fn test_misspelled_section_key_rejected() {
        let err = parse_config("[chunking]\nchunk_sise = 10\n").unwrap_err();
        assert!(err.to_string().contains("chunk_sise"), "{}", err);
        assert!(parse_config("[store]\ncolection = \"x\"\n").is_err());
        assert!(parse_config("[embedding]\nskip_degradeed = true\n").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        assert!(load_config(&tmp.path().join("absent.toml")).is_err());
    }
}
