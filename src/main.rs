//! # docrag CLI
//!
//! Ingest documents into a vector collection and ask questions answered
//! from them.
//!
//! ## Usage
//!
//! ```bash
//! docrag --config ./config/docrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docrag ingest <PATH>...` | Extract, chunk, embed and store files |
//! | `docrag ask "<question>"` | Answer a question from the stored chunks |
//! | `docrag reset` | Delete every stored chunk |
//! | `docrag status` | Show the store, collection size and models |
//! | `docrag models` | List models offered by the generation provider |
//!
//! Results go to stdout. Logs (`RUST_LOG`, default `docrag=info`) and
//! ingest progress go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docrag::collection::CollectionManager;
use docrag::config::{self, Config};
use docrag::error::Error;
use docrag::gemini::GeminiClient;
use docrag::ollama::OllamaClient;
use docrag::pipeline::Pipeline;
use docrag::progress::ProgressMode;
use docrag::store::create_store;

/// docrag: retrieval-augmented question answering over your documents.
#[derive(Parser)]
#[command(
    name = "docrag",
    about = "docrag: ingest documents and ask questions answered from them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/docrag.toml`. A missing file means all defaults.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest files or directories.
    ///
    /// Supported types are .txt, .md, .pdf and .docx; anything else is
    /// skipped. Directories are walked recursively.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Progress output on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Ask a question about the ingested documents.
    Ask {
        question: String,

        /// Number of chunks to retrieve as context.
        #[arg(long)]
        top_k: Option<usize>,

        /// Also print the retrieved source chunks.
        #[arg(long)]
        sources: bool,
    },

    /// Delete every stored chunk and start an empty collection.
    Reset,

    /// Show store, collection and model settings.
    Status,

    /// List models available from the generation provider.
    Models,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docrag=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths, progress } => run_ingest(&cfg, &paths, progress).await?,
        Commands::Ask {
            question,
            top_k,
            sources,
        } => run_ask(&cfg, &question, top_k, sources).await?,
        Commands::Reset => {
            let manager = CollectionManager::new(create_store(&cfg.store).await?);
            manager.reset(&cfg.store.collection).await?;
            println!("Collection '{}' reset.", cfg.store.collection);
        }
        Commands::Status => run_status(&cfg).await?,
        Commands::Models => run_models(&cfg).await?,
    }

    Ok(())
}

async fn run_ingest(cfg: &Config, paths: &[PathBuf], progress: Option<ProgressMode>) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(cfg).await?;
    let reporter = progress.unwrap_or_else(ProgressMode::default_for_tty).reporter();
    let report = pipeline
        .ingest_paths(paths, reporter.as_ref())
        .await
        .context("ingestion failed")?;

    println!(
        "Ingested {} file(s), {} chunk(s) into collection '{}'.",
        report.files_ingested,
        report.chunks_stored,
        pipeline.collection_name()
    );
    if report.files_skipped > 0 {
        println!("Skipped {} file(s).", report.files_skipped);
    }
    if report.degraded_chunks > 0 {
        println!(
            "Warning: {} chunk(s) could not be embedded{}.",
            report.degraded_chunks,
            if cfg.embedding.skip_degraded {
                " and were not stored"
            } else {
                " and were stored with zero vectors"
            }
        );
    }
    if report.resets > 0 {
        println!(
            "Embedding dimension changed: the collection was reset and now holds only the newly ingested documents."
        );
    }
    Ok(())
}

async fn run_ask(cfg: &Config, question: &str, top_k: Option<usize>, show_sources: bool) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(cfg).await?;
    let top_k = top_k.unwrap_or(cfg.retrieval.top_k);

    let answer = match pipeline.ask_with_top_k(question, top_k).await {
        Ok(answer) => answer,
        Err(Error::NoDocuments(collection)) => {
            println!(
                "No documents in collection '{}'. Ingest documents first with `docrag ingest <PATH>`.",
                collection
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", answer.text);
    if show_sources {
        println!();
        println!("Source Chunks:");
        for (i, hit) in answer.sources.iter().enumerate() {
            println!(
                "--- [{}] {} (chunk {}, distance {:.4})",
                i + 1,
                hit.metadata.source_file_name,
                hit.metadata.chunk_index,
                hit.distance
            );
            println!("{}", hit.document);
        }
    }
    Ok(())
}

async fn run_status(cfg: &Config) -> anyhow::Result<()> {
    let manager = CollectionManager::new(create_store(&cfg.store).await?);
    let count = match manager.get(&cfg.store.collection).await? {
        Some(collection) => collection.count().await?,
        None => 0,
    };

    println!("{:<12} {}", "store", manager.store_backend());
    if cfg.store.backend == "sqlite" {
        println!("{:<12} {}", "path", cfg.store.path.display());
    }
    println!("{:<12} {}", "collection", cfg.store.collection);
    println!("{:<12} {}", "records", count);
    println!(
        "{:<12} {}:{}",
        "embedding", cfg.embedding.provider, cfg.embedding.model
    );
    println!(
        "{:<12} {}:{}",
        "generation", cfg.generation.provider, cfg.generation.model
    );
    Ok(())
}

async fn run_models(cfg: &Config) -> anyhow::Result<()> {
    let generation = &cfg.generation;
    println!("Available models:");
    match generation.provider.as_str() {
        "ollama" => {
            let client = OllamaClient::new(generation.url.as_deref(), generation.model.clone(), generation.timeout_secs)?;
            for name in client.list_models().await? {
                println!("  - {}", name);
            }
        }
        _ => {
            let mut client = GeminiClient::from_env(generation.model.clone(), generation.timeout_secs)?;
            if let Some(url) = &generation.url {
                client = client.with_base_url(url.clone());
            }
            for model in client.list_models().await? {
                println!("  - {}", model.name);
                if !model.supported_methods.is_empty() {
                    println!("    Methods: {}", model.supported_methods.join(", "));
                }
            }
        }
    }
    Ok(())
}
