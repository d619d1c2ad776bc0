//! Seva Sahayak CLI - ingest government-service PDFs and ask questions.
//!
//! # Usage
//!
//! ```bash
//! # Extract, chunk, embed and store every PDF in $PDF_DIR
//! seva ingest
//!
//! # Ask a question
//! seva ask "How do I apply for a residence certificate?"
//!
//! # Inspect the store
//! seva stats
//! seva health
//! seva search "income certificate" -n 10
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seva_cli::Settings;
use seva_cli::output;
use seva_rag::{
    ChromaBackend, EmbeddingProvider, GeminiEmbeddingProvider, GeminiGenerator, RagService,
    VectorBackend, VectorStore,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Seva Sahayak question answering over Punjab government-service documents.
#[derive(Parser)]
#[command(name = "seva", version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the stored corpus with the PDFs in a directory
    Ingest {
        /// Source directory (default: $PDF_DIR or ./pdfs)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Answer a question from the stored documents
    Ask {
        question: String,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the collection name and chunk count
    Stats,
    /// Check that the vector store is answering
    Health,
    /// Run a single unexpanded search and show the raw hits
    Search {
        query: String,
        /// Maximum number of hits
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let settings = Settings::from_env()?;
    let service = build_service(&settings).await?;

    match cli.command {
        Command::Ingest { dir } => {
            let dir = dir.unwrap_or_else(|| settings.pdf_dir.clone());
            let report = service
                .ingest_directory(&dir)
                .await
                .with_context(|| format!("failed to process PDFs in {}", dir.display()))?;
            print!("{}", output::format_ingest(&report));
        }
        Command::Ask { question, json } => {
            ensure_corpus(&service, &settings).await?;
            match service.answer(&question).await {
                Ok(response) if json => println!("{}", serde_json::to_string_pretty(&response)?),
                Ok(response) => print!("{}", output::format_answer(&response)),
                Err(e) => {
                    warn!(error = %e, "question failed");
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        Command::Stats => print!("{}", output::format_stats(&service.stats().await?)),
        Command::Health => print!("{}", output::format_health(&service.health_check().await)),
        Command::Search { query, limit } => {
            ensure_corpus(&service, &settings).await?;
            print!("{}", output::format_search(&service.debug_search(&query, limit).await?));
        }
    }

    Ok(())
}

async fn build_service(settings: &Settings) -> Result<RagService> {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(
        GeminiEmbeddingProvider::new(settings.google_api_key.clone())?
            .with_dimensions(settings.rag.vector_dimension)
            .into_rate_limited(),
    );
    let generator =
        Arc::new(GeminiGenerator::new(settings.google_api_key.clone())?.into_rate_limited());

    let store = match external_backend(settings).await {
        Some(backend) => VectorStore::connect(backend, embedder, &settings.rag).await,
        None => VectorStore::in_memory(embedder, &settings.rag),
    };
    info!(backend = store.backend_name(), "vector store ready");

    Ok(RagService::builder()
        .config(settings.rag.clone())
        .vector_store(Arc::new(store))
        .generator(generator)
        .build()?)
}

async fn external_backend(settings: &Settings) -> Option<Arc<dyn VectorBackend>> {
    if settings.use_supabase {
        return pgvector_backend(settings).await;
    }
    match ChromaBackend::from_host(
        &settings.chroma_host,
        settings.chroma_port,
        settings.rag.vector_dimension,
    ) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            warn!(error = %e, "could not configure chroma client");
            None
        }
    }
}

#[cfg(feature = "pgvector")]
async fn pgvector_backend(settings: &Settings) -> Option<Arc<dyn VectorBackend>> {
    let Some(url) = settings.database_url.as_deref() else {
        warn!("USE_SUPABASE is set but DATABASE_URL is missing");
        return None;
    };
    match seva_rag::PgVectorBackend::connect(url, settings.rag.vector_dimension).await {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            warn!(error = %e, "pgvector unavailable");
            None
        }
    }
}

#[cfg(not(feature = "pgvector"))]
async fn pgvector_backend(_settings: &Settings) -> Option<Arc<dyn VectorBackend>> {
    warn!("USE_SUPABASE is set but this build lacks the `pgvector` feature");
    None
}

/// The in-memory store starts empty in every process; fill it before querying.
async fn ensure_corpus(service: &RagService, settings: &Settings) -> Result<()> {
    if !service.vector_store().is_in_memory() || service.stats().await?.count > 0 {
        return Ok(());
    }
    info!(dir = %settings.pdf_dir.display(), "in-memory corpus is empty, ingesting");
    service.ingest_directory(&settings.pdf_dir).await?;
    Ok(())
}
