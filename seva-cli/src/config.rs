//! Environment-driven settings for the CLI.
//!
//! Every knob has a default except `GOOGLE_API_KEY`. Values that are present
//! but malformed are errors rather than silently falling back.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use seva_rag::RagConfig;

/// Default directory scanned for source PDFs.
const DEFAULT_PDF_DIR: &str = "./pdfs";

/// Resolved CLI settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub google_api_key: String,
    pub chroma_host: String,
    pub chroma_port: u16,
    /// Use the Postgres + pgvector backend instead of Chroma.
    pub use_supabase: bool,
    pub database_url: Option<String>,
    pub pdf_dir: PathBuf,
    pub rag: RagConfig,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let Some(google_api_key) = lookup("GOOGLE_API_KEY") else {
            bail!("Missing required environment variables: GOOGLE_API_KEY");
        };

        let defaults = RagConfig::default();
        let rag = RagConfig::builder()
            .vector_dimension(parse_or(&lookup, "VECTOR_DIMENSION", defaults.vector_dimension)?)
            .top_k(parse_or(&lookup, "TOP_K_RESULTS", defaults.top_k)?)
            .chunk_size(parse_or(&lookup, "CHUNK_SIZE", defaults.chunk_size)?)
            .chunk_overlap(parse_or(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap)?)
            .similarity_threshold(parse_or(
                &lookup,
                "SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            )?)
            .build()
            .context("invalid retrieval settings")?;

        Ok(Self {
            google_api_key,
            chroma_host: lookup("CHROMA_HOST").unwrap_or_else(|| "localhost".to_string()),
            chroma_port: parse_or(&lookup, "CHROMA_PORT", 8000)?,
            use_supabase: lookup("USE_SUPABASE").is_some_and(|v| v == "true"),
            database_url: lookup("DATABASE_URL"),
            pdf_dir: PathBuf::from(lookup("PDF_DIR").as_deref().unwrap_or(DEFAULT_PDF_DIR)),
            rag,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
