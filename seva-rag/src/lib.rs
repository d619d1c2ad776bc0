//! # seva-rag
//!
//! Retrieval-augmented question answering over government-service documents.
//!
//! ## Overview
//!
//! Source PDFs are extracted, normalized and chunked, embedded through a
//! rate-limited provider, and stored in a vector backend. Questions are
//! expanded into keyword variants, searched, de-duplicated, ranked, and
//! rendered into a grounding prompt for a language model.
//!
//! - [`WordBoundaryChunker`] - overlapping word-boundary chunks
//! - [`RateLimiter`] - sliding-window admission for provider calls
//! - [`VectorStore`] - backend selection, batched ingest, search fallbacks
//! - [`ChromaBackend`], `PgVectorBackend`, [`InMemoryVectorStore`] - storage
//! - [`QueryExpander`] and [`Retriever`] - multi-variant retrieval
//! - [`PromptAssembler`] - context blocks and citation instructions
//! - [`RagService`] - ingest, answer, stats, health
//!
//! ## Features
//!
//! - `pgvector` - PostgreSQL + pgvector backend via `sqlx`

pub mod chroma;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod gemini;
pub mod generation;
pub mod inmemory;
#[cfg(feature = "pgvector")]
pub mod pgvector;
pub mod prompt;
pub mod query_expansion;
pub mod rate_limiter;
pub mod retrieval;
pub mod service;
pub mod vectorstore;

pub use chroma::ChromaBackend;
pub use chunking::{Chunker, WordBoundaryChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{ChunkMetadata, CollectionInfo, DocumentChunk, DocumentSource, QueryResponse};
pub use embedding::{EmbeddingProvider, RateLimitedEmbedder};
pub use error::{RagError, Result};
pub use extraction::{PdfTextExtractor, SourceFile, TextExtractor, collect_sources};
pub use gemini::{GeminiEmbeddingProvider, GeminiGenerator};
pub use generation::{RateLimitedGenerator, TextGenerator};
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorBackend;
pub use prompt::PromptAssembler;
pub use query_expansion::{DEFAULT_RULES, ExpansionRule, QueryExpander};
pub use rate_limiter::RateLimiter;
pub use retrieval::Retriever;
pub use service::{
    DebugSearch, HealthReport, HealthStatus, IngestReport, NO_INFORMATION_ANSWER, RagService,
    RagServiceBuilder,
};
pub use vectorstore::{COLLECTION_NAME, TEXT_MATCH_SCORE, VectorBackend, VectorStore};
