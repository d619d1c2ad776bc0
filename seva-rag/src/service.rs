//! The question-answering service.
//!
//! [`RagService`] ties the pieces together: ingest (extract, chunk, clear,
//! embed, store) and answer (validate, expand, retrieve, assemble, generate).
//!
//! # Example
//!
//! ```rust,ignore
//! use seva_rag::{RagConfig, RagService, VectorStore, WordBoundaryChunker};
//!
//! let service = RagService::builder()
//!     .config(config)
//!     .vector_store(Arc::new(store))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let report = service.ingest_directory(Path::new("./pdfs")).await?;
//! let response = service.answer("How do I apply for a residence certificate?").await?;
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, WordBoundaryChunker};
use crate::config::RagConfig;
use crate::document::{CollectionInfo, DocumentChunk, DocumentSource, QueryResponse};
use crate::error::{RagError, Result};
use crate::extraction::{PdfTextExtractor, SourceFile, TextExtractor, collect_sources};
use crate::generation::TextGenerator;
use crate::prompt::PromptAssembler;
use crate::query_expansion::QueryExpander;
use crate::retrieval::Retriever;
use crate::vectorstore::VectorStore;

/// Answer returned when retrieval finds nothing relevant.
pub const NO_INFORMATION_ANSWER: &str = "I don't have enough information from the provided \
documents to answer your question. Please try rephrasing your question or contact the relevant \
government office directly.";

/// Outcome of a directory ingest run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Number of distinct documents that produced at least one chunk.
    pub documents_processed: usize,
    /// Number of chunks created across all documents.
    pub chunks_created: usize,
    /// Chunk count reported by the store after the run.
    pub vector_entries: usize,
    /// Names of the documents that produced chunks, sorted.
    pub documents: Vec<String>,
}

/// Overall service health.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of [`RagService::health_check`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub collection: Option<String>,
    pub count: Option<usize>,
    pub error: Option<String>,
}

/// Result of [`RagService::debug_search`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSearch {
    pub query: String,
    pub collection: CollectionInfo,
    pub sources: Vec<DocumentSource>,
}

/// Retrieval-augmented question answering over the document corpus.
///
/// Construct one via [`RagService::builder()`].
pub struct RagService {
    config: RagConfig,
    store: Arc<VectorStore>,
    chunker: Arc<dyn Chunker>,
    extractor: Arc<dyn TextExtractor>,
    generator: Arc<dyn TextGenerator>,
    retriever: Retriever,
    assembler: PromptAssembler,
}

impl RagService {
    /// Create a new [`RagServiceBuilder`].
    pub fn builder() -> RagServiceBuilder {
        RagServiceBuilder::default()
    }

    /// Return a reference to the service configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Answer `query` from the stored corpus.
    ///
    /// An empty retrieval is a normal outcome and yields
    /// [`NO_INFORMATION_ANSWER`] with no sources.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for a blank query and
    /// [`RagError::Generation`] if the language model call fails.
    pub async fn answer(&self, query: &str) -> Result<QueryResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::Validation(
                "Message is required and must be a non-empty string".to_string(),
            ));
        }
        info!(query, "processing question");

        let sources = self.retrieve(query).await?;
        if sources.is_empty() {
            info!("no relevant sources found");
            return Ok(QueryResponse {
                answer: NO_INFORMATION_ANSWER.to_string(),
                sources: Vec::new(),
                timestamp: Utc::now(),
            });
        }

        let prompt = self.assembler.assemble(query, &sources);
        let answer = self.generator.generate(&prompt).await.map_err(|e| {
            error!(error = %e, "generation failed");
            e
        })?;

        let mut sources = sources;
        sources.truncate(self.config.response_max_sources);
        info!(sources = sources.len(), "question answered");
        Ok(QueryResponse { answer, sources, timestamp: Utc::now() })
    }

    /// Ranked, de-duplicated sources for `query` across its expansions.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<DocumentSource>> {
        self.retriever.retrieve(query, self.config.top_k, self.config.max_query_variants).await
    }

    /// Replace the stored corpus with `chunks`.
    ///
    /// # Errors
    ///
    /// Returns the store's error if a batch cannot be written.
    pub async fn ingest(&self, chunks: &[DocumentChunk]) -> Result<()> {
        if let Err(e) = self.store.clear_collection().await {
            warn!(error = %e, "failed to clear collection before ingest, continuing");
        }
        self.store.add_documents(chunks).await
    }

    /// Extract, chunk, and ingest every PDF in `dir`.
    ///
    /// Documents that fail extraction are logged and skipped. If no chunks
    /// are produced at all, the existing collection is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] if `dir` cannot be listed, or the
    /// store's error if a batch cannot be written.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let files = collect_sources(dir)?;
        info!(dir = %dir.display(), files = files.len(), "processing source directory");

        let mut chunks = Vec::new();
        for file in &files {
            let text = match self.extract(file).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(document = %file.document_name, error = %e, "skipping document");
                    continue;
                }
            };
            let document_chunks = self.chunker.chunk(&text, &file.document_name);
            info!(
                document = %file.document_name,
                chunks = document_chunks.len(),
                "document chunked"
            );
            chunks.extend(document_chunks);
        }

        if chunks.is_empty() {
            warn!(dir = %dir.display(), "no content extracted");
            return Ok(IngestReport {
                documents_processed: 0,
                chunks_created: 0,
                vector_entries: 0,
                documents: Vec::new(),
            });
        }

        self.ingest(&chunks).await?;
        let info = self.store.collection_info().await?;

        let documents: BTreeSet<&str> =
            chunks.iter().map(|c| c.metadata.document.as_str()).collect();
        let report = IngestReport {
            documents_processed: documents.len(),
            chunks_created: chunks.len(),
            vector_entries: info.count,
            documents: documents.into_iter().map(str::to_string).collect(),
        };
        info!(
            documents = report.documents_processed,
            chunks = report.chunks_created,
            entries = report.vector_entries,
            "ingest completed"
        );
        Ok(report)
    }

    /// Run the extractor for `file` on the blocking thread pool.
    async fn extract(&self, file: &SourceFile) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        let path = file.path.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&path)).await.map_err(|e| {
            RagError::Extraction {
                document: file.document_name.clone(),
                message: format!("extraction task failed: {e}"),
            }
        })?
    }

    /// Remove every stored chunk.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear_collection().await
    }

    /// Live collection name and chunk count.
    pub async fn stats(&self) -> Result<CollectionInfo> {
        self.store.collection_info().await
    }

    /// Report whether the store can answer a stats request. Never fails.
    pub async fn health_check(&self) -> HealthReport {
        match self.store.collection_info().await {
            Ok(info) => HealthReport {
                status: HealthStatus::Healthy,
                collection: Some(info.name),
                count: Some(info.count),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "health check failed");
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    collection: None,
                    count: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Search the raw query without expansion, alongside the collection stats.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Validation`] for a blank query, or the store's
    /// error if the stats cannot be read.
    pub async fn debug_search(&self, query: &str, top_k: usize) -> Result<DebugSearch> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::Validation("Query is required".to_string()));
        }
        let sources = self.store.search_similar(query, top_k).await?;
        let collection = self.store.collection_info().await?;
        Ok(DebugSearch { query: query.to_string(), collection, sources })
    }
}

/// Builder for constructing a [`RagService`].
///
/// `vector_store` and `generator` are required. The chunker defaults to a
/// [`WordBoundaryChunker`] sized from the config, the extractor to
/// [`PdfTextExtractor`], and the expander to the built-in rule table.
#[derive(Default)]
pub struct RagServiceBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    generator: Option<Arc<dyn TextGenerator>>,
    expander: Option<QueryExpander>,
}

impl RagServiceBuilder {
    /// Set the service configuration. Defaults to [`RagConfig::default()`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the vector store.
    pub fn vector_store(mut self, store: Arc<VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the source text extractor.
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the language model used for answers.
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Set the query expander.
    pub fn expander(mut self, expander: QueryExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Build the [`RagService`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing.
    pub fn build(self) -> Result<RagService> {
        let config = self.config.unwrap_or_default();
        let store = self
            .store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(WordBoundaryChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let extractor = self.extractor.unwrap_or_else(|| Arc::new(PdfTextExtractor));
        let retriever = Retriever::new(store.clone(), self.expander.unwrap_or_default());
        let assembler =
            PromptAssembler::new(config.prompt_min_relevance, config.prompt_max_sources);

        Ok(RagService { config, store, chunker, extractor, generator, retriever, assembler })
    }
}
