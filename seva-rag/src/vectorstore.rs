//! Vector storage: the backend contract and the store that drives it.
//!
//! [`VectorBackend`] is implemented by the external services
//! ([`ChromaBackend`](crate::chroma::ChromaBackend), and `PgVectorBackend`
//! behind the `pgvector` feature) and by [`InMemoryVectorStore`]. The
//! [`VectorStore`] owns exactly one backend, chosen once at construction,
//! and layers embedding, batching, and search fallbacks on top of it.
//!
//! # Example
//!
//! ```rust,ignore
//! use seva_rag::{ChromaBackend, RagConfig, VectorStore};
//!
//! let chroma = Arc::new(ChromaBackend::new("http://localhost:8000", 768)?);
//! let store = VectorStore::connect(chroma, embedder, &RagConfig::default()).await;
//! store.add_documents(&chunks).await?;
//! let sources = store.search_similar("income certificate", 8).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::RagConfig;
use crate::document::{CollectionInfo, DocumentChunk, DocumentSource};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::inmemory::InMemoryVectorStore;

/// Name of the collection holding the document corpus.
pub const COLLECTION_NAME: &str = "seva-sahayak-documents";

/// Relevance assigned to hits that came from a text (non-vector) search.
pub const TEXT_MATCH_SCORE: f32 = 0.5;

/// A storage backend for document chunks with similarity and text search.
///
/// Chunks handed to [`add`](VectorBackend::add) may lack an embedding when
/// the provider failed for them; backends must still persist them.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Short backend label used in logs and errors.
    fn name(&self) -> &str;

    /// Check that the backend is reachable and ready to serve the collection.
    ///
    /// The default implementation always succeeds.
    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    /// Persist a batch of chunks.
    async fn add(&self, chunks: &[DocumentChunk]) -> Result<()>;

    /// Return up to `top_k` nearest chunks to `embedding`, best first.
    ///
    /// `query` is the text the embedding was computed from.
    async fn search(
        &self,
        query: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<DocumentSource>>;

    /// Return up to `top_k` chunks matching `query` as text, scored [`TEXT_MATCH_SCORE`].
    async fn text_search(&self, query: &str, top_k: usize) -> Result<Vec<DocumentSource>>;

    /// Remove every stored chunk. Clearing an empty or missing collection succeeds.
    async fn clear(&self) -> Result<()>;

    /// Live collection name and chunk count.
    async fn info(&self) -> Result<CollectionInfo>;
}

/// Sort sources by descending relevance. Ties keep a stable, content-based order.
pub(crate) fn sort_by_relevance(sources: &mut [DocumentSource]) {
    sources.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then_with(|| a.document.cmp(&b.document))
            .then_with(|| a.content.cmp(&b.content))
    });
}

/// The document store used for ingest and retrieval.
///
/// Holds one [`VectorBackend`] for the lifetime of the process. If the
/// external backend fails its probe in [`connect`](VectorStore::connect),
/// the store switches to an [`InMemoryVectorStore`] permanently; nothing
/// re-probes the external service afterwards. The in-memory corpus is not
/// persisted and must be re-ingested after a restart.
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    batch_delay: Duration,
    min_score: f32,
    in_memory: bool,
}

impl VectorStore {
    /// Probe `external` and use it if reachable, otherwise fall back to memory.
    ///
    /// Unreachability is logged, never returned.
    pub async fn connect(
        external: Arc<dyn VectorBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
    ) -> Self {
        match external.probe().await {
            Ok(()) => {
                info!(backend = external.name(), "using external vector backend");
                Self::with_backend(external, embedder, config, false)
            }
            Err(e) => {
                warn!(
                    backend = external.name(),
                    error = %e,
                    "vector backend unavailable, using in-memory storage"
                );
                Self::in_memory(embedder, config)
            }
        }
    }

    /// Create a store backed only by process memory.
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self::with_backend(Arc::new(InMemoryVectorStore::new()), embedder, config, true)
    }

    fn with_backend(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
        in_memory: bool,
    ) -> Self {
        Self {
            backend,
            embedder,
            batch_size: config.ingest_batch_size.max(1),
            batch_delay: config.ingest_batch_delay,
            min_score: config.similarity_threshold,
            in_memory,
        }
    }

    /// Label of the active backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Whether the store fell back to (or was created with) in-memory storage.
    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Embed and persist `chunks` in batches.
    ///
    /// A chunk whose embedding fails is logged and stored without one.
    /// Batches run strictly in order with the configured pause between them.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if a batch cannot be written.
    pub async fn add_documents(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let batch_count = chunks.len().div_ceil(self.batch_size);
        info!(
            chunks = chunks.len(),
            batches = batch_count,
            backend = self.backend_name(),
            "adding documents"
        );

        for (index, batch) in chunks.chunks(self.batch_size).enumerate() {
            debug!(batch = index + 1, of = batch_count, size = batch.len(), "processing batch");

            let mut prepared = Vec::with_capacity(batch.len());
            for chunk in batch {
                let mut chunk = chunk.clone();
                match self.embedder.embed(&chunk.content).await {
                    Ok(embedding) => chunk.embedding = Some(embedding),
                    Err(e) => {
                        warn!(
                            chunk = %chunk.id,
                            error = %e,
                            "embedding failed, storing chunk without vector"
                        );
                        chunk.embedding = None;
                    }
                }
                prepared.push(chunk);
            }

            self.backend.add(&prepared).await?;

            if index + 1 < batch_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        info!(chunks = chunks.len(), "documents added");
        Ok(())
    }

    /// Return up to `top_k` sources for `query`, sorted by descending relevance.
    ///
    /// Hits scoring at or below the configured similarity threshold are dropped.
    /// If the query cannot be embedded, or the vector search fails, the
    /// backend's text search answers instead. A failing text search yields
    /// no sources rather than an error.
    pub async fn search_similar(&self, query: &str, top_k: usize) -> Result<Vec<DocumentSource>> {
        let mut sources = match self.embedder.embed(query).await {
            Ok(embedding) => match self.backend.search(query, &embedding, top_k).await {
                Ok(sources) => sources,
                Err(e) => {
                    warn!(
                        backend = self.backend_name(),
                        error = %e,
                        "vector search failed, falling back to text search"
                    );
                    self.text_fallback(query, top_k).await
                }
            },
            Err(e) => {
                warn!(error = %e, "query embedding failed, falling back to text search");
                self.text_fallback(query, top_k).await
            }
        };

        sources.retain(|source| source.relevance_score > self.min_score);
        sort_by_relevance(&mut sources);
        sources.truncate(top_k);
        debug!(query, results = sources.len(), "search completed");
        Ok(sources)
    }

    async fn text_fallback(&self, query: &str, top_k: usize) -> Vec<DocumentSource> {
        match self.backend.text_search(query, top_k).await {
            Ok(sources) => sources,
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "text search failed");
                Vec::new()
            }
        }
    }

    /// Remove every stored chunk. Idempotent.
    pub async fn clear_collection(&self) -> Result<()> {
        self.backend.clear().await?;
        info!(backend = self.backend_name(), "collection cleared");
        Ok(())
    }

    /// Live collection name and chunk count.
    pub async fn collection_info(&self) -> Result<CollectionInfo> {
        self.backend.info().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(content: &str, relevance_score: f32) -> DocumentSource {
        DocumentSource {
            document: "guide".to_string(),
            page: Some(1),
            relevance_score,
            content: content.to_string(),
        }
    }

    #[test]
    fn sorting_is_total_even_with_nan_scores() {
        let mut sources = vec![
            source("low", 0.1),
            source("nan", f32::NAN),
            source("high", 0.9),
            source("mid", 0.5),
        ];
        sort_by_relevance(&mut sources);

        let order: Vec<&str> = sources.iter().map(|s| s.content.as_str()).collect();
        assert_eq!(order, vec!["nan", "high", "mid", "low"]);
    }

    #[test]
    fn ties_break_on_document_then_content() {
        let mut sources = vec![source("b", 0.5), source("a", 0.5)];
        sort_by_relevance(&mut sources);
        assert_eq!(sources[0].content, "a");
    }
}
