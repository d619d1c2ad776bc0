//! Configuration for the retrieval pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for chunking, ingest, retrieval, and prompting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of results requested from the vector store per query variant.
    pub top_k: usize,
    /// Search hits scoring at or below this are dropped by the vector store.
    pub similarity_threshold: f32,
    /// Dimensionality of stored and query embeddings.
    pub vector_dimension: usize,
    /// Upper bound on query variants searched per question, original included.
    pub max_query_variants: usize,
    /// Prompt relevance floor. Looser than `similarity_threshold`.
    pub prompt_min_relevance: f32,
    /// Maximum number of sources rendered into the prompt.
    pub prompt_max_sources: usize,
    /// Maximum number of sources returned alongside an answer.
    pub response_max_sources: usize,
    /// Number of chunks embedded and written per ingest batch.
    pub ingest_batch_size: usize,
    /// Pause between ingest batches.
    #[serde(with = "duration_millis")]
    pub ingest_batch_delay: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 300,
            top_k: 8,
            similarity_threshold: -0.1,
            vector_dimension: 768,
            max_query_variants: 3,
            prompt_min_relevance: -0.2,
            prompt_max_sources: 6,
            response_max_sources: 8,
            ingest_batch_size: 10,
            ingest_batch_delay: Duration::from_millis(1000),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of results requested per query variant.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the vector store floor: search hits scoring at or below this are dropped.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the embedding dimensionality.
    pub fn vector_dimension(mut self, dimension: usize) -> Self {
        self.config.vector_dimension = dimension;
        self
    }

    /// Set the maximum number of query variants searched per question.
    pub fn max_query_variants(mut self, max: usize) -> Self {
        self.config.max_query_variants = max;
        self
    }

    /// Set the prompt relevance floor.
    pub fn prompt_min_relevance(mut self, floor: f32) -> Self {
        self.config.prompt_min_relevance = floor;
        self
    }

    /// Set the maximum number of sources rendered into the prompt.
    pub fn prompt_max_sources(mut self, max: usize) -> Self {
        self.config.prompt_max_sources = max;
        self
    }

    /// Set the maximum number of sources returned with an answer.
    pub fn response_max_sources(mut self, max: usize) -> Self {
        self.config.response_max_sources = max;
        self
    }

    /// Set the ingest batch size.
    pub fn ingest_batch_size(mut self, size: usize) -> Self {
        self.config.ingest_batch_size = size;
        self
    }

    /// Set the pause between ingest batches.
    pub fn ingest_batch_delay(mut self, delay: Duration) -> Self {
        self.config.ingest_batch_delay = delay;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k`, `max_query_variants`, `vector_dimension` or `ingest_batch_size` is zero
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        let non_zero = [
            ("top_k", config.top_k),
            ("max_query_variants", config.max_query_variants),
            ("vector_dimension", config.vector_dimension),
            ("ingest_batch_size", config.ingest_batch_size),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(RagError::Config(format!("{name} must be greater than zero")));
        }
        Ok(config)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
