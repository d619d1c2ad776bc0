//! In-memory vector backend using brute-force cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a `HashMap` of chunks
//! protected by a `tokio::sync::RwLock`. It starts empty, is filled by
//! ingest, and lives only as long as the process. Corpora are bounded in
//! the thousands of chunks, so a linear scan per query is acceptable.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{CollectionInfo, DocumentChunk, DocumentSource};
use crate::error::Result;
use crate::vectorstore::{COLLECTION_NAME, TEXT_MATCH_SCORE, VectorBackend, sort_by_relevance};

/// Score for a chunk without an embedding whose text contains the query.
const CONTAINS_SCORE: f32 = 0.5;

/// Score for a chunk without an embedding whose text does not contain the query.
const NO_MATCH_SCORE: f32 = 0.1;

/// An in-memory vector backend using cosine similarity for search.
///
/// Chunks are keyed by ID. Each chunk is inserted whole, with its embedding,
/// under a single write lock, so readers never see a partially stored chunk.
///
/// # Example
///
/// ```rust,ignore
/// use seva_rag::{InMemoryVectorStore, VectorBackend};
///
/// let store = InMemoryVectorStore::new();
/// store.add(&chunks).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    chunks: RwLock<HashMap<String, DocumentChunk>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 when the lengths differ (incomparable) or when either vector
/// has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl VectorBackend for InMemoryVectorStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn add(&self, chunks: &[DocumentChunk]) -> Result<()> {
        for chunk in chunks {
            let mut store = self.chunks.write().await;
            store.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<DocumentSource>> {
        let store = self.chunks.read().await;

        let mut scored: Vec<DocumentSource> = store
            .values()
            .map(|chunk| {
                let score = match &chunk.embedding {
                    Some(stored) => cosine_similarity(embedding, stored),
                    None if contains_ignore_case(&chunk.content, query) => CONTAINS_SCORE,
                    None => NO_MATCH_SCORE,
                };
                chunk.to_source(score)
            })
            .collect();

        sort_by_relevance(&mut scored);
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn text_search(&self, query: &str, top_k: usize) -> Result<Vec<DocumentSource>> {
        let store = self.chunks.read().await;

        let mut matches: Vec<&DocumentChunk> =
            store.values().filter(|chunk| contains_ignore_case(&chunk.content, query)).collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(matches.into_iter().take(top_k).map(|chunk| chunk.to_source(TEXT_MATCH_SCORE)).collect())
    }

    async fn clear(&self) -> Result<()> {
        self.chunks.write().await.clear();
        Ok(())
    }

    async fn info(&self) -> Result<CollectionInfo> {
        let count = self.chunks.read().await.len();
        Ok(CollectionInfo { name: format!("{COLLECTION_NAME} (Memory)"), count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn self_similarity_is_one() {
        let v = [0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn is_symmetric() {
        let a = [0.1, 0.7, -0.2];
        let b = [0.9, -0.4, 0.5];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn zero_vector_is_guarded() {
        let score = cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]);
        assert_eq!(score, 0.0);
        assert!(!score.is_nan());
    }
}
