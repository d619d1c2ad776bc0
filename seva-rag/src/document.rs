//! Data types for chunks, retrieval hits, and answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Positional metadata derived for a chunk at chunking time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Logical name of the source document.
    pub document: String,
    /// Estimated page number, starting at 1.
    pub page: u32,
    /// Position of the chunk within its document, starting at 0.
    pub chunk_index: u32,
}

/// A slice of a document's normalized text, the unit of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    /// `{document}_chunk_{index}`, unique within a corpus.
    pub id: String,
    /// Trimmed, non-empty chunk text.
    pub content: String,
    /// Chunk metadata.
    pub metadata: ChunkMetadata,
    /// The embedding, if one was produced during ingest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    /// Convert this chunk into a retrieval hit with the given score.
    pub fn to_source(&self, relevance_score: f32) -> DocumentSource {
        DocumentSource {
            document: self.metadata.document.clone(),
            page: Some(self.metadata.page),
            relevance_score,
            content: self.content.clone(),
        }
    }
}

/// A retrieval hit returned from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSource {
    /// Logical name of the source document.
    pub document: String,
    /// Estimated page number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Similarity score (higher is more relevant, not bounded to `[0, 1]`).
    pub relevance_score: f32,
    /// The chunk text.
    pub content: String,
}

/// Live name and size of the stored collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Collection name, suffixed with the backend kind for non-default backends.
    pub name: String,
    /// Number of stored chunks.
    pub count: usize,
}

/// The answer to a user question, with the sources that grounded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Answer text from the language model, or the fixed no-information message.
    pub answer: String,
    /// Ranked sources used for citation.
    pub sources: Vec<DocumentSource>,
    /// When the answer was produced.
    pub timestamp: DateTime<Utc>,
}
