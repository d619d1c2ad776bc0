//! Document chunking.
//!
//! Extracted document text is whitespace-normalized and cut into overlapping
//! windows of at most `chunk_size` characters. A window that does not reach
//! the end of the text is pulled back to its last space when that space lies
//! in the final 20% of the window, so chunks rarely end mid-word.
//!
//! Sizes and offsets count `char`s, never bytes.

use std::ops::Range;

use crate::document::{ChunkMetadata, DocumentChunk};

/// A strategy for splitting extracted text into chunks.
///
/// Implementations produce [`DocumentChunk`]s without embeddings.
/// Embeddings are attached later by the vector store.
pub trait Chunker: Send + Sync {
    /// Split a document's text into chunks.
    ///
    /// Returns an empty `Vec` if the text is empty or entirely whitespace.
    fn chunk(&self, text: &str, document_name: &str) -> Vec<DocumentChunk>;
}

/// Splits text into fixed-size, word-boundary-respecting windows with overlap.
///
/// Chunk IDs are generated as `{document_name}_chunk_{chunk_index}`. The page
/// number is estimated as `chunk_index / 2 + 1` since page boundaries are
/// lost during extraction.
///
/// # Example
///
/// ```rust,ignore
/// use seva_rag::WordBoundaryChunker;
///
/// let chunker = WordBoundaryChunker::new(1500, 300);
/// let chunks = chunker.chunk(&text, "income_certificate");
/// ```
#[derive(Debug, Clone)]
pub struct WordBoundaryChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl WordBoundaryChunker {
    /// Create a new `WordBoundaryChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for WordBoundaryChunker {
    fn chunk(&self, text: &str, document_name: &str) -> Vec<DocumentChunk> {
        chunk_text(text, document_name, self.chunk_size, self.chunk_overlap)
    }
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compute the character ranges of successive windows over normalized text.
///
/// Start offsets are strictly increasing, so the walk always terminates,
/// including when `chunk_overlap >= chunk_size`. The walk stops at the first
/// window that reaches the end of the text, so the tail is never re-emitted
/// as a run of ever shorter suffixes.
pub fn chunk_spans(chars: &[char], chunk_size: usize, chunk_overlap: usize) -> Vec<Range<usize>> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + chunk_size).min(len);

        if end < len {
            let window = &chars[start..end];
            if let Some(space) = window.iter().rposition(|c| *c == ' ') {
                // Only pull back when the space is past 80% of the window.
                if space > 0 && space * 5 > window.len() * 4 {
                    end = start + space;
                }
            }
        }

        spans.push(start..end);
        if end == len {
            break;
        }
        start = end.saturating_sub(chunk_overlap).max(start + 1);
    }

    spans
}

/// Split `text` into chunks for `document_name`.
pub fn chunk_text(
    text: &str,
    document_name: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<DocumentChunk> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let mut chunks = Vec::new();
    let mut chunk_index: u32 = 0;

    for span in chunk_spans(&chars, chunk_size, chunk_overlap) {
        let window: String = chars[span].iter().collect();
        let content = window.trim();
        if content.is_empty() {
            continue;
        }

        chunks.push(DocumentChunk {
            id: format!("{document_name}_chunk_{chunk_index}"),
            content: content.to_string(),
            metadata: ChunkMetadata {
                document: document_name.to_string(),
                page: chunk_index / 2 + 1,
                chunk_index,
            },
            embedding: None,
        });
        chunk_index += 1;
    }

    chunks
}
