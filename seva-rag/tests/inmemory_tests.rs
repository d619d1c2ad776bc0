//! Property tests for in-memory vector backend search.

use std::collections::HashMap;

use proptest::prelude::*;
use seva_rag::document::{ChunkMetadata, DocumentChunk};
use seva_rag::inmemory::{InMemoryVectorStore, cosine_similarity};
use seva_rag::vectorstore::VectorBackend;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk that may or may not carry an embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = DocumentChunk> {
    (
        "[a-z]{3,8}",
        "[a-z ]{5,30}",
        proptest::option::weighted(0.8, arb_normalized_embedding(dim)),
        0u32..20,
    )
        .prop_map(|(name, content, embedding, chunk_index)| DocumentChunk {
            id: format!("{name}_chunk_{chunk_index}"),
            content,
            metadata: ChunkMetadata {
                document: name,
                page: chunk_index / 2 + 1,
                chunk_index,
            },
            embedding,
        })
}

fn dedup_by_id(chunks: &[DocumentChunk]) -> Vec<DocumentChunk> {
    let mut deduped: HashMap<String, DocumentChunk> = HashMap::new();
    for chunk in chunks {
        deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
    }
    deduped.into_values().collect()
}

/// *For any* set of stored chunks, searching SHALL return results ordered by
/// descending score, and the number of results SHALL be at most `top_k`.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            query_text in "[a-z]{1,4}",
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                let unique_chunks = dedup_by_id(&chunks);
                let count = unique_chunks.len();

                store.add(&unique_chunks).await.unwrap();
                let results = store.search(&query_text, &query, top_k).await.unwrap();
                (results, count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), unique_count.min(top_k));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].relevance_score >= window[1].relevance_score,
                    "results not in descending order: {} < {}",
                    window[0].relevance_score,
                    window[1].relevance_score,
                );
            }
        }

        #[test]
        fn embedded_chunks_score_by_cosine_similarity(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..10),
            query in arb_normalized_embedding(DIM),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let unique_chunks = dedup_by_id(&chunks);
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.add(&unique_chunks).await.unwrap();
                store.search("zz9", &query, unique_chunks.len()).await.unwrap()
            });

            for chunk in &unique_chunks {
                let expected = match &chunk.embedding {
                    Some(embedding) => cosine_similarity(&query, embedding),
                    // Generated content never contains a digit.
                    None => 0.1,
                };
                // Chunks may share content, so accept any hit with that content.
                prop_assert!(
                    results
                        .iter()
                        .filter(|r| r.content == chunk.content)
                        .any(|r| (r.relevance_score - expected).abs() < 1e-5),
                    "no hit for {} scored {}",
                    chunk.id,
                    expected,
                );
            }
        }
    }
}

/// *For any* two vectors, cosine similarity SHALL be symmetric and lie in `[-1, 1]`.
mod prop_cosine_similarity {
    use super::*;

    proptest! {
        #[test]
        fn symmetric_and_bounded(
            a in proptest::collection::vec(-10.0f32..10.0, 8),
            b in proptest::collection::vec(-10.0f32..10.0, 8),
        ) {
            let ab = cosine_similarity(&a, &b);
            let ba = cosine_similarity(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-5);
            prop_assert!((-1.0 - 1e-5..=1.0 + 1e-5).contains(&ab));
        }

        #[test]
        fn unequal_lengths_score_zero(
            a in proptest::collection::vec(-10.0f32..10.0, 1..8),
            extra in 1usize..4,
        ) {
            let b = vec![1.0f32; a.len() + extra];
            prop_assert_eq!(cosine_similarity(&a, &b), 0.0);
        }
    }
}

#[tokio::test]
async fn chunks_without_embeddings_score_by_containment() {
    let store = InMemoryVectorStore::new();
    let chunk = |id: &str, content: &str| DocumentChunk {
        id: id.to_string(),
        content: content.to_string(),
        metadata: ChunkMetadata { document: "notice".to_string(), page: 1, chunk_index: 0 },
        embedding: None,
    };
    let chunks =
        [chunk("a", "Visit the Sewa Kendra for forms"), chunk("b", "Office hours are 9 to 5")];
    store.add(&chunks).await.unwrap();

    let results = store.search("sewa kendra", &[1.0, 0.0], 10).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "Visit the Sewa Kendra for forms");
    assert_eq!(results[0].relevance_score, 0.5);
    assert_eq!(results[1].relevance_score, 0.1);

    let text = store.text_search("SEWA", 10).await.unwrap();
    assert_eq!(text.len(), 1);
    assert_eq!(text[0].relevance_score, 0.5);
}

#[tokio::test]
async fn clear_is_idempotent_and_info_is_live() {
    let store = InMemoryVectorStore::new();
    store.clear().await.unwrap();

    let chunk = DocumentChunk {
        id: "guide_chunk_0".to_string(),
        content: "Apply online.".to_string(),
        metadata: ChunkMetadata { document: "guide".to_string(), page: 1, chunk_index: 0 },
        embedding: Some(vec![1.0, 0.0]),
    };
    store.add(std::slice::from_ref(&chunk)).await.unwrap();
    store.add(&[chunk]).await.unwrap();

    let info = store.info().await.unwrap();
    assert_eq!(info.name, "seva-sahayak-documents (Memory)");
    assert_eq!(info.count, 1);

    store.clear().await.unwrap();
    store.clear().await.unwrap();
    assert_eq!(store.info().await.unwrap().count, 0);
}
