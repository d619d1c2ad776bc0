//! Multi-variant retrieval: expand, search each variant, merge, de-duplicate, rank.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::document::DocumentSource;
use crate::error::Result;
use crate::query_expansion::QueryExpander;
use crate::vectorstore::{VectorStore, sort_by_relevance};

/// Fans a user query out over its expansions and merges the results.
pub struct Retriever {
    store: Arc<VectorStore>,
    expander: QueryExpander,
}

impl Retriever {
    /// Create a retriever over `store` using `expander` for query variants.
    pub fn new(store: Arc<VectorStore>, expander: QueryExpander) -> Self {
        Self { store, expander }
    }

    /// Retrieve ranked sources for `query`.
    ///
    /// At most `max_variants` variants are searched, the original query
    /// first, each for `top_k_per_variant` hits. Hits with identical content
    /// are collapsed to one (the last one seen). The result is sorted by
    /// descending relevance and may be empty.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k_per_variant: usize,
        max_variants: usize,
    ) -> Result<Vec<DocumentSource>> {
        let variants = self.expander.expand(query);
        let searched = variants.len().min(max_variants.max(1));
        info!(variants = variants.len(), searched, "retrieving");

        let mut unique: HashMap<String, DocumentSource> = HashMap::new();
        for variant in variants.iter().take(searched) {
            let sources = self.store.search_similar(variant, top_k_per_variant).await?;
            debug!(variant = %variant, hits = sources.len(), "variant searched");
            for source in sources {
                unique.insert(source.content.clone(), source);
            }
        }

        let mut ranked: Vec<DocumentSource> = unique.into_values().collect();
        sort_by_relevance(&mut ranked);
        info!(sources = ranked.len(), "retrieval completed");
        Ok(ranked)
    }
}
