//! Embedding provider trait for generating vector embeddings from text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::rate_limiter::RateLimiter;

/// A provider that generates vector embeddings from text input.
///
/// Every call is one upstream request: implementations never batch
/// transparently. Callers should treat `embed` as slow and fallible per item.
///
/// # Example
///
/// ```rust,ignore
/// use seva_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("income certificate").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Wraps an [`EmbeddingProvider`] so each call first waits on a [`RateLimiter`].
pub struct RateLimitedEmbedder {
    inner: Arc<dyn EmbeddingProvider>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedEmbedder {
    /// Guard `inner` with `limiter`.
    pub fn new(inner: Arc<dyn EmbeddingProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    /// The limiter guarding this provider.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

#[async_trait]
impl EmbeddingProvider for RateLimitedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.limiter.wait_for_availability().await;
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
