//! Language-model text generation.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::rate_limiter::RateLimiter;

/// Produces an answer string for an assembled prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt`.
    ///
    /// Failures surface as [`RagError::Generation`](crate::RagError::Generation).
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Wraps a [`TextGenerator`] so each call first waits on a [`RateLimiter`].
pub struct RateLimitedGenerator {
    inner: Arc<dyn TextGenerator>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedGenerator {
    /// Guard `inner` with `limiter`.
    pub fn new(inner: Arc<dyn TextGenerator>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl TextGenerator for RateLimitedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.limiter.wait_for_availability().await;
        self.inner.generate(prompt).await
    }
}
