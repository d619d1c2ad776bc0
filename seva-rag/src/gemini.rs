//! Gemini embedding and generation providers over the Generative Language REST API.
//!
//! Both providers call the API directly with `reqwest`. Wrap them with
//! [`RateLimitedEmbedder`] / [`RateLimitedGenerator`] (or use the
//! `into_rate_limited` helpers) to stay inside the free-tier quotas.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, RateLimitedEmbedder};
use crate::error::{RagError, Result};
use crate::generation::{RateLimitedGenerator, TextGenerator};
use crate::rate_limiter::RateLimiter;

/// The default Generative Language API base URL.
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// The default generation model.
const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash";

/// The dimensionality of `text-embedding-004`.
const DEFAULT_DIMENSIONS: usize = 768;

const PROVIDER: &str = "Gemini";

fn read_api_key() -> Result<String> {
    std::env::var("GOOGLE_API_KEY").map_err(|_| {
        RagError::Config("GOOGLE_API_KEY environment variable not set".to_string())
    })
}

fn check_api_key(api_key: &str) -> Result<()> {
    if api_key.is_empty() {
        return Err(RagError::Config("Gemini API key must not be empty".to_string()));
    }
    Ok(())
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: Option<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// POST `body` to `{base_url}/models/{model}:{method}` and return the raw response text.
///
/// The error mapper receives a human-readable failure description.
async fn post_json<B: Serialize>(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    method: &str,
    body: &B,
    to_error: impl Fn(String) -> RagError,
) -> Result<String> {
    let url = format!("{base_url}/models/{model}:{method}");
    let response =
        client.post(&url).header("x-goog-api-key", api_key).json(body).send().await.map_err(
            |e| {
                error!(provider = PROVIDER, method, error = %e, "request failed");
                to_error(format!("request failed: {e}"))
            },
        )?;

    let status = response.status();
    let text = response.text().await.map_err(|e| to_error(format!("failed to read body: {e}")))?;

    if !status.is_success() {
        let detail =
            serde_json::from_str::<ErrorResponse>(&text).map(|e| e.error.message).unwrap_or(text);
        error!(provider = PROVIDER, method, %status, "API error");
        return Err(to_error(format!("API returned {status}: {detail}")));
    }

    Ok(text)
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the Gemini `embedContent` endpoint.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-004`.
/// - `dimensions` – defaults to 768; a different value is sent as
///   `outputDimensionality`.
/// - `api_key` – from the constructor or the `GOOGLE_API_KEY` environment variable.
///
/// Responses with no values, or with a length other than `dimensions`, are
/// rejected as [`RagError::Embedding`].
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    /// Create a new provider with the given API key and default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Create a new provider using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key()?)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the expected output dimensionality.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Point the provider at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Guard this provider with the default embedding budget.
    pub fn into_rate_limited(self) -> RateLimitedEmbedder {
        RateLimitedEmbedder::new(Arc::new(self), Arc::new(RateLimiter::for_embeddings()))
    }

    fn embedding_error(message: String) -> RagError {
        RagError::Embedding { provider: PROVIDER.into(), message }
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let request = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content { role: None, parts: vec![Part { text }] },
            output_dimensionality: (self.dimensions != DEFAULT_DIMENSIONS)
                .then_some(self.dimensions),
        };

        let body = post_json(
            &self.client,
            &self.base_url,
            &self.api_key,
            &self.model,
            "embedContent",
            &request,
            Self::embedding_error,
        )
        .await?;

        let response: EmbedContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse embedding response");
            Self::embedding_error(format!("failed to parse response: {e}"))
        })?;

        let values = response.embedding.map(|e| e.values).unwrap_or_default();
        if values.is_empty() {
            return Err(Self::embedding_error("no embedding values received".to_string()));
        }
        if values.len() != self.dimensions {
            return Err(Self::embedding_error(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                values.len()
            )));
        }

        Ok(values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// A [`TextGenerator`] backed by the Gemini `generateContent` endpoint.
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiGenerator {
    /// Create a new generator with the given API key and default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        check_api_key(&api_key)?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
        })
    }

    /// Create a new generator using the `GOOGLE_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(read_api_key()?)
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Guard this generator with the default generation budget.
    pub fn into_rate_limited(self) -> RateLimitedGenerator {
        RateLimitedGenerator::new(Arc::new(self), Arc::new(RateLimiter::for_generation()))
    }

    fn generation_error(message: String) -> RagError {
        RagError::Generation { provider: PROVIDER.into(), message }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");

        let request = GenerateContentRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
        };

        let body = post_json(
            &self.client,
            &self.base_url,
            &self.api_key,
            &self.model,
            "generateContent",
            &request,
            Self::generation_error,
        )
        .await?;

        let response: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse generation response");
            Self::generation_error(format!("failed to parse response: {e}"))
        })?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Self::generation_error("no text response received".to_string()));
        }
        Ok(text)
    }
}
