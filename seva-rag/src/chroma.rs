//! Chroma vector backend over the Chroma HTTP API.
//!
//! Provides [`ChromaBackend`], which implements [`VectorBackend`] with
//! `reqwest`. Chroma reports distances; they are converted to relevance as
//! `1 - distance`. Text search uses a `$contains` document filter.
//!
//! # Example
//!
//! ```rust,ignore
//! use seva_rag::chroma::ChromaBackend;
//!
//! let backend = ChromaBackend::new("http://localhost:8000", 768)?;
//! backend.probe().await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use tracing::debug;

use crate::document::{CollectionInfo, DocumentChunk, DocumentSource};
use crate::error::{RagError, Result};
use crate::vectorstore::{COLLECTION_NAME, TEXT_MATCH_SCORE, VectorBackend};

const BACKEND: &str = "chroma";

/// Distance assumed when Chroma omits one for a hit.
const MISSING_DISTANCE: f32 = 1.0;

/// A [`VectorBackend`] backed by a [Chroma](https://www.trychroma.com/) server.
///
/// The collection ID is resolved lazily with get-or-create and cached until
/// the collection is cleared. Chunks without an embedding are written with a
/// zero vector of the configured dimension.
pub struct ChromaBackend {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dimension: usize,
    collection_id: Mutex<Option<String>>,
}

// ── Chroma API request/response types ──────────────────────────────

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<Vec<f32>>,
    documents: Vec<&'a str>,
    metadatas: Vec<Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Map<String, Value>>>>,
}

impl ChromaBackend {
    /// Create a backend for the server at `base_url` (e.g. `http://localhost:8000`).
    pub fn new(base_url: impl Into<String>, dimension: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: COLLECTION_NAME.to_string(),
            dimension,
            collection_id: Mutex::new(None),
        })
    }

    /// Create a backend for `host:port` over plain HTTP.
    pub fn from_host(host: &str, port: u16, dimension: usize) -> Result<Self> {
        Self::new(format!("http://{host}:{port}"), dimension)
    }

    /// Use a collection other than [`COLLECTION_NAME`].
    pub fn with_collection(mut self, name: impl Into<String>) -> Self {
        self.collection = name.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{path}", self.base_url)
    }

    fn store_err(message: String) -> RagError {
        RagError::VectorStore { backend: BACKEND.to_string(), message }
    }

    fn search_err(message: String) -> RagError {
        RagError::Search { backend: BACKEND.to_string(), message }
    }

    /// Send a request and return the status and body, failing on transport errors.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        to_error: fn(String) -> RagError,
    ) -> Result<(StatusCode, String)> {
        let mut request = self.client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response =
            request.send().await.map_err(|e| to_error(format!("request failed: {e}")))?;
        let status = response.status();
        let text =
            response.text().await.map_err(|e| to_error(format!("failed to read body: {e}")))?;
        Ok((status, text))
    }

    /// Send a request that must succeed and decode its JSON body.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        to_error: fn(String) -> RagError,
    ) -> Result<T> {
        let (status, text) = self.send(method, path, body, to_error).await?;
        if !status.is_success() {
            return Err(to_error(format!("API returned {status}: {text}")));
        }
        serde_json::from_str(&text).map_err(|e| to_error(format!("failed to parse response: {e}")))
    }

    /// Resolve (creating if needed) the collection ID.
    async fn collection_id(&self, to_error: fn(String) -> RagError) -> Result<String> {
        let mut cached = self.collection_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let body = json!({
            "name": self.collection,
            "metadata": { "description": "Punjab Government Services Documents" },
            "get_or_create": true,
        });
        let response: CollectionResponse =
            self.call(Method::POST, "collections", Some(&body), to_error).await?;

        debug!(collection = %self.collection, id = %response.id, "resolved chroma collection");
        *cached = Some(response.id.clone());
        Ok(response.id)
    }

    fn source_from(
        content: String,
        metadata: Option<&Map<String, Value>>,
        score: f32,
    ) -> DocumentSource {
        let document = metadata
            .and_then(|m| m.get("document"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let page = metadata.and_then(|m| m.get("page")).and_then(page_number).unwrap_or(1);
        DocumentSource { document, page: Some(page), relevance_score: score, content }
    }
}

/// Read a page number stored either as a number or as a numeric string.
fn page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl VectorBackend for ChromaBackend {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn probe(&self) -> Result<()> {
        let unavailable = |message: String| RagError::BackendUnavailable {
            backend: BACKEND.to_string(),
            message,
        };

        let (status, body) = self
            .send(Method::GET, "heartbeat", None, Self::store_err)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(unavailable(format!("heartbeat returned {status}: {body}")));
        }

        self.collection_id(Self::store_err).await.map_err(|e| unavailable(e.to_string()))?;
        Ok(())
    }

    async fn add(&self, chunks: &[DocumentChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let id = self.collection_id(Self::store_err).await?;
        let request = AddRequest {
            ids: chunks.iter().map(|c| c.id.as_str()).collect(),
            embeddings: chunks
                .iter()
                .map(|c| c.embedding.clone().unwrap_or_else(|| vec![0.0; self.dimension]))
                .collect(),
            documents: chunks.iter().map(|c| c.content.as_str()).collect(),
            metadatas: chunks
                .iter()
                .map(|c| {
                    json!({
                        "document": c.metadata.document,
                        "page": c.metadata.page,
                        "chunkIndex": c.metadata.chunk_index,
                    })
                })
                .collect(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| Self::store_err(format!("failed to encode request: {e}")))?;

        let path = format!("collections/{id}/add");
        let _: Value = self.call(Method::POST, &path, Some(&body), Self::store_err).await?;

        debug!(collection = %self.collection, count = chunks.len(), "added chunks to chroma");
        Ok(())
    }

    async fn search(
        &self,
        _query: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<DocumentSource>> {
        let id = self.collection_id(Self::search_err).await?;
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });
        let response: QueryResponse = self
            .call(Method::POST, &format!("collections/{id}/query"), Some(&body), Self::search_err)
            .await?;

        let documents = response.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let metadatas = response.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
        let distances = response.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();

        let sources = documents
            .into_iter()
            .enumerate()
            .filter_map(|(i, content)| {
                let content = content?;
                let metadata = metadatas.get(i).and_then(Option::as_ref)?;
                let distance = distances.get(i).copied().flatten().unwrap_or(MISSING_DISTANCE);
                Some(Self::source_from(content, Some(metadata), 1.0 - distance))
            })
            .collect();

        Ok(sources)
    }

    async fn text_search(&self, query: &str, top_k: usize) -> Result<Vec<DocumentSource>> {
        let id = self.collection_id(Self::search_err).await?;
        let body = json!({
            "where_document": { "$contains": query },
            "limit": top_k,
            "include": ["documents", "metadatas"],
        });
        let response: GetResponse = self
            .call(Method::POST, &format!("collections/{id}/get"), Some(&body), Self::search_err)
            .await?;

        let metadatas = response.metadatas.unwrap_or_default();
        let sources = response
            .documents
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(i, content)| {
                let metadata = metadatas.get(i).and_then(Option::as_ref);
                content.map(|content| Self::source_from(content, metadata, TEXT_MATCH_SCORE))
            })
            .collect();

        Ok(sources)
    }

    async fn clear(&self) -> Result<()> {
        let mut cached = self.collection_id.lock().await;
        let path = format!("collections/{}", self.collection);
        let (status, body) = self.send(Method::DELETE, &path, None, Self::store_err).await?;

        let missing = status == StatusCode::NOT_FOUND || body.contains("does not exist");
        if !status.is_success() && !missing {
            return Err(Self::store_err(format!("API returned {status}: {body}")));
        }

        *cached = None;
        debug!(collection = %self.collection, existed = !missing, "deleted chroma collection");
        Ok(())
    }

    async fn info(&self) -> Result<CollectionInfo> {
        let id = self.collection_id(Self::store_err).await?;
        let path = format!("collections/{id}/count");
        let count: usize = self.call(Method::GET, &path, None, Self::store_err).await?;
        Ok(CollectionInfo { name: self.collection.clone(), count })
    }
}
