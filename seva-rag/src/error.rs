//! Error types for the `seva-rag` crate.

use thiserror::Error;

/// Generic failure text shown to end users. Never carries backend detail.
const GENERIC_FAILURE: &str = "Failed to process your question. Please try again.";

/// Errors that can occur in retrieval and answering operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source document did not yield any text.
    #[error("Extraction error ({document}): {message}")]
    Extraction {
        /// The logical name of the document that failed.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider failed or returned a malformed result.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The external vector service could not be reached.
    #[error("Backend unavailable ({backend}): {message}")]
    BackendUnavailable {
        /// The backend that was probed.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A single search call against a backend failed.
    #[error("Search error ({backend}): {message}")]
    Search {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A write, clear, or count operation against a backend failed.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model call failed.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The user query was empty or otherwise invalid.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Text that is safe to show to an end user.
    ///
    /// Validation errors are returned verbatim since they describe the
    /// user's own input; everything else collapses to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            RagError::Validation(message) => message.clone(),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
