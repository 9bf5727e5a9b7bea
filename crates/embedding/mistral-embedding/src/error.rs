//! Error types for the Mistral embedding service.
//!
//! [`MistralEmbeddingError`] covers construction and call failures; [`ApiError`]
//! is what the provider-call boundary returns so the retry loop can branch on it.

use thiserror::Error;

/// Failure of a single embeddings call, tagged with whether retrying can help.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Rate limiting, timeouts, 5xx, unreadable bodies.
    #[error("{0}")]
    Transient(String),

    /// Rejected request (bad key, bad input) or a request that could not be built.
    #[error("{0}")]
    Fatal(String),
}

impl ApiError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Errors returned by [`crate::MistralEmbedding`].
#[derive(Error, Debug)]
pub enum MistralEmbeddingError {
    #[error("Mistral HTTP client unavailable: build mistral-embedding with the `http` feature")]
    DependencyMissing,

    #[error("Config error: {0}")]
    Configuration(String),

    #[error("Unable to connect to Mistral API: {0}")]
    ProviderConnection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Mistral client not initialized")]
    NotInitialized,

    #[error("Unable to call Mistral API: {0}")]
    ProviderCall(#[source] ApiError),

    #[error("No embeddings returned from Mistral API: {0}")]
    EmptyResponse(String),
}

/// Result type for the Mistral embedding service.
pub type Result<T> = std::result::Result<T, MistralEmbeddingError>;
