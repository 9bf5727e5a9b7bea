//! # Text Embeddings
//!
//! This crate defines the encoder contract shared by every embedding provider:
//! the [`EmbeddingService`] trait, the per-provider default-values table
//! ([`EncoderDefault`]) and the env-based [`EmbeddingConfig`].

use async_trait::async_trait;

mod config;
mod defaults;
pub use config::{EmbeddingConfig, EnvEmbeddingConfig};
pub use defaults::{EncoderDefault, DEFAULT_SCORE_THRESHOLD};

/// Service for generating text embeddings.
///
/// Implementations are interchangeable: callers only rely on `name`,
/// `score_threshold` and the two embed methods.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embedding model name used by this encoder.
    fn name(&self) -> &str;

    /// Similarity threshold callers use when matching against this encoder's vectors.
    fn score_threshold(&self) -> f32 {
        DEFAULT_SCORE_THRESHOLD
    }

    /// Generates an embedding vector for a single text string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, anyhow::Error> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding in response"))
    }

    /// Generates embedding vectors for multiple texts in a single API call.
    /// The result has one vector per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, anyhow::Error>;
}
