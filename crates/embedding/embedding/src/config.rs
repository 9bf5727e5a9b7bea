//! Embedding configuration: trait and env-based implementation.

use anyhow::Result;
use std::env;

use crate::defaults::{EncoderDefault, DEFAULT_SCORE_THRESHOLD};

/// Embedding service configuration interface.
pub trait EmbeddingConfig: Send + Sync {
    fn provider(&self) -> &str;
    /// Embedding model; falls back to the provider's default when not configured.
    fn model(&self) -> &str;
    /// API key for Mistral embeddings (MISTRALAI_API_KEY). `None` when unset or blank.
    fn mistral_api_key(&self) -> Option<&str>;
    /// Optional base URL for the Mistral API (MISTRAL_BASE_URL), e.g. a proxy or a local mock.
    fn mistral_base_url(&self) -> Option<&str>;
    fn score_threshold(&self) -> f32;

    /// Validate config (known provider, mistral requires MISTRALAI_API_KEY, threshold in [0, 1]).
    fn validate(&self) -> Result<()> {
        let Some(provider) = EncoderDefault::from_provider(self.provider()) else {
            anyhow::bail!("Unknown EMBEDDING_PROVIDER: {}", self.provider());
        };
        if provider == EncoderDefault::Mistral && self.mistral_api_key().is_none() {
            anyhow::bail!("EMBEDDING_PROVIDER=mistral requires MISTRALAI_API_KEY to be set");
        }
        let score_threshold = self.score_threshold();
        if !(0.0..=1.0).contains(&score_threshold) {
            anyhow::bail!(
                "EMBEDDING_SCORE_THRESHOLD must be within [0, 1], got {}",
                score_threshold
            );
        }
        Ok(())
    }
}

/// Embedding config loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EnvEmbeddingConfig {
    pub embedding_provider: String,
    pub embedding_model: Option<String>,
    pub mistral_api_key: Option<String>,
    pub mistral_base_url: Option<String>,
    pub score_threshold: f32,
}

impl EmbeddingConfig for EnvEmbeddingConfig {
    fn provider(&self) -> &str {
        &self.embedding_provider
    }
    fn model(&self) -> &str {
        match self.embedding_model.as_deref() {
            Some(model) => model,
            None => EncoderDefault::from_provider(&self.embedding_provider)
                .unwrap_or(EncoderDefault::Mistral)
                .embedding_model(),
        }
    }
    fn mistral_api_key(&self) -> Option<&str> {
        self.mistral_api_key.as_deref().filter(|s| !s.trim().is_empty())
    }
    fn mistral_base_url(&self) -> Option<&str> {
        self.mistral_base_url.as_deref().filter(|s| !s.is_empty())
    }
    fn score_threshold(&self) -> f32 {
        self.score_threshold
    }
}

impl EnvEmbeddingConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self> {
        let embedding_provider =
            env::var("EMBEDDING_PROVIDER").unwrap_or_else(|_| "mistral".to_string());
        let embedding_model = env::var("EMBEDDING_MODEL").ok().filter(|s| !s.trim().is_empty());
        let mistral_api_key = env::var("MISTRALAI_API_KEY").ok().filter(|s| !s.trim().is_empty());
        let mistral_base_url = env::var("MISTRAL_BASE_URL").ok().filter(|s| !s.trim().is_empty());
        let score_threshold = match env::var("EMBEDDING_SCORE_THRESHOLD") {
            Ok(raw) => raw.trim().parse::<f32>().map_err(|e| {
                anyhow::anyhow!("EMBEDDING_SCORE_THRESHOLD is not a number ({}): {}", raw, e)
            })?,
            Err(_) => DEFAULT_SCORE_THRESHOLD,
        };
        Ok(Self {
            embedding_provider,
            embedding_model,
            mistral_api_key,
            mistral_base_url,
            score_threshold,
        })
    }
}
