//! # Mistral Embedding Service
//!
//! This crate provides an implementation of the `EmbeddingService` trait using Mistral AI's embedding API.
//!
//! ## MistralEmbedding
//!
//! Uses Mistral's embedding models (default: `mistral-embed`, 1024 dimensions).
//!
//! Every call is retried up to 3 times on transient provider errors (rate limits,
//! timeouts, 5xx), waiting 1s, 2s and 4s between attempts. Rejected requests
//! (bad key, bad input) fail on the first attempt.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mistral_embedding::MistralEmbedding;
//! use embedding::EmbeddingService;
//!
//! async fn example() -> Result<(), anyhow::Error> {
//!     // The API key can be passed explicitly or read from MISTRALAI_API_KEY
//!     let service = MistralEmbedding::new(None, None, None)?;
//!     let vectors = service
//!         .embed_batch(&["Hello".to_string(), "World".to_string()])
//!         .await?;
//!     println!("{} vectors of dimension {}", vectors.len(), vectors[0].len());
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! - **API Key**: explicit argument, else the `MISTRALAI_API_KEY` environment variable
//! - **Model**: defaults to the `mistral` entry of [`embedding::EncoderDefault`]
//! - **Score threshold**: defaults to 0.82; only used by callers
//!
//! See [Mistral Embeddings Documentation](https://docs.mistral.ai/capabilities/embeddings/) for more details.

use async_trait::async_trait;
use embedding::{EmbeddingConfig, EmbeddingService, EncoderDefault, DEFAULT_SCORE_THRESHOLD};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

mod client;
mod error;
mod retry;
mod types;

#[cfg(feature = "http")]
pub use client::{MistralClient, MISTRAL_API_BASE};
pub use client::{mask_token, EmbeddingsApi};
pub use error::{ApiError, MistralEmbeddingError, Result};
pub use retry::RetryPolicy;
pub use types::{EmbeddingData, EmbeddingResponse, Usage};

/// Environment variable read when no API key is passed explicitly.
pub const MISTRAL_API_KEY_ENV: &str = "MISTRALAI_API_KEY";

/// Value of the `type` tag in serialized encoder config.
pub const ENCODER_TYPE: &str = "mistral";

/// Mistral embedding service. Holds the session, model name and score threshold.
///
/// Serializes as `{"type": "mistral", "name": ..., "score_threshold": ...}`; the
/// session is never serialized, so a deserialized encoder must be [`connect`](Self::connect)ed
/// before it can embed. Deserializing config tagged with another encoder type fails.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "mistral")]
pub struct MistralEmbedding {
    /// Embedding model name (e.g. "mistral-embed").
    name: String,
    score_threshold: f32,
    #[serde(skip)]
    session: Option<Arc<dyn EmbeddingsApi>>,
    #[serde(skip)]
    retry_policy: RetryPolicy,
}

/// Serialized encoder config as read back, before the `type` tag is checked.
#[derive(Deserialize)]
struct EncoderConfig {
    #[serde(rename = "type")]
    encoder_type: String,
    #[serde(default = "default_model")]
    name: String,
    #[serde(default = "default_score_threshold")]
    score_threshold: f32,
}

impl<'de> Deserialize<'de> for MistralEmbedding {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let config = EncoderConfig::deserialize(deserializer)?;
        if config.encoder_type != ENCODER_TYPE {
            return Err(serde::de::Error::custom(format!(
                "expected encoder type `{}`, found `{}`",
                ENCODER_TYPE, config.encoder_type
            )));
        }
        Ok(Self {
            name: config.name,
            score_threshold: config.score_threshold,
            session: None,
            retry_policy: RetryPolicy::default(),
        })
    }
}

fn default_model() -> String {
    EncoderDefault::Mistral.embedding_model().to_string()
}

fn default_score_threshold() -> f32 {
    DEFAULT_SCORE_THRESHOLD
}

/// Builder for [`MistralEmbedding`]; unset fields fall back to defaults.
#[derive(Clone, Default)]
pub struct MistralEmbeddingBuilder {
    name: Option<String>,
    api_key: Option<String>,
    score_threshold: Option<f32>,
    base_url: Option<String>,
    retry_policy: RetryPolicy,
}

impl MistralEmbeddingBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = Some(score_threshold);
        self
    }

    /// Sends requests to `base_url` instead of the public Mistral API.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Resolves the API key and opens the session. No request is sent.
    ///
    /// # Errors
    ///
    /// - [`MistralEmbeddingError::DependencyMissing`] without the `http` feature
    /// - [`MistralEmbeddingError::Configuration`] if no API key is given or set in `MISTRALAI_API_KEY`
    /// - [`MistralEmbeddingError::ProviderConnection`] if the session cannot be set up
    pub fn build(self) -> Result<MistralEmbedding> {
        if !cfg!(feature = "http") {
            return Err(MistralEmbeddingError::DependencyMissing);
        }
        let api_key = resolve_api_key(self.api_key)?;
        let session = open_session(&api_key, self.base_url.as_deref())?;
        let name = self.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(default_model);
        let score_threshold = self.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD);

        info!(
            model = %name,
            score_threshold,
            api_key = %mask_token(&api_key),
            "Mistral embedding service created"
        );

        Ok(MistralEmbedding {
            name,
            score_threshold,
            session: Some(session),
            retry_policy: self.retry_policy,
        })
    }
}

/// Explicit key first, then `MISTRALAI_API_KEY`. Blank values count as missing.
fn resolve_api_key(explicit: Option<String>) -> Result<String> {
    explicit
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            std::env::var(MISTRAL_API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty())
        })
        .ok_or_else(|| {
            MistralEmbeddingError::Configuration(format!(
                "Mistral API key not provided (pass one or set {})",
                MISTRAL_API_KEY_ENV
            ))
        })
}

#[cfg(feature = "http")]
fn open_session(api_key: &str, base_url: Option<&str>) -> Result<Arc<dyn EmbeddingsApi>> {
    Ok(Arc::new(MistralClient::new(api_key, base_url)?))
}

#[cfg(not(feature = "http"))]
fn open_session(_api_key: &str, _base_url: Option<&str>) -> Result<Arc<dyn EmbeddingsApi>> {
    Err(MistralEmbeddingError::DependencyMissing)
}

impl MistralEmbedding {
    /// Creates a new Mistral embedding service.
    ///
    /// # Arguments
    ///
    /// * `name` - Embedding model; `None` uses `mistral-embed`.
    /// * `api_key` - Mistral API key; `None` reads `MISTRALAI_API_KEY`.
    /// * `score_threshold` - Similarity threshold for callers; `None` uses 0.82.
    pub fn new(
        name: Option<String>,
        api_key: Option<String>,
        score_threshold: Option<f32>,
    ) -> Result<Self> {
        let mut builder = Self::builder();
        builder.name = name;
        builder.api_key = api_key;
        builder.score_threshold = score_threshold;
        builder.build()
    }

    pub fn builder() -> MistralEmbeddingBuilder {
        MistralEmbeddingBuilder::default()
    }

    /// Creates a service over an existing session (another transport, a proxy client, a test double).
    pub fn with_session(
        name: impl Into<String>,
        score_threshold: f32,
        session: Arc<dyn EmbeddingsApi>,
    ) -> Self {
        Self {
            name: name.into(),
            score_threshold,
            session: Some(session),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Creates a service from the shared embedding config (model, key, base URL, threshold).
    ///
    /// # Errors
    ///
    /// [`MistralEmbeddingError::Configuration`] if the config names another provider or
    /// fails [`EmbeddingConfig::validate`].
    pub fn from_config(config: &dyn EmbeddingConfig) -> Result<Self> {
        if EncoderDefault::from_provider(config.provider()) != Some(EncoderDefault::Mistral) {
            return Err(MistralEmbeddingError::Configuration(format!(
                "EMBEDDING_PROVIDER={} cannot build a Mistral embedding service",
                config.provider()
            )));
        }
        config
            .validate()
            .map_err(|e| MistralEmbeddingError::Configuration(e.to_string()))?;

        let mut builder = Self::builder()
            .name(config.model())
            .score_threshold(config.score_threshold());
        if let Some(api_key) = config.mistral_api_key() {
            builder = builder.api_key(api_key);
        }
        if let Some(base_url) = config.mistral_base_url() {
            builder = builder.base_url(base_url);
        }
        builder.build()
    }

    /// Opens a session for an encoder that has none (e.g. one deserialized from config).
    pub fn connect(self, api_key: Option<String>) -> Result<Self> {
        let mut builder = Self::builder()
            .name(self.name)
            .score_threshold(self.score_threshold)
            .retry_policy(self.retry_policy);
        builder.api_key = api_key;
        builder.build()
    }

    /// Sets a different embedding model.
    pub fn with_model(mut self, model: String) -> Self {
        self.name = model;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Returns the embedding model name.
    pub fn model(&self) -> &str {
        &self.name
    }

    pub fn encoder_type(&self) -> &'static str {
        ENCODER_TYPE
    }

    /// True once a session is attached.
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Embeds `documents`, returning one vector per document in input order.
    ///
    /// Transient provider errors are retried with exponential backoff (1s, 2s, 4s by
    /// default); a response with at least one entry ends the loop.
    ///
    /// # Errors
    ///
    /// - [`MistralEmbeddingError::NotInitialized`] if no session is attached
    /// - [`MistralEmbeddingError::ProviderCall`] on a fatal provider error, without retrying
    /// - [`MistralEmbeddingError::EmptyResponse`] when all attempts fail or return no data,
    ///   or when the number of vectors differs from the number of documents
    #[instrument(skip(self, documents), fields(model = %self.name, batch_size = documents.len()))]
    pub async fn embed_documents(&self, documents: &[String]) -> Result<Vec<Vec<f32>>> {
        let session = self
            .session
            .as_ref()
            .ok_or(MistralEmbeddingError::NotInitialized)?;

        if documents.is_empty() {
            debug!("Mistral embed_batch empty input, skipping");
            return Ok(vec![]);
        }

        info!(
            model = %self.name,
            batch_size = documents.len(),
            "step: embedding Mistral embed_batch request"
        );

        let mut response = None;
        let mut error_message = String::new();

        for attempt in 0..self.retry_policy.max_attempts() {
            match session.embeddings(&self.name, documents).await {
                Ok(r) if !r.data.is_empty() => {
                    debug!(attempt, "Mistral embed_batch response received");
                    response = Some(r);
                    break;
                }
                Ok(_) => {
                    warn!(attempt, "Mistral embed_batch response has no embedding data");
                }
                Err(ApiError::Transient(message)) => {
                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        attempt,
                        delay = ?delay,
                        error = %message,
                        "Mistral embed_batch request failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    error_message = message;
                }
                Err(e @ ApiError::Fatal(_)) => {
                    warn!(attempt, error = %e, "Mistral embed_batch request rejected");
                    return Err(MistralEmbeddingError::ProviderCall(e));
                }
            }
        }

        let Some(response) = response else {
            return Err(MistralEmbeddingError::EmptyResponse(error_message));
        };

        let embeddings = extract_embeddings(response, documents.len())?;

        let dimension = embeddings.first().map(|v| v.len()).unwrap_or(0);
        info!(
            count = embeddings.len(),
            dimension,
            "step: embedding Mistral embed_batch done"
        );
        Ok(embeddings)
    }
}

/// Orders entries by `index` and checks there is exactly one per document, indexed `0..expected`.
fn extract_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        warn!(
            expected,
            got = data.len(),
            "Mistral embed_batch response count mismatch"
        );
        return Err(MistralEmbeddingError::EmptyResponse(format!(
            "Expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    if let Some((position, item)) = data.iter().enumerate().find(|(i, d)| d.index != *i) {
        warn!(
            expected,
            position,
            index = item.index,
            "Mistral embed_batch response indices do not match inputs"
        );
        return Err(MistralEmbeddingError::EmptyResponse(format!(
            "Mistral response indices do not cover 0..{} (entry {} has index {})",
            expected, position, item.index
        )));
    }
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl EmbeddingService for MistralEmbedding {
    fn name(&self) -> &str {
        &self.name
    }

    fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        const LOG_PREVIEW_LEN: usize = 200;
        let text_preview: String = text.chars().take(LOG_PREVIEW_LEN).collect();
        debug!(
            model = %self.name,
            text_preview = %text_preview,
            text_len = text.len(),
            "step: embedding Mistral embed request"
        );

        let mut embeddings = self.embed_documents(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding in response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(self.embed_documents(texts).await?)
    }
}
