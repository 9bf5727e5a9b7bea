//! Provider-call boundary and the reqwest-backed Mistral session.

use async_trait::async_trait;
use std::fmt;

use crate::error::ApiError;
use crate::types::EmbeddingResponse;

#[cfg(feature = "http")]
pub use http::{MistralClient, MISTRAL_API_BASE};

/// One embeddings call against the provider. Errors are already classified as
/// transient or fatal so callers never inspect transport details.
#[async_trait]
pub trait EmbeddingsApi: Send + Sync + fmt::Debug {
    async fn embeddings(
        &self,
        model: &str,
        input: &[String],
    ) -> Result<EmbeddingResponse, ApiError>;
}

/// Masks an API key for safe logging: shows first 7 chars + "***" + last 4 chars.
/// If length <= 11, returns "***" to avoid leaking any part of the key.
pub fn mask_token(token: &str) -> String {
    let len = token.len();
    if len <= 11 || !token.is_ascii() {
        "***".to_string()
    } else {
        format!("{}***{}", &token[..7], &token[len - 4..])
    }
}

#[cfg(feature = "http")]
mod http {
    use std::fmt;
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
    use reqwest::{Client, StatusCode, Url};
    use tracing::debug;

    use super::{mask_token, EmbeddingsApi};
    use crate::error::{ApiError, MistralEmbeddingError, Result};
    use crate::types::{EmbeddingRequest, EmbeddingResponse};

    pub const MISTRAL_API_BASE: &str = "https://api.mistral.ai";

    // Network timeout of the session itself; the encoder adds none on top.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    const ERROR_BODY_PREVIEW_LEN: usize = 500;

    /// Authenticated HTTP session for the Mistral embeddings endpoint.
    #[derive(Clone)]
    pub struct MistralClient {
        client: Client,
        endpoint: Url,
        masked_key: String,
    }

    impl fmt::Debug for MistralClient {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("MistralClient")
                .field("endpoint", &self.endpoint.as_str())
                .field("api_key", &self.masked_key)
                .finish()
        }
    }

    impl MistralClient {
        /// Creates a session for `api_key`. `base_url` defaults to [`MISTRAL_API_BASE`].
        ///
        /// # Errors
        ///
        /// [`MistralEmbeddingError::ProviderConnection`] if the base URL is invalid, the key
        /// cannot be sent as a header, or the HTTP client cannot be built.
        pub fn new(api_key: &str, base_url: Option<&str>) -> Result<Self> {
            let base = base_url
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(MISTRAL_API_BASE);
            let base = if base.ends_with('/') {
                base.to_string()
            } else {
                format!("{}/", base)
            };
            let endpoint = Url::parse(&base)
                .and_then(|url| url.join("v1/embeddings"))
                .map_err(|e| MistralEmbeddingError::ProviderConnection(Box::new(e)))?;

            let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| MistralEmbeddingError::ProviderConnection(Box::new(e)))?;
            auth.set_sensitive(true);
            let mut headers = HeaderMap::new();
            headers.insert(AUTHORIZATION, auth);

            let client = Client::builder()
                .default_headers(headers)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| MistralEmbeddingError::ProviderConnection(Box::new(e)))?;

            let masked_key = mask_token(api_key);
            debug!(endpoint = %endpoint, api_key = %masked_key, "Mistral client created");

            Ok(Self {
                client,
                endpoint,
                masked_key,
            })
        }

        pub fn endpoint(&self) -> &str {
            self.endpoint.as_str()
        }
    }

    #[async_trait]
    impl EmbeddingsApi for MistralClient {
        async fn embeddings(
            &self,
            model: &str,
            input: &[String],
        ) -> std::result::Result<EmbeddingResponse, ApiError> {
            let request = EmbeddingRequest {
                model,
                input,
                encoding_format: "float",
            };

            let response = self
                .client
                .post(self.endpoint.clone())
                .json(&request)
                .send()
                .await
                .map_err(classify_transport_error)?;

            let status = response.status();
            let body = response.text().await.map_err(|e| {
                ApiError::Transient(format!("Failed to read Mistral API response: {}", e))
            })?;

            if !status.is_success() {
                return Err(classify_status(status, &body));
            }

            serde_json::from_str(&body).map_err(|e| {
                ApiError::Transient(format!("Unexpected Mistral API response: {}", e))
            })
        }
    }

    fn classify_transport_error(err: reqwest::Error) -> ApiError {
        if err.is_builder() {
            ApiError::Fatal(format!("Invalid Mistral API request: {}", err))
        } else {
            ApiError::Transient(format!("Mistral API request failed: {}", err))
        }
    }

    pub(crate) fn classify_status(status: StatusCode, body: &str) -> ApiError {
        let preview: String = body.chars().take(ERROR_BODY_PREVIEW_LEN).collect();
        let message = format!("Mistral API error ({}): {}", status, preview);
        if status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
            || status.is_server_error()
        {
            ApiError::Transient(message)
        } else {
            ApiError::Fatal(message)
        }
    }

}
