//! Default values per embedding provider.

/// Similarity threshold used when an encoder is built without one.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.82;

/// Default embedding model for each supported provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderDefault {
    Mistral,
    OpenAI,
    Zhipuai,
}

impl EncoderDefault {
    /// Looks up the defaults for a provider id (case-insensitive), e.g. `"mistral"`.
    pub fn from_provider(provider: &str) -> Option<Self> {
        match provider.trim().to_ascii_lowercase().as_str() {
            "mistral" | "mistralai" => Some(Self::Mistral),
            "openai" => Some(Self::OpenAI),
            "zhipuai" | "bigmodel" => Some(Self::Zhipuai),
            _ => None,
        }
    }

    /// Canonical provider id.
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Mistral => "mistral",
            Self::OpenAI => "openai",
            Self::Zhipuai => "zhipuai",
        }
    }

    pub fn embedding_model(&self) -> &'static str {
        match self {
            Self::Mistral => "mistral-embed",
            Self::OpenAI => "text-embedding-3-small",
            Self::Zhipuai => "embedding-2",
        }
    }
}
