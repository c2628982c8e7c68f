//! LLM provider adapters.
//!
//! Each provider implements [`Backend`] for its wire format. [`Provider`]
//! selects one at runtime.

mod anthropic;
mod openai;

pub use anthropic::{AnthropicBackend, AnthropicBackendBuilder};
pub use openai::{OpenAiBackend, OpenAiBackendBuilder};

use crate::model::{Backend, ModelError, ModelRequest, ModelResponse};
use serde::Deserialize;

/// Which vendor API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-sonnet-4-20250514",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// A backend chosen at runtime.
pub enum Provider {
    OpenAi(OpenAiBackend),
    Anthropic(AnthropicBackend),
}

impl From<OpenAiBackend> for Provider {
    fn from(backend: OpenAiBackend) -> Self {
        Self::OpenAi(backend)
    }
}

impl From<AnthropicBackend> for Provider {
    fn from(backend: AnthropicBackend) -> Self {
        Self::Anthropic(backend)
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi(backend) => write!(f, "{backend}"),
            Self::Anthropic(backend) => write!(f, "{backend}"),
        }
    }
}

impl Backend for Provider {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        match self {
            Self::OpenAi(backend) => backend.call(request).await,
            Self::Anthropic(backend) => backend.call(request).await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_display() {
        let provider = Provider::from(OpenAiBackend::builder("k", "gpt-4o").build());
        assert_eq!(provider.to_string(), "openai(gpt-4o)");
        let provider = Provider::from(AnthropicBackend::builder("k", "claude").build());
        assert_eq!(provider.to_string(), "anthropic(claude)");
    }
}
