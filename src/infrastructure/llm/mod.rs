//! LLM provider implementations
//!
//! Every backend speaks the same [`LlmProvider`] contract so the registry and
//! the resilience layer never care which wire protocol sits behind a name.

mod anthropic;
mod error;
mod mock;
mod ollama;
mod openai;
pub mod registry;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatibleProvider;
pub use registry::ProviderRegistry;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Trait for LLM providers
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry name of this provider
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Describes the provider for status endpoints
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name().to_string(),
            kind: ProviderKind::Generic,
            model: self.model().to_string(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            supports_tools: false,
        }
    }

    /// Send a single non-streaming completion request
    async fn generate(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
}

/// Builds the backend described by `config`
pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let provider: Arc<dyn LlmProvider> = match config.kind {
        ProviderKind::Openai | ProviderKind::Generic => {
            Arc::new(OpenAiCompatibleProvider::from_config(config)?)
        }
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::from_config(config)?),
        ProviderKind::Ollama => Arc::new(OllamaProvider::from_config(config)?),
        ProviderKind::Mock => Arc::new(MockProvider::new(config.name.clone())),
    };
    Ok(provider)
}

/// Shared `reqwest` client setup for HTTP backends
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("devcrew-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Sends a JSON request and decodes a JSON response, mapping failures onto
/// [`ProviderError`]
pub(crate) async fn send_json<T>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
{
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_network_error(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_http_status(provider, status, &body));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::invalid_response(provider, e.to_string()))
}
