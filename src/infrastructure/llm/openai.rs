//! OpenAI chat-completions provider
//!
//! Serves both the `openai` kind (fixed defaults, key required) and the
//! `generic` kind (any OpenAI-compatible endpoint with a configurable auth
//! header).
//!
//! SECURITY: Credentials are only sent to the configured endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    http_client, send_json, Completion, CompletionRequest, LlmProvider, ProviderConfig,
    ProviderError, ProviderInfo, ProviderKind, TokenUsage,
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4";

pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    name: String,
    kind: ProviderKind,
    base_url: String,
    model: String,
    api_key: Option<String>,
    auth_header: String,
    auth_prefix: String,
    max_tokens: u32,
    temperature: f32,
    supports_tools: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl OpenAiCompatibleProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config.resolved_api_key();

        let (base_url, model) = match config.kind {
            ProviderKind::Openai => {
                if api_key.is_none() {
                    return Err(ProviderError::Config("OpenAI API key is required".to_string()));
                }
                (
                    config.base_url.clone().unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
                    config.model.clone().unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
                )
            }
            _ => {
                let base_url = config.base_url.clone().ok_or_else(|| {
                    ProviderError::Config(format!("Base URL is required for {} provider", config.name))
                })?;
                let model = config.model.clone().ok_or_else(|| {
                    ProviderError::Config(format!("Model is required for {} provider", config.name))
                })?;
                (base_url, model)
            }
        };

        Ok(Self {
            client: http_client(),
            name: config.name.clone(),
            kind: config.kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            auth_header: config.auth_header.clone(),
            auth_prefix: config.auth_prefix.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            supports_tools: config.supports_tools,
        })
    }

    fn build_body<'a>(&'a self, request: &'a CompletionRequest) -> ChatCompletionRequest<'a> {
        let system = request.system.as_deref().map(|content| WireMessage {
            role: "system",
            content,
        });
        let messages = system
            .into_iter()
            .chain(request.messages.iter().map(|message| WireMessage {
                role: message.role.as_str(),
                content: &message.content,
            }))
            .collect();

        ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            response_format: request
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            kind: self.kind,
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            max_tokens: self.max_tokens,
            supports_tools: self.supports_tools,
        }
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&self.build_body(request));

        if let Some(key) = &self.api_key {
            let value = if self.auth_prefix.is_empty() {
                key.clone()
            } else {
                format!("{} {}", self.auth_prefix, key)
            };
            http = http.header(self.auth_header.as_str(), value);
        }

        let response: ChatCompletionResponse = send_json(&self.name, http).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::invalid_response(&self.name, "no message content in choices"))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(Completion {
            text,
            usage,
            provider: self.name.clone(),
            model: self.model.clone(),
        })
    }
}
