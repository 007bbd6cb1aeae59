//! Ollama local model provider

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    http_client, send_json, Completion, CompletionRequest, LlmProvider, ProviderConfig,
    ProviderError, ProviderInfo, ProviderKind, TokenUsage,
};

const OLLAMA_BASE_URL: &str = "http://localhost:11434";
const OLLAMA_DEFAULT_MODEL: &str = "llama3";

pub struct OllamaProvider {
    client: reqwest::Client,
    name: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(),
            name: config.name.clone(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(OLLAMA_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            kind: ProviderKind::Ollama,
            model: self.model.clone(),
            base_url: Some(self.base_url.clone()),
            max_tokens: self.max_tokens,
            supports_tools: false,
        }
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let system = request.system.as_deref().map(|content| WireMessage {
            role: "system",
            content,
        });
        let body = ChatRequest {
            model: &self.model,
            messages: system
                .into_iter()
                .chain(request.messages.iter().map(|message| WireMessage {
                    role: message.role.as_str(),
                    content: &message.content,
                }))
                .collect(),
            stream: false,
            format: request.json_response.then_some("json"),
            options: ChatOptions {
                temperature: request.temperature.unwrap_or(self.temperature),
                num_predict: request.max_tokens.unwrap_or(self.max_tokens),
            },
        };

        let http = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body);

        let response: ChatResponse = send_json(&self.name, http).await?;

        Ok(Completion {
            text: response.message.content,
            usage: TokenUsage {
                input_tokens: response.prompt_eval_count,
                output_tokens: response.eval_count,
            },
            provider: self.name.clone(),
            model: self.model.clone(),
        })
    }
}
