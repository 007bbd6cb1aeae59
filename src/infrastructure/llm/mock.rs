//! Offline provider used when no real backend is configured
//!
//! Answers planning requests (those asking for JSON) with a one-task plan for
//! the orchestrator, and everything else with a canned notice that echoes the
//! request. Lets the full workflow run end to end without credentials.

use async_trait::async_trait;

use super::{
    Completion, CompletionRequest, LlmProvider, ProviderError, ProviderInfo, ProviderKind,
    TokenUsage, DEFAULT_MAX_TOKENS,
};

const MOCK_MODEL: &str = "mock";

pub struct MockProvider {
    name: String,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn mock_plan() -> String {
        serde_json::json!({
            "analysis": "Mock analysis (no LLM providers available)",
            "complexity": "simple",
            "agents": [{
                "agent": "orchestrator",
                "task": "Summarize the request and outline an approach",
                "dependencies": [],
                "priority": 1
            }],
            "execution": "sequential"
        })
        .to_string()
    }

    fn mock_text(request: &CompletionRequest) -> String {
        let message = request.last_user_message().unwrap_or_default().trim();
        format!(
            "**Mock Response** (All providers unavailable)\n\n\
             Your message: \"{}\"\n\n\
             To fix this:\n\
             1. Check your API keys\n\
             2. Verify network connectivity\n\
             3. Ensure services are running",
            message
        )
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        MOCK_MODEL
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            kind: ProviderKind::Mock,
            model: MOCK_MODEL.to_string(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            supports_tools: false,
        }
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let text = if request.json_response {
            Self::mock_plan()
        } else {
            Self::mock_text(request)
        };

        Ok(Completion {
            text,
            usage: TokenUsage::default(),
            provider: self.name.clone(),
            model: MOCK_MODEL.to_string(),
        })
    }
}
