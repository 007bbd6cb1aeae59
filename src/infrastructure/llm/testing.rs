//! Scripted provider for unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{Completion, CompletionRequest, LlmProvider, ProviderError, TokenUsage};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync>;

pub(crate) struct ScriptedProvider {
    name: String,
    responder: Responder,
    latency: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub(crate) fn new(
        name: &str,
        responder: impl Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            responder: Box::new(responder),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_| Ok(text.clone()))
    }

    pub(crate) fn failing(name: &str, status: u16) -> Self {
        let provider = name.to_string();
        Self::new(name, move |_| Err(http_error(&provider, status)))
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub(crate) fn http_error(provider: &str, status: u16) -> ProviderError {
    ProviderError::Http {
        provider: provider.to_string(),
        status,
        message: "scripted failure".to_string(),
    }
}

/// Pulls the task instruction back out of an agent prompt
pub(crate) fn task_of(request: &CompletionRequest) -> String {
    request
        .last_user_message()
        .unwrap_or_default()
        .lines()
        .find_map(|line| line.strip_prefix("YOUR TASK: "))
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push(request.last_user_message().unwrap_or_default().to_string());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        (self.responder)(request).map(|text| Completion {
            text,
            usage: TokenUsage::default(),
            provider: self.name.clone(),
            model: "scripted".to_string(),
        })
    }
}
