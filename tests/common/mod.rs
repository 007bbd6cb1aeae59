//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use devcrew_api::agents::{EventSink, MemoryEventSink, Orchestrator};
use devcrew_api::infrastructure::llm::{
    Completion, CompletionRequest, LlmProvider, ProviderError, ProviderRegistry, TokenUsage,
};
use devcrew_api::infrastructure::repositories::InMemoryWorkflowRepository;
use devcrew_api::infrastructure::resilience::RetryPolicy;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, ProviderError> + Send + Sync>;

/// Provider double that answers from a closure and records every prompt
pub struct FakeProvider {
    name: String,
    responder: Responder,
    latency: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(
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

    /// Answers planning calls with `plan` and every other call with a
    /// deterministic echo of the agent task
    pub fn planning(name: &str, plan: &'static str) -> Self {
        Self::new(name, move |request| Ok(answer(request, plan)))
    }

    pub fn failing(name: &str, status: u16) -> Self {
        let provider = name.to_string();
        Self::new(name, move |_| {
            Err(ProviderError::Http {
                provider: provider.clone(),
                status,
                message: "unavailable".to_string(),
            })
        })
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Prompt sent for the agent task starting with `task`
    pub fn prompt_for(&self, task: &str) -> String {
        self.prompts()
            .into_iter()
            .find(|prompt| task_line(prompt).is_some_and(|t| t.starts_with(task)))
            .unwrap_or_else(|| panic!("no prompt for task {:?}", task))
    }
}

#[async_trait]
impl LlmProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "fake"
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
            model: "fake".to_string(),
        })
    }
}

fn task_line(prompt: &str) -> Option<&str> {
    prompt.lines().find_map(|line| line.strip_prefix("YOUR TASK: "))
}

/// Agent task named in an agent prompt, if the request is one
pub fn task_of(request: &CompletionRequest) -> Option<String> {
    request
        .last_user_message()
        .and_then(task_line)
        .map(str::to_string)
}

/// Plan for planning calls, `done: <task>` for agent calls, a summary otherwise
pub fn answer(request: &CompletionRequest, plan: &str) -> String {
    if request.json_response {
        return plan.to_string();
    }
    match task_of(request) {
        Some(task) => format!("done: {}", task),
        None => "final summary".to_string(),
    }
}

pub struct TestEngine {
    pub orchestrator: Arc<Orchestrator>,
    pub events: Arc<MemoryEventSink>,
}

/// Orchestrator over the given providers, tried in order
pub fn engine(providers: Vec<Arc<FakeProvider>>) -> TestEngine {
    let mut registry = ProviderRegistry::new(RetryPolicy::default());
    for provider in &providers {
        registry.register(provider.clone() as Arc<dyn LlmProvider>);
    }
    registry.set_fallbacks(
        providers
            .iter()
            .skip(1)
            .map(|provider| provider.name().to_string())
            .collect(),
    );

    let events = Arc::new(MemoryEventSink::new());
    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::new(InMemoryWorkflowRepository::default()),
    )
    .with_events(events.clone() as Arc<dyn EventSink>);

    TestEngine {
        orchestrator: Arc::new(orchestrator),
        events,
    }
}
