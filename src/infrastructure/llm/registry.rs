//! Named providers and the fallback chain built from them

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    build_provider, Completion, CompletionRequest, LlmProvider, MockProvider, ProviderInfo,
};
use crate::config::LlmSettings;
use crate::domain::agent::AgentKind;
use crate::infrastructure::resilience::{ResilienceError, RetryPolicy};

pub const MOCK_PROVIDER_NAME: &str = "mock";

/// Registered providers plus the order to try them in
///
/// Built once at start-up; mutation requires exclusive access.
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn LlmProvider>>,
    primary: Option<String>,
    fallbacks: Vec<String>,
    agent_overrides: HashMap<AgentKind, String>,
    policy: RetryPolicy,
}

impl ProviderRegistry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            providers: Vec::new(),
            primary: None,
            fallbacks: Vec::new(),
            agent_overrides: HashMap::new(),
            policy,
        }
    }

    /// Builds every enabled provider in `settings`
    ///
    /// Providers that fail to build are logged and skipped. The mock provider
    /// is appended when requested, or when nothing else could be built.
    pub fn from_settings(settings: &LlmSettings) -> Self {
        let mut registry = Self::new(RetryPolicy::from_config(settings));

        for config in settings.providers.iter().filter(|config| config.enabled) {
            match build_provider(config) {
                Ok(provider) => {
                    info!(provider = %config.name, model = provider.model(), "registered LLM provider");
                    registry.register(provider);
                }
                Err(e) => warn!(provider = %config.name, error = %e, "skipping LLM provider"),
            }
        }

        if let Some(primary) = &settings.primary {
            if !registry.set_primary(primary) {
                warn!(provider = %primary, "configured primary provider is not registered");
            }
        }
        registry.set_fallbacks(settings.fallbacks.clone());

        for (agent, provider) in &settings.agent_providers {
            registry.set_agent_provider(*agent, provider.clone());
        }

        if settings.enable_mock || registry.providers.is_empty() {
            if registry.providers.is_empty() {
                warn!("no LLM providers available, using mock responses");
            }
            registry.register(Arc::new(MockProvider::new(MOCK_PROVIDER_NAME)));
            if !registry.fallbacks.iter().any(|name| name == MOCK_PROVIDER_NAME) {
                registry.fallbacks.push(MOCK_PROVIDER_NAME.to_string());
            }
        }

        registry
    }

    /// Adds or replaces a provider by name. The first one registered becomes
    /// primary.
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        self.providers.retain(|existing| existing.name() != name);
        self.providers.push(provider);
        if self.primary.is_none() {
            self.primary = Some(name);
        }
    }

    /// Returns false when `name` is not registered
    pub fn set_primary(&mut self, name: &str) -> bool {
        if self.get(name).is_none() {
            return false;
        }
        self.primary = Some(name.to_string());
        true
    }

    pub fn set_fallbacks(&mut self, fallbacks: Vec<String>) {
        self.fallbacks = fallbacks;
    }

    /// Routes one agent's calls to `provider` before the default chain
    pub fn set_agent_provider(&mut self, agent: AgentKind, provider: impl Into<String>) {
        self.agent_overrides.insert(agent, provider.into());
    }

    /// Removes a provider, promoting the first remaining one if it was primary
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.providers.len();
        self.providers.retain(|provider| provider.name() != name);
        if self.providers.len() == before {
            return false;
        }

        if self.primary.as_deref() == Some(name) {
            self.primary = self.providers.first().map(|p| p.name().to_string());
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn fallbacks(&self) -> &[String] {
        &self.fallbacks
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Primary then fallbacks, each provider at most once
    pub fn chain(&self) -> Vec<Arc<dyn LlmProvider>> {
        self.resolve(self.primary.iter().chain(self.fallbacks.iter()))
    }

    /// Chain for one agent, led by its override when it has one
    pub fn chain_for(&self, agent: AgentKind) -> Vec<Arc<dyn LlmProvider>> {
        let names = self
            .agent_overrides
            .get(&agent)
            .into_iter()
            .chain(self.primary.iter())
            .chain(self.fallbacks.iter());
        self.resolve(names)
    }

    fn resolve<'a>(&self, names: impl Iterator<Item = &'a String>) -> Vec<Arc<dyn LlmProvider>> {
        let mut chain: Vec<Arc<dyn LlmProvider>> = Vec::new();
        for name in names {
            if chain.iter().any(|provider| provider.name() == name) {
                continue;
            }
            match self.get(name) {
                Some(provider) => chain.push(provider),
                None => warn!(provider = %name, "provider in chain is not registered"),
            }
        }
        chain
    }

    pub fn info(&self) -> Vec<ProviderInfo> {
        self.providers.iter().map(|provider| provider.info()).collect()
    }

    /// Runs `request` for `agent` through its provider chain
    pub async fn invoke(
        &self,
        agent: AgentKind,
        request: &CompletionRequest,
    ) -> Result<Completion, ResilienceError> {
        let chain = self.chain_for(agent);
        self.policy.invoke_chain(&chain, request).await
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
