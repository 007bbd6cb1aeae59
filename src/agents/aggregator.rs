use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::errors::{OrchestrationError, OrchestrationResult};
use super::prompts::library;
use crate::domain::agent::AgentKind;
use crate::domain::workflow::{AgentResult, AggregatedResult};
use crate::infrastructure::llm::{CompletionRequest, ProviderRegistry};

/// Synthesizes agent outputs into one final response
pub struct Aggregator {
    registry: Arc<ProviderRegistry>,
}

impl Aggregator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn build_request(results: &[AgentResult], request: &str) -> CompletionRequest {
        let sections = results
            .iter()
            .map(|result| {
                format!(
                    "\n### {}\nTask: {}\nOutput:\n{}\n",
                    result.agent_name, result.task, result.output
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n");

        let variables = HashMap::from([("request", request.to_string()), ("results", sections)]);

        let template = library::aggregation();
        debug!(template = %template.name, version = %template.version, "rendering prompt");
        CompletionRequest::prompt(template.render(&variables))
            .with_system(AgentKind::Orchestrator.definition().system_prompt)
    }

    pub async fn aggregate(
        &self,
        results: &[AgentResult],
        request: &str,
    ) -> OrchestrationResult<AggregatedResult> {
        let completion = self
            .registry
            .invoke(AgentKind::Orchestrator, &Self::build_request(results, request))
            .await
            .map_err(OrchestrationError::Aggregation)?;

        debug!(provider = %completion.provider, results = results.len(), "aggregation complete");

        Ok(AggregatedResult::new(completion.text, results.to_vec()))
    }
}
