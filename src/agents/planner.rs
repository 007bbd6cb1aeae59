use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::errors::{OrchestrationError, OrchestrationResult};
use super::prompts::library;
use crate::domain::agent::{self, AgentKind};
use crate::domain::plan::{parse_plan, ExecutionPlan};
use crate::domain::workflow::Context;
use crate::infrastructure::llm::{CompletionRequest, ProviderRegistry};

/// Turns a request into a validated execution plan
///
/// Makes one resilient call to the orchestrator agent and passes the answer
/// through the plan boundary in [`parse_plan`].
pub struct Planner {
    registry: Arc<ProviderRegistry>,
}

impl Planner {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Builds the planning prompt
    ///
    /// Suggestions bias the planner; they do not constrain it.
    pub fn build_request(request: &str, context: &Context) -> CompletionRequest {
        let suggested = agent::suggest(request)
            .iter()
            .map(AgentKind::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let catalog = agent::all()
            .iter()
            .map(|definition| {
                format!(
                    "- \"{}\": {} - {}",
                    definition.id, definition.name, definition.role
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let context = serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());

        let template = library::planning();
        let variables = HashMap::from([
            ("request", request.to_string()),
            ("context", context),
            ("suggested", suggested),
            ("catalog", catalog),
        ]);

        debug!(template = %template.name, version = %template.version, "rendering prompt");
        CompletionRequest::prompt(template.render(&variables))
            .with_system(AgentKind::Orchestrator.definition().system_prompt)
            .with_json_response()
    }

    pub async fn create_plan(
        &self,
        request: &str,
        context: &Context,
    ) -> OrchestrationResult<ExecutionPlan> {
        let completion = self
            .registry
            .invoke(AgentKind::Orchestrator, &Self::build_request(request, context))
            .await
            .map_err(OrchestrationError::Planning)?;

        debug!(
            provider = %completion.provider,
            tokens = completion.usage.total(),
            "planner responded"
        );

        let parsed = parse_plan(&completion.text)?;
        for warning in &parsed.warnings {
            warn!("{}", warning);
        }

        Ok(parsed.plan)
    }
}
