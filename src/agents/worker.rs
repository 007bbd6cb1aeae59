use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

use super::errors::{OrchestrationError, OrchestrationResult};
use super::prompts::library;
use crate::domain::plan::AgentTask;
use crate::domain::workflow::AgentResult;
use crate::infrastructure::llm::{CompletionRequest, ProviderRegistry};

/// Runs one agent task against the agent's provider chain
#[derive(Clone)]
pub struct AgentWorker {
    registry: Arc<ProviderRegistry>,
}

impl AgentWorker {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Prior outputs as `name: output` blocks, or "None"
    pub fn previous_outputs(previous: &[AgentResult]) -> String {
        if previous.is_empty() {
            return "None".to_string();
        }

        previous
            .iter()
            .map(|result| format!("{}: {}", result.agent_name, result.output))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn build_request(task: &AgentTask, previous: &[AgentResult]) -> CompletionRequest {
        let variables = HashMap::from([
            ("task", task.task.clone()),
            ("previous", Self::previous_outputs(previous)),
        ]);

        let template = library::agent_task();
        debug!(template = %template.name, version = %template.version, agent = %task.agent, "rendering prompt");
        CompletionRequest::prompt(template.render(&variables))
            .with_system(task.agent.definition().system_prompt)
    }

    /// Executes `task` with the results produced so far as context
    ///
    /// Provider failures are returned as-is; the caller decides what a
    /// failed task means for the workflow.
    pub async fn execute(
        &self,
        task: &AgentTask,
        previous: &[AgentResult],
    ) -> OrchestrationResult<AgentResult> {
        let started = Instant::now();
        let request = Self::build_request(task, previous);

        let completion = self
            .registry
            .invoke(task.agent, &request)
            .await
            .map_err(|source| OrchestrationError::AgentInvocation {
                agent: task.agent,
                source,
            })?;

        let execution_time_ms = started.elapsed().as_millis() as u64;
        debug!(
            agent = %task.agent,
            provider = %completion.provider,
            execution_time_ms,
            "agent produced output"
        );

        Ok(AgentResult {
            agent: task.agent,
            agent_name: task.agent.definition().name.to_string(),
            task: task.task.clone(),
            output: completion.text,
            execution_time_ms,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentKind;
    use crate::infrastructure::llm::testing::{task_of, ScriptedProvider};
    use crate::infrastructure::llm::LlmProvider;
    use crate::infrastructure::resilience::RetryPolicy;

    fn task(agent: AgentKind, text: &str) -> AgentTask {
        AgentTask {
            agent,
            task: text.to_string(),
            dependencies: vec![],
            priority: 1,
        }
    }

    fn result(agent: AgentKind, output: &str) -> AgentResult {
        AgentResult {
            agent,
            agent_name: agent.definition().name.to_string(),
            task: "t".to_string(),
            output: output.to_string(),
            execution_time_ms: 1,
            timestamp: Utc::now(),
        }
    }

    fn worker_with(provider: Arc<ScriptedProvider>) -> AgentWorker {
        let mut registry = ProviderRegistry::new(RetryPolicy::default());
        registry.register(provider as Arc<dyn LlmProvider>);
        AgentWorker::new(Arc::new(registry))
    }

    #[test]
    fn test_prompt_without_previous_outputs() {
        let request = AgentWorker::build_request(&task(AgentKind::Qa, "Write tests"), &[]);
        let prompt = request.last_user_message().unwrap();

        assert_eq!(task_of(&request), "Write tests");
        assert!(prompt.contains("PREVIOUS AGENT OUTPUTS:\nNone"));
        assert!(request.system.as_deref().unwrap().contains("QA"));
    }

    #[test]
    fn test_prompt_joins_previous_outputs() {
        let previous = vec![
            result(AgentKind::Database, "tables"),
            result(AgentKind::Backend, "routes"),
        ];

        assert_eq!(
            AgentWorker::previous_outputs(&previous),
            "Database Specialist: tables\n\nBackend Specialist: routes"
        );
    }

    #[tokio::test]
    async fn test_execute_wraps_output() {
        let provider = Arc::new(ScriptedProvider::new("primary", |request| {
            Ok(format!("done: {}", task_of(request)))
        }));
        let worker = worker_with(provider);

        let result = worker
            .execute(&task(AgentKind::Frontend, "Build the form"), &[])
            .await
            .unwrap();

        assert_eq!(result.agent, AgentKind::Frontend);
        assert_eq!(result.agent_name, "Frontend Specialist");
        assert_eq!(result.task, "Build the form");
        assert_eq!(result.output, "done: Build the form");
    }

    #[tokio::test]
    async fn test_execute_propagates_provider_failure() {
        let worker = worker_with(Arc::new(ScriptedProvider::failing("primary", 401)));

        let error = worker
            .execute(&task(AgentKind::Devops, "Ship it"), &[])
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            OrchestrationError::AgentInvocation {
                agent: AgentKind::Devops,
                ..
            }
        ));
    }
}
