use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::aggregator::Aggregator;
use super::errors::{OrchestrationError, OrchestrationResult, WorkflowFailure};
use super::events::{EventSink, TracingEventSink};
use super::planner::Planner;
use super::scheduler::{save, Scheduler};
use super::worker::AgentWorker;
use crate::config::Config;
use crate::domain::agent::{self, AgentKind};
use crate::domain::plan::ExecutionPlan;
use crate::domain::repositories::WorkflowRepository;
use crate::domain::workflow::{AggregatedResult, Context, Workflow, WorkflowEvent};
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::repositories::InMemoryWorkflowRepository;

pub const DEFAULT_WORKFLOW_TIMEOUT: Duration = Duration::from_secs(600);

/// Successful result of [`Orchestrator::run_workflow`]
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub workflow_id: String,
    pub result: AggregatedResult,
    pub plan: ExecutionPlan,
    pub agents_used: Vec<AgentKind>,
    pub execution_time_ms: u64,
}

/// Entry point of the orchestration engine
///
/// Plans a request, schedules the plan's agent tasks and aggregates their
/// outputs. Every state change is saved to the workflow repository and
/// reported to the event sink.
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    planner: Planner,
    scheduler: Scheduler,
    aggregator: Aggregator,
    repository: Arc<dyn WorkflowRepository>,
    events: Arc<dyn EventSink>,
    timeout: Duration,
}

impl Orchestrator {
    pub fn new(registry: Arc<ProviderRegistry>, repository: Arc<dyn WorkflowRepository>) -> Self {
        let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);
        Self {
            planner: Planner::new(registry.clone()),
            scheduler: Scheduler::new(AgentWorker::new(registry.clone()), events.clone()),
            aggregator: Aggregator::new(registry.clone()),
            registry,
            repository,
            events,
            timeout: DEFAULT_WORKFLOW_TIMEOUT,
        }
    }

    /// Wires providers and an in-memory workflow store from configuration
    pub fn from_config(config: &Config) -> Self {
        let registry = Arc::new(ProviderRegistry::from_settings(&config.llm));
        let repository = Arc::new(InMemoryWorkflowRepository::new(
            config.workflows.ttl,
            config.workflows.max_retained,
        ));
        Self::new(registry, repository).with_timeout(config.workflows.timeout)
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.scheduler = Scheduler::new(AgentWorker::new(self.registry.clone()), events.clone());
        self.events = events;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn suggest_agents(&self, text: &str) -> Vec<AgentKind> {
        agent::suggest(text)
    }

    /// Plans `request` without running it
    pub async fn create_execution_plan(
        &self,
        request: &str,
        context: &Context,
    ) -> OrchestrationResult<ExecutionPlan> {
        if request.trim().is_empty() {
            return Err(OrchestrationError::EmptyRequest);
        }
        self.planner.create_plan(request, context).await
    }

    /// Runs a request end to end
    ///
    /// The whole run is bounded by the configured timeout. On failure the
    /// workflow is marked failed and the error carries the plan and every
    /// result produced before the failure.
    pub async fn run_workflow(
        &self,
        request: &str,
        context: Context,
    ) -> Result<WorkflowOutcome, WorkflowFailure> {
        match self.repository.evict_expired().await {
            Ok(0) => {}
            Ok(evicted) => info!(evicted, "evicted expired workflows"),
            Err(e) => warn!(error = %e, "workflow eviction failed"),
        }

        let (mut workflow, started) = Workflow::new(request, context)
            .map_err(|e| WorkflowFailure::rejected(e.into()))?;
        self.events.emit(&started);

        let run = tokio::time::timeout(self.timeout, self.drive(&mut workflow)).await;
        let outcome = run.unwrap_or(Err(OrchestrationError::Timeout(self.timeout)));

        match outcome {
            Ok((plan, result)) => Ok(WorkflowOutcome {
                workflow_id: workflow.id().to_string(),
                agents_used: plan.agent_ids(),
                plan,
                result,
                execution_time_ms: workflow.execution_time_ms(),
            }),
            Err(error) => Err(self.fail(&mut workflow, error).await),
        }
    }

    async fn drive(
        &self,
        workflow: &mut Workflow,
    ) -> OrchestrationResult<(ExecutionPlan, AggregatedResult)> {
        save(self.repository.as_ref(), workflow).await?;

        let plan = self
            .planner
            .create_plan(workflow.request(), workflow.context())
            .await?;
        let event = workflow.begin_execution(plan.clone())?;
        self.commit(workflow, event).await?;

        self.scheduler
            .execute(workflow, self.repository.as_ref())
            .await?;

        let event = workflow.begin_aggregation()?;
        self.commit(workflow, event).await?;

        let result = self
            .aggregator
            .aggregate(workflow.results(), workflow.request())
            .await?;
        let event = workflow.complete(result.clone())?;
        self.commit(workflow, event).await?;

        Ok((plan, result))
    }

    async fn commit(&self, workflow: &Workflow, event: WorkflowEvent) -> OrchestrationResult<()> {
        self.events.emit(&event);
        save(self.repository.as_ref(), workflow).await
    }

    async fn fail(&self, workflow: &mut Workflow, error: OrchestrationError) -> WorkflowFailure {
        if !workflow.status().is_terminal() {
            match workflow.fail(error.to_string()) {
                Ok(event) => {
                    if let Err(e) = self.commit(workflow, event).await {
                        warn!(workflow_id = %workflow.id(), error = %e, "failed to save failed workflow");
                    }
                }
                Err(e) => warn!(workflow_id = %workflow.id(), error = %e, "could not mark workflow failed"),
            }
        }

        WorkflowFailure {
            workflow_id: Some(workflow.id().to_string()),
            error,
            plan: workflow.plan().cloned(),
            partial_results: workflow.results().to_vec(),
        }
    }

    pub async fn get_workflow_status(&self, workflow_id: &str) -> OrchestrationResult<Option<Workflow>> {
        self.repository
            .find_by_id(workflow_id)
            .await
            .map_err(OrchestrationError::Repository)
    }

    /// Every retained workflow, oldest first
    pub async fn list_active_workflows(&self) -> OrchestrationResult<Vec<Workflow>> {
        self.repository
            .list()
            .await
            .map_err(OrchestrationError::Repository)
    }
}
