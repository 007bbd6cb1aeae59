use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

use super::errors::{OrchestrationError, OrchestrationResult};
use super::events::EventSink;
use super::worker::AgentWorker;
use crate::domain::agent::AgentKind;
use crate::domain::plan::{AgentTask, ExecutionMode, ExecutionPlan};
use crate::domain::repositories::WorkflowRepository;
use crate::domain::workflow::{AgentResult, Workflow, WorkflowEvent};

/// Splits `pending` into tasks whose dependencies have all executed and the
/// rest, preserving plan order in both halves
///
/// Unresolved dependencies are never satisfied.
pub fn partition_ready(
    pending: Vec<AgentTask>,
    executed: &HashSet<AgentKind>,
) -> (Vec<AgentTask>, Vec<AgentTask>) {
    pending
        .into_iter()
        .partition(|task| {
            task.dependencies
                .iter()
                .all(|dep| dep.agent().is_some_and(|agent| executed.contains(&agent)))
        })
}

/// Groups a plan's tasks into the waves parallel execution would run
///
/// Fails with the blocked agents when readiness starves, which happens for a
/// dependency cycle or a dependency on an agent absent from the plan.
pub fn plan_waves(plan: &ExecutionPlan) -> OrchestrationResult<Vec<Vec<AgentKind>>> {
    let mut pending = plan.agents.clone();
    let mut executed = HashSet::new();
    let mut waves = Vec::new();

    while !pending.is_empty() {
        let (ready, blocked) = partition_ready(pending, &executed);
        if ready.is_empty() {
            return Err(cycle_error(&blocked));
        }

        executed.extend(ready.iter().map(|task| task.agent));
        waves.push(ready.iter().map(|task| task.agent).collect());
        pending = blocked;
    }

    Ok(waves)
}

fn cycle_error(blocked: &[AgentTask]) -> OrchestrationError {
    OrchestrationError::CycleDependency {
        blocked: blocked.iter().map(|task| task.agent).collect(),
    }
}

/// Executes a workflow's plan
///
/// Results are recorded on the workflow as they arrive and a snapshot is
/// saved after each task (sequential) or wave (parallel), so pollers see
/// progress. The first failed task aborts the run; results recorded before
/// it stay on the workflow.
pub struct Scheduler {
    worker: AgentWorker,
    events: Arc<dyn EventSink>,
}

impl Scheduler {
    pub fn new(worker: AgentWorker, events: Arc<dyn EventSink>) -> Self {
        Self { worker, events }
    }

    pub async fn execute(
        &self,
        workflow: &mut Workflow,
        repository: &dyn WorkflowRepository,
    ) -> OrchestrationResult<()> {
        let plan = workflow
            .plan()
            .cloned()
            .ok_or_else(|| OrchestrationError::Repository("workflow has no plan".to_string()))?;

        match plan.execution {
            ExecutionMode::Sequential => self.run_sequential(workflow, plan.agents, repository).await,
            ExecutionMode::Parallel => self.run_parallel(workflow, plan.agents, repository).await,
        }
    }

    async fn run_sequential(
        &self,
        workflow: &mut Workflow,
        tasks: Vec<AgentTask>,
        repository: &dyn WorkflowRepository,
    ) -> OrchestrationResult<()> {
        for task in &tasks {
            self.events.emit(&WorkflowEvent::TaskStarted {
                workflow_id: workflow.id().to_string(),
                agent: task.agent,
            });

            let result = self.worker.execute(task, workflow.results()).await?;
            self.record(workflow, result)?;
            save(repository, workflow).await?;
        }

        Ok(())
    }

    async fn run_parallel(
        &self,
        workflow: &mut Workflow,
        tasks: Vec<AgentTask>,
        repository: &dyn WorkflowRepository,
    ) -> OrchestrationResult<()> {
        let mut pending = tasks;
        let mut executed = HashSet::new();
        let mut wave = 0;

        while !pending.is_empty() {
            let (ready, blocked) = partition_ready(pending, &executed);
            if ready.is_empty() {
                return Err(cycle_error(&blocked));
            }
            pending = blocked;
            wave += 1;

            self.events.emit(&WorkflowEvent::WaveStarted {
                workflow_id: workflow.id().to_string(),
                wave,
                agents: ready.iter().map(|task| task.agent).collect(),
            });
            for task in &ready {
                self.events.emit(&WorkflowEvent::TaskStarted {
                    workflow_id: workflow.id().to_string(),
                    agent: task.agent,
                });
            }

            // Same-wave tasks only see results from earlier waves
            let context = workflow.results().to_vec();
            let outcomes = join_all(
                ready
                    .iter()
                    .map(|task| self.worker.execute(task, &context)),
            )
            .await;

            let mut first_failure = None;
            for (task, outcome) in ready.iter().zip(outcomes) {
                match outcome {
                    Ok(result) => {
                        self.record(workflow, result)?;
                        executed.insert(task.agent);
                    }
                    Err(error) => {
                        warn!(workflow_id = %workflow.id(), agent = %task.agent, error = %error, "agent task failed");
                        first_failure.get_or_insert(error);
                    }
                }
            }

            save(repository, workflow).await?;
            if let Some(error) = first_failure {
                return Err(error);
            }
        }

        Ok(())
    }

    fn record(
        &self,
        workflow: &mut Workflow,
        result: AgentResult,
    ) -> OrchestrationResult<()> {
        let event = WorkflowEvent::TaskCompleted {
            workflow_id: workflow.id().to_string(),
            agent: result.agent,
            execution_time_ms: result.execution_time_ms,
        };
        workflow.record_result(result)?;
        self.events.emit(&event);
        Ok(())
    }
}

pub(crate) async fn save(
    repository: &dyn WorkflowRepository,
    workflow: &Workflow,
) -> OrchestrationResult<()> {
    repository
        .save(workflow)
        .await
        .map_err(OrchestrationError::Repository)
}
