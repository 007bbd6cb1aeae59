use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::events::WorkflowEvent;
use super::value_objects::{AgentResult, AggregatedResult, WorkflowStatus};
use crate::domain::plan::ExecutionPlan;

/// Caller-supplied context passed through to the planner
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Violations of workflow invariants
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Request cannot be empty")]
    EmptyRequest,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    #[error("Workflow has {planned} planned tasks; cannot record another result")]
    TooManyResults { planned: usize },
}

/// Workflow aggregate root
///
/// One end-to-end orchestration run. Enforces the lifecycle rules:
///
/// # Invariants
/// - Request cannot be empty
/// - Status only moves forward (see [`WorkflowStatus::can_transition_to`])
/// - Results are only recorded while executing, and never exceed the
///   number of planned tasks
///
/// # Example
/// ```
/// use devcrew_api::domain::workflow::{Context, Workflow, WorkflowStatus};
///
/// let (workflow, event) = Workflow::new("Build a todo app", Context::new())
///     .expect("valid workflow");
///
/// assert_eq!(workflow.status(), WorkflowStatus::Planning);
/// assert_eq!(event.workflow_id(), workflow.id());
/// ```
#[derive(Debug, Clone)]
pub struct Workflow {
    id: String,
    request: String,
    context: Context,
    plan: Option<ExecutionPlan>,
    results: Vec<AgentResult>,
    status: WorkflowStatus,
    final_result: Option<AggregatedResult>,
    error: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    /// Creates a new workflow in the planning state
    pub fn new(
        request: impl Into<String>,
        context: Context,
    ) -> Result<(Self, WorkflowEvent), WorkflowError> {
        let request = request.into();
        if request.trim().is_empty() {
            return Err(WorkflowError::EmptyRequest);
        }

        let workflow = Self {
            id: format!("workflow-{}", Uuid::new_v4()),
            request,
            context,
            plan: None,
            results: Vec::new(),
            status: WorkflowStatus::Planning,
            final_result: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        let event = WorkflowEvent::Started {
            workflow_id: workflow.id.clone(),
            request: workflow.request.clone(),
        };

        Ok((workflow, event))
    }

    fn transition(&mut self, next: WorkflowStatus) -> Result<(), WorkflowError> {
        if !self.status.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Attaches the validated plan and moves to executing
    pub fn begin_execution(&mut self, plan: ExecutionPlan) -> Result<WorkflowEvent, WorkflowError> {
        self.transition(WorkflowStatus::Executing)?;

        let event = WorkflowEvent::PlanCreated {
            workflow_id: self.id.clone(),
            agents: plan.agent_ids(),
            complexity: plan.complexity,
            execution: plan.execution,
        };
        self.plan = Some(plan);

        Ok(event)
    }

    /// Appends a completed agent result
    pub fn record_result(&mut self, result: AgentResult) -> Result<(), WorkflowError> {
        if self.status != WorkflowStatus::Executing {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                to: WorkflowStatus::Executing,
            });
        }

        let planned = self.plan.as_ref().map_or(0, |plan| plan.agents.len());
        if self.results.len() >= planned {
            return Err(WorkflowError::TooManyResults { planned });
        }

        self.results.push(result);
        Ok(())
    }

    pub fn begin_aggregation(&mut self) -> Result<WorkflowEvent, WorkflowError> {
        self.transition(WorkflowStatus::Aggregating)?;

        Ok(WorkflowEvent::AggregationStarted {
            workflow_id: self.id.clone(),
            results: self.results.len(),
        })
    }

    pub fn complete(&mut self, result: AggregatedResult) -> Result<WorkflowEvent, WorkflowError> {
        self.transition(WorkflowStatus::Completed)?;
        self.final_result = Some(result);
        self.completed_at = Some(Utc::now());

        Ok(WorkflowEvent::Completed {
            workflow_id: self.id.clone(),
            execution_time_ms: self.execution_time_ms(),
        })
    }

    /// Marks the workflow as failed, keeping any results already recorded
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<WorkflowEvent, WorkflowError> {
        let from = self.status;
        self.transition(WorkflowStatus::Failed)?;

        let reason = reason.into();
        self.error = Some(reason.clone());
        self.completed_at = Some(Utc::now());

        Ok(WorkflowEvent::Failed {
            workflow_id: self.id.clone(),
            from,
            reason,
        })
    }

    // ===== Getters =====

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn plan(&self) -> Option<&ExecutionPlan> {
        self.plan.as_ref()
    }

    pub fn results(&self) -> &[AgentResult] {
        &self.results
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn final_result(&self) -> Option<&AggregatedResult> {
        self.final_result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Wall-clock time from start to completion (or now, while running)
    pub fn execution_time_ms(&self) -> u64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentKind;
    use crate::domain::plan::{AgentTask, Complexity, ExecutionMode};

    fn plan(tasks: usize) -> ExecutionPlan {
        ExecutionPlan {
            analysis: "test".to_string(),
            complexity: Complexity::Simple,
            agents: (0..tasks)
                .map(|i| AgentTask {
                    agent: AgentKind::Backend,
                    task: format!("task {}", i),
                    dependencies: vec![],
                    priority: 1,
                })
                .collect(),
            execution: ExecutionMode::Sequential,
        }
    }

    fn result() -> AgentResult {
        AgentResult {
            agent: AgentKind::Backend,
            agent_name: "Backend Specialist".to_string(),
            task: "task".to_string(),
            output: "done".to_string(),
            execution_time_ms: 5,
            timestamp: Utc::now(),
        }
    }

    fn workflow() -> Workflow {
        Workflow::new("Build an API", Context::new()).unwrap().0
    }

    #[test]
    fn create_workflow_starts_planning() {
        let (workflow, event) = Workflow::new("Build an API", Context::new()).unwrap();

        assert!(workflow.id().starts_with("workflow-"));
        assert_eq!(workflow.status(), WorkflowStatus::Planning);
        assert!(workflow.plan().is_none());
        assert!(workflow.results().is_empty());
        assert!(matches!(event, WorkflowEvent::Started { .. }));
    }

    #[test]
    fn create_workflow_with_empty_request_fails() {
        assert_eq!(
            Workflow::new("   ", Context::new()).unwrap_err(),
            WorkflowError::EmptyRequest
        );
    }

    #[test]
    fn full_lifecycle() {
        let mut workflow = workflow();

        let event = workflow.begin_execution(plan(1)).unwrap();
        assert_eq!(event.entered_status(), Some(WorkflowStatus::Executing));

        workflow.record_result(result()).unwrap();
        workflow.begin_aggregation().unwrap();

        let aggregated = AggregatedResult::new("summary".to_string(), workflow.results().to_vec());
        let event = workflow.complete(aggregated).unwrap();

        assert!(matches!(event, WorkflowEvent::Completed { .. }));
        assert_eq!(workflow.status(), WorkflowStatus::Completed);
        assert!(workflow.completed_at().is_some());
        assert_eq!(workflow.final_result().unwrap().total_agents, 1);
    }

    #[test]
    fn results_cannot_exceed_plan() {
        let mut workflow = workflow();
        workflow.begin_execution(plan(1)).unwrap();
        workflow.record_result(result()).unwrap();

        assert_eq!(
            workflow.record_result(result()),
            Err(WorkflowError::TooManyResults { planned: 1 })
        );
        assert_eq!(workflow.results().len(), 1);
    }

    #[test]
    fn results_rejected_outside_execution() {
        let mut workflow = workflow();
        assert!(workflow.record_result(result()).is_err());
    }

    #[test]
    fn fail_keeps_partial_results() {
        let mut workflow = workflow();
        workflow.begin_execution(plan(2)).unwrap();
        workflow.record_result(result()).unwrap();

        let event = workflow.fail("agent exploded").unwrap();

        match event {
            WorkflowEvent::Failed { from, reason, .. } => {
                assert_eq!(from, WorkflowStatus::Executing);
                assert_eq!(reason, "agent exploded");
            }
            _ => panic!("Expected Failed event"),
        }
        assert_eq!(workflow.status(), WorkflowStatus::Failed);
        assert_eq!(workflow.error(), Some("agent exploded"));
        assert_eq!(workflow.results().len(), 1);
    }

    #[test]
    fn status_never_moves_backward() {
        let mut workflow = workflow();
        workflow.begin_execution(plan(1)).unwrap();

        assert!(workflow.begin_execution(plan(1)).is_err());

        workflow.fail("stop").unwrap();
        assert!(workflow.fail("again").is_err());
        assert!(workflow.begin_aggregation().is_err());
        assert_eq!(workflow.status(), WorkflowStatus::Failed);
    }
}
