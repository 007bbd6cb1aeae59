use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::domain::agent::AgentKind;
use crate::domain::plan::{ExecutionPlan, PlanError};
use crate::domain::workflow::{AgentResult, WorkflowError};
use crate::infrastructure::resilience::ResilienceError;

/// Errors that can occur while orchestrating a workflow
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Request cannot be empty")]
    EmptyRequest,

    #[error("Planner call failed: {0}")]
    Planning(#[source] ResilienceError),

    #[error("{0}")]
    PlanParse(#[from] PlanError),

    #[error("Circular dependency detected in agent plan (blocked: {})", format_agents(.blocked))]
    CycleDependency { blocked: Vec<AgentKind> },

    #[error("Agent {agent} failed: {source}")]
    AgentInvocation {
        agent: AgentKind,
        #[source]
        source: ResilienceError,
    },

    #[error("Aggregation failed: {0}")]
    Aggregation(#[source] ResilienceError),

    #[error("Workflow timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    InvalidStateTransition(WorkflowError),

    #[error("Workflow repository error: {0}")]
    Repository(String),
}

impl OrchestrationError {
    /// Short machine-readable label for API responses
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestrationError::EmptyRequest => "empty_request",
            OrchestrationError::Planning(_) => "planning",
            OrchestrationError::PlanParse(_) => "plan_parse",
            OrchestrationError::CycleDependency { .. } => "cycle_dependency",
            OrchestrationError::AgentInvocation { .. } => "agent_invocation",
            OrchestrationError::Aggregation(_) => "aggregation",
            OrchestrationError::Timeout(_) => "timeout",
            OrchestrationError::InvalidStateTransition(_) => "invalid_state_transition",
            OrchestrationError::Repository(_) => "repository",
        }
    }
}

impl From<WorkflowError> for OrchestrationError {
    fn from(error: WorkflowError) -> Self {
        match error {
            WorkflowError::EmptyRequest => OrchestrationError::EmptyRequest,
            other => OrchestrationError::InvalidStateTransition(other),
        }
    }
}

fn format_agents(agents: &[AgentKind]) -> String {
    agents
        .iter()
        .map(AgentKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

/// A failed workflow run together with everything it produced before failing
#[derive(Debug, Error)]
#[error("{error}")]
pub struct WorkflowFailure {
    /// Absent when the request was rejected before a workflow was created
    pub workflow_id: Option<String>,
    #[source]
    pub error: OrchestrationError,
    pub plan: Option<ExecutionPlan>,
    pub partial_results: Vec<AgentResult>,
}

impl WorkflowFailure {
    pub fn rejected(error: OrchestrationError) -> Self {
        Self {
            workflow_id: None,
            error,
            plan: None,
            partial_results: Vec::new(),
        }
    }

    pub fn report(&self) -> FailureReport<'_> {
        FailureReport {
            error: self.error.to_string(),
            kind: self.error.kind(),
            workflow_id: self.workflow_id.as_deref(),
            plan: self.plan.as_ref(),
            partial_results: &self.partial_results,
        }
    }
}

/// Serializable view of a [`WorkflowFailure`]
#[derive(Debug, Serialize)]
pub struct FailureReport<'a> {
    pub error: String,
    pub kind: &'static str,
    pub workflow_id: Option<&'a str>,
    pub plan: Option<&'a ExecutionPlan>,
    pub partial_results: &'a [AgentResult],
}
