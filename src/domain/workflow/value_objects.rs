use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentKind;

/// Lifecycle status of a workflow
///
/// # Status Transitions
/// ```text
/// Planning -> Executing -> Aggregating -> Completed
///     |           |             |
///     +-----------+-------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Orchestrator is producing the execution plan
    Planning,
    /// Agent tasks are running
    Executing,
    /// Agent outputs are being synthesized
    Aggregating,
    /// Final result is available
    Completed,
    /// Workflow aborted on an unrecoverable error
    Failed,
}

impl WorkflowStatus {
    /// Checks if a transition from current status to next status is valid
    ///
    /// # Example
    /// ```
    /// use devcrew_api::domain::workflow::WorkflowStatus;
    ///
    /// assert!(WorkflowStatus::Planning.can_transition_to(WorkflowStatus::Executing));
    /// assert!(!WorkflowStatus::Executing.can_transition_to(WorkflowStatus::Planning));
    /// ```
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        matches!(
            (self, next),
            (Planning, Executing)
                | (Executing, Aggregating)
                | (Aggregating, Completed)
                | (Planning, Failed)
                | (Executing, Failed)
                | (Aggregating, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Failed)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Planning => write!(f, "planning"),
            WorkflowStatus::Executing => write!(f, "executing"),
            WorkflowStatus::Aggregating => write!(f, "aggregating"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Output of one completed agent task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent: AgentKind,
    pub agent_name: String,
    pub task: String,
    pub output: String,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Synthesized result of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub summary: String,
    pub agent_outputs: Vec<AgentResult>,
    pub total_agents: usize,
    /// Sum of per-agent execution times, not wall-clock time
    pub total_time_ms: u64,
}

impl AggregatedResult {
    pub fn new(summary: String, agent_outputs: Vec<AgentResult>) -> Self {
        let total_time_ms = agent_outputs.iter().map(|r| r.execution_time_ms).sum();
        Self {
            summary,
            total_agents: agent_outputs.len(),
            agent_outputs,
            total_time_ms,
        }
    }
}
