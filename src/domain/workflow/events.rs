use serde::Serialize;

use super::value_objects::WorkflowStatus;
use crate::domain::agent::AgentKind;
use crate::domain::plan::{Complexity, ExecutionMode};

/// Observable moments in a workflow's lifecycle
///
/// Transition events are returned by the [`Workflow`](super::Workflow)
/// aggregate; scheduling events (`WaveStarted`, `TaskStarted`,
/// `TaskCompleted`) are raised by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Fired when a workflow is accepted
    Started { workflow_id: String, request: String },
    /// Fired when a validated plan moves the workflow to executing
    PlanCreated {
        workflow_id: String,
        agents: Vec<AgentKind>,
        complexity: Complexity,
        execution: ExecutionMode,
    },
    /// Fired when a parallel wave is dispatched
    WaveStarted {
        workflow_id: String,
        wave: usize,
        agents: Vec<AgentKind>,
    },
    TaskStarted { workflow_id: String, agent: AgentKind },
    TaskCompleted {
        workflow_id: String,
        agent: AgentKind,
        execution_time_ms: u64,
    },
    AggregationStarted { workflow_id: String, results: usize },
    Completed {
        workflow_id: String,
        execution_time_ms: u64,
    },
    Failed {
        workflow_id: String,
        /// Status the workflow was in when it failed
        from: WorkflowStatus,
        reason: String,
    },
}

impl WorkflowEvent {
    /// Returns the workflow_id for this event
    pub fn workflow_id(&self) -> &str {
        match self {
            WorkflowEvent::Started { workflow_id, .. }
            | WorkflowEvent::PlanCreated { workflow_id, .. }
            | WorkflowEvent::WaveStarted { workflow_id, .. }
            | WorkflowEvent::TaskStarted { workflow_id, .. }
            | WorkflowEvent::TaskCompleted { workflow_id, .. }
            | WorkflowEvent::AggregationStarted { workflow_id, .. }
            | WorkflowEvent::Completed { workflow_id, .. }
            | WorkflowEvent::Failed { workflow_id, .. } => workflow_id,
        }
    }

    /// Status entered by this event, if it is a transition event
    pub fn entered_status(&self) -> Option<WorkflowStatus> {
        match self {
            WorkflowEvent::Started { .. } => Some(WorkflowStatus::Planning),
            WorkflowEvent::PlanCreated { .. } => Some(WorkflowStatus::Executing),
            WorkflowEvent::AggregationStarted { .. } => Some(WorkflowStatus::Aggregating),
            WorkflowEvent::Completed { .. } => Some(WorkflowStatus::Completed),
            WorkflowEvent::Failed { .. } => Some(WorkflowStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_id_accessor() {
        let event = WorkflowEvent::TaskStarted {
            workflow_id: "workflow-1".to_string(),
            agent: AgentKind::Backend,
        };
        assert_eq!(event.workflow_id(), "workflow-1");
        assert_eq!(event.entered_status(), None);
    }

    #[test]
    fn transition_events_report_status() {
        let event = WorkflowEvent::Failed {
            workflow_id: "workflow-1".to_string(),
            from: WorkflowStatus::Executing,
            reason: "boom".to_string(),
        };
        assert_eq!(event.entered_status(), Some(WorkflowStatus::Failed));
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = WorkflowEvent::WaveStarted {
            workflow_id: "workflow-1".to_string(),
            wave: 2,
            agents: vec![AgentKind::Qa],
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "wave_started");
        assert_eq!(value["agents"][0], "qa");
    }
}
