// Workflow event delivery
//
// The engine reports every lifecycle event through an `EventSink`. The
// default sink turns them into structured log lines; the memory sink keeps
// them for inspection.

use std::sync::Mutex;
use tracing::{info, warn};

use crate::domain::workflow::WorkflowEvent;

/// Receives workflow events as they happen
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &WorkflowEvent);
}

/// Logs each event with `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Started {
                workflow_id,
                request,
            } => info!(%workflow_id, request = %request, "workflow started"),
            WorkflowEvent::PlanCreated {
                workflow_id,
                agents,
                complexity,
                execution,
            } => info!(
                %workflow_id,
                agents = ?agents,
                complexity = ?complexity,
                execution = ?execution,
                "execution plan created"
            ),
            WorkflowEvent::WaveStarted {
                workflow_id,
                wave,
                agents,
            } => info!(%workflow_id, wave, agents = ?agents, "wave started"),
            WorkflowEvent::TaskStarted { workflow_id, agent } => {
                info!(%workflow_id, %agent, "agent task started")
            }
            WorkflowEvent::TaskCompleted {
                workflow_id,
                agent,
                execution_time_ms,
            } => info!(%workflow_id, %agent, execution_time_ms, "agent task completed"),
            WorkflowEvent::AggregationStarted {
                workflow_id,
                results,
            } => info!(%workflow_id, results, "aggregating results"),
            WorkflowEvent::Completed {
                workflow_id,
                execution_time_ms,
            } => info!(%workflow_id, execution_time_ms, "workflow completed"),
            WorkflowEvent::Failed {
                workflow_id,
                from,
                reason,
            } => warn!(%workflow_id, %from, reason = %reason, "workflow failed"),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events belonging to one workflow, in emission order
    pub fn for_workflow(&self, workflow_id: &str) -> Vec<WorkflowEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.workflow_id() == workflow_id)
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &WorkflowEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
