// Orchestration engine modules
//
// This module turns a free-text request into a plan of specialist agent
// tasks, runs the plan and synthesizes the outputs.

pub mod aggregator;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod planner;
pub mod prompts;
pub mod scheduler;
pub mod worker;

// Re-export main types
pub use errors::{OrchestrationError, OrchestrationResult, WorkflowFailure};
pub use events::{EventSink, MemoryEventSink, TracingEventSink};
pub use orchestrator::{Orchestrator, WorkflowOutcome};
