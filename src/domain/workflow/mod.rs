// Workflow domain module
// Contains the workflow aggregate root, its value objects, and lifecycle events

#![allow(clippy::module_inception)]

pub mod events;
pub mod value_objects;
pub mod workflow;

pub use events::WorkflowEvent;
pub use value_objects::{AgentResult, AggregatedResult, WorkflowStatus};
pub use workflow::{Context, Workflow, WorkflowError};
