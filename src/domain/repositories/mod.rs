// Repository interfaces (ports)
// Implemented by adapters in the infrastructure layer

pub mod workflow_repository;

pub use workflow_repository::WorkflowRepository;
