// Repository implementations (data access layer)
// Adapters that implement domain repository interfaces

pub mod in_memory_workflow_repository;

pub use in_memory_workflow_repository::InMemoryWorkflowRepository;
