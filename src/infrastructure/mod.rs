// Infrastructure layer module
// Contains model provider adapters, the resilience layer and the workflow store
// Follows Hexagonal Architecture

pub mod llm;
pub mod repositories;
pub mod resilience;
