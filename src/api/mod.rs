// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::agents::Orchestrator;
use handlers::{agents, system, workflows};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Builds the application routes (without transport middleware)
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(system::health_check))
        // Agent catalog
        .route("/api/agents", get(agents::list_agents))
        .route("/api/agents/suggest", post(agents::suggest_agents))
        // Workflows
        .route("/api/workflows/plan", post(workflows::create_plan))
        .route(
            "/api/workflows",
            post(workflows::run_workflow).get(workflows::list_workflows),
        )
        .route("/api/workflows/:id", get(workflows::get_workflow))
        // Providers
        .route("/api/providers", get(system::list_providers))
        .with_state(state)
}
