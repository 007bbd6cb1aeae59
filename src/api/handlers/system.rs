use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::AppState;
use crate::infrastructure::llm::ProviderInfo;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub primary: Option<String>,
    pub fallbacks: Vec<String>,
    pub providers: Vec<ProviderInfo>,
}

/// Health check endpoint
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// Describe configured model providers (never their credentials)
///
/// GET /api/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let registry = state.orchestrator.registry();

    Json(ProvidersResponse {
        primary: registry.primary().map(str::to_string),
        fallbacks: registry.fallbacks().to_vec(),
        providers: registry.info(),
    })
}
