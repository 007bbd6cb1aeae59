use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::agent::{self, AgentDefinition, AgentKind};

/// Request body for agent suggestion
#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub agents: Vec<AgentKind>,
}

/// List the agent catalog
///
/// GET /api/agents
pub async fn list_agents() -> Json<&'static [AgentDefinition]> {
    Json(agent::all())
}

/// Suggest agents for a request by keyword
///
/// POST /api/agents/suggest
pub async fn suggest_agents(
    State(state): State<AppState>,
    Json(req): Json<SuggestRequest>,
) -> Result<Json<SuggestResponse>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("Text cannot be empty"));
    }

    Ok(Json(SuggestResponse {
        agents: state.orchestrator.suggest_agents(&req.text),
    }))
}
