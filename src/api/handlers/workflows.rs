use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agents::WorkflowOutcome;
use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::plan::ExecutionPlan;
use crate::domain::workflow::{AgentResult, AggregatedResult, Context, Workflow};

/// Request body for planning or running a workflow
#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub request: String,
    #[serde(default)]
    pub context: Context,
}

/// Snapshot of a workflow for status polling
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub id: String,
    pub request: String,
    pub status: String,
    pub plan: Option<ExecutionPlan>,
    pub results: Vec<AgentResult>,
    pub final_result: Option<AggregatedResult>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: u64,
}

impl From<&Workflow> for WorkflowResponse {
    fn from(workflow: &Workflow) -> Self {
        Self {
            id: workflow.id().to_string(),
            request: workflow.request().to_string(),
            status: workflow.status().to_string(),
            plan: workflow.plan().cloned(),
            results: workflow.results().to_vec(),
            final_result: workflow.final_result().cloned(),
            error: workflow.error().map(str::to_string),
            started_at: workflow.started_at(),
            completed_at: workflow.completed_at(),
            execution_time_ms: workflow.execution_time_ms(),
        }
    }
}

/// Create an execution plan without running it
///
/// POST /api/workflows/plan
pub async fn create_plan(
    State(state): State<AppState>,
    Json(req): Json<WorkflowRequest>,
) -> Result<Json<ExecutionPlan>, ApiError> {
    let plan = state
        .orchestrator
        .create_execution_plan(&req.request, &req.context)
        .await?;

    Ok(Json(plan))
}

/// Run a workflow to completion
///
/// POST /api/workflows
pub async fn run_workflow(
    State(state): State<AppState>,
    Json(req): Json<WorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowOutcome>), ApiError> {
    let outcome = state
        .orchestrator
        .run_workflow(&req.request, req.context)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Get a workflow by ID
///
/// GET /api/workflows/:id
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let workflow = state
        .orchestrator
        .get_workflow_status(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Workflow {} not found", id)))?;

    Ok(Json(WorkflowResponse::from(&workflow)))
}

/// List retained workflows, oldest first
///
/// GET /api/workflows
pub async fn list_workflows(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowResponse>>, ApiError> {
    let workflows = state.orchestrator.list_active_workflows().await?;

    Ok(Json(workflows.iter().map(WorkflowResponse::from).collect()))
}
