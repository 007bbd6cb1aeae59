use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::agents::{OrchestrationError, WorkflowFailure};

/// API error type with HTTP status code and message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Extra fields merged into the JSON body
    pub details: Option<Value>,
}

impl ApiError {
    /// Creates a new API error
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Creates a 500 Internal Server Error
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Creates a 502 Bad Gateway error (model providers failed us)
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

fn status_for(error: &OrchestrationError) -> StatusCode {
    match error {
        OrchestrationError::EmptyRequest => StatusCode::BAD_REQUEST,
        OrchestrationError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        OrchestrationError::Repository(_) | OrchestrationError::InvalidStateTransition(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        OrchestrationError::Planning(_)
        | OrchestrationError::PlanParse(_)
        | OrchestrationError::CycleDependency { .. }
        | OrchestrationError::AgentInvocation { .. }
        | OrchestrationError::Aggregation(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message
        });

        if let (Some(Value::Object(details)), Some(object)) = (self.details, body.as_object_mut()) {
            for (key, value) in details {
                object.entry(key).or_insert(value);
            }
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(error: OrchestrationError) -> Self {
        Self::new(status_for(&error), error.to_string())
            .with_details(json!({ "kind": error.kind() }))
    }
}

impl From<WorkflowFailure> for ApiError {
    fn from(failure: WorkflowFailure) -> Self {
        let details = serde_json::to_value(failure.report()).unwrap_or(Value::Null);
        Self::new(status_for(&failure.error), failure.error.to_string()).with_details(details)
    }
}

impl From<String> for ApiError {
    fn from(message: String) -> Self {
        Self::internal_server_error(message)
    }
}
