/// HTTP API layer for servflow
///
/// REST endpoints for browsing workflow definitions and driving service
/// requests through their stages.

use crate::error::EngineError;
use crate::runtime::WorkflowEngine;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

// Workflow definition endpoints (read-only)
pub mod workflows;

// Service request intake and stage endpoints
pub mod requests;

pub use requests::create_request_routes;
pub use workflows::create_workflow_routes;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: WorkflowEngine,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// Handler error: an engine refusal or a malformed HTTP request
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

/// HTTP status for an engine error
pub fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::UnknownServiceKind(_)
        | EngineError::RequestNotFound(_)
        | EngineError::UnknownStage { .. } => StatusCode::NOT_FOUND,
        EngineError::NotAssigned { .. } | EngineError::ReadOnlySession => StatusCode::FORBIDDEN,
        EngineError::IncompleteStagePayload { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::PersistenceFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::AlreadyCompleted(_)
        | EngineError::ConcurrencyConflict { .. }
        | EngineError::StageNotReached { .. }
        | EngineError::NotFinalStage { .. }
        | EngineError::StageMismatch { .. }
        | EngineError::StageAlreadyRecorded(_)
        | EngineError::RequestAlreadyExists(_)
        | EngineError::WriteRejected(_) => StatusCode::CONFLICT,
        EngineError::InvalidDefinition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::error!("❌ {}", err);
                }
                (
                    status,
                    ErrorResponse {
                        error: err.to_string(),
                        kind: err.kind().to_string(),
                    },
                )
            }
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    kind: "bad_request".to_string(),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
