/// Service request REST API endpoints
///
/// Intake, listing and the stage-by-stage session operations. The caller's
/// role comes from the `x-service-role` header; the engine re-reads the
/// stored record on every call, so no session outlives a request.

use super::{ApiError, ApiResult, AppState};
use crate::{
    request::{gateway::RequestFilter, types::ServiceRequest, types::StageRecord},
    runtime::{ViewMode, WorkflowSession},
    workflow::types::{Role, ServiceKind},
};
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Header carrying the caller's role
pub const ROLE_HEADER: &str = "x-service-role";

/// Request body for intake
#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub service_kind: ServiceKind,
    pub client_company: Option<String>,
    #[serde(default)]
    pub details: Value,
}

/// Request body for opening a session
#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    /// Defaults to a read-only view
    pub mode: Option<ViewMode>,
}

/// Request body for completing a stage
#[derive(Debug, Deserialize)]
pub struct CompleteStageRequest {
    pub payload: Value,
}

/// What a caller sees after opening or advancing a request
#[derive(Debug, Serialize)]
pub struct SessionView<'a> {
    pub request: &'a ServiceRequest,
    pub actor: &'a Role,
    pub mode: ViewMode,
    pub current_stage_name: Option<&'a str>,
    pub stage_payloads: BTreeMap<u32, &'a Value>,
}

impl<'a> SessionView<'a> {
    fn of(session: &'a WorkflowSession) -> Self {
        Self {
            request: session.request(),
            actor: session.actor(),
            mode: session.mode(),
            current_stage_name: session.current_stage_name(),
            stage_payloads: session.accumulated_payloads(),
        }
    }
}

/// Create service request routes
pub fn create_request_routes() -> Router<AppState> {
    Router::new()
        .route("/api/requests", post(create_request))
        .route("/api/requests", get(list_requests))
        .route("/api/requests/{id}", get(get_request))
        .route("/api/requests/{id}/open", post(open_session))
        .route("/api/requests/{id}/stages/{stage}/complete", post(complete_stage))
        .route("/api/requests/{id}/stages/{stage}", get(view_stage))
}

fn actor_from(headers: &HeaderMap) -> ApiResult<Role> {
    headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(Role::new)
        .ok_or_else(|| ApiError::BadRequest(format!("missing {} header", ROLE_HEADER)))
}

/// Create a pending service request
///
/// POST /api/requests
/// Body: { "service_kind": "...", "client_company": "...", "details": {...} }
async fn create_request(
    State(state): State<AppState>,
    Json(body): Json<CreateServiceRequest>,
) -> ApiResult<Json<ServiceRequest>> {
    let request = state
        .engine
        .intake(body.service_kind, body.client_company, body.details)
        .await?;
    Ok(Json(request))
}

/// List service requests
///
/// GET /api/requests?service_kind=...&status=...
async fn list_requests(
    State(state): State<AppState>,
    Query(filter): Query<RequestFilter>,
) -> ApiResult<Json<Value>> {
    let requests = state.engine.list(&filter).await?;
    Ok(Json(json!({ "requests": requests })))
}

/// Get a service request by ID
///
/// GET /api/requests/{id}
async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ServiceRequest>> {
    Ok(Json(state.engine.get(&id).await?))
}

/// Open a session on a request
///
/// POST /api/requests/{id}/open
/// Body: { "mode": "active" | "read_only" }
async fn open_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<OpenSessionRequest>,
) -> ApiResult<Json<Value>> {
    let actor = actor_from(&headers)?;
    let session = state
        .engine
        .open(&id, actor, body.mode.unwrap_or(ViewMode::ReadOnly))
        .await?;
    Ok(Json(json!(SessionView::of(&session))))
}

/// Complete the current stage
///
/// POST /api/requests/{id}/stages/{stage}/complete
/// Body: { "payload": {...} }
async fn complete_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(String, u32)>,
    headers: HeaderMap,
    Json(body): Json<CompleteStageRequest>,
) -> ApiResult<Json<Value>> {
    let actor = actor_from(&headers)?;
    let session = state
        .engine
        .submit_stage(&id, actor, stage, body.payload)
        .await?;
    Ok(Json(json!(SessionView::of(&session))))
}

/// View the persisted record of a reached stage
///
/// GET /api/requests/{id}/stages/{stage}
async fn view_stage(
    State(state): State<AppState>,
    Path((id, stage)): Path<(String, u32)>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let actor = actor_from(&headers)?;
    let session = state.engine.open(&id, actor, ViewMode::ReadOnly).await?;
    let record: Option<&StageRecord> = session.stage_record(stage)?;

    Ok(Json(json!({
        "request_id": id,
        "stage": stage,
        "name": session.definition().stage_name(stage),
        "record": record,
    })))
}
