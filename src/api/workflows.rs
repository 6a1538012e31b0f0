/// Workflow definition REST API endpoints
///
/// Definitions are registered at startup and never change afterwards, so
/// these endpoints are read-only views of the registry.

use super::{ApiResult, AppState};
use crate::workflow::{
    resolver::assignee,
    types::{Role, ServiceKind, WorkflowDefinition},
};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Summary row for the definition listing
#[derive(Debug, Serialize)]
pub struct WorkflowSummary {
    pub service_kind: ServiceKind,
    pub title: String,
    pub total_stages: u32,
    pub stage_names: Vec<String>,
}

/// One stage of a definition with its resolved assignee
#[derive(Debug, Serialize)]
pub struct StageView {
    pub stage: u32,
    pub name: Option<String>,
    pub assignee: Role,
    pub required_fields: Vec<String>,
}

/// Create workflow definition routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{kind}", get(get_workflow))
}

/// List all registered workflows
///
/// GET /api/workflows
/// Returns: { "workflows": [{ "service_kind": "...", "title": "...", "total_stages": 2, ... }] }
async fn list_workflows(State(state): State<AppState>) -> Json<Value> {
    let workflows: Vec<WorkflowSummary> = state
        .engine
        .registry()
        .list()
        .into_iter()
        .map(|(service_kind, definition)| WorkflowSummary {
            service_kind,
            title: definition.title.clone(),
            total_stages: definition.total_stages,
            stage_names: definition.stage_names.clone(),
        })
        .collect();

    Json(json!({ "workflows": workflows }))
}

/// Get one workflow with its stage-by-stage assignees
///
/// GET /api/workflows/{kind}
async fn get_workflow(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Value>> {
    let kind = ServiceKind::new(kind);
    let definition = state.engine.registry().lookup(&kind)?;
    let stages = stage_views(&definition)?;

    Ok(Json(json!({
        "service_kind": kind,
        "definition": definition.as_ref(),
        "stages": stages,
    })))
}

fn stage_views(definition: &WorkflowDefinition) -> ApiResult<Vec<StageView>> {
    (1..=definition.total_stages)
        .map(|stage| {
            Ok(StageView {
                stage,
                name: definition.stage_name(stage).map(str::to_string),
                assignee: assignee(definition, stage)?,
                required_fields: definition.required_fields_of(stage).to_vec(),
            })
        })
        .collect()
}
