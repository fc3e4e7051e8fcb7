/// Workflow management REST API endpoints
///
/// CRUD over the in-memory definition registry, structural validation, and
/// on-demand execution of a registered workflow.

use crate::{
    runtime::{
        context::ContextOverrides,
        engine::{ExecutionOptions, WorkflowEngine},
        execution::{ExecutionStatus, TriggerSource},
    },
    workflow::{graph::ValidationResult, registry::WorkflowRegistry, types::WorkflowDefinition},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Definition registry
    pub registry: Arc<WorkflowRegistry>,
    /// Execution engine and its run store
    pub engine: Arc<WorkflowEngine>,
}

/// Response for workflow creation/update operations
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub id: String,
    pub message: String,
    pub warnings: usize,
}

/// Request body for workflow creation and update
#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    pub workflow: WorkflowDefinition,
}

/// Request body for manual execution; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(default)]
    pub trigger_data: Value,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    /// Return 202 with the execution id instead of waiting for the run
    #[serde(default)]
    pub background: bool,
}

/// Create workflow management routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route("/api/workflows/validate", post(validate_workflow))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{id}/execute", post(execute_workflow))
}

/// Create a new workflow
///
/// POST /api/workflows
/// Body: { "workflow": { "id": "...", "name": "...", "nodes": [...], "connections": [...] } }
async fn create_workflow(
    State(state): State<AppState>,
    Json(payload): Json<WorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowResponse>), StatusCode> {
    let workflow = payload.workflow;

    if workflow.id.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let id = workflow.id.clone();
    let name = workflow.name.clone();
    let validation = state
        .registry
        .create(workflow)
        .map_err(|e| {
            tracing::warn!("❌ Rejected workflow {}: {}", id, e);
            StatusCode::UNPROCESSABLE_ENTITY
        })?
        .ok_or(StatusCode::CONFLICT)?;

    tracing::info!("🔥 Created workflow: {} ({})", id, name);

    Ok((
        StatusCode::CREATED,
        Json(WorkflowResponse {
            id,
            message: format!("Workflow '{}' created successfully", name),
            warnings: validation.warnings.len(),
        }),
    ))
}

/// List all workflows
///
/// GET /api/workflows
/// Returns: { "workflows": [{ "id", "name", "version", "enabled", "nodeCount", "updatedAt" }] }
async fn list_workflows(State(state): State<AppState>) -> Json<Value> {
    let workflows: Vec<Value> = state
        .registry
        .list()
        .iter()
        .map(|workflow| {
            json!({
                "id": workflow.id,
                "name": workflow.name,
                "version": workflow.version,
                "category": workflow.category,
                "enabled": workflow.enabled,
                "nodeCount": workflow.nodes.len(),
                "updatedAt": workflow.updated_at,
            })
        })
        .collect();

    Json(json!({ "workflows": workflows }))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>, StatusCode> {
    state
        .registry
        .get(&id)
        .map(|workflow| Json((*workflow).clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

/// Replace an existing workflow
///
/// PUT /api/workflows/{id}
/// The id in the path wins over the id in the body.
async fn update_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<WorkflowRequest>,
) -> Result<Json<WorkflowResponse>, StatusCode> {
    let mut workflow = payload.workflow;
    workflow.id = id.clone();

    if state.registry.get(&id).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let name = workflow.name.clone();
    let validation = state.registry.register(workflow).map_err(|e| {
        tracing::warn!("❌ Rejected update of workflow {}: {}", id, e);
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    tracing::info!("🔥 Updated workflow: {} ({})", id, name);

    Ok(Json(WorkflowResponse {
        id,
        message: format!("Workflow '{}' updated successfully", name),
        warnings: validation.warnings.len(),
    }))
}

/// DELETE /api/workflows/{id}
async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    match state.registry.remove(&id) {
        Some(_) => Ok(Json(json!({ "message": "Workflow deleted successfully" }))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// Validate a definition without registering it
///
/// POST /api/workflows/validate
/// Body: a bare workflow definition
async fn validate_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<WorkflowDefinition>,
) -> Json<ValidationResult> {
    Json(state.engine.validate_workflow(&workflow))
}

/// Execute a registered workflow
///
/// POST /api/workflows/{id}/execute
/// Body (optional): { "triggerData": {...}, "variables": {...}, "userId": "...", "background": false }
/// Returns the run record, or 202 with the execution id when `background` is set.
async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let request: ExecuteRequest = if body.trim().is_empty() {
        ExecuteRequest::default()
    } else {
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("❌ Invalid execute request for {}: {}", id, e);
            StatusCode::BAD_REQUEST
        })?
    };

    let workflow = state.registry.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let options = ExecutionOptions {
        overrides: ContextOverrides {
            variables: request.variables,
            user_id: request.user_id,
            environment: request.environment,
        },
        trigger_source: TriggerSource::Api,
    };

    if request.background {
        let (execution_id, _) = state
            .engine
            .spawn_workflow((*workflow).clone(), request.trigger_data, options)
            .await;
        return Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "executionId": execution_id })),
        ));
    }

    let execution = state
        .engine
        .execute_workflow(&workflow, request.trigger_data, options)
        .await;
    let status = match execution.status {
        ExecutionStatus::Failed => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    let body = serde_json::to_value(&execution).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((status, Json(body)))
}
