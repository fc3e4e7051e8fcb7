/// Execution record endpoints
///
/// Read access to run records and cancellation of in-flight runs.

use crate::api::workflows::AppState;
use crate::runtime::execution::WorkflowExecution;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionQuery {
    pub workflow_id: Option<String>,
}

pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/executions", get(list_executions))
        .route("/api/executions/{id}", get(get_execution))
        .route("/api/executions/{id}/cancel", post(cancel_execution))
}

/// GET /api/executions?workflowId=...
async fn list_executions(
    State(state): State<AppState>,
    Query(query): Query<ExecutionQuery>,
) -> Json<Value> {
    let executions = match &query.workflow_id {
        Some(workflow_id) => state.engine.store().list_for_workflow(workflow_id).await,
        None => state.engine.get_all_executions().await,
    };
    Json(json!({ "executions": executions }))
}

/// GET /api/executions/{id}
async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowExecution>, StatusCode> {
    state
        .engine
        .get_execution(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Cancel an in-flight run
///
/// POST /api/executions/{id}/cancel
/// 404 for unknown runs, 409 for runs that already finished.
async fn cancel_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if state.engine.cancel_execution(&id).await {
        let execution = state.engine.get_execution(&id).await;
        return Ok(Json(json!({ "cancelled": true, "execution": execution })));
    }

    match state.engine.get_execution(&id).await {
        Some(_) => Err(StatusCode::CONFLICT),
        None => Err(StatusCode::NOT_FOUND),
    }
}
