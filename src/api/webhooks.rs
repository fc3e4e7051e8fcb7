/// Webhook trigger endpoint
///
/// Any HTTP method on /webhook/{workflow_id} runs the workflow with the request
/// body as trigger data. Only enabled workflows accept webhook triggers.

use crate::api::workflows::AppState;
use crate::runtime::engine::ExecutionOptions;
use crate::runtime::execution::{ExecutionStatus, TriggerSource};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{any, Router},
};
use serde_json::Value;

pub fn create_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook/{workflow_id}", any(execute_webhook))
}

/// Execute a workflow via webhook trigger
///
/// Body: JSON payload that seeds the run's variables (empty body means no data).
/// Returns the run record; failed runs answer 422.
async fn execute_webhook(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    body: String,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    tracing::info!("📥 Webhook request received: {}", workflow_id);
    tracing::debug!("📄 Request body: {}", body);

    // Parse JSON body manually to handle errors gracefully
    let payload: Value = if body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!("❌ Invalid JSON payload for webhook {}: {}", workflow_id, e);
            StatusCode::BAD_REQUEST
        })?
    };

    let workflow = match state.registry.get(&workflow_id) {
        Some(workflow) => workflow,
        None => {
            tracing::warn!("❌ Webhook called for unknown workflow: {}", workflow_id);
            return Err(StatusCode::NOT_FOUND);
        }
    };
    if !workflow.enabled {
        tracing::warn!("🚫 Webhook called for disabled workflow: {}", workflow_id);
        return Err(StatusCode::FORBIDDEN);
    }

    let execution = state
        .engine
        .execute_workflow(&workflow, payload, ExecutionOptions::from_source(TriggerSource::Webhook))
        .await;

    let status = match execution.status {
        ExecutionStatus::Failed => {
            tracing::error!(
                "❌ Webhook run {} for {} failed: {}",
                execution.id,
                workflow_id,
                execution.error.as_deref().unwrap_or("unknown error")
            );
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::OK,
    };
    let body = serde_json::to_value(&execution).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((status, Json(body)))
}
