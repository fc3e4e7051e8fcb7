/// Server setup and initialization
///
/// Wires together all components: collaborators, execution engine, definition
/// registry, and HTTP routes.

use crate::{
    api::{create_execution_routes, create_webhook_routes, create_workflow_routes, AppState},
    config::Config,
    runtime::engine::WorkflowEngine,
    workflow::registry::WorkflowRegistry,
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application with all routes
///
/// Builds the engine with in-process collaborators and an empty registry.
pub fn create_app(config: Config) -> Result<Router> {
    tracing::info!("⚙️ Initializing execution engine (environment: {})", config.engine.environment);
    let engine = WorkflowEngine::with_defaults(config.engine.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize execution engine: {}", e))?;

    tracing::info!(
        "🧩 Registered executors for: {}",
        engine
            .registry()
            .registered_types()
            .iter()
            .map(|node_type| node_type.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let state = AppState {
        registry: Arc::new(WorkflowRegistry::new()),
        engine: Arc::new(engine),
    };

    tracing::info!("✅ Application initialized successfully");
    Ok(create_router(state))
}

/// HTTP router over existing state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Workflow management API routes
        .merge(create_workflow_routes())
        // Execution record routes
        .merge(create_execution_routes())
        // Webhook trigger routes
        .merge(create_webhook_routes())
        .with_state(state)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Taskway server...");

    let app = create_app(config.clone())?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
