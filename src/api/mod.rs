/// HTTP API Layer
///
/// This module provides the REST API endpoints around the engine. It handles:
/// - Workflow CRUD, validation and manual execution
/// - Execution record lookup and cancellation
/// - Webhook triggers

// Workflow management endpoints (POST/GET/PUT/DELETE, validate, execute)
pub mod workflows;

// Execution record endpoints (list, get, cancel)
pub mod executions;

// Webhook trigger endpoint
pub mod webhooks;

// Re-export router builders and shared state
pub use executions::create_execution_routes;
pub use webhooks::create_webhook_routes;
pub use workflows::{create_workflow_routes, AppState};
