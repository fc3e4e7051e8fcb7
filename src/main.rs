/// Taskway: workflow automation engine for task management
///
/// Main entry point for the Taskway server. Loads configuration from the
/// environment and starts the HTTP server.

use taskway::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Workflow management API at /api/workflows/*
/// - Execution records at /api/executions/*
/// - Webhook triggers at /webhook/{workflow_id}
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:3004, overridable via TASKWAY_* env vars)
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
