/// Configuration management for the Taskway engine
///
/// Handles server binding and the runtime parameters the execution engine
/// hands to its built-in node executors.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Execution engine configuration
    pub engine: EngineConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Environment tag seeded into every execution context
    /// (e.g., "production", "staging"). Callers may override it per run.
    pub environment: String,
    /// Hard ceiling for webhook calls in milliseconds.
    /// Webhook nodes may ask for less, never more.
    pub http_timeout_ms: u64,
    /// Default timeout for script nodes in milliseconds
    pub script_timeout_ms: u64,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("TASKWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("TASKWAY_PORT", 3004),
            },
            engine: EngineConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            environment: std::env::var("TASKWAY_ENVIRONMENT")
                .unwrap_or_else(|_| "production".to_string()),
            http_timeout_ms: env_or("TASKWAY_HTTP_TIMEOUT_MS", 30_000),
            script_timeout_ms: env_or("TASKWAY_SCRIPT_TIMEOUT_MS", 5_000),
        }
    }
}

/// Read a numeric env var, falling back when missing or unparsable
fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(fallback)
}
