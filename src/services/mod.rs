/// External collaborators consumed by node executors
///
/// Each collaborator is an async trait so the engine can run against real
/// integrations or in-process stand-ins:
/// - Task management (task_create / task_update nodes)
/// - Notifications (notification nodes)
/// - Outbound HTTP (webhook nodes)
/// - Script sandbox (script nodes)
/// - Automation rules (action nodes)

// Task store contract and in-memory implementation
pub mod tasks;

// Notification delivery contract and recording implementation
pub mod notify;

// Outbound HTTP contract and reqwest implementation
pub mod http;

// Script sandbox contract and embedded Lua implementation
pub mod script;

use crate::config::EngineConfig;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use notify::{DeliveryReceipt, InMemoryNotifier, Notification, Notifier};
pub use script::{LuaSandbox, ScriptOutcome, ScriptRequest, ScriptSandbox};
pub use tasks::{InMemoryTaskService, TaskRecord, TaskService};

/// Automation-rule dispatch used by action nodes
#[async_trait]
pub trait AutomationRules: Send + Sync {
    /// Dispatch an action by type with its parameter bag
    async fn dispatch(&self, action_type: &str, parameters: &Value) -> Result<Value>;
}

/// Rules collaborator that only records the dispatch in the log
#[derive(Debug, Default)]
pub struct LoggingRules;

#[async_trait]
impl AutomationRules for LoggingRules {
    async fn dispatch(&self, action_type: &str, parameters: &Value) -> Result<Value> {
        tracing::info!("⚡ Automation action dispatched: {} {}", action_type, parameters);
        Ok(Value::Null)
    }
}

/// The full set of collaborators handed to the built-in executors
#[derive(Clone)]
pub struct Services {
    pub tasks: Arc<dyn TaskService>,
    pub notifier: Arc<dyn Notifier>,
    pub http: Arc<dyn HttpClient>,
    pub scripts: Arc<dyn ScriptSandbox>,
    pub rules: Arc<dyn AutomationRules>,
}

impl Services {
    /// In-process collaborators: in-memory tasks and notifications, a reqwest
    /// HTTP client and the embedded Lua sandbox
    pub fn in_process(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            tasks: Arc::new(InMemoryTaskService::new()),
            notifier: Arc::new(InMemoryNotifier::new()),
            http: Arc::new(ReqwestHttpClient::new(config.http_timeout_ms)?),
            scripts: Arc::new(LuaSandbox::new()),
            rules: Arc::new(LoggingRules),
        })
    }

    pub fn with_tasks(mut self, tasks: Arc<dyn TaskService>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn with_scripts(mut self, scripts: Arc<dyn ScriptSandbox>) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn with_rules(mut self, rules: Arc<dyn AutomationRules>) -> Self {
        self.rules = rules;
        self
    }
}
