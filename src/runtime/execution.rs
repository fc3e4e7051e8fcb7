/// Run records produced by the execution engine
///
/// A `WorkflowExecution` is created fresh per invocation and carries everything
/// observable about the run: status, timings, the context snapshot and one
/// `WorkflowNodeExecution` per executed node with its own log entries.

use crate::runtime::context::ExecutionContext;
use crate::workflow::types::{LogLevel, LoggingConfig, NodeType, WorkflowDefinition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Held by an outside actor; the engine itself never pauses a run
    Paused,
}

impl ExecutionStatus {
    /// Completed, failed and cancelled runs never change status again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// What started the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    #[default]
    Manual,
    Webhook,
    Schedule,
    Api,
}

/// Run metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    pub trigger_source: TriggerSource,
    /// Nodes that failed under the `continue` policy
    #[serde(default)]
    pub failed_nodes: Vec<String>,
}

/// Record of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,
    pub workflow_id: String,
    pub workflow_version: u32,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Milliseconds between `started_at` and `completed_at`; set together with `completed_at`
    pub duration_ms: Option<i64>,
    pub trigger_data: Value,
    pub context: ExecutionContext,
    /// Per-node records in execution order
    pub node_executions: Vec<WorkflowNodeExecution>,
    /// Run-level terminal error
    pub error: Option<String>,
    pub metadata: ExecutionMetadata,
}

impl WorkflowExecution {
    /// Create a running record for a new invocation
    pub fn start(
        definition: &WorkflowDefinition,
        trigger_data: Value,
        context: ExecutionContext,
        trigger_source: TriggerSource,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: definition.id.clone(),
            workflow_version: definition.version,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            trigger_data,
            context,
            node_executions: Vec::new(),
            error: None,
            metadata: ExecutionMetadata {
                trigger_source,
                failed_nodes: Vec::new(),
            },
        }
    }

    /// Move to a terminal status, stamping completion time and duration
    pub fn finish(&mut self, status: ExecutionStatus) {
        let completed_at = Utc::now();
        self.status = status;
        self.completed_at = Some(completed_at);
        self.duration_ms = Some((completed_at - self.started_at).num_milliseconds());
    }

    /// Finish as failed with a run-level error
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.finish(ExecutionStatus::Failed);
    }

    /// Cancel the run if it is not already terminal
    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.finish(ExecutionStatus::Cancelled);
        true
    }

    /// Record for a node, if it ran
    pub fn node_execution(&self, node_id: &str) -> Option<&WorkflowNodeExecution> {
        self.node_executions.iter().find(|record| record.node_id == node_id)
    }
}

/// Status of a single node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Record of one node execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNodeExecution {
    pub node_id: String,
    pub node_type: NodeType,
    pub status: NodeStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    /// Node data and variables as seen when the node started
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// Executor invocations, including retries
    pub attempts: u32,
    pub logs: Vec<LogEntry>,
}

impl WorkflowNodeExecution {
    pub fn start(node_id: &str, node_type: NodeType, input: Value) -> Self {
        Self {
            node_id: node_id.to_string(),
            node_type,
            status: NodeStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            input,
            output: None,
            error: None,
            attempts: 0,
            logs: Vec::new(),
        }
    }

    fn finish(&mut self, status: NodeStatus) {
        let completed_at = Utc::now();
        self.status = status;
        self.completed_at = Some(completed_at);
        self.duration_ms = Some((completed_at - self.started_at).num_milliseconds());
    }

    pub fn complete(&mut self, output: Value) {
        self.output = Some(output);
        self.finish(NodeStatus::Completed);
    }

    pub fn fail(&mut self, error: String) {
        self.error = Some(error);
        self.finish(NodeStatus::Failed);
    }

    pub fn cancel(&mut self) {
        self.error = Some("Execution cancelled".to_string());
        self.finish(NodeStatus::Cancelled);
    }
}

/// A log line attached to a node record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Collects log entries for one node and mirrors them to `tracing`
///
/// Entries below the definition's logging level, or all entries when logging is
/// disabled, are traced but not recorded.
#[derive(Debug)]
pub struct NodeLogger {
    node_id: String,
    threshold: Option<LogLevel>,
    entries: Vec<LogEntry>,
}

impl NodeLogger {
    pub fn new(node_id: &str, config: &LoggingConfig) -> Self {
        Self {
            node_id: node_id.to_string(),
            threshold: config.enabled.then_some(config.level),
            entries: Vec::new(),
        }
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(node_id = %self.node_id, "{}", message),
            LogLevel::Info => tracing::info!(node_id = %self.node_id, "{}", message),
            LogLevel::Warn => tracing::warn!(node_id = %self.node_id, "{}", message),
            LogLevel::Error => tracing::error!(node_id = %self.node_id, "{}", message),
        }

        if self.threshold.is_some_and(|threshold| level >= threshold) {
            self.entries.push(LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                data,
            });
        }
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, None);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, None);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, None);
    }

    /// Move collected entries out, leaving the logger empty
    pub fn drain(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }
}
