/// Core workflow definition types
///
/// Defines the declarative shape of an automation: nodes, the connections between
/// them, declared variables and run settings. These types are pure data; they are
/// authored by the graph editor and deserialized from JSON before a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A complete workflow definition containing nodes and their connections
///
/// Definitions are supplied fully resolved by the caller. The engine never
/// persists them; it only validates and executes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Unique workflow identifier (e.g., "wf-approval-escalation")
    pub id: String,
    /// Human-readable workflow name
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Definition revision, copied onto every run record
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub category: WorkflowCategory,
    /// Nodes in this workflow
    pub nodes: Vec<Node>,
    /// Directed connections between nodes
    #[serde(default)]
    pub connections: Vec<Connection>,
    /// Declared variables whose defaults seed every run
    #[serde(default)]
    pub variables: Vec<WorkflowVariable>,
    #[serde(default)]
    pub settings: WorkflowSettings,
    /// Free-form authoring metadata (tags, owner team, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Whether triggers may start this workflow
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

impl WorkflowDefinition {
    /// Look up a node by id
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == node_id)
    }
}

/// Business category the workflow belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowCategory {
    TaskAutomation,
    Approval,
    Notification,
    Integration,
    TimeTracking,
    #[default]
    Custom,
}

/// A single node in the workflow graph
///
/// The `data` payload is interpreted by the executor registered for `node_type`.
/// Ports are editor metadata; the engine wires nodes by id only, except that
/// a connection's source port selects the outgoing branch of condition and
/// branch nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique node identifier within the workflow (e.g., "check-priority")
    pub id: String,
    /// The type of node which determines execution behavior
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Display label
    #[serde(default)]
    pub name: Option<String>,
    /// Node-specific configuration as flexible JSON
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub inputs: Vec<NodePort>,
    #[serde(default)]
    pub outputs: Vec<NodePort>,
}

impl Node {
    /// Display name for logs: the label if set, otherwise the id
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Editor port metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePort {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
}

/// Available node types for the execution engine
///
/// The set is closed: every variant is mapped to an executor by
/// `NodeExecutorRegistry::builtin`, which matches exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point, pass-through
    /// Expected data: anything, echoed nowhere
    Trigger,

    /// Boolean gate over context fields
    /// Expected data: { "conditions": [{ "field": "variables.priority", "operator": "equals", "value": "high" }], "logic": "and" }
    Condition,

    /// Multi-way switch on a single context field
    /// Expected data: { "field": "variables.status", "cases": [{ "value": "done", "port": "closed" }], "defaultPort": "default" }
    Branch,

    /// Generic automation-rule dispatch
    /// Expected data: { "actionType": "assign_reviewer", "parameters": { ... } }
    Action,

    /// Pauses its own execution path
    /// Expected data: { "value": 5, "unit": "minutes" }
    Delay,

    /// Message delivery through the notification collaborator
    /// Expected data: { "recipients": ["u-1"], "message": "Task {{variables.title}} is overdue", "type": "email" }
    Notification,

    /// Create a task record
    /// Expected data: { "title": "...", "status": "todo", ... }
    TaskCreate,

    /// Update a task record
    /// Expected data: { "taskId": "{{variables.taskId}}", "updates": { "status": "done" } }
    TaskUpdate,

    /// Outbound HTTP call; failures are reported in the output, not raised
    /// Expected data: { "url": "https://...", "method": "POST", "headers": {...}, "body": {...}, "timeoutMs": 5000 }
    Webhook,

    /// Sandboxed script execution
    /// Expected data: { "language": "lua", "code": "return input.hours * 2", "timeoutMs": 1000 }
    Script,
}

impl NodeType {
    /// Every node type, in declaration order
    pub const ALL: [NodeType; 10] = [
        NodeType::Trigger,
        NodeType::Condition,
        NodeType::Branch,
        NodeType::Action,
        NodeType::Delay,
        NodeType::Notification,
        NodeType::TaskCreate,
        NodeType::TaskUpdate,
        NodeType::Webhook,
        NodeType::Script,
    ];

    /// Wire tag for this type (matches the serde representation)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Trigger => "trigger",
            NodeType::Condition => "condition",
            NodeType::Branch => "branch",
            NodeType::Action => "action",
            NodeType::Delay => "delay",
            NodeType::Notification => "notification",
            NodeType::TaskCreate => "task_create",
            NodeType::TaskUpdate => "task_update",
            NodeType::Webhook => "webhook",
            NodeType::Script => "script",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    /// Source node ID
    #[serde(alias = "source")]
    pub source_node_id: String,
    /// Target node ID
    #[serde(alias = "target")]
    pub target_node_id: String,
    /// Output port on the source node; selects condition/branch outcomes
    #[serde(default)]
    pub source_port_id: Option<String>,
    #[serde(default)]
    pub target_port_id: Option<String>,
}

/// A declared workflow variable
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default)]
    pub default_value: Value,
    #[serde(default)]
    pub scope: VariableScope,
    #[serde(default)]
    pub description: Option<String>,
}

/// Declared variable type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl VariableType {
    /// Whether `value` fits this declared type (null always fits)
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (VariableType::String, Value::String(_)) => true,
            (VariableType::Number, Value::Number(_)) => true,
            (VariableType::Boolean, Value::Bool(_)) => true,
            (VariableType::Object, Value::Object(_)) => true,
            (VariableType::Array, Value::Array(_)) => true,
            _ => false,
        }
    }
}

/// Variable visibility scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableScope {
    Global,
    #[default]
    Local,
    Session,
}

/// Per-definition run settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    /// Run-level deadline in milliseconds; unset means no deadline
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Policy applied when a node fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// Abort the run on the first node failure
    #[default]
    Stop,
    /// Skip the failed node's children, keep running other branches
    Continue,
    /// Re-invoke the failed node per the retry policy, then stop
    Retry,
}

/// Retry policy for `ErrorHandling::Retry`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Node log capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Entries below this level are not recorded on node records
    #[serde(default)]
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::default(),
        }
    }
}

/// Severity of a node log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_deserializes_with_defaults() {
        let definition: WorkflowDefinition = serde_json::from_value(json!({
            "id": "wf-1",
            "name": "Escalate overdue tasks",
            "nodes": [
                { "id": "start", "type": "trigger" },
                { "id": "create", "type": "task_create", "data": { "title": "Follow up" } }
            ],
            "connections": [
                { "id": "c1", "source": "start", "target": "create" }
            ]
        }))
        .unwrap();

        assert_eq!(definition.version, 1);
        assert!(definition.enabled);
        assert_eq!(definition.category, WorkflowCategory::Custom);
        assert_eq!(definition.settings.error_handling, ErrorHandling::Stop);
        assert_eq!(definition.settings.retry_policy.max_attempts, 3);
        assert_eq!(definition.nodes[1].node_type, NodeType::TaskCreate);
        assert_eq!(definition.connections[0].source_node_id, "start");
        assert!(definition.node("create").is_some());
    }

    #[test]
    fn node_type_tags_match_serde() {
        for kind in NodeType::ALL {
            let tag = serde_json::to_value(kind).unwrap();
            assert_eq!(tag, json!(kind.as_str()));
        }
    }

    #[test]
    fn variable_type_accepts_null_and_matching_values() {
        assert!(VariableType::Number.accepts(&json!(1.5)));
        assert!(VariableType::Number.accepts(&Value::Null));
        assert!(!VariableType::Number.accepts(&json!("1")));
        assert!(VariableType::Array.accepts(&json!([])));
    }

    #[test]
    fn log_levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
    }
}
