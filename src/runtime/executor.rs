/// Node executor contract and registry
///
/// Every node type is handled by a `NodeExecutor`. The registry maps each
/// `NodeType` to one executor; the engine looks the executor up per node and
/// treats whatever it returns (or raises) as that node's outcome.

use crate::config::EngineConfig;
use crate::runtime::context::ExecutionContext;
use crate::runtime::execution::NodeLogger;
use crate::runtime::nodes::{control, integration, tasks};
use crate::services::Services;
use crate::workflow::graph::Routing;
use crate::workflow::types::{Node, NodeType};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// What a node hands back to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    /// Payload published as `node_<id>_output`
    pub value: Value,
    /// Which outgoing connections to follow
    pub routing: Routing,
}

impl NodeOutput {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            routing: Routing::All,
        }
    }

    /// Follow only connections tagged with `port` (plus untagged ones if asked)
    pub fn select(mut self, port: impl Into<String>, include_untagged: bool) -> Self {
        self.routing = Routing::Selected {
            port: port.into(),
            include_untagged,
        };
        self
    }
}

impl From<Value> for NodeOutput {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Per-invocation view an executor gets of its run
pub struct NodeScope<'a> {
    /// The run's context; executors may read it and append to it
    pub context: &'a mut ExecutionContext,
    /// Log sink for this node's record
    pub logger: &'a mut NodeLogger,
    pub execution_id: &'a str,
    pub workflow_id: &'a str,
}

/// Executes one node type
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput>;
}

/// Lookup table from node type to executor
#[derive(Clone, Default)]
pub struct NodeExecutorRegistry {
    executors: HashMap<NodeType, Arc<dyn NodeExecutor>>,
}

impl NodeExecutorRegistry {
    /// Registry with no executors
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with a built-in executor for every node type
    pub fn builtin(services: &Services, config: &EngineConfig) -> Self {
        let mut registry = Self::empty();
        for node_type in NodeType::ALL {
            registry.register(node_type, builtin_executor(node_type, services, config));
        }
        registry
    }

    /// Install or replace the executor for a node type
    pub fn register(&mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) {
        tracing::debug!("🔧 Registered executor for node type: {}", node_type);
        self.executors.insert(node_type, executor);
    }

    /// Builder-style `register`
    pub fn with(mut self, node_type: NodeType, executor: Arc<dyn NodeExecutor>) -> Self {
        self.register(node_type, executor);
        self
    }

    pub fn get(&self, node_type: NodeType) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&node_type).cloned()
    }

    /// Node types with an executor, in `NodeType::ALL` order
    pub fn registered_types(&self) -> Vec<NodeType> {
        NodeType::ALL
            .into_iter()
            .filter(|node_type| self.executors.contains_key(node_type))
            .collect()
    }
}

fn builtin_executor(
    node_type: NodeType,
    services: &Services,
    config: &EngineConfig,
) -> Arc<dyn NodeExecutor> {
    match node_type {
        NodeType::Trigger => Arc::new(control::TriggerExecutor),
        NodeType::Condition => Arc::new(control::ConditionExecutor),
        NodeType::Branch => Arc::new(control::BranchExecutor),
        NodeType::Delay => Arc::new(control::DelayExecutor),
        NodeType::Action => Arc::new(integration::ActionExecutor::new(services.rules.clone())),
        NodeType::Notification => {
            Arc::new(integration::NotificationExecutor::new(services.notifier.clone()))
        }
        NodeType::Webhook => Arc::new(integration::WebhookExecutor::new(
            services.http.clone(),
            config.http_timeout_ms,
        )),
        NodeType::Script => Arc::new(integration::ScriptExecutor::new(
            services.scripts.clone(),
            config.script_timeout_ms,
        )),
        NodeType::TaskCreate => Arc::new(tasks::TaskCreateExecutor::new(services.tasks.clone())),
        NodeType::TaskUpdate => Arc::new(tasks::TaskUpdateExecutor::new(services.tasks.clone())),
    }
}
