#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use taskway::config::EngineConfig;
use taskway::runtime::{
    ExecutionStore, NodeExecutor, NodeExecutorRegistry, NodeOutput, NodeScope, WorkflowEngine,
};
use taskway::services::{InMemoryNotifier, InMemoryTaskService, Services};
use taskway::workflow::{Node, NodeType, WorkflowDefinition};

/// Action executor whose behaviour is driven by node data
///
/// - `{"fail": true}` always errors
/// - `{"failTimes": n}` errors on the first n calls for that node
/// - `{"panic": true}` panics
/// - `{"sleepMs": n}` sleeps before succeeding
///
/// Every call is appended to `calls` in order.
#[derive(Default)]
pub struct ScriptedAction {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u64>>,
}

impl ScriptedAction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, node_id: &str) -> usize {
        self.calls().iter().filter(|id| id.as_str() == node_id).count()
    }
}

#[async_trait]
impl NodeExecutor for ScriptedAction {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        self.calls.lock().unwrap().push(node.id.clone());
        scope.logger.info(format!("scripted action {}", node.id));

        if let Some(ms) = node.data.get("sleepMs").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if node.data.get("panic").and_then(Value::as_bool) == Some(true) {
            panic!("scripted panic in {}", node.id);
        }
        if node.data.get("fail").and_then(Value::as_bool) == Some(true) {
            return Err(anyhow!("scripted failure in {}", node.id));
        }
        if let Some(times) = node.data.get("failTimes").and_then(Value::as_u64) {
            let mut failures = self.failures.lock().unwrap();
            let seen = failures.entry(node.id.clone()).or_insert(0);
            if *seen < times {
                *seen += 1;
                return Err(anyhow!("transient failure {} in {}", seen, node.id));
            }
        }

        Ok(json!({ "node": node.id }).into())
    }
}

pub struct Harness {
    pub engine: Arc<WorkflowEngine>,
    pub actions: Arc<ScriptedAction>,
    pub tasks: Arc<InMemoryTaskService>,
    pub notifier: Arc<InMemoryNotifier>,
}

/// Engine with built-in executors, in-memory collaborators and a scripted
/// executor for `action` nodes
pub fn harness() -> Harness {
    let config = EngineConfig {
        environment: "test".to_string(),
        http_timeout_ms: 2_000,
        script_timeout_ms: 2_000,
    };
    let tasks = Arc::new(InMemoryTaskService::new());
    let notifier = Arc::new(InMemoryNotifier::new());
    let services = Services::in_process(&config)
        .unwrap()
        .with_tasks(tasks.clone())
        .with_notifier(notifier.clone());

    let actions = ScriptedAction::new();
    let registry = NodeExecutorRegistry::builtin(&services, &config).with(NodeType::Action, actions.clone());
    let engine = WorkflowEngine::new(registry, Arc::new(ExecutionStore::new()), config);

    Harness {
        engine: Arc::new(engine),
        actions,
        tasks,
        notifier,
    }
}

/// Build a definition from nodes `(id, type, data)` and edges `(source, target)`
pub fn workflow(nodes: &[(&str, &str, Value)], edges: &[(&str, &str)]) -> WorkflowDefinition {
    workflow_with(nodes, edges, json!({}))
}

pub fn workflow_with(
    nodes: &[(&str, &str, Value)],
    edges: &[(&str, &str)],
    settings: Value,
) -> WorkflowDefinition {
    let nodes: Vec<Value> = nodes
        .iter()
        .map(|(id, kind, data)| json!({ "id": id, "type": kind, "data": data }))
        .collect();
    let connections: Vec<Value> = edges
        .iter()
        .enumerate()
        .map(|(i, (source, target))| {
            json!({ "id": format!("c{}", i), "sourceNodeId": source, "targetNodeId": target })
        })
        .collect();

    serde_json::from_value(json!({
        "id": "wf-test",
        "name": "Test workflow",
        "nodes": nodes,
        "connections": connections,
        "settings": settings,
    }))
    .unwrap()
}

pub fn action() -> Value {
    json!({ "actionType": "noop" })
}

pub fn failing_action() -> Value {
    json!({ "actionType": "noop", "fail": true })
}
