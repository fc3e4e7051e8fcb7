/// Task executors: create and update records through the task collaborator
///
/// Both record a `TaskReference` on the context so the run reports which tasks
/// it touched.

use super::parse_config;
use crate::runtime::context::{TaskAction, TaskReference};
use crate::runtime::executor::{NodeExecutor, NodeOutput, NodeScope};
use crate::services::{TaskRecord, TaskService};
use crate::workflow::types::Node;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn reference(record: &TaskRecord, action: TaskAction, node_id: &str) -> Result<TaskReference> {
    Ok(TaskReference {
        task_id: record.id.clone(),
        action,
        status: record.status.clone(),
        snapshot: serde_json::to_value(record)?,
        node_id: node_id.to_string(),
    })
}

pub struct TaskCreateExecutor {
    tasks: Arc<dyn TaskService>,
}

impl TaskCreateExecutor {
    pub fn new(tasks: Arc<dyn TaskService>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl NodeExecutor for TaskCreateExecutor {
    /// Node data (after interpolation) is the task's field bag; a nested
    /// `task` object is used instead when present
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let data = scope.context.interpolate(&node.data)?;
        let fields = match data {
            Value::Object(mut object) => match object.remove("task") {
                Some(Value::Object(task)) => task,
                Some(other) => {
                    return Err(anyhow!("Task payload on node '{}' must be an object, got {}", node.id, other))
                }
                None => object,
            },
            Value::Null => Map::new(),
            other => {
                return Err(anyhow!("Task payload on node '{}' must be an object, got {}", node.id, other))
            }
        };

        let record = self.tasks.create_task(fields).await?;
        let reference = reference(&record, TaskAction::Created, &node.id)?;
        scope.logger.info(format!("📝 Created task {} ({})", record.id, record.status));

        let output = json!({ "taskId": record.id, "task": reference.snapshot });
        scope.context.record_task(reference);
        Ok(output.into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskUpdateConfig {
    task_id: String,
    #[serde(default)]
    updates: Map<String, Value>,
}

pub struct TaskUpdateExecutor {
    tasks: Arc<dyn TaskService>,
}

impl TaskUpdateExecutor {
    pub fn new(tasks: Arc<dyn TaskService>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl NodeExecutor for TaskUpdateExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let data = scope.context.interpolate(&node.data)?;
        let config: TaskUpdateConfig = parse_config(node, &data)?;

        let record = self.tasks.update_task(&config.task_id, config.updates).await?;
        let reference = reference(&record, TaskAction::Updated, &node.id)?;
        scope.logger.info(format!("✏️ Updated task {} ({})", record.id, record.status));

        let output = json!({ "taskId": record.id, "updated": true, "task": reference.snapshot });
        scope.context.record_task(reference);
        Ok(output.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::{ContextOverrides, ExecutionContext};
    use crate::runtime::execution::NodeLogger;
    use crate::services::InMemoryTaskService;
    use crate::workflow::types::{LoggingConfig, WorkflowDefinition};

    fn node(kind: &str, data: Value) -> Node {
        serde_json::from_value(json!({ "id": "n1", "type": kind, "data": data })).unwrap()
    }

    #[tokio::test]
    async fn create_then_update_records_references() {
        let service = Arc::new(InMemoryTaskService::new());
        let definition: WorkflowDefinition =
            serde_json::from_value(json!({ "id": "wf", "name": "wf", "nodes": [] })).unwrap();
        let mut context = ExecutionContext::seed(
            &definition,
            &json!({ "requester": "u-7" }),
            &ContextOverrides::default(),
            "test",
        );
        let mut logger = NodeLogger::new("n1", &LoggingConfig::default());

        let created = {
            let mut scope = NodeScope {
                context: &mut context,
                logger: &mut logger,
                execution_id: "exec-1",
                workflow_id: "wf",
            };
            let create = node("task_create", json!({ "title": "Approve", "assignee": "{{variables.requester}}" }));
            TaskCreateExecutor::new(service.clone())
                .execute(&create, &mut scope)
                .await
                .unwrap()
        };
        let task_id = created.value["taskId"].as_str().unwrap().to_string();
        assert_eq!(created.value["task"]["fields"]["assignee"], json!("u-7"));

        {
            let mut scope = NodeScope {
                context: &mut context,
                logger: &mut logger,
                execution_id: "exec-1",
                workflow_id: "wf",
            };
            let update = node("task_update", json!({ "taskId": task_id, "updates": { "status": "approved" } }));
            TaskUpdateExecutor::new(service.clone())
                .execute(&update, &mut scope)
                .await
                .unwrap();
        }

        assert_eq!(context.tasks.len(), 2);
        assert_eq!(service.len().await, 1);
        assert_eq!(context.tasks[0].action, TaskAction::Created);
        assert_eq!(context.tasks[1].status, "approved");
        assert_eq!(service.get(&task_id).await.unwrap().status, "approved");
    }
}
