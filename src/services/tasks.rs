/// Task-management collaborator
///
/// The task store itself lives outside the engine; nodes only create and update
/// records through this contract.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A task as returned by the task store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub status: String,
    /// Remaining task fields (title, assignee, due date, ...)
    pub fields: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait TaskService: Send + Sync {
    /// Create a task from a field bag; `status` defaults to "todo"
    async fn create_task(&self, fields: Map<String, Value>) -> Result<TaskRecord>;

    /// Apply field updates to an existing task
    async fn update_task(&self, task_id: &str, updates: Map<String, Value>) -> Result<TaskRecord>;
}

/// Task store held in process memory
#[derive(Debug, Default)]
pub struct InMemoryTaskService {
    tasks: RwLock<HashMap<String, TaskRecord>>,
}

impl InMemoryTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks.read().await.get(task_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

fn take_status(fields: &mut Map<String, Value>) -> Option<String> {
    match fields.remove("status") {
        Some(Value::String(status)) => Some(status),
        Some(other) if !other.is_null() => Some(other.to_string()),
        _ => None,
    }
}

#[async_trait]
impl TaskService for InMemoryTaskService {
    async fn create_task(&self, mut fields: Map<String, Value>) -> Result<TaskRecord> {
        let now = Utc::now();
        let status = take_status(&mut fields).unwrap_or_else(|| "todo".to_string());
        let record = TaskRecord {
            id: uuid::Uuid::new_v4().to_string(),
            status,
            fields,
            created_at: now,
            updated_at: now,
        };

        self.tasks.write().await.insert(record.id.clone(), record.clone());
        tracing::debug!("📝 Task created: {} ({})", record.id, record.status);

        Ok(record)
    }

    async fn update_task(&self, task_id: &str, mut updates: Map<String, Value>) -> Result<TaskRecord> {
        let mut tasks = self.tasks.write().await;
        let record = tasks
            .get_mut(task_id)
            .ok_or_else(|| anyhow!("Task not found: {}", task_id))?;

        if let Some(status) = take_status(&mut updates) {
            record.status = status;
        }
        for (key, value) in updates {
            record.fields.insert(key, value);
        }
        record.updated_at = Utc::now();
        tracing::debug!("✏️ Task updated: {} ({})", record.id, record.status);

        Ok(record.clone())
    }
}
