/// In-memory execution store
///
/// Keeps every run record by id for the life of the process, together with the
/// cancellation token of runs that are still in flight. There is no eviction.

use crate::runtime::execution::{ExecutionStatus, WorkflowExecution};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

struct StoredRun {
    record: WorkflowExecution,
    cancel: CancellationToken,
}

/// Id-keyed table of run records
#[derive(Default)]
pub struct ExecutionStore {
    runs: RwLock<HashMap<String, StoredRun>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new run and hand back its cancellation token
    pub async fn register(&self, record: &WorkflowExecution) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.runs.write().await.insert(
            record.id.clone(),
            StoredRun {
                record: record.clone(),
                cancel: cancel.clone(),
            },
        );
        cancel
    }

    /// Write the engine's view of a run and return the stored version
    ///
    /// A cancellation recorded in the store wins: status, completion time,
    /// duration and error of a cancelled run are kept, everything else is
    /// taken from `record`.
    pub async fn save(&self, record: &WorkflowExecution) -> WorkflowExecution {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&record.id) {
            Some(stored) => {
                let cancelled = stored.record.status == ExecutionStatus::Cancelled;
                let mut merged = record.clone();
                if cancelled {
                    merged.status = ExecutionStatus::Cancelled;
                    merged.completed_at = stored.record.completed_at;
                    merged.duration_ms = stored.record.duration_ms;
                    merged.error = stored.record.error.clone().or(merged.error);
                }
                stored.record = merged.clone();
                merged
            }
            None => {
                runs.insert(
                    record.id.clone(),
                    StoredRun {
                        record: record.clone(),
                        cancel: CancellationToken::new(),
                    },
                );
                record.clone()
            }
        }
    }

    pub async fn get(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.runs
            .read()
            .await
            .get(execution_id)
            .map(|stored| stored.record.clone())
    }

    /// All runs, oldest first
    pub async fn list(&self) -> Vec<WorkflowExecution> {
        let mut records: Vec<_> = self
            .runs
            .read()
            .await
            .values()
            .map(|stored| stored.record.clone())
            .collect();
        records.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    /// Runs of one workflow, oldest first
    pub async fn list_for_workflow(&self, workflow_id: &str) -> Vec<WorkflowExecution> {
        self.list()
            .await
            .into_iter()
            .filter(|record| record.workflow_id == workflow_id)
            .collect()
    }

    /// Cancel a non-terminal run and fire its token
    ///
    /// Returns false for unknown or already finished runs.
    pub async fn cancel(&self, execution_id: &str) -> bool {
        let mut runs = self.runs.write().await;
        let Some(stored) = runs.get_mut(execution_id) else {
            return false;
        };
        if !stored.record.cancel() {
            return false;
        }
        stored.cancel.cancel();
        true
    }

    pub async fn remove(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.runs
            .write()
            .await
            .remove(execution_id)
            .map(|stored| stored.record)
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::{ContextOverrides, ExecutionContext};
    use crate::runtime::execution::TriggerSource;
    use crate::workflow::types::WorkflowDefinition;
    use serde_json::{json, Value};

    fn record() -> WorkflowExecution {
        let definition: WorkflowDefinition =
            serde_json::from_value(json!({ "id": "wf", "name": "wf", "nodes": [] })).unwrap();
        let context = ExecutionContext::seed(&definition, &Value::Null, &ContextOverrides::default(), "test");
        WorkflowExecution::start(&definition, Value::Null, context, TriggerSource::Manual)
    }

    #[tokio::test]
    async fn cancel_fires_token_and_survives_later_saves() {
        let store = ExecutionStore::new();
        let mut run = record();
        let token = store.register(&run).await;

        assert!(store.cancel(&run.id).await);
        assert!(token.is_cancelled());
        assert!(!store.cancel(&run.id).await);

        run.finish(ExecutionStatus::Completed);
        let merged = store.save(&run).await;
        assert_eq!(merged.status, ExecutionStatus::Cancelled);
        assert_eq!(store.get(&run.id).await.unwrap().status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn terminal_runs_cannot_be_cancelled() {
        let store = ExecutionStore::new();
        let mut run = record();
        store.register(&run).await;
        run.finish(ExecutionStatus::Completed);
        store.save(&run).await;

        assert!(!store.cancel(&run.id).await);
        assert!(!store.cancel("unknown").await);
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn removed_runs_are_forgotten() {
        let store = ExecutionStore::new();
        assert!(store.is_empty().await);

        let run = record();
        let token = store.register(&run).await;
        assert_eq!(store.len().await, 1);

        let removed = store.remove(&run.id).await.unwrap();
        assert_eq!(removed.id, run.id);
        assert!(store.is_empty().await);
        assert!(store.get(&run.id).await.is_none());
        assert!(!store.cancel(&run.id).await);
        assert!(!token.is_cancelled());
        assert!(store.remove(&run.id).await.is_none());
    }
}
