/// Petgraph-based workflow execution engine
///
/// Validates a definition, seeds the execution context and walks the graph
/// depth-first from every start node. Each node runs exactly once per run;
/// condition and branch nodes choose which outgoing connections are followed.
/// Node failures are handled per the definition's error-handling mode, and
/// every run can be cancelled or bounded by a run-level deadline.

use crate::config::EngineConfig;
use crate::runtime::context::{ContextOverrides, ExecutionContext};
use crate::runtime::execution::{
    ExecutionStatus, NodeLogger, TriggerSource, WorkflowExecution, WorkflowNodeExecution,
};
use crate::runtime::executor::{NodeExecutorRegistry, NodeOutput, NodeScope};
use crate::runtime::store::ExecutionStore;
use crate::services::Services;
use crate::workflow::graph::{self, ValidationResult, WorkflowGraph};
use crate::workflow::types::{ErrorHandling, Node, RetryPolicy, WorkflowDefinition, WorkflowSettings};
use anyhow::Result;
use futures::FutureExt;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest wait between two retry attempts
const MAX_RETRY_DELAY_MS: u64 = 5 * 60 * 1_000;

/// Caller-supplied run options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOptions {
    #[serde(flatten)]
    pub overrides: ContextOverrides,
    #[serde(default)]
    pub trigger_source: TriggerSource,
}

impl ExecutionOptions {
    pub fn from_source(trigger_source: TriggerSource) -> Self {
        Self {
            trigger_source,
            ..Self::default()
        }
    }
}

/// Workflow execution engine
///
/// Cheap to share behind an `Arc`; concurrent runs are independent records in
/// the shared `ExecutionStore`.
pub struct WorkflowEngine {
    registry: Arc<NodeExecutorRegistry>,
    store: Arc<ExecutionStore>,
    config: EngineConfig,
}

/// A run record that has been registered but not yet driven
struct PreparedRun {
    record: WorkflowExecution,
    cancel: CancellationToken,
}

/// How a single node invocation ended
enum NodeOutcome {
    Completed(NodeOutput),
    Failed(String),
    Cancelled,
    TimedOut,
}

impl WorkflowEngine {
    pub fn new(registry: NodeExecutorRegistry, store: Arc<ExecutionStore>, config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            config,
        }
    }

    /// Engine with built-in executors wired to in-process collaborators
    pub fn with_defaults(config: EngineConfig) -> Result<Self> {
        let services = Services::in_process(&config)?;
        Ok(Self::with_services(&services, config))
    }

    /// Engine with built-in executors wired to the given collaborators
    pub fn with_services(services: &Services, config: EngineConfig) -> Self {
        let registry = NodeExecutorRegistry::builtin(services, &config);
        Self::new(registry, Arc::new(ExecutionStore::new()), config)
    }

    pub fn registry(&self) -> &NodeExecutorRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ExecutionStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Structural validation without running anything
    pub fn validate_workflow(&self, definition: &WorkflowDefinition) -> ValidationResult {
        graph::validate(definition)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Option<WorkflowExecution> {
        self.store.get(execution_id).await
    }

    pub async fn get_all_executions(&self) -> Vec<WorkflowExecution> {
        self.store.list().await
    }

    /// Cancel a run that has not finished yet
    ///
    /// The stored record flips to `cancelled` immediately and the in-flight
    /// node, if any, is dropped at its next suspension point.
    pub async fn cancel_execution(&self, execution_id: &str) -> bool {
        let cancelled = self.store.cancel(execution_id).await;
        if cancelled {
            tracing::info!("🛑 Execution cancelled: {}", execution_id);
        } else {
            tracing::debug!("⚠️ Cancel ignored for unknown or finished execution: {}", execution_id);
        }
        cancelled
    }

    /// Run a workflow to completion and return its record
    ///
    /// Never fails: invalid definitions and node failures are reported on the
    /// returned record.
    pub async fn execute_workflow(
        &self,
        definition: &WorkflowDefinition,
        trigger_data: Value,
        options: ExecutionOptions,
    ) -> WorkflowExecution {
        let run = self.prepare(definition, trigger_data, options).await;
        self.drive(definition, run).await
    }

    /// Start a workflow in the background
    ///
    /// Returns the execution id right away, so the run can be observed and
    /// cancelled while it is in flight.
    pub async fn spawn_workflow(
        self: &Arc<Self>,
        definition: WorkflowDefinition,
        trigger_data: Value,
        options: ExecutionOptions,
    ) -> (String, JoinHandle<WorkflowExecution>) {
        let run = self.prepare(&definition, trigger_data, options).await;
        let execution_id = run.record.id.clone();
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move { engine.drive(&definition, run).await });
        (execution_id, handle)
    }

    /// Validate, seed the context and register the run record
    async fn prepare(
        &self,
        definition: &WorkflowDefinition,
        trigger_data: Value,
        options: ExecutionOptions,
    ) -> PreparedRun {
        let context = ExecutionContext::seed(
            definition,
            &trigger_data,
            &options.overrides,
            &self.config.environment,
        );
        let mut record =
            WorkflowExecution::start(definition, trigger_data, context, options.trigger_source);
        let cancel = self.store.register(&record).await;

        tracing::info!(
            "🚀 Starting workflow execution: {} (workflow: {}, v{}, source: {:?})",
            record.id,
            definition.id,
            definition.version,
            record.metadata.trigger_source
        );

        let validation = graph::validate(definition);
        for warning in &validation.warnings {
            tracing::warn!("⚠️ Workflow '{}': {}", definition.id, warning.message);
        }
        if !validation.valid {
            let summary = validation.error_summary();
            tracing::error!("❌ Workflow validation failed for '{}': {}", definition.id, summary);
            record.fail(format!("Workflow validation failed: {}", summary));
            record = self.store.save(&record).await;
        }

        PreparedRun { record, cancel }
    }

    /// Walk the graph depth-first from every start node
    async fn drive(&self, definition: &WorkflowDefinition, run: PreparedRun) -> WorkflowExecution {
        let PreparedRun { mut record, cancel } = run;
        if record.status.is_terminal() {
            return record;
        }

        let settings = &definition.settings;
        let graph = WorkflowGraph::build(definition);
        let deadline = settings
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms));

        let mut visited: HashSet<NodeIndex> = HashSet::with_capacity(graph.node_count());
        let mut stack: Vec<NodeIndex> = graph.start_nodes();
        stack.reverse();

        tracing::debug!(
            "🔄 Traversing {} nodes from {} start node(s)",
            graph.node_count(),
            stack.len()
        );

        while let Some(index) = stack.pop() {
            if !visited.insert(index) {
                continue;
            }

            if cancel.is_cancelled() || record.status == ExecutionStatus::Cancelled {
                break;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                self.time_out(&mut record, settings).await;
                return record;
            }

            let node = graph.node(index);
            match self.run_node(node, &mut record, settings, &cancel, deadline).await {
                NodeOutcome::Completed(output) => {
                    let mut next = graph.downstream_via(index, &output.routing);
                    next.retain(|target| !visited.contains(target));
                    stack.extend(next.into_iter().rev());
                }
                NodeOutcome::Failed(error) => match settings.error_handling {
                    ErrorHandling::Continue => {
                        tracing::warn!(
                            "⏭️ Continuing past failed node '{}'; its downstream nodes are skipped",
                            node.id
                        );
                        record.metadata.failed_nodes.push(node.id.clone());
                    }
                    ErrorHandling::Stop | ErrorHandling::Retry => {
                        record.fail(format!("Node '{}' failed: {}", node.id, error));
                        tracing::error!("❌ Workflow execution {} failed at node '{}'", record.id, node.id);
                        record = self.store.save(&record).await;
                        return record;
                    }
                },
                NodeOutcome::Cancelled => break,
                NodeOutcome::TimedOut => {
                    self.time_out(&mut record, settings).await;
                    return record;
                }
            }
        }

        if cancel.is_cancelled() || record.status == ExecutionStatus::Cancelled {
            record.cancel();
            tracing::info!("🛑 Workflow execution {} stopped after cancellation", record.id);
        } else {
            record.finish(ExecutionStatus::Completed);
            tracing::info!(
                "🎉 Workflow execution {} completed in {} ms ({} node(s), {} failed)",
                record.id,
                record.duration_ms.unwrap_or_default(),
                record.node_executions.len(),
                record.metadata.failed_nodes.len()
            );
        }

        record = self.store.save(&record).await;
        record
    }

    async fn time_out(&self, record: &mut WorkflowExecution, settings: &WorkflowSettings) {
        let timeout_ms = settings.timeout_ms.unwrap_or_default();
        tracing::error!("⏰ Workflow execution {} timed out after {} ms", record.id, timeout_ms);
        record.fail(format!("Workflow timed out after {} ms", timeout_ms));
        *record = self.store.save(record).await;
    }

    /// Execute one node, retrying per policy, and record the outcome
    async fn run_node(
        &self,
        node: &Node,
        record: &mut WorkflowExecution,
        settings: &WorkflowSettings,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> NodeOutcome {
        tracing::info!("📍 Executing node '{}' (type: {})", node.id, node.node_type);

        let input = json!({ "data": node.data, "variables": record.context.variables });
        let mut node_record = WorkflowNodeExecution::start(&node.id, node.node_type, input);
        let slot = record.node_executions.len();
        record.node_executions.push(node_record.clone());
        *record = self.store.save(record).await;

        let mut logger = NodeLogger::new(&node.id, &settings.logging);
        let max_attempts = match settings.error_handling {
            ErrorHandling::Retry => settings.retry_policy.max_attempts.max(1),
            _ => 1,
        };

        let outcome = match self.registry.get(node.node_type) {
            None => NodeOutcome::Failed(format!(
                "No executor registered for node type: {}",
                node.node_type
            )),
            Some(executor) => loop {
                node_record.attempts += 1;
                let attempt = node_record.attempts;

                let outcome = {
                    let mut scope = NodeScope {
                        context: &mut record.context,
                        logger: &mut logger,
                        execution_id: &record.id,
                        workflow_id: &record.workflow_id,
                    };
                    let invocation = AssertUnwindSafe(executor.execute(node, &mut scope)).catch_unwind();

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => NodeOutcome::Cancelled,
                        _ = wait_for(deadline) => NodeOutcome::TimedOut,
                        result = invocation => match result {
                            Ok(Ok(output)) => NodeOutcome::Completed(output),
                            Ok(Err(e)) => NodeOutcome::Failed(e.to_string()),
                            Err(panic) => NodeOutcome::Failed(panic_message(panic)),
                        },
                    }
                };

                let error = match outcome {
                    NodeOutcome::Failed(error) if attempt < max_attempts => error,
                    other => break other,
                };

                let delay = retry_delay(&settings.retry_policy, attempt);
                logger.warn(format!(
                    "🔄 Attempt {}/{} failed: {}; retrying in {} ms",
                    attempt,
                    max_attempts,
                    error,
                    delay.as_millis()
                ));

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break NodeOutcome::Cancelled,
                    _ = wait_for(deadline) => break NodeOutcome::TimedOut,
                    _ = tokio::time::sleep(delay) => {}
                }
            },
        };

        match &outcome {
            NodeOutcome::Completed(output) => {
                logger.debug(format!("✅ Node '{}' completed", node.id));
                record.context.record_output(&node.id, output.value.clone());
                node_record.complete(output.value.clone());
            }
            NodeOutcome::Failed(error) => {
                logger.error(format!("❌ Node '{}' failed: {}", node.id, error));
                node_record.fail(error.clone());
            }
            NodeOutcome::Cancelled => {
                logger.warn(format!("🛑 Node '{}' cancelled", node.id));
                node_record.cancel();
            }
            NodeOutcome::TimedOut => {
                let message = format!(
                    "Workflow timed out after {} ms",
                    settings.timeout_ms.unwrap_or_default()
                );
                logger.error(format!("⏰ Node '{}' interrupted: {}", node.id, message));
                node_record.fail(message);
            }
        }

        tracing::debug!(
            "📊 Node '{}' finished as {:?} after {} attempt(s) in {} ms",
            node.id,
            node_record.status,
            node_record.attempts,
            node_record.duration_ms.unwrap_or_default()
        );

        node_record.logs = logger.drain();
        record.node_executions[slot] = node_record;
        *record = self.store.save(record).await;

        outcome
    }
}

/// Delay before the attempt following `attempt` (1-based)
fn retry_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let millis = policy.backoff_ms as f64 * policy.backoff_multiplier.max(1.0).powi(exponent);
    Duration::from_millis(millis.min(MAX_RETRY_DELAY_MS as f64) as u64)
}

/// Resolves at the deadline, never when there is none
async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Node executor panicked: {}", detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_grows_and_caps() {
        let policy = RetryPolicy { max_attempts: 5, backoff_ms: 100, backoff_multiplier: 2.0 };
        assert_eq!(retry_delay(&policy, 1), Duration::from_millis(100));
        assert_eq!(retry_delay(&policy, 2), Duration::from_millis(200));
        assert_eq!(retry_delay(&policy, 4), Duration::from_millis(800));

        let slow = RetryPolicy { max_attempts: 5, backoff_ms: 200_000, backoff_multiplier: 3.0 };
        assert_eq!(retry_delay(&slow, 3), Duration::from_millis(MAX_RETRY_DELAY_MS));
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(Box::new("boom")), "Node executor panicked: boom");
        assert_eq!(
            panic_message(Box::new(String::from("bad state"))),
            "Node executor panicked: bad state"
        );
    }
}
