/// Runtime Execution Engine
///
/// This module runs workflow definitions. It handles:
/// - Seeding and resolving the per-run execution context
/// - Dispatching nodes to their executors
/// - Depth-first traversal with error policies, retries, deadlines and cancellation
/// - Keeping run records in an in-memory store

// Per-run variables, task references and field path resolution
pub mod context;

// Run and node records, node logging
pub mod execution;

// Condition clauses shared by condition and branch nodes
pub mod condition;

// Executor trait and node type registry
pub mod executor;

// Built-in executors for every node type
pub mod nodes;

// Graph traversal and run lifecycle
pub mod engine;

// In-memory run record store
pub mod store;

// Re-export main types
pub use context::{ContextOverrides, ExecutionContext, TaskReference};
pub use engine::{ExecutionOptions, WorkflowEngine};
pub use execution::{ExecutionStatus, NodeStatus, TriggerSource, WorkflowExecution, WorkflowNodeExecution};
pub use executor::{NodeExecutor, NodeExecutorRegistry, NodeOutput, NodeScope};
pub use store::ExecutionStore;
