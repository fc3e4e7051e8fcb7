/// Taskway: workflow automation engine for task management
///
/// This library runs declarative automation graphs (trigger, condition and
/// action chains) against a per-run execution context, with structural
/// validation, pluggable per-node-type executors and configurable failure
/// handling.

// Core configuration and setup
pub mod config;

// Workflow definition layer - types, graph analysis, registry
pub mod workflow;

// Runtime execution engine - context, executors, traversal, run store
pub mod runtime;

// External collaborators used by node executors
pub mod services;

// HTTP API layer - workflow management, executions and webhook triggers
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use runtime::{ExecutionOptions, ExecutionStatus, WorkflowEngine, WorkflowExecution};
pub use server::start_server;
pub use workflow::{Node, NodeType, WorkflowDefinition};
