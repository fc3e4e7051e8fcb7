/// Workflow Definition Layer
///
/// This module handles workflow definitions and their structural analysis:
/// - Type definitions (WorkflowDefinition, Node, Connection, settings)
/// - Petgraph-based graph analysis and validation
/// - Lock-free definition registry using ArcSwap

// Core workflow type definitions
pub mod types;

// Graph analysis: start nodes, downstream lookup, cycle detection, validation
pub mod graph;

// In-memory definition registry using ArcSwap for lock-free reads
pub mod registry;

// Re-export commonly used types
pub use graph::{validate, ValidationIssue, ValidationResult, WorkflowGraph};
pub use registry::WorkflowRegistry;
pub use types::{Connection, ErrorHandling, Node, NodeType, WorkflowDefinition, WorkflowSettings};
