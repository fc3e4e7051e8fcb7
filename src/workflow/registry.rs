/// Lock-free workflow definition registry using ArcSwap
///
/// Definitions are owned by whoever authors them; the registry is the
/// in-process source the HTTP layer executes from. Every update swaps the
/// whole map, so readers never block and runs already in flight keep the
/// definition they started with.

use crate::workflow::graph::{self, ValidationResult};
use crate::workflow::types::WorkflowDefinition;
use anyhow::{anyhow, Result};
use arc_swap::ArcSwap;
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};

/// In-memory definition source keyed by workflow id
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    /// Atomic pointer to the current definition map
    workflows: ArcSwap<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition
    ///
    /// Invalid definitions are rejected; the returned result carries any
    /// warnings. A replaced definition keeps its original `created_at`.
    pub fn register(&self, definition: WorkflowDefinition) -> Result<ValidationResult> {
        let validation = checked(&definition)?;
        self.swap_in(definition, true, &validation);
        Ok(validation)
    }

    /// Add a definition whose id is not taken yet
    ///
    /// Returns `Ok(None)` when the id is already registered. The existence
    /// check and the insert happen in the same swap.
    pub fn create(&self, definition: WorkflowDefinition) -> Result<Option<ValidationResult>> {
        let validation = checked(&definition)?;
        Ok(self.swap_in(definition, false, &validation).then_some(validation))
    }

    fn swap_in(&self, definition: WorkflowDefinition, replace: bool, validation: &ValidationResult) -> bool {
        let workflow_id = definition.id.clone();
        let mut stored = false;

        self.workflows.rcu(|current| {
            let mut next = (**current).clone();
            let existing_created_at = next.get(&workflow_id).map(|existing| existing.created_at);
            stored = match existing_created_at {
                Some(_) if !replace => false,
                Some(created_at) => {
                    let mut replacement = definition.clone();
                    replacement.created_at = created_at;
                    replacement.updated_at = Utc::now();
                    next.insert(workflow_id.clone(), Arc::new(replacement));
                    true
                }
                None => {
                    next.insert(workflow_id.clone(), Arc::new(definition.clone()));
                    true
                }
            };
            next
        });

        if stored {
            tracing::info!(
                "📋 Registered workflow: {} (v{}, {} nodes, {} warning(s))",
                workflow_id,
                definition.version,
                definition.nodes.len(),
                validation.warnings.len()
            );
        }
        stored
    }

    /// Get a definition by id (lock-free read)
    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.load().get(workflow_id).cloned()
    }

    /// All definitions, ordered by id
    pub fn list(&self) -> Vec<Arc<WorkflowDefinition>> {
        let mut definitions: Vec<_> = self.workflows.load().values().cloned().collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        definitions
    }

    /// Remove a definition, returning it if it was registered
    pub fn remove(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        let existing = self.get(workflow_id)?;
        self.workflows.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(workflow_id);
            next
        });
        tracing::info!("🗑️ Removed workflow from registry: {}", workflow_id);
        Some(existing)
    }

    pub fn len(&self) -> usize {
        self.workflows.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.load().is_empty()
    }
}

fn checked(definition: &WorkflowDefinition) -> Result<ValidationResult> {
    let validation = graph::validate(definition);
    if !validation.valid {
        return Err(anyhow!("Workflow validation failed: {}", validation.error_summary()));
    }
    Ok(validation)
}
