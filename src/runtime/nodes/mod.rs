/// Built-in node executors
///
/// Grouped by what they touch:
/// - control: trigger, condition, branch, delay (context only)
/// - tasks: task_create, task_update (task collaborator)
/// - integration: action, notification, webhook, script (outside collaborators)

pub mod control;
pub mod integration;
pub mod tasks;

use crate::workflow::types::Node;
use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Parse a node's `data` into its typed configuration
///
/// Null data is read as an empty object so all-default configs work.
pub(crate) fn parse_config<T: DeserializeOwned>(node: &Node, data: &Value) -> Result<T> {
    let data = match data {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(data).map_err(|e| {
        anyhow!(
            "Invalid {} configuration on node '{}': {}",
            node.node_type,
            node.id,
            e
        )
    })
}
