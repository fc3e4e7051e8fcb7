/// Runtime execution context threaded through one run
///
/// Holds the variable map every node reads and writes, the append-only list of
/// tasks touched during the run, and the acting user and environment. Field
/// lookups are bounded to a fixed set of root namespaces so a typo in a path
/// fails loudly instead of quietly resolving to null.

use crate::workflow::types::WorkflowDefinition;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Root namespaces a field path may start with
pub const ROOT_NAMESPACES: [&str; 4] = ["variables", "tasks", "user", "environment"];

/// Mutable variable/task state for a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Defaults, overridden by trigger data, overridden by caller overrides,
    /// plus `node_<id>_output` entries written as nodes complete
    pub variables: Map<String, Value>,
    /// Tasks created or touched during the run (append-only)
    pub tasks: Vec<TaskReference>,
    /// Acting user, if the run was started on someone's behalf
    pub user_id: Option<String>,
    /// Run timestamp
    pub timestamp: DateTime<Utc>,
    /// Environment tag (e.g., "production")
    pub environment: String,
}

/// Reference to a task created or updated by a node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReference {
    pub task_id: String,
    pub action: TaskAction,
    pub status: String,
    /// Task record as returned by the task collaborator
    pub snapshot: Value,
    /// Node that produced this reference
    pub node_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    Created,
    Updated,
}

/// Caller-supplied adjustments applied when seeding a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOverrides {
    /// Variables that win over both defaults and trigger data
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Replaces the engine's configured environment tag
    #[serde(default)]
    pub environment: Option<String>,
}

impl ExecutionContext {
    /// Seed the context for a new run
    ///
    /// `variables = defaults ∪ trigger data ∪ overrides`, later sources winning.
    /// An object trigger payload is merged key by key; any other non-null payload
    /// is stored under `trigger`.
    pub fn seed(
        definition: &WorkflowDefinition,
        trigger_data: &Value,
        overrides: &ContextOverrides,
        default_environment: &str,
    ) -> Self {
        let mut variables = Map::new();

        for variable in &definition.variables {
            variables.insert(variable.name.clone(), variable.default_value.clone());
        }

        match trigger_data {
            Value::Object(payload) => {
                for (key, value) in payload {
                    variables.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            other => {
                variables.insert("trigger".to_string(), other.clone());
            }
        }

        for (key, value) in &overrides.variables {
            variables.insert(key.clone(), value.clone());
        }

        Self {
            variables,
            tasks: Vec::new(),
            user_id: overrides.user_id.clone(),
            timestamp: Utc::now(),
            environment: overrides
                .environment
                .clone()
                .unwrap_or_else(|| default_environment.to_string()),
        }
    }

    /// Variable key under which a node's output is published
    pub fn output_key(node_id: &str) -> String {
        format!("node_{}_output", node_id)
    }

    /// Publish a completed node's output for downstream nodes
    pub fn record_output(&mut self, node_id: &str, output: Value) {
        self.variables.insert(Self::output_key(node_id), output);
    }

    /// Append a task reference
    pub fn record_task(&mut self, reference: TaskReference) {
        self.tasks.push(reference);
    }

    /// Resolve a dotted field path such as `variables.ticket.priority`
    ///
    /// The first segment must be one of `ROOT_NAMESPACES`, otherwise this is an
    /// error. Below the root a missing segment yields `Value::Null`. Numeric
    /// segments index into arrays (`tasks.0.status`).
    pub fn resolve(&self, path: &str) -> Result<Value> {
        let path = path.trim();
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();

        let root_value = match root {
            "variables" => Value::Object(self.variables.clone()),
            "tasks" => serde_json::to_value(&self.tasks)?,
            "user" => match &self.user_id {
                Some(id) => json!({ "id": id }),
                None => Value::Null,
            },
            "environment" => Value::String(self.environment.clone()),
            _ => {
                return Err(anyhow!(
                    "Unknown root '{}' in field path '{}'; expected one of: {}",
                    root,
                    path,
                    ROOT_NAMESPACES.join(", ")
                ))
            }
        };

        let mut current = &root_value;
        for segment in segments {
            current = match current {
                Value::Object(object) => object.get(segment).unwrap_or(&Value::Null),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get(i))
                    .unwrap_or(&Value::Null),
                _ => return Ok(Value::Null),
            };
        }

        Ok(current.clone())
    }

    /// Replace `{{ path }}` placeholders in every string inside `value`
    ///
    /// A string that is exactly one placeholder takes the resolved value with its
    /// JSON type; placeholders embedded in longer text are rendered as text.
    pub fn interpolate(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::String(text) => self.interpolate_str(text)?,
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.interpolate(item))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(object) => {
                let mut rendered = Map::with_capacity(object.len());
                for (key, item) in object {
                    rendered.insert(key.clone(), self.interpolate(item)?);
                }
                Value::Object(rendered)
            }
            other => other.clone(),
        })
    }

    fn interpolate_str(&self, text: &str) -> Result<Value> {
        let trimmed = text.trim();
        if let Some(inner) = trimmed
            .strip_prefix("{{")
            .and_then(|rest| rest.strip_suffix("}}"))
        {
            if !inner.contains("{{") && !inner.contains("}}") {
                return self.resolve(inner);
            }
        }

        let mut rendered = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find("{{") {
            let Some(close) = rest[open + 2..].find("}}") else {
                break;
            };
            rendered.push_str(&rest[..open]);
            let path = &rest[open + 2..open + 2 + close];
            match self.resolve(path)? {
                Value::String(s) => rendered.push_str(&s),
                Value::Null => {}
                other => rendered.push_str(&other.to_string()),
            }
            rest = &rest[open + 2 + close + 2..];
        }
        rendered.push_str(rest);

        Ok(Value::String(rendered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition_with_variables() -> WorkflowDefinition {
        serde_json::from_value(json!({
            "id": "wf",
            "name": "Vars",
            "nodes": [{ "id": "t", "type": "trigger" }],
            "variables": [
                { "name": "x", "type": "number", "defaultValue": 1 },
                { "name": "y", "type": "string", "defaultValue": "a" }
            ]
        }))
        .unwrap()
    }

    fn plain(trigger: &Value) -> ExecutionContext {
        ExecutionContext::seed(&definition_with_variables(), trigger, &ContextOverrides::default(), "dev")
    }

    #[test]
    fn trigger_data_overrides_defaults() {
        let context = ExecutionContext::seed(
            &definition_with_variables(),
            &json!({ "x": 2 }),
            &ContextOverrides::default(),
            "production",
        );

        assert_eq!(context.variables["x"], json!(2));
        assert_eq!(context.variables["y"], json!("a"));
        assert_eq!(context.environment, "production");
        assert!(context.tasks.is_empty());
    }

    #[test]
    fn caller_overrides_win_over_trigger_data() {
        let overrides = ContextOverrides {
            variables: Map::from_iter([("x".to_string(), json!(3))]),
            user_id: Some("u-7".to_string()),
            environment: Some("staging".to_string()),
        };
        let context =
            ExecutionContext::seed(&definition_with_variables(), &json!({ "x": 2 }), &overrides, "production");

        assert_eq!(context.variables["x"], json!(3));
        assert_eq!(context.user_id.as_deref(), Some("u-7"));
        assert_eq!(context.environment, "staging");
    }

    #[test]
    fn scalar_trigger_payload_lands_under_trigger() {
        let context = plain(&json!("ping"));
        assert_eq!(context.variables["trigger"], json!("ping"));
    }

    #[test]
    fn resolves_namespaced_paths() {
        let mut context = ExecutionContext::seed(
            &definition_with_variables(),
            &json!({ "ticket": { "priority": "high", "labels": ["bug", "ui"] } }),
            &ContextOverrides { user_id: Some("u-1".to_string()), ..Default::default() },
            "production",
        );
        context.record_task(TaskReference {
            task_id: "task-1".to_string(),
            action: TaskAction::Created,
            status: "todo".to_string(),
            snapshot: json!({}),
            node_id: "create".to_string(),
        });

        assert_eq!(context.resolve("variables.ticket.priority").unwrap(), json!("high"));
        assert_eq!(context.resolve("variables.ticket.labels.1").unwrap(), json!("ui"));
        assert_eq!(context.resolve("variables.ticket.missing.deeper").unwrap(), Value::Null);
        assert_eq!(context.resolve("tasks.0.taskId").unwrap(), json!("task-1"));
        assert_eq!(context.resolve("user.id").unwrap(), json!("u-1"));
        assert_eq!(context.resolve("environment").unwrap(), json!("production"));
    }

    #[test]
    fn unknown_root_is_an_error() {
        let context = plain(&Value::Null);
        let err = context.resolve("varibles.x").unwrap_err();
        assert!(err.to_string().contains("Unknown root 'varibles'"));
    }

    #[test]
    fn interpolation_keeps_types_for_whole_placeholders() {
        let mut context = plain(&Value::Null);
        context.record_output("create", json!({ "taskId": "task-9" }));

        let rendered = context
            .interpolate(&json!({
                "count": "{{ variables.x }}",
                "title": "Follow up on {{variables.node_create_output.taskId}} ({{environment}})",
                "untouched": 5
            }))
            .unwrap();

        assert_eq!(rendered["count"], json!(1));
        assert_eq!(rendered["title"], json!("Follow up on task-9 (dev)"));
        assert_eq!(rendered["untouched"], json!(5));
    }
}
