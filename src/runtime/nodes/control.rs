/// Control-flow executors: trigger, condition, branch and delay

use super::parse_config;
use crate::runtime::condition::{loosely_equal, ConditionSpec};
use crate::runtime::executor::{NodeExecutor, NodeOutput, NodeScope};
use crate::workflow::types::Node;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Entry point of a run; passes straight through
pub struct TriggerExecutor;

#[async_trait]
impl NodeExecutor for TriggerExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        scope.logger.info(format!("🎯 Trigger fired: {}", node.label()));
        Ok(json!({ "triggered": true, "timestamp": Utc::now() }).into())
    }
}

/// Evaluates clauses and selects the `true` or `false` port
///
/// Untagged connections are followed only on `true`.
pub struct ConditionExecutor;

#[async_trait]
impl NodeExecutor for ConditionExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let spec: ConditionSpec = parse_config(node, &node.data)?;
        let result = spec.evaluate(scope.context)?;

        scope.logger.info(format!(
            "🔀 Condition evaluated to {} ({} clause(s), {:?})",
            result,
            spec.conditions.len(),
            spec.logic
        ));

        let port = if result { "true" } else { "false" };
        Ok(NodeOutput::new(json!({
            "result": result,
            "conditionsEvaluated": spec.conditions.len(),
        }))
        .select(port, result))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchConfig {
    field: String,
    #[serde(default)]
    cases: Vec<BranchCase>,
    #[serde(default = "default_port")]
    default_port: String,
}

#[derive(Debug, Deserialize)]
struct BranchCase {
    value: Value,
    port: String,
}

fn default_port() -> String {
    "default".to_string()
}

/// Multi-way switch on a field value; follows only the selected port
pub struct BranchExecutor;

#[async_trait]
impl NodeExecutor for BranchExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let config: BranchConfig = parse_config(node, &node.data)?;
        let value = scope.context.resolve(&config.field)?;

        let mut selected = None;
        for case in &config.cases {
            let expected = scope.context.interpolate(&case.value)?;
            if loosely_equal(&value, &expected) {
                selected = Some(case.port.clone());
                break;
            }
        }
        let port = selected.unwrap_or(config.default_port);

        scope
            .logger
            .info(format!("🔀 Branch on '{}' selected port '{}'", config.field, port));

        Ok(NodeOutput::new(json!({ "branch": port, "value": value })).select(port, false))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DelayUnit {
    #[serde(alias = "second")]
    #[default]
    Seconds,
    #[serde(alias = "minute")]
    Minutes,
    #[serde(alias = "hour")]
    Hours,
    #[serde(alias = "day")]
    Days,
}

impl DelayUnit {
    fn millis(self) -> f64 {
        match self {
            DelayUnit::Seconds => 1_000.0,
            DelayUnit::Minutes => 60_000.0,
            DelayUnit::Hours => 3_600_000.0,
            DelayUnit::Days => 86_400_000.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DelayConfig {
    #[serde(alias = "value")]
    duration: f64,
    #[serde(default)]
    unit: DelayUnit,
}

/// Compute a delay in milliseconds from node data
fn delay_millis(node: &Node) -> Result<u64> {
    let config: DelayConfig = parse_config(node, &node.data)?;
    if !config.duration.is_finite() || config.duration < 0.0 {
        return Err(anyhow!(
            "Delay on node '{}' must be a non-negative number, got {}",
            node.id,
            config.duration
        ));
    }
    Ok((config.duration * config.unit.millis()).round() as u64)
}

/// Suspends its own path for the configured duration
pub struct DelayExecutor;

#[async_trait]
impl NodeExecutor for DelayExecutor {
    async fn execute(&self, node: &Node, scope: &mut NodeScope<'_>) -> Result<NodeOutput> {
        let millis = delay_millis(node)?;
        scope.logger.info(format!("⏰ Delaying for {} ms", millis));

        tokio::time::sleep(Duration::from_millis(millis)).await;

        Ok(json!({ "delayed": true, "durationMs": millis, "resumedAt": Utc::now() }).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::{ContextOverrides, ExecutionContext};
    use crate::runtime::execution::NodeLogger;
    use crate::workflow::graph::Routing;
    use crate::workflow::types::{LoggingConfig, WorkflowDefinition};

    fn node(kind: &str, data: Value) -> Node {
        serde_json::from_value(json!({ "id": "n1", "type": kind, "data": data })).unwrap()
    }

    fn context(variables: Value) -> ExecutionContext {
        let definition: WorkflowDefinition =
            serde_json::from_value(json!({ "id": "wf", "name": "wf", "nodes": [] })).unwrap();
        ExecutionContext::seed(&definition, &variables, &ContextOverrides::default(), "test")
    }

    async fn run(executor: &dyn NodeExecutor, node: &Node, context: &mut ExecutionContext) -> Result<NodeOutput> {
        let mut logger = NodeLogger::new(&node.id, &LoggingConfig::default());
        let mut scope = NodeScope {
            context,
            logger: &mut logger,
            execution_id: "exec-1",
            workflow_id: "wf",
        };
        executor.execute(node, &mut scope).await
    }

    #[tokio::test]
    async fn condition_selects_port() {
        let mut ctx = context(json!({ "priority": "high" }));
        let condition = node(
            "condition",
            json!({ "conditions": [{ "field": "variables.priority", "operator": "equals", "value": "high" }] }),
        );
        let output = run(&ConditionExecutor, &condition, &mut ctx).await.unwrap();
        assert_eq!(output.value, json!({ "result": true, "conditionsEvaluated": 1 }));
        assert_eq!(output.routing, Routing::Selected { port: "true".into(), include_untagged: true });

        let mut ctx = context(json!({ "priority": "low" }));
        let output = run(&ConditionExecutor, &condition, &mut ctx).await.unwrap();
        assert_eq!(output.routing, Routing::Selected { port: "false".into(), include_untagged: false });
    }

    #[tokio::test]
    async fn branch_matches_case_or_default() {
        let branch = node(
            "branch",
            json!({
                "field": "variables.tier",
                "cases": [{ "value": 1, "port": "gold" }, { "value": 2, "port": "silver" }]
            }),
        );

        let mut ctx = context(json!({ "tier": 2.0 }));
        let output = run(&BranchExecutor, &branch, &mut ctx).await.unwrap();
        assert_eq!(output.value["branch"], json!("silver"));
        assert_eq!(output.routing, Routing::Selected { port: "silver".into(), include_untagged: false });

        let mut ctx = context(json!({ "tier": 9 }));
        let output = run(&BranchExecutor, &branch, &mut ctx).await.unwrap();
        assert_eq!(output.value["branch"], json!("default"));
    }

    #[test]
    fn delay_units() {
        assert_eq!(delay_millis(&node("delay", json!({ "duration": 2, "unit": "minutes" }))).unwrap(), 120_000);
        assert_eq!(delay_millis(&node("delay", json!({ "value": 1.5 }))).unwrap(), 1_500);
        assert_eq!(delay_millis(&node("delay", json!({ "duration": 1, "unit": "days" }))).unwrap(), 86_400_000);
        assert!(delay_millis(&node("delay", json!({ "duration": -1 }))).is_err());
        assert!(delay_millis(&node("delay", json!({ "unit": "hours" }))).is_err());
        assert!(delay_millis(&node("delay", json!({ "duration": 1, "unit": "weeks" }))).is_err());
    }

    #[tokio::test]
    async fn trigger_passes_through() {
        let mut ctx = context(Value::Null);
        let output = run(&TriggerExecutor, &node("trigger", Value::Null), &mut ctx).await.unwrap();
        assert_eq!(output.value["triggered"], json!(true));
        assert_eq!(output.routing, Routing::All);
    }
}
