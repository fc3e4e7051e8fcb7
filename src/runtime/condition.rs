/// Condition evaluation for condition and branch nodes
///
/// A condition is an ordered list of `(field, operator, value)` clauses joined
/// with AND or OR. Fields are dotted paths into the execution context.

use crate::runtime::context::ExecutionContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison applied by one clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    /// Substring test; false unless both sides are strings
    Contains,
    /// Numeric only; false unless both sides are numbers
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicOperator {
    #[default]
    #[serde(alias = "AND")]
    And,
    #[serde(alias = "OR")]
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionClause {
    pub field: String,
    pub operator: ComparisonOperator,
    #[serde(default)]
    pub value: Value,
}

/// Condition node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionSpec {
    #[serde(default)]
    pub conditions: Vec<ConditionClause>,
    #[serde(default)]
    pub logic: LogicOperator,
}

impl ConditionSpec {
    /// Evaluate every clause against the context and combine the results
    ///
    /// An empty clause list is true under AND and false under OR.
    pub fn evaluate(&self, context: &ExecutionContext) -> Result<bool> {
        let mut outcomes = Vec::with_capacity(self.conditions.len());
        for clause in &self.conditions {
            outcomes.push(clause.evaluate(context)?);
        }

        Ok(match self.logic {
            LogicOperator::And => outcomes.iter().all(|outcome| *outcome),
            LogicOperator::Or => outcomes.iter().any(|outcome| *outcome),
        })
    }
}

impl ConditionClause {
    pub fn evaluate(&self, context: &ExecutionContext) -> Result<bool> {
        let actual = context.resolve(&self.field)?;
        let expected = context.interpolate(&self.value)?;
        Ok(compare(self.operator, &actual, &expected))
    }
}

/// Apply an operator to two values
pub fn compare(operator: ComparisonOperator, actual: &Value, expected: &Value) -> bool {
    match operator {
        ComparisonOperator::Equals => loosely_equal(actual, expected),
        ComparisonOperator::NotEquals => !loosely_equal(actual, expected),
        ComparisonOperator::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            _ => false,
        },
        ComparisonOperator::GreaterThan => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) if actual.is_number() && expected.is_number() => a > b,
            _ => false,
        },
        ComparisonOperator::LessThan => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) if actual.is_number() && expected.is_number() => a < b,
            _ => false,
        },
    }
}

/// Equality that treats `3` and `3.0` as the same number
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => false,
    }
}
