//! A single filter condition

use serde::{Deserialize, Serialize};
use std::fmt;

use super::comparator::Comparator;
use crate::expression::{Expression, RelationPath};
use crate::value::Value;

/// Right hand side of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Single(Value),
    List(Vec<Value>),
}

impl From<Value> for ConditionValue {
    fn from(v: Value) -> Self {
        ConditionValue::Single(v)
    }
}

impl From<&str> for ConditionValue {
    fn from(v: &str) -> Self {
        ConditionValue::Single(Value::from(v))
    }
}

impl From<Vec<Value>> for ConditionValue {
    fn from(v: Vec<Value>) -> Self {
        ConditionValue::List(v)
    }
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionValue::Single(v) => write!(f, "{}", v),
            ConditionValue::List(values) => {
                let parts: Vec<String> = values.iter().map(Value::to_text).collect();
                write!(f, "{}", parts.join(","))
            }
        }
    }
}

/// `expression comparator value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub expression: Expression,
    pub comparator: Comparator,
    #[serde(default = "null_value")]
    pub value: ConditionValue,
}

fn null_value() -> ConditionValue {
    ConditionValue::Single(Value::Null)
}

impl Condition {
    pub fn new(expression: Expression, comparator: Comparator, value: impl Into<ConditionValue>) -> Self {
        Self {
            expression,
            comparator,
            value: value.into(),
        }
    }

    /// `expression [ values`
    pub fn in_list(expression: Expression, values: Vec<Value>) -> Self {
        Self::new(expression, Comparator::In, ConditionValue::List(values))
    }

    /// Operands of the condition. A single text operand of a list comparator
    /// is split on commas.
    pub fn operands(&self) -> Vec<Value> {
        match &self.value {
            ConditionValue::List(values) => values.clone(),
            ConditionValue::Single(Value::String(s)) if self.comparator.is_list() => s
                .split(',')
                .map(|part| Value::from(part.trim()))
                .filter(|v| !v.is_empty())
                .collect(),
            ConditionValue::Single(v) => vec![v.clone()],
        }
    }

    /// Test a row value against this condition
    pub fn matches(&self, left: &Value) -> bool {
        match &self.value {
            ConditionValue::Single(right) if !self.comparator.is_list() => self.comparator.compare(left, right),
            _ => self.comparator.compare_list(left, &self.operands()),
        }
    }

    pub fn rebase(&self, prefix: &RelationPath) -> Self {
        Self {
            expression: self.expression.rebase(prefix),
            comparator: self.comparator,
            value: self.value.clone(),
        }
    }

    pub fn strip_prefix(&self, prefix: &RelationPath) -> Option<Self> {
        Some(Self {
            expression: self.expression.strip_prefix(prefix)?,
            comparator: self.comparator,
            value: self.value.clone(),
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.expression, self.comparator, self.value)
    }
}
