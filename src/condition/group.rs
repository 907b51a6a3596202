//! Condition groups: boolean filter trees

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::comparator::Comparator;
use super::condition::{Condition, ConditionValue};
use super::error::ConditionError;
use crate::expression::{AttributePath, Expression, RelationPath};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
    /// True when an odd number of operands is true
    Xor,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
            LogicalOperator::Xor => write!(f, "XOR"),
        }
    }
}

impl FromStr for LogicalOperator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AND" => Ok(LogicalOperator::And),
            "OR" => Ok(LogicalOperator::Or),
            "XOR" => Ok(LogicalOperator::Xor),
            _ => Err(ConditionError::InvalidOperator(s.to_string())),
        }
    }
}

/// A logical operator applied to conditions and nested groups
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub operator: LogicalOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, rename = "nested_groups", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ConditionGroup>,
}

impl ConditionGroup {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            operator,
            conditions: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn and() -> Self {
        Self::new(LogicalOperator::And)
    }

    pub fn or() -> Self {
        Self::new(LogicalOperator::Or)
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.add_group(group);
        self
    }

    pub fn add_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    /// Add a nested group. Empty groups are dropped.
    pub fn add_group(&mut self, group: ConditionGroup) {
        if !group.is_empty() {
            self.groups.push(group);
        }
    }

    /// True if no condition exists anywhere in the tree
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.iter().all(ConditionGroup::is_empty)
    }

    /// Evaluate the tree, testing each condition with `test`.
    /// An empty group matches everything.
    pub fn evaluate<E, F>(&self, test: &mut F) -> Result<bool, E>
    where
        F: FnMut(&Condition) -> Result<bool, E>,
    {
        let mut results = Vec::with_capacity(self.conditions.len() + self.groups.len());
        for condition in &self.conditions {
            results.push(test(condition)?);
        }
        for group in self.groups.iter().filter(|g| !g.is_empty()) {
            results.push(group.evaluate(test)?);
        }
        if results.is_empty() {
            return Ok(true);
        }
        Ok(match self.operator {
            LogicalOperator::And => results.iter().all(|r| *r),
            LogicalOperator::Or => results.iter().any(|r| *r),
            LogicalOperator::Xor => results.iter().filter(|r| **r).count() % 2 == 1,
        })
    }

    /// Every condition in the tree, depth first
    pub fn all_conditions(&self) -> Vec<&Condition> {
        let mut out: Vec<&Condition> = self.conditions.iter().collect();
        for group in &self.groups {
            out.extend(group.all_conditions());
        }
        out
    }

    /// Distinct left hand expressions of all conditions
    pub fn expressions(&self) -> Vec<Expression> {
        let mut out: Vec<Expression> = Vec::new();
        for condition in self.all_conditions() {
            if !condition.expression.is_constant() && !out.contains(&condition.expression) {
                out.push(condition.expression.clone());
            }
        }
        out
    }

    /// Distinct attribute and aggregate expressions the tree reads
    pub fn required_attributes(&self) -> Vec<Expression> {
        let mut out: Vec<Expression> = Vec::new();
        for condition in self.all_conditions() {
            for required in condition.expression.required_attributes() {
                if !out.contains(&required) {
                    out.push(required);
                }
            }
        }
        out
    }

    /// The tree as seen from an object `prefix` hops up the relation graph
    pub fn rebase(&self, prefix: &RelationPath) -> Self {
        Self {
            operator: self.operator,
            conditions: self.conditions.iter().map(|c| c.rebase(prefix)).collect(),
            groups: self.groups.iter().map(|g| g.rebase(prefix)).collect(),
        }
    }

    /// The tree relative to the object behind `prefix`, if every condition lives there
    pub fn strip_prefix(&self, prefix: &RelationPath) -> Option<Self> {
        let mut conditions = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            conditions.push(condition.strip_prefix(prefix)?);
        }
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            groups.push(group.strip_prefix(prefix)?);
        }
        Some(Self {
            operator: self.operator,
            conditions,
            groups,
        })
    }

    /// The value an attribute is pinned to by a top level equality condition
    /// of an AND group, if any
    pub fn find_equals(&self, path: &AttributePath) -> Option<Value> {
        if self.operator != LogicalOperator::And {
            return None;
        }
        self.conditions.iter().find_map(|c| {
            if c.expression.attribute_path() != Some(path) || c.expression.is_aggregate() {
                return None;
            }
            if !c.comparator.is_equality() {
                return None;
            }
            match (&c.value, c.comparator) {
                (ConditionValue::Single(v), Comparator::Is | Comparator::Equals) if !v.is_empty() => Some(v.clone()),
                _ => match c.operands().as_slice() {
                    [single] if c.comparator == Comparator::In => Some(single.clone()),
                    _ => None,
                },
            }
        })
    }
}

impl fmt::Display for ConditionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
        parts.extend(self.groups.iter().map(|g| g.to_string()));
        write!(f, "({})", parts.join(&format!(" {} ", self.operator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(expr: &str, comparator: Comparator, value: impl Into<ConditionValue>) -> Condition {
        Condition::new(Expression::parse(expr).unwrap(), comparator, value)
    }

    fn eval(group: &ConditionGroup, status: &str, amount: i64) -> bool {
        group
            .evaluate(&mut |c: &Condition| -> Result<bool, ()> {
                let value = match c.expression.to_string().as_str() {
                    "STATUS" => Value::from(status),
                    "AMOUNT" => Value::Int(amount),
                    _ => Value::Null,
                };
                Ok(c.matches(&value))
            })
            .unwrap()
    }

    #[test]
    fn test_nested_evaluation() {
        let group = ConditionGroup::and()
            .with_condition(cond("STATUS", Comparator::Equals, "open"))
            .with_group(
                ConditionGroup::or()
                    .with_condition(cond("AMOUNT", Comparator::GreaterThan, Value::Int(100)))
                    .with_condition(cond("AMOUNT", Comparator::LessThan, Value::Int(0))),
            );
        assert!(eval(&group, "open", 150));
        assert!(eval(&group, "open", -5));
        assert!(!eval(&group, "open", 50));
        assert!(!eval(&group, "closed", 150));
    }

    #[test]
    fn test_xor_and_empty() {
        let group = ConditionGroup::new(LogicalOperator::Xor)
            .with_condition(cond("STATUS", Comparator::Equals, "open"))
            .with_condition(cond("AMOUNT", Comparator::GreaterThan, Value::Int(100)));
        assert!(eval(&group, "open", 1));
        assert!(!eval(&group, "open", 500));
        assert!(eval(&ConditionGroup::or(), "x", 0));
        assert!(ConditionGroup::and().with_group(ConditionGroup::or()).is_empty());
    }

    #[test]
    fn test_rebase_and_required() {
        let group = ConditionGroup::and()
            .with_condition(cond("NAME", Comparator::Is, "acme"))
            .with_group(ConditionGroup::or().with_condition(cond("COUNTRY__CODE", Comparator::Equals, "DE")));
        let prefix = RelationPath::single("CUSTOMER");
        let rebased = group.rebase(&prefix);
        assert_eq!(
            rebased.required_attributes(),
            vec![
                Expression::parse("CUSTOMER__NAME").unwrap(),
                Expression::parse("CUSTOMER__COUNTRY__CODE").unwrap()
            ]
        );
        assert_eq!(rebased.strip_prefix(&prefix), Some(group));
    }

    #[test]
    fn test_find_equals() {
        let group = ConditionGroup::and()
            .with_condition(cond("STATUS", Comparator::Equals, "open"))
            .with_condition(Condition::in_list(Expression::parse("TYPE").unwrap(), vec![Value::from("A")]))
            .with_condition(cond("AMOUNT", Comparator::GreaterThan, Value::Int(1)));
        assert_eq!(group.find_equals(&AttributePath::new("STATUS")), Some(Value::from("open")));
        assert_eq!(group.find_equals(&AttributePath::new("TYPE")), Some(Value::from("A")));
        assert_eq!(group.find_equals(&AttributePath::new("AMOUNT")), None);
    }

    #[test]
    fn test_serde_document() {
        let json = r#"{
            "operator": "OR",
            "conditions": [{"expression": "STATUS", "comparator": "==", "value": "open"}],
            "nested_groups": [{"operator": "AND", "conditions": [{"expression": "UID", "comparator": "[", "value": [1, 2]}]}]
        }"#;
        let group: ConditionGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.operator, LogicalOperator::Or);
        assert_eq!(group.groups[0].conditions[0].operands(), vec![Value::Int(1), Value::Int(2)]);
        let back: ConditionGroup = serde_json::from_str(&serde_json::to_string(&group).unwrap()).unwrap();
        assert_eq!(back, group);
    }
}
