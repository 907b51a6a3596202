//! Comparison operators

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::ConditionError;
use crate::value::Value;

/// How a condition compares an expression value with its operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `=`: case-insensitive containment for text, equality otherwise.
    /// A null or empty operand matches empty values.
    Is,
    /// `!=`
    IsNot,
    /// `==`: exact equality
    Equals,
    /// `!==`
    EqualsNot,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
    /// `[`: value is one of a list
    In,
    /// `![`
    NotIn,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Is => "=",
            Comparator::IsNot => "!=",
            Comparator::Equals => "==",
            Comparator::EqualsNot => "!==",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEquals => "<=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEquals => ">=",
            Comparator::In => "[",
            Comparator::NotIn => "![",
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Comparator::In | Comparator::NotIn)
    }

    /// Comparators that pin an attribute to exactly the operand
    pub fn is_equality(&self) -> bool {
        matches!(self, Comparator::Is | Comparator::Equals | Comparator::In)
    }

    /// Compare `left` (the row value) with a single operand
    pub fn compare(&self, left: &Value, right: &Value) -> bool {
        match self {
            Comparator::Is => is(left, right),
            Comparator::IsNot => !is(left, right),
            Comparator::Equals => left.loosely_equals(right),
            Comparator::EqualsNot => !left.loosely_equals(right),
            Comparator::In => left.loosely_equals(right),
            Comparator::NotIn => !left.loosely_equals(right),
            Comparator::LessThan => ordered(left, right, |o| o == Ordering::Less),
            Comparator::LessThanOrEquals => ordered(left, right, |o| o != Ordering::Greater),
            Comparator::GreaterThan => ordered(left, right, |o| o == Ordering::Greater),
            Comparator::GreaterThanOrEquals => ordered(left, right, |o| o != Ordering::Less),
        }
    }

    /// Compare `left` with a list of operands
    pub fn compare_list(&self, left: &Value, list: &[Value]) -> bool {
        match self {
            Comparator::NotIn | Comparator::IsNot | Comparator::EqualsNot => {
                !list.iter().any(|v| left.loosely_equals(v))
            }
            _ => list.iter().any(|v| self.compare(left, v)),
        }
    }
}

fn is(left: &Value, right: &Value) -> bool {
    if right.is_empty() {
        return left.is_empty();
    }
    match (left, right) {
        (Value::String(l), Value::String(r)) => l.to_lowercase().contains(&r.to_lowercase()),
        _ => left.loosely_equals(right),
    }
}

fn ordered(left: &Value, right: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    accept(left.compare(right))
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl FromStr for Comparator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(Comparator::Is),
            "!=" => Ok(Comparator::IsNot),
            "==" => Ok(Comparator::Equals),
            "!==" => Ok(Comparator::EqualsNot),
            "<" => Ok(Comparator::LessThan),
            "<=" => Ok(Comparator::LessThanOrEquals),
            ">" => Ok(Comparator::GreaterThan),
            ">=" => Ok(Comparator::GreaterThanOrEquals),
            "[" => Ok(Comparator::In),
            "![" => Ok(Comparator::NotIn),
            other => Err(ConditionError::InvalidComparator(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Comparator {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Comparator::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Comparator {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.symbol())
    }
}
