//! Cell values
//!
//! A closed set of scalar values stored in data sheet rows, passed to native
//! queries and produced by formulas.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null or an empty string
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the value. Strings are parsed when they hold a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(_) | Value::Null => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text representation used for string functions and list aggregations.
    /// Null renders as an empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Normalized key used to match values across sheets (joins, UID lookups).
    ///
    /// Integers, integral floats and numeric strings that look the same map to
    /// the same key, so a string foreign key `"7"` matches an integer UID `7`.
    pub fn join_key(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some((*f as i64).to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
        }
    }

    /// Equality across representations: numbers compare numerically, everything
    /// else by join key.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Int(_) | Value::Float(_), _) | (_, Value::Int(_) | Value::Float(_)) => {
                match (self.as_f64(), other.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => self.join_key() == other.join_key(),
                }
            }
            _ => self.join_key() == other.join_key(),
        }
    }

    /// Ordering used by sorters and comparators. Nulls sort first; numbers
    /// compare numerically when both sides are numeric.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) if !matches!((self, other), (Value::String(_), Value::String(_))) => {
                    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
                }
                _ => self.to_text().cmp(&other.to_text()),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_key_normalizes_numbers() {
        assert_eq!(Value::Int(7).join_key(), Some("7".to_string()));
        assert_eq!(Value::Float(7.0).join_key(), Some("7".to_string()));
        assert_eq!(Value::from("7").join_key(), Some("7".to_string()));
        assert_eq!(Value::Null.join_key(), None);
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Int(3).loosely_equals(&Value::from("3")));
        assert!(Value::Float(2.5).loosely_equals(&Value::Float(2.5)));
        assert!(!Value::from("a").loosely_equals(&Value::from("b")));
        assert!(!Value::Null.loosely_equals(&Value::Int(0)));
        assert!(Value::Null.loosely_equals(&Value::Null));
    }

    #[test]
    fn test_compare_numbers_and_strings() {
        assert_eq!(Value::Int(2).compare(&Value::Float(10.0)), Ordering::Less);
        assert_eq!(Value::from("b").compare(&Value::from("a")), Ordering::Greater);
        // Numeric strings compare as text so "10" < "9"
        assert_eq!(Value::from("10").compare(&Value::from("9")), Ordering::Less);
        assert_eq!(Value::Null.compare(&Value::Int(0)), Ordering::Less);
    }

    #[test]
    fn test_serde_untagged() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![Value::Null, Value::Bool(true), Value::Int(3), Value::Float(1.5), Value::from("x")]
        );
        assert_eq!(serde_json::to_string(&values).unwrap(), r#"[null,true,3,1.5,"x"]"#);
    }
}
