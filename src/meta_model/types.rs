//! Data type and aggregate function definitions for the meta model

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::value::Value;

/// Logical data types of meta attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataType {
    /// Variable-length text
    #[default]
    String,
    /// 64-bit signed integer
    Integer,
    /// Floating point number
    Number,
    /// Boolean
    Boolean,
    /// Calendar date, stored as `YYYY-MM-DD`
    Date,
    /// Date and time, stored as `YYYY-MM-DD HH:MM:SS`
    Timestamp,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => write!(f, "string"),
            DataType::Integer => write!(f, "integer"),
            DataType::Number => write!(f, "number"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::Date => write!(f, "date"),
            DataType::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Error when parsing a data type string
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid data type '{input}': unknown type")]
pub struct ParseDataTypeError {
    pub input: String,
}

impl FromStr for DataType {
    type Err = ParseDataTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "text" | "varchar" => Ok(DataType::String),
            "integer" | "int" | "i64" | "long" => Ok(DataType::Integer),
            "number" | "float" | "double" | "f64" | "decimal" => Ok(DataType::Number),
            "boolean" | "bool" => Ok(DataType::Boolean),
            "date" => Ok(DataType::Date),
            "timestamp" | "datetime" => Ok(DataType::Timestamp),
            _ => Err(ParseDataTypeError { input: s.to_string() }),
        }
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DataType::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for DataType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Number)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Timestamp)
    }

    /// Convert a value into the canonical representation of this type.
    ///
    /// Null passes through unchanged. Returns a message describing the
    /// mismatch when the value cannot be represented.
    pub fn cast(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            DataType::String => Ok(Value::String(value.to_text())),
            DataType::Integer => match value {
                Value::Bool(b) => Ok(Value::Int(*b as i64)),
                other => other
                    .as_i64()
                    .map(Value::Int)
                    .ok_or_else(|| format!("'{}' is not an integer", other)),
            },
            DataType::Number => match value {
                Value::Int(i) => Ok(Value::Int(*i)),
                other => other
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| format!("'{}' is not a number", other)),
            },
            DataType::Boolean => value
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| format!("'{}' is not a boolean", value)),
            DataType::Date => parse_temporal(&value.to_text())
                .map(|dt| Value::String(dt.date().format(DATE_FORMAT).to_string()))
                .ok_or_else(|| format!("'{}' is not a date", value)),
            DataType::Timestamp => parse_temporal(&value.to_text())
                .map(|dt| Value::String(dt.format(TIMESTAMP_FORMAT).to_string()))
                .ok_or_else(|| format!("'{}' is not a timestamp", value)),
        }
    }
}

fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Some(dt);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ============================================================================
// AggregateFunction
// ============================================================================

/// Aggregate functions usable as expression suffixes (`AMOUNT:SUM`), sheet
/// aggregations and column totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Count,
    CountDistinct,
    Min,
    Max,
    /// Comma separated list of all values
    List,
    /// Comma separated list of distinct values
    ListDistinct,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Avg => write!(f, "AVG"),
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::CountDistinct => write!(f, "COUNT_DISTINCT"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
            AggregateFunction::List => write!(f, "LIST"),
            AggregateFunction::ListDistinct => write!(f, "LIST_DISTINCT"),
        }
    }
}

/// Error when parsing an aggregate function string
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown aggregate function '{input}'. Valid options: SUM, AVG, COUNT, COUNT_DISTINCT, MIN, MAX, LIST, LIST_DISTINCT")]
pub struct ParseAggregateError {
    pub input: String,
}

impl FromStr for AggregateFunction {
    type Err = ParseAggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(AggregateFunction::Sum),
            "avg" | "average" => Ok(AggregateFunction::Avg),
            "count" => Ok(AggregateFunction::Count),
            "count_distinct" | "countdistinct" => Ok(AggregateFunction::CountDistinct),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            "list" => Ok(AggregateFunction::List),
            "list_distinct" | "listdistinct" => Ok(AggregateFunction::ListDistinct),
            _ => Err(ParseAggregateError { input: s.to_string() }),
        }
    }
}

impl<'de> Deserialize<'de> for AggregateFunction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        AggregateFunction::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for AggregateFunction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl AggregateFunction {
    /// Aggregate a set of values. Nulls are ignored; an empty input yields
    /// null for every function except the counts, which yield zero.
    pub fn apply(&self, values: &[Value]) -> Value {
        let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
        match self {
            AggregateFunction::Count => Value::Int(present.len() as i64),
            AggregateFunction::CountDistinct => {
                let distinct: HashSet<String> = present.iter().filter_map(|v| v.join_key()).collect();
                Value::Int(distinct.len() as i64)
            }
            AggregateFunction::Sum => {
                if present.is_empty() {
                    return Value::Null;
                }
                let exact = present.iter().try_fold(0i64, |acc, v| match v {
                    Value::Int(i) => acc.checked_add(*i),
                    _ => None,
                });
                match exact {
                    Some(total) => Value::Int(total),
                    // Mixed types or overflow
                    None => Value::Float(present.iter().filter_map(|v| v.as_f64()).sum()),
                }
            }
            AggregateFunction::Avg => {
                let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
                if numbers.is_empty() {
                    Value::Null
                } else {
                    Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            AggregateFunction::Min => present
                .iter()
                .min_by(|a, b| a.compare(b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
            AggregateFunction::Max => present
                .iter()
                .max_by(|a, b| a.compare(b))
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null),
            AggregateFunction::List => {
                if present.is_empty() {
                    return Value::Null;
                }
                let parts: Vec<String> = present.iter().map(|v| v.to_text()).collect();
                Value::String(parts.join(", "))
            }
            AggregateFunction::ListDistinct => {
                if present.is_empty() {
                    return Value::Null;
                }
                let mut seen = HashSet::new();
                let parts: Vec<String> = present
                    .iter()
                    .map(|v| v.to_text())
                    .filter(|s| seen.insert(s.clone()))
                    .collect();
                Value::String(parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_types() {
        assert_eq!("string".parse::<DataType>().unwrap(), DataType::String);
        assert_eq!("INT".parse::<DataType>().unwrap(), DataType::Integer);
        assert_eq!("double".parse::<DataType>().unwrap(), DataType::Number);
        assert_eq!("datetime".parse::<DataType>().unwrap(), DataType::Timestamp);
        assert!("blob".parse::<DataType>().is_err());
    }

    #[test]
    fn test_cast() {
        assert_eq!(DataType::Integer.cast(&Value::from("42")).unwrap(), Value::Int(42));
        assert!(DataType::Integer.cast(&Value::from("4.2")).is_err());
        assert_eq!(DataType::Number.cast(&Value::from("4.5")).unwrap(), Value::Float(4.5));
        assert_eq!(DataType::Boolean.cast(&Value::from("yes")).unwrap(), Value::Bool(true));
        assert_eq!(
            DataType::Date.cast(&Value::from("2024-03-01 10:15:00")).unwrap(),
            Value::from("2024-03-01")
        );
        assert_eq!(
            DataType::Timestamp.cast(&Value::from("2024-03-01")).unwrap(),
            Value::from("2024-03-01 00:00:00")
        );
        assert!(DataType::Date.cast(&Value::from("yesterday")).is_err());
        assert_eq!(DataType::Integer.cast(&Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_aggregate_functions() {
        assert_eq!("sum".parse::<AggregateFunction>().unwrap(), AggregateFunction::Sum);
        assert_eq!("LIST_DISTINCT".parse::<AggregateFunction>().unwrap(), AggregateFunction::ListDistinct);
        assert!("median".parse::<AggregateFunction>().is_err());
    }

    #[test]
    fn test_apply_aggregates() {
        let values = vec![Value::Int(2), Value::Null, Value::Int(5), Value::Int(2)];
        assert_eq!(AggregateFunction::Sum.apply(&values), Value::Int(9));
        assert_eq!(AggregateFunction::Count.apply(&values), Value::Int(3));
        assert_eq!(AggregateFunction::CountDistinct.apply(&values), Value::Int(2));
        assert_eq!(AggregateFunction::Avg.apply(&values), Value::Float(3.0));
        assert_eq!(AggregateFunction::Min.apply(&values), Value::Int(2));
        assert_eq!(AggregateFunction::Max.apply(&values), Value::Int(5));
        assert_eq!(AggregateFunction::ListDistinct.apply(&values), Value::from("2, 5"));
        assert_eq!(AggregateFunction::Sum.apply(&[]), Value::Null);
        assert_eq!(AggregateFunction::Count.apply(&[]), Value::Int(0));
    }

    #[test]
    fn test_sum_mixed_numbers_is_float() {
        let values = vec![Value::Int(1), Value::Float(0.5)];
        assert_eq!(AggregateFunction::Sum.apply(&values), Value::Float(1.5));
    }

    #[test]
    fn test_sum_overflow_falls_back_to_float() {
        let values = vec![Value::Int(i64::MAX), Value::Int(1)];
        assert_eq!(AggregateFunction::Sum.apply(&values), Value::Float(i64::MAX as f64 + 1.0));
        let values = vec![Value::Int(i64::MIN), Value::Int(-1)];
        assert_eq!(AggregateFunction::Sum.apply(&values), Value::Float(i64::MIN as f64 - 1.0));
    }
}
