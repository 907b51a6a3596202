//! Sorters and aggregators of a data sheet

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::SheetError;
use crate::expression::{Expression, RelationPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASC" | "ASCENDING" => Ok(SortDirection::Asc),
            "DESC" | "DESCENDING" => Ok(SortDirection::Desc),
            _ => Err(SheetError::InvalidSortDirection(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        SortDirection::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for SortDirection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Sort by an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sorter {
    pub expression: Expression,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Sorter {
    pub fn new(expression: Expression, direction: SortDirection) -> Self {
        Self { expression, direction }
    }

    pub fn asc(expression: Expression) -> Self {
        Self::new(expression, SortDirection::Asc)
    }

    pub fn desc(expression: Expression) -> Self {
        Self::new(expression, SortDirection::Desc)
    }

    pub fn rebase(&self, prefix: &RelationPath) -> Self {
        Self::new(self.expression.rebase(prefix), self.direction)
    }
}

/// Group rows by an attribute. A sheet with aggregators is read aggregated:
/// every other column must carry an aggregate function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregator {
    pub expression: Expression,
}

impl Aggregator {
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }
}
