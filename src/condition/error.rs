//! Condition parsing errors

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConditionError {
    #[error("Invalid comparator '{0}'. Valid options: =, !=, ==, !==, <, <=, >, >=, [, ![")]
    InvalidComparator(String),
    #[error("Invalid logical operator '{0}'. Valid options: AND, OR, XOR")]
    InvalidOperator(String),
    #[error("Comparator '{comparator}' needs a list value")]
    ListRequired { comparator: String },
}
