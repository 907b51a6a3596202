//! Expression parse and evaluation errors

use thiserror::Error;

use crate::meta_model::{ModelError, ParseAggregateError};

#[derive(Debug, Clone, Error)]
pub enum ExpressionError {
    #[error("Empty expression")]
    Empty,
    #[error("Unexpected character '{found}' at position {position} in expression '{input}'")]
    UnexpectedCharacter {
        input: String,
        position: usize,
        found: char,
    },
    #[error("Unexpected end of expression '{input}'")]
    UnexpectedEnd { input: String },
    #[error("Unterminated string literal in expression '{input}'")]
    UnterminatedString { input: String },
    #[error("Invalid attribute path '{input}': {reason}")]
    InvalidPath { input: String, reason: String },
    #[error("Invalid aggregator in expression '{input}': {source}")]
    InvalidAggregator {
        input: String,
        #[source]
        source: ParseAggregateError,
    },
    #[error("Unknown formula function '{0}'")]
    UnknownFunction(String),
    #[error("Function '{function}' expects {expected} argument(s), got {found}")]
    WrongArity {
        function: String,
        expected: String,
        found: usize,
    },
    #[error("Formula '{function}' failed: {message}")]
    Evaluation { function: String, message: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}
