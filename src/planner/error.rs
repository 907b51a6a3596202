//! Planner errors

use thiserror::Error;

use crate::meta_model::ModelError;
use crate::sheet::SheetError;
use crate::source::{DataSourceError, TransactionError};

/// Errors raised while turning a data sheet into native queries
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("Reading '{expression}' from '{object}' needs more than {max} nested subsheets")]
    RelationDepthExceeded {
        object: String,
        expression: String,
        max: usize,
    },
    #[error("Column '{expression}' of '{object}' reads a one-to-many relation and needs an aggregator")]
    ReverseRelationRequiresAggregator { object: String, expression: String },
    #[error("Attribute '{attribute}' of '{object}' is not readable")]
    UnreadableAttribute { object: String, attribute: String },
    #[error("Cannot plan '{expression}' on '{object}': {reason}")]
    Unsupported {
        object: String,
        expression: String,
        reason: String,
    },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised while reading a data sheet
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("No data source '{data_source}' registered (needed by '{object}')")]
    DataSourceNotRegistered { object: String, data_source: String },
    #[error("Reading '{object}' failed: {source}")]
    DataSource {
        object: String,
        #[source]
        source: DataSourceError,
    },
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}
