//! Write errors

use thiserror::Error;

use crate::expression::ExpressionError;
use crate::meta_model::ModelError;
use crate::planner::ReadError;
use crate::sheet::SheetError;
use crate::source::{DataSourceError, TransactionError};

#[derive(Debug, Clone, Error)]
pub enum WriteError {
    #[error("Refusing to delete from '{object}': the data sheet has neither filters nor UID values")]
    UnfilteredDelete { object: String },
    #[error("Refusing to update '{object}' without UID column: the data sheet has no filters")]
    UnfilteredUpdate { object: String },
    #[error("Refusing to replace '{object}' with deletion of redundant rows: the data sheet has no filters")]
    UnfilteredReplace { object: String },
    #[error("Cannot update '{object}' without UID column: column '{column}' holds different values")]
    AmbiguousBroadcast { object: String, column: String },
    #[error("Required attribute '{attribute}' of '{object}' has no value in row {row}")]
    RequiredValueMissing {
        object: String,
        attribute: String,
        row: usize,
    },
    #[error("Invalid value in column '{column}' of '{object}', row {row}: {message}")]
    InvalidValue {
        object: String,
        column: String,
        row: usize,
        message: String,
    },
    #[error("Cascading delete from '{object}' exceeds {max} levels")]
    CascadeDepthExceeded { object: String, max: usize },
    #[error("{operation} on '{object}' failed: {source}")]
    DataSource {
        operation: &'static str,
        object: String,
        #[source]
        source: DataSourceError,
    },
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl WriteError {
    /// Raised by a data source (or the transaction protocol) rather than by
    /// checks the engine ran before sending anything
    pub fn is_data_source_error(&self) -> bool {
        matches!(
            self,
            WriteError::DataSource { .. }
                | WriteError::Transaction(_)
                | WriteError::Read(ReadError::DataSource { .. })
                | WriteError::Read(ReadError::Transaction(_))
        )
    }
}
