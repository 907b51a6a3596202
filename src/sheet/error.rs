//! Data sheet errors

use thiserror::Error;

use crate::expression::ExpressionError;

#[derive(Debug, Clone, Error)]
pub enum SheetError {
    #[error("Column '{column}' not found in data sheet of '{sheet}'")]
    ColumnNotFound { sheet: String, column: String },
    #[error("Column '{column}' already exists in data sheet of '{sheet}'")]
    DuplicateColumn { sheet: String, column: String },
    #[error("Cannot add a total to column '{column}': '{expression}' is not bound to an attribute")]
    TotalRequiresAttribute { column: String, expression: String },
    #[error("Row {row} out of range in data sheet of '{sheet}' ({rows} rows)")]
    RowOutOfRange { sheet: String, row: usize, rows: usize },
    #[error("Cannot filter rows of '{sheet}': '{expression}' is not a column of the sheet")]
    ConditionColumnMissing { sheet: String, expression: String },
    #[error("Cannot sort rows of '{sheet}': '{expression}' is not a column of the sheet")]
    SortColumnMissing { sheet: String, expression: String },
    #[error("Invalid sort direction '{0}'. Valid options: ASC, DESC")]
    InvalidSortDirection(String),
    #[error("Data sheet of '{sheet}' has no UID column")]
    UidColumnMissing { sheet: String },
    #[error("Formula of column '{column}' in data sheet of '{sheet}' failed: {source}")]
    Formula {
        sheet: String,
        column: String,
        #[source]
        source: ExpressionError,
    },
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}
