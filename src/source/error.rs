//! Data source and transaction errors

use thiserror::Error;

use crate::meta_model::ModelError;

/// Errors raised by a data source while executing a native query
#[derive(Debug, Clone, Error)]
pub enum DataSourceError {
    #[error("Data source '{data_source}' failed: {message}")]
    Query { data_source: String, message: String },
    #[error("Data source '{data_source}' does not hold object '{object}'")]
    UnknownObject { data_source: String, object: String },
    #[error("Object '{object}' has no attribute '{attribute}'")]
    UnknownAttribute { object: String, attribute: String },
    #[error("Query on '{object}' mixes aggregated and unaggregated attributes ('{attribute}' is neither grouped nor aggregated)")]
    MixedAggregation { object: String, attribute: String },
    #[error("Data source '{data_source}' cannot follow relation '{relation}' into data source '{target}'")]
    CrossSourceRelation {
        data_source: String,
        relation: String,
        target: String,
    },
    #[error("Injected {operation} failure on '{object}'")]
    Injected { operation: String, object: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors of the transaction protocol
#[derive(Debug, Clone, Error)]
pub enum TransactionError {
    #[error("Transaction {0} is already committed or rolled back")]
    Closed(String),
    #[error("Cannot connect to data source '{data_source}': {source}")]
    Connect {
        data_source: String,
        #[source]
        source: DataSourceError,
    },
    #[error("Data source '{data_source}' refused to prepare the commit: {source}")]
    Prepare {
        data_source: String,
        #[source]
        source: DataSourceError,
    },
    #[error("Commit failed on data source '{data_source}': {source}")]
    Commit {
        data_source: String,
        #[source]
        source: DataSourceError,
    },
    #[error("Rollback failed on data source '{data_source}': {source}")]
    Rollback {
        data_source: String,
        #[source]
        source: DataSourceError,
    },
}
