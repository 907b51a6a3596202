//! Data source and connection contracts

use super::error::DataSourceError;
use super::query::{CreateQuery, DeleteQuery, NativeQuery, QueryResult, UpdateQuery};
use crate::meta_model::MetaModel;
use crate::value::Value;

/// A physical store holding the rows of some meta objects
pub trait DataSource: Send + Sync {
    /// Name matching `data_source` in the meta model
    fn name(&self) -> &str;

    /// Open a new connection
    fn connect(&self) -> Result<Box<dyn Connection>, DataSourceError>;
}

/// A connection executing native queries
///
/// Writes between [`begin`](Connection::begin) and
/// [`commit`](Connection::commit) become visible to other connections only
/// after commit and are discarded by [`rollback`](Connection::rollback).
pub trait Connection: Send {
    /// Name of the data source this connection belongs to
    fn data_source(&self) -> &str;

    fn begin(&mut self) -> Result<(), DataSourceError>;

    fn in_transaction(&self) -> bool;

    /// First commit phase: report whether the commit can succeed.
    /// Nothing may become visible yet.
    fn prepare(&mut self) -> Result<(), DataSourceError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DataSourceError>;

    fn rollback(&mut self) -> Result<(), DataSourceError>;

    fn read(&mut self, model: &MetaModel, query: &NativeQuery) -> Result<QueryResult, DataSourceError>;

    /// Insert rows and return their UIDs in row order
    fn create(&mut self, model: &MetaModel, query: &CreateQuery) -> Result<Vec<Value>, DataSourceError>;

    /// Returns the number of rows changed
    fn update(&mut self, model: &MetaModel, query: &UpdateQuery) -> Result<usize, DataSourceError>;

    /// Returns the number of rows deleted
    fn delete(&mut self, model: &MetaModel, query: &DeleteQuery) -> Result<usize, DataSourceError>;
}
