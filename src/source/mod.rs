//! Data sources (nouns)
//!
//! The engine never talks to storage directly. It builds [`NativeQuery`]s and
//! write queries and hands them to a [`Connection`] obtained through a
//! [`Transaction`]. [`MemoryDataSource`] implements the contract in memory.

mod connection;
mod error;
pub mod memory;
mod query;
mod registry;
mod transaction;

pub use connection::{Connection, DataSource};
pub use error::{DataSourceError, TransactionError};
pub use memory::{MemoryDataSource, Operation, OperationKind};
pub use query::{
    CreateQuery, DeleteQuery, NativeQuery, QueryAttribute, QueryResult, QueryTotal, UpdateQuery, UpdateValues,
};
pub use registry::DataSourceRegistry;
pub use transaction::Transaction;
