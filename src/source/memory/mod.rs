//! In-memory data source
//!
//! Holds one table of rows per object and executes native queries against
//! them: same-source relation paths, filters, grouping, aggregation, totals,
//! sorting and paging. Every connection works on a snapshot of the tables
//! while in a transaction; commit publishes the snapshot.
//!
//! The source keeps a log of executed operations and can be told to fail
//! specific operations, which makes it the test double for the engine.

mod store;

pub use store::Tables;

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::connection::{Connection, DataSource};
use super::error::DataSourceError;
use super::query::{CreateQuery, DeleteQuery, NativeQuery, QueryResult, UpdateQuery};
use crate::meta_model::{MetaModel, UidGenerator};
use crate::sheet::Row;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
    Prepare,
    Commit,
    Rollback,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Read => "read",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Prepare => "prepare",
            OperationKind::Commit => "commit",
            OperationKind::Rollback => "rollback",
        };
        write!(f, "{}", name)
    }
}

/// An executed operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    /// Object alias; empty for transaction control operations
    pub object: String,
    /// Rows returned, created, updated or deleted
    pub rows: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    log: Vec<Operation>,
    faults: Vec<(OperationKind, String)>,
}

impl MemoryState {
    fn check_fault(&self, kind: OperationKind, object: &str) -> Result<(), DataSourceError> {
        let hit = self
            .faults
            .iter()
            .any(|(k, o)| *k == kind && (o.is_empty() || o == object));
        if hit {
            return Err(DataSourceError::Injected {
                operation: kind.to_string(),
                object: object.to_string(),
            });
        }
        Ok(())
    }

    fn record(&mut self, kind: OperationKind, object: &str, rows: usize) {
        self.log.push(Operation {
            kind,
            object: object.to_string(),
            rows,
        });
    }
}

/// A named in-memory data source shared by all its connections
#[derive(Clone)]
pub struct MemoryDataSource {
    name: String,
    uid_generator: UidGenerator,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDataSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid_generator: UidGenerator::default(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn with_uid_generator(mut self, generator: UidGenerator) -> Self {
        self.uid_generator = generator;
        self
    }

    /// Append committed rows to an object's table
    pub fn insert_rows(&self, object: &str, rows: impl IntoIterator<Item = Row>) {
        let mut state = self.state.lock();
        state.tables.entry(object.to_string()).or_default().extend(rows);
    }

    /// Committed rows of an object
    pub fn rows(&self, object: &str) -> Vec<Row> {
        self.state.lock().tables.get(object).cloned().unwrap_or_default()
    }

    /// Operations executed so far, in order
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().log.clone()
    }

    /// Executed operations of one kind
    pub fn operations_of(&self, kind: OperationKind) -> Vec<Operation> {
        self.state.lock().log.iter().filter(|op| op.kind == kind).cloned().collect()
    }

    pub fn clear_operations(&self) {
        self.state.lock().log.clear();
    }

    /// Make every subsequent `kind` operation on `object` fail.
    /// An empty object matches all objects.
    pub fn fail_on(&self, kind: OperationKind, object: &str) {
        self.state.lock().faults.push((kind, object.to_string()));
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }
}

impl fmt::Debug for MemoryDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryDataSource")
            .field("name", &self.name)
            .field("tables", &state.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DataSource for MemoryDataSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<Box<dyn Connection>, DataSourceError> {
        Ok(Box::new(MemoryConnection {
            name: self.name.clone(),
            uid_generator: self.uid_generator,
            state: Arc::clone(&self.state),
            working: None,
        }))
    }
}

/// Connection to a [`MemoryDataSource`]
pub struct MemoryConnection {
    name: String,
    uid_generator: UidGenerator,
    state: Arc<Mutex<MemoryState>>,
    /// Private copy of the tables while a transaction is open
    working: Option<Tables>,
}

impl MemoryConnection {
    /// Run `f` against the working snapshot, or the shared tables outside a transaction
    fn with_tables<T>(
        &mut self,
        kind: OperationKind,
        object: &str,
        f: impl FnOnce(&str, &mut Tables, UidGenerator) -> Result<T, DataSourceError>,
        count: impl Fn(&T) -> usize,
    ) -> Result<T, DataSourceError> {
        let mut state = self.state.lock();
        state.check_fault(kind, object)?;
        let result = match self.working.as_mut() {
            Some(tables) => f(&self.name, tables, self.uid_generator)?,
            None => f(&self.name, &mut state.tables, self.uid_generator)?,
        };
        let rows = count(&result);
        state.record(kind, object, rows);
        debug!(target: "metasheet::source", "{}: {} '{}' ({} rows)", self.name, kind, object, rows);
        Ok(result)
    }
}

impl Connection for MemoryConnection {
    fn data_source(&self) -> &str {
        &self.name
    }

    fn begin(&mut self) -> Result<(), DataSourceError> {
        let state = self.state.lock();
        self.working = Some(state.tables.clone());
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.working.is_some()
    }

    fn prepare(&mut self) -> Result<(), DataSourceError> {
        let mut state = self.state.lock();
        state.check_fault(OperationKind::Prepare, "")?;
        state.record(OperationKind::Prepare, "", 0);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DataSourceError> {
        let mut state = self.state.lock();
        state.check_fault(OperationKind::Commit, "")?;
        if let Some(tables) = self.working.take() {
            state.tables = tables;
        }
        state.record(OperationKind::Commit, "", 0);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DataSourceError> {
        let mut state = self.state.lock();
        self.working = None;
        state.record(OperationKind::Rollback, "", 0);
        Ok(())
    }

    fn read(&mut self, model: &MetaModel, query: &NativeQuery) -> Result<QueryResult, DataSourceError> {
        self.with_tables(
            OperationKind::Read,
            &query.object,
            |name, tables, _| {
                store::Store {
                    data_source: name,
                    model,
                    tables,
                }
                .read(query)
            },
            |result| result.rows.len(),
        )
    }

    fn create(&mut self, model: &MetaModel, query: &CreateQuery) -> Result<Vec<Value>, DataSourceError> {
        self.with_tables(
            OperationKind::Create,
            &query.object,
            |name, tables, generator| store::create(name, model, tables, query, generator),
            Vec::len,
        )
    }

    fn update(&mut self, model: &MetaModel, query: &UpdateQuery) -> Result<usize, DataSourceError> {
        self.with_tables(
            OperationKind::Update,
            &query.object,
            |name, tables, _| store::update(name, model, tables, query),
            |n| *n,
        )
    }

    fn delete(&mut self, model: &MetaModel, query: &DeleteQuery) -> Result<usize, DataSourceError> {
        self.with_tables(
            OperationKind::Delete,
            &query.object,
            |name, tables, _| store::delete(name, model, tables, query),
            |n| *n,
        )
    }
}
