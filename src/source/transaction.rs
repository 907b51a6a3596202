//! Transactions spanning several data source connections

use tracing::{debug, warn};
use uuid::Uuid;

use super::connection::{Connection, DataSource};
use super::error::TransactionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// An all-or-nothing unit of work over one connection per data source
///
/// Commit runs in two phases: every connection is asked to prepare, and only
/// if all agree are they committed. Any failure rolls back every connection.
/// A transaction dropped while still open is rolled back.
pub struct Transaction {
    id: Uuid,
    connections: Vec<Box<dyn Connection>>,
    state: TransactionState,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            connections: Vec::new(),
            state: TransactionState::Open,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    fn ensure_open(&self) -> Result<(), TransactionError> {
        match self.state {
            TransactionState::Open => Ok(()),
            _ => Err(TransactionError::Closed(self.id.to_string())),
        }
    }

    /// Register a connection and begin a transaction on it. A connection to
    /// a data source already registered is dropped in favor of the existing one.
    pub fn add_connection(&mut self, mut connection: Box<dyn Connection>) -> Result<&mut dyn Connection, TransactionError> {
        self.ensure_open()?;
        let name = connection.data_source().to_string();
        if let Some(position) = self.position(&name) {
            return Ok(self.connections[position].as_mut());
        }
        if !connection.in_transaction() {
            connection.begin().map_err(|source| TransactionError::Connect {
                data_source: name.clone(),
                source,
            })?;
        }
        debug!(target: "metasheet::transaction", "Transaction {}: added connection to '{}'", self.id, name);
        self.connections.push(connection);
        let last = self.connections.len() - 1;
        Ok(self.connections[last].as_mut())
    }

    /// The connection to a data source, connecting on first use
    pub fn connection(&mut self, source: &dyn DataSource) -> Result<&mut dyn Connection, TransactionError> {
        self.ensure_open()?;
        if let Some(position) = self.position(source.name()) {
            return Ok(self.connections[position].as_mut());
        }
        let connection = source.connect().map_err(|e| TransactionError::Connect {
            data_source: source.name().to_string(),
            source: e,
        })?;
        self.add_connection(connection)
    }

    pub fn has_connection(&self, data_source: &str) -> bool {
        self.position(data_source).is_some()
    }

    fn position(&self, data_source: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.data_source() == data_source)
    }

    /// Commit all connections or none
    pub fn commit(&mut self) -> Result<(), TransactionError> {
        self.ensure_open()?;
        for i in 0..self.connections.len() {
            if let Err(source) = self.connections[i].prepare() {
                let data_source = self.connections[i].data_source().to_string();
                warn!(target: "metasheet::transaction", "Transaction {}: prepare failed on '{}': {}", self.id, data_source, source);
                self.rollback_all();
                return Err(TransactionError::Prepare { data_source, source });
            }
        }
        for i in 0..self.connections.len() {
            if let Err(source) = self.connections[i].commit() {
                let data_source = self.connections[i].data_source().to_string();
                warn!(target: "metasheet::transaction", "Transaction {}: commit failed on '{}': {}", self.id, data_source, source);
                self.rollback_all();
                return Err(TransactionError::Commit { data_source, source });
            }
        }
        self.state = TransactionState::Committed;
        debug!(target: "metasheet::transaction", "Transaction {}: committed {} connection(s)", self.id, self.connections.len());
        Ok(())
    }

    /// Roll back every connection. Rolling back twice is a no-op.
    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        match self.state {
            TransactionState::RolledBack => Ok(()),
            TransactionState::Committed => Err(TransactionError::Closed(self.id.to_string())),
            TransactionState::Open => match self.rollback_all() {
                Some(err) => Err(err),
                None => Ok(()),
            },
        }
    }

    /// Roll back every connection still in a transaction, returning the first failure
    fn rollback_all(&mut self) -> Option<TransactionError> {
        let mut first_error = None;
        for connection in self.connections.iter_mut() {
            if !connection.in_transaction() {
                continue;
            }
            if let Err(source) = connection.rollback() {
                warn!(target: "metasheet::transaction", "Transaction {}: rollback failed on '{}': {}", self.id, connection.data_source(), source);
                first_error.get_or_insert(TransactionError::Rollback {
                    data_source: connection.data_source().to_string(),
                    source,
                });
            }
        }
        self.state = TransactionState::RolledBack;
        debug!(target: "metasheet::transaction", "Transaction {}: rolled back", self.id);
        first_error
    }

    pub fn is_rolled_back(&self) -> bool {
        self.state == TransactionState::RolledBack
    }

    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }

    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Open && !self.connections.is_empty() {
            warn!(target: "metasheet::transaction", "Transaction {} dropped while open, rolling back", self.id);
            self.rollback_all();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field(
                "connections",
                &self.connections.iter().map(|c| c.data_source().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_model::MetaModel;
    use crate::sheet::Row;
    use crate::source::{CreateQuery, MemoryDataSource, OperationKind};
    use crate::value::Value;

    const MODEL: &str = r#"
objects:
  - alias: NOTE
    data_source: a
    uid: UID
    attributes:
      - alias: UID
        type: integer
      - alias: TEXT
  - alias: TAG
    data_source: b
    uid: UID
    attributes:
      - alias: UID
        type: integer
"#;

    fn create(tx: &mut Transaction, source: &MemoryDataSource, model: &MetaModel, object: &str) {
        let query = CreateQuery {
            object: object.to_string(),
            rows: vec![Row::new()],
        };
        tx.connection(source).unwrap().create(model, &query).unwrap();
    }

    #[test]
    fn test_commit_publishes_all_connections() {
        let model: MetaModel = serde_yaml::from_str(MODEL).unwrap();
        let a = MemoryDataSource::new("a");
        let b = MemoryDataSource::new("b");
        let mut tx = Transaction::new();
        create(&mut tx, &a, &model, "NOTE");
        create(&mut tx, &b, &model, "TAG");
        assert!(a.rows("NOTE").is_empty(), "uncommitted rows are not visible");
        tx.commit().unwrap();
        assert!(tx.is_committed());
        assert_eq!(a.rows("NOTE")[0].get("UID"), Some(&Value::Int(1)));
        assert_eq!(b.rows("TAG").len(), 1);
    }

    #[test]
    fn test_failed_prepare_rolls_back_every_connection() {
        let model: MetaModel = serde_yaml::from_str(MODEL).unwrap();
        let a = MemoryDataSource::new("a");
        let b = MemoryDataSource::new("b");
        b.fail_on(OperationKind::Prepare, "");
        let mut tx = Transaction::new();
        create(&mut tx, &a, &model, "NOTE");
        create(&mut tx, &b, &model, "TAG");
        assert!(matches!(tx.commit(), Err(TransactionError::Prepare { .. })));
        assert!(tx.is_rolled_back());
        assert!(a.rows("NOTE").is_empty());
        assert!(b.rows("TAG").is_empty());
        assert_eq!(a.operations_of(OperationKind::Rollback).len(), 1);
        // Idempotent
        tx.rollback().unwrap();
        assert!(matches!(tx.commit(), Err(TransactionError::Closed(_))));
    }

    #[test]
    fn test_drop_rolls_back_open_transaction() {
        let model: MetaModel = serde_yaml::from_str(MODEL).unwrap();
        let a = MemoryDataSource::new("a");
        {
            let mut tx = Transaction::new();
            create(&mut tx, &a, &model, "NOTE");
        }
        assert!(a.rows("NOTE").is_empty());
        assert_eq!(a.operations_of(OperationKind::Rollback).len(), 1);
    }

    #[test]
    fn test_one_connection_per_data_source() {
        let a = MemoryDataSource::new("a");
        let mut tx = Transaction::new();
        tx.connection(&a).unwrap();
        tx.connection(&a).unwrap();
        assert!(tx.has_connection("a"));
        assert_eq!(format!("{:?}", tx).matches("\"a\"").count(), 1);
    }
}
