//! Writing data sheets (verbs)
//!
//! Create, update, delete and replace are multi-step protocols over one
//! [`Transaction`]. Each operation either runs inside a transaction supplied
//! by the caller or opens its own and commits it on success. Data source
//! failures roll the transaction back before the error is returned.
//!
//! Every operation is announced on the [`EventBus`] before and after it runs.

mod create;
mod delete;
mod error;
mod replace;
mod update;
mod validate;
mod values;

pub use create::create;
pub use delete::delete;
pub use error::WriteError;
pub use replace::replace_by_filter;
pub use update::{update, UpdateOptions};
pub use validate::validate;

use tracing::warn;

use crate::event::EventBus;
use crate::meta_model::MetaModel;
use crate::planner::ReadContext;
use crate::source::{Connection, DataSourceRegistry, Transaction};

/// What a write needs besides the sheet and the transaction
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    pub model: &'a MetaModel,
    pub sources: &'a DataSourceRegistry,
    pub events: &'a EventBus,
}

impl<'a> WriteContext<'a> {
    pub fn new(model: &'a MetaModel, sources: &'a DataSourceRegistry, events: &'a EventBus) -> Self {
        Self { model, sources, events }
    }

    pub fn reader(&self) -> ReadContext<'a> {
        ReadContext::new(self.model, self.sources)
    }

    fn connection<'t>(&self, tx: &'t mut Transaction, object: &str) -> Result<&'t mut dyn Connection, WriteError> {
        Ok(self.reader().connection(tx, object)?)
    }
}

/// Run `operation` inside the caller's transaction or a new one.
///
/// A transaction opened here is committed on success and rolled back on any
/// error. A caller's transaction is rolled back on data source errors only;
/// checks that fail before anything was sent leave it open.
pub(crate) fn in_transaction<T, F>(tx: Option<&mut Transaction>, operation: F) -> Result<T, WriteError>
where
    F: FnOnce(&mut Transaction) -> Result<T, WriteError>,
{
    match tx {
        Some(tx) => {
            let result = operation(tx);
            if let Err(err) = &result {
                if err.is_data_source_error() && tx.is_open() {
                    rollback(tx, err);
                }
            }
            result
        }
        None => {
            let mut tx = Transaction::new();
            match operation(&mut tx) {
                Ok(value) => {
                    tx.commit()?;
                    Ok(value)
                }
                Err(err) => {
                    if tx.is_open() {
                        rollback(&mut tx, &err);
                    }
                    Err(err)
                }
            }
        }
    }
}

fn rollback(tx: &mut Transaction, cause: &WriteError) {
    warn!(target: "metasheet::writer", "Rolling back transaction {} after: {}", tx.id(), cause);
    if let Err(err) = tx.rollback() {
        warn!(target: "metasheet::writer", "Rollback of transaction {} failed: {}", tx.id(), err);
    }
}
