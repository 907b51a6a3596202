//! The workbench: one meta model, its data sources and an event bus
//!
//! Every engine operation is available as a free function taking a context.
//! The workbench bundles what those contexts borrow and opens a transaction
//! per call when the caller does not pass one.

use std::sync::Arc;
use tracing::warn;

use crate::collector::{self, CollectError, CollectOptions, CollectReport};
use crate::event::{EventBus, EventKind, EventPhase, SheetEvent};
use crate::expression::Expression;
use crate::mapper::{DataSheetMapper, MapError};
use crate::meta_model::{MetaModel, ModelError};
use crate::planner::{read_sheet, ReadContext, ReadError};
use crate::sheet::DataSheet;
use crate::source::{DataSource, DataSourceRegistry, Transaction};
use crate::writer::{self, UpdateOptions, WriteContext, WriteError};

pub struct Workbench {
    model: Arc<MetaModel>,
    sources: DataSourceRegistry,
    events: EventBus,
}

impl Workbench {
    pub fn new(model: MetaModel) -> Self {
        Self::with_model(Arc::new(model))
    }

    /// A workbench sharing a model with others
    pub fn with_model(model: Arc<MetaModel>) -> Self {
        Self {
            model,
            sources: DataSourceRegistry::new(),
            events: EventBus::new(),
        }
    }

    pub fn model(&self) -> &MetaModel {
        &self.model
    }

    pub fn sources(&self) -> &DataSourceRegistry {
        &self.sources
    }

    pub fn register_source(&mut self, source: Arc<dyn DataSource>) {
        self.sources.register(source);
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: Fn(&SheetEvent<'_>) + Send + Sync + 'static,
    {
        self.events.subscribe(listener);
    }

    pub fn subscribe_to<F>(&mut self, phase: EventPhase, listener: F)
    where
        F: Fn(&SheetEvent<'_>) + Send + Sync + 'static,
    {
        self.events.subscribe_to(phase, listener);
    }

    pub fn start_transaction(&self) -> Transaction {
        Transaction::new()
    }

    /// An empty sheet for `object` with the object's UID as UID column
    pub fn new_sheet(&self, object: &str) -> Result<DataSheet, ModelError> {
        Ok(DataSheet::for_object(self.model.object(object)?))
    }

    pub fn reader(&self) -> ReadContext<'_> {
        ReadContext::new(&self.model, &self.sources)
    }

    pub fn writer(&self) -> WriteContext<'_> {
        WriteContext::new(&self.model, &self.sources, &self.events)
    }

    // ========================================================================
    // Read
    // ========================================================================

    pub fn read(&self, sheet: &mut DataSheet) -> Result<(), ReadError> {
        self.with_transaction(None, |tx| self.read_in(sheet, tx))
    }

    /// Read inside the caller's transaction, seeing its uncommitted writes
    pub fn read_in(&self, sheet: &mut DataSheet, tx: &mut Transaction) -> Result<(), ReadError> {
        self.events.dispatch(EventPhase::Before(EventKind::Read), sheet, sheet.row_count());
        read_sheet(&self.reader(), sheet, tx)?;
        self.events.dispatch(EventPhase::After(EventKind::Read), sheet, sheet.row_count());
        Ok(())
    }

    // ========================================================================
    // Write
    // ========================================================================

    pub fn create(&self, sheet: &mut DataSheet, tx: Option<&mut Transaction>) -> Result<usize, WriteError> {
        writer::create(&self.writer(), sheet, tx)
    }

    pub fn update(
        &self,
        sheet: &mut DataSheet,
        options: UpdateOptions,
        tx: Option<&mut Transaction>,
    ) -> Result<usize, WriteError> {
        writer::update(&self.writer(), sheet, options, tx)
    }

    pub fn delete(&self, sheet: &DataSheet, tx: Option<&mut Transaction>) -> Result<usize, WriteError> {
        writer::delete(&self.writer(), sheet, tx)
    }

    pub fn replace_by_filter(
        &self,
        sheet: &mut DataSheet,
        delete_redundant: bool,
        tx: Option<&mut Transaction>,
    ) -> Result<usize, WriteError> {
        writer::replace_by_filter(&self.writer(), sheet, delete_redundant, tx)
    }

    pub fn validate(&self, sheet: &mut DataSheet, for_create: bool) -> Result<(), WriteError> {
        writer::validate(&self.writer(), sheet, for_create)
    }

    // ========================================================================
    // Collect and map
    // ========================================================================

    /// Fetch the `required` expressions missing from `sheet`, following the
    /// model's `ignore_unreadable` policy
    pub fn enrich(
        &self,
        sheet: &mut DataSheet,
        required: &[Expression],
        tx: Option<&mut Transaction>,
    ) -> Result<CollectReport, CollectError> {
        let options = CollectOptions::from_config(&self.model.engine);
        self.enrich_with(sheet, required, options, tx)
    }

    pub fn enrich_with(
        &self,
        sheet: &mut DataSheet,
        required: &[Expression],
        options: CollectOptions,
        tx: Option<&mut Transaction>,
    ) -> Result<CollectReport, CollectError> {
        self.with_transaction(tx, |tx| collector::enrich(&self.reader(), sheet, required, options, tx))
    }

    /// An enriched copy of `sheet`
    pub fn collect(
        &self,
        sheet: &DataSheet,
        required: &[Expression],
        tx: Option<&mut Transaction>,
    ) -> Result<DataSheet, CollectError> {
        let options = CollectOptions::from_config(&self.model.engine);
        self.with_transaction(tx, |tx| collector::collect(&self.reader(), sheet, required, options, tx))
    }

    pub fn map(
        &self,
        mapper: &DataSheetMapper,
        sheet: &DataSheet,
        tx: Option<&mut Transaction>,
    ) -> Result<DataSheet, MapError> {
        self.with_transaction(tx, |tx| mapper.map(&self.reader(), sheet, tx))
    }

    /// Run a read-only operation in the caller's transaction or a new one
    fn with_transaction<T, E, F>(&self, tx: Option<&mut Transaction>, operation: F) -> Result<T, E>
    where
        E: From<ReadError>,
        F: FnOnce(&mut Transaction) -> Result<T, E>,
    {
        if let Some(tx) = tx {
            return operation(tx);
        }
        let mut tx = self.start_transaction();
        match operation(&mut tx) {
            Ok(value) => {
                tx.commit().map_err(ReadError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(target: "metasheet::workbench", "Rollback of transaction {} failed: {}", tx.id(), rollback);
                }
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for Workbench {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workbench")
            .field("objects", &self.model.objects.len())
            .field("sources", &self.sources)
            .field("listeners", &self.events.len())
            .finish()
    }
}
