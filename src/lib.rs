//! metasheet - Meta-model-driven data sheets over heterogeneous data sources
//!
//! This library provides:
//! - Meta model definition types (objects, attributes, relations, data sources)
//! - Meta model parsing from YAML
//! - Data sheets: columns bound to expressions, rows, totals, filters, sorters
//! - Read planning across data source boundaries with subsheets and left joins
//! - Transactional create/update/delete/replace with cascading deletes
//! - Collecting missing data into populated sheets, and sheet mappers
//!
//! # Architecture
//!
//! **Noun modules** (data structures):
//! - `meta_model/` - MetaModel, MetaObject, Attribute, Relation, DataType
//! - `expression/` - Expression, AttributePath, formulas
//! - `condition/` - Condition, ConditionGroup
//! - `sheet/` - DataSheet, Column, ColumnCollection, Subsheet, documents
//! - `source/` - NativeQuery, DataSource/Connection, Transaction, in-memory source
//! - `event/` - EventBus, SheetEvent
//!
//! **Verb modules** (transformations):
//! - `parser/` - YAML → MetaModel, JSON ↔ DataSheet
//! - `planner/` - DataSheet → ReadPlan → rows (subsheets, joins)
//! - `writer/` - DataSheet → create/update/delete/replace queries
//! - `collector/` - DataSheet + required expressions → enriched DataSheet
//! - `mapper/` - DataSheet of one object → DataSheet of another
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use metasheet::{parser, MemoryDataSource, Workbench};
//!
//! let model = parser::parse_file("model.yaml")?;
//! let mut workbench = Workbench::new(model);
//! workbench.register_source(Arc::new(MemoryDataSource::new("erp")));
//!
//! let mut sheet = workbench.new_sheet("ORDER")?;
//! sheet.add_column_str("UID")?;
//! sheet.add_column_str("CUSTOMER__NAME")?;
//! workbench.read(&mut sheet)?;
//! ```

pub mod collector;
pub mod condition;
pub mod error;
pub mod event;
pub mod expression;
pub mod mapper;
pub mod meta_model;
pub mod parser;
pub mod planner;
pub mod sheet;
pub mod source;
pub mod value;
pub mod workbench;
pub mod writer;

// Re-export commonly used types
pub use collector::{collect, enrich, CollectError, CollectOptions, CollectReport};
pub use condition::{Comparator, Condition, ConditionGroup, LogicalOperator};
pub use error::ParseError;
pub use event::{EventBus, EventKind, EventPhase, SheetEvent};
pub use expression::{AttributePath, Expression, RelationPath};
pub use mapper::{DataSheetMapper, MapError};
pub use meta_model::{AggregateFunction, Attribute, DataType, EngineConfig, MetaModel, MetaObject, ModelError, Relation};
pub use planner::{plan_read, read_sheet, PlanError, ReadContext, ReadError};
pub use sheet::{Column, DataSheet, Row, SheetDocument, SheetError, SortDirection, Sorter};
pub use source::{DataSource, DataSourceRegistry, MemoryDataSource, Transaction};
pub use value::Value;
pub use workbench::Workbench;
pub use writer::{UpdateOptions, WriteContext, WriteError};
