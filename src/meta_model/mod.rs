//! Meta model types (nouns)
//!
//! These types represent the parsed meta model: logical objects, their
//! attributes, the relations between them and the data sources they live in.

mod config;
mod error;
mod model;
mod object;
mod relation;
mod types;

pub use config::{EngineConfig, UidGenerator};
pub use error::ModelError;
pub use model::{AttributeChain, DataSourceDef, MetaModel};
pub use object::{Attribute, MetaObject, RelationDef};
pub use relation::{Relation, RelationKind};
pub use types::{AggregateFunction, DataType, ParseAggregateError, ParseDataTypeError};
