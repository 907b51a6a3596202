//! Data sheet mappers (verb module)
//!
//! A mapper turns a sheet of one object into a sheet of another: column
//! values are copied, source values become target filters and source filters
//! are carried over under new expressions. The collector fetches any source
//! data the mapper needs that the sheet does not hold yet.

mod definition;
mod error;
mod map;

pub use definition::{ColumnMapping, ColumnToFilterMapping, DataSheetMapper, FilterToFilterMapping};
pub use error::MapError;
