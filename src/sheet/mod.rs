//! Data sheet types (nouns)
//!
//! A [`DataSheet`] is bound to one meta object and holds a
//! [`ColumnCollection`], a row store, total rows, filters, sorters,
//! aggregators and paging state. Reads and writes move it between empty,
//! populated and fresh states; the sheet itself never talks to a data source.

mod collection;
mod column;
mod data_sheet;
mod document;
mod error;
mod sorter;
mod subsheet;

pub use collection::ColumnCollection;
pub use column::{Column, Total};
pub use data_sheet::{DataSheet, Row};
pub use document::{ColumnDocument, SheetDocument};
pub use error::SheetError;
pub use sorter::{Aggregator, SortDirection, Sorter};
pub use subsheet::Subsheet;
