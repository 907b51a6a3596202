//! Read planner (verb module)
//!
//! Transforms a DataSheet into native queries: one per data source boundary,
//! executed parent first, with subsheets joined back by key.

mod build;
mod error;
mod filters;
mod join;
mod read;

pub(crate) use build::ensure_column;
pub use build::{plan_read, ReadPlan};
pub use error::{PlanError, ReadError};
pub(crate) use filters::{distinct_values, resolve_filters};
pub use join::left_join;
pub(crate) use read::read_at_depth;
pub use read::{read_sheet, ReadContext};
