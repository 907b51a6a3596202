//! Filter conditions (nouns)
//!
//! A [`ConditionGroup`] is a boolean tree of [`Condition`]s used both as read
//! filters handed to data sources and to test rows already loaded in a sheet.

mod comparator;
#[allow(clippy::module_inception)]
mod condition;
mod error;
mod group;

pub use comparator::Comparator;
pub use condition::{Condition, ConditionValue};
pub use error::ConditionError;
pub use group::{ConditionGroup, LogicalOperator};
