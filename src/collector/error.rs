//! Collector errors

use thiserror::Error;

use crate::meta_model::ModelError;
use crate::planner::ReadError;
use crate::sheet::SheetError;

#[derive(Debug, Clone, Error)]
pub enum CollectError {
    /// Data that can be neither re-read by UID nor reached through forward relations
    #[error("Cannot collect '{expression}' for '{object}': {reason}")]
    Unresolvable {
        object: String,
        expression: String,
        reason: String,
    },
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
