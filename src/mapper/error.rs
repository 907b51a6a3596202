//! Mapper errors

use thiserror::Error;

use crate::collector::CollectError;
use crate::meta_model::ModelError;
use crate::planner::ReadError;
use crate::sheet::SheetError;

#[derive(Debug, Clone, Error)]
pub enum MapError {
    #[error("Mapper expects a data sheet of '{expected}', got '{actual}'")]
    ObjectMismatch { expected: String, actual: String },
    #[error("Cannot filter '{expression}' with '{comparator}' over {count} distinct values")]
    AmbiguousFilterValue {
        expression: String,
        comparator: String,
        count: usize,
    },
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
