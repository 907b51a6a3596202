//! Error types for loading models, sheets and fixtures

use thiserror::Error;

use crate::meta_model::ModelError;
use crate::sheet::SheetError;

/// Errors that can occur during parsing
#[derive(Debug, Error)]
pub enum ParseError {
    /// IO error reading file
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// YAML deserialization error
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// JSON (de)serialization error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The document parsed but the meta model is inconsistent
    #[error("Invalid meta model: {0}")]
    Model(#[from] ModelError),
    /// The document parsed but does not describe a valid sheet
    #[error("Invalid data sheet: {0}")]
    Sheet(#[from] SheetError),
}
