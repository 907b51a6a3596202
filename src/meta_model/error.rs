//! Meta model lookup and validation errors

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Object '{0}' not found in the meta model")]
    ObjectNotFound(String),
    #[error("Object '{0}' is defined more than once")]
    DuplicateObject(String),
    #[error("Attribute '{attribute}' not found in object '{object}'")]
    AttributeNotFound { object: String, attribute: String },
    #[error("Relation '{relation}' not found in object '{object}'")]
    RelationNotFound { object: String, relation: String },
    #[error("Object '{object}' uses undeclared data source '{data_source}'")]
    DataSourceNotFound { object: String, data_source: String },
    #[error("Object '{object}' declares UID attribute '{attribute}' which does not exist")]
    UidAttributeNotFound { object: String, attribute: String },
    #[error("Object '{object}' has no UID attribute")]
    MissingUid { object: String },
    #[error("Relation '{object}.{attribute}' points to '{target}' which has no key attribute '{key}'")]
    InvalidRelationKey {
        object: String,
        attribute: String,
        target: String,
        key: String,
    },
}
