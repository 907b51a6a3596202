//! Meta objects and their attributes

use serde::Deserialize;

use super::types::{AggregateFunction, DataType};
use crate::expression::Expression;

/// A logical business object (e.g. ORDER) stored in exactly one data source
#[derive(Debug, Clone, Deserialize)]
pub struct MetaObject {
    pub alias: String,
    /// Human readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Name of the data source holding this object's rows
    pub data_source: String,
    /// Alias of the attribute uniquely identifying a row
    #[serde(default, rename = "uid")]
    pub uid_attribute: Option<String>,
    /// Aggregator applied to system attributes when the object is read aggregated
    #[serde(default)]
    pub default_aggregator: Option<AggregateFunction>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// An attribute of a meta object
///
/// An attribute with a `relation` is a foreign key: it also defines a forward
/// relation with the same alias pointing at the related object.
#[derive(Debug, Clone, Deserialize)]
pub struct Attribute {
    pub alias: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    /// A value must be present when a row is created
    #[serde(default)]
    pub required: bool,
    /// Always read, even if no column asks for it
    #[serde(default)]
    pub system: bool,
    #[serde(default = "default_true")]
    pub readable: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
    /// Expression used when a created row has no value
    #[serde(default)]
    pub default_value: Option<Expression>,
    /// Expression whose value is forced on every create and update
    #[serde(default)]
    pub fixed_value: Option<Expression>,
    #[serde(default)]
    pub default_aggregator: Option<AggregateFunction>,
    #[serde(default)]
    pub relation: Option<RelationDef>,
}

fn default_true() -> bool {
    true
}

/// Foreign key declaration on an attribute
#[derive(Debug, Clone, Deserialize)]
pub struct RelationDef {
    /// Alias of the related object
    pub object: String,
    /// Attribute of the related object holding the key (defaults to its UID)
    #[serde(default)]
    pub key: Option<String>,
    /// Alias of the derived reverse relation (defaults to this object's alias)
    #[serde(default)]
    pub reverse_alias: Option<String>,
    /// Delete dependent rows with the related row even if the key is optional
    #[serde(default)]
    pub cascade_delete: bool,
}

impl MetaObject {
    /// Get an attribute by alias
    pub fn attribute(&self, alias: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.alias == alias)
    }

    pub fn has_attribute(&self, alias: &str) -> bool {
        self.attribute(alias).is_some()
    }

    /// The UID attribute, if the object declares one
    pub fn uid(&self) -> Option<&Attribute> {
        self.uid_attribute.as_deref().and_then(|alias| self.attribute(alias))
    }

    pub fn is_uid(&self, alias: &str) -> bool {
        self.uid_attribute.as_deref() == Some(alias)
    }

    /// Display name, falling back to the alias
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.alias)
    }

    /// Attributes that must always be part of a read
    pub fn system_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.system && a.readable)
    }
}

impl Attribute {
    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.alias)
    }
}
