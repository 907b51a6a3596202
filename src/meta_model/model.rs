//! Root meta model definition

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use super::config::EngineConfig;
use super::error::ModelError;
use super::object::{Attribute, MetaObject};
use super::relation::{Relation, RelationKind};
use crate::error::ParseError;
use crate::expression::AttributePath;

/// The root meta model: data sources, objects and engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct MetaModel {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub data_sources: Vec<DataSourceDef>,
    pub objects: Vec<MetaObject>,
}

/// Declaration of a physical data source
#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// An attribute reached from a root object through zero or more relation hops
#[derive(Debug, Clone)]
pub struct AttributeChain<'a> {
    /// Object the path starts from
    pub root: &'a MetaObject,
    pub hops: Vec<Relation>,
    /// Object owning the attribute
    pub object: &'a MetaObject,
    pub attribute: &'a Attribute,
}

impl AttributeChain<'_> {
    /// Index of the first hop leading into a different data source than the root
    pub fn first_boundary(&self, model: &MetaModel) -> Option<usize> {
        self.hops.iter().position(|hop| {
            model
                .find_object(&hop.right_object)
                .map(|o| o.data_source != self.root.data_source)
                .unwrap_or(false)
        })
    }

    pub fn has_reverse_hop(&self) -> bool {
        self.hops.iter().any(Relation::is_reverse)
    }
}

impl MetaModel {
    /// Load a meta model from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        crate::parser::parse_file(path)
    }

    /// Get an object by alias
    pub fn object(&self, alias: &str) -> Result<&MetaObject, ModelError> {
        self.find_object(alias)
            .ok_or_else(|| ModelError::ObjectNotFound(alias.to_string()))
    }

    pub fn find_object(&self, alias: &str) -> Option<&MetaObject> {
        self.objects.iter().find(|o| o.alias == alias)
    }

    /// Get an attribute of an object
    pub fn attribute(&self, object: &str, alias: &str) -> Result<&Attribute, ModelError> {
        self.object(object)?
            .attribute(alias)
            .ok_or_else(|| ModelError::AttributeNotFound {
                object: object.to_string(),
                attribute: alias.to_string(),
            })
    }

    /// Name of the data source holding an object
    pub fn data_source_of(&self, object: &str) -> Result<&str, ModelError> {
        Ok(&self.object(object)?.data_source)
    }

    /// All relations of an object: forward relations (declared on its own
    /// attributes) first, then reverse relations derived from other objects.
    pub fn relations(&self, object: &str) -> Result<Vec<Relation>, ModelError> {
        let obj = self.object(object)?;
        let mut relations: Vec<Relation> = obj
            .attributes
            .iter()
            .filter_map(|attr| self.forward_relation(obj, attr))
            .collect();
        relations.extend(self.reverse_relations(object)?);
        Ok(relations)
    }

    /// One-to-many relations pointing at an object
    pub fn reverse_relations(&self, object: &str) -> Result<Vec<Relation>, ModelError> {
        let target = self.object(object)?;
        let mut relations = Vec::new();
        for other in &self.objects {
            for attr in &other.attributes {
                let Some(def) = &attr.relation else { continue };
                if def.object != target.alias {
                    continue;
                }
                let key = def
                    .key
                    .clone()
                    .or_else(|| target.uid_attribute.clone())
                    .unwrap_or_default();
                relations.push(Relation {
                    alias: def.reverse_alias.clone().unwrap_or_else(|| other.alias.clone()),
                    kind: RelationKind::Reverse,
                    left_object: target.alias.clone(),
                    left_attribute: key,
                    right_object: other.alias.clone(),
                    right_attribute: attr.alias.clone(),
                    cascade_delete: def.cascade_delete || attr.required,
                });
            }
        }
        Ok(relations)
    }

    /// Get a relation of an object by alias
    pub fn relation(&self, object: &str, alias: &str) -> Result<Relation, ModelError> {
        let obj = self.object(object)?;
        if let Some(relation) = obj.attribute(alias).and_then(|a| self.forward_relation(obj, a)) {
            return Ok(relation);
        }
        self.reverse_relations(object)?
            .into_iter()
            .find(|r| r.alias == alias)
            .ok_or_else(|| ModelError::RelationNotFound {
                object: object.to_string(),
                relation: alias.to_string(),
            })
    }

    fn forward_relation(&self, obj: &MetaObject, attr: &Attribute) -> Option<Relation> {
        let def = attr.relation.as_ref()?;
        let target = self.find_object(&def.object)?;
        let key = def.key.clone().or_else(|| target.uid_attribute.clone())?;
        Some(Relation {
            alias: attr.alias.clone(),
            kind: RelationKind::Forward,
            left_object: obj.alias.clone(),
            left_attribute: attr.alias.clone(),
            right_object: target.alias.clone(),
            right_attribute: key,
            cascade_delete: false,
        })
    }

    /// Walk a relation path from `object` and return the attribute at its end
    pub fn resolve_path(&self, object: &str, path: &AttributePath) -> Result<AttributeChain<'_>, ModelError> {
        let root = self.object(object)?;
        let mut current = root;
        let mut hops = Vec::with_capacity(path.relations.len());
        for alias in &path.relations {
            let relation = self.relation(&current.alias, alias)?;
            current = self.object(&relation.right_object)?;
            hops.push(relation);
        }
        let attribute = current
            .attribute(&path.attribute)
            .ok_or_else(|| ModelError::AttributeNotFound {
                object: current.alias.clone(),
                attribute: path.attribute.clone(),
            })?;
        Ok(AttributeChain {
            root,
            hops,
            object: current,
            attribute,
        })
    }

    /// Check cross references: data sources, UID attributes and relation targets
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for obj in &self.objects {
            if !seen.insert(obj.alias.as_str()) {
                return Err(ModelError::DuplicateObject(obj.alias.clone()));
            }
            if !self.data_sources.is_empty()
                && !self.data_sources.iter().any(|ds| ds.name == obj.data_source)
            {
                return Err(ModelError::DataSourceNotFound {
                    object: obj.alias.clone(),
                    data_source: obj.data_source.clone(),
                });
            }
            if let Some(uid) = &obj.uid_attribute {
                if !obj.has_attribute(uid) {
                    return Err(ModelError::UidAttributeNotFound {
                        object: obj.alias.clone(),
                        attribute: uid.clone(),
                    });
                }
            }
            for attr in &obj.attributes {
                let Some(def) = &attr.relation else { continue };
                let target = self.object(&def.object)?;
                let key = def.key.as_deref().or(target.uid_attribute.as_deref());
                match key {
                    Some(key) if target.has_attribute(key) => {}
                    other => {
                        return Err(ModelError::InvalidRelationKey {
                            object: obj.alias.clone(),
                            attribute: attr.alias.clone(),
                            target: target.alias.clone(),
                            key: other.unwrap_or("<uid>").to_string(),
                        })
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
data_sources:
  - name: erp
  - name: crm
objects:
  - alias: ORDER
    data_source: erp
    uid: UID
    attributes:
      - alias: UID
        system: true
      - alias: CUSTOMER
        relation:
          object: CUSTOMER
  - alias: ORDER_POS
    data_source: erp
    uid: UID
    attributes:
      - alias: UID
      - alias: ORDER
        required: true
        relation:
          object: ORDER
          reverse_alias: POSITIONS
  - alias: CUSTOMER
    data_source: crm
    uid: UID
    attributes:
      - alias: UID
      - alias: NAME
"#;

    fn model() -> MetaModel {
        let model: MetaModel = serde_yaml::from_str(YAML).unwrap();
        model.validate().unwrap();
        model
    }

    #[test]
    fn test_forward_and_reverse_relations() {
        let model = model();
        let forward = model.relation("ORDER", "CUSTOMER").unwrap();
        assert!(forward.is_forward());
        assert_eq!(forward.right_object, "CUSTOMER");
        assert_eq!(forward.right_attribute, "UID");

        let reverse = model.relation("ORDER", "POSITIONS").unwrap();
        assert!(reverse.is_reverse());
        assert_eq!(reverse.left_attribute, "UID");
        assert_eq!(reverse.right_object, "ORDER_POS");
        assert_eq!(reverse.right_attribute, "ORDER");
        assert!(reverse.cascade_delete, "required key implies cascading delete");

        // Reverse relation without an explicit alias is named after the dependent object
        let customer_orders = model.relation("CUSTOMER", "ORDER").unwrap();
        assert!(customer_orders.is_reverse());
        assert!(!customer_orders.cascade_delete);
    }

    #[test]
    fn test_resolve_path_across_sources() {
        let model = model();
        let path = AttributePath::parse("CUSTOMER__NAME").unwrap();
        let chain = model.resolve_path("ORDER", &path).unwrap();
        assert_eq!(chain.object.alias, "CUSTOMER");
        assert_eq!(chain.attribute.alias, "NAME");
        assert_eq!(chain.first_boundary(&model), Some(0));

        let local = AttributePath::parse("POSITIONS__ORDER").unwrap();
        let chain = model.resolve_path("ORDER", &local).unwrap();
        assert_eq!(chain.first_boundary(&model), None);
        assert!(chain.has_reverse_hop());
    }

    #[test]
    fn test_resolve_path_errors() {
        let model = model();
        let err = model
            .resolve_path("ORDER", &AttributePath::parse("SUPPLIER__NAME").unwrap())
            .unwrap_err();
        assert!(matches!(err, ModelError::RelationNotFound { .. }));
        let err = model
            .resolve_path("ORDER", &AttributePath::parse("CUSTOMER__EMAIL").unwrap())
            .unwrap_err();
        assert!(matches!(err, ModelError::AttributeNotFound { ref object, .. } if object == "CUSTOMER"));
    }

    #[test]
    fn test_validate_rejects_unknown_data_source() {
        let mut model = model();
        model.objects[0].data_source = "warehouse".to_string();
        assert!(matches!(model.validate(), Err(ModelError::DataSourceNotFound { .. })));
    }
}
