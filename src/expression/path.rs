//! Attribute and relation paths
//!
//! `CUSTOMER__COUNTRY__NAME` is the attribute `NAME` reached from the root
//! object through the relations `CUSTOMER` and `COUNTRY`.

use std::fmt;

use super::error::ExpressionError;

/// Separator between relation hops in a path
pub const RELATION_SEPARATOR: &str = "__";

/// An ordered list of relation aliases
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RelationPath(Vec<String>);

impl RelationPath {
    pub fn new(aliases: Vec<String>) -> Self {
        Self(aliases)
    }

    pub fn single(alias: impl Into<String>) -> Self {
        Self(vec![alias.into()])
    }

    pub fn aliases(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// A new path with one more hop at the end
    pub fn join(&self, alias: impl Into<String>) -> Self {
        let mut aliases = self.0.clone();
        aliases.push(alias.into());
        Self(aliases)
    }

    /// This path followed by another one
    pub fn append(&self, other: &RelationPath) -> Self {
        let mut aliases = self.0.clone();
        aliases.extend(other.0.iter().cloned());
        Self(aliases)
    }

    pub fn starts_with(&self, prefix: &RelationPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for RelationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(RELATION_SEPARATOR))
    }
}

/// An attribute alias with the relation hops leading to it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    pub relations: Vec<String>,
    pub attribute: String,
}

impl AttributePath {
    /// A path to an attribute of the root object itself
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            relations: Vec::new(),
            attribute: attribute.into(),
        }
    }

    pub fn with_relations(relations: &RelationPath, attribute: impl Into<String>) -> Self {
        Self {
            relations: relations.aliases().to_vec(),
            attribute: attribute.into(),
        }
    }

    /// Parse `REL__REL__ATTR`. Segments must be non-empty identifiers.
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut segments: Vec<String> = Vec::new();
        for segment in input.split(RELATION_SEPARATOR) {
            if segment.is_empty() {
                return Err(ExpressionError::InvalidPath {
                    input: input.to_string(),
                    reason: "empty path segment".to_string(),
                });
            }
            if let Some(c) = segment.chars().find(|c| !is_identifier_char(*c)) {
                return Err(ExpressionError::InvalidPath {
                    input: input.to_string(),
                    reason: format!("invalid character '{}'", c),
                });
            }
            segments.push(segment.to_string());
        }
        let attribute = segments.pop().unwrap_or_default();
        Ok(Self {
            relations: segments,
            attribute,
        })
    }

    pub fn relation_path(&self) -> RelationPath {
        RelationPath(self.relations.clone())
    }

    pub fn is_local(&self) -> bool {
        self.relations.is_empty()
    }

    /// The same attribute as seen from an object `prefix` hops further up
    pub fn prefixed(&self, prefix: &RelationPath) -> Self {
        let mut relations = prefix.aliases().to_vec();
        relations.extend(self.relations.iter().cloned());
        Self {
            relations,
            attribute: self.attribute.clone(),
        }
    }

    /// The path relative to the object reached through `prefix`
    pub fn strip_prefix(&self, prefix: &RelationPath) -> Option<Self> {
        if !self.relations.starts_with(prefix.aliases()) {
            return None;
        }
        Some(Self {
            relations: self.relations[prefix.len()..].to_vec(),
            attribute: self.attribute.clone(),
        })
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for relation in &self.relations {
            write!(f, "{}{}", relation, RELATION_SEPARATOR)?;
        }
        write!(f, "{}", self.attribute)
    }
}

pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        let path = AttributePath::parse("CUSTOMER__COUNTRY__NAME").unwrap();
        assert_eq!(path.relations, vec!["CUSTOMER", "COUNTRY"]);
        assert_eq!(path.attribute, "NAME");
        assert_eq!(path.to_string(), "CUSTOMER__COUNTRY__NAME");

        let local = AttributePath::parse("UID").unwrap();
        assert!(local.is_local());
    }

    #[test]
    fn test_parse_path_errors() {
        assert!(AttributePath::parse("").is_err());
        assert!(AttributePath::parse("__NAME").is_err());
        assert!(AttributePath::parse("CUSTOMER__").is_err());
        assert!(AttributePath::parse("CUSTOMER NAME").is_err());
    }

    #[test]
    fn test_prefix_and_strip() {
        let path = AttributePath::parse("COUNTRY__NAME").unwrap();
        let prefix = RelationPath::single("CUSTOMER");
        let full = path.prefixed(&prefix);
        assert_eq!(full.to_string(), "CUSTOMER__COUNTRY__NAME");
        assert_eq!(full.strip_prefix(&prefix), Some(path));
        assert_eq!(full.strip_prefix(&RelationPath::single("SUPPLIER")), None);
    }
}
