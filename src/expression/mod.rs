//! Column expressions (nouns)
//!
//! Every column of a data sheet is bound to an [`Expression`]: an attribute
//! reached through a relation path, an aggregated attribute, a formula, a
//! constant or a reference to another widget's column. Strings are parsed
//! exactly once; the rest of the engine only sees the typed form.

mod error;
mod formula;
mod parse;
mod path;

pub use error::ExpressionError;
pub use formula::{Formula, Function};
pub use parse::AGGREGATOR_SEPARATOR;
pub use path::{AttributePath, RelationPath, RELATION_SEPARATOR};

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::meta_model::{AggregateFunction, MetaModel};
use crate::value::Value;

/// A reference to a column of some other component, `[#target!column#]`.
/// The engine does not resolve references; they evaluate to null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub target: String,
    pub column: String,
}

/// A parsed column expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Attribute(AttributePath),
    Aggregate {
        path: AttributePath,
        function: AggregateFunction,
    },
    Formula(Formula),
    Constant(Value),
    Reference(Reference),
}

impl Expression {
    /// Parse an expression string
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        parse::parse_expression(input)
    }

    /// Parse an expression and check that every attribute it needs can be
    /// reached from `object`.
    pub fn parse_for(input: &str, model: &MetaModel, object: &str) -> Result<Self, ExpressionError> {
        let expression = Self::parse(input)?;
        expression.validate_for(model, object)?;
        Ok(expression)
    }

    /// Check that every attribute path resolves from `object`
    pub fn validate_for(&self, model: &MetaModel, object: &str) -> Result<(), ExpressionError> {
        for required in self.required_attributes() {
            if let Some(path) = required.attribute_path() {
                model.resolve_path(object, path)?;
            }
        }
        Ok(())
    }

    pub fn attribute(path: AttributePath) -> Self {
        Expression::Attribute(path)
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, Expression::Attribute(_))
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expression::Aggregate { .. })
    }

    pub fn is_formula(&self) -> bool {
        matches!(self, Expression::Formula(_))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Constant(_))
    }

    /// Path of an attribute or aggregate expression
    pub fn attribute_path(&self) -> Option<&AttributePath> {
        match self {
            Expression::Attribute(path) | Expression::Aggregate { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn aggregator(&self) -> Option<AggregateFunction> {
        match self {
            Expression::Aggregate { function, .. } => Some(*function),
            _ => None,
        }
    }

    /// Attribute and aggregate expressions this expression reads, in order of
    /// appearance and without duplicates
    pub fn required_attributes(&self) -> Vec<Expression> {
        let mut out = Vec::new();
        self.collect_required(&mut out);
        out
    }

    fn collect_required(&self, out: &mut Vec<Expression>) {
        match self {
            Expression::Attribute(_) | Expression::Aggregate { .. } => {
                if !out.contains(self) {
                    out.push(self.clone());
                }
            }
            Expression::Formula(formula) => {
                for arg in &formula.args {
                    arg.collect_required(out);
                }
            }
            Expression::Constant(_) | Expression::Reference(_) => {}
        }
    }

    /// The same expression seen from an object `prefix` hops up the relation graph
    pub fn rebase(&self, prefix: &RelationPath) -> Expression {
        self.map_paths(&mut |path| Some(path.prefixed(prefix)))
            .unwrap_or_else(|| self.clone())
    }

    /// The expression relative to the object reached through `prefix`.
    /// `None` if some attribute is not under that prefix.
    pub fn strip_prefix(&self, prefix: &RelationPath) -> Option<Expression> {
        self.map_paths(&mut |path| path.strip_prefix(prefix))
    }

    fn map_paths(&self, f: &mut dyn FnMut(&AttributePath) -> Option<AttributePath>) -> Option<Expression> {
        Some(match self {
            Expression::Attribute(path) => Expression::Attribute(f(path)?),
            Expression::Aggregate { path, function } => Expression::Aggregate {
                path: f(path)?,
                function: *function,
            },
            Expression::Formula(formula) => {
                let mut args = Vec::with_capacity(formula.args.len());
                for arg in &formula.args {
                    args.push(arg.map_paths(f)?);
                }
                Expression::Formula(Formula {
                    function: formula.function,
                    args,
                })
            }
            other => other.clone(),
        })
    }

    /// Column name used when a column is created from this expression
    pub fn default_column_name(&self) -> String {
        match self {
            Expression::Attribute(path) => path.to_string(),
            Expression::Aggregate { path, function } => format!("{}_{}", path, function),
            other => {
                let mut name = String::new();
                for c in other.to_string().chars() {
                    if path::is_identifier_char(c) {
                        name.push(c.to_ascii_uppercase());
                    } else if !name.ends_with('_') {
                        name.push('_');
                    }
                }
                let name = name.trim_matches('_').to_string();
                if name.is_empty() {
                    "COLUMN".to_string()
                } else {
                    name
                }
            }
        }
    }

    /// Evaluate the expression. Attribute and aggregate values come from `lookup`.
    pub fn evaluate(&self, lookup: &mut dyn FnMut(&Expression) -> Value) -> Result<Value, ExpressionError> {
        match self {
            Expression::Attribute(_) | Expression::Aggregate { .. } => Ok(lookup(self)),
            Expression::Constant(value) => Ok(value.clone()),
            Expression::Reference(_) => Ok(Value::Null),
            Expression::Formula(formula) => {
                let mut args = Vec::with_capacity(formula.args.len());
                for arg in &formula.args {
                    args.push(arg.evaluate(lookup)?);
                }
                formula.function.evaluate(&args)
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Attribute(path) => write!(f, "{}", path),
            Expression::Aggregate { path, function } => {
                write!(f, "{}{}{}", path, AGGREGATOR_SEPARATOR, function)
            }
            Expression::Formula(formula) => write!(f, "={}", formula),
            Expression::Constant(value) => match value {
                Value::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
                Value::Float(x) => write!(f, "{:?}", x),
                other => write!(f, "{}", other),
            },
            Expression::Reference(r) => write!(f, "[#{}!{}#]", r.target, r.column),
        }
    }
}

impl std::str::FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::parse(s)
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct ExpressionVisitor;

impl Visitor<'_> for ExpressionVisitor {
    type Value = Expression;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an expression string or a scalar constant")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Expression, E> {
        Expression::parse(v).map_err(de::Error::custom)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Expression, E> {
        Ok(Expression::Constant(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Expression, E> {
        Ok(Expression::Constant(Value::Int(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Expression, E> {
        i64::try_from(v)
            .map(|i| Expression::Constant(Value::Int(i)))
            .map_err(de::Error::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Expression, E> {
        Ok(Expression::Constant(Value::Float(v)))
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ExpressionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(s: &str) -> Expression {
        Expression::parse(s).unwrap()
    }

    #[test]
    fn test_required_attributes() {
        let e = expr("=Divide(POSITIONS__AMOUNT:SUM, Add(QTY, QTY, 1))");
        let required = e.required_attributes();
        assert_eq!(required, vec![expr("POSITIONS__AMOUNT:SUM"), expr("QTY")]);
        assert!(expr("'x'").required_attributes().is_empty());
    }

    #[test]
    fn test_rebase_and_strip() {
        let e = expr("=Concat(NAME, COUNTRY__NAME)");
        let prefix = RelationPath::single("CUSTOMER");
        let rebased = e.rebase(&prefix);
        assert_eq!(rebased.to_string(), "=Concat(CUSTOMER__NAME, CUSTOMER__COUNTRY__NAME)");
        assert_eq!(rebased.strip_prefix(&prefix), Some(e));
        assert_eq!(expr("UID").strip_prefix(&prefix), None);
    }

    #[test]
    fn test_display_round_trip() {
        for s in [
            "CUSTOMER__NAME",
            "POSITIONS__AMOUNT:SUM",
            "=Round(Divide(A, B), 2)",
            "'O\\'Neil'",
            "1.0",
            "[#t!c#]",
        ] {
            let e = expr(s);
            assert_eq!(expr(&e.to_string()), e, "round trip of {}", s);
        }
    }

    #[test]
    fn test_default_column_name() {
        assert_eq!(expr("CUSTOMER__NAME").default_column_name(), "CUSTOMER__NAME");
        assert_eq!(expr("AMOUNT:sum").default_column_name(), "AMOUNT_SUM");
        assert_eq!(expr("=Upper(NAME)").default_column_name(), "UPPER_NAME");
        assert_eq!(expr("'-'").default_column_name(), "COLUMN");
    }

    #[test]
    fn test_evaluate_with_lookup() {
        let e = expr("=Multiply(PRICE, QTY)");
        let value = e
            .evaluate(&mut |a| match a.to_string().as_str() {
                "PRICE" => Value::Float(2.5),
                "QTY" => Value::Int(4),
                _ => Value::Null,
            })
            .unwrap();
        assert_eq!(value, Value::Float(10.0));
    }

    #[test]
    fn test_deserialize_scalars() {
        let e: Expression = serde_yaml::from_str("0").unwrap();
        assert_eq!(e, Expression::Constant(Value::Int(0)));
        let e: Expression = serde_yaml::from_str("\"'Open'\"").unwrap();
        assert_eq!(e, Expression::Constant(Value::from("Open")));
    }
}
