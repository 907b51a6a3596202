//! Native queries handed to data sources

use crate::condition::ConditionGroup;
use crate::expression::{AttributePath, Expression};
use crate::meta_model::AggregateFunction;
use crate::sheet::{Row, Sorter};
use crate::value::Value;

/// An attribute requested from a data source, returned under `alias`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryAttribute {
    pub alias: String,
    /// Path relative to the query's object; never leaves the data source
    pub path: AttributePath,
    pub aggregator: Option<AggregateFunction>,
}

impl QueryAttribute {
    /// The expression this attribute reads
    pub fn expression(&self) -> Expression {
        match self.aggregator {
            Some(function) => Expression::Aggregate {
                path: self.path.clone(),
                function,
            },
            None => Expression::Attribute(self.path.clone()),
        }
    }
}

/// A total computed over all matching rows, before paging
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTotal {
    /// Alias of the query attribute to aggregate
    pub alias: String,
    pub function: AggregateFunction,
    /// Total row receiving the value
    pub row: usize,
}

/// A read request against one object of one data source
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    pub object: String,
    pub attributes: Vec<QueryAttribute>,
    pub filters: ConditionGroup,
    pub sorters: Vec<Sorter>,
    pub group_by: Vec<AttributePath>,
    pub totals: Vec<QueryTotal>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl NativeQuery {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            attributes: Vec::new(),
            filters: ConditionGroup::and(),
            sorters: Vec::new(),
            group_by: Vec::new(),
            totals: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Add an attribute unless the alias is taken
    pub fn add_attribute(&mut self, alias: impl Into<String>, path: AttributePath, aggregator: Option<AggregateFunction>) {
        let alias = alias.into();
        if self.has_attribute(&alias) {
            return;
        }
        self.attributes.push(QueryAttribute { alias, path, aggregator });
    }

    pub fn has_attribute(&self, alias: &str) -> bool {
        self.attributes.iter().any(|a| a.alias == alias)
    }

    /// The attribute reading exactly this expression
    pub fn find_attribute(&self, expression: &Expression) -> Option<&QueryAttribute> {
        let path = expression.attribute_path()?;
        let aggregator = expression.aggregator();
        self.attributes
            .iter()
            .find(|a| &a.path == path && a.aggregator == aggregator)
    }

    pub fn is_grouped(&self) -> bool {
        !self.group_by.is_empty()
    }
}

/// Rows returned by a data source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows keyed by query attribute alias
    pub rows: Vec<Row>,
    pub totals: Vec<Row>,
    /// Number of rows matching the filters, ignoring paging
    pub total_row_count: Option<usize>,
}

/// Insert rows; keys are attribute aliases
#[derive(Debug, Clone, PartialEq)]
pub struct CreateQuery {
    pub object: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValues {
    /// Each row carries its own values and is matched by UID
    PerRow { uid_attribute: String, rows: Vec<Row> },
    /// The same values are applied to every row matching the filters
    Broadcast(Row),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub object: String,
    pub values: UpdateValues,
    /// Additional restriction; rows outside it are left untouched
    pub filters: ConditionGroup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteQuery {
    pub object: String,
    pub filters: ConditionGroup,
}

impl DeleteQuery {
    /// Delete rows by UID
    pub fn by_uids(object: impl Into<String>, uid_attribute: &str, uids: Vec<Value>) -> Self {
        let filters = ConditionGroup::and().with_condition(crate::condition::Condition::in_list(
            Expression::Attribute(AttributePath::new(uid_attribute)),
            uids,
        ));
        Self {
            object: object.into(),
            filters,
        }
    }
}
