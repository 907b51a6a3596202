//! Mapper definitions, as loaded from YAML

use serde::Deserialize;

use crate::condition::{Comparator, ConditionGroup};
use crate::expression::Expression;

/// Copy the values of a source expression into a target column
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnMapping {
    pub from: Expression,
    pub to: Expression,
}

/// Turn the values of a source column into a filter of the target sheet
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnToFilterMapping {
    pub from: Expression,
    pub to: Expression,
    /// `IN` over the distinct values unless a comparator is given, in which
    /// case a single distinct value is required
    #[serde(default)]
    pub comparator: Option<Comparator>,
}

/// Carry a condition of the source sheet's filters over to another expression
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterToFilterMapping {
    pub from: Expression,
    pub to: Expression,
}

/// Translates a data sheet of one object into a data sheet of another
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataSheetMapper {
    pub from_object: String,
    pub to_object: String,
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,
    #[serde(default)]
    pub column_to_filter_mappings: Vec<ColumnToFilterMapping>,
    #[serde(default)]
    pub filter_to_filter_mappings: Vec<FilterToFilterMapping>,
    /// Only source rows matching this group are mapped
    #[serde(default)]
    pub row_filter: Option<ConditionGroup>,
    /// Copy the source sheet's filters to the target sheet
    #[serde(default)]
    pub inherit_filters: bool,
    /// Overrides the engine's collector policy for this mapper
    #[serde(default)]
    pub ignore_unreadable: Option<bool>,
}

impl DataSheetMapper {
    pub fn new(from_object: impl Into<String>, to_object: impl Into<String>) -> Self {
        Self {
            from_object: from_object.into(),
            to_object: to_object.into(),
            column_mappings: Vec::new(),
            column_to_filter_mappings: Vec::new(),
            filter_to_filter_mappings: Vec::new(),
            row_filter: None,
            inherit_filters: false,
            ignore_unreadable: None,
        }
    }

    pub fn with_column(mut self, from: Expression, to: Expression) -> Self {
        self.column_mappings.push(ColumnMapping { from, to });
        self
    }

    pub fn with_column_to_filter(mut self, from: Expression, to: Expression) -> Self {
        self.column_to_filter_mappings.push(ColumnToFilterMapping {
            from,
            to,
            comparator: None,
        });
        self
    }

    pub fn with_filter_to_filter(mut self, from: Expression, to: Expression) -> Self {
        self.filter_to_filter_mappings.push(FilterToFilterMapping { from, to });
        self
    }

    /// Source expressions whose values the mapper reads
    pub fn required_expressions(&self) -> Vec<Expression> {
        let mut out: Vec<Expression> = Vec::new();
        let from_columns = self
            .column_mappings
            .iter()
            .map(|m| &m.from)
            .chain(self.column_to_filter_mappings.iter().map(|m| &m.from))
            .cloned();
        let from_filter = self.row_filter.iter().flat_map(ConditionGroup::expressions);
        for expression in from_columns.chain(from_filter) {
            if !expression.is_constant() && !out.contains(&expression) {
                out.push(expression);
            }
        }
        out
    }
}
