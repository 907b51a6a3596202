//! Data sheet columns

use serde::{Deserialize, Serialize};

use super::error::SheetError;
use crate::expression::{AttributePath, Expression, RelationPath};
use crate::meta_model::{AggregateFunction, DataType};

/// An aggregate shown in one of the sheet's total rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Total {
    pub function: AggregateFunction,
    /// Index of the total row receiving the value
    #[serde(default)]
    pub row: usize,
}

/// A named column bound to an expression
///
/// Values are not stored here but in the rows of the owning [`DataSheet`]
/// under the column name.
///
/// [`DataSheet`]: super::DataSheet
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    expression: Expression,
    hidden: bool,
    data_type: Option<DataType>,
    fresh: bool,
    formula: Option<Expression>,
    totals: Vec<Total>,
}

impl Column {
    pub fn new(name: impl Into<String>, expression: Expression) -> Self {
        Self {
            name: name.into(),
            expression,
            hidden: false,
            data_type: None,
            fresh: false,
            formula: None,
            totals: Vec::new(),
        }
    }

    /// A column named after its expression
    pub fn from_expression(expression: Expression) -> Self {
        Self::new(expression.default_column_name(), expression)
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_formula(mut self, formula: Expression) -> Self {
        self.formula = Some(formula);
        self
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    pub fn set_data_type(&mut self, data_type: DataType) {
        self.data_type = Some(data_type);
    }

    /// Whether the column's values are known to be current
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Mark the values as current. Freshness is only lost through a rename
    /// that drops values or by removing the column.
    pub fn mark_fresh(&mut self) {
        self.fresh = true;
    }

    pub(crate) fn invalidate(&mut self) {
        self.fresh = false;
    }

    /// Secondary formula computing the column's values
    pub fn formula(&self) -> Option<&Expression> {
        self.formula.as_ref()
    }

    pub fn set_formula(&mut self, formula: Expression) {
        self.formula = Some(formula);
    }

    /// The expression values are computed from in memory: the secondary
    /// formula, or the column expression itself if it is a formula
    pub fn calculation(&self) -> Option<&Expression> {
        match (&self.formula, &self.expression) {
            (Some(formula), _) => Some(formula),
            (None, expression @ Expression::Formula(_)) => Some(expression),
            _ => None,
        }
    }

    pub fn totals(&self) -> &[Total] {
        &self.totals
    }

    /// Attach a total. Only attribute-bound columns can carry totals.
    pub fn add_total(&mut self, total: Total) -> Result<(), SheetError> {
        if !self.is_attribute_bound() {
            return Err(SheetError::TotalRequiresAttribute {
                column: self.name.clone(),
                expression: self.expression.to_string(),
            });
        }
        if !self.totals.contains(&total) {
            self.totals.push(total);
        }
        Ok(())
    }

    /// Bound to an attribute (possibly aggregated) rather than a formula or constant
    pub fn is_attribute_bound(&self) -> bool {
        self.expression.attribute_path().is_some()
    }

    pub fn attribute_path(&self) -> Option<&AttributePath> {
        self.expression.attribute_path()
    }

    pub fn is_aggregated(&self) -> bool {
        self.expression.is_aggregate()
    }

    /// A detached copy that must be populated again
    pub fn copy(&self) -> Self {
        let mut column = self.clone();
        column.fresh = false;
        column
    }

    /// A detached copy seen from an object `prefix` hops up the relation graph
    pub fn rebase(&self, prefix: &RelationPath) -> Self {
        let expression = self.expression.rebase(prefix);
        let mut column = Column::new(expression.default_column_name(), expression);
        column.hidden = self.hidden;
        column.data_type = self.data_type;
        column.formula = self.formula.as_ref().map(|f| f.rebase(prefix));
        column
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_require_attribute() {
        let mut column = Column::from_expression(Expression::parse("AMOUNT").unwrap());
        column
            .add_total(Total {
                function: AggregateFunction::Sum,
                row: 0,
            })
            .unwrap();
        assert_eq!(column.totals().len(), 1);

        let mut formula = Column::from_expression(Expression::parse("=Upper(NAME)").unwrap());
        let err = formula
            .add_total(Total {
                function: AggregateFunction::Count,
                row: 0,
            })
            .unwrap_err();
        assert!(matches!(err, SheetError::TotalRequiresAttribute { .. }));
    }

    #[test]
    fn test_copy_clears_freshness() {
        let mut column = Column::from_expression(Expression::parse("NAME").unwrap());
        column.mark_fresh();
        assert!(column.is_fresh());
        assert!(!column.copy().is_fresh());
    }

    #[test]
    fn test_calculation() {
        let plain = Column::from_expression(Expression::parse("NAME").unwrap());
        assert!(plain.calculation().is_none());
        let computed = plain.clone().with_formula(Expression::parse("=Lower(NAME)").unwrap());
        assert!(computed.calculation().is_some());
        let formula = Column::from_expression(Expression::parse("=Now()").unwrap());
        assert!(formula.calculation().is_some());
    }

    #[test]
    fn test_rebase() {
        let column = Column::from_expression(Expression::parse("NAME").unwrap()).hidden();
        let rebased = column.rebase(&RelationPath::single("CUSTOMER"));
        assert_eq!(rebased.name(), "CUSTOMER__NAME");
        assert!(rebased.is_hidden());
        assert!(!rebased.is_fresh());
    }
}
