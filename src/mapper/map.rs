//! Running a mapper

use tracing::debug;

use super::definition::DataSheetMapper;
use super::error::MapError;
use crate::collector::{collect, CollectOptions};
use crate::condition::{Comparator, Condition, LogicalOperator};
use crate::expression::Expression;
use crate::planner::{distinct_values, ReadContext};
use crate::sheet::DataSheet;
use crate::source::Transaction;
use crate::value::Value;

impl DataSheetMapper {
    /// Build a sheet of the target object from `from_sheet`.
    ///
    /// Source values the sheet does not hold yet are collected first, on a
    /// copy; `from_sheet` itself is left untouched.
    pub fn map(&self, ctx: &ReadContext<'_>, from_sheet: &DataSheet, tx: &mut Transaction) -> Result<DataSheet, MapError> {
        if from_sheet.object() != self.from_object {
            return Err(MapError::ObjectMismatch {
                expected: self.from_object.clone(),
                actual: from_sheet.object().to_string(),
            });
        }
        let to_object = ctx.model.object(&self.to_object)?;
        let options = CollectOptions {
            ignore_unreadable: self.ignore_unreadable.unwrap_or(ctx.model.engine.ignore_unreadable),
        };
        let mut source = collect(ctx, from_sheet, &self.required_expressions(), options, tx)?;
        if let Some(row_filter) = &self.row_filter {
            source = source.extract(row_filter)?;
        }

        let mut target = DataSheet::for_object(to_object);
        if self.inherit_filters {
            target.filters = from_sheet.filters.clone();
        }

        // Only conditions that must all hold can be carried over one by one
        if from_sheet.filters.operator == LogicalOperator::And {
            for mapping in &self.filter_to_filter_mappings {
                for condition in from_sheet.filters.conditions.iter().filter(|c| c.expression == mapping.from) {
                    target.filters.add_condition(Condition {
                        expression: mapping.to.clone(),
                        ..condition.clone()
                    });
                }
            }
        }

        for mapping in &self.column_to_filter_mappings {
            let Some(values) = source_values(&source, &mapping.from)? else {
                continue;
            };
            let distinct = distinct_values(&values);
            let condition = match mapping.comparator {
                None | Some(Comparator::In) => Condition::in_list(mapping.to.clone(), distinct),
                Some(comparator) => match distinct.as_slice() {
                    [single] => Condition::new(mapping.to.clone(), comparator, single.clone()),
                    _ => {
                        return Err(MapError::AmbiguousFilterValue {
                            expression: mapping.to.to_string(),
                            comparator: comparator.to_string(),
                            count: distinct.len(),
                        })
                    }
                },
            };
            target.filters.add_condition(condition);
        }

        for mapping in &self.column_mappings {
            let values = source_values(&source, &mapping.from)?.unwrap_or_else(|| vec![Value::Null; source.row_count()]);
            let column = target.add_expression(mapping.to.clone()).name().to_string();
            target.set_column_values(&column, values)?;
        }

        debug!(
            target: "metasheet::mapper",
            "Mapped {} row(s) of '{}' to '{}' ({} column(s), {} filter condition(s))",
            source.row_count(),
            self.from_object,
            self.to_object,
            target.columns().len(),
            target.filters.all_conditions().len()
        );
        Ok(target)
    }
}

/// Values of an expression per row; `None` if the collector skipped an input
fn source_values(sheet: &DataSheet, expression: &Expression) -> Result<Option<Vec<Value>>, MapError> {
    if !sheet.can_evaluate(expression) {
        return Ok(None);
    }
    let mut values = Vec::with_capacity(sheet.row_count());
    for row in 0..sheet.row_count() {
        values.push(sheet.evaluate_for_row(expression, row)?);
    }
    Ok(Some(values))
}
