//! Read execution
//!
//! Runs a [`ReadPlan`](super::ReadPlan): the native query first, then every
//! subsheet filtered by the parent's key values and joined back in discovery
//! order, then everything the data source could not do (formulas, in-memory
//! totals, sorting and paging over joined columns).

use tracing::debug;

use super::build::plan_read;
use super::error::ReadError;
use super::filters::{distinct_values, resolve_filters};
use super::join::left_join;
use crate::condition::{Condition, ConditionGroup};
use crate::expression::{AttributePath, Expression};
use crate::meta_model::MetaModel;
use crate::sheet::DataSheet;
use crate::source::{Connection, DataSourceRegistry, Transaction};
use crate::value::Value;

/// What a read needs besides the sheet and the transaction
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    pub model: &'a MetaModel,
    pub sources: &'a DataSourceRegistry,
}

impl<'a> ReadContext<'a> {
    pub fn new(model: &'a MetaModel, sources: &'a DataSourceRegistry) -> Self {
        Self { model, sources }
    }

    /// The transaction's connection to the data source holding `object`
    pub(crate) fn connection<'t>(&self, tx: &'t mut Transaction, object: &str) -> Result<&'t mut dyn Connection, ReadError> {
        let data_source = self.model.data_source_of(object)?;
        let source = self
            .sources
            .get(data_source)
            .ok_or_else(|| ReadError::DataSourceNotRegistered {
                object: object.to_string(),
                data_source: data_source.to_string(),
            })?;
        Ok(tx.connection(source)?)
    }
}

/// Replace the rows of `sheet` with the rows matching its filters
pub fn read_sheet(ctx: &ReadContext<'_>, sheet: &mut DataSheet, tx: &mut Transaction) -> Result<(), ReadError> {
    read_at_depth(ctx, sheet, tx, 0)
}

pub(crate) fn read_at_depth(
    ctx: &ReadContext<'_>,
    sheet: &mut DataSheet,
    tx: &mut Transaction,
    depth: usize,
) -> Result<(), ReadError> {
    let object = sheet.object().to_string();
    let filters = resolve_filters(ctx, &object, &sheet.filters, tx, depth)?;
    let mut plan = plan_read(ctx.model, sheet, filters, depth)?;

    let result = ctx
        .connection(tx, &object)?
        .read(ctx.model, &plan.query)
        .map_err(|source| ReadError::DataSource {
            object: object.clone(),
            source,
        })?;

    sheet.clear_rows();
    sheet.add_rows(result.rows);
    for (i, totals) in result.totals.into_iter().enumerate() {
        for (column, value) in totals {
            sheet.set_total(i, &column, value);
        }
    }
    sheet.set_total_row_count(result.total_row_count);
    for attribute in &plan.query.attributes {
        if let Some(column) = sheet.column_mut(&attribute.alias) {
            column.mark_fresh();
        }
    }

    // Subsheets depend on the parent's keys and are read strictly after it
    for subsheet in plan.subsheets.iter_mut() {
        let keys = distinct_values(&sheet.column_values(&subsheet.parent_key_column));
        if keys.is_empty() {
            subsheet.sheet.clear_rows();
        } else {
            let key = Expression::Attribute(AttributePath::new(subsheet.relation.right_attribute.clone()));
            subsheet.sheet.filters = ConditionGroup::and().with_condition(Condition::in_list(key, keys));
            read_at_depth(ctx, &mut subsheet.sheet, tx, depth + 1)?;
        }
        left_join(sheet, subsheet)?;
    }

    fill_constants(sheet)?;
    for (column, total) in &plan.memory_totals {
        let values = sheet.column_values(column);
        sheet.set_total(total.row, column, total.function.apply(&values));
    }
    sheet.recalculate_formulas()?;

    if plan.sort_in_memory {
        let sorters = sheet.sorters.clone();
        sheet.sort_rows(&sorters)?;
        let matching = sheet.row_count();
        sheet.retain_page(sheet.offset, sheet.limit);
        sheet.set_total_row_count(Some(matching));
    }

    debug!(
        target: "metasheet::planner",
        "Read {} row(s) of '{}' ({} total) at depth {}",
        sheet.row_count(),
        object,
        sheet.total_row_count(),
        depth
    );
    Ok(())
}

/// Constant columns hold their value in every row; references are null
fn fill_constants(sheet: &mut DataSheet) -> Result<(), ReadError> {
    let constants: Vec<(String, Value)> = sheet
        .columns()
        .iter()
        .filter_map(|c| match c.expression() {
            Expression::Constant(value) => Some((c.name().to_string(), value.clone())),
            Expression::Reference(_) => Some((c.name().to_string(), Value::Null)),
            _ => None,
        })
        .collect();
    let rows = sheet.row_count();
    for (name, value) in constants {
        sheet.set_column_values(&name, vec![value; rows])?;
    }
    Ok(())
}
