//! Data collector (verb module)
//!
//! Makes sure a populated sheet holds the columns a consumer is about to
//! evaluate (filter conditions, mapper inputs, formulas). Missing columns are
//! fetched without touching values already in the sheet:
//!
//! - **by UID**: when every row carries a UID, the missing columns are read
//!   for those UIDs in one query and copied back by UID lookup;
//! - **by forward relations**: otherwise each missing attribute of a related
//!   object is read from a satellite sheet keyed by the deepest foreign key
//!   column the sheet already holds.
//!
//! What neither strategy can reach fails with [`CollectError::Unresolvable`]
//! or is skipped, as the caller's [`CollectOptions`] decide.

mod by_uid;
mod error;
mod satellite;

pub use error::CollectError;

use tracing::{debug, warn};

use crate::condition::ConditionGroup;
use crate::expression::Expression;
use crate::meta_model::{EngineConfig, MetaModel};
use crate::planner::ReadContext;
use crate::sheet::DataSheet;
use crate::source::Transaction;
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOptions {
    /// Skip expressions that cannot be collected instead of failing
    pub ignore_unreadable: bool,
}

impl CollectOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            ignore_unreadable: config.ignore_unreadable,
        }
    }
}

/// What an [`enrich`] call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Columns added to the sheet, in order
    pub added_columns: Vec<String>,
    /// Non-null cells written
    pub values_written: usize,
    /// Sheet reads issued, each counting once with the subsheets it joins
    pub reads: usize,
    /// Expressions left out under `ignore_unreadable`
    pub skipped: Vec<String>,
}

/// Add the `required` expressions missing from `sheet` and fill them.
///
/// Columns already present are never re-read, so a repeated call with the
/// same expressions reads nothing.
///
/// Rows are re-read by UID whenever every row carries one, even if the sheet
/// holds edited values. Only the missing columns are read, so edits survive.
pub fn enrich(
    ctx: &ReadContext<'_>,
    sheet: &mut DataSheet,
    required: &[Expression],
    options: CollectOptions,
    tx: &mut Transaction,
) -> Result<CollectReport, CollectError> {
    let mut report = CollectReport::default();
    let mut missing: Vec<Expression> = Vec::new();
    let mut formulas: Vec<Expression> = Vec::new();
    for expression in required {
        if sheet.column_by_expression(expression).is_some() {
            continue;
        }
        match expression {
            Expression::Attribute(_) | Expression::Aggregate { .. } => push_unique(&mut missing, expression),
            Expression::Formula(_) => {
                for input in expression.required_attributes() {
                    if sheet.column_by_expression(&input).is_none() {
                        push_unique(&mut missing, &input);
                    }
                }
                push_unique(&mut formulas, expression);
            }
            Expression::Constant(_) | Expression::Reference(_) => {}
        }
    }
    if missing.is_empty() && formulas.is_empty() {
        return Ok(report);
    }
    if sheet.is_empty() {
        for expression in missing.iter().chain(&formulas) {
            let column = sheet.add_expression(expression.clone());
            column.set_hidden(true);
            report.added_columns.push(column.name().to_string());
        }
        return Ok(report);
    }

    let mut readable = Vec::with_capacity(missing.len());
    for expression in missing {
        match check_collectable(ctx.model, sheet, &expression)? {
            None => readable.push(expression),
            Some(reason) if options.ignore_unreadable => {
                warn!(
                    target: "metasheet::collector",
                    "Skipping '{}' of '{}': {}",
                    expression,
                    sheet.object(),
                    reason
                );
                report.skipped.push(expression.to_string());
            }
            Some(reason) => {
                return Err(CollectError::Unresolvable {
                    object: sheet.object().to_string(),
                    expression: expression.to_string(),
                    reason,
                })
            }
        }
    }

    if !readable.is_empty() {
        if by_uid::applies(sheet) {
            by_uid::collect(ctx, sheet, &readable, tx, &mut report)?;
        } else {
            satellite::collect(ctx, sheet, &readable, options, tx, &mut report)?;
        }
    }

    for formula in &formulas {
        let column = sheet.add_expression(formula.clone());
        column.set_hidden(true);
        report.added_columns.push(column.name().to_string());
    }
    if !formulas.is_empty() || report.values_written > 0 {
        sheet.recalculate_formulas()?;
    }

    debug!(
        target: "metasheet::collector",
        "Collected {} column(s) for '{}': {} value(s) in {} read(s), {} skipped",
        report.added_columns.len(),
        sheet.object(),
        report.values_written,
        report.reads,
        report.skipped.len()
    );
    Ok(report)
}

/// An enriched copy of `sheet`
pub fn collect(
    ctx: &ReadContext<'_>,
    sheet: &DataSheet,
    required: &[Expression],
    options: CollectOptions,
    tx: &mut Transaction,
) -> Result<DataSheet, CollectError> {
    let mut copy = sheet.clone();
    enrich(ctx, &mut copy, required, options, tx)?;
    Ok(copy)
}

/// Enrich a sheet with everything `filter` needs to be evaluated in memory
pub fn enrich_for_filter(
    ctx: &ReadContext<'_>,
    sheet: &mut DataSheet,
    filter: &ConditionGroup,
    options: CollectOptions,
    tx: &mut Transaction,
) -> Result<CollectReport, CollectError> {
    let required = filter.expressions();
    enrich(ctx, sheet, &required, options, tx)
}

/// Add a hidden column for `expression` and fill it. The column only
/// becomes fresh if at least one value is not null.
fn write_column(
    sheet: &mut DataSheet,
    expression: &Expression,
    values: Vec<Value>,
    report: &mut CollectReport,
) -> Result<(), CollectError> {
    let written = values.iter().filter(|v| !v.is_null()).count();
    let column = sheet.add_expression(expression.clone());
    column.set_hidden(true);
    let name = column.name().to_string();
    report.added_columns.push(name.clone());
    if written > 0 {
        sheet.set_column_values(&name, values)?;
        report.values_written += written;
    }
    Ok(())
}

fn push_unique(list: &mut Vec<Expression>, expression: &Expression) {
    if !list.contains(expression) {
        list.push(expression.clone());
    }
}

/// Why an expression cannot be collected into this sheet, if it cannot.
/// Paths that do not exist in the model are errors, not policy.
fn check_collectable(model: &MetaModel, sheet: &DataSheet, expression: &Expression) -> Result<Option<String>, CollectError> {
    let Some(path) = expression.attribute_path() else {
        return Ok(None);
    };
    let chain = model.resolve_path(sheet.object(), path)?;
    if !chain.attribute.readable {
        return Ok(Some(format!(
            "attribute '{}' of '{}' is not readable",
            chain.attribute.alias, chain.object.alias
        )));
    }
    if expression.is_aggregate() && !chain.has_reverse_hop() {
        return Ok(Some("aggregating over the sheet's own rows has no per-row value".to_string()));
    }
    if by_uid::applies(sheet) {
        return Ok(None);
    }
    if path.is_local() {
        return Ok(Some("the sheet has no UID values to re-read its rows by".to_string()));
    }
    if chain.has_reverse_hop() {
        return Ok(Some("the path follows a reverse relation and the sheet has no UID values".to_string()));
    }
    Ok(None)
}
