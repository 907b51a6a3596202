//! Update

use std::collections::HashSet;
use tracing::debug;

use super::create::create_in;
use super::error::WriteError;
use super::validate::validate;
use super::values::{inject_values, row_values, uid_attribute, writable_columns, WriteColumn};
use super::{in_transaction, WriteContext};
use crate::condition::{Condition, ConditionGroup};
use crate::event::{EventKind, EventPhase};
use crate::expression::{AttributePath, Expression};
use crate::meta_model::{MetaObject, ModelError};
use crate::planner::{read_at_depth, resolve_filters};
use crate::sheet::{DataSheet, Row, SheetError};
use crate::source::{Transaction, UpdateQuery, UpdateValues};
use crate::value::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Create rows whose UID is empty or not yet in the data source
    pub create_if_missing: bool,
    /// Match rows by UID alone instead of also requiring the sheet's filters.
    /// Has no effect without a UID column: broadcast updates always keep them.
    pub ignore_filters: bool,
}

impl UpdateOptions {
    pub fn create_if_missing() -> Self {
        Self {
            create_if_missing: true,
            ignore_filters: false,
        }
    }
}

/// Write the sheet's values to the data source.
///
/// A sheet with a UID column updates each row by its UID. A sheet without one
/// applies the same values to every row matching its filters; all rows must
/// then agree on each value. Returns the number of rows created and updated.
pub fn update(
    ctx: &WriteContext<'_>,
    sheet: &mut DataSheet,
    options: UpdateOptions,
    tx: Option<&mut Transaction>,
) -> Result<usize, WriteError> {
    in_transaction(tx, |tx| update_in(ctx, sheet, options, tx))
}

pub(crate) fn update_in(
    ctx: &WriteContext<'_>,
    sheet: &mut DataSheet,
    options: UpdateOptions,
    tx: &mut Transaction,
) -> Result<usize, WriteError> {
    let obj = ctx.model.object(sheet.object())?;
    ctx.events.dispatch(EventPhase::Before(EventKind::Update), sheet, sheet.row_count());

    let mut targets: Vec<usize> = (0..sheet.row_count()).collect();
    let mut created = 0;
    if options.create_if_missing && sheet.has_uid_column() {
        let missing = missing_rows(ctx, obj, sheet, tx)?;
        if !missing.is_empty() {
            // Created rows must exist before the update statement runs
            let uid_column = uid_column_name(sheet)?;
            let mut new_rows = sheet.copy_rows(&missing);
            created = create_in(ctx, &mut new_rows, tx)?;
            for (k, &row) in missing.iter().enumerate() {
                sheet.set_cell(row, &uid_column, new_rows.cell(k, &uid_column))?;
            }
            targets.retain(|row| !missing.contains(row));
        }
    }

    inject_values(obj, sheet, false)?;
    validate(ctx, sheet, false)?;
    let columns = writable_columns(obj, sheet)?;

    let values = if sheet.has_uid_column() {
        let uid_attribute = uid_attribute(obj, sheet).ok_or_else(|| ModelError::MissingUid {
            object: obj.alias.clone(),
        })?;
        let uid_column = uid_column_name(sheet)?;
        let mut rows = Vec::with_capacity(targets.len());
        for &row in &targets {
            if sheet.cell(row, &uid_column).is_empty() {
                debug!(target: "metasheet::writer", "Skipping row {} of '{}' without UID", row, obj.alias);
                continue;
            }
            rows.push(row_values(sheet, row, &columns, false));
        }
        (!rows.is_empty()).then_some(UpdateValues::PerRow { uid_attribute, rows })
    } else {
        if sheet.filters.is_empty() {
            return Err(WriteError::UnfilteredUpdate {
                object: obj.alias.clone(),
            });
        }
        broadcast_values(obj, sheet, &columns)?.map(UpdateValues::Broadcast)
    };

    let mut updated = 0;
    if let Some(values) = values {
        let per_row = matches!(values, UpdateValues::PerRow { .. });
        let filters = if options.ignore_filters && per_row {
            ConditionGroup::and()
        } else {
            resolve_filters(&ctx.reader(), &obj.alias, &sheet.filters, tx, 0)?
        };
        let query = UpdateQuery {
            object: obj.alias.clone(),
            values,
            filters,
        };
        updated = ctx
            .connection(tx, &obj.alias)?
            .update(ctx.model, &query)
            .map_err(|source| WriteError::DataSource {
                operation: "update",
                object: obj.alias.clone(),
                source,
            })?;
    }

    debug!(
        target: "metasheet::writer",
        "Updated {} and created {} row(s) of '{}'",
        updated,
        created,
        obj.alias
    );
    ctx.events.dispatch(EventPhase::After(EventKind::Update), sheet, updated + created);
    Ok(updated + created)
}

fn uid_column_name(sheet: &DataSheet) -> Result<String, WriteError> {
    let column = sheet.uid_column().ok_or_else(|| SheetError::UidColumnMissing {
        sheet: sheet.object().to_string(),
    })?;
    Ok(column.name().to_string())
}

/// Rows whose UID is empty or unknown to the data source
fn missing_rows(
    ctx: &WriteContext<'_>,
    obj: &MetaObject,
    sheet: &DataSheet,
    tx: &mut Transaction,
) -> Result<Vec<usize>, WriteError> {
    let uid_column = uid_column_name(sheet)?;
    let uids = sheet.uid_values();
    let mut existing = HashSet::new();
    if !uids.is_empty() {
        let uid_attribute = uid_attribute(obj, sheet).ok_or_else(|| ModelError::MissingUid {
            object: obj.alias.clone(),
        })?;
        let expression = Expression::Attribute(AttributePath::new(uid_attribute));
        let mut probe = DataSheet::new(obj.alias.clone());
        let column = probe.add_expression(expression.clone()).name().to_string();
        probe.set_uid_column(Some(column.clone()));
        probe.filters = ConditionGroup::and().with_condition(Condition::in_list(expression, uids));
        read_at_depth(&ctx.reader(), &mut probe, tx, 0)?;
        existing = probe
            .column_values(&column)
            .iter()
            .filter_map(Value::join_key)
            .collect();
    }
    Ok((0..sheet.row_count())
        .filter(|&row| {
            sheet
                .cell(row, &uid_column)
                .join_key()
                .map_or(true, |key| !existing.contains(&key))
        })
        .collect())
}

/// The single set of values applied to all matching rows
fn broadcast_values(obj: &MetaObject, sheet: &DataSheet, columns: &[WriteColumn]) -> Result<Option<Row>, WriteError> {
    if sheet.is_empty() {
        return Ok(None);
    }
    for column in columns {
        let first = sheet.cell(0, &column.column);
        if (1..sheet.row_count()).any(|row| !sheet.cell(row, &column.column).loosely_equals(&first)) {
            return Err(WriteError::AmbiguousBroadcast {
                object: obj.alias.clone(),
                column: column.column.clone(),
            });
        }
    }
    let values = row_values(sheet, 0, columns, false);
    Ok((!values.is_empty()).then_some(values))
}
