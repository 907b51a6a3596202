//! Create

use tracing::debug;

use super::error::WriteError;
use super::validate::validate;
use super::values::{fill_required_from_filters, inject_values, row_values, uid_column, writable_columns};
use super::{in_transaction, WriteContext};
use crate::event::{EventKind, EventPhase};
use crate::sheet::{DataSheet, Row};
use crate::source::{CreateQuery, Transaction};

/// Insert every row of the sheet and write the UIDs the data source assigned
/// back into the sheet's UID column. Returns the number of rows created.
pub fn create(ctx: &WriteContext<'_>, sheet: &mut DataSheet, tx: Option<&mut Transaction>) -> Result<usize, WriteError> {
    in_transaction(tx, |tx| create_in(ctx, sheet, tx))
}

pub(crate) fn create_in(ctx: &WriteContext<'_>, sheet: &mut DataSheet, tx: &mut Transaction) -> Result<usize, WriteError> {
    let obj = ctx.model.object(sheet.object())?;
    ctx.events.dispatch(EventPhase::Before(EventKind::Create), sheet, sheet.row_count());
    if sheet.is_empty() {
        ctx.events.dispatch(EventPhase::After(EventKind::Create), sheet, 0);
        return Ok(0);
    }

    inject_values(obj, sheet, true)?;
    fill_required_from_filters(obj, sheet)?;
    validate(ctx, sheet, true)?;

    let columns = writable_columns(obj, sheet)?;
    let rows: Vec<Row> = (0..sheet.row_count())
        .map(|i| row_values(sheet, i, &columns, true))
        .collect();
    let query = CreateQuery {
        object: obj.alias.clone(),
        rows,
    };
    let uids = ctx
        .connection(tx, &obj.alias)?
        .create(ctx.model, &query)
        .map_err(|source| WriteError::DataSource {
            operation: "create",
            object: obj.alias.clone(),
            source,
        })?;

    if let Some(column) = uid_column(ctx.model, sheet)? {
        for (row, uid) in uids.into_iter().enumerate().take(sheet.row_count()) {
            if !uid.is_null() {
                sheet.set_cell(row, &column, uid)?;
            }
        }
        if let Some(column) = sheet.column_mut(&column) {
            column.mark_fresh();
        }
    }

    let created = query.rows.len();
    debug!(target: "metasheet::writer", "Created {} row(s) of '{}'", created, obj.alias);
    ctx.events.dispatch(EventPhase::After(EventKind::Create), sheet, created);
    Ok(created)
}
