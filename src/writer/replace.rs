//! Replace by filter

use std::collections::HashSet;
use tracing::debug;

use super::delete::delete_in;
use super::error::WriteError;
use super::update::{update_in, UpdateOptions};
use super::values::uid_attribute;
use super::{in_transaction, WriteContext};
use crate::condition::Condition;
use crate::event::{EventKind, EventPhase};
use crate::expression::{AttributePath, Expression};
use crate::meta_model::ModelError;
use crate::planner::read_at_depth;
use crate::sheet::{DataSheet, SheetError};
use crate::source::Transaction;
use crate::value::Value;

/// Make the data source hold exactly the sheet's rows within its filters.
///
/// With `delete_redundant`, rows matching the filters whose UID is not in the
/// sheet are deleted first (with cascades). The sheet's rows are then written
/// by UID, creating the ones the data source does not know. The filters are
/// not applied to that update, so rows whose filtered attribute changes are
/// still written.
pub fn replace_by_filter(
    ctx: &WriteContext<'_>,
    sheet: &mut DataSheet,
    delete_redundant: bool,
    tx: Option<&mut Transaction>,
) -> Result<usize, WriteError> {
    in_transaction(tx, |tx| replace_in(ctx, sheet, delete_redundant, tx))
}

fn replace_in(
    ctx: &WriteContext<'_>,
    sheet: &mut DataSheet,
    delete_redundant: bool,
    tx: &mut Transaction,
) -> Result<usize, WriteError> {
    let obj = ctx.model.object(sheet.object())?;
    if !sheet.has_uid_column() {
        return Err(SheetError::UidColumnMissing {
            sheet: obj.alias.clone(),
        }
        .into());
    }
    if delete_redundant && sheet.filters.is_empty() {
        return Err(WriteError::UnfilteredReplace {
            object: obj.alias.clone(),
        });
    }
    ctx.events.dispatch(EventPhase::Before(EventKind::Replace), sheet, sheet.row_count());

    let mut deleted = 0;
    if delete_redundant {
        let uid = uid_attribute(obj, sheet).ok_or_else(|| ModelError::MissingUid {
            object: obj.alias.clone(),
        })?;
        let expression = Expression::Attribute(AttributePath::new(uid));

        let mut current = DataSheet::new(obj.alias.clone());
        let column = current.add_expression(expression.clone()).name().to_string();
        current.set_uid_column(Some(column.clone()));
        current.filters = sheet.filters.clone();
        read_at_depth(&ctx.reader(), &mut current, tx, 0)?;

        let keep: HashSet<String> = sheet.uid_values().iter().filter_map(Value::join_key).collect();
        let redundant: Vec<Value> = current
            .uid_values()
            .into_iter()
            .filter(|v| v.join_key().map_or(false, |key| !keep.contains(&key)))
            .collect();
        if !redundant.is_empty() {
            debug!(
                target: "metasheet::writer",
                "Replacing '{}': {} row(s) no longer present",
                obj.alias,
                redundant.len()
            );
            let mut doomed = DataSheet::new(obj.alias.clone());
            doomed.set_uid_column(Some(column.clone()));
            doomed.add_expression(expression.clone());
            doomed.filters.add_condition(Condition::in_list(expression, redundant));
            deleted = delete_in(ctx, &doomed, tx, 0)?;
        }
    }

    let options = UpdateOptions {
        create_if_missing: true,
        ignore_filters: true,
    };
    let written = update_in(ctx, sheet, options, tx)?;

    ctx.events.dispatch(EventPhase::After(EventKind::Replace), sheet, written + deleted);
    Ok(written + deleted)
}
