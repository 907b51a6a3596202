//! Re-reading rows by UID

use tracing::debug;

use super::{write_column, CollectError, CollectReport};
use crate::condition::{Condition, ConditionGroup};
use crate::expression::Expression;
use crate::planner::{distinct_values, read_sheet, ReadContext};
use crate::sheet::{DataSheet, SheetError};
use crate::source::Transaction;
use crate::value::Value;

/// Every row has a UID of the sheet's own object and rows are not groups
pub(super) fn applies(sheet: &DataSheet) -> bool {
    let local_uid = sheet
        .uid_column()
        .and_then(|c| c.attribute_path())
        .is_some_and(|path| path.is_local());
    local_uid && !sheet.is_aggregated() && !sheet.is_empty() && sheet.uid_values().len() == sheet.row_count()
}

pub(super) fn collect(
    ctx: &ReadContext<'_>,
    sheet: &mut DataSheet,
    missing: &[Expression],
    tx: &mut Transaction,
    report: &mut CollectReport,
) -> Result<(), CollectError> {
    let mut probe = sheet.copy_uid_only()?;
    let (uid_column, uid_expression) = match probe.uid_column() {
        Some(column) => (column.name().to_string(), column.expression().clone()),
        None => {
            return Err(SheetError::UidColumnMissing {
                sheet: sheet.object().to_string(),
            }
            .into())
        }
    };
    for expression in missing {
        probe.add_expression(expression.clone());
    }
    let uids = sheet.column_values(&uid_column);
    probe.filters = ConditionGroup::and().with_condition(Condition::in_list(uid_expression, distinct_values(&uids)));
    read_sheet(ctx, &mut probe, tx)?;
    report.reads += 1;

    // Rows may come back in any order
    let index = probe.uid_index();
    for expression in missing {
        let Some(source) = probe.column_by_expression(expression).map(|c| c.name().to_string()) else {
            continue;
        };
        let values: Vec<Value> = uids
            .iter()
            .map(|uid| {
                uid.join_key()
                    .and_then(|key| index.get(&key))
                    .map(|&row| probe.cell(row, &source))
                    .unwrap_or(Value::Null)
            })
            .collect();
        write_column(sheet, expression, values, report)?;
    }
    debug!(
        target: "metasheet::collector",
        "Re-read {} row(s) of '{}' by UID for {} column(s)",
        probe.row_count(),
        sheet.object(),
        missing.len()
    );
    Ok(())
}
