//! Delete with cascades

use tracing::debug;

use super::error::WriteError;
use super::values::uid_attribute;
use super::{in_transaction, WriteContext};
use crate::condition::{Condition, ConditionGroup};
use crate::event::{EventKind, EventPhase};
use crate::expression::{AttributePath, Expression, RelationPath};
use crate::meta_model::{MetaObject, ModelError, Relation};
use crate::planner::{read_at_depth, resolve_filters};
use crate::sheet::DataSheet;
use crate::source::{DeleteQuery, Transaction};

/// Delete the rows selected by the sheet's filters and UID values.
///
/// Rows of other objects whose mandatory key points at a deleted row (or
/// whose relation asks for it) are deleted first, leaves before parents.
/// A sheet with neither filters nor UID values is refused before anything
/// is sent to a data source. Returns the number of rows deleted from the
/// sheet's object.
pub fn delete(ctx: &WriteContext<'_>, sheet: &DataSheet, tx: Option<&mut Transaction>) -> Result<usize, WriteError> {
    if sheet.is_unfiltered() {
        return Err(WriteError::UnfilteredDelete {
            object: sheet.object().to_string(),
        });
    }
    in_transaction(tx, |tx| delete_in(ctx, sheet, tx, 0))
}

pub(crate) fn delete_in(
    ctx: &WriteContext<'_>,
    sheet: &DataSheet,
    tx: &mut Transaction,
    depth: usize,
) -> Result<usize, WriteError> {
    let obj = ctx.model.object(sheet.object())?;
    if sheet.is_unfiltered() {
        return Err(WriteError::UnfilteredDelete {
            object: obj.alias.clone(),
        });
    }
    let max = ctx.model.engine.max_cascade_depth;
    if depth > max {
        return Err(WriteError::CascadeDepthExceeded {
            object: obj.alias.clone(),
            max,
        });
    }
    ctx.events.dispatch(EventPhase::Before(EventKind::Delete), sheet, sheet.row_count());

    for relation in ctx.model.reverse_relations(&obj.alias)? {
        if !relation.cascade_delete {
            continue;
        }
        let mut dependents = cascade_sheet(ctx, obj, sheet, &relation)?;
        read_at_depth(&ctx.reader(), &mut dependents, tx, 0)?;
        if dependents.is_empty() {
            continue;
        }
        debug!(
            target: "metasheet::writer",
            "Cascading delete from '{}' to {} row(s) of '{}' (depth {})",
            obj.alias,
            dependents.row_count(),
            dependents.object(),
            depth + 1
        );
        delete_in(ctx, &dependents, tx, depth + 1)?;
    }

    let query = DeleteQuery {
        object: obj.alias.clone(),
        filters: delete_filters(ctx, obj, sheet, tx)?,
    };
    let deleted = ctx
        .connection(tx, &obj.alias)?
        .delete(ctx.model, &query)
        .map_err(|source| WriteError::DataSource {
            operation: "delete",
            object: obj.alias.clone(),
            source,
        })?;

    debug!(target: "metasheet::writer", "Deleted {} row(s) of '{}'", deleted, obj.alias);
    ctx.events.dispatch(EventPhase::After(EventKind::Delete), sheet, deleted);
    Ok(deleted)
}

/// The sheet's own filters plus membership of its UID values
fn selection(obj: &MetaObject, sheet: &DataSheet) -> Result<ConditionGroup, WriteError> {
    let mut filters = ConditionGroup::and();
    filters.add_group(sheet.filters.clone());
    let uids = sheet.uid_values();
    if !uids.is_empty() {
        let uid = uid_attribute(obj, sheet).ok_or_else(|| ModelError::MissingUid {
            object: obj.alias.clone(),
        })?;
        filters.add_condition(Condition::in_list(Expression::Attribute(AttributePath::new(uid)), uids));
    }
    Ok(filters)
}

fn delete_filters(
    ctx: &WriteContext<'_>,
    obj: &MetaObject,
    sheet: &DataSheet,
    tx: &mut Transaction,
) -> Result<ConditionGroup, WriteError> {
    let selection = selection(obj, sheet)?;
    Ok(resolve_filters(&ctx.reader(), &obj.alias, &selection, tx, 0)?)
}

/// Rows of the related object depending on the rows this sheet selects
fn cascade_sheet(
    ctx: &WriteContext<'_>,
    obj: &MetaObject,
    sheet: &DataSheet,
    relation: &Relation,
) -> Result<DataSheet, WriteError> {
    let child = ctx.model.object(&relation.right_object)?;
    let mut dependents = DataSheet::for_object(child);
    let key = Expression::Attribute(AttributePath::new(relation.right_attribute.clone()));
    match &child.uid_attribute {
        Some(uid) => {
            dependents.add_expression(Expression::Attribute(AttributePath::new(uid.clone())));
        }
        None => {
            dependents.add_expression(key.clone());
        }
    }

    // The child's key attribute is also its forward relation to us
    let back = RelationPath::single(relation.right_attribute.clone());
    let mut filters = ConditionGroup::and();
    filters.add_group(sheet.filters.rebase(&back));
    let uids = sheet.uid_values();
    if !uids.is_empty() {
        if obj.is_uid(&relation.left_attribute) {
            filters.add_condition(Condition::in_list(key, uids));
        } else {
            let uid = uid_attribute(obj, sheet).ok_or_else(|| ModelError::MissingUid {
                object: obj.alias.clone(),
            })?;
            let through = AttributePath::new(uid).prefixed(&back);
            filters.add_condition(Condition::in_list(Expression::Attribute(through), uids));
        }
    }
    dependents.filters = filters;
    Ok(dependents)
}
