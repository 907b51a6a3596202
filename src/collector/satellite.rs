//! Fetching attributes of related objects through forward relations

use std::collections::HashMap;
use tracing::{debug, warn};

use super::{write_column, CollectError, CollectOptions, CollectReport};
use crate::condition::{Condition, ConditionGroup};
use crate::expression::{AttributePath, Expression, RelationPath};
use crate::meta_model::AttributeChain;
use crate::planner::{distinct_values, read_sheet, ReadContext};
use crate::sheet::DataSheet;
use crate::source::Transaction;
use crate::value::Value;

/// One read of a related object, keyed by a foreign key column of the sheet
struct Satellite {
    key_column: String,
    object: String,
    key_attribute: String,
    /// Requested expression and the same expression relative to `object`
    members: Vec<(Expression, Expression)>,
}

pub(super) fn collect(
    ctx: &ReadContext<'_>,
    sheet: &mut DataSheet,
    missing: &[Expression],
    options: CollectOptions,
    tx: &mut Transaction,
    report: &mut CollectReport,
) -> Result<(), CollectError> {
    let mut satellites: Vec<Satellite> = Vec::new();
    for expression in missing {
        let Some(path) = expression.attribute_path() else {
            continue;
        };
        let chain = ctx.model.resolve_path(sheet.object(), path)?;
        let Some((depth, key_column)) = deepest_key(sheet, &chain, path) else {
            let reason = format!("no column of the sheet holds a foreign key on the path '{}'", path);
            if options.ignore_unreadable {
                warn!(target: "metasheet::collector", "Skipping '{}' of '{}': {}", expression, sheet.object(), reason);
                report.skipped.push(expression.to_string());
                continue;
            }
            return Err(CollectError::Unresolvable {
                object: sheet.object().to_string(),
                expression: expression.to_string(),
                reason,
            });
        };
        let hop = &chain.hops[depth - 1];
        let prefix = RelationPath::new(path.relations[..depth].to_vec());
        let Some(relative) = expression.strip_prefix(&prefix) else {
            continue;
        };
        match satellites.iter_mut().find(|s| s.key_column == key_column) {
            Some(satellite) => satellite.members.push((expression.clone(), relative)),
            None => satellites.push(Satellite {
                key_column,
                object: hop.right_object.clone(),
                key_attribute: hop.right_attribute.clone(),
                members: vec![(expression.clone(), relative)],
            }),
        }
    }

    for satellite in satellites {
        let parent_keys = sheet.column_values(&satellite.key_column);
        let keys = distinct_values(&parent_keys);

        let key_expression = Expression::Attribute(AttributePath::new(satellite.key_attribute.clone()));
        let mut related = DataSheet::new(satellite.object.clone());
        let key_name = related.add_expression(key_expression.clone()).name().to_string();
        for (_, relative) in &satellite.members {
            related.add_expression(relative.clone());
        }
        let mut index: HashMap<String, usize> = HashMap::new();
        if !keys.is_empty() {
            related.filters = ConditionGroup::and().with_condition(Condition::in_list(key_expression, keys));
            read_sheet(ctx, &mut related, tx)?;
            report.reads += 1;
            for (i, row) in related.rows().iter().enumerate() {
                if let Some(key) = row.get(&key_name).and_then(Value::join_key) {
                    index.entry(key).or_insert(i);
                }
            }
        }
        debug!(
            target: "metasheet::collector",
            "Satellite '{}' keyed by '{}': {} row(s) for {} column(s)",
            satellite.object,
            satellite.key_column,
            related.row_count(),
            satellite.members.len()
        );

        for (expression, relative) in &satellite.members {
            let Some(source) = related.column_by_expression(relative).map(|c| c.name().to_string()) else {
                continue;
            };
            let values: Vec<Value> = parent_keys
                .iter()
                .map(|key| {
                    key.join_key()
                        .and_then(|k| index.get(&k))
                        .map(|&row| related.cell(row, &source))
                        .unwrap_or(Value::Null)
                })
                .collect();
            write_column(sheet, expression, values, report)?;
        }
    }
    Ok(())
}

/// The number of hops covered and the name of the deepest sheet column
/// holding foreign key values along the chain. Columns holding at least one
/// value win over deeper empty ones.
fn deepest_key(sheet: &DataSheet, chain: &AttributeChain<'_>, path: &AttributePath) -> Option<(usize, String)> {
    let mut empty = None;
    for depth in (1..=chain.hops.len()).rev() {
        let hop = &chain.hops[depth - 1];
        let prefix = RelationPath::new(path.relations[..depth - 1].to_vec());
        let key = Expression::Attribute(AttributePath::with_relations(&prefix, hop.left_attribute.clone()));
        let Some(column) = sheet.column_by_expression(&key) else {
            continue;
        };
        let name = column.name().to_string();
        if sheet.column_values(&name).iter().any(|v| !v.is_empty()) {
            return Some((depth, name));
        }
        empty.get_or_insert((depth, name));
    }
    empty
}
