//! Cross-source filter resolution
//!
//! A data source can only evaluate conditions on its own objects. A condition
//! reaching into another data source is answered first by reading the related
//! object with the condition relative to it, and then replaced by a key
//! membership condition the sheet's own data source can evaluate.

use std::collections::HashSet;
use tracing::debug;

use super::build::ensure_column;
use super::error::{PlanError, ReadError};
use super::read::{read_at_depth, ReadContext};
use crate::condition::{Condition, ConditionGroup};
use crate::expression::{AttributePath, Expression, RelationPath};
use crate::sheet::DataSheet;
use crate::source::Transaction;
use crate::value::Value;

/// The filter tree of `object` with every cross-source condition replaced
pub(crate) fn resolve_filters(
    ctx: &ReadContext<'_>,
    object: &str,
    filters: &ConditionGroup,
    tx: &mut Transaction,
    depth: usize,
) -> Result<ConditionGroup, ReadError> {
    let mut resolved = ConditionGroup::new(filters.operator);
    for condition in &filters.conditions {
        resolved.add_condition(resolve_condition(ctx, object, condition, tx, depth)?);
    }
    for group in &filters.groups {
        resolved.add_group(resolve_filters(ctx, object, group, tx, depth)?);
    }
    Ok(resolved)
}

fn resolve_condition(
    ctx: &ReadContext<'_>,
    object: &str,
    condition: &Condition,
    tx: &mut Transaction,
    depth: usize,
) -> Result<Condition, ReadError> {
    let Some(path) = condition.expression.attribute_path() else {
        return Ok(condition.clone());
    };
    let chain = ctx.model.resolve_path(object, path)?;
    let Some(boundary) = chain.first_boundary(ctx.model) else {
        return Ok(condition.clone());
    };
    let unsupported = |reason: &str| PlanError::Unsupported {
        object: object.to_string(),
        expression: condition.expression.to_string(),
        reason: reason.to_string(),
    };
    if condition.expression.is_aggregate() {
        return Err(unsupported("aggregated filter across data sources").into());
    }
    let max = ctx.model.engine.max_relation_depth;
    if depth + 1 > max {
        return Err(PlanError::RelationDepthExceeded {
            object: object.to_string(),
            expression: condition.expression.to_string(),
            max,
        }
        .into());
    }

    let relation = chain.hops[boundary].clone();
    let prefix = RelationPath::new(path.relations[..=boundary].to_vec());
    let local = RelationPath::new(path.relations[..boundary].to_vec());
    let inner = condition
        .strip_prefix(&prefix)
        .ok_or_else(|| unsupported("condition does not follow the relation path"))?;

    let mut lookup = DataSheet::new(relation.right_object.clone());
    let key_column = ensure_column(
        &mut lookup,
        Expression::Attribute(AttributePath::new(relation.right_attribute.clone())),
    );
    lookup.filters = ConditionGroup::and().with_condition(inner);
    read_at_depth(ctx, &mut lookup, tx, depth + 1)?;

    let keys = distinct_values(&lookup.column_values(&key_column));
    debug!(
        target: "metasheet::planner",
        "Resolved filter '{}' on '{}' to {} key(s) of '{}'",
        condition,
        object,
        keys.len(),
        relation.right_object
    );
    Ok(Condition::in_list(
        Expression::Attribute(AttributePath::with_relations(&local, relation.left_attribute)),
        keys,
    ))
}

/// Non-empty values without duplicates, in order of appearance
pub(crate) fn distinct_values(values: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| !v.is_empty())
        .filter(|v| v.join_key().map(|k| seen.insert(k)).unwrap_or(false))
        .cloned()
        .collect()
}
