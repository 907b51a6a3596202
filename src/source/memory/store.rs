//! Query execution over in-memory tables

use std::collections::{HashMap, HashSet};

use crate::condition::{Condition, ConditionGroup};
use crate::expression::{AttributePath, Expression};
use crate::meta_model::{DataType, MetaModel, UidGenerator};
use crate::sheet::{Row, SortDirection};
use crate::source::error::DataSourceError;
use crate::source::query::{CreateQuery, DeleteQuery, NativeQuery, QueryResult, UpdateQuery, UpdateValues};
use crate::value::Value;

/// Rows per object alias
pub type Tables = HashMap<String, Vec<Row>>;

/// Evaluation context for one data source
pub(super) struct Store<'a> {
    pub data_source: &'a str,
    pub model: &'a MetaModel,
    pub tables: &'a Tables,
}

/// An output row with the source rows it was built from
struct OutputRow<'r> {
    row: Row,
    sources: Vec<&'r Row>,
}

impl<'a> Store<'a> {
    fn table(&self, object: &str) -> Result<&'a [Row], DataSourceError> {
        let obj = self.model.object(object)?;
        if obj.data_source != self.data_source {
            return Err(DataSourceError::UnknownObject {
                data_source: self.data_source.to_string(),
                object: object.to_string(),
            });
        }
        Ok(self.tables.get(object).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Values reached from `row` (a row of `object`) through `path`.
    /// Reverse hops may yield several values; dangling keys yield none.
    fn path_values(&self, object: &str, row: &Row, path: &AttributePath) -> Result<Vec<Value>, DataSourceError> {
        let mut current_object = object.to_string();
        let mut current: Vec<&Row> = vec![row];
        for alias in &path.relations {
            let relation = self.model.relation(&current_object, alias)?;
            let target = self.model.object(&relation.right_object)?;
            if target.data_source != self.data_source {
                return Err(DataSourceError::CrossSourceRelation {
                    data_source: self.data_source.to_string(),
                    relation: alias.clone(),
                    target: target.data_source.clone(),
                });
            }
            let table = self.table(&relation.right_object)?;
            let mut next = Vec::new();
            for r in &current {
                let Some(key) = r.get(&relation.left_attribute).filter(|v| !v.is_null()) else {
                    continue;
                };
                next.extend(
                    table
                        .iter()
                        .filter(|candidate| {
                            candidate
                                .get(&relation.right_attribute)
                                .map(|v| v.loosely_equals(key))
                                .unwrap_or(false)
                        }),
                );
            }
            current = next;
            current_object = relation.right_object;
        }
        let owner = self.model.object(&current_object)?;
        if !owner.has_attribute(&path.attribute) {
            return Err(DataSourceError::UnknownAttribute {
                object: current_object,
                attribute: path.attribute.clone(),
            });
        }
        Ok(current
            .into_iter()
            .map(|r| r.get(&path.attribute).cloned().unwrap_or(Value::Null))
            .collect())
    }

    fn has_reverse_hop(&self, object: &str, path: &AttributePath) -> Result<bool, DataSourceError> {
        Ok(self.model.resolve_path(object, path)?.has_reverse_hop())
    }

    /// Value of an expression for one source row
    fn evaluate(&self, object: &str, row: &Row, expression: &Expression) -> Result<Value, DataSourceError> {
        match expression {
            Expression::Attribute(path) => Ok(self
                .path_values(object, row, path)?
                .into_iter()
                .next()
                .unwrap_or(Value::Null)),
            Expression::Aggregate { path, function } => Ok(function.apply(&self.path_values(object, row, path)?)),
            other => {
                let mut inputs: Vec<(Expression, Value)> = Vec::new();
                for required in other.required_attributes() {
                    let value = self.evaluate(object, row, &required)?;
                    inputs.push((required, value));
                }
                other
                    .evaluate(&mut |e| {
                        inputs
                            .iter()
                            .find(|(k, _)| k == e)
                            .map(|(_, v)| v.clone())
                            .unwrap_or(Value::Null)
                    })
                    .map_err(|e| DataSourceError::Query {
                        data_source: self.data_source.to_string(),
                        message: e.to_string(),
                    })
            }
        }
    }

    /// A condition on a multi-valued attribute holds if any value matches
    fn condition_holds(&self, object: &str, row: &Row, condition: &Condition) -> Result<bool, DataSourceError> {
        if let Expression::Attribute(path) = &condition.expression {
            let values = self.path_values(object, row, path)?;
            if values.is_empty() {
                return Ok(condition.matches(&Value::Null));
            }
            return Ok(values.iter().any(|v| condition.matches(v)));
        }
        let value = self.evaluate(object, row, &condition.expression)?;
        Ok(condition.matches(&value))
    }

    fn matches(&self, object: &str, row: &Row, filters: &ConditionGroup) -> Result<bool, DataSourceError> {
        filters.evaluate(&mut |condition| self.condition_holds(object, row, condition))
    }

    fn filtered(&self, object: &str, filters: &ConditionGroup) -> Result<Vec<&'a Row>, DataSourceError> {
        let mut out = Vec::new();
        for row in self.table(object)? {
            if self.matches(object, row, filters)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    // ========================================================================
    // Read
    // ========================================================================

    pub fn read(&self, query: &NativeQuery) -> Result<QueryResult, DataSourceError> {
        let object = query.object.as_str();
        let rows = self.filtered(object, &query.filters)?;

        let mut output = if query.is_grouped() {
            self.grouped(query, rows)?
        } else {
            self.ungrouped(query, rows)?
        };

        if !query.sorters.is_empty() {
            let mut keyed = Vec::with_capacity(output.len());
            for out in output {
                let mut keys = Vec::with_capacity(query.sorters.len());
                for sorter in &query.sorters {
                    keys.push(self.output_value(query, &out, &sorter.expression)?);
                }
                keyed.push((keys, out));
            }
            keyed.sort_by(|(a, _), (b, _)| {
                for ((left, right), sorter) in a.iter().zip(b.iter()).zip(&query.sorters) {
                    let ordering = match sorter.direction {
                        SortDirection::Asc => left.compare(right),
                        SortDirection::Desc => right.compare(left),
                    };
                    if ordering != std::cmp::Ordering::Equal {
                        return ordering;
                    }
                }
                std::cmp::Ordering::Equal
            });
            output = keyed.into_iter().map(|(_, out)| out).collect();
        }

        let mut totals: Vec<Row> = Vec::new();
        for total in &query.totals {
            let values: Vec<Value> = output
                .iter()
                .map(|o| o.row.get(&total.alias).cloned().unwrap_or(Value::Null))
                .collect();
            while totals.len() <= total.row {
                totals.push(Row::new());
            }
            totals[total.row].insert(total.alias.clone(), total.function.apply(&values));
        }

        let total_row_count = output.len();
        let rows: Vec<Row> = output
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|o| o.row)
            .collect();

        Ok(QueryResult {
            rows,
            totals,
            total_row_count: Some(total_row_count),
        })
    }

    fn ungrouped<'r>(&self, query: &NativeQuery, rows: Vec<&'r Row>) -> Result<Vec<OutputRow<'r>>, DataSourceError> {
        let object = query.object.as_str();
        // Aggregates over local attributes collapse the whole result into one row
        let mut whole_table = false;
        let mut plain = None;
        for attribute in &query.attributes {
            match attribute.aggregator {
                Some(_) if !self.has_reverse_hop(object, &attribute.path)? => whole_table = true,
                None => plain = Some(attribute),
                Some(_) => {}
            }
        }
        if whole_table {
            if let Some(attribute) = plain {
                return Err(DataSourceError::MixedAggregation {
                    object: object.to_string(),
                    attribute: attribute.alias.clone(),
                });
            }
            let mut row = Row::new();
            for attribute in &query.attributes {
                let Some(function) = attribute.aggregator else { continue };
                let mut values = Vec::new();
                for source in &rows {
                    values.extend(self.path_values(object, source, &attribute.path)?);
                }
                row.insert(attribute.alias.clone(), function.apply(&values));
            }
            return Ok(vec![OutputRow { row, sources: rows }]);
        }

        let mut output = Vec::with_capacity(rows.len());
        for source in rows {
            let mut row = Row::new();
            for attribute in &query.attributes {
                let value = self.evaluate(object, source, &attribute.expression())?;
                row.insert(attribute.alias.clone(), value);
            }
            output.push(OutputRow {
                row,
                sources: vec![source],
            });
        }
        Ok(output)
    }

    fn grouped<'r>(&self, query: &NativeQuery, rows: Vec<&'r Row>) -> Result<Vec<OutputRow<'r>>, DataSourceError> {
        let object = query.object.as_str();
        for attribute in &query.attributes {
            if attribute.aggregator.is_none() && !query.group_by.contains(&attribute.path) {
                return Err(DataSourceError::MixedAggregation {
                    object: object.to_string(),
                    attribute: attribute.alias.clone(),
                });
            }
        }

        let mut index: HashMap<Vec<Option<String>>, usize> = HashMap::new();
        let mut groups: Vec<Vec<&'r Row>> = Vec::new();
        for source in rows {
            let mut key = Vec::with_capacity(query.group_by.len());
            for path in &query.group_by {
                let value = self.evaluate(object, source, &Expression::Attribute(path.clone()))?;
                key.push(value.join_key());
            }
            match index.get(&key) {
                Some(i) => groups[*i].push(source),
                None => {
                    index.insert(key, groups.len());
                    groups.push(vec![source]);
                }
            }
        }

        let mut output = Vec::with_capacity(groups.len());
        for sources in groups {
            let mut row = Row::new();
            for attribute in &query.attributes {
                let value = match attribute.aggregator {
                    None => self.evaluate(object, sources[0], &attribute.expression())?,
                    Some(function) => {
                        let mut values = Vec::new();
                        for source in &sources {
                            values.extend(self.path_values(object, source, &attribute.path)?);
                        }
                        function.apply(&values)
                    }
                };
                row.insert(attribute.alias.clone(), value);
            }
            output.push(OutputRow { row, sources });
        }
        Ok(output)
    }

    /// Value of an expression for an output row: a projected attribute if the
    /// query reads it, otherwise computed from the source rows
    fn output_value(&self, query: &NativeQuery, out: &OutputRow<'_>, expression: &Expression) -> Result<Value, DataSourceError> {
        if let Some(attribute) = query.find_attribute(expression) {
            return Ok(out.row.get(&attribute.alias).cloned().unwrap_or(Value::Null));
        }
        match (expression, out.sources.first()) {
            (Expression::Aggregate { path, function }, _) if out.sources.len() > 1 => {
                let mut values = Vec::new();
                for source in &out.sources {
                    values.extend(self.path_values(&query.object, source, path)?);
                }
                Ok(function.apply(&values))
            }
            (_, Some(source)) => self.evaluate(&query.object, source, expression),
            (_, None) => Ok(Value::Null),
        }
    }

    // ========================================================================
    // Write
    // ========================================================================

    fn check_attributes(&self, object: &str, row: &Row) -> Result<(), DataSourceError> {
        let obj = self.model.object(object)?;
        for key in row.keys() {
            if !obj.has_attribute(key) {
                return Err(DataSourceError::UnknownAttribute {
                    object: object.to_string(),
                    attribute: key.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Insert rows, generating missing UIDs
pub(super) fn create(
    data_source: &str,
    model: &MetaModel,
    tables: &mut Tables,
    query: &CreateQuery,
    generator: UidGenerator,
) -> Result<Vec<Value>, DataSourceError> {
    let store = Store {
        data_source,
        model,
        tables,
    };
    store.table(&query.object)?;
    for row in &query.rows {
        store.check_attributes(&query.object, row)?;
    }
    let obj = model.object(&query.object)?;
    let uid_attribute = obj.uid().map(|a| (a.alias.clone(), a.data_type));

    let table = tables.entry(query.object.clone()).or_default();
    let mut uids = Vec::with_capacity(query.rows.len());
    for row in &query.rows {
        let mut row = row.clone();
        let uid = match &uid_attribute {
            Some((alias, data_type)) => {
                let existing = row.get(alias).cloned().unwrap_or(Value::Null);
                let uid = if existing.is_empty() {
                    next_uid(table.as_slice(), alias, *data_type, generator)
                } else {
                    existing
                };
                row.insert(alias.clone(), uid.clone());
                uid
            }
            None => Value::Null,
        };
        table.push(row);
        uids.push(uid);
    }
    Ok(uids)
}

fn next_uid(table: &[Row], alias: &str, data_type: DataType, generator: UidGenerator) -> Value {
    let sequence = || {
        table
            .iter()
            .filter_map(|r| r.get(alias).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1
    };
    match (data_type, generator) {
        (DataType::Integer | DataType::Number, _) => Value::Int(sequence()),
        (_, UidGenerator::Sequence) => Value::String(sequence().to_string()),
        (_, UidGenerator::Uuid) => Value::String(uuid::Uuid::new_v4().to_string()),
    }
}

/// Apply an update, returning the number of rows changed
pub(super) fn update(data_source: &str, model: &MetaModel, tables: &mut Tables, query: &UpdateQuery) -> Result<usize, DataSourceError> {
    // Decide which rows to touch against a read-only view, then write
    let changes: Vec<(usize, Row)> = {
        let store = Store {
            data_source,
            model,
            tables,
        };
        let table = store.table(&query.object)?;
        let mut changes = Vec::new();
        match &query.values {
            UpdateValues::Broadcast(values) => {
                store.check_attributes(&query.object, values)?;
                for (i, row) in table.iter().enumerate() {
                    if store.matches(&query.object, row, &query.filters)? {
                        changes.push((i, values.clone()));
                    }
                }
            }
            UpdateValues::PerRow { uid_attribute, rows } => {
                for values in rows {
                    store.check_attributes(&query.object, values)?;
                    let Some(uid) = values.get(uid_attribute).filter(|v| !v.is_empty()) else {
                        continue;
                    };
                    for (i, row) in table.iter().enumerate() {
                        let same = row.get(uid_attribute).map(|v| v.loosely_equals(uid)).unwrap_or(false);
                        if same && store.matches(&query.object, row, &query.filters)? {
                            let mut values = values.clone();
                            values.remove(uid_attribute);
                            changes.push((i, values));
                        }
                    }
                }
            }
        }
        changes
    };

    let table = tables.entry(query.object.clone()).or_default();
    for (i, values) in &changes {
        for (key, value) in values {
            table[*i].insert(key.clone(), value.clone());
        }
    }
    let mut touched: Vec<usize> = changes.into_iter().map(|(i, _)| i).collect();
    touched.sort_unstable();
    touched.dedup();
    Ok(touched.len())
}

/// Delete matching rows, returning how many were removed
pub(super) fn delete(data_source: &str, model: &MetaModel, tables: &mut Tables, query: &DeleteQuery) -> Result<usize, DataSourceError> {
    let doomed: HashSet<usize> = {
        let store = Store {
            data_source,
            model,
            tables,
        };
        let mut doomed = HashSet::new();
        for (i, row) in store.table(&query.object)?.iter().enumerate() {
            if store.matches(&query.object, row, &query.filters)? {
                doomed.insert(i);
            }
        }
        doomed
    };
    if let Some(table) = tables.get_mut(&query.object) {
        let mut i = 0;
        table.retain(|_| {
            let keep = !doomed.contains(&i);
            i += 1;
            keep
        });
    }
    Ok(doomed.len())
}
