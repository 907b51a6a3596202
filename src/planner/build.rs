//! Read planning
//!
//! Splits the columns of a data sheet by data source: attributes stored with
//! the sheet's object become attributes of one native query, attributes
//! behind a relation into another data source become columns of a
//! [`Subsheet`] keyed by the relation path up to the boundary.

use tracing::debug;

use super::error::PlanError;
use crate::condition::ConditionGroup;
use crate::expression::{AttributePath, Expression, RelationPath};
use crate::meta_model::{AttributeChain, MetaModel, MetaObject, Relation};
use crate::sheet::{Aggregator, Column, DataSheet, Subsheet, Total};
use crate::source::{NativeQuery, QueryTotal};

/// A native query for the sheet's own data source plus the subsheets to
/// read and join afterwards, in discovery order
#[derive(Debug, Clone)]
pub struct ReadPlan {
    pub query: NativeQuery,
    pub subsheets: Vec<Subsheet>,
    /// Sorters and paging are applied after the joins instead of by the data source
    pub sort_in_memory: bool,
    /// Totals computed over the loaded rows: `(column name, total)`
    pub memory_totals: Vec<(String, Total)>,
}

/// Plan the read of `sheet` with already resolved (single source) `filters`.
///
/// Adds hidden columns to the sheet for join keys, grouping attributes,
/// system attributes and the inputs of formulas and in-memory sorters.
pub fn plan_read(
    model: &MetaModel,
    sheet: &mut DataSheet,
    filters: ConditionGroup,
    depth: usize,
) -> Result<ReadPlan, PlanError> {
    let root = model.object(sheet.object())?;
    let mut planner = Planner {
        model,
        root,
        depth,
        query: NativeQuery::new(root.alias.clone()),
        subsheets: Vec::new(),
    };
    let aggregated = sheet.is_aggregated() || planner.collapses(sheet)?;

    // Grouping
    for aggregator in sheet.aggregators.clone() {
        let Expression::Attribute(path) = &aggregator.expression else {
            return Err(planner.unsupported(&aggregator.expression, "only attributes can be grouped"));
        };
        let chain = model.resolve_path(&root.alias, path)?;
        if chain.first_boundary(model).is_some() {
            return Err(planner.unsupported(&aggregator.expression, "cannot group by an attribute of another data source"));
        }
        let name = ensure_column(sheet, aggregator.expression.clone());
        planner.query.add_attribute(name, path.clone(), None);
        if !planner.query.group_by.contains(path) {
            planner.query.group_by.push(path.clone());
        }
    }

    // Sorters the data source cannot evaluate are applied after the joins
    let mut sort_in_memory = false;
    for sorter in &sheet.sorters {
        if !planner.is_local(&sorter.expression)? {
            sort_in_memory = true;
        }
    }
    if sort_in_memory {
        for sorter in sheet.sorters.clone() {
            for required in sorter.expression.required_attributes() {
                ensure_column(sheet, required);
            }
        }
    }

    // Columns, including the inputs of formulas
    let columns: Vec<(String, Expression, Option<Expression>)> = sheet
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.expression().clone(), c.formula().cloned()))
        .collect();
    for (name, expression, formula) in columns {
        let mut required = expression.required_attributes();
        if let Some(formula) = &formula {
            for input in formula.required_attributes() {
                if !required.contains(&input) {
                    required.push(input);
                }
            }
        }
        for input in required {
            let target = if input == expression {
                name.clone()
            } else {
                ensure_column(sheet, input.clone())
            };
            planner.plan_attribute(sheet, &target, &input)?;
        }
    }

    // System attributes and the UID
    for attribute in root.system_attributes() {
        let path = AttributePath::new(attribute.alias.clone());
        let aggregator = if aggregated && !planner.query.group_by.contains(&path) {
            match attribute.default_aggregator.or(root.default_aggregator) {
                Some(function) => Some(function),
                None => {
                    debug!(target: "metasheet::planner", "Skipping system attribute {}.{}: no default aggregator", root.alias, attribute.alias);
                    continue;
                }
            }
        } else {
            None
        };
        let expression = match aggregator {
            Some(function) => Expression::Aggregate {
                path: path.clone(),
                function,
            },
            None => Expression::Attribute(path.clone()),
        };
        let name = ensure_column(sheet, expression);
        planner.query.add_attribute(name, path, aggregator);
    }
    if !aggregated {
        if let Some(uid) = sheet.uid_column_name().map(str::to_string) {
            if sheet.column(&uid).is_none() {
                sheet.add_column(Column::new(uid.clone(), Expression::Attribute(AttributePath::new(uid.clone()))).hidden());
            }
            if let Some(path) = sheet.column(&uid).and_then(Column::attribute_path).cloned() {
                if model.resolve_path(&root.alias, &path)?.first_boundary(model).is_none() {
                    planner.query.add_attribute(uid, path, None);
                }
            }
        }
    }

    // Filters must stay inside the data source at this point
    for required in filters.required_attributes() {
        if !planner.is_local(&required)? {
            return Err(planner.unsupported(&required, "filter references another data source"));
        }
    }
    planner.query.filters = filters;

    // Totals
    let mut memory_totals = Vec::new();
    for column in sheet.columns().iter() {
        for total in column.totals() {
            if !sort_in_memory && planner.query.has_attribute(column.name()) {
                planner.query.totals.push(QueryTotal {
                    alias: column.name().to_string(),
                    function: total.function,
                    row: total.row,
                });
            } else {
                memory_totals.push((column.name().to_string(), *total));
            }
        }
    }

    if !sort_in_memory {
        planner.query.sorters = sheet.sorters.clone();
        planner.query.limit = sheet.limit;
        planner.query.offset = sheet.offset;
    }

    debug!(
        target: "metasheet::planner",
        "Planned read of '{}': {} attribute(s), {} subsheet(s), depth {}",
        root.alias,
        planner.query.attributes.len(),
        planner.subsheets.len(),
        depth
    );
    Ok(ReadPlan {
        query: planner.query,
        subsheets: planner.subsheets,
        sort_in_memory,
        memory_totals,
    })
}

/// Name of the column bound to `expression`, adding a hidden one if needed
pub(crate) fn ensure_column(sheet: &mut DataSheet, expression: Expression) -> String {
    if let Some(column) = sheet.column_by_expression(&expression) {
        return column.name().to_string();
    }
    let column = sheet.add_expression(expression);
    column.set_hidden(true);
    column.name().to_string()
}

struct Planner<'a> {
    model: &'a MetaModel,
    root: &'a MetaObject,
    depth: usize,
    query: NativeQuery,
    subsheets: Vec<Subsheet>,
}

impl<'a> Planner<'a> {
    fn unsupported(&self, expression: &Expression, reason: &str) -> PlanError {
        PlanError::Unsupported {
            object: self.root.alias.clone(),
            expression: expression.to_string(),
            reason: reason.to_string(),
        }
    }

    fn chain(&self, path: &AttributePath) -> Result<AttributeChain<'a>, PlanError> {
        Ok(self.model.resolve_path(&self.root.alias, path)?)
    }

    /// Every attribute the expression reads lives in the root's data source
    fn is_local(&self, expression: &Expression) -> Result<bool, PlanError> {
        for required in expression.required_attributes() {
            if let Some(path) = required.attribute_path() {
                if self.chain(path)?.first_boundary(self.model).is_some() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// A local aggregate over the root's own rows collapses the result into one row
    fn collapses(&self, sheet: &DataSheet) -> Result<bool, PlanError> {
        for column in sheet.columns().iter() {
            if let Expression::Aggregate { path, .. } = column.expression() {
                let chain = self.chain(path)?;
                if chain.first_boundary(self.model).is_none() && !chain.has_reverse_hop() {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Route one attribute (or aggregate) expression held by `column` to the
    /// native query or to a subsheet
    fn plan_attribute(&mut self, sheet: &mut DataSheet, column: &str, expression: &Expression) -> Result<(), PlanError> {
        let Some(path) = expression.attribute_path() else {
            return Ok(());
        };
        let chain = self.chain(path)?;
        if !chain.attribute.readable {
            return Err(PlanError::UnreadableAttribute {
                object: chain.object.alias.clone(),
                attribute: chain.attribute.alias.clone(),
            });
        }
        match chain.first_boundary(self.model) {
            None => {
                if chain.has_reverse_hop() && !expression.is_aggregate() {
                    return Err(PlanError::ReverseRelationRequiresAggregator {
                        object: self.root.alias.clone(),
                        expression: expression.to_string(),
                    });
                }
                if !expression.is_aggregate() {
                    if let Some(c) = sheet.column_mut(column) {
                        if c.data_type().is_none() {
                            c.set_data_type(chain.attribute.data_type);
                        }
                    }
                }
                self.query.add_attribute(column, path.clone(), expression.aggregator());
                Ok(())
            }
            Some(boundary) => {
                let hops = chain.hops.clone();
                self.plan_subsheet(sheet, expression, path, &hops, boundary)
            }
        }
    }

    fn plan_subsheet(
        &mut self,
        sheet: &mut DataSheet,
        expression: &Expression,
        path: &AttributePath,
        hops: &[Relation],
        boundary: usize,
    ) -> Result<(), PlanError> {
        if hops[..boundary].iter().any(Relation::is_reverse) {
            return Err(self.unsupported(expression, "one-to-many relation before a data source boundary"));
        }
        let prefix = RelationPath::new(path.relations[..=boundary].to_vec());
        let local = RelationPath::new(path.relations[..boundary].to_vec());
        let rest = AttributePath::with_relations(
            &RelationPath::new(path.relations[boundary + 1..].to_vec()),
            path.attribute.clone(),
        );
        let relation = hops[boundary].clone();
        let inner = match expression {
            Expression::Aggregate { function, .. } => Expression::Aggregate {
                path: rest.clone(),
                function: *function,
            },
            _ => Expression::Attribute(rest.clone()),
        };
        if relation.is_reverse() && !inner.is_aggregate() {
            return Err(PlanError::ReverseRelationRequiresAggregator {
                object: self.root.alias.clone(),
                expression: expression.to_string(),
            });
        }
        if relation.is_forward()
            && inner.is_aggregate()
            && !self.model.resolve_path(&relation.right_object, &rest)?.has_reverse_hop()
        {
            return Err(self.unsupported(expression, "aggregate over a to-one relation"));
        }

        let index = match self.subsheets.iter().position(|s| s.relation_path == prefix) {
            Some(index) => index,
            None => {
                let max = self.model.engine.max_relation_depth;
                if self.depth + 1 > max {
                    return Err(PlanError::RelationDepthExceeded {
                        object: self.root.alias.clone(),
                        expression: expression.to_string(),
                        max,
                    });
                }
                let parent_key = AttributePath::with_relations(&local, relation.left_attribute.clone());
                let parent_key_column = ensure_column(sheet, Expression::Attribute(parent_key.clone()));
                self.query.add_attribute(parent_key_column.clone(), parent_key, None);

                let target = self.model.object(&relation.right_object)?;
                let mut child = DataSheet::for_object(target);
                let child_key = Expression::Attribute(AttributePath::new(relation.right_attribute.clone()));
                let child_key_column = ensure_column(&mut child, child_key.clone());
                if relation.is_reverse() {
                    child.aggregators.push(Aggregator::new(child_key));
                }
                debug!(
                    target: "metasheet::planner",
                    "Subsheet on '{}' for '{}' via {} ({} = {})",
                    target.alias,
                    self.root.alias,
                    prefix,
                    parent_key_column,
                    child_key_column
                );
                self.subsheets.push(Subsheet {
                    sheet: child,
                    relation_path: prefix,
                    relation,
                    parent_key_column,
                    child_key_column,
                });
                self.subsheets.len() - 1
            }
        };
        let child = &mut self.subsheets[index].sheet;
        if child.column_by_expression(&inner).is_none() {
            child.add_expression(inner);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Comparator, Condition};
    use crate::meta_model::AggregateFunction;
    use crate::sheet::Sorter;

    const YAML: &str = r#"
objects:
  - alias: ORDER
    data_source: erp
    uid: UID
    attributes:
      - alias: UID
        type: integer
        system: true
      - alias: AMOUNT
        type: number
      - alias: CUSTOMER
        relation:
          object: CUSTOMER
  - alias: ORDER_POS
    data_source: erp
    uid: UID
    attributes:
      - alias: UID
      - alias: ORDER
        required: true
        relation:
          object: ORDER
          reverse_alias: POSITIONS
      - alias: QTY
        type: integer
  - alias: CUSTOMER
    data_source: crm
    uid: UID
    attributes:
      - alias: UID
      - alias: NAME
      - alias: COUNTRY
        relation:
          object: COUNTRY
      - alias: SECRET
        readable: false
  - alias: COUNTRY
    data_source: geo
    uid: UID
    attributes:
      - alias: UID
      - alias: NAME
  - alias: TICKET
    data_source: crm
    uid: UID
    attributes:
      - alias: UID
      - alias: ORDER
        relation:
          object: ORDER
          reverse_alias: TICKETS
"#;

    fn model() -> MetaModel {
        serde_yaml::from_str(YAML).unwrap()
    }

    fn order_sheet(columns: &[&str]) -> DataSheet {
        let model = model();
        let mut sheet = DataSheet::for_object(model.object("ORDER").unwrap());
        for c in columns {
            sheet.add_column_str(c).unwrap();
        }
        sheet
    }

    fn aliases(query: &NativeQuery) -> Vec<&str> {
        query.attributes.iter().map(|a| a.alias.as_str()).collect()
    }

    #[test]
    fn test_local_columns_go_to_the_query() {
        let model = model();
        let mut sheet = order_sheet(&["AMOUNT", "POSITIONS__QTY:SUM"]);
        let plan = plan_read(&model, &mut sheet, ConditionGroup::and(), 0).unwrap();
        assert!(plan.subsheets.is_empty());
        assert_eq!(aliases(&plan.query), vec!["AMOUNT", "POSITIONS__QTY_SUM", "UID"]);
        assert_eq!(plan.query.attributes[1].aggregator, Some(AggregateFunction::Sum));
        assert!(sheet.column("UID").unwrap().is_hidden());
    }

    #[test]
    fn test_cross_source_column_creates_subsheet() {
        let model = model();
        let mut sheet = order_sheet(&["UID", "CUSTOMER__NAME", "CUSTOMER__COUNTRY__NAME"]);
        let plan = plan_read(&model, &mut sheet, ConditionGroup::and(), 0).unwrap();

        assert_eq!(plan.subsheets.len(), 1, "one subsheet per boundary relation path");
        let sub = &plan.subsheets[0];
        assert_eq!(sub.object(), "CUSTOMER");
        assert_eq!(sub.relation_path.to_string(), "CUSTOMER");
        assert_eq!(sub.parent_key_column, "CUSTOMER");
        assert_eq!(sub.child_key_column, "UID");
        assert!(sub.sheet.column("NAME").is_some());
        assert!(sub.sheet.column("COUNTRY__NAME").is_some());

        // The foreign key is read, the remote attribute is not
        assert_eq!(aliases(&plan.query), vec!["UID", "CUSTOMER"]);
        assert!(sheet.column("CUSTOMER").unwrap().is_hidden());
    }

    #[test]
    fn test_reverse_subsheet_is_grouped_by_key() {
        let model = model();
        let mut sheet = order_sheet(&["UID", "TICKETS__UID:COUNT"]);
        let plan = plan_read(&model, &mut sheet, ConditionGroup::and(), 0).unwrap();
        let sub = &plan.subsheets[0];
        assert!(sub.is_reverse());
        assert_eq!(sub.parent_key_column, "UID");
        assert_eq!(sub.child_key_column, "ORDER");
        assert_eq!(sub.sheet.aggregators.len(), 1);
        assert!(sub.sheet.column("UID_COUNT").is_some());

        let mut plain = order_sheet(&["TICKETS__UID"]);
        let err = plan_read(&model, &mut plain, ConditionGroup::and(), 0).unwrap_err();
        assert!(matches!(err, PlanError::ReverseRelationRequiresAggregator { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let mut model = model();
        model.engine.max_relation_depth = 0;
        let mut sheet = order_sheet(&["CUSTOMER__NAME"]);
        let err = plan_read(&model, &mut sheet, ConditionGroup::and(), 0).unwrap_err();
        assert!(matches!(err, PlanError::RelationDepthExceeded { max: 0, .. }));
    }

    #[test]
    fn test_unreadable_attribute() {
        let model = model();
        let mut sheet = order_sheet(&["CUSTOMER__SECRET"]);
        let err = plan_read(&model, &mut sheet, ConditionGroup::and(), 0).unwrap_err();
        assert!(matches!(err, PlanError::UnreadableAttribute { .. }));
    }

    #[test]
    fn test_aggregated_sheet_uses_group_by() {
        let model = model();
        let mut sheet = order_sheet(&["CUSTOMER", "AMOUNT:SUM"]);
        sheet.aggregators.push(Aggregator::new(Expression::parse("CUSTOMER").unwrap()));
        let plan = plan_read(&model, &mut sheet, ConditionGroup::and(), 0).unwrap();
        assert_eq!(plan.query.group_by, vec![AttributePath::new("CUSTOMER")]);
        // UID is a system attribute without default aggregator: skipped
        assert_eq!(aliases(&plan.query), vec!["CUSTOMER", "AMOUNT_SUM"]);
    }

    #[test]
    fn test_remote_sorter_sorts_in_memory() {
        let model = model();
        let mut sheet = order_sheet(&["UID"]);
        sheet.sorters.push(Sorter::desc(Expression::parse("CUSTOMER__NAME").unwrap()));
        sheet.limit = Some(10);
        let plan = plan_read(&model, &mut sheet, ConditionGroup::and(), 0).unwrap();
        assert!(plan.sort_in_memory);
        assert!(plan.query.sorters.is_empty());
        assert_eq!(plan.query.limit, None);
        assert!(sheet.column("CUSTOMER__NAME").unwrap().is_hidden());
        assert_eq!(plan.subsheets.len(), 1);
    }

    #[test]
    fn test_remote_filter_is_rejected() {
        let model = model();
        let mut sheet = order_sheet(&["UID"]);
        let filters = ConditionGroup::and().with_condition(Condition::new(
            Expression::parse("CUSTOMER__NAME").unwrap(),
            Comparator::Is,
            "Acme",
        ));
        let err = plan_read(&model, &mut sheet, filters, 0).unwrap_err();
        assert!(matches!(err, PlanError::Unsupported { .. }));
    }
}
