//! Integration tests for reads across data sources
//!
//! Orders live in the `erp` source, customers in `crm`. Columns behind the
//! ORDER -> CUSTOMER relation are read as subsheets and left joined.

mod common;

use std::sync::Arc;

use parking_lot::Mutex;

use common::{orders, strings};
use metasheet::source::OperationKind;
use metasheet::{plan_read, Comparator, Condition, ConditionGroup, EventPhase, Expression, PlanError, ReadError, SortDirection, Sorter, Value};

fn uid_in(values: &[&str]) -> ConditionGroup {
    ConditionGroup::and().with_condition(Condition::in_list(Expression::parse("UID").unwrap(), strings(values)))
}

#[test]
fn test_cross_source_column_is_left_joined() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID", "CUSTOMER__NAME"]);
    sheet.filters = uid_in(&["1", "2"]);

    orders.workbench.read(&mut sheet).expect("Read should succeed");

    assert_eq!(sheet.row_count(), 2);
    assert_eq!(sheet.column_values("UID"), strings(&["1", "2"]));
    // Order 2 has no customer: the row is kept with a null name
    assert_eq!(sheet.column_values("CUSTOMER__NAME"), vec![Value::from("Acme"), Value::Null]);

    // One read per data source; the subsheet only asked for the keys present
    let crm_reads = orders.crm.operations_of(OperationKind::Read);
    assert_eq!(crm_reads.len(), 1);
    assert_eq!(crm_reads[0].object, "CUSTOMER");
    assert_eq!(crm_reads[0].rows, 1);
    assert_eq!(orders.erp.operations_of(OperationKind::Read).len(), 1);
}

#[test]
fn test_subsheet_is_skipped_without_keys() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID", "CUSTOMER__NAME"]);
    sheet.filters = uid_in(&["2"]);

    orders.workbench.read(&mut sheet).unwrap();

    assert_eq!(sheet.row_count(), 1);
    assert_eq!(sheet.cell(0, "CUSTOMER__NAME"), Value::Null);
    assert!(orders.crm.operations_of(OperationKind::Read).is_empty());
}

#[test]
fn test_plan_splits_columns_by_data_source() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID", "STATUS", "CUSTOMER__NAME", "CUSTOMER__COUNTRY"]);

    let plan = plan_read(orders.workbench.model(), &mut sheet, ConditionGroup::and(), 0).unwrap();

    let native: Vec<&str> = plan.query.attributes.iter().map(|a| a.alias.as_str()).collect();
    assert!(native.contains(&"UID"));
    assert!(native.contains(&"STATUS"));
    assert!(native.contains(&"CUSTOMER"), "the join key is read with the order");
    assert!(!native.iter().any(|a| a.starts_with("CUSTOMER__")));

    // Both customer columns share one subsheet
    assert_eq!(plan.subsheets.len(), 1);
    let subsheet = &plan.subsheets[0];
    assert_eq!(subsheet.sheet.object(), "CUSTOMER");
    assert_eq!(subsheet.parent_key_column, "CUSTOMER");
    assert_eq!(subsheet.child_key_column, "UID");
}

#[test]
fn test_reverse_relation_across_sources_is_aggregated() {
    let orders = orders();
    let mut sheet = orders.sheet("CUSTOMER", &["UID", "NAME", "ORDERS__UID:COUNT"]);

    orders.workbench.read(&mut sheet).unwrap();

    let count = Expression::parse("ORDERS__UID:COUNT").unwrap();
    let column = sheet.column_by_expression(&count).unwrap().name().to_string();
    assert_eq!(sheet.column_values("UID"), strings(&["c1", "c2"]));
    assert_eq!(sheet.column_values(&column), vec![Value::Int(2), Value::Int(1)]);
}

#[test]
fn test_reverse_relation_requires_aggregator() {
    let orders = orders();
    let mut sheet = orders.sheet("CUSTOMER", &["UID", "ORDERS__STATUS"]);

    let err = orders.workbench.read(&mut sheet).unwrap_err();
    assert!(matches!(
        err,
        ReadError::Plan(PlanError::ReverseRelationRequiresAggregator { .. })
    ));
}

#[test]
fn test_filter_on_remote_attribute() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID"]);
    sheet.filters.add_condition(Condition::new(
        Expression::parse("CUSTOMER__COUNTRY").unwrap(),
        Comparator::Equals,
        "DE",
    ));

    orders.workbench.read(&mut sheet).unwrap();

    assert_eq!(sheet.column_values("UID"), strings(&["1", "4"]));
}

#[test]
fn test_remote_sorter_pages_after_join() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID", "CUSTOMER__NAME"]);
    sheet.sorters.push(Sorter::new(Expression::parse("CUSTOMER__NAME").unwrap(), SortDirection::Desc));
    sheet.limit = Some(2);

    orders.workbench.read(&mut sheet).unwrap();

    // Globex, Acme (order 1), Acme (order 4), then the order without customer
    assert_eq!(sheet.column_values("UID"), strings(&["3", "1"]));
    assert_eq!(sheet.total_row_count(), 4);
}

#[test]
fn test_formula_is_calculated_after_read() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER_POS", &["UID", "=Multiply(QUANTITY, PRICE)"]);

    orders.workbench.read(&mut sheet).unwrap();

    let formula = Expression::parse("=Multiply(QUANTITY, PRICE)").unwrap();
    let column = sheet.column_by_expression(&formula).unwrap().name().to_string();
    assert_eq!(
        sheet.column_values(&column),
        vec![Value::Float(20.0), Value::Float(25.5), Value::Float(50.0)]
    );
    // Formula inputs are read as hidden columns
    assert!(sheet.column("QUANTITY").unwrap().is_hidden());
}

#[test]
fn test_read_fires_events() {
    let mut orders = orders();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    orders
        .workbench
        .subscribe(move |event| sink.lock().push((event.phase, event.affected_rows)));

    let mut sheet = orders.sheet("ORDER", &["UID"]);
    orders.workbench.read(&mut sheet).unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, EventPhase::Before(metasheet::EventKind::Read));
    assert_eq!(seen[1], (EventPhase::After(metasheet::EventKind::Read), 4));
}
