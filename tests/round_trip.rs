//! Integration tests for sheet documents and mappers

mod common;

use common::{orders, row, stored, strings};
use metasheet::sheet::Total;
use metasheet::{
    parser, AggregateFunction, Comparator, Condition, ConditionGroup, DataSheet, DataSheetMapper, Expression, MapError,
    SortDirection, Sorter, Value,
};

#[test]
fn test_sheet_document_round_trip() {
    let mut sheet = DataSheet::new("ORDER_POS").with_uid_column("UID");
    sheet.add_column_str("UID").unwrap();
    sheet.add_column_str("PRODUCT").unwrap();
    sheet
        .add_column_str("QUANTITY")
        .unwrap()
        .add_total(Total {
            function: AggregateFunction::Sum,
            row: 0,
        })
        .unwrap();
    sheet.add_column_str("=Multiply(QUANTITY, PRICE)").unwrap();
    sheet.add_row(row(&[
        ("UID", Value::Int(1)),
        ("PRODUCT", "Widget".into()),
        ("QUANTITY", Value::Int(2)),
        ("PRICE", Value::Float(10.5)),
    ]));
    sheet.calculate_totals();
    sheet.filters = ConditionGroup::or()
        .with_condition(Condition::new(Expression::parse("PRODUCT").unwrap(), Comparator::Is, "wid"))
        .with_group(ConditionGroup::and().with_condition(Condition::in_list(
            Expression::parse("ORDER__CUSTOMER__COUNTRY").unwrap(),
            strings(&["DE", "US"]),
        )));
    sheet.sorters.push(Sorter::new(Expression::parse("QUANTITY").unwrap(), SortDirection::Desc));
    sheet.limit = Some(10);
    sheet.offset = 20;

    let json = parser::sheet_to_json(&sheet).unwrap();
    let back = parser::parse_sheet_str(&json).unwrap();

    assert_eq!(back.to_document(), sheet.to_document());
    assert_eq!(back.object(), "ORDER_POS");
    assert_eq!(back.uid_column_name(), Some("UID"));
    assert_eq!(back.totals_rows()[0].get("QUANTITY"), Some(&Value::Int(2)));
    // Columns that carry values come back fresh
    assert!(back.column("PRODUCT").unwrap().is_fresh());
}

#[test]
fn test_minimal_document() {
    let json = r#"{
        "object_alias": "ORDER",
        "columns": [{"expression": "UID"}, {"expression": "CUSTOMER__NAME"}],
        "rows": [{"UID": "1", "CUSTOMER__NAME": "Acme"}]
    }"#;
    let sheet = parser::parse_sheet_str(json).unwrap();

    assert_eq!(sheet.row_count(), 1);
    assert_eq!(sheet.cell(0, "CUSTOMER__NAME"), Value::from("Acme"));
    assert!(sheet.filters.is_empty());
    assert_eq!(sheet.limit, None);
}

#[test]
fn test_mapper_builds_new_rows_from_collected_values() {
    let orders = orders();
    let mut source = orders.sheet("ORDER", &["UID"]);
    source.filters = ConditionGroup::and().with_condition(Condition::in_list(
        Expression::parse("UID").unwrap(),
        strings(&["1", "3"]),
    ));
    orders.workbench.read(&mut source).unwrap();

    let mapper = DataSheetMapper::new("ORDER", "SHIPMENT")
        .with_column(Expression::parse("UID").unwrap(), Expression::parse("ORDER").unwrap())
        .with_column(
            Expression::parse("CUSTOMER__NAME").unwrap(),
            Expression::parse("CARRIER").unwrap(),
        );
    let mut shipments = orders.workbench.map(&mapper, &source, None).unwrap();

    // The source sheet is not enriched in place
    assert!(source.column("CUSTOMER__NAME").is_none());
    assert_eq!(shipments.object(), "SHIPMENT");
    assert_eq!(shipments.column_values("ORDER"), strings(&["1", "3"]));
    assert_eq!(shipments.column_values("CARRIER"), strings(&["Acme", "Globex"]));

    assert_eq!(orders.workbench.create(&mut shipments, None).unwrap(), 2);
    assert_eq!(stored(&orders.erp, "SHIPMENT", "ORDER"), strings(&["1", "1", "3"]));
}

#[test]
fn test_mapper_from_yaml_turns_columns_into_filters() {
    let orders = orders();
    let mapper = parser::parse_mapper_str(
        r#"
from_object: ORDER
to_object: ORDER_POS
column_to_filter_mappings:
  - from: UID
    to: ORDER
row_filter:
  operator: AND
  conditions:
    - expression: STATUS
      comparator: "=="
      value: open
"#,
    )
    .unwrap();

    let mut source = orders.sheet("ORDER", &["UID"]);
    orders.workbench.read(&mut source).unwrap();
    let mut positions = orders.workbench.map(&mapper, &source, None).unwrap();

    // Only the open orders end up in the filter
    let condition = &positions.filters.conditions[0];
    assert_eq!(condition.expression, Expression::parse("ORDER").unwrap());
    assert_eq!(condition.operands(), strings(&["1", "2"]));

    positions.add_column_str("UID").unwrap();
    positions.add_column_str("PRODUCT").unwrap();
    orders.workbench.read(&mut positions).unwrap();
    assert_eq!(positions.column_values("UID"), vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn test_mapper_rejects_other_objects() {
    let orders = orders();
    let mapper = DataSheetMapper::new("CUSTOMER", "ORDER");
    let sheet = orders.sheet("ORDER", &["UID"]);

    let err = orders.workbench.map(&mapper, &sheet, None).unwrap_err();
    assert!(matches!(err, MapError::ObjectMismatch { .. }));
}

#[test]
fn test_mapper_single_value_filter_needs_one_distinct_value() {
    let orders = orders();
    let mut source = orders.sheet("ORDER", &["UID", "STATUS"]);
    orders.workbench.read(&mut source).unwrap();

    let mut mapper = DataSheetMapper::new("ORDER", "ORDER_POS");
    mapper.column_to_filter_mappings.push(metasheet::mapper::ColumnToFilterMapping {
        from: Expression::parse("STATUS").unwrap(),
        to: Expression::parse("ORDER__STATUS").unwrap(),
        comparator: Some(Comparator::Equals),
    });

    let err = orders.workbench.map(&mapper, &source, None).unwrap_err();
    assert!(matches!(err, MapError::AmbiguousFilterValue { count: 2, .. }));
}
