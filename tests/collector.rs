//! Integration tests for enriching populated sheets with missing columns

mod common;

use common::{orders, row, strings};
use metasheet::source::OperationKind;
use metasheet::{CollectError, CollectOptions, DataSheet, Expression, Value};

fn expressions(items: &[&str]) -> Vec<Expression> {
    items.iter().map(|e| Expression::parse(e).unwrap()).collect()
}

/// Order positions as an import would deliver them: no UIDs
fn positions_without_uid() -> DataSheet {
    let mut sheet = DataSheet::new("ORDER_POS");
    sheet.add_row(row(&[("ORDER", "1".into()), ("PRODUCT", "Widget".into())]));
    sheet.add_row(row(&[("ORDER", "3".into()), ("PRODUCT", "Gadget".into())]));
    sheet
}

#[test]
fn test_enrich_by_uid_is_idempotent() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID"]);
    orders.workbench.read(&mut sheet).unwrap();
    orders.clear_operations();

    let required = expressions(&["STATUS", "CUSTOMER__NAME"]);
    let report = orders.workbench.enrich(&mut sheet, &required, None).unwrap();

    assert_eq!(report.reads, 1);
    assert_eq!(report.added_columns.len(), 2);
    assert_eq!(sheet.column_values("STATUS"), strings(&["open", "open", "closed", "closed"]));
    assert_eq!(
        sheet.column_values("CUSTOMER__NAME"),
        vec!["Acme".into(), Value::Null, "Globex".into(), "Acme".into()]
    );
    assert!(sheet.column("STATUS").unwrap().is_hidden());
    let before = sheet.clone();

    // Everything is present now: nothing is read and nothing changes
    orders.clear_operations();
    let again = orders.workbench.enrich(&mut sheet, &required, None).unwrap();
    assert_eq!(again.reads, 0);
    assert!(again.added_columns.is_empty());
    assert!(orders.erp.operations_of(OperationKind::Read).is_empty());
    assert!(orders.crm.operations_of(OperationKind::Read).is_empty());
    assert_eq!(sheet, before);
}

#[test]
fn test_enrich_keeps_values_already_in_the_sheet() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID", "STATUS"]);
    sheet.add_row(row(&[("UID", "1".into()), ("STATUS", "edited".into())]));

    let required = expressions(&["STATUS", "CUSTOMER"]);
    orders.workbench.enrich(&mut sheet, &required, None).unwrap();

    assert_eq!(sheet.cell(0, "STATUS"), Value::from("edited"));
    assert_eq!(sheet.cell(0, "CUSTOMER"), Value::from("c1"));
}

#[test]
fn test_enrich_without_uid_follows_foreign_keys() {
    let orders = orders();
    let mut sheet = positions_without_uid();

    let required = expressions(&["ORDER__CUSTOMER__NAME", "ORDER__STATUS"]);
    let report = orders.workbench.enrich(&mut sheet, &required, None).unwrap();

    // One satellite read of ORDER serves both columns
    assert_eq!(report.reads, 1);
    assert_eq!(sheet.column_values("ORDER__CUSTOMER__NAME"), strings(&["Acme", "Globex"]));
    assert_eq!(sheet.column_values("ORDER__STATUS"), strings(&["open", "closed"]));
    assert_eq!(sheet.row_count(), 2);
}

#[test]
fn test_unreadable_expression_fails_or_is_skipped() {
    let orders = orders();
    let required = expressions(&["QUANTITY"]);

    // Own attributes cannot be re-read without UIDs
    let mut sheet = positions_without_uid();
    let err = orders.workbench.enrich(&mut sheet, &required, None).unwrap_err();
    assert!(matches!(err, CollectError::Unresolvable { ref expression, .. } if expression == "QUANTITY"));

    let mut sheet = positions_without_uid();
    let options = CollectOptions { ignore_unreadable: true };
    let report = orders.workbench.enrich_with(&mut sheet, &required, options, None).unwrap();
    assert_eq!(report.skipped, vec!["QUANTITY".to_string()]);
    assert!(report.added_columns.is_empty());
    assert!(sheet.column("QUANTITY").is_none());
}

#[test]
fn test_enrich_adds_formula_inputs() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER_POS", &["UID", "QUANTITY"]);
    orders.workbench.read(&mut sheet).unwrap();

    let formula = Expression::parse("=Multiply(QUANTITY, PRICE)").unwrap();
    orders.workbench.enrich(&mut sheet, &[formula.clone()], None).unwrap();

    assert!(sheet.column("PRICE").is_some());
    let column = sheet.column_by_expression(&formula).unwrap().name().to_string();
    assert_eq!(
        sheet.column_values(&column),
        vec![Value::Float(20.0), Value::Float(25.5), Value::Float(50.0)]
    );
}

#[test]
fn test_collect_leaves_the_original_untouched() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID"]);
    orders.workbench.read(&mut sheet).unwrap();

    let copy = orders
        .workbench
        .collect(&sheet, &expressions(&["CUSTOMER__COUNTRY"]), None)
        .unwrap();

    assert!(sheet.column("CUSTOMER__COUNTRY").is_none());
    assert_eq!(
        copy.column_values("CUSTOMER__COUNTRY"),
        vec!["DE".into(), Value::Null, "US".into(), "DE".into()]
    );
}

#[test]
fn test_empty_sheet_only_gets_columns() {
    let orders = orders();
    let mut sheet = orders.sheet("ORDER", &["UID"]);

    let report = orders
        .workbench
        .enrich(&mut sheet, &expressions(&["STATUS"]), None)
        .unwrap();

    assert_eq!(report.reads, 0);
    assert!(sheet.column("STATUS").is_some());
    assert!(orders.erp.operations().is_empty());
}
