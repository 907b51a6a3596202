//! Left join of a subsheet into its parent
//!
//! Every parent row keeps its position. Subsheet columns are imported under
//! the subsheet's relation path and receive the values of the subsheet row
//! whose key equals the parent's key, or null if there is none.

use std::collections::HashMap;
use tracing::debug;

use crate::sheet::{ColumnCollection, DataSheet, SheetError, Subsheet};
use crate::value::Value;

pub fn left_join(parent: &mut DataSheet, subsheet: &Subsheet) -> Result<(), SheetError> {
    let child = &subsheet.sheet;

    // The child key is already present in the parent as the foreign key
    let mut imported = ColumnCollection::new();
    for column in child.columns().iter() {
        if column.name() != subsheet.child_key_column {
            imported.add(column.copy());
        }
    }
    let mapping = parent.columns_mut().import_prefixed(&imported, &subsheet.relation_path);

    let mut index: HashMap<String, usize> = HashMap::with_capacity(child.row_count());
    for (i, row) in child.rows().iter().enumerate() {
        if let Some(key) = row.get(&subsheet.child_key_column).and_then(Value::join_key) {
            index.entry(key).or_insert(i);
        }
    }

    let matches: Vec<Option<usize>> = parent
        .column_values(&subsheet.parent_key_column)
        .iter()
        .map(|key| key.join_key().and_then(|k| index.get(&k).copied()))
        .collect();

    for (source, target) in &mapping {
        let values: Vec<Value> = matches
            .iter()
            .map(|m| m.map(|i| child.cell(i, source)).unwrap_or(Value::Null))
            .collect();
        parent.set_column_values(target, values)?;
    }

    debug!(
        target: "metasheet::planner",
        "Joined '{}' into '{}' via {}: {} of {} row(s) matched",
        child.object(),
        parent.object(),
        subsheet.relation_path,
        matches.iter().filter(|m| m.is_some()).count(),
        matches.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Expression, RelationPath};
    use crate::meta_model::{Relation, RelationKind};
    use crate::sheet::Row;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn customers() -> Subsheet {
        let mut sheet = DataSheet::new("CUSTOMER").with_uid_column("UID");
        sheet.add_column_str("UID").unwrap();
        sheet.add_column_str("NAME").unwrap();
        sheet.add_row(row(&[("UID", "c1".into()), ("NAME", "Acme".into())]));
        sheet.add_row(row(&[("UID", "c2".into()), ("NAME", "Globex".into())]));
        Subsheet {
            sheet,
            relation_path: RelationPath::single("CUSTOMER"),
            relation: Relation {
                alias: "CUSTOMER".into(),
                kind: RelationKind::Forward,
                left_object: "ORDER".into(),
                left_attribute: "CUSTOMER".into(),
                right_object: "CUSTOMER".into(),
                right_attribute: "UID".into(),
                cascade_delete: false,
            },
            parent_key_column: "CUSTOMER".into(),
            child_key_column: "UID".into(),
        }
    }

    #[test]
    fn test_left_join_keeps_every_parent_row() {
        let mut orders = DataSheet::new("ORDER").with_uid_column("UID");
        orders.add_column_str("UID").unwrap();
        orders.add_column_str("CUSTOMER__NAME").unwrap();
        orders.add_row(row(&[("UID", "1".into()), ("CUSTOMER", "c1".into())]));
        orders.add_row(row(&[("UID", "2".into()), ("CUSTOMER", Value::Null)]));
        orders.add_row(row(&[("UID", "3".into()), ("CUSTOMER", "c9".into())]));
        orders.add_row(row(&[("UID", "4".into()), ("CUSTOMER", "c1".into())]));

        left_join(&mut orders, &customers()).unwrap();

        assert_eq!(orders.row_count(), 4);
        assert_eq!(
            orders.column_values("CUSTOMER__NAME"),
            vec!["Acme".into(), Value::Null, Value::Null, "Acme".into()]
        );
        assert!(orders.column("CUSTOMER__NAME").unwrap().is_fresh());
        // The key of the subsheet is not imported
        assert!(orders.column("CUSTOMER__UID").is_none());
    }

    #[test]
    fn test_unrequested_columns_are_imported_hidden() {
        let mut orders = DataSheet::new("ORDER");
        orders.add_column_str("UID").unwrap();
        orders.add_row(row(&[("UID", "1".into()), ("CUSTOMER", "c2".into())]));

        left_join(&mut orders, &customers()).unwrap();

        let name = orders
            .column_by_expression(&Expression::parse("CUSTOMER__NAME").unwrap())
            .unwrap();
        assert!(name.is_hidden());
        assert_eq!(orders.cell(0, name.name()), Value::from("Globex"));
    }
}
