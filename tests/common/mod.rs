//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use metasheet::{parser, DataSheet, Expression, MemoryDataSource, MetaModel, Row, Value, Workbench};

/// Load a meta model from the tests/test_data directory
pub fn load_fixture(name: &str) -> MetaModel {
    let path = format!("tests/test_data/{}", name);
    parser::parse_file(&path).unwrap_or_else(|e| panic!("Failed to load test data {}: {}", name, e))
}

/// A workbench over the orders model with one in-memory source per data source
pub struct Orders {
    pub workbench: Workbench,
    pub erp: MemoryDataSource,
    pub crm: MemoryDataSource,
}

impl Orders {
    pub fn clear_operations(&self) {
        self.erp.clear_operations();
        self.crm.clear_operations();
    }

    /// A sheet for `object` with one column per expression
    pub fn sheet(&self, object: &str, columns: &[&str]) -> DataSheet {
        let mut sheet = self.workbench.new_sheet(object).unwrap();
        for column in columns {
            let expression = Expression::parse_for(column, self.workbench.model(), object)
                .unwrap_or_else(|e| panic!("Invalid column {}: {}", column, e));
            sheet.add_expression(expression);
        }
        sheet
    }
}

pub fn orders() -> Orders {
    let model = load_fixture("orders.yaml");
    let fixture = parser::parse_data_file("tests/test_data/orders_data.yaml")
        .unwrap_or_else(|e| panic!("Failed to load orders_data.yaml: {}", e));

    let generator = model.engine.uid_generator;
    let erp = MemoryDataSource::new("erp").with_uid_generator(generator);
    let crm = MemoryDataSource::new("crm").with_uid_generator(generator);
    for (name, source) in [("erp", &erp), ("crm", &crm)] {
        for (object, rows) in fixture.get(name).cloned().unwrap_or_default() {
            source.insert_rows(&object, rows);
        }
    }

    let mut workbench = Workbench::new(model);
    workbench.register_source(Arc::new(erp.clone()));
    workbench.register_source(Arc::new(crm.clone()));
    Orders { workbench, erp, crm }
}

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// One column of an object's committed rows
pub fn stored(source: &MemoryDataSource, object: &str, column: &str) -> Vec<Value> {
    source
        .rows(object)
        .iter()
        .map(|r| r.get(column).cloned().unwrap_or(Value::Null))
        .collect()
}

pub fn strings(values: &[&str]) -> Vec<Value> {
    values.iter().map(|v| Value::from(*v)).collect()
}
