//! Serializable form of a data sheet
//!
//! ```json
//! {
//!   "object_alias": "ORDER",
//!   "uid_column": "UID",
//!   "columns": [{"name": "UID", "expression": "UID"}, {"expression": "CUSTOMER__NAME"}],
//!   "rows": [{"UID": "1", "CUSTOMER__NAME": "Acme"}],
//!   "filters": {"operator": "AND", "conditions": [{"expression": "UID", "comparator": "[", "value": ["1"]}]}
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::column::{Column, Total};
use super::data_sheet::{DataSheet, Row};
use super::error::SheetError;
use super::sorter::{Aggregator, Sorter};
use crate::condition::ConditionGroup;
use crate::expression::Expression;
use crate::meta_model::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetDocument {
    pub object_alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid_column: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDocument>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals_rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "ConditionGroup::is_empty")]
    pub filters: ConditionGroup,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorters: Vec<Sorter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregators: Vec<Aggregator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_limit: Option<usize>,
    #[serde(default)]
    pub rows_offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_row_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDocument {
    /// Defaults to a name derived from the expression
    #[serde(default)]
    pub name: Option<String>,
    pub expression: Expression,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<Expression>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<Total>,
}

impl DataSheet {
    pub fn to_document(&self) -> SheetDocument {
        SheetDocument {
            object_alias: self.object().to_string(),
            uid_column: self.uid_column_name().map(str::to_string),
            columns: self
                .columns()
                .iter()
                .map(|c| ColumnDocument {
                    name: Some(c.name().to_string()),
                    expression: c.expression().clone(),
                    hidden: c.is_hidden(),
                    data_type: c.data_type(),
                    formula: c.formula().cloned(),
                    totals: c.totals().to_vec(),
                })
                .collect(),
            rows: self.rows().to_vec(),
            totals_rows: self.totals_rows().to_vec(),
            filters: self.filters.clone(),
            sorters: self.sorters.clone(),
            aggregators: self.aggregators.clone(),
            rows_limit: self.limit,
            rows_offset: self.offset,
            total_row_count: self.reported_row_count(),
        }
    }

    /// Build a sheet from a document. Columns holding a value in some row
    /// are fresh.
    pub fn from_document(document: SheetDocument) -> Result<DataSheet, SheetError> {
        let mut sheet = DataSheet::new(document.object_alias);
        sheet.set_uid_column(document.uid_column);
        for doc in document.columns {
            let name = doc
                .name
                .unwrap_or_else(|| sheet.columns().free_name(&doc.expression.default_column_name()));
            let mut column = Column::new(name, doc.expression);
            column.set_hidden(doc.hidden);
            if let Some(data_type) = doc.data_type {
                column.set_data_type(data_type);
            }
            if let Some(formula) = doc.formula {
                column.set_formula(formula);
            }
            for total in doc.totals {
                column.add_total(total)?;
            }
            sheet.add_column(column);
        }
        sheet.add_rows(document.rows);
        for (i, row) in document.totals_rows.into_iter().enumerate() {
            for (column, value) in row {
                sheet.set_total(i, &column, value);
            }
        }
        let populated: Vec<String> = sheet
            .columns()
            .iter()
            .filter(|c| sheet.rows().iter().any(|r| r.contains_key(c.name())))
            .map(|c| c.name().to_string())
            .collect();
        for name in populated {
            if let Some(column) = sheet.column_mut(&name) {
                column.mark_fresh();
            }
        }
        sheet.filters = document.filters;
        sheet.sorters = document.sorters;
        sheet.aggregators = document.aggregators;
        sheet.limit = document.rows_limit;
        sheet.offset = document.rows_offset;
        sheet.set_total_row_count(document.total_row_count);
        Ok(sheet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_document_defaults() {
        let doc: SheetDocument = serde_json::from_str(
            r#"{"object_alias": "ORDER", "columns": [{"expression": "CUSTOMER__NAME"}], "rows": [{"CUSTOMER__NAME": "Acme", "EXTRA": 1}]}"#,
        )
        .unwrap();
        let sheet = DataSheet::from_document(doc).unwrap();
        assert_eq!(sheet.columns().names(), vec!["CUSTOMER__NAME", "EXTRA"]);
        assert!(sheet.column("EXTRA").unwrap().is_hidden());
        assert!(sheet.is_fresh());
        assert_eq!(sheet.cell(0, "EXTRA"), Value::Int(1));
    }

    #[test]
    fn test_invalid_total_is_rejected() {
        let doc: SheetDocument = serde_json::from_str(
            r#"{"object_alias": "ORDER", "columns": [{"expression": "='x'", "totals": [{"function": "COUNT"}]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            DataSheet::from_document(doc),
            Err(SheetError::TotalRequiresAttribute { .. })
        ));
    }
}
