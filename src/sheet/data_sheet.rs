//! The data sheet: a table of rows bound to one meta object

use std::collections::{BTreeMap, HashMap, HashSet};

use super::collection::ColumnCollection;
use super::column::Column;
use super::error::SheetError;
use super::sorter::{Aggregator, SortDirection, Sorter};
use crate::condition::ConditionGroup;
use crate::expression::{Expression, ExpressionError};
use crate::meta_model::MetaObject;
use crate::value::Value;

/// One row record, keyed by column name
pub type Row = BTreeMap<String, Value>;

/// An in-memory table bound to one meta object
///
/// Every key of every row is the name of a column in [`DataSheet::columns`];
/// adding a row with unknown keys creates hidden columns for them.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSheet {
    object: String,
    uid_column: Option<String>,
    columns: ColumnCollection,
    rows: Vec<Row>,
    totals: Vec<Row>,
    pub filters: ConditionGroup,
    pub sorters: Vec<Sorter>,
    pub aggregators: Vec<Aggregator>,
    pub limit: Option<usize>,
    pub offset: usize,
    total_row_count: Option<usize>,
}

impl DataSheet {
    /// An empty sheet for an object without a UID column designation
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            uid_column: None,
            columns: ColumnCollection::new(),
            rows: Vec::new(),
            totals: Vec::new(),
            filters: ConditionGroup::and(),
            sorters: Vec::new(),
            aggregators: Vec::new(),
            limit: None,
            offset: 0,
            total_row_count: None,
        }
    }

    /// An empty sheet using the object's UID attribute as UID column
    pub fn for_object(object: &MetaObject) -> Self {
        let mut sheet = Self::new(object.alias.clone());
        sheet.uid_column = object.uid_attribute.clone();
        sheet
    }

    pub fn with_uid_column(mut self, name: impl Into<String>) -> Self {
        self.uid_column = Some(name.into());
        self
    }

    /// Alias of the meta object the sheet is bound to
    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn uid_column_name(&self) -> Option<&str> {
        self.uid_column.as_deref()
    }

    pub fn set_uid_column(&mut self, name: Option<String>) {
        self.uid_column = name;
    }

    /// The UID column, if designated and present
    pub fn uid_column(&self) -> Option<&Column> {
        self.uid_column.as_deref().and_then(|name| self.columns.get(name))
    }

    pub fn has_uid_column(&self) -> bool {
        self.uid_column().is_some()
    }

    // ========================================================================
    // Columns
    // ========================================================================

    pub fn columns(&self) -> &ColumnCollection {
        &self.columns
    }

    pub(crate) fn columns_mut(&mut self) -> &mut ColumnCollection {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(name)
    }

    pub fn column_by_expression(&self, expression: &Expression) -> Option<&Column> {
        self.columns.find_by_expression(expression)
    }

    fn require_column(&self, name: &str) -> Result<&Column, SheetError> {
        self.columns.get(name).ok_or_else(|| SheetError::ColumnNotFound {
            sheet: self.object.clone(),
            column: name.to_string(),
        })
    }

    /// Add a column. A column with the same name is kept as is.
    pub fn add_column(&mut self, column: Column) -> &mut Column {
        self.columns.entry(column)
    }

    /// The column bound to `expression`, creating it if needed
    pub fn add_expression(&mut self, expression: Expression) -> &mut Column {
        let name = match self.columns.find_by_expression(&expression) {
            Some(existing) => existing.name().to_string(),
            None => self.columns.free_name(&expression.default_column_name()),
        };
        self.columns.entry(Column::new(name, expression))
    }

    /// Parse an expression and add a column for it
    pub fn add_column_str(&mut self, expression: &str) -> Result<&mut Column, SheetError> {
        let expression = Expression::parse(expression)?;
        Ok(self.add_expression(expression))
    }

    /// Add a column by name, merging into an existing one. Values of a fresh
    /// incoming column overwrite the existing values.
    pub fn merge_column(&mut self, column: Column, values: Vec<Value>) {
        let name = column.name().to_string();
        let fresh = column.is_fresh();
        self.columns.add(column);
        if fresh {
            self.write_values(&name, values);
        }
    }

    /// Remove a column and its values from every row
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let column = self.columns.remove(name)?;
        for row in self.rows.iter_mut().chain(self.totals.iter_mut()) {
            row.remove(name);
        }
        Some(column)
    }

    /// Rename a column. Without `keep_values` its values are dropped and the
    /// column must be populated again.
    pub fn rename_column(&mut self, old: &str, new: &str, keep_values: bool) -> Result<(), SheetError> {
        self.require_column(old)?;
        if old == new {
            return Ok(());
        }
        if !self.columns.rename(old, new) {
            return Err(SheetError::DuplicateColumn {
                sheet: self.object.clone(),
                column: new.to_string(),
            });
        }
        for row in self.rows.iter_mut().chain(self.totals.iter_mut()) {
            if let Some(value) = row.remove(old) {
                if keep_values {
                    row.insert(new.to_string(), value);
                }
            }
        }
        if !keep_values {
            if let Some(column) = self.columns.get_mut(new) {
                column.invalidate();
            }
        }
        if self.uid_column.as_deref() == Some(old) {
            self.uid_column = Some(new.to_string());
        }
        Ok(())
    }

    // ========================================================================
    // Rows and cells
    // ========================================================================

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Append a row. Unknown keys become hidden columns.
    pub fn add_row(&mut self, row: Row) {
        for key in row.keys() {
            if !self.columns.contains(key) {
                let expression = Expression::parse(key).unwrap_or(Expression::Constant(Value::Null));
                self.columns.add(Column::new(key.clone(), expression).hidden());
            }
        }
        self.rows.push(row);
    }

    pub fn add_rows(&mut self, rows: impl IntoIterator<Item = Row>) {
        for row in rows {
            self.add_row(row);
        }
    }

    /// Remove rows by index
    pub fn remove_rows(&mut self, indices: &[usize]) {
        let doomed: HashSet<usize> = indices.iter().copied().collect();
        let mut index = 0;
        self.rows.retain(|_| {
            let keep = !doomed.contains(&index);
            index += 1;
            keep
        });
    }

    /// Keep only the rows of one page
    pub fn retain_page(&mut self, offset: usize, limit: Option<usize>) {
        let end = limit.map_or(self.rows.len(), |l| offset.saturating_add(l).min(self.rows.len()));
        if offset >= self.rows.len() {
            self.rows.clear();
        } else {
            self.rows.truncate(end);
            self.rows.drain(..offset);
        }
    }

    /// Drop all rows, totals and the reported row count
    pub fn clear_rows(&mut self) {
        self.rows.clear();
        self.totals.clear();
        self.total_row_count = None;
    }

    /// Value of a cell; null if the row has no value for the column
    pub fn cell(&self, row: usize, column: &str) -> Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set_cell(&mut self, row: usize, column: &str, value: Value) -> Result<(), SheetError> {
        self.require_column(column)?;
        let rows = self.rows.len();
        let record = self.rows.get_mut(row).ok_or_else(|| SheetError::RowOutOfRange {
            sheet: self.object.clone(),
            row,
            rows,
        })?;
        record.insert(column.to_string(), value);
        Ok(())
    }

    /// Values of a column in row order
    pub fn column_values(&self, name: &str) -> Vec<Value> {
        (0..self.rows.len()).map(|i| self.cell(i, name)).collect()
    }

    /// Set the values of a column, appending rows if there are more values
    /// than rows, and mark the column fresh
    pub fn set_column_values(&mut self, name: &str, values: Vec<Value>) -> Result<(), SheetError> {
        self.require_column(name)?;
        self.write_values(name, values);
        Ok(())
    }

    fn write_values(&mut self, name: &str, values: Vec<Value>) {
        while self.rows.len() < values.len() {
            self.rows.push(Row::new());
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(name.to_string(), value);
        }
        if let Some(column) = self.columns.get_mut(name) {
            column.mark_fresh();
        }
    }

    /// Non-null values of the UID column
    pub fn uid_values(&self) -> Vec<Value> {
        match self.uid_column() {
            Some(column) => self
                .column_values(column.name())
                .into_iter()
                .filter(|v| !v.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Row index by normalized UID value
    pub fn uid_index(&self) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        if let Some(name) = self.uid_column().map(|c| c.name().to_string()) {
            for (i, row) in self.rows.iter().enumerate() {
                if let Some(key) = row.get(&name).and_then(Value::join_key) {
                    index.entry(key).or_insert(i);
                }
            }
        }
        index
    }

    pub fn find_row_by_uid(&self, uid: &Value) -> Option<usize> {
        let name = self.uid_column()?.name();
        let key = uid.join_key()?;
        self.rows
            .iter()
            .position(|row| row.get(name).and_then(Value::join_key).as_deref() == Some(key.as_str()))
    }

    // ========================================================================
    // Totals and paging
    // ========================================================================

    pub fn totals_rows(&self) -> &[Row] {
        &self.totals
    }

    pub fn set_total(&mut self, row: usize, column: &str, value: Value) {
        while self.totals.len() <= row {
            self.totals.push(Row::new());
        }
        self.totals[row].insert(column.to_string(), value);
    }

    /// Compute every column total over the loaded rows
    pub fn calculate_totals(&mut self) {
        let mut computed = Vec::new();
        for column in self.columns.iter() {
            if column.totals().is_empty() {
                continue;
            }
            let values = self.column_values(column.name());
            for total in column.totals() {
                computed.push((total.row, column.name().to_string(), total.function.apply(&values)));
            }
        }
        for (row, column, value) in computed {
            self.set_total(row, &column, value);
        }
    }

    /// Number of rows matching the filters in the data source, which may
    /// exceed the loaded rows when paging. Falls back to the loaded count.
    pub fn total_row_count(&self) -> usize {
        self.total_row_count.unwrap_or(self.rows.len())
    }

    pub fn reported_row_count(&self) -> Option<usize> {
        self.total_row_count
    }

    pub fn set_total_row_count(&mut self, count: Option<usize>) {
        self.total_row_count = count;
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Fresh if every column is fresh
    pub fn is_fresh(&self) -> bool {
        self.columns.iter().all(Column::is_fresh)
    }

    /// Neither filter conditions nor UID values restrict the rows
    pub fn is_unfiltered(&self) -> bool {
        self.filters.is_empty() && self.uid_values().is_empty()
    }

    pub fn is_aggregated(&self) -> bool {
        !self.aggregators.is_empty()
    }

    // ========================================================================
    // Copies
    // ========================================================================

    /// Same object, columns (not fresh), filters, sorters and paging, no rows
    pub fn copy_empty(&self) -> DataSheet {
        let mut sheet = self.clone();
        sheet.columns = ColumnCollection::new();
        for column in self.columns.iter() {
            sheet.columns.add(column.copy());
        }
        sheet.clear_rows();
        sheet
    }

    /// A sheet holding only the UID column and its values
    pub fn copy_uid_only(&self) -> Result<DataSheet, SheetError> {
        let uid = self.uid_column().ok_or_else(|| SheetError::UidColumnMissing {
            sheet: self.object.clone(),
        })?;
        let mut sheet = DataSheet::new(self.object.clone());
        sheet.uid_column = self.uid_column.clone();
        let name = uid.name().to_string();
        sheet.columns.add(uid.copy());
        sheet.write_values(&name, self.column_values(&name));
        Ok(sheet)
    }

    /// Same columns and settings, only the given rows
    pub fn copy_rows(&self, indices: &[usize]) -> DataSheet {
        let mut sheet = self.clone();
        sheet.rows = indices.iter().filter_map(|i| self.rows.get(*i).cloned()).collect();
        sheet.totals.clear();
        sheet.total_row_count = None;
        sheet
    }

    // ========================================================================
    // Expression evaluation
    // ========================================================================

    /// Name of the column holding an expression's values
    fn column_for(&self, expression: &Expression) -> Option<&str> {
        self.columns.find_by_expression(expression).map(Column::name)
    }

    /// Whether an expression can be evaluated from existing columns
    pub fn can_evaluate(&self, expression: &Expression) -> bool {
        if self.column_for(expression).is_some() {
            return true;
        }
        match expression {
            Expression::Attribute(_) | Expression::Aggregate { .. } => false,
            other => other
                .required_attributes()
                .iter()
                .all(|required| self.column_for(required).is_some()),
        }
    }

    fn evaluate_in(&self, expression: &Expression, record: &Row) -> Result<Value, SheetError> {
        if let Some(name) = self.column_for(expression) {
            return Ok(record.get(name).cloned().unwrap_or(Value::Null));
        }
        Ok(self.evaluate_parts(expression, record)?)
    }

    /// Evaluate an expression from its inputs, ignoring any column holding
    /// the expression itself
    fn evaluate_parts(&self, expression: &Expression, record: &Row) -> Result<Value, ExpressionError> {
        expression.evaluate(&mut |required| {
            self.column_for(required)
                .and_then(|name| record.get(name))
                .cloned()
                .unwrap_or(Value::Null)
        })
    }

    /// Evaluate an expression against one row
    pub fn evaluate_for_row(&self, expression: &Expression, row: usize) -> Result<Value, SheetError> {
        let record = self.rows.get(row).ok_or_else(|| SheetError::RowOutOfRange {
            sheet: self.object.clone(),
            row,
            rows: self.rows.len(),
        })?;
        self.evaluate_in(expression, record)
    }

    fn calculate(&self, name: &str, calculation: &Expression, only_missing: bool) -> Result<Vec<(usize, Value)>, SheetError> {
        let mut out = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            if only_missing && row.contains_key(name) {
                continue;
            }
            let value = self
                .evaluate_parts(calculation, row)
                .map_err(|source| SheetError::Formula {
                    sheet: self.object.clone(),
                    column: name.to_string(),
                    source,
                })?;
            out.push((i, value));
        }
        Ok(out)
    }

    /// Re-evaluate every formula column over all rows.
    ///
    /// Total rows receive a formula value only if the formula declares that it
    /// can be applied to totals.
    pub fn recalculate_formulas(&mut self) -> Result<(), SheetError> {
        let formulas: Vec<(String, Expression)> = self
            .columns
            .iter()
            .filter_map(|c| c.calculation().map(|f| (c.name().to_string(), f.clone())))
            .collect();
        for (name, calculation) in formulas {
            for (i, value) in self.calculate(&name, &calculation, false)? {
                self.rows[i].insert(name.clone(), value);
            }
            let emits_totals = matches!(&calculation, Expression::Formula(f) if f.emits_totals());
            if emits_totals {
                for t in 0..self.totals.len() {
                    let value = self
                        .evaluate_parts(&calculation, &self.totals[t])
                        .map_err(|source| SheetError::Formula {
                            sheet: self.object.clone(),
                            column: name.clone(),
                            source,
                        })?;
                    self.totals[t].insert(name.clone(), value);
                }
            }
            if let Some(column) = self.columns.get_mut(&name) {
                column.mark_fresh();
            }
        }
        Ok(())
    }

    /// Values of a column, computing formula values that are missing.
    /// Repeated calls do not recompute values already present.
    pub fn resolve_column(&mut self, name: &str) -> Result<Vec<Value>, SheetError> {
        let column = self.require_column(name)?;
        if let Some(calculation) = column.calculation().cloned() {
            let only_missing = column.is_fresh();
            for (i, value) in self.calculate(name, &calculation, only_missing)? {
                self.rows[i].insert(name.to_string(), value);
            }
            if let Some(column) = self.columns.get_mut(name) {
                column.mark_fresh();
            }
        }
        Ok(self.column_values(name))
    }

    // ========================================================================
    // Filtering and sorting loaded rows
    // ========================================================================

    /// Indices of rows matching a condition group. Every condition must be
    /// computable from the sheet's columns.
    pub fn filtered_indices(&self, filter: &ConditionGroup) -> Result<Vec<usize>, SheetError> {
        for condition in filter.all_conditions() {
            if !self.can_evaluate(&condition.expression) {
                return Err(SheetError::ConditionColumnMissing {
                    sheet: self.object.clone(),
                    expression: condition.expression.to_string(),
                });
            }
        }
        let mut indices = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            let matched = filter.evaluate(&mut |condition| {
                self.evaluate_in(&condition.expression, row)
                    .map(|value| condition.matches(&value))
            })?;
            if matched {
                indices.push(i);
            }
        }
        Ok(indices)
    }

    /// A copy holding only the rows matching `filter`
    pub fn extract(&self, filter: &ConditionGroup) -> Result<DataSheet, SheetError> {
        let indices = self.filtered_indices(filter)?;
        Ok(self.copy_rows(&indices))
    }

    /// Stable sort of the loaded rows
    pub fn sort_rows(&mut self, sorters: &[Sorter]) -> Result<(), SheetError> {
        for sorter in sorters {
            if !self.can_evaluate(&sorter.expression) {
                return Err(SheetError::SortColumnMissing {
                    sheet: self.object.clone(),
                    expression: sorter.expression.to_string(),
                });
            }
        }
        let mut keyed: Vec<(Vec<Value>, Row)> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let mut keys = Vec::with_capacity(sorters.len());
            for sorter in sorters {
                keys.push(self.evaluate_in(&sorter.expression, row)?);
            }
            keyed.push((keys, row.clone()));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for ((left, right), sorter) in a.iter().zip(b.iter()).zip(sorters) {
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
        self.rows = keyed.into_iter().map(|(_, row)| row).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Comparator, Condition};
    use crate::meta_model::AggregateFunction;
    use crate::sheet::Total;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn orders() -> DataSheet {
        let mut sheet = DataSheet::new("ORDER").with_uid_column("UID");
        sheet.add_column_str("UID").unwrap();
        sheet.add_column_str("AMOUNT").unwrap();
        sheet.set_column_values("UID", vec![Value::from("1"), Value::from("2"), Value::from("3")]).unwrap();
        sheet
            .set_column_values("AMOUNT", vec![Value::Int(30), Value::Int(10), Value::Int(20)])
            .unwrap();
        sheet
    }

    #[test]
    fn test_add_row_creates_hidden_columns() {
        let mut sheet = orders();
        sheet.add_row(row(&[("UID", Value::from("4")), ("NOTE", Value::from("x"))]));
        let note = sheet.column("NOTE").unwrap();
        assert!(note.is_hidden());
        assert_eq!(sheet.row_count(), 4);
        for r in sheet.rows() {
            assert!(r.keys().all(|k| sheet.columns().contains(k)));
        }
    }

    #[test]
    fn test_merge_column_overwrites_only_when_fresh() {
        let mut sheet = orders();
        let stale = Column::from_expression(Expression::parse("AMOUNT").unwrap());
        sheet.merge_column(stale, vec![Value::Int(0); 3]);
        assert_eq!(sheet.cell(0, "AMOUNT"), Value::Int(30));

        let mut fresh = Column::from_expression(Expression::parse("AMOUNT").unwrap());
        fresh.mark_fresh();
        sheet.merge_column(fresh, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(sheet.columns().len(), 2);
        assert_eq!(sheet.column_values("AMOUNT"), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_rename_with_and_without_values() {
        let mut sheet = orders();
        sheet.rename_column("AMOUNT", "TOTAL", true).unwrap();
        assert_eq!(sheet.cell(0, "TOTAL"), Value::Int(30));
        assert!(sheet.column("TOTAL").unwrap().is_fresh());

        sheet.rename_column("TOTAL", "AMOUNT", false).unwrap();
        assert_eq!(sheet.cell(0, "AMOUNT"), Value::Null);
        assert!(!sheet.column("AMOUNT").unwrap().is_fresh());

        assert!(matches!(
            sheet.rename_column("AMOUNT", "UID", true),
            Err(SheetError::DuplicateColumn { .. })
        ));
        assert!(matches!(
            sheet.rename_column("MISSING", "X", true),
            Err(SheetError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_column_removes_values() {
        let mut sheet = orders();
        sheet.remove_column("AMOUNT").unwrap();
        assert!(sheet.rows().iter().all(|r| !r.contains_key("AMOUNT")));
    }

    #[test]
    fn test_remove_rows_ignores_repeats_and_out_of_range() {
        let mut sheet = orders();
        sheet.remove_rows(&[2, 0, 2, 7]);
        assert_eq!(sheet.column_values("UID"), vec![Value::from("2")]);
    }

    #[test]
    fn test_uid_lookup_and_unfiltered() {
        let sheet = orders();
        assert_eq!(sheet.find_row_by_uid(&Value::from("2")), Some(1));
        assert_eq!(sheet.find_row_by_uid(&Value::from("9")), None);
        assert!(!sheet.is_unfiltered());
        assert!(DataSheet::new("ORDER").with_uid_column("UID").is_unfiltered());
    }

    #[test]
    fn test_extract_requires_columns() {
        let sheet = orders();
        let filter = ConditionGroup::and().with_condition(Condition::new(
            Expression::parse("AMOUNT").unwrap(),
            Comparator::GreaterThanOrEquals,
            Value::Int(20),
        ));
        let extracted = sheet.extract(&filter).unwrap();
        assert_eq!(extracted.uid_values(), vec![Value::from("1"), Value::from("3")]);

        let missing = ConditionGroup::and().with_condition(Condition::new(
            Expression::parse("STATUS").unwrap(),
            Comparator::Is,
            "open",
        ));
        assert!(matches!(
            sheet.extract(&missing),
            Err(SheetError::ConditionColumnMissing { .. })
        ));
    }

    #[test]
    fn test_sort_rows() {
        let mut sheet = orders();
        sheet.sort_rows(&[Sorter::desc(Expression::parse("AMOUNT").unwrap())]).unwrap();
        assert_eq!(sheet.column_values("UID"), vec![Value::from("1"), Value::from("3"), Value::from("2")]);
        let err = sheet.sort_rows(&[Sorter::asc(Expression::parse("NAME").unwrap())]);
        assert!(matches!(err, Err(SheetError::SortColumnMissing { .. })));
    }

    #[test]
    fn test_formulas_and_totals() {
        let mut sheet = orders();
        sheet
            .column_mut("AMOUNT")
            .unwrap()
            .add_total(Total {
                function: AggregateFunction::Sum,
                row: 0,
            })
            .unwrap();
        sheet.add_column_str("=Multiply(AMOUNT, 2)").unwrap();
        sheet.add_column_str("=Concat(UID, '#')").unwrap();
        sheet.calculate_totals();
        sheet.recalculate_formulas().unwrap();

        assert_eq!(sheet.column_values("MULTIPLY_AMOUNT_2"), vec![Value::Int(60), Value::Int(20), Value::Int(40)]);
        assert_eq!(sheet.totals_rows()[0].get("AMOUNT"), Some(&Value::Int(60)));
        // Arithmetic formulas apply to totals, text formulas don't
        assert_eq!(sheet.totals_rows()[0].get("MULTIPLY_AMOUNT_2"), Some(&Value::Int(120)));
        assert_eq!(sheet.totals_rows()[0].get("CONCAT_UID"), None);
        assert_eq!(sheet.row_count(), 3);
    }

    #[test]
    fn test_resolve_column_is_idempotent() {
        let mut sheet = orders();
        sheet.add_column_str("=Add(AMOUNT, 1)").unwrap();
        let first = sheet.resolve_column("ADD_AMOUNT_1").unwrap();
        assert_eq!(first, vec![Value::Int(31), Value::Int(11), Value::Int(21)]);

        // Changed inputs do not trigger recomputation of present values
        sheet.set_cell(0, "AMOUNT", Value::Int(100)).unwrap();
        let second = sheet.resolve_column("ADD_AMOUNT_1").unwrap();
        assert_eq!(second, first);

        // A new row is missing the value and gets it
        sheet.add_row(row(&[("UID", Value::from("4")), ("AMOUNT", Value::Int(5))]));
        let third = sheet.resolve_column("ADD_AMOUNT_1").unwrap();
        assert_eq!(third[3], Value::Int(6));
    }

    #[test]
    fn test_copy_uid_only() {
        let sheet = orders();
        let copy = sheet.copy_uid_only().unwrap();
        assert_eq!(copy.columns().names(), vec!["UID"]);
        assert_eq!(copy.uid_values(), sheet.uid_values());
        assert!(DataSheet::new("X").copy_uid_only().is_err());
    }
}
