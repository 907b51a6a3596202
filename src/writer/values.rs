//! Values sent to the data source on create and update

use tracing::debug;

use super::error::WriteError;
use crate::expression::{AttributePath, Expression};
use crate::meta_model::{MetaModel, MetaObject, ModelError};
use crate::planner::ensure_column;
use crate::sheet::{DataSheet, Row};

/// A sheet column written to an attribute of the sheet's object
#[derive(Debug, Clone)]
pub(crate) struct WriteColumn {
    pub column: String,
    pub attribute: String,
}

/// Columns bound to plain local attributes the object lets us write.
///
/// Aggregates, formulas, constants and attributes of related objects are
/// never written. The UID is always writable so callers may supply it.
pub(crate) fn writable_columns(obj: &MetaObject, sheet: &DataSheet) -> Result<Vec<WriteColumn>, WriteError> {
    let mut out = Vec::new();
    for column in sheet.columns() {
        let Expression::Attribute(path) = column.expression() else {
            continue;
        };
        if !path.is_local() {
            continue;
        }
        let attribute = obj.attribute(&path.attribute).ok_or_else(|| ModelError::AttributeNotFound {
            object: obj.alias.clone(),
            attribute: path.attribute.clone(),
        })?;
        if !attribute.writable && !obj.is_uid(&attribute.alias) {
            debug!(target: "metasheet::writer", "Skipping read-only attribute '{}' of '{}'", attribute.alias, obj.alias);
            continue;
        }
        out.push(WriteColumn {
            column: column.name().to_string(),
            attribute: attribute.alias.clone(),
        });
    }
    Ok(out)
}

/// Attribute values of one row. Cells the row has no entry for are left out,
/// and so are empty cells when `skip_empty` is set.
pub(crate) fn row_values(sheet: &DataSheet, row: usize, columns: &[WriteColumn], skip_empty: bool) -> Row {
    let mut values = Row::new();
    let Some(record) = sheet.row(row) else {
        return values;
    };
    for column in columns {
        match record.get(&column.column) {
            Some(value) if skip_empty && value.is_empty() => {}
            Some(value) => {
                values.insert(column.attribute.clone(), value.clone());
            }
            None => {}
        }
    }
    values
}

/// The column holding a local attribute of the sheet's object
pub(crate) fn attribute_column(sheet: &mut DataSheet, attribute: &str) -> String {
    ensure_column(sheet, Expression::Attribute(AttributePath::new(attribute)))
}

/// Force fixed values into every row. With `defaults`, also fill empty cells
/// of attributes declaring a default value.
pub(crate) fn inject_values(obj: &MetaObject, sheet: &mut DataSheet, defaults: bool) -> Result<(), WriteError> {
    if sheet.is_empty() {
        return Ok(());
    }
    for attribute in &obj.attributes {
        let (expression, force) = match (&attribute.fixed_value, &attribute.default_value) {
            (Some(fixed), _) => (fixed, true),
            (None, Some(default)) if defaults => (default, false),
            _ => continue,
        };
        let column = attribute_column(sheet, &attribute.alias);
        // Row independent expressions are evaluated once so all rows agree
        let shared = if expression.required_attributes().is_empty() {
            Some(sheet.evaluate_for_row(expression, 0)?)
        } else {
            None
        };
        let mut injected = 0;
        for i in 0..sheet.row_count() {
            if !force && !sheet.cell(i, &column).is_empty() {
                continue;
            }
            let value = match &shared {
                Some(value) => value.clone(),
                None => sheet.evaluate_for_row(expression, i)?,
            };
            sheet.set_cell(i, &column, value)?;
            injected += 1;
        }
        if injected > 0 {
            debug!(
                target: "metasheet::writer",
                "Injected {} value '{}' into {} row(s) of '{}'",
                if force { "fixed" } else { "default" },
                expression,
                injected,
                attribute.alias
            );
        }
    }
    Ok(())
}

/// Fill empty cells of required attributes from `ATTRIBUTE == value`
/// conditions of the sheet's filters
pub(crate) fn fill_required_from_filters(obj: &MetaObject, sheet: &mut DataSheet) -> Result<(), WriteError> {
    for attribute in obj.attributes.iter().filter(|a| a.required && !obj.is_uid(&a.alias)) {
        let Some(value) = sheet.filters.find_equals(&AttributePath::new(attribute.alias.clone())) else {
            continue;
        };
        let column = attribute_column(sheet, &attribute.alias);
        for i in 0..sheet.row_count() {
            if sheet.cell(i, &column).is_empty() {
                sheet.set_cell(i, &column, value.clone())?;
            }
        }
    }
    Ok(())
}

/// Name of the UID column, adding it when the sheet has none yet
pub(crate) fn uid_column(model: &MetaModel, sheet: &mut DataSheet) -> Result<Option<String>, WriteError> {
    if let Some(column) = sheet.uid_column() {
        return Ok(Some(column.name().to_string()));
    }
    let obj = model.object(sheet.object())?;
    let Some(uid) = obj.uid_attribute.clone() else {
        return Ok(None);
    };
    let name = attribute_column(sheet, &uid);
    sheet.set_uid_column(Some(name.clone()));
    Ok(Some(name))
}

/// Alias of the attribute behind the sheet's UID column
pub(crate) fn uid_attribute(obj: &MetaObject, sheet: &DataSheet) -> Option<String> {
    sheet
        .uid_column()
        .and_then(|c| c.attribute_path())
        .filter(|path| path.is_local())
        .map(|path| path.attribute.clone())
        .or_else(|| obj.uid_attribute.clone())
}
