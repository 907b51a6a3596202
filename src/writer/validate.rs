//! Validation of sheet values against the meta model

use tracing::debug;

use super::error::WriteError;
use super::WriteContext;
use crate::event::{EventKind, EventPhase};
use crate::expression::{AttributePath, Expression};
use crate::meta_model::{DataType, ModelError};
use crate::sheet::DataSheet;
use crate::value::Value;

/// Cast the values of every local attribute column to the attribute's data
/// type. For creates, also require a value for every required attribute
/// except the UID.
///
/// Cast values replace the original ones in the sheet.
pub fn validate(ctx: &WriteContext<'_>, sheet: &mut DataSheet, for_create: bool) -> Result<(), WriteError> {
    let obj = ctx.model.object(sheet.object())?;
    ctx.events.dispatch(EventPhase::Before(EventKind::Validate), sheet, sheet.row_count());

    let mut casts = Vec::new();
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
        casts.push((column.name().to_string(), attribute.data_type));
    }

    for (column, data_type) in &casts {
        for row in 0..sheet.row_count() {
            let value = sheet.cell(row, column);
            // Blank input means no value for anything but text
            let cast = if value.is_empty() && *data_type != DataType::String {
                Ok(Value::Null)
            } else {
                data_type.cast(&value)
            };
            match cast {
                Ok(cast) if cast != value => sheet.set_cell(row, column, cast)?,
                Ok(_) => {}
                Err(message) => {
                    return Err(WriteError::InvalidValue {
                        object: obj.alias.clone(),
                        column: column.clone(),
                        row,
                        message,
                    })
                }
            }
        }
    }

    if for_create {
        for attribute in obj.attributes.iter().filter(|a| a.required && !obj.is_uid(&a.alias)) {
            let expression = Expression::Attribute(AttributePath::new(attribute.alias.clone()));
            let column = sheet.column_by_expression(&expression).map(|c| c.name().to_string());
            let missing = (0..sheet.row_count()).find(|&row| match &column {
                Some(column) => sheet.cell(row, column).is_empty(),
                None => true,
            });
            if let Some(row) = missing {
                return Err(WriteError::RequiredValueMissing {
                    object: obj.alias.clone(),
                    attribute: attribute.alias.clone(),
                    row,
                });
            }
        }
    }

    debug!(target: "metasheet::writer", "Validated {} row(s) of '{}'", sheet.row_count(), obj.alias);
    ctx.events.dispatch(EventPhase::After(EventKind::Validate), sheet, sheet.row_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;
    use crate::meta_model::MetaModel;
    use crate::sheet::Row;
    use crate::source::DataSourceRegistry;

    const MODEL: &str = r#"
objects:
  - alias: TASK
    data_source: main
    uid: UID
    attributes:
      - alias: UID
        type: integer
      - alias: TITLE
        required: true
      - alias: ESTIMATE
        type: number
      - alias: DUE
        type: date
"#;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_values_are_cast_in_place() {
        let model: MetaModel = serde_yaml::from_str(MODEL).unwrap();
        let sources = DataSourceRegistry::new();
        let events = EventBus::new();
        let ctx = WriteContext::new(&model, &sources, &events);

        let mut sheet = DataSheet::new("TASK");
        sheet.add_row(row(&[
            ("TITLE", "Write docs".into()),
            ("ESTIMATE", "2.5".into()),
            ("DUE", "2024-03-01 10:00:00".into()),
        ]));
        validate(&ctx, &mut sheet, true).unwrap();
        assert_eq!(sheet.cell(0, "ESTIMATE"), Value::Float(2.5));
        assert_eq!(sheet.cell(0, "DUE"), Value::from("2024-03-01"));
    }

    #[test]
    fn test_invalid_value_names_column_and_row() {
        let model: MetaModel = serde_yaml::from_str(MODEL).unwrap();
        let sources = DataSourceRegistry::new();
        let events = EventBus::new();
        let ctx = WriteContext::new(&model, &sources, &events);

        let mut sheet = DataSheet::new("TASK");
        sheet.add_row(row(&[("TITLE", "a".into()), ("ESTIMATE", "1".into())]));
        sheet.add_row(row(&[("TITLE", "b".into()), ("ESTIMATE", "lots".into())]));
        let err = validate(&ctx, &mut sheet, false).unwrap_err();
        assert!(matches!(err, WriteError::InvalidValue { ref column, row: 1, .. } if column == "ESTIMATE"));
    }

    #[test]
    fn test_required_values_only_checked_on_create() {
        let model: MetaModel = serde_yaml::from_str(MODEL).unwrap();
        let sources = DataSourceRegistry::new();
        let events = EventBus::new();
        let ctx = WriteContext::new(&model, &sources, &events);

        let mut sheet = DataSheet::new("TASK");
        sheet.add_row(row(&[("ESTIMATE", Value::Int(3))]));
        validate(&ctx, &mut sheet, false).unwrap();
        let err = validate(&ctx, &mut sheet, true).unwrap_err();
        assert!(matches!(err, WriteError::RequiredValueMissing { ref attribute, row: 0, .. } if attribute == "TITLE"));
    }
}
