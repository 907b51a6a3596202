//! Document parser (verb module)
//!
//! Transforms YAML and JSON documents into model types: meta models, sheet
//! documents, mapper definitions and data fixtures for in-memory sources.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ParseError;
use crate::mapper::DataSheetMapper;
use crate::meta_model::MetaModel;
use crate::sheet::{DataSheet, Row, SheetDocument};

/// Rows per object alias, per data source name
pub type DataFixture = BTreeMap<String, BTreeMap<String, Vec<Row>>>;

fn read_file<P: AsRef<Path>>(path: P) -> Result<String, ParseError> {
    let path_str = path.as_ref().display().to_string();
    std::fs::read_to_string(&path).map_err(|e| ParseError::Io {
        path: path_str,
        source: e,
    })
}

/// Parse and validate a meta model from a YAML file
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<MetaModel, ParseError> {
    parse_str(&read_file(path)?)
}

/// Parse and validate a meta model from a YAML string
pub fn parse_str(yaml: &str) -> Result<MetaModel, ParseError> {
    let model: MetaModel = serde_yaml::from_str(yaml)?;
    model.validate()?;
    Ok(model)
}

/// Parse a sheet document from JSON
pub fn parse_sheet_str(json: &str) -> Result<DataSheet, ParseError> {
    let document: SheetDocument = serde_json::from_str(json)?;
    Ok(DataSheet::from_document(document)?)
}

pub fn parse_sheet_file<P: AsRef<Path>>(path: P) -> Result<DataSheet, ParseError> {
    parse_sheet_str(&read_file(path)?)
}

/// Serialize a sheet as a pretty-printed JSON document
pub fn sheet_to_json(sheet: &DataSheet) -> Result<String, ParseError> {
    Ok(serde_json::to_string_pretty(&sheet.to_document())?)
}

/// Parse a mapper definition from YAML
pub fn parse_mapper_str(yaml: &str) -> Result<DataSheetMapper, ParseError> {
    Ok(serde_yaml::from_str(yaml)?)
}

/// Parse a data fixture: `data_source -> object -> rows`
pub fn parse_data_str(yaml: &str) -> Result<DataFixture, ParseError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn parse_data_file<P: AsRef<Path>>(path: P) -> Result<DataFixture, ParseError> {
    parse_data_str(&read_file(path)?)
}
