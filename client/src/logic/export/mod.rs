//! Export Module - single prediction record to JSON / CSV / XLSX
//!
//! A record is flattened into one row keyed by input parameter or
//! `<metric> - <model>` and serialized in the chosen format. Files are named
//! `rock-{inputs|results|prediction}-{id}.{ext}`.

pub mod writers;

#[cfg(test)]
mod tests;

use serde_json::{json, Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::logic::prediction::normalize::match_model_field;
use crate::logic::prediction::PredictionRecord;

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Too many columns for a worksheet: {0}")]
    TooManyColumns(usize),

    #[error("Unknown export format '{0}' (expected json, csv or excel)")]
    UnknownFormat(String),

    #[error("Unknown export scope '{0}' (expected inputs, results or prediction)")]
    UnknownScope(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "excel" | "xlsx" => Ok(Self::Xlsx),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which part of the record is exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// Input parameters only
    Inputs,
    /// Model outputs only
    Results,
    /// Both
    Prediction,
}

impl ExportScope {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inputs => "inputs",
            Self::Results => "results",
            Self::Prediction => "prediction",
        }
    }
}

impl FromStr for ExportScope {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inputs" | "input" => Ok(Self::Inputs),
            "results" | "result" => Ok(Self::Results),
            "prediction" | "all" => Ok(Self::Prediction),
            other => Err(ExportError::UnknownScope(other.to_string())),
        }
    }
}

/// One flattened record: parallel header and value lists
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub headers: Vec<String>,
    pub values: Vec<Value>,
}

impl ExportRow {
    fn push(&mut self, header: String, value: Value) {
        self.headers.push(header);
        self.values.push(value);
    }
}

/// Column header of one model output
pub fn result_header(metric: &str, model: &str) -> String {
    format!("{} - {}", metric, model)
}

/// Input parameters without inlined model-output fields
pub fn export_inputs(record: &PredictionRecord) -> Map<String, Value> {
    record
        .input_data
        .iter()
        .filter(|(key, _)| match_model_field(key).is_none())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Flatten a record into a single row
pub fn flatten(record: &PredictionRecord, scope: ExportScope) -> ExportRow {
    let mut row = ExportRow {
        headers: Vec::new(),
        values: Vec::new(),
    };

    if scope != ExportScope::Results {
        for (key, value) in export_inputs(record) {
            row.push(key, value);
        }
    }

    if scope != ExportScope::Inputs {
        for (metric, models) in &record.predictions {
            for (model, value) in models {
                row.push(result_header(metric, model), Value::from(*value));
            }
        }
    }

    row
}

/// JSON document for `scope`
pub fn json_document(record: &PredictionRecord, scope: ExportScope) -> Result<Value, ExportError> {
    Ok(match scope {
        ExportScope::Inputs => Value::Object(export_inputs(record)),
        ExportScope::Results => serde_json::to_value(&record.predictions)?,
        ExportScope::Prediction => json!({
            "id": record.id,
            "input_data": export_inputs(record),
            "predictions": record.predictions,
        }),
    })
}

/// Serialize a record into file contents
pub fn render(record: &PredictionRecord, format: ExportFormat, scope: ExportScope) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Json => writers::to_json(&json_document(record, scope)?),
        ExportFormat::Csv => writers::to_csv(&flatten(record, scope)),
        ExportFormat::Xlsx => writers::to_xlsx(&flatten(record, scope)),
    }
}

/// `rock-{scope}-{id}.{ext}` with path-unsafe characters replaced
pub fn file_name(id: &str, format: ExportFormat, scope: ExportScope) -> String {
    let safe_id: String = id
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    format!("rock-{}-{}.{}", scope.label(), safe_id, format.extension())
}

/// Render and write the export into `dir`, returning the file path
pub fn write_to_dir(
    record: &PredictionRecord,
    format: ExportFormat,
    scope: ExportScope,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let bytes = render(record, format, scope)?;
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(&record.id, format, scope));
    fs::write(&path, bytes)?;
    log::info!("Exported {} ({}) to {}", record.id, scope.label(), path.display());
    Ok(path)
}
