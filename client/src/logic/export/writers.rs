use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;

use super::{ExportError, ExportRow};

/// Sheet name used for spreadsheet exports
pub const SHEET_NAME: &str = "Prediction";

pub fn to_json(document: &Value) -> Result<Vec<u8>, ExportError> {
    Ok(serde_json::to_vec_pretty(document)?)
}

/// Header line plus one value line
pub fn to_csv(row: &ExportRow) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&row.headers)?;
    writer.write_record(row.values.iter().map(cell_text))?;
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Single worksheet: bold header row, value row. Numbers stay numeric.
pub fn to_xlsx(row: &ExportRow) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (index, (header, value)) in row.headers.iter().zip(&row.values).enumerate() {
        let col = u16::try_from(index).map_err(|_| ExportError::TooManyColumns(row.headers.len()))?;
        worksheet.write_string_with_format(0, col, header, &bold)?;

        match value {
            Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    worksheet.write_number(1, col, f)?;
                }
            }
            Value::Bool(b) => {
                worksheet.write_boolean(1, col, *b)?;
            }
            Value::String(s) => {
                worksheet.write_string(1, col, s)?;
            }
            // missing values stay empty
            _ => {}
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Text form of a cell; null becomes an empty cell
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
