use super::*;
use crate::logic::prediction::PredictionMap;
use serde_json::json;
use tempfile::tempdir;

fn record() -> PredictionRecord {
    let input_data = json!({
        "id": "site1-test2",
        "Rock_Type": "Granite",
        "UCS (MPa)": 120,
        "SVR_Fragmentation_Size (cm)": 21.5,
        "Notes": null
    });
    let predictions: PredictionMap = serde_json::from_value(json!({
        "Fragmentation_Size (cm)": {"SVR": 21.5, "XGBoost": 19.25},
        "Powder_Factor": {"Random Forest": 0.5}
    }))
    .unwrap();

    PredictionRecord {
        id: "site1-test2".to_string(),
        input_data: input_data.as_object().cloned().unwrap(),
        predictions,
    }
}

fn csv_lines(bytes: Vec<u8>) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes.as_slice());
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn test_csv_inputs_header_excludes_model_fields() {
    let record = record();
    let lines = csv_lines(render(&record, ExportFormat::Csv, ExportScope::Inputs).unwrap());

    let expected: Vec<String> = record
        .input_data
        .keys()
        .filter(|k| match_model_field(k).is_none())
        .cloned()
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], expected);
    assert!(!lines[0].contains(&"SVR_Fragmentation_Size (cm)".to_string()));
}

#[test]
fn test_csv_results_columns() {
    let lines = csv_lines(render(&record(), ExportFormat::Csv, ExportScope::Results).unwrap());

    assert_eq!(
        lines[0],
        vec![
            "Fragmentation_Size (cm) - SVR",
            "Fragmentation_Size (cm) - XGBoost",
            "Powder_Factor - Random Forest",
        ]
    );
    assert_eq!(lines[1], vec!["21.5", "19.25", "0.5"]);
}

#[test]
fn test_missing_values_are_empty_cells() {
    let row = flatten(&record(), ExportScope::Inputs);
    let notes = row.headers.iter().position(|h| h == "Notes").unwrap();
    assert_eq!(writers::cell_text(&row.values[notes]), "");
}

#[test]
fn test_prediction_scope_has_inputs_then_results() {
    let row = flatten(&record(), ExportScope::Prediction);
    assert_eq!(row.headers.len(), 4 + 3);
    assert_eq!(row.headers.last().unwrap(), "Powder_Factor - Random Forest");
}

#[test]
fn test_json_documents() {
    let record = record();

    let inputs = json_document(&record, ExportScope::Inputs).unwrap();
    assert_eq!(inputs["Rock_Type"], "Granite");
    assert!(inputs.get("SVR_Fragmentation_Size (cm)").is_none());

    let results = json_document(&record, ExportScope::Results).unwrap();
    assert_eq!(results["Powder_Factor"]["Random Forest"], 0.5);

    let full: Value = serde_json::from_slice(&render(&record, ExportFormat::Json, ExportScope::Prediction).unwrap()).unwrap();
    assert_eq!(full["id"], "site1-test2");
    assert_eq!(full["predictions"]["Fragmentation_Size (cm)"]["XGBoost"], 19.25);
}

#[test]
fn test_xlsx_is_a_zip_container() {
    let bytes = render(&record(), ExportFormat::Xlsx, ExportScope::Prediction).unwrap();
    assert!(bytes.len() > 100);
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn test_file_names() {
    assert_eq!(
        file_name("site1-test2", ExportFormat::Csv, ExportScope::Inputs),
        "rock-inputs-site1-test2.csv"
    );
    assert_eq!(
        file_name("a/b c", ExportFormat::Xlsx, ExportScope::Prediction),
        "rock-prediction-a_b_c.xlsx"
    );
}

#[test]
fn test_format_and_scope_parsing() {
    assert_eq!("excel".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
    assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
    assert!(matches!("pdf".parse::<ExportFormat>(), Err(ExportError::UnknownFormat(_))));
    assert_eq!("results".parse::<ExportScope>().unwrap(), ExportScope::Results);
    assert!("everything".parse::<ExportScope>().is_err());
}

#[test]
fn test_write_to_dir() {
    let dir = tempdir().unwrap();
    let path = write_to_dir(&record(), ExportFormat::Json, ExportScope::Results, dir.path()).unwrap();

    assert_eq!(path.file_name().unwrap(), "rock-results-site1-test2.json");
    let content = fs::read_to_string(path).unwrap();
    assert!(content.contains("Powder_Factor"));
}
