//! Response Normalizer
//!
//! The backend returns prediction records in several shapes:
//! - wrapped as `{"result": {...}}`
//! - `{"input_data": {...}, "predictions": {...}}`
//! - flat, with each model output inlined as `<model>_<metric>` or
//!   `<metric>_<model>`
//!
//! Shapes are resolved here once into `PredictionLookup`; nothing
//! downstream inspects raw responses.

use serde_json::{Map, Value};

use super::record::{Metric, Model, ModelOutputs, PredictionLookup, PredictionMap, PredictionRecord};

/// Raw record shape after unwrapping the `result` envelope
#[derive(Debug, Clone, PartialEq)]
pub enum RecordShape {
    Structured {
        id: Option<String>,
        input_data: Map<String, Value>,
        predictions: PredictionMap,
    },
    Flat {
        id: Option<String>,
        fields: Map<String, Value>,
    },
}

/// Naming convention of an inlined model field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldConvention {
    /// `SVR_Fragmentation_Size (cm)`
    ModelFirst,
    /// `Fragmentation_Size (cm)_SVR`
    MetricFirst,
}

/// Classify a response body
pub fn classify(body: Value) -> RecordShape {
    let mut obj = match unwrap_envelope(body) {
        Value::Object(obj) => obj,
        _ => Map::new(),
    };

    let top_id = obj.get("id").and_then(id_string);
    let structured = obj
        .get("predictions")
        .map(parse_prediction_map)
        .unwrap_or_default();

    // `input_data` wins over top-level duplicates
    let nested_inputs = match obj.remove("input_data") {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    };

    if !structured.is_empty() {
        let input_data = match nested_inputs {
            Some(map) => scalars(map),
            None => {
                obj.remove("predictions");
                obj.remove("id");
                scalars(obj)
            }
        };
        let id = top_id.or_else(|| input_data.get("id").and_then(id_string));
        return RecordShape::Structured {
            id,
            input_data,
            predictions: structured,
        };
    }

    obj.remove("predictions");
    let mut fields = scalars(obj);
    if let Some(nested) = nested_inputs {
        for (key, value) in scalars(nested) {
            fields.insert(key, value);
        }
    }
    let id = top_id.or_else(|| fields.get("id").and_then(id_string));

    RecordShape::Flat { id, fields }
}

/// Normalize a response body into a lookup result
pub fn normalize(body: Value, requested_id: &str) -> PredictionLookup {
    match classify(body) {
        RecordShape::Structured { id, input_data, predictions } => {
            PredictionLookup::Found(PredictionRecord {
                id: id.unwrap_or_else(|| requested_id.to_string()),
                input_data,
                predictions,
            })
        }
        RecordShape::Flat { id, fields } => {
            let id = id.unwrap_or_else(|| requested_id.to_string());
            let (input_data, predictions, saw_metric_first) = split_flat(fields);

            if saw_metric_first {
                log::warn!(
                    "Record {} uses '<metric>_<model>' field names; expected '<model>_<metric>'",
                    id
                );
            }

            if predictions.is_empty() {
                log::info!("No prediction data found for {}", id);
                PredictionLookup::NoPredictionData { id, input_data }
            } else {
                PredictionLookup::Found(PredictionRecord { id, input_data, predictions })
            }
        }
    }
}

/// Whether `key` names an inlined model output, e.g. `XGBoost_Noise_Level (dB)`
pub fn match_model_field(key: &str) -> Option<(Metric, Model, FieldConvention)> {
    for model in Model::ALL {
        for alias in model.aliases() {
            let model_first = key
                .strip_prefix(alias)
                .and_then(|rest| rest.strip_prefix('_'))
                .and_then(Metric::match_name);
            if let Some(metric) = model_first {
                return Some((metric, model, FieldConvention::ModelFirst));
            }

            let metric_first = key
                .strip_suffix(alias)
                .and_then(|rest| rest.strip_suffix('_'))
                .and_then(Metric::match_name);
            if let Some(metric) = metric_first {
                return Some((metric, model, FieldConvention::MetricFirst));
            }
        }
    }
    None
}

/// Numeric value from a JSON number or numeric string
pub fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut obj) if obj.get("result").map_or(false, Value::is_object) => {
            unwrap_envelope(obj.remove("result").unwrap_or(Value::Null))
        }
        other => other,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalars(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .collect()
}

fn parse_prediction_map(value: &Value) -> PredictionMap {
    let Some(metrics) = value.as_object() else {
        return PredictionMap::new();
    };

    metrics
        .iter()
        .filter_map(|(metric, models)| {
            let outputs: ModelOutputs = models
                .as_object()?
                .iter()
                .filter_map(|(model, v)| numeric(v).map(|n| (model.clone(), n)))
                .collect();
            (!outputs.is_empty()).then(|| (metric.clone(), outputs))
        })
        .collect()
}

fn split_flat(fields: Map<String, Value>) -> (Map<String, Value>, PredictionMap, bool) {
    let mut input_data = Map::new();
    let mut predictions = PredictionMap::new();
    let mut saw_metric_first = false;

    for (key, value) in fields {
        match match_model_field(&key) {
            Some((metric, model, convention)) => {
                saw_metric_first |= convention == FieldConvention::MetricFirst;
                match numeric(&value) {
                    Some(n) => {
                        predictions
                            .entry(metric.as_str().to_string())
                            .or_default()
                            .insert(model.as_str().to_string(), n);
                    }
                    None => log::debug!("Skipping non-numeric model field {}", key),
                }
            }
            None => {
                input_data.insert(key, value);
            }
        }
    }

    (input_data, predictions, saw_metric_first)
}
