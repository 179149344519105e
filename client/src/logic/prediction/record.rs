use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Outputs of every model for one metric
pub type ModelOutputs = BTreeMap<String, f64>;

/// metric name -> model name -> value
pub type PredictionMap = BTreeMap<String, ModelOutputs>;

/// Predicted metrics the backend knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    FragmentationSize,
    VibrationLevel,
    NoiseLevel,
    PowderFactor,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::FragmentationSize,
        Metric::VibrationLevel,
        Metric::NoiseLevel,
        Metric::PowderFactor,
    ];

    /// Canonical key used in `predictions`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FragmentationSize => "Fragmentation_Size (cm)",
            Self::VibrationLevel => "Vibration_Level (dB)",
            Self::NoiseLevel => "Noise_Level (dB)",
            Self::PowderFactor => "Powder_Factor",
        }
    }

    /// Match a field fragment against the metric names. A fragment that
    /// starts with a metric name also matches, so `Powder_Factor (kg/m³)`
    /// resolves to `Powder_Factor`.
    pub fn match_name(fragment: &str) -> Option<Metric> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| fragment == m.as_str() || fragment.starts_with(m.as_str()))
    }
}

/// Models every prediction is computed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    Svr,
    XgBoost,
    RandomForest,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::Svr, Model::XgBoost, Model::RandomForest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Svr => "SVR",
            Self::XgBoost => "XGBoost",
            Self::RandomForest => "Random Forest",
        }
    }

    /// Spellings seen in flat backend fields
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Svr => &["SVR"],
            Self::XgBoost => &["XGBoost"],
            Self::RandomForest => &["Random Forest", "Random_Forest"],
        }
    }
}

/// Stored input parameters plus per-model outputs for one blast scenario.
///
/// `input_data` only holds JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,

    #[serde(default)]
    pub input_data: Map<String, Value>,

    #[serde(default)]
    pub predictions: PredictionMap,
}

impl PredictionRecord {
    pub fn rock_type(&self) -> Option<&str> {
        self.input_data.get("Rock_Type").and_then(Value::as_str)
    }

    pub fn value(&self, metric: &str, model: &str) -> Option<f64> {
        self.predictions.get(metric)?.get(model).copied()
    }

    pub fn has_predictions(&self) -> bool {
        self.predictions.values().any(|models| !models.is_empty())
    }

    /// Input parameters without the echoed `id`, the way they are displayed
    pub fn display_inputs(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.input_data.iter().filter(|(key, _)| key.as_str() != "id")
    }
}

/// Result of looking up one prediction
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionLookup {
    Found(PredictionRecord),
    /// The record exists but carries no recognizable prediction values
    NoPredictionData {
        id: String,
        input_data: Map<String, Value>,
    },
}

impl PredictionLookup {
    pub fn id(&self) -> &str {
        match self {
            Self::Found(record) => &record.id,
            Self::NoPredictionData { id, .. } => id,
        }
    }

    pub fn record(&self) -> Option<&PredictionRecord> {
        match self {
            Self::Found(record) => Some(record),
            Self::NoPredictionData { .. } => None,
        }
    }

    pub fn input_data(&self) -> &Map<String, Value> {
        match self {
            Self::Found(record) => &record.input_data,
            Self::NoPredictionData { input_data, .. } => input_data,
        }
    }

    /// Record form, with an empty `predictions` map when none was found
    pub fn into_record(self) -> PredictionRecord {
        match self {
            Self::Found(record) => record,
            Self::NoPredictionData { id, input_data } => PredictionRecord {
                id,
                input_data,
                predictions: PredictionMap::new(),
            },
        }
    }
}

/// Whether `id` was chosen by a user rather than generated by the server
pub fn is_custom_id(id: &str) -> bool {
    Uuid::parse_str(id).is_err()
}
