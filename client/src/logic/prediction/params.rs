//! Blast design parameters sent to `/api/predict`

use serde::{Deserialize, Serialize};

pub const ROCK_TYPES: [&str; 7] = ["Granite", "Limestone", "Sandstone", "Basalt", "Shale", "Coal", "Iron"];
pub const EXPLOSIVE_TYPES: [&str; 3] = ["ANFO", "Emulsion", "Slurry"];
pub const STEMMING_MATERIALS: [&str; 4] = ["Fine particle of same Ore", "Angular Rock", "Sand", "Gravel"];
pub const WATER_LOG_STATUSES: [&str; 3] = ["Dry", "Wet", "Partially Wet"];

/// Full parameter set of one blast scenario.
///
/// Missing fields deserialize to zero (or empty), except `Bench_Height`
/// which defaults to 10 m.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastParameters {
    #[serde(rename = "Rock_Type")]
    pub rock_type: String,
    #[serde(rename = "Rock_Density (kg/m³)")]
    pub rock_density: f64,
    #[serde(rename = "UCS (MPa)")]
    pub ucs: f64,
    #[serde(rename = "Rock_Elastic_Modulus (GPa)")]
    pub rock_elastic_modulus: f64,
    #[serde(rename = "Fracture_Frequency (/m)")]
    pub fracture_frequency: f64,
    #[serde(rename = "Hole_Diameter (mm)")]
    pub hole_diameter: f64,
    #[serde(rename = "Charge_Length (m)")]
    pub charge_length: f64,
    #[serde(rename = "Stemming_Length (m)")]
    pub stemming_length: f64,
    #[serde(rename = "Explosive_Type")]
    pub explosive_type: String,
    #[serde(rename = "Blast_Pattern_Spacing (m)")]
    pub blast_pattern_spacing: f64,
    #[serde(rename = "Delay_Timing (ms)")]
    pub delay_timing: f64,
    #[serde(rename = "Powder_Factor (kg/m³)")]
    pub powder_factor: f64,
    #[serde(rename = "Weathering_Degree")]
    pub weathering_degree: f64,
    #[serde(rename = "Groundwater_Level (m)")]
    pub groundwater_level: f64,
    #[serde(rename = "Blast_Vibration_PPV (mm/s)")]
    pub blast_vibration_ppv: f64,
    #[serde(rename = "Fragmentation_Size (cm)")]
    pub fragmentation_size: f64,
    #[serde(rename = "Blasting_Cost ($/tonne)")]
    pub blasting_cost: f64,
    #[serde(rename = "Penetration_Rate (m/min)")]
    pub penetration_rate: f64,
    #[serde(rename = "Bench_Height (m)")]
    pub bench_height: f64,
    #[serde(rename = "Stemming_Material")]
    pub stemming_material: String,
    #[serde(rename = "Water_Log_Status")]
    pub water_log_status: String,
    #[serde(rename = "Vibration_Level (dB)")]
    pub vibration_level: f64,
    #[serde(rename = "Noise_Level (dB)")]
    pub noise_level: f64,
    #[serde(rename = "Explosive_Weight (kg)")]
    pub explosive_weight: f64,
    #[serde(rename = "Burden (m)")]
    pub burden: f64,
    #[serde(rename = "Spacing (m)")]
    pub spacing: f64,
    #[serde(rename = "Stemming (m)")]
    pub stemming: f64,
    #[serde(rename = "SubDrilling (m)")]
    pub sub_drilling: f64,
    #[serde(rename = "Hole_Depth (m)", skip_serializing_if = "Option::is_none")]
    pub hole_depth: Option<f64>,
    #[serde(rename = "Air_Overpressure (Pa)", skip_serializing_if = "Option::is_none")]
    pub air_overpressure: Option<f64>,
    #[serde(rename = "Rock_Volume (m³)")]
    pub rock_volume: f64,
}

impl Default for BlastParameters {
    fn default() -> Self {
        Self {
            rock_type: String::new(),
            rock_density: 0.0,
            ucs: 0.0,
            rock_elastic_modulus: 0.0,
            fracture_frequency: 0.0,
            hole_diameter: 0.0,
            charge_length: 0.0,
            stemming_length: 0.0,
            explosive_type: String::new(),
            blast_pattern_spacing: 0.0,
            delay_timing: 0.0,
            powder_factor: 0.0,
            weathering_degree: 0.0,
            groundwater_level: 0.0,
            blast_vibration_ppv: 0.0,
            fragmentation_size: 0.0,
            blasting_cost: 0.0,
            penetration_rate: 0.0,
            bench_height: 10.0,
            stemming_material: String::new(),
            water_log_status: String::new(),
            vibration_level: 0.0,
            noise_level: 0.0,
            explosive_weight: 0.0,
            burden: 0.0,
            spacing: 0.0,
            stemming: 0.0,
            sub_drilling: 0.0,
            hole_depth: None,
            air_overpressure: None,
            rock_volume: 0.0,
        }
    }
}

impl BlastParameters {
    /// Reference scenario used to smoke-test the backend
    pub fn sample() -> Self {
        Self {
            rock_type: "Granite".to_string(),
            rock_density: 2700.0,
            ucs: 120.0,
            rock_elastic_modulus: 50.0,
            fracture_frequency: 2.5,
            hole_diameter: 90.0,
            charge_length: 6.0,
            stemming_length: 3.0,
            explosive_type: "ANFO".to_string(),
            blast_pattern_spacing: 4.0,
            delay_timing: 25.0,
            powder_factor: 0.5,
            weathering_degree: 0.2,
            groundwater_level: 5.0,
            blast_vibration_ppv: 10.0,
            fragmentation_size: 20.0,
            blasting_cost: 0.8,
            penetration_rate: 1.5,
            bench_height: 10.0,
            stemming_material: "Drill Cuttings".to_string(),
            water_log_status: "Dry".to_string(),
            vibration_level: 90.0,
            noise_level: 100.0,
            explosive_weight: 120.0,
            burden: 3.0,
            spacing: 3.5,
            stemming: 3.0,
            sub_drilling: 0.5,
            hole_depth: None,
            air_overpressure: None,
            rock_volume: 100.0,
        }
    }

    /// Prepare user-entered parameters for submission: the fields the
    /// backend predicts or derives are sent as zero, `Stemming (m)`
    /// mirrors the stemming length, and hole depth and air overpressure
    /// are always present.
    pub fn for_submission(mut self) -> Self {
        self.powder_factor = 0.0;
        self.blast_vibration_ppv = 0.0;
        self.fragmentation_size = 0.0;
        self.blasting_cost = 0.0;
        self.vibration_level = 0.0;
        self.noise_level = 0.0;
        self.stemming = self.stemming_length;
        self.hole_depth.get_or_insert(0.0);
        self.air_overpressure.get_or_insert(0.0);
        self
    }

    /// Choice-list fields holding values the backend was not trained on
    pub fn unknown_choices(&self) -> Vec<(&'static str, &str)> {
        let checks: [(&'static str, &str, &[&str]); 4] = [
            ("Rock_Type", self.rock_type.as_str(), &ROCK_TYPES[..]),
            ("Explosive_Type", self.explosive_type.as_str(), &EXPLOSIVE_TYPES[..]),
            ("Stemming_Material", self.stemming_material.as_str(), &STEMMING_MATERIALS[..]),
            ("Water_Log_Status", self.water_log_status.as_str(), &WATER_LOG_STATUSES[..]),
        ];

        checks
            .into_iter()
            .filter(|(_, value, known)| !known.contains(value))
            .map(|(field, value, _)| (field, value))
            .collect()
    }
}

/// Body of `POST /api/predict`
#[derive(Debug, Serialize)]
pub struct PredictRequest<'a> {
    pub id: &'a str,
    #[serde(flatten)]
    pub params: &'a BlastParameters,
}
