//! Prediction Module - retrieval, normalization and edit lifecycle
//!
//! - `record` - typed prediction record and lookup result
//! - `params` - blast design parameters for new predictions
//! - `normalize` - adapter over the backend's response shapes
//! - `service` - predict / fetch / update / delete / history

pub mod normalize;
pub mod params;
pub mod record;
pub mod service;

pub use normalize::normalize;
pub use params::BlastParameters;
pub use record::{Metric, Model, PredictionLookup, PredictionMap, PredictionRecord};
pub use service::{PredictionService, RecentsSync};
