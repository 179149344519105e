//! Prediction lifecycle: submit, fetch, edit-and-recalculate, delete.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::normalize::normalize;
use super::params::{BlastParameters, PredictRequest};
use super::record::{is_custom_id, PredictionLookup, PredictionRecord};
use crate::logic::gateway::{ApiClient, ApiError};
use crate::logic::recents::{RecentPredictionEntry, RecentsCache};

/// Outcome of reconciling the recents cache with server history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecentsSync {
    /// Cache overwritten with this many server entries
    Replaced(usize),
    /// Server unavailable or empty, local cache kept
    KeptLocal,
}

pub struct PredictionService {
    api: Arc<ApiClient>,
    recents: Arc<RecentsCache>,
}

impl PredictionService {
    pub fn new(api: Arc<ApiClient>, recents: Arc<RecentsCache>) -> Self {
        Self { api, recents }
    }

    pub fn recents(&self) -> &Arc<RecentsCache> {
        &self.recents
    }

    /// Submit parameters for prediction.
    ///
    /// Uses the trimmed `custom_id` when given, otherwise a fresh UUID, and
    /// records the new prediction in the recents cache.
    pub async fn predict(
        &self,
        params: BlastParameters,
        custom_id: Option<&str>,
    ) -> Result<PredictionLookup, ApiError> {
        let custom_id = custom_id.map(str::trim).filter(|id| !id.is_empty());
        let id = match custom_id {
            Some(id) => validate_id(id)?,
            None => Uuid::new_v4().to_string(),
        };

        for (field, value) in params.unknown_choices() {
            log::warn!("{} '{}' is not a known option", field, value);
        }

        let params = params.for_submission();
        let body = self.api.post("/api/predict", &PredictRequest { id: &id, params: &params }).await?;
        let lookup = normalize(body, &id);

        let entry = RecentPredictionEntry::now(&id, params.rock_type.clone(), custom_id.is_some());
        if let Err(e) = self.recents.push(entry) {
            log::warn!("Failed to cache recent prediction {}: {}", id, e);
        }

        log::info!("Prediction completed: {}", id);
        Ok(lookup)
    }

    /// Predict with the reference parameters; nothing is cached
    pub async fn predict_default(&self) -> Result<PredictionLookup, ApiError> {
        let id = Uuid::new_v4().to_string();
        let params = BlastParameters::sample();
        let body = self.api.post("/api/predict", &PredictRequest { id: &id, params: &params }).await?;
        Ok(normalize(body, &id))
    }

    /// Fetch one prediction by id
    pub async fn fetch(&self, id: &str) -> Result<PredictionLookup, ApiError> {
        let id = validate_id(id)?;
        let body = self.api.get(&format!("/api/data/{}", id)).await?;
        let lookup = normalize(body, &id);

        if let PredictionLookup::Found(record) = &lookup {
            if let Err(e) = self.recents.touch(&id, record.rock_type()) {
                log::warn!("Failed to cache recent prediction {}: {}", id, e);
            }
        }

        Ok(lookup)
    }

    /// Send edited fields and receive the recalculated record
    pub async fn update(&self, id: &str, fields: Map<String, Value>) -> Result<PredictionLookup, ApiError> {
        let id = validate_id(id)?;
        if fields.is_empty() {
            return Err(ApiError::InvalidInput("No fields to update".to_string()));
        }

        let body = self.api.put(&format!("/api/data/{}", id), &fields).await?;
        let lookup = normalize(body, &id);

        let rock_type = fields
            .get("Rock_Type")
            .and_then(Value::as_str)
            .or_else(|| lookup.record().and_then(PredictionRecord::rock_type));
        if let Some(rock_type) = rock_type {
            if let Err(e) = self.recents.update_rock_type(&id, rock_type) {
                log::warn!("Failed to update cached rock type for {}: {}", id, e);
            }
        }

        log::info!("Prediction updated: {}", id);
        Ok(lookup)
    }

    /// Delete a prediction and forget it locally
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let id = validate_id(id)?;
        self.api.delete(&format!("/api/data/{}", id)).await?;

        if let Err(e) = self.recents.remove(&id) {
            log::warn!("Failed to drop {} from recents: {}", id, e);
        }

        log::info!("Prediction deleted: {}", id);
        Ok(())
    }

    /// Server-side prediction history
    pub async fn history(&self) -> Result<Vec<PredictionRecord>, ApiError> {
        Ok(self
            .history_entries()
            .await?
            .into_iter()
            .map(|(record, _)| record)
            .collect())
    }

    /// Best-effort reconcile of the recents cache with server history
    pub async fn sync_recents(&self) -> RecentsSync {
        let history = match self.history_entries().await {
            Ok(history) => history,
            Err(e) => {
                log::warn!("History unavailable, keeping local recents: {}", e);
                return RecentsSync::KeptLocal;
            }
        };

        if history.is_empty() {
            log::debug!("Server history is empty, keeping local recents");
            return RecentsSync::KeptLocal;
        }

        let entries: Vec<_> = history
            .into_iter()
            .map(|(record, timestamp)| RecentPredictionEntry {
                custom_id: is_custom_id(&record.id),
                rock_type: record.rock_type().unwrap_or_default().to_string(),
                timestamp: timestamp.unwrap_or_else(Utc::now),
                id: record.id,
            })
            .collect();

        let count = entries.len();
        match self.recents.replace_all(entries) {
            Ok(()) => RecentsSync::Replaced(count),
            Err(e) => {
                log::warn!("Failed to store server history locally: {}", e);
                RecentsSync::KeptLocal
            }
        }
    }

    async fn history_entries(&self) -> Result<Vec<(PredictionRecord, Option<DateTime<Utc>>)>, ApiError> {
        let body = self.api.get("/api/predictions/history").await?;
        let items = match body {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(ApiError::Decode(format!(
                    "expected a history array, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(items
            .into_iter()
            .filter_map(|item| {
                let timestamp = created_at(&item);
                let lookup = normalize(item, "");
                if lookup.id().is_empty() {
                    log::debug!("Skipping history item without an id");
                    return None;
                }
                Some((lookup.into_record(), timestamp))
            })
            .collect())
    }
}

/// Trim and check a prediction id before it is placed in a URL path
pub fn validate_id(id: &str) -> Result<String, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::InvalidInput("Please enter a prediction ID".to_string()));
    }
    if id.contains(|c: char| matches!(c, '/' | '?' | '#' | '%')) {
        return Err(ApiError::InvalidInput(format!("Invalid prediction ID: {}", id)));
    }
    Ok(id.to_string())
}

fn created_at(item: &Value) -> Option<DateTime<Utc>> {
    let record = item.get("result").unwrap_or(item);
    ["created_at", "timestamp", "updated_at"]
        .iter()
        .filter_map(|key| {
            record
                .get(*key)
                .or_else(|| record.get("input_data").and_then(|d| d.get(*key)))
        })
        .filter_map(Value::as_str)
        .find_map(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert_eq!(validate_id("  site1-test2 ").unwrap(), "site1-test2");
        assert!(matches!(validate_id("   "), Err(ApiError::InvalidInput(_))));
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("a?b").is_err());
    }

    #[test]
    fn test_created_at_lookup() {
        let item = serde_json::json!({"result": {"created_at": "2024-03-02T08:00:00Z"}});
        let ts = created_at(&item).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-02T08:00:00+00:00");

        let nested = serde_json::json!({"input_data": {"timestamp": "2024-03-02T08:00:00+02:00"}});
        assert!(created_at(&nested).is_some());
        assert!(created_at(&serde_json::json!({"id": "x"})).is_none());
    }
}
