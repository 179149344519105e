//! Settings Module - display/export preferences and account management
//!
//! Settings are fetched from the server on session start, edited locally and
//! persisted on explicit save. Plain loads have no side effects. The local copy under `userSettings` is the
//! fallback when the server is unreachable. Concurrent edits from several
//! clients are last-write-wins.

pub mod account;


use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::constants::{KEY_PREFERRED_LANGUAGE, KEY_USER_SETTINGS};
use crate::logic::export::ExportFormat;
use crate::logic::gateway::{decode, ApiClient, ApiError};
use crate::logic::storage::{LocalStore, StorageError};

pub use account::{AccountError, AccountService, AccountUpdate};

pub const LANGUAGES: [(&str, &str); 5] = [
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("hi", "Hindi"),
];
pub const THEMES: [&str; 3] = ["light", "dark", "system"];
pub const RETENTION_POLICIES: [&str; 5] = ["7days", "30days", "90days", "1year", "forever"];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Unknown setting '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key} (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}

/// Display and export preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub email_notifications: bool,

    #[serde(default)]
    pub push_notifications: bool,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default = "default_export_format")]
    pub data_export_format: String,

    #[serde(default = "default_retention")]
    pub data_retention: String,

    #[serde(default = "default_true")]
    pub auto_save: bool,

    /// Server keys this client does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_theme() -> String {
    "system".to_string()
}

fn default_export_format() -> String {
    "csv".to_string()
}

fn default_retention() -> String {
    "30days".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            email_notifications: false,
            push_notifications: false,
            language: default_language(),
            theme: default_theme(),
            data_export_format: default_export_format(),
            data_retention: default_retention(),
            auto_save: true,
            extra: Map::new(),
        }
    }
}

impl UserSettings {
    /// Preferred export format; unknown values fall back to CSV
    pub fn export_format(&self) -> ExportFormat {
        self.data_export_format.parse().unwrap_or(ExportFormat::Csv)
    }

    /// Set one setting by its wire name, validating the value
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let value = value.trim();
        match key {
            "emailNotifications" => self.email_notifications = parse_bool(key, value)?,
            "pushNotifications" => self.push_notifications = parse_bool(key, value)?,
            "autoSave" => self.auto_save = parse_bool(key, value)?,
            "language" => {
                let codes: Vec<&str> = LANGUAGES.iter().map(|(code, _)| *code).collect();
                self.language = one_of(key, value, &codes)?;
            }
            "theme" => self.theme = one_of(key, value, &THEMES)?,
            "dataRetention" => self.data_retention = one_of(key, value, &RETENTION_POLICIES)?,
            "dataExportFormat" => {
                let format: ExportFormat = value.parse().map_err(|_| invalid(key, value, "json, csv or excel"))?;
                self.data_export_format = match format {
                    ExportFormat::Json => "json",
                    ExportFormat::Csv => "csv",
                    ExportFormat::Xlsx => "excel",
                }
                .to_string();
            }
            other => match self.extra.get_mut(other) {
                Some(slot) => *slot = Value::String(value.to_string()),
                None => return Err(SettingsError::UnknownKey(other.to_string())),
            },
        }
        Ok(())
    }
}

/// Human-readable language name
pub fn language_name(code: &str) -> &str {
    LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or(code)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(invalid(key, value, "true or false")),
    }
}

fn one_of(key: &str, value: &str, allowed: &[&str]) -> Result<String, SettingsError> {
    if allowed.contains(&value) {
        Ok(value.to_string())
    } else {
        Err(invalid(key, value, &allowed.join(", ")))
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

/// Current settings plus the last loaded/saved snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsState {
    current: UserSettings,
    snapshot: UserSettings,
}

impl SettingsState {
    pub fn new(settings: UserSettings) -> Self {
        Self {
            current: settings.clone(),
            snapshot: settings,
        }
    }

    pub fn current(&self) -> &UserSettings {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut UserSettings {
        &mut self.current
    }

    pub fn is_dirty(&self) -> bool {
        self.current != self.snapshot
    }

    /// Accept the current settings as the new baseline
    pub fn commit(&mut self) {
        self.snapshot = self.current.clone();
    }

    /// Throw away unsaved changes
    pub fn revert(&mut self) {
        self.current = self.snapshot.clone();
    }
}

/// Where the loaded settings came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    Server,
    LocalCopy,
    Defaults,
}

pub struct SettingsSync {
    api: Arc<ApiClient>,
    store: Arc<LocalStore>,
    state: SettingsState,
}

impl SettingsSync {
    pub fn new(api: Arc<ApiClient>, store: Arc<LocalStore>) -> Self {
        Self {
            api,
            store,
            state: SettingsState::default(),
        }
    }

    /// Load from the server, falling back to the local copy, then defaults
    pub async fn load(&mut self) -> SettingsSource {
        let (settings, source) = match self.fetch_remote().await {
            Some(settings) => (settings, SettingsSource::Server),
            None => match self.store.get::<UserSettings>(KEY_USER_SETTINGS) {
                Some(settings) => (settings, SettingsSource::LocalCopy),
                None => (UserSettings::default(), SettingsSource::Defaults),
            },
        };

        self.state = SettingsState::new(settings);
        log::debug!("Settings loaded from {:?}", source);
        source
    }

    /// Load after signin: server settings replace the local copy and the
    /// language preference is mirrored
    pub async fn start_session(&mut self) -> SettingsSource {
        let source = self.load().await;
        let settings = self.state.current().clone();

        if source == SettingsSource::Server {
            if let Err(e) = self.store.set(KEY_USER_SETTINGS, &settings) {
                log::warn!("Failed to keep local settings copy: {}", e);
            }
        }
        self.remember_language(&settings.language);
        source
    }

    /// Load the local copy only, without asking the server
    pub fn load_local(&mut self) -> SettingsSource {
        let (settings, source) = match self.store.get::<UserSettings>(KEY_USER_SETTINGS) {
            Some(settings) => (settings, SettingsSource::LocalCopy),
            None => (UserSettings::default(), SettingsSource::Defaults),
        };
        self.state = SettingsState::new(settings);
        source
    }

    pub fn settings(&self) -> &UserSettings {
        self.state.current()
    }

    pub fn settings_mut(&mut self) -> &mut UserSettings {
        self.state.current_mut()
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.state.current_mut().set(key, value)
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    /// Persist to the server, then locally. On failure nothing is committed.
    pub async fn save(&mut self) -> Result<(), SettingsError> {
        let settings = self.state.current().clone();
        self.api.put("/api/settings", &settings).await?;

        self.store.set(KEY_USER_SETTINGS, &settings)?;
        self.remember_language(&settings.language);
        self.state.commit();

        log::info!("Settings saved");
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.state.revert();
    }

    async fn fetch_remote(&self) -> Option<UserSettings> {
        if !self.api.session().is_authenticated() {
            log::debug!("Not signed in, skipping server settings");
            return None;
        }

        match self.api.get("/api/settings").await.and_then(decode::<UserSettings>) {
            Ok(settings) => Some(settings),
            Err(e) => {
                log::warn!("Error fetching settings, using local copy: {}", e);
                None
            }
        }
    }

    fn remember_language(&self, language: &str) {
        if let Err(e) = self.store.set(KEY_PREFERRED_LANGUAGE, language) {
            log::warn!("Failed to store preferred language: {}", e);
        }
    }
}
