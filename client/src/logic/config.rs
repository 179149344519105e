//! Client configuration

use std::path::PathBuf;

use crate::constants;

/// Runtime configuration for the client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Prediction backend base URL (no trailing slash)
    pub api_url: String,

    /// HTTP timeout in seconds
    pub timeout_seconds: u64,

    /// Directory holding the local store file
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_API_URL.to_string(),
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECS,
            data_dir: constants::get_data_dir(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            api_url: constants::get_api_url(),
            timeout_seconds: constants::get_timeout_secs(),
            data_dir: constants::get_data_dir(),
        }
    }

    /// Override the backend URL
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Path of the local store file
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("storage.json")
    }
}
