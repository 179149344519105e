//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! To change the default prediction backend, only edit this file.

use std::path::PathBuf;

/// Default prediction API URL
///
/// This is the fallback URL when no environment variable is set.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default HTTP timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of entries kept in the recents cache
pub const RECENTS_LIMIT: usize = 10;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Rock Blast";

/// Directory name used under the platform data dir
pub const DATA_DIR_NAME: &str = "rockblast";

// ============================================
// Local store keys
// ============================================

pub const KEY_TOKEN: &str = "token";
pub const KEY_USER: &str = "user";
pub const KEY_PREDICTIONS: &str = "predictions";
pub const KEY_USER_SETTINGS: &str = "userSettings";
pub const KEY_PREFERRED_LANGUAGE: &str = "preferred_language";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get prediction API URL from environment or use default
pub fn get_api_url() -> String {
    std::env::var("ROCKBLAST_API_URL")
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

/// Get HTTP timeout from environment or use default
pub fn get_timeout_secs() -> u64 {
    std::env::var("ROCKBLAST_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
}

/// Get local data directory from environment or use the platform default
pub fn get_data_dir() -> PathBuf {
    std::env::var("ROCKBLAST_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DATA_DIR_NAME)
        })
}
