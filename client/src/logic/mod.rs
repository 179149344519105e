//! Logic Module - client-side services
//!
//! - `config` - runtime configuration
//! - `storage` - persisted key/value store
//! - `session` - token and profile lifecycle
//! - `gateway` - authenticated HTTP client and error normalization
//! - `prediction` - prediction retrieval, normalization and editing
//! - `recents` - local recent-predictions index
//! - `export` - JSON / CSV / XLSX export of a record
//! - `settings` - user preferences and account management

pub mod config;
pub mod export;
pub mod gateway;
pub mod prediction;
pub mod recents;
pub mod session;
pub mod settings;
pub mod storage;
