//! API Module - command layer used by the CLI
//!
//! - `commands` - one handler per user action
//! - `notice` - error to user notification mapping

pub mod commands;
pub mod notice;

pub use commands::*;
pub use notice::Notice;
