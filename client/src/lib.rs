//! Rock Blast Prediction client
//!
//! Talks to the prediction backend, keeps the session and a small local
//! cache, and exports prediction records.

pub mod api;
pub mod constants;
pub mod logic;
