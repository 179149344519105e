//! API Gateway - authenticated HTTP access to the prediction backend
//!
//! This module handles:
//! - Bearer token attachment from the current session
//! - JSON request/response bodies
//! - Normalizing error bodies into `ApiError`

pub mod client;
pub mod error;

pub use client::{decode, ApiClient};
pub use error::{ApiError, FieldError};
