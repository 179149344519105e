//! Gateway errors
//!
//! Normalizes backend error bodies into one error type. The backend speaks
//! FastAPI-style bodies: `{"detail": "..."}` or
//! `{"detail": [{"loc": ["body", "field"], "msg": "..."}]}`.

use serde_json::Value;
use thiserror::Error;

/// One itemized validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Errors surfaced by the API gateway
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Transport failure, the server was never reached
    #[error("Cannot reach server: {0}")]
    Connectivity(String),

    /// Backend rejected the request body field by field
    #[error("Validation error: {}", join_fields(.fields))]
    Validation { status: u16, fields: Vec<FieldError> },

    /// Token missing, invalid or expired
    #[error("{0}")]
    Unauthorized(String),

    /// Any other non-2xx response
    #[error("{message}")]
    Server { status: u16, message: String },

    /// 2xx response whose body could not be understood
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Rejected locally before any request was sent
    #[error("{0}")]
    InvalidInput(String),
}

impl ApiError {
    /// Build the error for a non-2xx response
    pub fn from_response(status: u16, reason: Option<&str>, body: &str) -> Self {
        let fallback = || match reason {
            Some(reason) => format!("Error {}: {}", status, reason),
            None => format!("Error {}", status),
        };

        let message = match serde_json::from_str::<Value>(body) {
            Ok(json) => {
                if let Some(fields) = validation_items(&json) {
                    if status != 401 {
                        return ApiError::Validation { status, fields };
                    }
                }
                server_message(&json).unwrap_or_else(fallback)
            }
            Err(_) if !body.trim().is_empty() => format!("Error {}: {}", status, body.trim()),
            Err(_) => fallback(),
        };

        if status == 401 {
            ApiError::Unauthorized(message)
        } else {
            ApiError::Server { status, message }
        }
    }

    /// HTTP status, when the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Validation { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// Whether the user has to sign in again
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Connectivity(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `detail` as an array of `{loc, msg}`
fn validation_items(json: &Value) -> Option<Vec<FieldError>> {
    let items = json.get("detail")?.as_array()?;
    let fields = items
        .iter()
        .map(|item| {
            let loc = item.get("loc").and_then(Value::as_array);
            let field = loc
                .and_then(|loc| loc.get(1).or_else(|| loc.last()))
                .map(loc_to_string)
                .unwrap_or_else(|| "request".to_string());
            let message = item
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("invalid value")
                .to_string();
            FieldError { field, message }
        })
        .collect();
    Some(fields)
}

fn loc_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn server_message(json: &Value) -> Option<String> {
    ["detail", "message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_body_is_itemized() {
        let body = r#"{"detail":[
            {"loc":["body","UCS (MPa)"],"msg":"field required","type":"missing"},
            {"loc":["body"],"msg":"bad body"}
        ]}"#;

        let err = ApiError::from_response(422, Some("Unprocessable Entity"), body);
        match &err {
            ApiError::Validation { status, fields } => {
                assert_eq!(*status, 422);
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "UCS (MPa)");
                assert_eq!(fields[0].message, "field required");
                assert_eq!(fields[1].field, "body");
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "Validation error: UCS (MPa): field required, body: bad body"
        );
    }

    #[test]
    fn test_validation_keeps_response_status() {
        let body = r#"{"detail":[{"loc":["body","Burden (m)"],"msg":"must be positive"}]}"#;
        let err = ApiError::from_response(400, Some("Bad Request"), body);

        assert!(matches!(err, ApiError::Validation { status: 400, .. }));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_detail_string_is_used() {
        let err = ApiError::from_response(404, Some("Not Found"), r#"{"detail":"Prediction not found"}"#);
        assert_eq!(err.to_string(), "Prediction not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_fallbacks() {
        let err = ApiError::from_response(500, Some("Internal Server Error"), "{}");
        assert_eq!(err.to_string(), "Error 500: Internal Server Error");

        let err = ApiError::from_response(502, Some("Bad Gateway"), "upstream down");
        assert_eq!(err.to_string(), "Error 502: upstream down");

        let err = ApiError::from_response(503, None, "");
        assert_eq!(err.to_string(), "Error 503");
    }

    #[test]
    fn test_unauthorized() {
        let err = ApiError::from_response(401, Some("Unauthorized"), r#"{"detail":"Could not validate credentials"}"#);
        assert!(err.requires_sign_in());
        assert_eq!(err.to_string(), "Could not validate credentials");
    }

    #[test]
    fn test_connectivity_is_distinct_from_validation() {
        let network = ApiError::Connectivity("connection refused".into());
        let validation = ApiError::Validation { status: 422, fields: vec![] };
        assert!(network.is_connectivity());
        assert!(!validation.is_connectivity());
        assert_eq!(network.status(), None);
        assert_eq!(validation.status(), Some(422));
    }
}
