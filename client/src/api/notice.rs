//! User-visible notifications
//!
//! Every failure reaching the command layer becomes a `Notice`. Nothing is
//! retried; only an expired session asks the user to act (sign in again).

use std::fmt;

use crate::logic::export::ExportError;
use crate::logic::gateway::ApiError;
use crate::logic::settings::{AccountError, SettingsError};
use crate::logic::storage::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    /// The session is gone and the user has to sign in again
    pub sign_in_required: bool,
}

impl Notice {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            sign_in_required: false,
        }
    }

    pub fn authentication_required() -> Self {
        Self {
            title: "Authentication Required".to_string(),
            description: "Please sign in to continue.".to_string(),
            sign_in_required: true,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

impl std::error::Error for Notice {}

impl From<ApiError> for Notice {
    fn from(err: ApiError) -> Self {
        match &err {
            ApiError::Connectivity(_) => Notice::new(
                "Connection Error",
                format!("{}. Check that the prediction backend is running.", err),
            ),
            ApiError::Validation { fields, .. } => Notice::new(
                "Validation Error",
                fields
                    .iter()
                    .map(|f| format!("{}: {}", f.field, f.message))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            ApiError::Unauthorized(message) => Notice {
                title: "Session Expired".to_string(),
                description: format!("{}. Please sign in again.", message.trim_end_matches('.')),
                sign_in_required: true,
            },
            ApiError::InvalidInput(message) => Notice::new("Invalid Input", message.clone()),
            ApiError::Decode(_) => Notice::new("Unexpected Response", err.to_string()),
            ApiError::Server { .. } => Notice::new("Error", err.to_string()),
        }
    }
}

impl From<StorageError> for Notice {
    fn from(err: StorageError) -> Self {
        Notice::new("Local Storage Error", err.to_string())
    }
}

impl From<ExportError> for Notice {
    fn from(err: ExportError) -> Self {
        Notice::new("Export Failed", err.to_string())
    }
}

impl From<SettingsError> for Notice {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Api(e) => e.into(),
            SettingsError::Storage(e) => e.into(),
            other => Notice::new("Invalid Setting", other.to_string()),
        }
    }
}

impl From<AccountError> for Notice {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Api(e) => e.into(),
            AccountError::Storage(e) => e.into(),
            AccountError::PasswordMismatch | AccountError::MissingCurrentPassword => {
                Notice::new("Password Error", err.to_string())
            }
            AccountError::Io(_) | AccountError::Json(_) => Notice::new("Download Failed", err.to_string()),
            AccountError::InvalidCredentials(_) => Notice::new("Sign In Failed", err.to_string()),
            AccountError::MissingToken => Notice::new("Error", err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::gateway::FieldError;

    #[test]
    fn test_unauthorized_requires_sign_in() {
        let notice = Notice::from(ApiError::Unauthorized("Token expired".into()));
        assert!(notice.sign_in_required);
        assert_eq!(notice.description, "Token expired. Please sign in again.");
    }

    #[test]
    fn test_validation_is_itemized() {
        let notice = Notice::from(ApiError::Validation {
            status: 422,
            fields: vec![
                FieldError { field: "UCS (MPa)".into(), message: "field required".into() },
                FieldError { field: "Burden (m)".into(), message: "must be positive".into() },
            ],
        });
        assert_eq!(notice.title, "Validation Error");
        assert_eq!(notice.description.lines().count(), 2);
        assert!(!notice.sign_in_required);
    }

    #[test]
    fn test_connectivity_is_distinct() {
        let notice = Notice::from(ApiError::Connectivity("connection refused".into()));
        assert_eq!(notice.title, "Connection Error");
        assert!(notice.description.starts_with("Cannot reach server"));
    }

    #[test]
    fn test_rejected_signin_is_not_an_expired_session() {
        let notice = Notice::from(AccountError::InvalidCredentials("Incorrect email or password".into()));
        assert_eq!(notice.title, "Sign In Failed");
        assert!(!notice.sign_in_required);
    }

    #[test]
    fn test_password_errors() {
        let notice = Notice::from(AccountError::PasswordMismatch);
        assert_eq!(notice.title, "Password Error");
    }
}
