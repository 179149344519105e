//! Account operations: sign-in, sign-up, profile edits and data export.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::constants::KEY_USER_SETTINGS;
use crate::logic::gateway::{ApiClient, ApiError};
use crate::logic::recents::RecentsCache;
use crate::logic::session::User;
use crate::logic::storage::StorageError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("New passwords don't match")]
    PasswordMismatch,

    #[error("Please enter your current password")]
    MissingCurrentPassword,

    /// Signin rejected by the backend; the current session is kept
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Server did not return an access token")]
    MissingToken,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Profile and password change request
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: String,
    pub email: String,
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl AccountUpdate {
    /// Local checks, run before any request is sent
    pub fn validate(&self) -> Result<(), AccountError> {
        if self.new_password != self.confirm_password {
            return Err(AccountError::PasswordMismatch);
        }
        if !self.new_password.is_empty() && self.old_password.is_empty() {
            return Err(AccountError::MissingCurrentPassword);
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountUpdateBody<'a> {
    name: &'a str,
    email: &'a str,
    old_password: &'a str,
    new_password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

pub struct AccountService {
    api: Arc<ApiClient>,
}

impl AccountService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Exchange credentials for a token and load the profile
    pub async fn signin(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let token: TokenResponse = self
            .api
            .post_anonymous_as("/api/signin", &json!({ "email": email, "password": password }))
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized(message) => AccountError::InvalidCredentials(message),
                other => other.into(),
            })?;
        self.start_session(token)?;

        let user = self.profile().await?;
        self.api.session().set_user(user.clone())?;

        log::info!("Signed in as {}", user.username);
        Ok(user)
    }

    /// Register; the new account is signed in immediately
    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<User, AccountError> {
        let token: TokenResponse = self
            .api
            .post_anonymous_as(
                "/api/signup",
                &json!({ "username": username, "email": email, "password": password }),
            )
            .await?;
        self.start_session(token)?;

        let user = User::new(username, email);
        self.api.session().set_user(user.clone())?;

        log::info!("Registered {}", username);
        Ok(user)
    }

    /// Local only; the backend keeps no session state for this client
    pub fn logout(&self) -> Result<(), AccountError> {
        self.api.session().logout()?;
        Ok(())
    }

    pub async fn profile(&self) -> Result<User, AccountError> {
        Ok(self.api.get_as::<User>("/api/profile").await?)
    }

    /// Update name, email and optionally the password.
    ///
    /// Older backends only expose `/api/update-profile`; it is used when
    /// `/api/account` answers 404.
    pub async fn update_account(&self, update: &AccountUpdate) -> Result<Option<User>, AccountError> {
        update.validate()?;

        let body = AccountUpdateBody {
            name: &update.name,
            email: &update.email,
            old_password: &update.old_password,
            new_password: &update.new_password,
        };

        match self.api.put("/api/account", &body).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                log::debug!("/api/account not available, using /api/update-profile");
                self.api.put("/api/update-profile", &body).await?;
            }
            Err(e) => return Err(e.into()),
        }

        let user = self.api.session().update_user(|user| {
            if !update.name.is_empty() {
                user.username = update.name.clone();
            }
            if !update.email.is_empty() {
                user.email = update.email.clone();
            }
        })?;

        log::info!("Account updated");
        Ok(user)
    }

    /// Download everything the server holds for this user into `dir`
    pub async fn export_user_data(&self, dir: &Path) -> Result<PathBuf, AccountError> {
        let data = self.api.get("/api/user/data/export").await?;

        fs::create_dir_all(dir)?;
        let path = dir.join(user_data_file_name());
        fs::write(&path, serde_json::to_vec_pretty(&data)?)?;

        log::info!("User data exported to {}", path.display());
        Ok(path)
    }

    pub async fn logout_all_devices(&self) -> Result<(), AccountError> {
        self.api.post("/api/logout/all-devices", &json!({})).await?;
        self.api.session().logout()?;
        Ok(())
    }

    /// Delete the account, then every local trace of it
    pub async fn delete_account(&self) -> Result<(), AccountError> {
        self.api.delete("/api/account").await?;

        let session = self.api.session();
        session.logout()?;
        RecentsCache::new(session.store().clone()).clear()?;
        session.store().remove(KEY_USER_SETTINGS)?;

        log::info!("Account deleted");
        Ok(())
    }

    fn start_session(&self, token: TokenResponse) -> Result<(), AccountError> {
        if token.access_token.is_empty() {
            return Err(AccountError::MissingToken);
        }
        self.api.session().authenticate(token.access_token)?;
        Ok(())
    }
}

/// `rockblast_user_data_<YYYY-MM-DD>.json`
pub fn user_data_file_name() -> String {
    format!("rockblast_user_data_{}.json", Utc::now().format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_mismatch() {
        let update = AccountUpdate {
            old_password: "old".into(),
            new_password: "one".into(),
            confirm_password: "two".into(),
            ..Default::default()
        };
        assert!(matches!(update.validate(), Err(AccountError::PasswordMismatch)));
    }

    #[test]
    fn test_current_password_required() {
        let update = AccountUpdate {
            new_password: "secret".into(),
            confirm_password: "secret".into(),
            ..Default::default()
        };
        assert!(matches!(update.validate(), Err(AccountError::MissingCurrentPassword)));
    }

    #[test]
    fn test_profile_only_update_is_valid() {
        let update = AccountUpdate {
            name: "ana".into(),
            email: "ana@example.com".into(),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_update_body_uses_camel_case() {
        let body = serde_json::to_value(AccountUpdateBody {
            name: "a",
            email: "b",
            old_password: "c",
            new_password: "d",
        })
        .unwrap();
        assert_eq!(body["oldPassword"], "c");
        assert_eq!(body["newPassword"], "d");
    }

    #[test]
    fn test_user_data_file_name() {
        let name = user_data_file_name();
        assert!(name.starts_with("rockblast_user_data_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "rockblast_user_data_2024-01-01.json".len());
    }
}
