//! Session
//!
//! Explicit session object with lifecycle
//! `Anonymous -> Authenticated -> Expired`. The token and profile are
//! persisted to the local store under `token` and `user`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::constants::{KEY_TOKEN, KEY_USER};
use crate::logic::storage::{LocalStore, StorageError};

/// User profile as returned by `/api/profile`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,

    /// Fields this client does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            ..Default::default()
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticated { token: String, user: Option<User> },
    /// The backend rejected the token; the user has to sign in again
    Expired,
}

/// Session handle shared between the gateway and the services
pub struct Session {
    store: Arc<LocalStore>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Restore the session from the local store
    pub fn restore(store: Arc<LocalStore>) -> Self {
        let token: Option<String> = store.get(KEY_TOKEN).filter(|t: &String| !t.is_empty());
        let state = match token {
            Some(token) => {
                let user = store.get::<User>(KEY_USER);
                log::debug!("Session restored (user: {})",
                    user.as_ref().map(|u| u.username.as_str()).unwrap_or("unknown"));
                SessionState::Authenticated { token, user }
            }
            None => SessionState::Anonymous,
        };

        Self {
            store,
            state: RwLock::new(state),
        }
    }

    /// Fresh anonymous session over `store`
    pub fn anonymous(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            state: RwLock::new(SessionState::Anonymous),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.read(), SessionState::Authenticated { .. })
    }

    pub fn is_expired(&self) -> bool {
        matches!(*self.state.read(), SessionState::Expired)
    }

    /// Bearer token, if authenticated
    pub fn token(&self) -> Option<String> {
        match &*self.state.read() {
            SessionState::Authenticated { token, .. } => Some(token.clone()),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<User> {
        match &*self.state.read() {
            SessionState::Authenticated { user, .. } => user.clone(),
            _ => None,
        }
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Enter the authenticated state with a fresh token
    pub fn authenticate(&self, token: impl Into<String>) -> Result<(), StorageError> {
        let token = token.into();
        self.store.set(KEY_TOKEN, &token)?;
        *self.state.write() = SessionState::Authenticated { token, user: None };
        log::info!("Session authenticated");
        Ok(())
    }

    /// Attach the user profile to the authenticated session
    pub fn set_user(&self, user: User) -> Result<(), StorageError> {
        let mut state = self.state.write();
        if let SessionState::Authenticated { user: current, .. } = &mut *state {
            self.store.set(KEY_USER, &user)?;
            *current = Some(user);
        } else {
            log::debug!("Ignoring profile for a session that is not authenticated");
        }
        Ok(())
    }

    /// Merge changes into the stored profile
    pub fn update_user<F>(&self, apply: F) -> Result<Option<User>, StorageError>
    where
        F: FnOnce(&mut User),
    {
        let mut state = self.state.write();
        let SessionState::Authenticated { user: Some(user), .. } = &mut *state else {
            return Ok(None);
        };
        apply(user);
        self.store.set(KEY_USER, user)?;
        Ok(Some(user.clone()))
    }

    /// Mark the token as rejected by the backend. Only an authenticated
    /// session can expire.
    pub fn expire(&self) {
        let mut state = self.state.write();
        if !matches!(*state, SessionState::Authenticated { .. }) {
            return;
        }
        log::warn!("Session expired, sign in again");
        *state = SessionState::Expired;
        drop(state);

        if let Err(e) = self.clear_credentials() {
            log::error!("Failed to clear expired credentials: {}", e);
        }
    }

    /// Drop credentials and return to the anonymous state
    pub fn logout(&self) -> Result<(), StorageError> {
        self.clear_credentials()?;
        *self.state.write() = SessionState::Anonymous;
        log::info!("Logged out");
        Ok(())
    }

    fn clear_credentials(&self) -> Result<(), StorageError> {
        self.store.remove(KEY_TOKEN)?;
        self.store.remove(KEY_USER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let store = Arc::new(LocalStore::in_memory());
        let session = Session::restore(store.clone());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.token().is_none());

        session.authenticate("tok").unwrap();
        session.set_user(User::new("ana", "ana@example.com")).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.token().as_deref(), Some("tok"));
        assert_eq!(store.get::<User>(KEY_USER).unwrap().username, "ana");

        session.expire();
        assert!(session.is_expired());
        assert!(session.token().is_none());
        assert!(!store.contains(KEY_TOKEN));
    }

    #[test]
    fn test_anonymous_session_does_not_expire() {
        let session = Session::anonymous(Arc::new(LocalStore::in_memory()));
        session.expire();
        assert_eq!(session.state(), SessionState::Anonymous);
    }

    #[test]
    fn test_restore_from_store() {
        let store = Arc::new(LocalStore::in_memory());
        store.set(KEY_TOKEN, "persisted").unwrap();
        store.set(KEY_USER, &User::new("bo", "bo@example.com")).unwrap();

        let session = Session::restore(store);
        assert_eq!(session.token().as_deref(), Some("persisted"));
        assert_eq!(session.user().unwrap().email, "bo@example.com");
    }

    #[test]
    fn test_update_user_merges_and_persists() {
        let store = Arc::new(LocalStore::in_memory());
        let session = Session::anonymous(store.clone());
        assert!(session.update_user(|u| u.username = "x".into()).unwrap().is_none());

        session.authenticate("t").unwrap();
        session.set_user(User::new("old", "old@example.com")).unwrap();
        let updated = session
            .update_user(|u| u.username = "new".into())
            .unwrap()
            .unwrap();

        assert_eq!(updated.username, "new");
        assert_eq!(updated.email, "old@example.com");
        assert_eq!(store.get::<User>(KEY_USER).unwrap().username, "new");
    }

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let user: User = serde_json::from_value(serde_json::json!({
            "username": "ana",
            "email": "ana@example.com",
            "profileImage": "a.png",
            "created_at": "2024-01-01"
        }))
        .unwrap();

        assert_eq!(user.profile_image.as_deref(), Some("a.png"));
        assert_eq!(user.extra["created_at"], "2024-01-01");
    }
}
