//! Prediction API Client
//!
//! HTTP client for the rock blast prediction backend.

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::error::ApiError;
use crate::logic::config::ClientConfig;
use crate::logic::session::Session;

/// Authenticated JSON client.
///
/// Does not retry, queue or cache. A 401 answering a request that carried
/// the session token expires the session.
pub struct ApiClient {
    base_url: String,
    session: Arc<Session>,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Create new API client
    pub fn new(config: &ClientConfig, session: Arc<Session>) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ApiError::Connectivity(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None, true).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(body), true).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(body), true).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None, true).await
    }

    /// GET and decode into `T`
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let value = self.get(path).await?;
        decode(value)
    }

    /// POST and decode into `T`
    pub async fn post_as<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let value = self.post(path, body).await?;
        decode(value)
    }

    /// POST without the session token, for credential exchange. A 401 here
    /// is a rejected credential and leaves the session untouched.
    pub async fn post_anonymous_as<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let value = self.request(Method::POST, path, Some(body), false).await?;
        decode(value)
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|e| ApiError::InvalidInput(format!("invalid URL {}: {}", raw, e)))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        with_token: bool,
    ) -> Result<Value, ApiError> {
        let url = self.url(path)?;
        log::debug!("{} {}", method, path);

        let mut builder = self.http_client
            .request(method.clone(), url)
            .header("Content-Type", "application/json");

        let token = if with_token { self.session.token() } else { None };
        if let Some(token) = &token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Connectivity(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Connectivity(e.to_string()))?;

        if !status.is_success() {
            log::error!("API error {} {} ({}): {}", method, path, status.as_u16(), text);
            let err = ApiError::from_response(status.as_u16(), status.canonical_reason(), &text);
            if err.requires_sign_in() && token.is_some() {
                self.session.expire();
            }
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(ApiError::from)
    }
}

/// Decode a JSON value, mapping failures to `ApiError::Decode`
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(ApiError::from)
}
