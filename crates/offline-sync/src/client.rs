//! HTTP transport used to replay queued mutations against the GreenMate API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use greenmate_core::storage::KeyValueStore;

use crate::error::{Result, SyncError};
use crate::types::{ApiErrorResponse, SyncMethod, SyncRequest, SyncResponse};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Storage key the auth layer writes the bearer token under.
pub const DEFAULT_TOKEN_KEY: &str = "auth_token";
const MAX_LOG_BODY_CHARS: usize = 512;

/// Sends one derived request and reports the server's verdict.
///
/// The queue only depends on this seam, so tests can script outcomes without
/// a network.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn send(&self, request: SyncRequest) -> Result<SyncResponse>;
}

/// Supplies the bearer token for outgoing requests.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Fixed token, mostly useful for tests and service accounts.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Reads the token the auth layer persisted in the session store.
pub struct StoredTokenProvider {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl StoredTokenProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, DEFAULT_TOKEN_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }
}

impl TokenProvider for StoredTokenProvider {
    fn access_token(&self) -> Option<String> {
        match self.store.get(&self.key) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                log::warn!("[OfflineSync] Failed to read access token: {}", e);
                None
            }
        }
    }
}

/// reqwest-backed [`SyncTransport`].
#[derive(Clone)]
pub struct HttpSyncClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpSyncClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[OfflineSync] API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[OfflineSync] API response error ({}): {}", status, preview);
    }

    /// Create a new sync client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root the resource paths are appended to (e.g., "https://api.greenmate.app/api")
    /// * `tokens` - bearer token source for the `Authorization` header
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_timeout(base_url, tokens, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, tokens: Arc<dyn TokenProvider>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create headers for an API request.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self.tokens.access_token() {
            Some(token) => match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => log::warn!("[OfflineSync] Ignoring access token with invalid format"),
            },
            None => debug!("[OfflineSync] No access token available; sending unauthenticated"),
        }

        headers
    }

    /// Turn a raw response into a [`SyncResponse`] or an API error.
    async fn parse_response(response: reqwest::Response) -> Result<SyncResponse> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                if let Some(message) = error.message {
                    let message = match error.code {
                        Some(code) => format!("{}: {}", code, message),
                        None => message,
                    };
                    return Err(SyncError::api(status.as_u16(), message));
                }
            }
            return Err(SyncError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        let parsed = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).unwrap_or(Value::Null)
        };
        Ok(SyncResponse {
            status: status.as_u16(),
            body: parsed,
        })
    }
}

#[async_trait]
impl SyncTransport for HttpSyncClient {
    /// POST/PUT/DELETE `{base_url}{path}`.
    async fn send(&self, request: SyncRequest) -> Result<SyncResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(
            "[OfflineSync] {} {} (item {})",
            request.method.as_str(),
            url,
            request.item_id
        );

        let builder = match request.method {
            SyncMethod::Post => self.client.post(&url),
            SyncMethod::Put => self.client.put(&url),
            SyncMethod::Delete => self.client.delete(&url),
        };
        let builder = builder.headers(self.headers());
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await?;
        Self::parse_response(response).await
    }
}
