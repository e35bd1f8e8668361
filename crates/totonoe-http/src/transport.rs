//! reqwest-based transport
//!
//! Maps HTTP status codes onto the engine's error kinds and retries
//! throttled requests with capped exponential backoff before surfacing
//! them. Remote error messages are extracted from `{"error": {"message":
//! ...}}` envelopes when present, so failures reach the operator verbatim.

use crate::error::{HttpError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use totonoe_core::BackoffConfig;
use totonoe_engine::{ApiRequest, ApiResponse, Method, Transport, TransportError};

const USER_AGENT: &str = concat!("totonoe/", env!("CARGO_PKG_VERSION"));
const DEFAULT_THROTTLE_RETRIES: u32 = 3;

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_token: String,
}

impl HttpConfig {
    /// Create HttpConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("TOTONOE_API_BASE")
            .map_err(|_| HttpError::MissingEnvVar("TOTONOE_API_BASE".to_string()))?;
        let api_token = std::env::var("TOTONOE_API_TOKEN")
            .map_err(|_| HttpError::MissingEnvVar("TOTONOE_API_TOKEN".to_string()))?;

        Ok(Self {
            base_url,
            api_token,
        })
    }
}

/// HTTP implementation of the engine's transport contract
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    backoff: BackoffConfig,
    throttle_retries: u32,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::InvalidBaseUrl(config.base_url));
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token,
            backoff: BackoffConfig::default(),
            throttle_retries: DEFAULT_THROTTLE_RETRIES,
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            // Operation URLs may come back absolute.
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        tracing::debug!(method = %request.method, url = %url, "sending request");

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        builder = builder.bearer_auth(&self.api_token);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if (200..300).contains(&status) {
            let body = if text.is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text)
                    .map_err(|e| TransportError::Payload(format!("invalid JSON body: {e}")))?
            };
            return Ok(ApiResponse {
                status,
                body,
                headers,
            });
        }

        let message = remote_message(&text);
        Err(match status {
            404 => TransportError::NotFound,
            409 => TransportError::Conflict(message),
            401 | 403 => TransportError::Unauthorized(message),
            429 => TransportError::Throttled,
            status => TransportError::Server { status, message },
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(&request).await {
                Err(TransportError::Throttled) if attempt < self.throttle_retries => {
                    let delay = self.backoff.delay_for_attempt(attempt);
                    attempt += 1;
                    tracing::warn!(
                        path = %request.path,
                        delay_ms = delay,
                        "throttled by remote API, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                other => return other,
            }
        }
    }
}

/// Best-effort extraction of the remote error envelope; falls back to the
/// raw body so nothing is swallowed.
fn remote_message(text: &str) -> String {
    if let Ok(body) = serde_json::from_str::<Value>(text) {
        if let Some(message) = body
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return message.to_string();
        }
    }
    text.to_string()
}
