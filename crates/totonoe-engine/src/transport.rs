//! Remote control-plane transport boundary
//!
//! The engine drives every remote call through the [`Transport`] trait and
//! never speaks HTTP directly. Implementations own authentication and
//! retry-on-throttle; the engine relies only on the error kinds below.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Method of an API request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Patch,
    Post,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Put => write!(f, "PUT"),
            Method::Patch => write!(f, "PATCH"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// One request against the remote control plane
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// A successful (2xx) response from the remote control plane
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    /// Header names are stored lowercased
    pub headers: HashMap<String, String>,
}

impl ApiResponse {
    /// Look up a header, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// URL to poll for an accepted asynchronous operation
    pub fn operation_url(&self) -> Option<&str> {
        self.header("operation-location").or_else(|| self.header("location"))
    }

    /// Whether the remote side accepted the mutation for asynchronous
    /// completion (202) rather than completing it inline
    pub fn accepted(&self) -> bool {
        self.status == 202
    }
}

/// Transport failures, discriminated so the engine can apply policy
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("throttled by remote API")]
    Throttled,

    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response payload: {0}")]
    Payload(String),

    #[error("network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request. 2xx resolves to `Ok`; 4xx/5xx map onto
    /// [`TransportError`] kinds. Retrying throttled requests is the
    /// implementation's responsibility, not the caller's.
    async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}
