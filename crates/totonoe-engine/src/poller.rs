//! Long-running operation poller
//!
//! Converts an "accepted, in progress" response from the remote API into a
//! blocking call that resolves only when the operation reaches a terminal
//! state. Polling honors the caller's deadline; cancellation is local-only —
//! the poller stops asking, but the remote mutation may still complete on
//! its own.

use crate::error::{EngineError, Result};
use crate::transport::{ApiRequest, ApiResponse, Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use totonoe_core::BackoffConfig;

/// Classified state of a remote operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    InProgress,
    Succeeded(Option<Value>),
    Failed(String),
    Canceled,
}

/// An in-flight asynchronous remote mutation
///
/// One `probe` issues one status-check request. Once a probe reports a
/// terminal state the handle is discarded and never polled again. Probes are
/// reads, so polling an equivalent handle twice yields the same eventual
/// outcome.
#[async_trait]
pub trait PendingOperation: Send {
    async fn probe(&mut self) -> std::result::Result<OperationStatus, TransportError>;
}

/// Result of starting a mutation: some APIs complete synchronously, others
/// accept the request and complete asynchronously behind a poll URL.
pub enum Started {
    Done(Option<Value>),
    Pending(Box<dyn PendingOperation>),
}

impl Started {
    /// Interpret a mutation response: 202 plus an operation URL becomes a
    /// pending operation, anything else is synchronous completion.
    pub fn from_response(transport: &Arc<dyn Transport>, response: &ApiResponse) -> Self {
        if response.accepted() {
            if let Some(url) = response.operation_url() {
                return Started::Pending(Box::new(StatusOperation::new(
                    Arc::clone(transport),
                    url,
                )));
            }
        }
        let body = if response.body.is_null() {
            None
        } else {
            Some(response.body.clone())
        };
        Started::Done(body)
    }
}

/// Standard poll handle: `GET` a status URL through the transport and
/// classify the `{"status": ...}` body.
pub struct StatusOperation {
    transport: Arc<dyn Transport>,
    status_url: String,
}

impl StatusOperation {
    pub fn new(transport: Arc<dyn Transport>, status_url: impl Into<String>) -> Self {
        Self {
            transport,
            status_url: status_url.into(),
        }
    }
}

#[async_trait]
impl PendingOperation for StatusOperation {
    async fn probe(&mut self) -> std::result::Result<OperationStatus, TransportError> {
        let response = self.transport.send(ApiRequest::get(&self.status_url)).await?;
        Ok(classify(&response.body))
    }
}

fn classify(body: &Value) -> OperationStatus {
    match body.get("status").and_then(Value::as_str) {
        Some("pending") | Some("in_progress") => OperationStatus::InProgress,
        Some("succeeded") => OperationStatus::Succeeded(
            body.get("result").filter(|v| !v.is_null()).cloned(),
        ),
        Some("failed") => OperationStatus::Failed(remote_message(body)),
        Some("canceled") => OperationStatus::Canceled,
        // An unrecognized status is terminal: spinning on it until the
        // deadline would hide a contract break.
        _ => OperationStatus::Failed(format!("unrecognized operation status: {body}")),
    }
}

/// Extract the remote-reported error, falling back to the raw body so the
/// reason is surfaced verbatim rather than swallowed.
fn remote_message(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Drives a [`PendingOperation`] to a terminal state
#[derive(Debug, Clone)]
pub struct Poller {
    backoff: BackoffConfig,
    /// Transport-level failures tolerated per quiet stretch of polling
    transient_retries: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            transient_retries: 3,
        }
    }
}

impl Poller {
    pub fn new(backoff: BackoffConfig, transient_retries: u32) -> Self {
        Self {
            backoff,
            transient_retries,
        }
    }

    /// Poll until the operation reaches a terminal state or `deadline`
    /// passes. On deadline the poller returns immediately with
    /// `DeadlineExceeded` and does not attempt to cancel the remote
    /// operation.
    pub async fn wait(
        &self,
        mut operation: Box<dyn PendingOperation>,
        deadline: Instant,
        id: &str,
        phase: &'static str,
    ) -> Result<Option<Value>> {
        let mut attempt: u32 = 0;
        let mut transient: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                return Err(EngineError::DeadlineExceeded {
                    id: id.to_string(),
                    phase,
                });
            }

            match operation.probe().await {
                Ok(OperationStatus::Succeeded(body)) => {
                    tracing::debug!(id, phase, polls = attempt, "remote operation succeeded");
                    return Ok(body);
                }
                Ok(OperationStatus::Failed(message)) => {
                    return Err(EngineError::RemoteOperationFailed {
                        id: id.to_string(),
                        message,
                        canceled: false,
                    });
                }
                Ok(OperationStatus::Canceled) => {
                    return Err(EngineError::RemoteOperationFailed {
                        id: id.to_string(),
                        message: "operation canceled by the remote API".to_string(),
                        canceled: true,
                    });
                }
                Ok(OperationStatus::InProgress) => {
                    transient = 0;
                    let delay = Duration::from_millis(self.backoff.delay_for_attempt(attempt));
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep_until((Instant::now() + delay).min(deadline)).await;
                }
                Err(source) => {
                    if transient >= self.transient_retries {
                        return Err(EngineError::Transient {
                            id: id.to_string(),
                            source,
                        });
                    }
                    transient += 1;
                    tracing::warn!(
                        id,
                        phase,
                        retry = transient,
                        error = %source,
                        "status check failed, retrying"
                    );
                    let delay = Duration::from_millis(self.backoff.delay_for_attempt(transient));
                    tokio::time::sleep_until((Instant::now() + delay).min(deadline)).await;
                }
            }
        }
    }
}
