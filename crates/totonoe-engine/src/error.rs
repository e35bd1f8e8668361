//! Engine error types
//!
//! Every surfaced variant carries enough identity — the resource id, or the
//! resource type plus identifying fields when creation failed before an id
//! existed — to correlate a failure with a specific remote object.

use crate::transport::TransportError;
use thiserror::Error;
use totonoe_core::CoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{resource}: {source}")]
    Decode {
        resource: String,
        #[source]
        source: CoreError,
    },

    #[error("resource already exists: {id} (import it instead of re-creating)")]
    AlreadyExists { id: String },

    #[error("field '{field}' cannot be changed after creation: {id}")]
    ImmutableField { id: String, field: String },

    #[error("remote operation failed for {id}: {message}")]
    RemoteOperationFailed {
        id: String,
        message: String,
        canceled: bool,
    },

    #[error("remote API unavailable for {id}: {source}")]
    RemoteUnavailable {
        id: String,
        #[source]
        source: TransportError,
    },

    #[error("transient transport failure for {id} (retries exhausted): {source}")]
    Transient {
        id: String,
        #[source]
        source: TransportError,
    },

    #[error("deadline exceeded during {phase} of {id}")]
    DeadlineExceeded { id: String, phase: &'static str },
}

pub type Result<T> = std::result::Result<T, EngineError>;
