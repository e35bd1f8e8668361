//! Totonoe Reconciliation Engine
//!
//! This crate provides the substrate every Totonoe resource definition sits
//! on: the lifecycle contract (Create/Read/Update/Delete/Import) and the
//! machinery that drives it against a remote control-plane API in a uniform,
//! idempotent, safe-under-concurrency way.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │             resource definitions                 │
//! │        (totonoe-compute: server, disk)           │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait ManagedResource
//! ┌─────────────────▼───────────────────────────────┐
//! │               totonoe-engine                     │
//! │  ┌────────────┐ ┌────────────┐ ┌─────────────┐  │
//! │  │ Reconciler │ │LockManager │ │   Poller    │  │
//! │  └────────────┘ └────────────┘ └─────────────┘  │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait Transport
//! ┌─────────────────▼───────────────────────────────┐
//! │          totonoe-http (reqwest)                  │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod lock;
pub mod poller;
pub mod record;
pub mod resource;
pub mod transport;

// Re-exports
pub use driver::{Outcome, Reconciler};
pub use error::{EngineError, Result};
pub use lock::{LockGuard, LockManager, LockToken};
pub use poller::{OperationStatus, PendingOperation, Poller, Started, StatusOperation};
pub use record::StateRecord;
pub use resource::{ManagedResource, OpContext};
pub use transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
