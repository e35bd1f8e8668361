//! Resource lifecycle contract
//!
//! The trait every resource definition implements, plus the per-step context
//! handed to remote calls. Implementations translate between the engine's
//! attribute representation and the remote API's wire format; the
//! [`Reconciler`](crate::driver::Reconciler) owns ordering, locking,
//! existence probes and polling.

use crate::error::Result;
use crate::lock::LockToken;
use crate::poller::Started;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;
use totonoe_core::{IdGrammar, ResourceId, Schema, Timeouts};

/// Context for the remote calls of one lifecycle step
///
/// The deadline derives from the step's configured timeout; lock waits and
/// polling are the only suspension points and both honor it.
#[derive(Clone)]
pub struct OpContext {
    pub transport: Arc<dyn Transport>,
    pub deadline: Instant,
}

/// The contract a resource definition implements
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Unique registration name, e.g. `"compute_disk"`
    fn type_name(&self) -> &'static str;

    /// Attribute schema; drives codec validation and immutability checks
    fn schema(&self) -> &Schema;

    /// Grammar of this resource type's ids
    fn grammar(&self) -> &IdGrammar;

    /// Per-step timeouts
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Construct the id from the identifying fields of a validated
    /// configuration. Deterministic: the same fields always yield the
    /// same id.
    fn resource_id(&self, attrs: &Value) -> Result<ResourceId>;

    /// Token naming the shared remote object this operation must serialize
    /// on, if any. Dependent resources return the name of the more
    /// fundamental object — a disk attached to a server locks the server —
    /// so every contender takes the same single token and lock ordering
    /// deadlocks cannot arise.
    fn lock_token(&self, attrs: &Value) -> Option<LockToken> {
        let _ = attrs;
        None
    }

    /// Fetch current remote state as attribute-shaped JSON
    async fn fetch(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
    ) -> std::result::Result<Value, TransportError>;

    /// Start creation. `desired` is validated configuration with computed
    /// attributes already stripped.
    async fn begin_create(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> std::result::Result<Started, TransportError>;

    /// Start an update towards `desired` (current state with the changed
    /// fields overlaid).
    async fn begin_update(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> std::result::Result<Started, TransportError>;

    /// Start deletion
    async fn begin_delete(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
    ) -> std::result::Result<Started, TransportError>;
}
