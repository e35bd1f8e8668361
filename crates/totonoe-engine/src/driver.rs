//! Reconciliation driver
//!
//! Orchestrates the lifecycle contract against the remote API: codec
//! validation, identity construction, keyed locking, existence probes,
//! long-running operation polling, and outcome classification.

use crate::error::{EngineError, Result};
use crate::lock::{LockGuard, LockManager, LockToken};
use crate::poller::{Poller, Started};
use crate::resource::{ManagedResource, OpContext};
use crate::transport::{Transport, TransportError};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::time::Instant;
use totonoe_core::{Codec, ResourceId};

/// The result of one lifecycle step
///
/// `Gone` is deliberately not an error: a 404 means the terminal absence is
/// already achieved (or tracked state is stale) and drives state removal
/// rather than error propagation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Created(ResourceId),
    Read(Value),
    Updated,
    Deleted,
    Gone,
}

/// Drives resource definitions through their lifecycle
pub struct Reconciler {
    transport: Arc<dyn Transport>,
    locks: Arc<LockManager>,
    poller: Poller,
}

impl Reconciler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            locks: Arc::new(LockManager::new()),
            poller: Poller::default(),
        }
    }

    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// The lock registry, shared so sibling drivers can serialize on the
    /// same tokens
    pub fn locks(&self) -> Arc<LockManager> {
        Arc::clone(&self.locks)
    }

    /// Create a new remote object from a user-authored configuration.
    ///
    /// Probes for an existing object at the computed id first and fails with
    /// [`EngineError::AlreadyExists`] instead of overwriting — the
    /// idempotent "requires import" contract. A create that half-succeeded
    /// earlier is detected by the probe, never blindly repeated.
    pub async fn create(&self, resource: &dyn ManagedResource, config: &Value) -> Result<Outcome> {
        let codec = Codec::new(resource.schema().clone());
        let desired = codec.validate(config).map_err(|source| EngineError::Decode {
            resource: decode_context(resource, config),
            source,
        })?;
        let id = resource.resource_id(&desired)?;
        let ctx = self.context(resource.timeouts().create);

        tracing::debug!(
            resource = resource.type_name(),
            id = %id,
            config = %codec.redact(&desired),
            "create requested"
        );

        let _lock = self
            .hold_lock(resource.lock_token(&desired), ctx.deadline, &id, "create")
            .await?;

        // Never overwrite an object this configuration did not create.
        match resource.fetch(&ctx, &id).await {
            Ok(_) => {
                return Err(EngineError::AlreadyExists { id: id.to_string() });
            }
            Err(TransportError::NotFound) => {}
            Err(source) => {
                return Err(EngineError::RemoteUnavailable {
                    id: id.to_string(),
                    source,
                });
            }
        }

        let payload = codec.create_payload(&desired);
        let started = resource
            .begin_create(&ctx, &id, &payload)
            .await
            .map_err(|source| EngineError::RemoteUnavailable {
                id: id.to_string(),
                source,
            })?;
        self.finish(started, ctx.deadline, &id, "create").await?;

        tracing::info!(resource = resource.type_name(), id = %id, "created");
        Ok(Outcome::Created(id))
    }

    /// Read current remote state and re-encode it into the model shape.
    /// A 404 resolves to [`Outcome::Gone`].
    pub async fn read(&self, resource: &dyn ManagedResource, id: &ResourceId) -> Result<Outcome> {
        let ctx = self.context(resource.timeouts().read);

        match resource.fetch(&ctx, id).await {
            Ok(state) => {
                let codec = Codec::new(resource.schema().clone());
                let model = codec.validate(&state).map_err(|source| EngineError::Decode {
                    resource: format!("{} {}", resource.type_name(), id),
                    source,
                })?;
                Ok(Outcome::Read(model))
            }
            Err(TransportError::NotFound) => {
                tracing::info!(resource = resource.type_name(), id = %id, "remote object gone");
                Ok(Outcome::Gone)
            }
            Err(source) => Err(EngineError::RemoteUnavailable {
                id: id.to_string(),
                source,
            }),
        }
    }

    /// Apply only the fields named in `changed` over current remote state.
    ///
    /// Fields whose attribute is marked `forces_recreation` fail fast with
    /// [`EngineError::ImmutableField`] before any remote call, avoiding
    /// partial mutation. Server-computed fields stay exactly as the remote
    /// reported them.
    pub async fn update(
        &self,
        resource: &dyn ManagedResource,
        id: &ResourceId,
        config: &Value,
        changed: &[&str],
    ) -> Result<Outcome> {
        let codec = Codec::new(resource.schema().clone());
        let desired = codec.validate(config).map_err(|source| EngineError::Decode {
            resource: format!("{} {}", resource.type_name(), id),
            source,
        })?;

        for field in changed {
            if let Some(attr) = resource.schema().get(field) {
                if attr.forces_recreation {
                    return Err(EngineError::ImmutableField {
                        id: id.to_string(),
                        field: field.to_string(),
                    });
                }
            }
        }

        let ctx = self.context(resource.timeouts().update);
        tracing::debug!(
            resource = resource.type_name(),
            id = %id,
            changed = ?changed,
            "update requested"
        );

        // The lock covers the whole read-modify-write.
        let _lock = self
            .hold_lock(resource.lock_token(&desired), ctx.deadline, id, "update")
            .await?;

        let current = match resource.fetch(&ctx, id).await {
            Ok(state) => state,
            Err(TransportError::NotFound) => {
                tracing::info!(resource = resource.type_name(), id = %id, "remote object gone");
                return Ok(Outcome::Gone);
            }
            Err(source) => {
                return Err(EngineError::RemoteUnavailable {
                    id: id.to_string(),
                    source,
                });
            }
        };

        let merged = overlay(&current, &desired, changed);
        let started = resource
            .begin_update(&ctx, id, &merged)
            .await
            .map_err(|source| EngineError::RemoteUnavailable {
                id: id.to_string(),
                source,
            })?;
        self.finish(started, ctx.deadline, id, "update").await?;

        tracing::info!(resource = resource.type_name(), id = %id, "updated");
        Ok(Outcome::Updated)
    }

    /// Delete the remote object. An already-absent object resolves to
    /// [`Outcome::Gone`] without issuing a mutating call — the terminal
    /// state is already achieved.
    pub async fn delete(&self, resource: &dyn ManagedResource, id: &ResourceId) -> Result<Outcome> {
        let ctx = self.context(resource.timeouts().delete);

        // Fetch first: it gives the idempotent Gone short-circuit and the
        // attributes the lock token derives from (Delete has no model input).
        let current = match resource.fetch(&ctx, id).await {
            Ok(state) => state,
            Err(TransportError::NotFound) => {
                tracing::info!(resource = resource.type_name(), id = %id, "already gone");
                return Ok(Outcome::Gone);
            }
            Err(source) => {
                return Err(EngineError::RemoteUnavailable {
                    id: id.to_string(),
                    source,
                });
            }
        };

        let _lock = self
            .hold_lock(resource.lock_token(&current), ctx.deadline, id, "delete")
            .await?;

        let started = resource
            .begin_delete(&ctx, id)
            .await
            .map_err(|source| EngineError::RemoteUnavailable {
                id: id.to_string(),
                source,
            })?;
        self.finish(started, ctx.deadline, id, "delete").await?;

        tracing::info!(resource = resource.type_name(), id = %id, "deleted");
        Ok(Outcome::Deleted)
    }

    /// Validate an externally supplied id string against the resource's
    /// grammar before adopting it. No remote call is made.
    pub fn import(&self, resource: &dyn ManagedResource, id: &str) -> Result<ResourceId> {
        Ok(ResourceId::parse(id, resource.grammar())?)
    }

    fn context(&self, timeout: std::time::Duration) -> OpContext {
        OpContext {
            transport: Arc::clone(&self.transport),
            deadline: Instant::now() + timeout,
        }
    }

    async fn hold_lock(
        &self,
        token: Option<LockToken>,
        deadline: Instant,
        id: &ResourceId,
        phase: &'static str,
    ) -> Result<Option<LockGuard<'_>>> {
        let Some(token) = token else {
            return Ok(None);
        };
        tracing::debug!(token = %token, id = %id, "waiting for lock");
        match tokio::time::timeout_at(deadline, self.locks.acquire(&token)).await {
            Ok(guard) => Ok(Some(guard)),
            Err(_) => Err(EngineError::DeadlineExceeded {
                id: id.to_string(),
                phase,
            }),
        }
    }

    async fn finish(
        &self,
        started: Started,
        deadline: Instant,
        id: &ResourceId,
        phase: &'static str,
    ) -> Result<Option<Value>> {
        match started {
            Started::Done(body) => Ok(body),
            Started::Pending(operation) => {
                self.poller
                    .wait(operation, deadline, &id.to_string(), phase)
                    .await
            }
        }
    }
}

/// Overlay only the changed fields of `desired` onto `current`. A changed
/// field absent from `desired` becomes an explicit null (unset).
fn overlay(current: &Value, desired: &Value, changed: &[&str]) -> Value {
    let mut merged = match current {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    for field in changed {
        let value = desired.get(*field).cloned().unwrap_or(Value::Null);
        merged.insert((*field).to_string(), value);
    }
    Value::Object(merged)
}

/// Identity for errors raised before an id exists: the resource type plus
/// whatever identifying fields the configuration carries.
fn decode_context(resource: &dyn ManagedResource, config: &Value) -> String {
    match config.get("name").and_then(Value::as_str) {
        Some(name) => format!("{} \"{}\"", resource.type_name(), name),
        None => resource.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overlay_touches_only_changed_fields() {
        let current = json!({
            "name": "web-01",
            "plan": "2core-4gb",
            "power_state": "running",
        });
        let desired = json!({
            "name": "web-01",
            "plan": "4core-8gb",
        });

        let merged = overlay(&current, &desired, &["plan"]);
        assert_eq!(merged["plan"], json!("4core-8gb"));
        // Server-computed state survives untouched.
        assert_eq!(merged["power_state"], json!("running"));
    }

    #[test]
    fn test_overlay_unsets_field_missing_from_desired() {
        let current = json!({"name": "web-01", "note": "keep"});
        let desired = json!({"name": "web-01"});

        let merged = overlay(&current, &desired, &["note"]);
        assert_eq!(merged["note"], Value::Null);
    }
}
