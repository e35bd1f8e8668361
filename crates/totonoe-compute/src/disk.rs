//! Managed disk resource
//!
//! A disk optionally attaches to a server. Mutations on an attached disk
//! serialize on the server's lock token, the same token the server resource
//! itself takes.

use crate::model::{self, DiskEnvelope, DiskModel, DiskWire};
use async_trait::async_trait;
use serde_json::{Value, json};
use totonoe_core::{IdGrammar, ResourceId, Schema};
use totonoe_engine::{
    ApiRequest, LockToken, ManagedResource, OpContext, Result, Started, TransportError,
};

pub struct DiskResource {
    schema: Schema,
    grammar: IdGrammar,
}

impl DiskResource {
    pub fn new() -> Self {
        Self {
            schema: model::disk_schema(),
            grammar: model::disk_grammar(),
        }
    }
}

impl Default for DiskResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ManagedResource for DiskResource {
    fn type_name(&self) -> &'static str {
        "compute_disk"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn grammar(&self) -> &IdGrammar {
        &self.grammar
    }

    fn resource_id(&self, attrs: &Value) -> Result<ResourceId> {
        let zone = model::ident(self.type_name(), attrs, "zone")?;
        let name = model::ident(self.type_name(), attrs, "name")?;
        Ok(ResourceId::build(&self.grammar, &[zone, name])?)
    }

    fn lock_token(&self, attrs: &Value) -> Option<LockToken> {
        // アタッチされるディスクは、より基盤側であるサーバー名で直列化する
        let server = attrs.get("server")?.as_str()?;
        let zone = attrs.get("zone")?.as_str()?;
        Some(model::server_lock_token(zone, server))
    }

    async fn fetch(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
    ) -> std::result::Result<Value, TransportError> {
        let response = ctx.transport.send(ApiRequest::get(id.to_string())).await?;
        let envelope: DiskEnvelope = serde_json::from_value(response.body)
            .map_err(|e| TransportError::Payload(format!("unexpected disk payload: {e}")))?;
        model::encode_attrs(&DiskModel::from(envelope.disk))
    }

    async fn begin_create(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> std::result::Result<Started, TransportError> {
        tracing::info!("Creating disk: {}", id);
        let wire = DiskWire::from(model::decode_attrs::<DiskModel>(desired)?);
        let response = ctx
            .transport
            .send(ApiRequest::put(id.to_string(), json!({ "Disk": wire })))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }

    async fn begin_update(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> std::result::Result<Started, TransportError> {
        let wire = DiskWire::from(model::decode_attrs::<DiskModel>(desired)?);
        let response = ctx
            .transport
            .send(ApiRequest::put(id.to_string(), json!({ "Disk": wire })))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }

    async fn begin_delete(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
    ) -> std::result::Result<Started, TransportError> {
        tracing::info!("Deleting disk: {}", id);
        let response = ctx
            .transport
            .send(ApiRequest::delete(id.to_string()))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }
}
