//! Server resource

use crate::model::{self, ServerEnvelope, ServerModel, ServerWire};
use async_trait::async_trait;
use serde_json::{Value, json};
use totonoe_core::{IdGrammar, ResourceId, Schema};
use totonoe_engine::{
    ApiRequest, LockToken, ManagedResource, OpContext, Result, Started, TransportError,
};

pub struct ServerResource {
    schema: Schema,
    grammar: IdGrammar,
}

impl ServerResource {
    pub fn new() -> Self {
        Self {
            schema: model::server_schema(),
            grammar: model::server_grammar(),
        }
    }
}

impl Default for ServerResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ManagedResource for ServerResource {
    fn type_name(&self) -> &'static str {
        "compute_server"
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
        let zone = attrs.get("zone")?.as_str()?;
        let name = attrs.get("name")?.as_str()?;
        Some(model::server_lock_token(zone, name))
    }

    async fn fetch(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
    ) -> std::result::Result<Value, TransportError> {
        let response = ctx.transport.send(ApiRequest::get(id.to_string())).await?;
        let envelope: ServerEnvelope = serde_json::from_value(response.body)
            .map_err(|e| TransportError::Payload(format!("unexpected server payload: {e}")))?;
        model::encode_attrs(&ServerModel::from(envelope.server))
    }

    async fn begin_create(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> std::result::Result<Started, TransportError> {
        tracing::info!("Creating server: {}", id);
        let wire = ServerWire::from(model::decode_attrs::<ServerModel>(desired)?);
        let response = ctx
            .transport
            .send(ApiRequest::put(id.to_string(), json!({ "Server": wire })))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }

    async fn begin_update(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> std::result::Result<Started, TransportError> {
        let wire = ServerWire::from(model::decode_attrs::<ServerModel>(desired)?);
        let response = ctx
            .transport
            .send(ApiRequest::put(id.to_string(), json!({ "Server": wire })))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }

    async fn begin_delete(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
    ) -> std::result::Result<Started, TransportError> {
        tracing::info!("Deleting server: {}", id);
        let response = ctx
            .transport
            .send(ApiRequest::delete(id.to_string()))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }
}
