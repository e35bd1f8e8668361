//! In-memory control plane and a minimal resource definition for driver
//! tests.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use totonoe_core::{AttrKind, Attribute, IdGrammar, ResourceId, Schema};
use totonoe_engine::{
    ApiRequest, ApiResponse, EngineError, ManagedResource, Method, OpContext, Started, Transport,
    TransportError,
};

/// Scripted remote API: objects live in a map keyed by path, mutations
/// optionally complete through polled operations.
pub struct MockTransport {
    objects: Mutex<HashMap<String, Value>>,
    operations: Mutex<HashMap<String, VecDeque<Value>>>,
    log: Mutex<Vec<(Method, String)>>,
    op_counter: AtomicU64,
    /// `in_progress` statuses each asynchronous operation reports before
    /// succeeding; `None` makes every mutation complete synchronously
    async_steps: Option<u32>,
}

impl MockTransport {
    /// Mutations complete inline (200/204)
    pub fn synchronous() -> Self {
        Self::build(None)
    }

    /// Mutations are accepted (202) and poll through `in_progress` the given
    /// number of times
    pub fn asynchronous(steps: u32) -> Self {
        Self::build(Some(steps))
    }

    fn build(async_steps: Option<u32>) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            operations: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            op_counter: AtomicU64::new(0),
            async_steps,
        }
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.log.lock().unwrap().clone()
    }

    /// PUT/PATCH/DELETE requests issued so far
    pub fn mutation_count(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(method, _)| {
                matches!(method, Method::Put | Method::Patch | Method::Delete)
            })
            .count()
    }

    pub fn status_checks(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(method, path)| *method == Method::Get && path.starts_with("/operations/"))
            .count()
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    fn store(&self, path: &str, body: &Value) {
        let mut object = match body {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        // The server assigns computed state.
        object.insert("status".to_string(), json!("available"));
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), Value::Object(object));
    }

    fn merge(&self, path: &str, body: &Value) {
        let mut objects = self.objects.lock().unwrap();
        let entry = objects.entry(path.to_string()).or_insert(json!({}));
        if let (Value::Object(current), Value::Object(patch)) = (entry, body) {
            for (key, value) in patch {
                current.insert(key.clone(), value.clone());
            }
        }
    }

    fn begin_operation(&self, steps: u32) -> ApiResponse {
        let n = self.op_counter.fetch_add(1, Ordering::SeqCst);
        let url = format!("/operations/{n}");
        let mut script: VecDeque<Value> = (0..steps)
            .map(|_| json!({"status": "in_progress"}))
            .collect();
        script.push_back(json!({"status": "succeeded"}));
        self.operations.lock().unwrap().insert(url.clone(), script);
        ApiResponse {
            status: 202,
            body: Value::Null,
            headers: HashMap::from([("operation-location".to_string(), url)]),
        }
    }

    fn poll_operation(&self, path: &str) -> Result<ApiResponse, TransportError> {
        let mut operations = self.operations.lock().unwrap();
        let script = operations.get_mut(path).ok_or(TransportError::NotFound)?;
        let body = if script.len() > 1 {
            script.pop_front().unwrap_or(Value::Null)
        } else {
            // The terminal status stays observable; handles are never
            // polled past it by the engine, but re-polling is safe.
            script.front().cloned().unwrap_or(Value::Null)
        };
        Ok(ApiResponse {
            status: 200,
            body,
            headers: HashMap::new(),
        })
    }

    fn ok(&self, body: Value) -> ApiResponse {
        ApiResponse {
            status: 200,
            body,
            headers: HashMap::new(),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.log
            .lock()
            .unwrap()
            .push((request.method, request.path.clone()));

        match request.method {
            Method::Get if request.path.starts_with("/operations/") => {
                self.poll_operation(&request.path)
            }
            Method::Get => match self.object(&request.path) {
                Some(body) => Ok(self.ok(body)),
                None => Err(TransportError::NotFound),
            },
            Method::Put => {
                let body = request.body.unwrap_or(Value::Null);
                self.store(&request.path, &body);
                match self.async_steps {
                    Some(steps) => Ok(self.begin_operation(steps)),
                    None => Ok(self.ok(Value::Null)),
                }
            }
            Method::Patch => {
                let body = request.body.unwrap_or(Value::Null);
                self.merge(&request.path, &body);
                match self.async_steps {
                    Some(steps) => Ok(self.begin_operation(steps)),
                    None => Ok(self.ok(Value::Null)),
                }
            }
            Method::Delete => {
                self.objects.lock().unwrap().remove(&request.path);
                match self.async_steps {
                    Some(steps) => Ok(self.begin_operation(steps)),
                    None => Ok(ApiResponse {
                        status: 204,
                        body: Value::Null,
                        headers: HashMap::new(),
                    }),
                }
            }
            Method::Post => Err(TransportError::Server {
                status: 405,
                message: "unsupported".to_string(),
            }),
        }
    }
}

/// Minimal resource definition: the remote wire format is the attribute
/// shape itself.
pub struct WidgetResource {
    schema: Schema,
    grammar: IdGrammar,
}

impl WidgetResource {
    pub fn new() -> Self {
        Self {
            schema: Schema::new()
                .with_attribute(
                    "name",
                    Attribute::required(AttrKind::String).forces_recreation(),
                )
                .with_attribute(
                    "zone",
                    Attribute::required(AttrKind::String).forces_recreation(),
                )
                .with_attribute("size_gb", Attribute::required(AttrKind::Int))
                .with_attribute("note", Attribute::optional(AttrKind::String))
                .with_attribute("status", Attribute::computed(AttrKind::String)),
            grammar: IdGrammar::new(["zones", "widgets"]),
        }
    }
}

fn string_attr<'a>(attrs: &'a Value, name: &str) -> Result<&'a str, EngineError> {
    attrs
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::Decode {
            resource: "test_widget".to_string(),
            source: totonoe_core::CoreError::SchemaMismatch(format!("attribute missing: {name}")),
        })
}

#[async_trait]
impl ManagedResource for WidgetResource {
    fn type_name(&self) -> &'static str {
        "test_widget"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn grammar(&self) -> &IdGrammar {
        &self.grammar
    }

    fn resource_id(&self, attrs: &Value) -> Result<ResourceId, EngineError> {
        let zone = string_attr(attrs, "zone")?;
        let name = string_attr(attrs, "name")?;
        Ok(ResourceId::build(&self.grammar, &[zone, name])?)
    }

    async fn fetch(&self, ctx: &OpContext, id: &ResourceId) -> Result<Value, TransportError> {
        let response = ctx.transport.send(ApiRequest::get(id.to_string())).await?;
        Ok(response.body)
    }

    async fn begin_create(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> Result<Started, TransportError> {
        let response = ctx
            .transport
            .send(ApiRequest::put(id.to_string(), desired.clone()))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }

    async fn begin_update(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
        desired: &Value,
    ) -> Result<Started, TransportError> {
        let response = ctx
            .transport
            .send(ApiRequest::patch(id.to_string(), desired.clone()))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }

    async fn begin_delete(
        &self,
        ctx: &OpContext,
        id: &ResourceId,
    ) -> Result<Started, TransportError> {
        let response = ctx
            .transport
            .send(ApiRequest::delete(id.to_string()))
            .await?;
        Ok(Started::from_response(&ctx.transport, &response))
    }
}
