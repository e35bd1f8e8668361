//! In-memory compute control plane for integration tests
//!
//! Speaks the PascalCase envelope wire format, completes mutations through
//! polled operations, and records how many mutations ran concurrently
//! against the same server so lock serialization is observable.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use totonoe_engine::{ApiRequest, ApiResponse, Method, Transport, TransportError};

pub struct FakeComputeApi {
    objects: Mutex<HashMap<String, Value>>,
    operations: Mutex<HashMap<String, VecDeque<Value>>>,
    op_counter: AtomicU64,
    in_flight: Mutex<HashMap<String, u32>>,
    max_concurrent: Mutex<HashMap<String, u32>>,
    mutation_delay: Duration,
}

impl FakeComputeApi {
    pub fn new() -> Self {
        Self::with_mutation_delay(Duration::from_millis(0))
    }

    /// A delay inside every mutation widens the window in which unserialized
    /// operations would overlap.
    pub fn with_mutation_delay(delay: Duration) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            operations: Mutex::new(HashMap::new()),
            op_counter: AtomicU64::new(0),
            in_flight: Mutex::new(HashMap::new()),
            max_concurrent: Mutex::new(HashMap::new()),
            mutation_delay: delay,
        }
    }

    pub fn object(&self, path: &str) -> Option<Value> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    /// Highest number of simultaneous mutations observed for a server scope
    /// (`"{zone}/{server}"`)
    pub fn max_concurrent(&self, scope: &str) -> u32 {
        self.max_concurrent
            .lock()
            .unwrap()
            .get(scope)
            .copied()
            .unwrap_or(0)
    }

    /// Which server a mutation belongs to: the server itself, or the server
    /// a disk is (being) attached to.
    fn scope_of(&self, path: &str, body: Option<&Value>) -> Option<String> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != 5 {
            return None;
        }
        let (zone, kind, name) = (parts[2], parts[3], parts[4]);
        match kind {
            "servers" => Some(format!("{zone}/{name}")),
            "disks" => {
                let from_body = body
                    .and_then(|b| b.get("Disk"))
                    .and_then(|d| d.get("Server"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let from_store = self
                    .objects
                    .lock()
                    .unwrap()
                    .get(path)
                    .and_then(|b| b.get("Disk"))
                    .and_then(|d| d.get("Server"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                from_body.or(from_store).map(|s| format!("{zone}/{s}"))
            }
            _ => None,
        }
    }

    fn enter(&self, scope: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        let n = in_flight.entry(scope.to_string()).or_insert(0);
        *n += 1;
        let mut max = self.max_concurrent.lock().unwrap();
        let peak = max.entry(scope.to_string()).or_insert(0);
        if *n > *peak {
            *peak = *n;
        }
    }

    fn exit(&self, scope: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(n) = in_flight.get_mut(scope) {
            *n -= 1;
        }
    }

    /// Fill the attributes the control plane assigns
    fn fill_computed(path: &str, body: &Value) -> Value {
        let mut body = body.clone();
        if path.contains("/servers/") {
            if let Some(server) = body.get_mut("Server") {
                server["PowerState"] = json!("running");
                server["IPAddress"] = json!("203.0.113.10");
            }
        } else if path.contains("/disks/") {
            if let Some(disk) = body.get_mut("Disk") {
                disk["Status"] = json!("available");
            }
        }
        body
    }

    fn begin_operation(&self) -> ApiResponse {
        let n = self.op_counter.fetch_add(1, Ordering::SeqCst);
        let url = format!("/operations/{n}");
        self.operations.lock().unwrap().insert(
            url.clone(),
            VecDeque::from([json!({"status": "in_progress"}), json!({"status": "succeeded"})]),
        );
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
            script.front().cloned().unwrap_or(Value::Null)
        };
        Ok(ApiResponse {
            status: 200,
            body,
            headers: HashMap::new(),
        })
    }
}

#[async_trait]
impl Transport for FakeComputeApi {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        match request.method {
            Method::Get if request.path.starts_with("/operations/") => {
                self.poll_operation(&request.path)
            }
            Method::Get => match self.object(&request.path) {
                Some(body) => Ok(ApiResponse {
                    status: 200,
                    body,
                    headers: HashMap::new(),
                }),
                None => Err(TransportError::NotFound),
            },
            Method::Put => {
                let body = request.body.unwrap_or(Value::Null);
                let scope = self.scope_of(&request.path, Some(&body));
                if let Some(scope) = &scope {
                    self.enter(scope);
                }
                tokio::time::sleep(self.mutation_delay).await;
                let stored = Self::fill_computed(&request.path, &body);
                self.objects
                    .lock()
                    .unwrap()
                    .insert(request.path.clone(), stored);
                if let Some(scope) = &scope {
                    self.exit(scope);
                }
                Ok(self.begin_operation())
            }
            Method::Delete => {
                let scope = self.scope_of(&request.path, None);
                if let Some(scope) = &scope {
                    self.enter(scope);
                }
                tokio::time::sleep(self.mutation_delay).await;
                self.objects.lock().unwrap().remove(&request.path);
                if let Some(scope) = &scope {
                    self.exit(scope);
                }
                Ok(ApiResponse {
                    status: 204,
                    body: Value::Null,
                    headers: HashMap::new(),
                })
            }
            Method::Patch | Method::Post => Err(TransportError::Server {
                status: 405,
                message: "unsupported".to_string(),
            }),
        }
    }
}
