#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use backoffice_store::{ApiRequest, ApiResponse, Transport};
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

#[derive(Debug, Clone)]
pub enum Failure {
    Network,
    Status(u16, &'static str),
}

#[derive(Default)]
struct ServerState {
    rows: HashMap<String, Vec<Value>>,
    list_keys: HashMap<String, String>,
    nested: HashMap<String, Value>,
    failures: VecDeque<(Method, Failure)>,
    requests: Vec<ApiRequest>,
    next_id: u64,
}

/// In-memory stand-in for the back-office API.
///
/// Paginated GETs (those with a `page` query) answer `{ <key>: [...], total }`,
/// plain GETs answer the whole collection as a bare array.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub async fn seed(&self, route: &str, list_key: &str, rows: Vec<Value>) {
        let mut state = self.state.lock().await;
        state.list_keys.insert(route.to_string(), list_key.to_string());
        state.rows.insert(route.to_string(), rows);
    }

    pub async fn seed_nested(&self, path: &str, body: Value) {
        self.state.lock().await.nested.insert(path.to_string(), body);
    }

    /// Fail the next request with `method` instead of serving it.
    pub async fn fail_next(&self, method: Method, failure: Failure) {
        self.state.lock().await.failures.push_back((method, failure));
    }

    pub async fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().await.requests.clone()
    }

    pub async fn rows(&self, route: &str) -> Vec<Value> {
        self.state
            .lock()
            .await
            .rows
            .get(route)
            .cloned()
            .unwrap_or_default()
    }
}

pub fn named_rows(prefix: &str, field: &str, count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| json!({ "id": format!("{prefix}-{i:02}"), field: format!("{prefix} {i:02}") }))
        .collect()
}

fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

impl ServerState {
    fn take_failure(&mut self, method: &Method) -> Option<Failure> {
        let pos = self.failures.iter().position(|(m, _)| m == method)?;
        self.failures.remove(pos).map(|(_, f)| f)
    }

    fn serve(&mut self, request: &ApiRequest) -> ApiResponse {
        let segments: Vec<&str> = request.path.split('/').filter(|s| !s.is_empty()).collect();
        match (request.method.as_str(), segments.as_slice()) {
            ("GET", [route]) => self.list(route, request),
            ("GET", [_, _, _]) => match self.nested.get(&request.path) {
                Some(body) => ApiResponse::new(200, body.to_string()),
                None => ApiResponse::new(404, "no such record"),
            },
            ("POST", [route]) => self.insert(route, request.body.clone()),
            ("PUT", [route, id]) => self.replace(route, id, request.body.clone()),
            ("DELETE", [route, id]) => self.remove(route, id),
            _ => ApiResponse::new(404, "no such route"),
        }
    }

    fn list(&self, route: &str, request: &ApiRequest) -> ApiResponse {
        let Some(rows) = self.rows.get(route) else {
            return ApiResponse::new(404, "no such route");
        };
        let Some(page) = request.query_value("page").and_then(|p| p.parse::<usize>().ok()) else {
            return ApiResponse::new(200, Value::Array(rows.clone()).to_string());
        };
        let limit: usize = request
            .query_value("limit")
            .and_then(|l| l.parse().ok())
            .unwrap_or(10);
        let mut rows = rows.clone();
        if let Some(column) = request.query_value("sortColumn") {
            rows.sort_by(|a, b| compare(&a[column], &b[column]));
            if request.query_value("sortOrder") == Some("desc") {
                rows.reverse();
            }
        }
        let total = rows.len();
        let slice: Vec<Value> = rows
            .into_iter()
            .skip(page.saturating_sub(1) * limit)
            .take(limit)
            .collect();
        let key = self.list_keys.get(route).cloned().unwrap_or_else(|| route.to_string());
        let mut body = Map::new();
        body.insert(key, Value::Array(slice));
        body.insert("total".into(), json!(total));
        ApiResponse::new(200, Value::Object(body).to_string())
    }

    fn insert(&mut self, route: &str, body: Option<Value>) -> ApiResponse {
        let Some(Value::Object(mut fields)) = body else {
            return ApiResponse::new(400, "expected a JSON object");
        };
        if fields.contains_key("id") {
            return ApiResponse::new(400, "id is assigned by the server");
        }
        self.next_id += 1;
        fields.insert("id".into(), json!(format!("{route}-new-{}", self.next_id)));
        fields.insert("createdAt".into(), json!("2024-05-01T12:00:00Z"));
        let record = Value::Object(fields);
        self.rows.entry(route.to_string()).or_default().push(record.clone());
        ApiResponse::new(201, record.to_string())
    }

    fn replace(&mut self, route: &str, id: &str, body: Option<Value>) -> ApiResponse {
        let Some(Value::Object(fields)) = body else {
            return ApiResponse::new(400, "expected a JSON object");
        };
        if fields.contains_key("id") {
            return ApiResponse::new(400, "id must not be sent in the body");
        }
        let rows = self.rows.entry(route.to_string()).or_default();
        let Some(row) = rows.iter_mut().find(|r| r["id"] == id) else {
            return ApiResponse::new(404, format!("{route} {id} not found"));
        };
        if let Value::Object(existing) = row {
            existing.extend(fields);
        }
        ApiResponse::new(200, "")
    }

    fn remove(&mut self, route: &str, id: &str) -> ApiResponse {
        let rows = self.rows.entry(route.to_string()).or_default();
        let before = rows.len();
        rows.retain(|r| r["id"] != id);
        if rows.len() == before {
            return ApiResponse::new(404, format!("{route} {id} not found"));
        }
        ApiResponse::new(204, "")
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut state = self.state.lock().await;
        state.requests.push(request.clone());
        match state.take_failure(&request.method) {
            Some(Failure::Network) => Err(anyhow!("connection reset by peer")),
            Some(Failure::Status(status, body)) => Ok(ApiResponse::new(status, body)),
            None => Ok(state.serve(&request)),
        }
    }
}

/// Transport whose responses are released by the test, in any order.
#[derive(Clone, Default)]
pub struct GatedTransport {
    pending: Arc<Mutex<Vec<(ApiRequest, oneshot::Sender<ApiResponse>)>>>,
}

impl GatedTransport {
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Yield until `count` requests are parked.
    pub async fn wait_for(&self, count: usize) {
        while self.pending_count().await < count {
            tokio::task::yield_now().await;
        }
    }

    /// Answer the parked request for `page`. Returns false if its caller
    /// already gave up on it.
    pub async fn release_page(&self, page: u32, response: ApiResponse) -> bool {
        let mut pending = self.pending.lock().await;
        let wanted = page.to_string();
        let Some(pos) = pending
            .iter()
            .position(|(r, _)| r.query_value("page") == Some(wanted.as_str()))
        else {
            return false;
        };
        let (_, tx) = pending.remove(pos);
        tx.send(response).is_ok()
    }

    pub async fn release_newest(&self, response: ApiResponse) -> bool {
        let mut pending = self.pending.lock().await;
        let Some((_, tx)) = pending.pop() else {
            return false;
        };
        tx.send(response).is_ok()
    }

    pub async fn release_next(&self, response: ApiResponse) -> bool {
        let mut pending = self.pending.lock().await;
        if pending.is_empty() {
            return false;
        }
        let (_, tx) = pending.remove(0);
        tx.send(response).is_ok()
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.push((request, tx));
        rx.await.map_err(|_| anyhow!("gate closed"))
    }
}

pub fn page_body(key: &str, ids: &[&str], total: u64) -> ApiResponse {
    let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
    let mut body = Map::new();
    body.insert(key.to_string(), Value::Array(items));
    body.insert("total".into(), json!(total));
    ApiResponse::new(200, Value::Object(body).to_string())
}
