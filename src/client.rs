use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// One HTTP exchange, addressed relative to the API root.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a completed exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Seam between stores and the network.
///
/// `Err` means the exchange never completed. Any status the server sent back,
/// including 4xx/5xx, is an `Ok(ApiResponse)`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ClientSettings {
    /// Longest a single `send` can take: every attempt timing out plus the
    /// sleeps between them.
    pub fn retry_deadline(&self) -> Duration {
        (1..=self.max_retries).fold(
            self.timeout.saturating_mul(self.max_retries.saturating_add(1)),
            |total, attempt| {
                total.saturating_add(backoff_with_cap(
                    self.initial_backoff,
                    self.max_backoff,
                    attempt,
                ))
            },
        )
    }
}

#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: Url,
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let mut base_url = Url::parse(&settings.base_url).context("invalid API base URL")?;
        // Url::join drops the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn build_request(&self, request: &ApiRequest) -> Result<reqwest::Request> {
        let path = request.path.trim_start_matches('/');
        let mut endpoint = self
            .base_url
            .join(path)
            .with_context(|| format!("invalid API path {path}"))?;
        if !request.query.is_empty() {
            endpoint
                .query_pairs_mut()
                .extend_pairs(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        let mut builder = self.http.request(request.method.clone(), endpoint);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder.build().context("failed to build API request")
    }

    async fn execute_once(&self, built: reqwest::Request) -> Result<ApiResponse, reqwest::Error> {
        let res = self.http.execute(built).await?;
        let status = res.status().as_u16();
        let body = res.text().await?;
        Ok(ApiResponse { status, body })
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        backoff_with_cap(self.initial_backoff, self.max_backoff, attempt)
    }
}

pub(crate) fn backoff_with_cap(initial: Duration, cap: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    initial.saturating_mul(factor).min(cap)
}

/// A refused connection never reached the server. A timed-out request may
/// have, so only reads are replayed after a timeout.
fn is_retryable(method: &Method, err: &reqwest::Error) -> bool {
    err.is_connect() || (err.is_timeout() && *method == Method::GET)
}

#[async_trait]
impl Transport for RestClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 0u32;
        loop {
            // A malformed address fails here and is never retried.
            let built = self.build_request(&request)?;
            debug!(method=%built.method(), url=%built.url(), payload=?request.body, attempt, "sending api request");
            match self.execute_once(built).await {
                Ok(res) => return Ok(res),
                Err(err) if attempt < self.max_retries && is_retryable(&request.method, &err) => {
                    attempt += 1;
                    let delay = self.backoff_for(attempt);
                    warn!(?err, attempt, delay_ms = delay.as_millis() as u64, path = %request.path, "api request failed; retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("failed to reach API at {} {}", request.method, request.path)
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[derive(Clone, Copy)]
    enum Reply {
        Status(&'static str),
        Silent,
    }

    fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    return;
                }
            }
        }
    }

    /// Local HTTP peer; counts every connection it accepts.
    fn spawn_peer(reply: Reply) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream);
                match reply {
                    Reply::Status(line) => {
                        let response = format!(
                            "HTTP/1.1 {line}\r\ncontent-length: 4\r\nconnection: close\r\n\r\nnope"
                        );
                        let _ = stream.write_all(response.as_bytes());
                    }
                    Reply::Silent => held.push(stream),
                }
            }
        });
        (format!("http://{addr}/api"), accepted)
    }

    fn peer_settings(base_url: String, timeout_ms: u64, max_retries: u32) -> ClientSettings {
        ClientSettings {
            base_url,
            user_agent: "backoffice-store/test".into(),
            timeout: Duration::from_millis(timeout_ms),
            max_retries,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
        }
    }

    fn settings() -> ClientSettings {
        ClientSettings {
            base_url: "http://localhost:3000/api".into(),
            user_agent: "backoffice-store/test".into(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        }
    }

    #[test]
    fn build_request_joins_path_and_query() {
        let client = RestClient::new(&settings()).unwrap();
        let request = ApiRequest::get("provider")
            .with_query("page", 2)
            .with_query("limit", 5)
            .with_query("sortColumn", "providerName")
            .with_query("sortOrder", "desc");
        let built = client.build_request(&request).unwrap();
        assert_eq!(built.method(), Method::GET);
        assert_eq!(built.url().path(), "/api/provider");
        assert_eq!(
            built.url().query(),
            Some("page=2&limit=5&sortColumn=providerName&sortOrder=desc")
        );
        assert!(built.body().is_none());
    }

    #[test]
    fn build_request_sets_json_body() {
        let client = RestClient::new(&settings()).unwrap();
        let request = ApiRequest::put("department/d-1", json!({ "departmentName": "Kitchen" }));
        let built = client.build_request(&request).unwrap();
        assert_eq!(built.method(), Method::PUT);
        assert_eq!(built.url().path(), "/api/department/d-1");
        assert_eq!(
            built
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
        let bytes = built.body().and_then(|b| b.as_bytes()).unwrap();
        let sent: Value = serde_json::from_slice(bytes).unwrap();
        assert_eq!(sent, json!({ "departmentName": "Kitchen" }));
    }

    #[test]
    fn leading_slash_stays_under_api_root() {
        let client = RestClient::new(&settings()).unwrap();
        let built = client.build_request(&ApiRequest::delete("/employee/e-9")).unwrap();
        assert_eq!(built.url().as_str(), "http://localhost:3000/api/employee/e-9");
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let client = RestClient::new(&settings()).unwrap();
        assert_eq!(client.backoff_for(1), Duration::from_millis(100));
        assert_eq!(client.backoff_for(2), Duration::from_millis(200));
        assert_eq!(client.backoff_for(3), Duration::from_millis(350));
        assert_eq!(client.backoff_for(40), Duration::from_millis(350));
    }

    #[test]
    fn response_success_range() {
        assert!(ApiResponse::new(201, "").is_success());
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(304, "").is_success());
        assert!(!ApiResponse::new(422, "bad").is_success());
    }

    #[tokio::test]
    async fn server_errors_are_returned_without_retry() {
        let (base, accepted) = spawn_peer(Reply::Status("503 Service Unavailable"));
        let client = RestClient::new(&peer_settings(base, 2_000, 3)).unwrap();

        let res = client.send(ApiRequest::get("department")).await.unwrap();
        assert_eq!(res.status, 503);
        assert_eq!(res.body, "nope");
        let res = client
            .send(ApiRequest::post("department", json!({ "departmentName": "Bar" })))
            .await
            .unwrap();
        assert!(!res.is_success());
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timed_out_post_is_sent_once() {
        let (base, accepted) = spawn_peer(Reply::Silent);
        let client = RestClient::new(&peer_settings(base, 200, 2)).unwrap();

        let err = client
            .send(ApiRequest::post("department", json!({ "departmentName": "Bar" })))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to reach API at POST department"));
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timed_out_get_is_retried_up_to_limit() {
        let (base, accepted) = spawn_peer(Reply::Silent);
        let client = RestClient::new(&peer_settings(base, 200, 2)).unwrap();

        assert!(client.send(ApiRequest::get("department")).await.is_err());
        assert_eq!(accepted.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn refused_connection_is_retried_with_backoff() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut settings = peer_settings(format!("http://127.0.0.1:{port}/api"), 1_000, 2);
        settings.initial_backoff = Duration::from_millis(60);
        settings.max_backoff = Duration::from_secs(1);
        let client = RestClient::new(&settings).unwrap();

        let started = Instant::now();
        let err = client
            .send(ApiRequest::post("department", json!({ "departmentName": "Bar" })))
            .await
            .unwrap_err();
        // two sleeps: 60ms then 120ms
        assert!(started.elapsed() >= Duration::from_millis(180));
        assert!(format!("{err:#}").contains("failed to reach API"));
    }

    #[test]
    fn retry_deadline_covers_every_attempt() {
        let s = settings();
        // 4 x 5s plus 100 + 200 + 350 ms of backoff
        assert_eq!(s.retry_deadline(), Duration::from_millis(20_650));
        let single = ClientSettings { max_retries: 0, ..s };
        assert_eq!(single.retry_deadline(), Duration::from_secs(5));
    }
}
