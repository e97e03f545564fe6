//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use delineate_dashboard::api::types::{
    DownloadCheckResponse, DownloadStartResponse, HealthCheck, HealthChecks, HealthStatus,
    RemoteJobStatus, StorageCheck,
};
use delineate_dashboard::api::{ApiBackend, ApiError};

/// Install an SDK tracer provider as the global one so spans carry valid ids.
pub fn install_test_tracer() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let provider = opentelemetry_sdk::trace::TracerProvider::builder().build();
        opentelemetry::global::set_tracer_provider(provider);
    });
}

/// A request as seen by the mock API.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: body.to_string(),
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

pub struct MockApi {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockApi {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a programmable mock API on an ephemeral port.
pub async fn start_mock_api<F>(handler: F) -> MockApi
where
    F: Fn(&RecordedRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = requests.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        serve_one(socket, handler.as_ref(), &recorded).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockApi { addr, requests }
}

async fn serve_one<F>(mut socket: TcpStream, handler: &F, recorded: &Mutex<Vec<RecordedRequest>>)
where
    F: Fn(&RecordedRequest) -> MockResponse,
{
    let Some(request) = read_request(&mut socket).await else {
        return;
    };
    let response = handler(&request);
    recorded.lock().unwrap().push(request);

    let reason = reqwest::StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let mut out = format!("HTTP/1.1 {} {}\r\n", response.status, reason);
    for (name, value) in &response.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.body.len(),
        response.body
    ));

    let _ = socket.write_all(out.as_bytes()).await;
    let _ = socket.shutdown().await;
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn healthy_body() -> Value {
    json!({ "status": "healthy", "checks": { "storage": "ok" } })
}

/// Scripted reply of the in-process backend.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Ok,
    Http(u16, &'static str),
    Network,
}

impl Reply {
    fn into_error(self) -> Option<ApiError> {
        match self {
            Reply::Ok => None,
            Reply::Http(status, message) => Some(ApiError::Http {
                status,
                message: message.to_string(),
                request_id: Some(format!("req-{status}")),
                body: json!({ "message": message }),
            }),
            Reply::Network => Some(ApiError::Network("connection refused".into())),
        }
    }
}

/// In-process `ApiBackend` with scripted replies and call counters.
pub struct FakeBackend {
    pub health: Mutex<Reply>,
    pub initiate: Mutex<Reply>,
    pub check: Mutex<Reply>,
    pub probe: Mutex<Reply>,
    pub calls: AtomicUsize,
}

impl FakeBackend {
    pub const BASE_URL: &'static str = "http://fake-api";

    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            health: Mutex::new(Reply::Ok),
            initiate: Mutex::new(Reply::Ok),
            check: Mutex::new(Reply::Ok),
            probe: Mutex::new(Reply::Http(500, "Sentry test error triggered")),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_health(&self, reply: Reply) {
        *self.health.lock().unwrap() = reply;
    }

    pub fn set_initiate(&self, reply: Reply) {
        *self.initiate.lock().unwrap() = reply;
    }

    pub fn set_check(&self, reply: Reply) {
        *self.check.lock().unwrap() = reply;
    }

    pub fn set_probe(&self, reply: Reply) {
        *self.probe.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn scripted(&self, slot: &Mutex<Reply>) -> Option<ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = *slot.lock().unwrap();
        reply.into_error()
    }
}

#[async_trait]
impl ApiBackend for FakeBackend {
    fn base_url(&self) -> &str {
        Self::BASE_URL
    }

    async fn get_health(&self) -> Result<HealthCheck, ApiError> {
        match self.scripted(&self.health) {
            Some(err) => Err(err),
            None => Ok(HealthCheck {
                status: HealthStatus::Healthy,
                checks: HealthChecks {
                    storage: StorageCheck::Ok,
                },
            }),
        }
    }

    async fn check_download(&self, file_id: u64) -> Result<DownloadCheckResponse, ApiError> {
        match self.scripted(&self.check) {
            Some(err) => Err(err),
            None => Ok(DownloadCheckResponse {
                file_id,
                available: true,
                message: "File is available".into(),
            }),
        }
    }

    async fn start_download(&self, _file_id: u64) -> Result<DownloadStartResponse, ApiError> {
        match self.scripted(&self.initiate) {
            Some(err) => Err(err),
            None => Ok(DownloadStartResponse {
                job_id: format!("remote-{}", self.calls()),
                status: RemoteJobStatus::Queued,
                total_file_ids: 1,
            }),
        }
    }

    async fn test_sentry(&self, file_id: u64) -> Result<Value, ApiError> {
        match self.scripted(&self.probe) {
            Some(err) => Err(err),
            None => Ok(json!({ "file_id": file_id, "available": true })),
        }
    }
}
