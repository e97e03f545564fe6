//! Traced HTTP client for the download API.
//!
//! # Responsibilities
//! - Attach `Content-Type` and W3C propagation headers to every request
//! - Tag the error-tracking scope with trace, span and request ids
//! - Turn non-2xx answers and transport failures into `ApiError`, capturing each once

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opentelemetry::{Context, KeyValue};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::api::error::ApiError;
use crate::api::types::{
    DownloadCheckRequest, DownloadCheckResponse, DownloadStartRequest, DownloadStartResponse,
    ErrorBody, HealthCheck,
};
use crate::api::ApiBackend;
use crate::config::ApiConfig;
use crate::observability::error_tracking::{CapturedEvent, ErrorReporter};
use crate::observability::tracing::{in_span, inject_context, trace_context_of};

pub const X_REQUEST_ID: &str = "x-request-id";

const HEALTH_ENDPOINT: &str = "/health";
const CHECK_ENDPOINT: &str = "/v1/download/check";
const INITIATE_ENDPOINT: &str = "/v1/download/initiate";
const SENTRY_TEST_ENDPOINT: &str = "/v1/download/check?sentry_test=true";

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    reporter: Arc<dyn ErrorReporter>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, reporter: Arc<dyn ErrorReporter>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Network(Box::new(e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            reporter,
        })
    }

    async fn send<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let cx = Context::current();
        self.tag_trace(&cx);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inject_context(&cx, &mut headers);

        let mut request = self.client.request(method.clone(), &url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, url = %url, "Sending API request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.network_failure(endpoint, &cx, Box::new(e), false)),
        };

        let status = response.status();
        let header_request_id = response
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(id) = &header_request_id {
            self.reporter.set_tag("request_id", id);
        }

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.network_failure(endpoint, &cx, Box::new(e), false)),
        };

        if !status.is_success() {
            let body: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            let parsed = ErrorBody::from_value(&body);
            let message = parsed.display_message(status.as_u16());
            let request_id = parsed.request_id.or(header_request_id);

            tracing::warn!(
                endpoint = %endpoint,
                status = status.as_u16(),
                request_id = request_id.as_deref().unwrap_or("unknown"),
                message = %message,
                "API request failed"
            );
            let event = CapturedEvent::exception(format!("API Error: {message}"))
                .tag("api_endpoint", endpoint)
                .tag("http_status", status.as_u16().to_string())
                .tag("request_id", request_id.as_deref().unwrap_or("unknown"))
                .extra("response", &body);
            self.reporter.capture(with_trace(event, &cx));

            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
                request_id,
                body,
            });
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| self.network_failure(endpoint, &cx, Box::new(e), true))
    }

    fn tag_trace(&self, cx: &Context) {
        if let Some(trace) = trace_context_of(cx) {
            self.reporter.set_tag("trace_id", &trace.trace_id);
            self.reporter.set_tag("span_id", &trace.span_id);
        }
    }

    fn network_failure(
        &self,
        endpoint: &str,
        cx: &Context,
        source: Box<dyn std::error::Error + Send + Sync>,
        decode: bool,
    ) -> ApiError {
        tracing::warn!(endpoint = %endpoint, error = %source, "API request did not complete");
        let event = CapturedEvent::exception(source.to_string())
            .tag("api_endpoint", endpoint)
            .tag("error_type", "network_error");
        self.reporter.capture(with_trace(event, cx));
        if decode {
            ApiError::Decode(source)
        } else {
            ApiError::Network(source)
        }
    }
}

/// Pin the request's own trace ids on the event; the shared scope may already
/// hold another request's.
fn with_trace(event: CapturedEvent, cx: &Context) -> CapturedEvent {
    match trace_context_of(cx) {
        Some(trace) => event
            .tag("trace_id", trace.trace_id.clone())
            .tag("span_id", trace.span_id.clone())
            .extra("trace_context", trace),
        None => event,
    }
}

#[async_trait]
impl ApiBackend for ApiClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_health(&self) -> Result<HealthCheck, ApiError> {
        in_span("api.getHealth", vec![], || {
            self.send::<_, ()>(Method::GET, HEALTH_ENDPOINT, None)
        })
        .await
    }

    async fn check_download(&self, file_id: u64) -> Result<DownloadCheckResponse, ApiError> {
        let body = DownloadCheckRequest { file_id };
        in_span(
            "api.checkDownload",
            vec![
                KeyValue::new("download.action", "check"),
                KeyValue::new("file.id", file_id as i64),
            ],
            || self.send(Method::POST, CHECK_ENDPOINT, Some(&body)),
        )
        .await
    }

    async fn start_download(&self, file_id: u64) -> Result<DownloadStartResponse, ApiError> {
        let body = DownloadStartRequest {
            file_ids: vec![file_id],
        };
        in_span(
            "api.initiateDownload",
            vec![
                KeyValue::new("download.action", "initiate"),
                KeyValue::new("file.id", file_id as i64),
            ],
            || self.send(Method::POST, INITIATE_ENDPOINT, Some(&body)),
        )
        .await
    }

    async fn test_sentry(&self, file_id: u64) -> Result<Value, ApiError> {
        let body = DownloadCheckRequest { file_id };
        in_span("api.testSentry", vec![], || {
            self.send(Method::POST, SENTRY_TEST_ENDPOINT, Some(&body))
        })
        .await
    }
}
