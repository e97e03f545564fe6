//! Traced API client against a mock download API.

use std::sync::Arc;

use serde_json::json;

use delineate_dashboard::api::{ApiBackend, ApiClient, ApiError};
use delineate_dashboard::config::ApiConfig;
use delineate_dashboard::observability::error_tracking::{Level, RecordingReporter};

mod common;

use common::MockResponse;

fn client_for(base_url: String) -> (ApiClient, RecordingReporter) {
    common::install_test_tracer();
    let reporter = RecordingReporter::new();
    let config = ApiConfig {
        base_url,
        timeout_secs: 5,
        use_system_proxy: false,
    };
    let client = ApiClient::new(&config, Arc::new(reporter.clone())).unwrap();
    (client, reporter)
}

fn is_traceparent(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    parts.len() == 4
        && parts[0] == "00"
        && parts[1].len() == 32
        && parts[2].len() == 16
        && parts[1..3]
            .iter()
            .all(|p| p.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()))
}

#[tokio::test]
async fn test_health_request_carries_propagation_headers() {
    let api = common::start_mock_api(|_| {
        MockResponse::json(200, common::healthy_body()).with_header("x-request-id", "req-health-1")
    })
    .await;
    let (client, reporter) = client_for(api.base_url());

    let health = client.get_health().await.unwrap();
    assert!(health.is_healthy());

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path, "/health");
    assert_eq!(requests[0].header("content-type"), Some("application/json"));
    let traceparent = requests[0].header("traceparent").expect("traceparent header");
    assert!(is_traceparent(traceparent), "bad traceparent {traceparent}");

    let trace_id = reporter.scope_tag("trace_id").unwrap();
    assert_eq!(traceparent.split('-').nth(1), Some(trace_id.as_str()));
    assert_eq!(reporter.scope_tag("request_id").as_deref(), Some("req-health-1"));
    assert!(reporter.events().is_empty());
}

#[tokio::test]
async fn test_initiate_sends_file_ids_and_decodes_camel_case() {
    let api = common::start_mock_api(|_| {
        MockResponse::json(
            200,
            json!({ "jobId": "job-7", "status": "processing", "totalFileIds": 1 }),
        )
    })
    .await;
    let (client, _reporter) = client_for(api.base_url());

    let started = client.start_download(70_000).await.unwrap();
    assert_eq!(started.job_id, "job-7");
    assert_eq!(started.total_file_ids, 1);

    let request = &api.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/v1/download/initiate");
    assert_eq!(request.json(), json!({ "file_ids": [70000] }));
}

#[tokio::test]
async fn test_http_error_is_captured_with_endpoint_status_and_body_request_id() {
    let api = common::start_mock_api(|_| {
        MockResponse::json(
            500,
            json!({ "error": "Internal", "message": "Storage offline", "requestId": "body-req" }),
        )
        .with_header("x-request-id", "hdr-req")
    })
    .await;
    let (client, reporter) = client_for(api.base_url());

    let err = client.start_download(70_000).await.unwrap_err();
    match &err {
        ApiError::Http {
            status,
            message,
            request_id,
            ..
        } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "Storage offline");
            assert_eq!(request_id.as_deref(), Some("body-req"));
        }
        other => panic!("expected Http error, got {other:?}"),
    }

    let events = reporter.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, Level::Error);
    assert_eq!(events[0].message, "API Error: Storage offline");
    assert_eq!(events[0].tags["api_endpoint"], "/v1/download/initiate");
    assert_eq!(events[0].tags["http_status"], "500");
    assert_eq!(events[0].tags["request_id"], "body-req");
    assert!(events[0].tags.contains_key("trace_id"));
    assert_eq!(reporter.scope_tag("request_id").as_deref(), Some("hdr-req"));
}

#[tokio::test]
async fn test_header_request_id_used_when_body_lacks_one() {
    let api = common::start_mock_api(|_| {
        MockResponse::raw(503, "upstream unavailable").with_header("x-request-id", "hdr-only")
    })
    .await;
    let (client, reporter) = client_for(api.base_url());

    let err = client.check_download(70_000).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.request_id(), Some("hdr-only"));
    assert_eq!(err.to_string(), "Service Unavailable");
    assert_eq!(reporter.events()[0].tags["request_id"], "hdr-only");
}

#[tokio::test]
async fn test_missing_request_id_is_tagged_unknown() {
    let api = common::start_mock_api(|_| MockResponse::json(404, json!({ "error": "Not Found" }))).await;
    let (client, reporter) = client_for(api.base_url());

    let err = client.check_download(70_000).await.unwrap_err();
    assert_eq!(err.request_id(), None);
    assert_eq!(reporter.events()[0].tags["request_id"], "unknown");
    assert_eq!(reporter.events()[0].message, "API Error: Not Found");
}

#[tokio::test]
async fn test_sentry_probe_hits_query_endpoint() {
    let api = common::start_mock_api(|_| {
        MockResponse::json(
            500,
            json!({ "error": "Sentry test error triggered", "requestId": "probe-1" }),
        )
    })
    .await;
    let (client, _reporter) = client_for(api.base_url());

    let err = client.test_sentry(70_000).await.unwrap_err();
    assert_eq!(err.request_id(), Some("probe-1"));

    let request = &api.requests()[0];
    assert_eq!(request.path, "/v1/download/check?sentry_test=true");
    assert_eq!(request.json(), json!({ "file_id": 70000 }));
}

#[tokio::test]
async fn test_network_failure_is_captured_once() {
    let addr = common::closed_addr().await;
    let (client, reporter) = client_for(format!("http://{addr}"));

    let err = client.get_health().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(err.kind(), "network_error");

    let events = reporter.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tags["error_type"], "network_error");
    assert_eq!(events[0].tags["api_endpoint"], "/health");
}

#[tokio::test]
async fn test_undecodable_success_body_is_a_network_error() {
    let api = common::start_mock_api(|_| MockResponse::raw(200, "definitely not json")).await;
    let (client, reporter) = client_for(api.base_url());

    let err = client.get_health().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
    assert_eq!(err.kind(), "network_error");
    assert_eq!(reporter.events().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_keeps_its_own_trace_while_other_requests_run() {
    let api = common::start_mock_api(|request| {
        if request.path == "/v1/download/initiate" {
            std::thread::sleep(std::time::Duration::from_millis(300));
            MockResponse::json(503, json!({ "message": "Storage offline" }))
        } else {
            MockResponse::json(200, common::healthy_body())
        }
    })
    .await;
    let (client, reporter) = client_for(api.base_url());
    let client = Arc::new(client);

    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.start_download(70_000).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    client.get_health().await.unwrap();
    assert!(slow.await.unwrap().is_err());

    let requests = api.requests();
    let trace_of = |path: &str| {
        let request = requests.iter().find(|r| r.path == path).unwrap();
        request.header("traceparent").unwrap().split('-').nth(1).unwrap().to_string()
    };
    let initiate_trace = trace_of("/v1/download/initiate");
    let health_trace = trace_of("/health");
    assert_ne!(initiate_trace, health_trace);

    assert_eq!(reporter.scope_tag("trace_id").as_deref(), Some(health_trace.as_str()));
    let events = reporter.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].tags["trace_id"], initiate_trace);
}
