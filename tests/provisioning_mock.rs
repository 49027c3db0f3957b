//! Provisioning Mock Tests
//!
//! Tests for the provisioning poller and the service-level create flow:
//! - Every status/Location combination the poller understands
//! - Timeout and cancellation behaviour
//! - Create, poll, fetch through `Service::provision`
//! - Service-level delete semantics

use mythic_sdk::{status_is, ApiError, Client, ClientConfig, Service};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_with_interval(server: &MockServer, interval: Duration) -> Client {
    Client::new(
        ClientConfig::new()
            .with_auth_url(server.uri())
            .with_poll_interval(interval),
    )
    .unwrap()
}

fn never_done(_: &Map<String, Value>, _: &str) -> Option<String> {
    None
}

fn vps_running(status: &Map<String, Value>, identifier: &str) -> Option<String> {
    (status.get("status").and_then(Value::as_str) == Some("running"))
        .then(|| format!("/vps/servers/{}", identifier))
}

// ============================================================================
// Poller Tests
// ============================================================================

#[tokio::test]
async fn test_poll_see_other_returns_location() {
    let mock_server = MockServer::start().await;
    let want = "https://x/y";

    Mock::given(method("GET"))
        .and(path("/queue/1"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", want))
        .expect(1)
        .mount(&mock_server)
        .await;

    // A long interval proves no sleep happens before returning
    let client = client_with_interval(&mock_server, Duration::from_secs(60));
    let started = Instant::now();

    let location = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(2),
            "id",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(location, want);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_poll_see_other_without_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(303))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let error = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(1),
            "id",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::PollMissingLocation));
    assert_eq!(error.to_string(), "polling returned no location");
}

#[tokio::test]
async fn test_poll_internal_server_error_fails_immediately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let error = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(1),
            "id",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "provisioning failed: boom");
    match error {
        ApiError::PollFailed { body } => assert_eq!(body, "boom"),
        other => panic!("expected PollFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_poll_accepted_with_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", "/ready/123"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let location = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(1),
            "id",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(location, "/ready/123");
}

#[tokio::test]
async fn test_poll_ok_with_location_skips_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", "/vps/servers/web1")
                .set_body_string("not json at all"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let location = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(1),
            "web1",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(location, "/vps/servers/web1");
}

#[tokio::test]
async fn test_poll_accepted_then_ok_with_completion_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/queue/1"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/queue/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(5));
    let location = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(2),
            "id",
            &vps_running,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(location, "/vps/servers/id");
}

#[tokio::test]
async fn test_poll_ok_with_status_is_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "live", "url": "ignored"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let check = status_is("status", "live", |id| format!("/pi/servers/{}", id));
    let location = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(1),
            "pi1",
            &check,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(location, "/pi/servers/pi1");
}

#[tokio::test]
async fn test_poll_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "pending"})))
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(5));
    let started = Instant::now();

    let error = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_millis(20),
            "id",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(error.is_timeout());
    assert_eq!(error.to_string(), "timed out while provisioning");
    // 20ms deadline plus at most one 5ms interval, with room for slow CI
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_poll_ok_bad_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not-json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let result = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(1),
            "id",
            &never_done,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(ApiError::Decode(_))));
}

#[tokio::test]
async fn test_poll_unexpected_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(418))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let error = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(1),
            "id",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(error
        .to_string()
        .contains("unexpected status while polling: 418"));
    assert_eq!(error.status(), Some(418));
}

#[tokio::test]
async fn test_poll_follows_absolute_location() {
    let queue_server = MockServer::start().await;
    let api_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/jobs/42"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/vps/servers/web1"))
        .expect(1)
        .mount(&queue_server)
        .await;

    let client = client_with_interval(&api_server, Duration::from_millis(1));
    let poll_location = format!("{}/jobs/42", queue_server.uri());

    let location = client
        .poll_provisioning(
            &api_server.uri(),
            &poll_location,
            Duration::from_secs(1),
            "web1",
            &never_done,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(location, "/vps/servers/web1");
}

#[tokio::test]
async fn test_poll_cancelled_during_sleep() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&mock_server)
        .await;

    // Interval and timeout are both far longer than the test; only
    // cancellation can end the poll quickly.
    let client = client_with_interval(&mock_server, Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let error = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_secs(60),
            "id",
            &never_done,
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert!(!error.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_poll_cancelled_before_start_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_with_interval(&mock_server, Duration::from_millis(1));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = client
        .poll_provisioning(
            &mock_server.uri(),
            "/queue/1",
            Duration::from_millis(1),
            "id",
            &never_done,
            &cancel,
        )
        .await;

    assert!(matches!(result, Err(ApiError::Cancelled)));
}

// ============================================================================
// Service Tests
// ============================================================================

#[derive(Debug, Deserialize)]
struct Server {
    identifier: String,
    status: String,
    #[serde(default)]
    ipv6: Vec<String>,
}

fn vps_service(server: &MockServer) -> Service {
    let client = Arc::new(client_with_interval(server, Duration::from_millis(5)));
    Service::new(client, format!("{}/beta", server.uri()))
}

#[tokio::test]
async fn test_provision_create_poll_fetch() {
    let mock_server = MockServer::start().await;
    let queue_location = format!("{}/beta/queue/vps/77", mock_server.uri());

    Mock::given(method("POST"))
        .and(path("/beta/vps/servers/web1"))
        .and(body_json(json!({"product": "VPSX16", "disk_size": 10240})))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", queue_location.as_str()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/beta/queue/vps/77"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/beta/queue/vps/77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/beta/vps/servers/web1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "identifier": "web1",
            "status": "running",
            "ipv6": ["2a00:1098::1"]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = vps_service(&mock_server);
    let server: Server = service
        .provision(
            "/vps/servers/web1",
            "web1",
            &json!({"product": "VPSX16", "disk_size": 10240}),
            Duration::from_secs(2),
            &status_is("status", "running", |id| format!("/vps/servers/{}", id)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(server.identifier, "web1");
    assert_eq!(server.status, "running");
    assert_eq!(server.ipv6, vec!["2a00:1098::1".to_string()]);
}

#[tokio::test]
async fn test_provision_identifier_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/beta/vps/servers/web1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("exists"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = vps_service(&mock_server);
    let result: Result<Server, _> = service
        .provision(
            "/vps/servers/web1",
            "web1",
            &json!({"product": "VPSX16"}),
            Duration::from_secs(1),
            &vps_running,
            &CancellationToken::new(),
        )
        .await;

    match result {
        Err(ApiError::IdentifierConflict { identifier }) => assert_eq!(identifier, "web1"),
        other => panic!("expected IdentifierConflict, got {:?}", other),
    }
}

#[tokio::test]
async fn test_provision_accepted_without_location() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/beta/pi/servers/pi1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = vps_service(&mock_server);
    let result: Result<Server, _> = service
        .provision(
            "/pi/servers/pi1",
            "pi1",
            &json!({"model": 4}),
            Duration::from_secs(1),
            &vps_running,
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(ApiError::MissingLocation)));
}

#[tokio::test]
async fn test_provision_rejected_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/beta/vps/servers/web1"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid product"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = vps_service(&mock_server);
    let result: Result<Server, _> = service
        .provision(
            "/vps/servers/web1",
            "web1",
            &json!({"product": "nope"}),
            Duration::from_secs(1),
            &vps_running,
            &CancellationToken::new(),
        )
        .await;

    match result {
        Err(ApiError::UnexpectedStatus { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "invalid product");
        }
        other => panic!("expected UnexpectedStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_accepts_success_statuses() {
    let mock_server = MockServer::start().await;

    for (resource, status) in [("a", 200u16), ("b", 202), ("c", 204), ("d", 404)] {
        Mock::given(method("DELETE"))
            .and(path(format!("/beta/vps/servers/{}", resource)))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let service = vps_service(&mock_server);
    let cancel = CancellationToken::new();
    for resource in ["a", "b", "c", "d"] {
        service
            .delete(&format!("/vps/servers/{}", resource), &cancel)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_delete_failure_truncates_body() {
    let mock_server = MockServer::start().await;
    let long_body = "e".repeat(1000);

    Mock::given(method("DELETE"))
        .and(path("/beta/vps/servers/web1"))
        .respond_with(ResponseTemplate::new(403).set_body_string(long_body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = vps_service(&mock_server);
    let error = service
        .delete("/vps/servers/web1", &CancellationToken::new())
        .await
        .unwrap_err();

    match error {
        ApiError::UnexpectedStatus { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body.len(), 515);
            assert!(body.ends_with("..."));
        }
        other => panic!("expected UnexpectedStatus, got {:?}", other),
    }
}
