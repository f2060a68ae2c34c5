//! End-to-end smoke tests for the full homeportd stack.
//!
//! Each test registers the virtual module with a real daemon, runs the
//! controller loop as a task and exercises the HTTP layer via
//! `tower::ServiceExt::oneshot`; no TCP port is bound.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use homeport_adapter_http_axum::api::events;
use homeport_adapter_http_axum::router;
use homeport_adapter_http_axum::state::AppState;
use homeport_adapter_virtual::VirtualModule;
use homeport_app::daemon::{Daemon, DaemonState};
use homeport_app::handle::HubHandle;
use http_body_util::BodyExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;

struct Stack {
    handle: HubHandle,
    stop: oneshot::Sender<()>,
    controller: JoinHandle<Daemon>,
}

impl Stack {
    fn app(&self) -> axum::Router {
        router::build(AppState::new(self.handle.clone(), &events::channel()))
    }

    async fn shutdown(self) -> Daemon {
        self.stop.send(()).unwrap();
        let mut daemon = self.controller.await.unwrap();
        daemon.stop().unwrap();
        daemon.destroy().unwrap();
        daemon
    }
}

/// Start a daemon with `lamps` virtual lamps and run its loop as a task.
async fn stack(lamps: &str) -> Stack {
    let mut daemon = Daemon::new();
    daemon
        .add_module("virtual", VirtualModule::new())
        .expect("module should register");
    daemon.create().unwrap();
    daemon.parse_option("virtual-lamps", lamps).unwrap();
    daemon.start().unwrap();

    let handle = daemon.handle();
    let (stop, signal) = oneshot::channel::<()>();
    let controller = tokio::spawn(async move {
        daemon.run_until(signal).await.unwrap();
        daemon
    });
    Stack {
        handle,
        stop,
        controller,
    }
}

async fn send(app: axum::Router, method: &str, uri: &str, body: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let stack = stack("1").await;

    let (status, body) = send(stack.app(), "GET", "/health", "").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    stack.shutdown().await;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_list_virtual_devices_in_configuration() {
    let stack = stack("2").await;

    let (status, body) = send(stack.app(), "GET", "/api/configuration", "").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    let devices: Vec<_> = json["adapters"][0]["devices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(devices, vec!["lamp0", "lamp1", "sensor0"]);
    assert_eq!(
        json["adapters"][0]["devices"][0]["services"][0]["methods"],
        serde_json::json!(["GET", "PUT"])
    );
    stack.shutdown().await;
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_switch_lamp_through_http() {
    let stack = stack("1").await;
    let uri = "/api/services/virtual/lamp0/state";

    let (status, body) = send(stack.app(), "PUT", uri, "1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1");

    let (status, body) = send(stack.app(), "GET", uri, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "1");

    let (status, _) = send(stack.app(), "PUT", uri, "maybe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    stack.shutdown().await;
}

#[tokio::test]
async fn should_read_deferred_sensor_value() {
    let stack = stack("1").await;

    let (status, body) = tokio::time::timeout(
        Duration::from_secs(5),
        send(stack.app(), "GET", "/api/services/virtual/sensor0/temperature", ""),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "21.5");
    stack.shutdown().await;
}

#[tokio::test]
async fn should_return_405_for_sensor_put() {
    let stack = stack("1").await;

    let (status, _) = send(
        stack.app(),
        "PUT",
        "/api/services/virtual/sensor0/temperature",
        "30",
    )
    .await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    stack.shutdown().await;
}

#[tokio::test]
async fn should_return_404_for_unknown_device() {
    let stack = stack("1").await;

    let (status, _) = send(stack.app(), "GET", "/api/services/virtual/lamp9/state", "").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    stack.shutdown().await;
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_answer_503_after_daemon_stopped() {
    let stack = stack("1").await;
    let app = stack.app();

    let daemon = stack.shutdown().await;
    let (status, _) = send(app, "GET", "/api/services/virtual/lamp0/state", "").await;

    assert_eq!(daemon.state(), DaemonState::Idle);
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
