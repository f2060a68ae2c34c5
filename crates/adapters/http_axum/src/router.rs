//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Nests the API routes under `/api` and includes a [`TraceLayer`] that
/// logs each HTTP request/response at the `DEBUG` level.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use homeport_app::hub::Hub;
    use homeport_domain::model::{Adapter, Device};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::api::events;

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let app = build(AppState::new(Hub::new().handle(), &events::channel()));

        let response = app.oneshot(get_request("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_return_configuration_of_running_hub() {
        let mut hub = Hub::new();
        let adapter = Adapter::builder()
            .id("A1")
            .attribute("description", "test adapter")
            .device(Device::new("D1").unwrap())
            .build()
            .unwrap();
        hub.attach_adapter(adapter).unwrap();
        let controller = hub.spawn().unwrap();
        let app = build(AppState::new(controller.handle(), &events::channel()));

        let response = app.oneshot(get_request("/api/configuration")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["adapters"][0]["id"], "A1");
        assert_eq!(json["adapters"][0]["attributes"]["description"], "test adapter");
        assert_eq!(json["adapters"][0]["devices"][0]["id"], "D1");
        controller.stop();
    }

    #[tokio::test]
    async fn should_return_503_for_configuration_when_hub_stopped() {
        let mut hub = Hub::new();
        let handle = hub.handle();
        hub.shutdown();
        let app = build(AppState::new(handle, &events::channel()));

        let response = app.oneshot(get_request("/api/configuration")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn should_open_event_stream() {
        let events = events::channel();
        let app = build(AppState::new(Hub::new().handle(), &events));

        let response = app.oneshot(get_request("/api/events")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
    }

    #[tokio::test]
    async fn should_reject_invalid_service_identifier() {
        let app = build(AppState::new(Hub::new().handle(), &events::channel()));

        let response = app
            .oneshot(get_request("/api/services/A1/D%2F1/S1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
