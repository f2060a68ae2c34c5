//! Service invocation: one HTTP call becomes one hub request.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;

use homeport_domain::error::HubError;
use homeport_domain::method::Method;
use homeport_domain::request::{self, Request};
use homeport_domain::value::{self, Value};

use crate::error::ApiError;
use crate::state::AppState;

/// Path segments identifying the target service.
type ServicePath = Path<(String, String, String)>;

/// `GET /api/services/{adapter}/{device}/{service}`
pub async fn get(
    State(state): State<AppState>,
    Path((adapter, device, service)): ServicePath,
) -> Result<Response, ApiError> {
    call(&state, Method::Get, [adapter.as_str(), device.as_str(), service.as_str()], None).await
}

/// `PUT /api/services/{adapter}/{device}/{service}`
///
/// The body and its `Content-Type` become the request value.
pub async fn put(
    State(state): State<AppState>,
    Path((adapter, device, service)): ServicePath,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut value = Value::new(body.to_vec());
    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        value.set_header(value::CONTENT_TYPE, content_type);
    }
    call(&state, Method::Put, [adapter.as_str(), device.as_str(), service.as_str()], Some(value)).await
}

async fn call(
    state: &AppState,
    method: Method,
    [adapter, device, service]: [&str; 3],
    value: Option<Value>,
) -> Result<Response, ApiError> {
    let target = state.handle.service(adapter, device, service)?;
    let (sender, receiver) = oneshot::channel();
    let mut request = Request::new(target, method, move |response| {
        // the client may have disconnected
        let _ = sender.send(response);
    });
    if let Some(value) = value {
        request = request.with_value(value);
    }
    state.handle.request(request)?;

    // a request dropped at shutdown drops its callback and the sender
    let response = receiver.await.map_err(|_| HubError::NotRunning)?;
    Ok(into_http(response))
}

fn into_http(mut response: request::Response) -> Response {
    let status =
        StatusCode::from_u16(response.status().code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let Some(value) = response.take_value() else {
        return status.into_response();
    };

    let headers: Vec<_> = value
        .headers()
        .filter_map(|(k, v)| {
            let header = HeaderName::try_from(k).ok().zip(HeaderValue::try_from(v).ok());
            if header.is_none() {
                tracing::warn!(header = k, "dropping invalid response header");
            }
            header
        })
        .collect();
    let mut out = Body::from(value.into_body()).into_response();
    *out.status_mut() = status;
    out.headers_mut().extend(headers);
    out
}
