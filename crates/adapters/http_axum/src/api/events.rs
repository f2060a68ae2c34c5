//! Server-Sent Events (SSE) stream of hub notifications.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use homeport_app::listener::Listener;
use homeport_domain::reference::{DeviceRef, ServiceRef};
use homeport_domain::value::Value;

use crate::state::AppState;

/// A hub notification as sent to SSE clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    Changed {
        service: ServiceRef,
        value: String,
        headers: BTreeMap<String, String>,
    },
    DeviceAttached {
        device: DeviceRef,
    },
    DeviceDetached {
        device: DeviceRef,
    },
}

impl HubEvent {
    fn changed(service: &ServiceRef, value: &Value) -> Self {
        Self::Changed {
            service: service.clone(),
            value: String::from_utf8_lossy(value.body()).into_owned(),
            headers: value
                .headers()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Capacity of the event channel feeding `/api/events` subscribers.
pub const EVENT_CAPACITY: usize = 256;

/// Create the event channel shared by the hub listener and the handlers.
#[must_use]
pub fn channel() -> broadcast::Sender<HubEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Build a listener forwarding every notification into `sender`.
///
/// Notifications are dropped while nobody is subscribed to the channel.
#[must_use]
pub fn listener(sender: &broadcast::Sender<HubEvent>) -> Listener {
    let on_change = sender.clone();
    let on_attached = sender.clone();
    let on_detached = sender.clone();
    Listener::new()
        .on_change(move |service, value| {
            let _ = on_change.send(HubEvent::changed(service, value));
        })
        .on_device_attached(move |device| {
            let _ = on_attached.send(HubEvent::DeviceAttached {
                device: device.clone(),
            });
        })
        .on_device_detached(move |device| {
            let _ = on_detached.send(HubEvent::DeviceDetached {
                device: device.clone(),
            });
        })
}

/// `GET /api/events`: SSE stream of value changes and device arrivals and
/// departures.
///
/// Each event is sent as a JSON `data:` frame. The stream continues until
/// the client disconnects or the event listener is dropped.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let receiver = match state.events.upgrade() {
        Some(sender) => sender.subscribe(),
        // already closed: the stream ends right away
        None => broadcast::channel(1).1,
    };
    let events = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize hub event for SSE stream");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some events were dropped");
            None
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
