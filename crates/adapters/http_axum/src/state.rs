//! Shared application state for axum handlers.

use homeport_app::handle::HubHandle;
use tokio::sync::broadcast;

use crate::api::events::HubEvent;

/// Application state shared across all axum handlers.
///
/// Handlers never touch the hub directly: every read or write goes through
/// the [`HubHandle`] and is carried out on the controller.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Cross-thread handle to the running hub.
    pub handle: HubHandle,
    /// Event channel feeding `/api/events`. Held weakly so that open
    /// streams end once the hub listener owning the sender is dropped.
    pub events: broadcast::WeakSender<HubEvent>,
}

impl AppState {
    #[must_use]
    pub fn new(handle: HubHandle, events: &broadcast::Sender<HubEvent>) -> Self {
        Self {
            handle,
            events: events.downgrade(),
        }
    }
}
