//! Listener Registry and notification fan-out.
//!
//! Delivery is global per configuration: every subscribed listener whose
//! matching callback is set receives every notification, in subscription
//! order. Listeners are not scoped to a subtree.

use std::fmt;

use homeport_domain::error::{ArgumentError, EntityKind, HubError};
use homeport_domain::id::ListenerId;
use homeport_domain::reference::{DeviceRef, ServiceRef};
use homeport_domain::value::Value;

/// Called with the service and its new value.
pub type ChangeCallback = Box<dyn FnMut(&ServiceRef, &Value) + Send>;

/// Called with a device that entered or left the tree.
pub type DeviceCallback = Box<dyn FnMut(&DeviceRef) + Send>;

/// A set of optional callbacks.
///
/// State captured by the closures is the listener's user data; it is freed
/// when the listener is dropped after [`Listeners::unsubscribe`] or at hub
/// shutdown.
#[derive(Default)]
pub struct Listener {
    on_change: Option<ChangeCallback>,
    on_attached: Option<DeviceCallback>,
    on_detached: Option<DeviceCallback>,
}

impl Listener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ServiceRef, &Value) + Send + 'static,
    {
        self.on_change = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_device_attached<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&DeviceRef) + Send + 'static,
    {
        self.on_attached = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_device_detached<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&DeviceRef) + Send + 'static,
    {
        self.on_detached = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn has_callbacks(&self) -> bool {
        self.on_change.is_some() || self.on_attached.is_some() || self.on_detached.is_some()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("on_change", &self.on_change.is_some())
            .field("on_device_attached", &self.on_attached.is_some())
            .field("on_device_detached", &self.on_detached.is_some())
            .finish()
    }
}

/// Subscribed listeners of one configuration, in subscription order.
#[derive(Debug, Default)]
pub struct Listeners {
    entries: Vec<(ListenerId, Listener)>,
}

impl Listeners {
    /// Register `listener`.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::NoCallbacks`] if no callback is set.
    pub fn subscribe(&mut self, listener: Listener) -> Result<ListenerId, HubError> {
        if !listener.has_callbacks() {
            return Err(ArgumentError::NoCallbacks.into());
        }
        let id = ListenerId::new();
        self.entries.push((id, listener));
        tracing::debug!(listener = %id, total = self.entries.len(), "listener subscribed");
        Ok(id)
    }

    /// Remove a listener and give it back to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotAttached`] if `id` is not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> Result<Listener, HubError> {
        let position = self
            .entries
            .iter()
            .position(|(entry, _)| *entry == id)
            .ok_or_else(|| HubError::NotAttached {
                kind: EntityKind::Listener,
                id: id.to_string(),
            })?;
        let (_, listener) = self.entries.remove(position);
        tracing::debug!(listener = %id, "listener unsubscribed");
        Ok(listener)
    }

    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fan a value change out to every `on_change` callback.
    ///
    /// Returns the number of callbacks invoked.
    pub fn changed(&mut self, service: &ServiceRef, value: &Value) -> usize {
        let mut delivered = 0;
        for (_, listener) in &mut self.entries {
            if let Some(callback) = listener.on_change.as_mut() {
                callback(service, value);
                delivered += 1;
            }
        }
        delivered
    }

    /// Fan a device attach out to every `on_device_attached` callback.
    pub fn attached(&mut self, device: &DeviceRef) -> usize {
        let mut delivered = 0;
        for (_, listener) in &mut self.entries {
            if let Some(callback) = listener.on_attached.as_mut() {
                callback(device);
                delivered += 1;
            }
        }
        delivered
    }

    /// Fan a device detach out to every `on_device_detached` callback.
    pub fn detached(&mut self, device: &DeviceRef) -> usize {
        let mut delivered = 0;
        for (_, listener) in &mut self.entries {
            if let Some(callback) = listener.on_detached.as_mut() {
                callback(device);
                delivered += 1;
            }
        }
        delivered
    }

    /// Replay one attach notification per device to a single listener.
    ///
    /// Returns the number of calls made; zero if the listener has no
    /// `on_device_attached` callback.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotAttached`] if `id` is not subscribed.
    pub fn replay_attached(&mut self, id: ListenerId, devices: &[DeviceRef]) -> Result<usize, HubError> {
        let (_, listener) = self
            .entries
            .iter_mut()
            .find(|(entry, _)| *entry == id)
            .ok_or_else(|| HubError::NotAttached {
                kind: EntityKind::Listener,
                id: id.to_string(),
            })?;
        let Some(callback) = listener.on_attached.as_mut() else {
            return Ok(0);
        };
        for device in devices {
            callback(device);
        }
        Ok(devices.len())
    }

    /// Drop every listener, returning how many were subscribed.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use homeport_domain::id::HubId;

    use super::*;

    fn service(id: &str) -> ServiceRef {
        ServiceRef::new(HubId::new(), "a", "d", id).unwrap()
    }

    #[test]
    fn should_reject_listener_without_callbacks() {
        let mut listeners = Listeners::default();
        let result = listeners.subscribe(Listener::new());
        assert!(matches!(
            result,
            Err(HubError::Argument(ArgumentError::NoCallbacks))
        ));
        assert!(listeners.is_empty());
    }

    #[test]
    fn should_deliver_change_only_to_listeners_with_change_callback() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();
        for name in ["first", "second"] {
            let sink = Arc::clone(&calls);
            listeners
                .subscribe(Listener::new().on_change(move |service, value| {
                    sink.lock().unwrap().push(format!(
                        "{name}:{service}:{}",
                        value.as_text().unwrap_or_default()
                    ));
                }))
                .unwrap();
        }
        listeners
            .subscribe(Listener::new().on_device_attached(|_| {}))
            .unwrap();

        let delivered = listeners.changed(&service("s"), &Value::text("1"));

        assert_eq!(delivered, 2);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["first:a/d/s:1".to_string(), "second:a/d/s:1".to_string()]
        );
    }

    #[test]
    fn should_route_attach_and_detach_to_matching_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let attached = Arc::clone(&seen);
        let detached = Arc::clone(&seen);
        let mut listeners = Listeners::default();
        listeners
            .subscribe(
                Listener::new()
                    .on_device_attached(move |d| attached.lock().unwrap().push(format!("+{d}")))
                    .on_device_detached(move |d| detached.lock().unwrap().push(format!("-{d}"))),
            )
            .unwrap();
        let device = service("s").device().clone();

        listeners.attached(&device);
        listeners.detached(&device);

        assert_eq!(*seen.lock().unwrap(), vec!["+a/d", "-a/d"]);
    }

    #[test]
    fn should_return_listener_when_unsubscribed() {
        let mut listeners = Listeners::default();
        let id = listeners
            .subscribe(Listener::new().on_change(|_, _| {}))
            .unwrap();

        let listener = listeners.unsubscribe(id).unwrap();

        assert!(listener.has_callbacks());
        assert!(!listeners.contains(id));
        assert!(matches!(
            listeners.unsubscribe(id),
            Err(HubError::NotAttached {
                kind: EntityKind::Listener,
                ..
            })
        ));
    }

    #[test]
    fn should_replay_attached_devices_to_single_listener() {
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let mut listeners = Listeners::default();
        let target = listeners
            .subscribe(Listener::new().on_device_attached(move |_| *sink.lock().unwrap() += 1))
            .unwrap();
        let other = listeners
            .subscribe(Listener::new().on_device_attached(|_| panic!("must not be called")))
            .unwrap();
        let devices = vec![
            DeviceRef::new(HubId::new(), "a", "d0").unwrap(),
            DeviceRef::new(HubId::new(), "a", "d1").unwrap(),
        ];

        let replayed = listeners.replay_attached(target, &devices).unwrap();

        assert_eq!(replayed, 2);
        assert_eq!(*count.lock().unwrap(), 2);
        assert!(listeners.contains(other));
    }

    #[test]
    fn should_drop_captured_state_when_cleared() {
        let state = Arc::new(());
        let captured = Arc::clone(&state);
        let mut listeners = Listeners::default();
        listeners
            .subscribe(Listener::new().on_change(move |_, _| {
                let _ = &captured;
            }))
            .unwrap();
        assert_eq!(Arc::strong_count(&state), 2);

        assert_eq!(listeners.clear(), 1);

        assert_eq!(Arc::strong_count(&state), 1);
    }
}
