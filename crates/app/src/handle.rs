//! Cross-thread face of a running hub.
//!
//! A [`HubHandle`] is cheap to clone and `Send + Sync`. Every call copies its
//! payload into the [`Marshal`] and returns immediately; results, if any,
//! arrive later through a callback run on the controller thread.

use std::sync::Arc;

use homeport_domain::error::{ArgumentError, HubError};
use homeport_domain::id::HubId;
use homeport_domain::reference::{AdapterRef, DeviceRef, ParameterRef, ServiceRef};
use homeport_domain::request::{Request, Response};
use homeport_domain::value::Value;
use tokio::sync::oneshot;

use crate::hub::Hub;
use crate::marshal::{Change, DeviceEvent, Marshal};

/// Cloneable handle used by producer threads to reach the controller.
#[derive(Clone)]
pub struct HubHandle {
    hub: HubId,
    marshal: Arc<Marshal>,
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("hub", &self.hub)
            .field("closed", &self.marshal.is_closed())
            .finish()
    }
}

impl HubHandle {
    pub(crate) fn new(hub: HubId, marshal: Arc<Marshal>) -> Self {
        Self { hub, marshal }
    }

    /// Configuration this handle submits to.
    #[must_use]
    pub fn id(&self) -> HubId {
        self.hub
    }

    /// `false` once the hub has shut down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.marshal.is_closed()
    }

    fn check(&self, hub: HubId) -> Result<(), HubError> {
        if hub == self.hub {
            Ok(())
        } else {
            Err(ArgumentError::ForeignConfiguration.into())
        }
    }

    /// Reference to adapter `adapter` of this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is invalid.
    pub fn adapter(&self, adapter: &str) -> Result<AdapterRef, HubError> {
        AdapterRef::new(self.hub, adapter)
    }

    /// Reference to a device of this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier is invalid.
    pub fn device(&self, adapter: &str, device: &str) -> Result<DeviceRef, HubError> {
        DeviceRef::new(self.hub, adapter, device)
    }

    /// Reference to a service of this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier is invalid.
    pub fn service(&self, adapter: &str, device: &str, service: &str) -> Result<ServiceRef, HubError> {
        ServiceRef::new(self.hub, adapter, device, service)
    }

    /// Reference to a parameter of this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an identifier is invalid.
    pub fn parameter(
        &self,
        adapter: &str,
        device: &str,
        service: &str,
        parameter: &str,
    ) -> Result<ParameterRef, HubError> {
        ParameterRef::new(self.hub, adapter, device, service, parameter)
    }

    /// Notify every listener that `service` now has `value`.
    ///
    /// The service does not need to be attached.
    ///
    /// # Errors
    ///
    /// - [`ArgumentError::ForeignConfiguration`] for a reference minted elsewhere
    /// - [`HubError::NotRunning`] after shutdown
    pub fn changed(&self, service: ServiceRef, value: Value) -> Result<(), HubError> {
        self.check(service.hub())?;
        self.marshal.change(Change { service, value })
    }

    /// Notify every listener that `device` entered the tree.
    ///
    /// # Errors
    ///
    /// See [`changed`](Self::changed).
    pub fn device_attached(&self, device: DeviceRef) -> Result<(), HubError> {
        self.check(device.hub())?;
        self.marshal.device(DeviceEvent::Attached(device))
    }

    /// Notify every listener that `device` left the tree.
    ///
    /// # Errors
    ///
    /// See [`changed`](Self::changed).
    pub fn device_detached(&self, device: DeviceRef) -> Result<(), HubError> {
        self.check(device.hub())?;
        self.marshal.device(DeviceEvent::Detached(device))
    }

    /// Submit a request for dispatch on the controller.
    ///
    /// # Errors
    ///
    /// See [`changed`](Self::changed). On error the request is dropped and
    /// its callback never runs.
    pub fn request(&self, request: Request) -> Result<(), HubError> {
        self.check(request.service().hub())?;
        self.marshal.request(request)
    }

    /// Send the answer to a deferred request.
    ///
    /// # Errors
    ///
    /// See [`changed`](Self::changed).
    pub fn respond(&self, response: Response) -> Result<(), HubError> {
        self.check(response.service().hub())?;
        self.marshal.response(response)
    }

    /// Run `task` on the controller with exclusive access to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] after shutdown.
    pub fn execute<F>(&self, task: F) -> Result<(), HubError>
    where
        F: FnOnce(&mut Hub) + Send + 'static,
    {
        self.marshal.task(Box::new(task))
    }

    /// Run `task` on the controller and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] if the hub shuts down before the
    /// task runs.
    pub async fn query<F, T>(&self, task: F) -> Result<T, HubError>
    where
        F: FnOnce(&mut Hub) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        self.execute(move |hub| {
            // the caller may have given up waiting
            let _ = sender.send(task(hub));
        })?;
        receiver.await.map_err(|_| HubError::NotRunning)
    }

    /// Ask the controller loop to return.
    pub fn stop(&self) {
        self.marshal.request_stop();
    }
}

#[cfg(test)]
mod tests {
    use homeport_domain::method::Method;

    use super::*;

    #[test]
    fn should_mint_references_for_own_configuration() {
        let hub = Hub::new();
        let handle = hub.handle();
        let service = handle.service("a", "d", "s").unwrap();
        assert_eq!(service.hub(), hub.id());
        assert_eq!(service.to_string(), "a/d/s");
    }

    #[test]
    fn should_reject_foreign_reference() {
        let hub = Hub::new();
        let foreign = ServiceRef::new(HubId::new(), "a", "d", "s").unwrap();

        let result = hub.handle().changed(foreign.clone(), Value::default());
        assert!(matches!(
            result,
            Err(HubError::Argument(ArgumentError::ForeignConfiguration))
        ));
        let result = hub.handle().respond(Response::new(
            Request::detached(foreign, Method::Get),
            homeport_domain::status::Status::OK,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn should_report_not_running_after_shutdown() {
        let mut hub = Hub::new();
        let handle = hub.handle();
        hub.shutdown();

        assert!(!handle.is_running());
        let service = handle.service("a", "d", "s").unwrap();
        assert!(matches!(
            handle.changed(service, Value::default()),
            Err(HubError::NotRunning)
        ));
        assert!(matches!(handle.execute(|_| {}), Err(HubError::NotRunning)));
    }

    #[tokio::test]
    async fn should_return_query_result_from_controller() {
        let controller = Hub::new().spawn().unwrap();
        let handle = controller.handle();

        let id = handle.query(|hub| hub.id()).await.unwrap();

        assert_eq!(id, handle.id());
        controller.stop();
    }
}
