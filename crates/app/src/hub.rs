//! The controller: owner of the live tree and the only place it is mutated.
//!
//! A [`Hub`] bundles the entity [`Store`], the [`Listeners`] and the
//! [`Marshal`] of one configuration. Producer threads reach it through
//! [`HubHandle`]s; the hub drains the marshal on each loop iteration and
//! dispatches every item synchronously before waiting again.

use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle;

use homeport_domain::error::{HubError, Rejected};
use homeport_domain::id::{HubId, ListenerId};
use homeport_domain::model::{Adapter, Device, Parameter, Service};
use homeport_domain::reference::{AdapterRef, DeviceRef, ParameterRef, ServiceRef};
use homeport_domain::request::{Request, Response};
use homeport_domain::store::Store;
use homeport_domain::value::Value;

use crate::engine::{self, Dispatch};
use crate::handle::HubHandle;
use crate::listener::{Listener, Listeners};
use crate::marshal::{Batch, Change, DeviceEvent, Marshal};

/// Name of the thread started by [`Hub::spawn`].
pub const CONTROLLER_THREAD: &str = "homeport-controller";

/// One running configuration.
pub struct Hub {
    id: HubId,
    store: Store,
    listeners: Listeners,
    marshal: Arc<Marshal>,
}

impl Default for Hub {
    fn default() -> Self {
        let id = HubId::new();
        Self {
            id,
            store: Store::new(id),
            listeners: Listeners::default(),
            marshal: Arc::new(Marshal::default()),
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("id", &self.id)
            .field("store", &self.store.counts())
            .field("listeners", &self.listeners.len())
            .field("pending", &self.marshal.pending())
            .finish()
    }
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn id(&self) -> HubId {
        self.id
    }

    /// A new cross-thread handle onto this hub.
    #[must_use]
    pub fn handle(&self) -> HubHandle {
        HubHandle::new(self.id, Arc::clone(&self.marshal))
    }

    /// Read access to the live tree.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Write access to attributes, actions and user data.
    ///
    /// Structural changes made through the store directly do not emit
    /// device notifications; prefer the `attach_*`/`detach_*` methods.
    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    #[must_use]
    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    fn notify_device(&self, event: DeviceEvent) {
        if let Err(err) = self.marshal.device(event) {
            tracing::debug!(error = %err, "device notification dropped");
        }
    }

    // --- structure ---

    /// Attach an adapter and announce each of its devices.
    ///
    /// # Errors
    ///
    /// See [`Store::attach_adapter`].
    pub fn attach_adapter(&mut self, adapter: Adapter) -> Result<AdapterRef, Rejected<Adapter>> {
        let reference = self.store.attach_adapter(adapter)?;
        let devices = self.store.devices(&reference).unwrap_or_default();
        tracing::info!(adapter = %reference, devices = devices.len(), "adapter attached");
        for device in devices {
            self.notify_device(DeviceEvent::Attached(device));
        }
        Ok(reference)
    }

    /// Attach a device and announce it.
    ///
    /// # Errors
    ///
    /// See [`Store::attach_device`].
    pub fn attach_device(
        &mut self,
        adapter: &AdapterRef,
        device: Device,
    ) -> Result<DeviceRef, Rejected<Device>> {
        let reference = self.store.attach_device(adapter, device)?;
        tracing::debug!(device = %reference, "device attached");
        self.notify_device(DeviceEvent::Attached(reference.clone()));
        Ok(reference)
    }

    /// # Errors
    ///
    /// See [`Store::attach_service`].
    pub fn attach_service(
        &mut self,
        device: &DeviceRef,
        service: Service,
    ) -> Result<ServiceRef, Rejected<Service>> {
        let reference = self.store.attach_service(device, service)?;
        tracing::debug!(service = %reference, "service attached");
        Ok(reference)
    }

    /// # Errors
    ///
    /// See [`Store::attach_parameter`].
    pub fn attach_parameter(
        &mut self,
        service: &ServiceRef,
        parameter: Parameter,
    ) -> Result<ParameterRef, Rejected<Parameter>> {
        self.store.attach_parameter(service, parameter)
    }

    /// Detach an adapter and announce the departure of each of its devices.
    ///
    /// # Errors
    ///
    /// See [`Store::detach_adapter`].
    pub fn detach_adapter(&mut self, adapter: &AdapterRef) -> Result<Adapter, HubError> {
        let devices = self.store.devices(adapter).unwrap_or_default();
        let owned = self.store.detach_adapter(adapter)?;
        tracing::info!(adapter = %adapter, devices = devices.len(), "adapter detached");
        for device in devices {
            self.notify_device(DeviceEvent::Detached(device));
        }
        Ok(owned)
    }

    /// Detach a device and announce its departure.
    ///
    /// # Errors
    ///
    /// See [`Store::detach_device`].
    pub fn detach_device(&mut self, device: &DeviceRef) -> Result<Device, HubError> {
        let owned = self.store.detach_device(device)?;
        tracing::debug!(device = %device, "device detached");
        self.notify_device(DeviceEvent::Detached(device.clone()));
        Ok(owned)
    }

    /// # Errors
    ///
    /// See [`Store::detach_service`].
    pub fn detach_service(&mut self, service: &ServiceRef) -> Result<Service, HubError> {
        self.store.detach_service(service)
    }

    /// # Errors
    ///
    /// See [`Store::detach_parameter`].
    pub fn detach_parameter(&mut self, parameter: &ParameterRef) -> Result<Parameter, HubError> {
        self.store.detach_parameter(parameter)
    }

    // --- listeners ---

    /// # Errors
    ///
    /// See [`Listeners::subscribe`].
    pub fn subscribe(&mut self, listener: Listener) -> Result<ListenerId, HubError> {
        self.listeners.subscribe(listener)
    }

    /// # Errors
    ///
    /// See [`Listeners::unsubscribe`].
    pub fn unsubscribe(&mut self, id: ListenerId) -> Result<Listener, HubError> {
        self.listeners.unsubscribe(id)
    }

    /// Replay an attach notification for every live device to one listener.
    ///
    /// This may double up with an attach notification still queued in the
    /// marshal.
    ///
    /// # Errors
    ///
    /// See [`Listeners::replay_attached`].
    pub fn for_each_attached(&mut self, id: ListenerId) -> Result<usize, HubError> {
        let devices = self.store.all_devices();
        self.listeners.replay_attached(id, &devices)
    }

    // --- submissions from the controller thread ---

    /// Same as [`HubHandle::changed`].
    ///
    /// # Errors
    ///
    /// See [`HubHandle::changed`].
    pub fn changed(&self, service: ServiceRef, value: Value) -> Result<(), HubError> {
        self.handle().changed(service, value)
    }

    /// Same as [`HubHandle::request`]. Dispatch happens on a later iteration.
    ///
    /// # Errors
    ///
    /// See [`HubHandle::request`].
    pub fn request(&self, request: Request) -> Result<(), HubError> {
        self.handle().request(request)
    }

    /// Same as [`HubHandle::respond`].
    ///
    /// # Errors
    ///
    /// See [`HubHandle::respond`].
    pub fn respond(&self, response: Response) -> Result<(), HubError> {
        self.handle().respond(response)
    }

    // --- controller loop ---

    fn handle_request(&mut self, request: Request) {
        let service = request.service().clone();
        let method = request.method();
        let (dispatch, response) = engine::dispatch(&mut self.store, request);
        match dispatch {
            Dispatch::NotFound | Dispatch::MethodNotAllowed => {
                tracing::debug!(%service, %method, %dispatch, "request rejected");
            }
            Dispatch::Completed(_) | Dispatch::Pending => {
                tracing::trace!(%service, %method, %dispatch, "request dispatched");
            }
        }
        if let Some(response) = response
            && let Err(err) = self.marshal.response(response)
        {
            tracing::warn!(%service, error = %err, "response dropped");
        }
    }

    fn handle_response(response: Response) {
        let status = response.status();
        let service = response.service().clone();
        if !response.complete() {
            tracing::trace!(%service, %status, "response without callback");
        }
    }

    fn handle_batch(&mut self, batch: Batch) {
        let Batch {
            tasks,
            devices,
            changes,
            requests,
            responses,
        } = batch;

        for task in tasks {
            task(self);
        }
        for event in devices {
            match event {
                DeviceEvent::Attached(device) => {
                    self.listeners.attached(&device);
                }
                DeviceEvent::Detached(device) => {
                    self.listeners.detached(&device);
                }
            }
        }
        for Change { service, value } in changes {
            let delivered = self.listeners.changed(&service, &value);
            tracing::trace!(%service, delivered, "value changed");
        }
        for request in requests {
            self.handle_request(request);
        }
        for response in responses {
            Self::handle_response(response);
        }
    }

    /// Drain one snapshot of every queue and dispatch it.
    ///
    /// Work submitted while this runs is left for the next call. Returns the
    /// number of items handled.
    pub fn run_pending(&mut self) -> usize {
        let batch = self.marshal.drain();
        let count = batch.len();
        if count > 0 {
            tracing::trace!(count, "draining marshal");
            self.handle_batch(batch);
        }
        count
    }

    /// Run [`run_pending`](Self::run_pending) until nothing is left,
    /// including work queued by the items themselves.
    pub fn run_until_idle(&mut self) -> usize {
        let mut total = 0;
        loop {
            let count = self.run_pending();
            if count == 0 {
                return total;
            }
            total += count;
        }
    }

    /// Reactor loop: drain on every wake until `signal` resolves or a stop
    /// is requested through a handle.
    pub async fn run_until<F: Future>(&mut self, signal: F) {
        let marshal = Arc::clone(&self.marshal);
        tokio::pin!(signal);
        tracing::info!(hub = %self.id, "controller loop started");
        loop {
            self.run_pending();
            if marshal.stop_requested() {
                break;
            }
            tokio::select! {
                () = marshal.notified() => {}
                _ = &mut signal => break,
            }
        }
        tracing::info!(hub = %self.id, "controller loop stopped");
    }

    /// Reactor loop that only returns on [`HubHandle::stop`].
    pub async fn run(&mut self) {
        self.run_until(std::future::pending::<()>()).await;
    }

    /// Close the marshal and free everything the hub owns.
    ///
    /// Queued items are dropped without running their callbacks. Every
    /// handle reports [`HubError::NotRunning`] afterwards.
    pub fn shutdown(&mut self) {
        let leftover = self.marshal.close();
        let dropped = leftover.len();
        drop(leftover);
        let adapters = self.store.clear();
        let listeners = self.listeners.clear();
        tracing::info!(hub = %self.id, dropped, adapters, listeners, "hub shut down");
    }

    /// Move the hub onto its own controller thread.
    ///
    /// The thread runs a current-thread tokio runtime, loops until
    /// [`HubHandle::stop`] and then shuts the hub down.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Allocation`] if the runtime or thread cannot be
    /// created.
    pub fn spawn(mut self) -> Result<Controller, HubError> {
        let handle = self.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(|_| HubError::Allocation("controller runtime"))?;
        let thread = std::thread::Builder::new()
            .name(CONTROLLER_THREAD.to_string())
            .spawn(move || {
                runtime.block_on(self.run());
                self.shutdown();
            })
            .map_err(|_| HubError::Allocation("controller thread"))?;
        Ok(Controller {
            handle,
            thread: Some(thread),
        })
    }
}

/// A hub running on its own thread.
///
/// Dropping the controller stops the loop and joins the thread.
#[derive(Debug)]
pub struct Controller {
    handle: HubHandle,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    #[must_use]
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// Stop the loop and wait for the hub to shut down.
    pub fn stop(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.handle.stop();
        if thread.join().is_err() {
            tracing::error!("controller thread panicked");
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.join();
    }
}
