//! Entity Store: the live hierarchy of one configuration.
//!
//! Attached entities live in per-kind generational arenas. Parents keep the
//! ordered list of their children's keys and children keep their parent's
//! key, so attach and detach are index-table updates. Detaching rebuilds
//! the owned subtree ([`Adapter`], [`Device`], ...) and hands it back.
//!
//! Everything here runs on the controller thread; other threads address
//! entities through [`reference`](crate::reference) values.

use std::sync::Arc;

use crate::arena::{Arena, Key};
use crate::attribute::Attributes;
use crate::error::{EntityKind, HubError, NotFoundError, Rejected};
use crate::id::HubId;
use crate::method::Method;
use crate::model::{Action, Actions, Adapter, Device, Parameter, Service, UserData};
use crate::reference::{AdapterRef, DeviceRef, ParameterRef, Reference, ServiceRef};
use crate::request::{Outcome, Request};

#[derive(Debug)]
struct AdapterNode {
    id: String,
    attributes: Attributes,
    data: Option<UserData>,
    devices: Vec<Key>,
}

#[derive(Debug)]
struct DeviceNode {
    id: String,
    parent: Key,
    attributes: Attributes,
    data: Option<UserData>,
    services: Vec<Key>,
}

#[derive(Debug)]
struct ServiceNode {
    id: String,
    parent: Key,
    attributes: Attributes,
    actions: Actions,
    data: Option<UserData>,
    parameters: Vec<Key>,
}

#[derive(Debug)]
struct ParameterNode {
    id: String,
    parent: Key,
    attributes: Attributes,
}

trait Named {
    fn name(&self) -> &str;
}

macro_rules! impl_named {
    ($($ty:ty),*) => {
        $(
            impl Named for $ty {
                fn name(&self) -> &str {
                    &self.id
                }
            }
        )*
    };
}

impl_named!(AdapterNode, DeviceNode, ServiceNode, ParameterNode);

/// A resolved entity.
#[derive(Debug, Clone, Copy)]
enum Node {
    Adapter(Key),
    Device(Key),
    Service(Key),
    Parameter(Key),
}

fn find<T: Named>(arena: &Arena<T>, keys: &[Key], id: &str) -> Option<Key> {
    keys.iter()
        .copied()
        .find(|key| arena.get(*key).is_some_and(|node| node.name() == id))
}

fn next_after(keys: &[Key], key: Key) -> Option<Key> {
    let position = keys.iter().position(|k| *k == key)?;
    keys.get(position + 1).copied()
}

fn not_found<R: Reference + ?Sized>(reference: &R) -> HubError {
    NotFoundError::new(reference.kind(), reference).into()
}

fn not_attached<R: Reference + ?Sized>(reference: &R) -> HubError {
    HubError::NotAttached {
        kind: reference.kind(),
        id: reference.to_string(),
    }
}

fn not_unique(kind: EntityKind, id: &str) -> HubError {
    HubError::NotUnique {
        kind,
        id: id.to_string(),
    }
}

/// The live entity tree of one configuration.
#[derive(Debug)]
pub struct Store {
    hub: HubId,
    adapters: Vec<Key>,
    adapter_nodes: Arena<AdapterNode>,
    devices: Arena<DeviceNode>,
    services: Arena<ServiceNode>,
    parameters: Arena<ParameterNode>,
}

impl Store {
    #[must_use]
    pub fn new(hub: HubId) -> Self {
        Self {
            hub,
            adapters: Vec::new(),
            adapter_nodes: Arena::default(),
            devices: Arena::default(),
            services: Arena::default(),
            parameters: Arena::default(),
        }
    }

    /// Configuration this store belongs to.
    #[must_use]
    pub fn hub(&self) -> HubId {
        self.hub
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Number of live entities of each kind: adapters, devices, services, parameters.
    #[must_use]
    pub fn counts(&self) -> [usize; 4] {
        [
            self.adapter_nodes.len(),
            self.devices.len(),
            self.services.len(),
            self.parameters.len(),
        ]
    }

    // --- resolution ---

    fn locate<R: Reference + ?Sized>(&self, reference: &R) -> Option<Node> {
        if reference.hub() != self.hub {
            return None;
        }
        let segments = reference.segments();
        let mut segments = segments.into_iter();

        let adapter = find(&self.adapter_nodes, &self.adapters, segments.next()?)?;
        let Some(id) = segments.next() else {
            return Some(Node::Adapter(adapter));
        };
        let device = find(&self.devices, &self.adapter_nodes.get(adapter)?.devices, id)?;
        let Some(id) = segments.next() else {
            return Some(Node::Device(device));
        };
        let service = find(&self.services, &self.devices.get(device)?.services, id)?;
        let Some(id) = segments.next() else {
            return Some(Node::Service(service));
        };
        let parameter = find(&self.parameters, &self.services.get(service)?.parameters, id)?;
        Some(Node::Parameter(parameter))
    }

    fn adapter_key(&self, reference: &AdapterRef) -> Option<Key> {
        match self.locate(reference)? {
            Node::Adapter(key) => Some(key),
            _ => None,
        }
    }

    fn device_key(&self, reference: &DeviceRef) -> Option<Key> {
        match self.locate(reference)? {
            Node::Device(key) => Some(key),
            _ => None,
        }
    }

    fn service_key(&self, reference: &ServiceRef) -> Option<Key> {
        match self.locate(reference)? {
            Node::Service(key) => Some(key),
            _ => None,
        }
    }

    fn parameter_key(&self, reference: &ParameterRef) -> Option<Key> {
        match self.locate(reference)? {
            Node::Parameter(key) => Some(key),
            _ => None,
        }
    }

    /// Whether `reference` resolves to a live entity.
    #[must_use]
    pub fn contains<R: Reference + ?Sized>(&self, reference: &R) -> bool {
        self.locate(reference).is_some()
    }

    /// Resolve `reference`, failing with `NotFound` if it is not live.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the entity is not attached.
    pub fn resolve<R: Reference + ?Sized>(&self, reference: &R) -> Result<(), HubError> {
        self.locate(reference)
            .map(|_| ())
            .ok_or_else(|| not_found(reference))
    }

    // --- attach ---

    fn insert_parameter(&mut self, parent: Key, parameter: Parameter) -> Key {
        let Parameter { id, attributes } = parameter;
        self.parameters.insert(ParameterNode {
            id,
            parent,
            attributes,
        })
    }

    fn insert_service(&mut self, parent: Key, service: Service) -> Key {
        let Service {
            id,
            attributes,
            actions,
            data,
            parameters,
        } = service;
        let key = self.services.insert(ServiceNode {
            id,
            parent,
            attributes,
            actions,
            data,
            parameters: Vec::new(),
        });
        let children: Vec<Key> = parameters
            .into_iter()
            .map(|parameter| self.insert_parameter(key, parameter))
            .collect();
        if let Some(node) = self.services.get_mut(key) {
            node.parameters = children;
        }
        key
    }

    fn insert_device(&mut self, parent: Key, device: Device) -> Key {
        let Device {
            id,
            attributes,
            data,
            services,
        } = device;
        let key = self.devices.insert(DeviceNode {
            id,
            parent,
            attributes,
            data,
            services: Vec::new(),
        });
        let children: Vec<Key> = services
            .into_iter()
            .map(|service| self.insert_service(key, service))
            .collect();
        if let Some(node) = self.devices.get_mut(key) {
            node.services = children;
        }
        key
    }

    fn insert_adapter(&mut self, adapter: Adapter) -> Key {
        let Adapter {
            id,
            attributes,
            data,
            devices,
        } = adapter;
        let key = self.adapter_nodes.insert(AdapterNode {
            id,
            attributes,
            data,
            devices: Vec::new(),
        });
        let children: Vec<Key> = devices
            .into_iter()
            .map(|device| self.insert_device(key, device))
            .collect();
        if let Some(node) = self.adapter_nodes.get_mut(key) {
            node.devices = children;
        }
        key
    }

    /// Attach `adapter` and everything it owns to the configuration.
    ///
    /// # Errors
    ///
    /// Hands the adapter back with [`HubError::NotUnique`] if a live
    /// adapter already uses its identifier. The tree is left unchanged.
    pub fn attach_adapter(&mut self, adapter: Adapter) -> Result<AdapterRef, Rejected<Adapter>> {
        if find(&self.adapter_nodes, &self.adapters, &adapter.id).is_some() {
            let error = not_unique(EntityKind::Adapter, &adapter.id);
            return Err(Rejected::new(error, adapter));
        }
        let reference = AdapterRef::trusted(self.hub, &adapter.id);
        let key = self.insert_adapter(adapter);
        self.adapters.push(key);
        Ok(reference)
    }

    /// Attach `device` under the live adapter `parent`.
    ///
    /// # Errors
    ///
    /// Hands the device back with [`HubError::NotAttached`] if `parent` is
    /// not live, or [`HubError::NotUnique`] on a sibling collision.
    pub fn attach_device(
        &mut self,
        parent: &AdapterRef,
        device: Device,
    ) -> Result<DeviceRef, Rejected<Device>> {
        let Some(parent_key) = self.adapter_key(parent) else {
            return Err(Rejected::new(not_attached(parent), device));
        };
        let siblings = self
            .adapter_nodes
            .get(parent_key)
            .map(|node| node.devices.as_slice())
            .unwrap_or_default();
        if find(&self.devices, siblings, &device.id).is_some() {
            let error = not_unique(EntityKind::Device, &device.id);
            return Err(Rejected::new(error, device));
        }
        let reference = parent.trusted_device(&device.id);
        let key = self.insert_device(parent_key, device);
        if let Some(node) = self.adapter_nodes.get_mut(parent_key) {
            node.devices.push(key);
        }
        Ok(reference)
    }

    /// Attach `service` under the live device `parent`.
    ///
    /// # Errors
    ///
    /// Hands the service back with [`HubError::NotAttached`] if `parent` is
    /// not live, or [`HubError::NotUnique`] on a sibling collision.
    pub fn attach_service(
        &mut self,
        parent: &DeviceRef,
        service: Service,
    ) -> Result<ServiceRef, Rejected<Service>> {
        let Some(parent_key) = self.device_key(parent) else {
            return Err(Rejected::new(not_attached(parent), service));
        };
        let siblings = self
            .devices
            .get(parent_key)
            .map(|node| node.services.as_slice())
            .unwrap_or_default();
        if find(&self.services, siblings, &service.id).is_some() {
            let error = not_unique(EntityKind::Service, &service.id);
            return Err(Rejected::new(error, service));
        }
        let reference = parent.trusted_service(&service.id);
        let key = self.insert_service(parent_key, service);
        if let Some(node) = self.devices.get_mut(parent_key) {
            node.services.push(key);
        }
        Ok(reference)
    }

    /// Attach `parameter` under the live service `parent`.
    ///
    /// # Errors
    ///
    /// Hands the parameter back with [`HubError::NotAttached`] if `parent`
    /// is not live, or [`HubError::NotUnique`] on a sibling collision.
    pub fn attach_parameter(
        &mut self,
        parent: &ServiceRef,
        parameter: Parameter,
    ) -> Result<ParameterRef, Rejected<Parameter>> {
        let Some(parent_key) = self.service_key(parent) else {
            return Err(Rejected::new(not_attached(parent), parameter));
        };
        let siblings = self
            .services
            .get(parent_key)
            .map(|node| node.parameters.as_slice())
            .unwrap_or_default();
        if find(&self.parameters, siblings, &parameter.id).is_some() {
            let error = not_unique(EntityKind::Parameter, &parameter.id);
            return Err(Rejected::new(error, parameter));
        }
        let reference = parent.trusted_parameter(&parameter.id);
        let key = self.insert_parameter(parent_key, parameter);
        if let Some(node) = self.services.get_mut(parent_key) {
            node.parameters.push(key);
        }
        Ok(reference)
    }

    // --- detach ---

    fn remove_parameter(&mut self, key: Key) -> Option<Parameter> {
        let node = self.parameters.remove(key)?;
        Some(Parameter {
            id: node.id,
            attributes: node.attributes,
        })
    }

    fn remove_service(&mut self, key: Key) -> Option<Service> {
        let node = self.services.remove(key)?;
        let parameters = node
            .parameters
            .into_iter()
            .filter_map(|child| self.remove_parameter(child))
            .collect();
        Some(Service {
            id: node.id,
            attributes: node.attributes,
            actions: node.actions,
            data: node.data,
            parameters,
        })
    }

    fn remove_device(&mut self, key: Key) -> Option<Device> {
        let node = self.devices.remove(key)?;
        let services = node
            .services
            .into_iter()
            .filter_map(|child| self.remove_service(child))
            .collect();
        Some(Device {
            id: node.id,
            attributes: node.attributes,
            data: node.data,
            services,
        })
    }

    fn remove_adapter(&mut self, key: Key) -> Option<Adapter> {
        let node = self.adapter_nodes.remove(key)?;
        let devices = node
            .devices
            .into_iter()
            .filter_map(|child| self.remove_device(child))
            .collect();
        Some(Adapter {
            id: node.id,
            attributes: node.attributes,
            data: node.data,
            devices,
        })
    }

    /// Detach a live adapter and return it with its whole subtree.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotAttached`] if the adapter is not live.
    pub fn detach_adapter(&mut self, reference: &AdapterRef) -> Result<Adapter, HubError> {
        let key = self
            .adapter_key(reference)
            .ok_or_else(|| not_attached(reference))?;
        self.adapters.retain(|k| *k != key);
        self.remove_adapter(key)
            .ok_or_else(|| not_attached(reference))
    }

    /// Detach a live device and return it with its services.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotAttached`] if the device is not live.
    pub fn detach_device(&mut self, reference: &DeviceRef) -> Result<Device, HubError> {
        let key = self
            .device_key(reference)
            .ok_or_else(|| not_attached(reference))?;
        let parent = self.devices.get(key).map(|node| node.parent);
        if let Some(node) = parent.and_then(|p| self.adapter_nodes.get_mut(p)) {
            node.devices.retain(|k| *k != key);
        }
        self.remove_device(key)
            .ok_or_else(|| not_attached(reference))
    }

    /// Detach a live service and return it with its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotAttached`] if the service is not live.
    pub fn detach_service(&mut self, reference: &ServiceRef) -> Result<Service, HubError> {
        let key = self
            .service_key(reference)
            .ok_or_else(|| not_attached(reference))?;
        let parent = self.services.get(key).map(|node| node.parent);
        if let Some(node) = parent.and_then(|p| self.devices.get_mut(p)) {
            node.services.retain(|k| *k != key);
        }
        self.remove_service(key)
            .ok_or_else(|| not_attached(reference))
    }

    /// Detach a live parameter.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotAttached`] if the parameter is not live.
    pub fn detach_parameter(&mut self, reference: &ParameterRef) -> Result<Parameter, HubError> {
        let key = self
            .parameter_key(reference)
            .ok_or_else(|| not_attached(reference))?;
        let parent = self.parameters.get(key).map(|node| node.parent);
        if let Some(node) = parent.and_then(|p| self.services.get_mut(p)) {
            node.parameters.retain(|k| *k != key);
        }
        self.remove_parameter(key)
            .ok_or_else(|| not_attached(reference))
    }

    /// Detach and free every live adapter, last attached first.
    ///
    /// Returns the number of adapters freed.
    pub fn clear(&mut self) -> usize {
        let mut freed = 0;
        while let Some(key) = self.adapters.pop() {
            if self.remove_adapter(key).is_some() {
                freed += 1;
            }
        }
        freed
    }

    // --- attributes and user data ---

    fn attributes_of(&self, node: Node) -> Option<&Attributes> {
        match node {
            Node::Adapter(key) => self.adapter_nodes.get(key).map(|n| &n.attributes),
            Node::Device(key) => self.devices.get(key).map(|n| &n.attributes),
            Node::Service(key) => self.services.get(key).map(|n| &n.attributes),
            Node::Parameter(key) => self.parameters.get(key).map(|n| &n.attributes),
        }
    }

    fn attributes_of_mut(&mut self, node: Node) -> Option<&mut Attributes> {
        match node {
            Node::Adapter(key) => self.adapter_nodes.get_mut(key).map(|n| &mut n.attributes),
            Node::Device(key) => self.devices.get_mut(key).map(|n| &mut n.attributes),
            Node::Service(key) => self.services.get_mut(key).map(|n| &mut n.attributes),
            Node::Parameter(key) => self.parameters.get_mut(key).map(|n| &mut n.attributes),
        }
    }

    /// All attributes of a live entity, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the entity is not live.
    pub fn attributes<R: Reference + ?Sized>(&self, reference: &R) -> Result<&Attributes, HubError> {
        self.locate(reference)
            .and_then(|node| self.attributes_of(node))
            .ok_or_else(|| not_found(reference))
    }

    /// Read one attribute of a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the entity is not live.
    pub fn attribute<R: Reference + ?Sized>(
        &self,
        reference: &R,
        key: &str,
    ) -> Result<Option<&str>, HubError> {
        Ok(self.attributes(reference)?.get(key))
    }

    /// Set one attribute of a live entity, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the entity is not live, or the
    /// errors of [`Attributes::set`].
    pub fn set_attribute<R: Reference + ?Sized>(
        &mut self,
        reference: &R,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, HubError> {
        let attributes = self
            .locate(reference)
            .and_then(|node| self.attributes_of_mut(node))
            .ok_or_else(|| not_found(reference))?;
        attributes.set(key, value)
    }

    /// User data of a live entity. Parameters never carry any.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the entity is not live.
    pub fn data_mut<R: Reference + ?Sized>(
        &mut self,
        reference: &R,
    ) -> Result<Option<&mut UserData>, HubError> {
        let data = match self.locate(reference) {
            Some(Node::Adapter(key)) => self.adapter_nodes.get_mut(key).map(|n| n.data.as_mut()),
            Some(Node::Device(key)) => self.devices.get_mut(key).map(|n| n.data.as_mut()),
            Some(Node::Service(key)) => self.services.get_mut(key).map(|n| n.data.as_mut()),
            Some(Node::Parameter(key)) => self.parameters.get(key).map(|_| None),
            None => None,
        };
        data.ok_or_else(|| not_found(reference))
    }

    // --- actions ---

    /// The action bound to `method` on a live service.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the service is not live.
    pub fn action(&self, service: &ServiceRef, method: Method) -> Result<Option<Action>, HubError> {
        let key = self.service_key(service).ok_or_else(|| not_found(service))?;
        Ok(self
            .services
            .get(key)
            .and_then(|node| node.actions.get(method))
            .cloned())
    }

    /// Bind (or unbind with `None`) the action for `method` on a live service.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the service is not live.
    pub fn set_action(
        &mut self,
        service: &ServiceRef,
        method: Method,
        action: Option<Action>,
    ) -> Result<Option<Action>, HubError> {
        let node = self
            .service_key(service)
            .and_then(|key| self.services.get_mut(key))
            .ok_or_else(|| not_found(service))?;
        Ok(node.actions.set(method, action))
    }

    /// Convenience over [`set_action`](Self::set_action) for closures.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the service is not live.
    pub fn bind<F>(&mut self, service: &ServiceRef, method: Method, action: F) -> Result<(), HubError>
    where
        F: Fn(Option<&mut UserData>, Request) -> Outcome + Send + Sync + 'static,
    {
        self.set_action(service, method, Some(Arc::new(action)))
            .map(|_| ())
    }

    /// Whether a live service supports `method`.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the service is not live.
    pub fn has_action(&self, service: &ServiceRef, method: Method) -> Result<bool, HubError> {
        Ok(self.action(service, method)?.is_some())
    }

    /// Methods supported by a live service, in table order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the service is not live.
    pub fn methods(&self, service: &ServiceRef) -> Result<Vec<Method>, HubError> {
        let node = self
            .service_key(service)
            .and_then(|key| self.services.get(key))
            .ok_or_else(|| not_found(service))?;
        Ok(node.actions.methods().collect())
    }

    // --- enumeration ---

    fn adapter_ref(&self, key: Key) -> Option<AdapterRef> {
        self.adapter_nodes
            .get(key)
            .map(|node| AdapterRef::trusted(self.hub, &node.id))
    }

    /// Live adapters in attach order.
    #[must_use]
    pub fn adapters(&self) -> Vec<AdapterRef> {
        self.adapters
            .iter()
            .filter_map(|key| self.adapter_ref(*key))
            .collect()
    }

    /// Devices of a live adapter in attach order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the adapter is not live.
    pub fn devices(&self, adapter: &AdapterRef) -> Result<Vec<DeviceRef>, HubError> {
        let node = self
            .adapter_key(adapter)
            .and_then(|key| self.adapter_nodes.get(key))
            .ok_or_else(|| not_found(adapter))?;
        Ok(node
            .devices
            .iter()
            .filter_map(|key| self.devices.get(*key))
            .map(|child| adapter.trusted_device(&child.id))
            .collect())
    }

    /// Services of a live device in attach order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the device is not live.
    pub fn services(&self, device: &DeviceRef) -> Result<Vec<ServiceRef>, HubError> {
        let node = self
            .device_key(device)
            .and_then(|key| self.devices.get(key))
            .ok_or_else(|| not_found(device))?;
        Ok(node
            .services
            .iter()
            .filter_map(|key| self.services.get(*key))
            .map(|child| device.trusted_service(&child.id))
            .collect())
    }

    /// Parameters of a live service in attach order.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if the service is not live.
    pub fn parameters(&self, service: &ServiceRef) -> Result<Vec<ParameterRef>, HubError> {
        let node = self
            .service_key(service)
            .and_then(|key| self.services.get(key))
            .ok_or_else(|| not_found(service))?;
        Ok(node
            .parameters
            .iter()
            .filter_map(|key| self.parameters.get(*key))
            .map(|child| service.trusted_parameter(&child.id))
            .collect())
    }

    /// Every live device, adapters in attach order then devices in attach order.
    #[must_use]
    pub fn all_devices(&self) -> Vec<DeviceRef> {
        self.adapters()
            .iter()
            .filter_map(|adapter| self.devices(adapter).ok())
            .flatten()
            .collect()
    }

    /// Every live service in pre-order.
    #[must_use]
    pub fn all_services(&self) -> Vec<ServiceRef> {
        self.all_devices()
            .iter()
            .filter_map(|device| self.services(device).ok())
            .flatten()
            .collect()
    }

    /// First live adapter, or `None` when there is none.
    #[must_use]
    pub fn first_adapter(&self) -> Option<AdapterRef> {
        self.adapters.first().and_then(|key| self.adapter_ref(*key))
    }

    /// Adapter attached after `adapter`, or `None` past the last one.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if `adapter` is not live.
    pub fn next_adapter(&self, adapter: &AdapterRef) -> Result<Option<AdapterRef>, HubError> {
        let key = self.adapter_key(adapter).ok_or_else(|| not_found(adapter))?;
        Ok(next_after(&self.adapters, key).and_then(|next| self.adapter_ref(next)))
    }

    /// First device of a live adapter, or `None` when it has none.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if `adapter` is not live.
    pub fn first_device(&self, adapter: &AdapterRef) -> Result<Option<DeviceRef>, HubError> {
        Ok(self.devices(adapter)?.into_iter().next())
    }

    /// Sibling attached after `device`, or `None` past the last one.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if `device` is not live.
    pub fn next_device(&self, device: &DeviceRef) -> Result<Option<DeviceRef>, HubError> {
        let key = self.device_key(device).ok_or_else(|| not_found(device))?;
        let next = self
            .devices
            .get(key)
            .and_then(|node| self.adapter_nodes.get(node.parent))
            .and_then(|parent| next_after(&parent.devices, key))
            .and_then(|next| self.devices.get(next));
        Ok(next.map(|node| device.adapter().trusted_device(&node.id)))
    }

    /// First service of a live device, or `None` when it has none.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if `device` is not live.
    pub fn first_service(&self, device: &DeviceRef) -> Result<Option<ServiceRef>, HubError> {
        Ok(self.services(device)?.into_iter().next())
    }

    /// Sibling attached after `service`, or `None` past the last one.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if `service` is not live.
    pub fn next_service(&self, service: &ServiceRef) -> Result<Option<ServiceRef>, HubError> {
        let key = self.service_key(service).ok_or_else(|| not_found(service))?;
        let next = self
            .services
            .get(key)
            .and_then(|node| self.devices.get(node.parent))
            .and_then(|parent| next_after(&parent.services, key))
            .and_then(|next| self.services.get(next));
        Ok(next.map(|node| service.device().trusted_service(&node.id)))
    }

    /// First parameter of a live service, or `None` when it has none.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if `service` is not live.
    pub fn first_parameter(&self, service: &ServiceRef) -> Result<Option<ParameterRef>, HubError> {
        Ok(self.parameters(service)?.into_iter().next())
    }

    /// Sibling attached after `parameter`, or `None` past the last one.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotFound`] if `parameter` is not live.
    pub fn next_parameter(
        &self,
        parameter: &ParameterRef,
    ) -> Result<Option<ParameterRef>, HubError> {
        let key = self
            .parameter_key(parameter)
            .ok_or_else(|| not_found(parameter))?;
        let next = self
            .parameters
            .get(key)
            .and_then(|node| self.services.get(node.parent))
            .and_then(|parent| next_after(&parent.parameters, key))
            .and_then(|next| self.parameters.get(next));
        Ok(next.map(|node| parameter.service().trusted_parameter(&node.id)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::attribute::keys;
    use crate::error::ArgumentError;
    use crate::reference::EntityRef;
    use crate::status::Status;
    use crate::value::Value;

    fn lamp(id: &str) -> Device {
        Device::builder()
            .id(id)
            .service(
                Service::builder()
                    .id("state")
                    .parameter(Parameter::new("value").unwrap())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn store_with_adapter() -> (Store, AdapterRef) {
        let mut store = Store::new(HubId::new());
        let adapter = store
            .attach_adapter(
                Adapter::builder()
                    .id("a")
                    .device(lamp("d0"))
                    .device(lamp("d1"))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        (store, adapter)
    }

    #[test]
    fn should_make_whole_subtree_reachable_when_adapter_attached() {
        let (store, adapter) = store_with_adapter();
        let service = adapter.device("d1").unwrap().service("state").unwrap();
        let parameter = service.parameter("value").unwrap();

        assert!(store.contains(&adapter));
        assert!(store.contains(&service));
        assert!(store.contains(&parameter));
        assert_eq!(store.counts(), [1, 2, 2, 2]);
    }

    #[test]
    fn should_reject_duplicate_adapter_and_leave_tree_unchanged() {
        let (mut store, _) = store_with_adapter();
        let before = store.all_services();

        let rejected = store.attach_adapter(Adapter::new("a").unwrap()).unwrap_err();

        assert!(matches!(
            rejected.error(),
            HubError::NotUnique {
                kind: EntityKind::Adapter,
                ..
            }
        ));
        assert_eq!(rejected.entity().id(), "a");
        assert_eq!(store.all_services(), before);
        assert_eq!(store.counts(), [1, 2, 2, 2]);
    }

    #[test]
    fn should_reject_duplicate_device_under_same_adapter() {
        let (mut store, adapter) = store_with_adapter();
        let rejected = store.attach_device(&adapter, lamp("d0")).unwrap_err();
        assert!(matches!(rejected.error(), HubError::NotUnique { .. }));
        assert_eq!(store.devices(&adapter).unwrap().len(), 2);
    }

    #[test]
    fn should_allow_same_identifier_under_different_parents() {
        let (mut store, _) = store_with_adapter();
        let other = store.attach_adapter(Adapter::new("b").unwrap()).unwrap();
        let device = store.attach_device(&other, lamp("d0")).unwrap();
        assert_eq!(device.to_string(), "b/d0");
    }

    #[test]
    fn should_fail_with_not_attached_when_parent_is_not_live() {
        let mut store = Store::new(HubId::new());
        let parent = DeviceRef::new(store.hub(), "a", "d").unwrap();
        let rejected = store
            .attach_service(&parent, Service::new("s").unwrap())
            .unwrap_err();
        assert!(matches!(
            rejected.error(),
            HubError::NotAttached {
                kind: EntityKind::Device,
                ..
            }
        ));
    }

    #[test]
    fn should_resolve_to_not_found_after_detach() {
        let (mut store, adapter) = store_with_adapter();
        let device = adapter.device("d0").unwrap();
        let service = device.service("state").unwrap();

        let detached = store.detach_device(&device).unwrap();

        assert_eq!(detached.id(), "d0");
        assert_eq!(detached.services().len(), 1);
        assert!(matches!(store.resolve(&device), Err(HubError::NotFound(_))));
        assert!(matches!(store.resolve(&service), Err(HubError::NotFound(_))));
        assert_eq!(store.counts(), [1, 1, 1, 1]);
    }

    #[test]
    fn should_fail_with_not_attached_when_detaching_twice() {
        let (mut store, adapter) = store_with_adapter();
        let device = adapter.device("d0").unwrap();
        store.detach_device(&device).unwrap();
        let err = store.detach_device(&device).unwrap_err();
        assert!(matches!(
            err,
            HubError::NotAttached {
                kind: EntityKind::Device,
                ..
            }
        ));
    }

    #[test]
    fn should_place_reattached_device_like_a_fresh_attach() {
        let (mut store, adapter) = store_with_adapter();
        let first = adapter.device("d0").unwrap();

        let device = store.detach_device(&first).unwrap();
        store.attach_device(&adapter, device).unwrap();

        let ids: Vec<_> = store
            .devices(&adapter)
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(ids, vec!["d1", "d0"]);
        assert!(store.contains(&first.service("state").unwrap()));
    }

    #[test]
    fn should_keep_attributes_and_data_across_detach_and_reattach() {
        let (mut store, adapter) = store_with_adapter();
        let device = adapter.device("d0").unwrap();
        store.set_attribute(&device, keys::LOCATION, "kitchen").unwrap();

        let mut owned = store.detach_device(&device).unwrap();
        assert_eq!(owned.attribute(keys::LOCATION), Some("kitchen"));
        owned.set_data(UserData::new(5_u8));
        store.attach_device(&adapter, owned).unwrap();

        assert_eq!(
            store.attribute(&device, keys::LOCATION).unwrap(),
            Some("kitchen")
        );
        let data = store.data_mut(&device).unwrap().unwrap();
        assert_eq!(data.downcast_ref::<u8>(), Some(&5));
    }

    #[test]
    fn should_not_resolve_reference_from_another_configuration() {
        let (store, _) = store_with_adapter();
        let foreign = AdapterRef::new(HubId::new(), "a").unwrap();
        assert!(!store.contains(&foreign));
    }

    #[test]
    fn should_reject_reserved_attribute_key() {
        let (mut store, adapter) = store_with_adapter();
        let err = store.set_attribute(&adapter, "_id", "x").unwrap_err();
        assert!(matches!(
            err,
            HubError::Argument(ArgumentError::ReservedKey(_))
        ));
    }

    #[test]
    fn should_set_attribute_through_entity_ref() {
        let (mut store, adapter) = store_with_adapter();
        let parameter: EntityRef = adapter
            .device("d0")
            .unwrap()
            .service("state")
            .unwrap()
            .parameter("value")
            .unwrap()
            .into();
        store.set_attribute(&parameter, keys::UNIT, "C").unwrap();
        assert_eq!(store.attribute(&parameter, keys::UNIT).unwrap(), Some("C"));
    }

    #[test]
    fn should_fail_attribute_access_when_not_live() {
        let store = Store::new(HubId::new());
        let adapter = AdapterRef::new(store.hub(), "missing").unwrap();
        assert!(matches!(
            store.attribute(&adapter, keys::VENDOR),
            Err(HubError::NotFound(_))
        ));
    }

    #[test]
    fn should_enumerate_in_pre_order() {
        let (mut store, _) = store_with_adapter();
        let b = store.attach_adapter(Adapter::new("b").unwrap()).unwrap();
        store.attach_device(&b, lamp("x")).unwrap();

        let paths: Vec<_> = store.all_services().iter().map(ToString::to_string).collect();
        assert_eq!(paths, vec!["a/d0/state", "a/d1/state", "b/x/state"]);
    }

    #[test]
    fn should_walk_siblings_until_explicit_end() {
        let (store, adapter) = store_with_adapter();

        let first = store.first_adapter().unwrap();
        assert_eq!(first, adapter);
        assert_eq!(store.next_adapter(&first).unwrap(), None);

        let d0 = store.first_device(&adapter).unwrap().unwrap();
        let d1 = store.next_device(&d0).unwrap().unwrap();
        assert_eq!(d1.id(), "d1");
        assert_eq!(store.next_device(&d1).unwrap(), None);

        let service = store.first_service(&d1).unwrap().unwrap();
        assert_eq!(store.next_service(&service).unwrap(), None);
        let parameter = store.first_parameter(&service).unwrap().unwrap();
        assert_eq!(store.next_parameter(&parameter).unwrap(), None);
    }

    #[test]
    fn should_fail_next_when_reference_is_stale() {
        let (mut store, adapter) = store_with_adapter();
        let d0 = adapter.device("d0").unwrap();
        store.detach_device(&d0).unwrap();
        assert!(matches!(store.next_device(&d0), Err(HubError::NotFound(_))));
    }

    #[test]
    fn should_report_bound_methods_and_clone_action() {
        let (mut store, adapter) = store_with_adapter();
        let service = adapter.device("d0").unwrap().service("state").unwrap();
        store
            .bind(&service, Method::Get, |_, request| {
                Outcome::value(request, Status::OK, Value::text("42"))
            })
            .unwrap();

        assert_eq!(store.methods(&service).unwrap(), vec![Method::Get]);
        assert!(store.has_action(&service, Method::Get).unwrap());
        assert!(!store.has_action(&service, Method::Put).unwrap());

        let action = store.action(&service, Method::Get).unwrap().unwrap();
        let outcome = action(None, Request::detached(service.clone(), Method::Get));
        assert!(matches!(outcome, Outcome::Immediate(r) if r.status() == Status::OK));
    }

    #[test]
    fn should_run_free_hooks_when_cleared() {
        struct Counted(&'static AtomicUsize);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        let mut store = Store::new(HubId::new());
        for id in ["a", "b"] {
            let adapter = Adapter::builder()
                .id(id)
                .data(UserData::new(Counted(&DROPS)))
                .device(
                    Device::builder()
                        .id("d")
                        .data(UserData::new(Counted(&DROPS)))
                        .build()
                        .unwrap(),
                )
                .build()
                .unwrap();
            store.attach_adapter(adapter).unwrap();
        }

        assert_eq!(store.clear(), 2);
        assert_eq!(DROPS.load(Ordering::SeqCst), 4);
        assert!(store.is_empty());
        assert_eq!(store.counts(), [0, 0, 0, 0]);
    }
}
