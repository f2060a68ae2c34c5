//! Identity References: immutable path handles into the entity tree.
//!
//! A reference is the list of identifiers from the root down to one entity
//! plus the [`HubId`] of the configuration it was minted for. It never
//! points into the live store, so it can be cloned freely and sent to any
//! thread; resolving it against a [`Store`](crate::store::Store) is an
//! ordinary, fallible lookup.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::error::{ArgumentError, EntityKind, HubError};
use crate::id::HubId;

/// Check that `id` can be used as an entity identifier.
///
/// # Errors
///
/// - [`HubError::NullArgument`] if `id` is empty
/// - [`ArgumentError::InvalidIdentifier`] if `id` contains `/`
pub fn validate_identifier(id: &str) -> Result<(), HubError> {
    if id.is_empty() {
        return Err(HubError::NullArgument("id"));
    }
    if id.contains('/') {
        return Err(ArgumentError::InvalidIdentifier(id.to_string()).into());
    }
    Ok(())
}

fn segment(id: &str) -> Result<Arc<str>, HubError> {
    validate_identifier(id)?;
    Ok(Arc::from(id))
}

/// Common view over every reference kind, used to resolve references
/// generically against a [`Store`](crate::store::Store).
pub trait Reference: fmt::Display {
    fn kind(&self) -> EntityKind;

    /// Configuration the reference was minted for.
    fn hub(&self) -> HubId;

    /// Identifiers from the adapter down to the referenced entity.
    fn segments(&self) -> Vec<&str>;
}

/// Reference to an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdapterRef {
    hub: HubId,
    adapter: Arc<str>,
}

/// Reference to a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceRef {
    adapter: AdapterRef,
    device: Arc<str>,
}

/// Reference to a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceRef {
    device: DeviceRef,
    service: Arc<str>,
}

/// Reference to a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterRef {
    service: ServiceRef,
    parameter: Arc<str>,
}

impl AdapterRef {
    /// Build a reference without touching any store.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn new(hub: HubId, id: &str) -> Result<Self, HubError> {
        Ok(Self {
            hub,
            adapter: segment(id)?,
        })
    }

    #[must_use]
    pub fn hub(&self) -> HubId {
        self.hub
    }

    /// Build from an identifier the store already validated.
    pub(crate) fn trusted(hub: HubId, id: &str) -> Self {
        Self {
            hub,
            adapter: Arc::from(id),
        }
    }

    pub(crate) fn trusted_device(&self, id: &str) -> DeviceRef {
        DeviceRef {
            adapter: self.clone(),
            device: Arc::from(id),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.adapter
    }

    /// Reference to the child device `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn device(&self, id: &str) -> Result<DeviceRef, HubError> {
        Ok(DeviceRef {
            adapter: self.clone(),
            device: segment(id)?,
        })
    }
}

impl DeviceRef {
    /// Build a reference from its path segments.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is not a valid identifier.
    pub fn new(hub: HubId, adapter: &str, device: &str) -> Result<Self, HubError> {
        AdapterRef::new(hub, adapter)?.device(device)
    }

    #[must_use]
    pub fn hub(&self) -> HubId {
        self.adapter.hub
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.device
    }

    #[must_use]
    pub fn adapter(&self) -> &AdapterRef {
        &self.adapter
    }

    pub(crate) fn trusted_service(&self, id: &str) -> ServiceRef {
        ServiceRef {
            device: self.clone(),
            service: Arc::from(id),
        }
    }

    /// Reference to the child service `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn service(&self, id: &str) -> Result<ServiceRef, HubError> {
        Ok(ServiceRef {
            device: self.clone(),
            service: segment(id)?,
        })
    }
}

impl ServiceRef {
    /// Build a reference from its path segments.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is not a valid identifier.
    pub fn new(hub: HubId, adapter: &str, device: &str, service: &str) -> Result<Self, HubError> {
        DeviceRef::new(hub, adapter, device)?.service(service)
    }

    #[must_use]
    pub fn hub(&self) -> HubId {
        self.device.hub()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    #[must_use]
    pub fn adapter(&self) -> &AdapterRef {
        &self.device.adapter
    }

    pub(crate) fn trusted_parameter(&self, id: &str) -> ParameterRef {
        ParameterRef {
            service: self.clone(),
            parameter: Arc::from(id),
        }
    }

    /// Reference to the child parameter `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn parameter(&self, id: &str) -> Result<ParameterRef, HubError> {
        Ok(ParameterRef {
            service: self.clone(),
            parameter: segment(id)?,
        })
    }
}

impl ParameterRef {
    /// Build a reference from its path segments.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is not a valid identifier.
    pub fn new(
        hub: HubId,
        adapter: &str,
        device: &str,
        service: &str,
        parameter: &str,
    ) -> Result<Self, HubError> {
        ServiceRef::new(hub, adapter, device, service)?.parameter(parameter)
    }

    #[must_use]
    pub fn hub(&self) -> HubId {
        self.service.hub()
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.parameter
    }

    #[must_use]
    pub fn service(&self) -> &ServiceRef {
        &self.service
    }
}

impl fmt::Display for AdapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.adapter)
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.adapter, self.device)
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.service)
    }
}

impl fmt::Display for ParameterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.parameter)
    }
}

macro_rules! serialize_as_path {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }
        )*
    };
}

serialize_as_path!(AdapterRef, DeviceRef, ServiceRef, ParameterRef);

impl Reference for AdapterRef {
    fn kind(&self) -> EntityKind {
        EntityKind::Adapter
    }

    fn hub(&self) -> HubId {
        self.hub
    }

    fn segments(&self) -> Vec<&str> {
        vec![self.adapter.as_ref()]
    }
}

impl Reference for DeviceRef {
    fn kind(&self) -> EntityKind {
        EntityKind::Device
    }

    fn hub(&self) -> HubId {
        self.adapter.hub
    }

    fn segments(&self) -> Vec<&str> {
        let mut segments = self.adapter.segments();
        segments.push(self.device.as_ref());
        segments
    }
}

impl Reference for ServiceRef {
    fn kind(&self) -> EntityKind {
        EntityKind::Service
    }

    fn hub(&self) -> HubId {
        self.device.hub()
    }

    fn segments(&self) -> Vec<&str> {
        let mut segments = self.device.segments();
        segments.push(self.service.as_ref());
        segments
    }
}

impl Reference for ParameterRef {
    fn kind(&self) -> EntityKind {
        EntityKind::Parameter
    }

    fn hub(&self) -> HubId {
        self.service.hub()
    }

    fn segments(&self) -> Vec<&str> {
        let mut segments = self.service.segments();
        segments.push(self.parameter.as_ref());
        segments
    }
}

/// Any of the four reference kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Adapter(AdapterRef),
    Device(DeviceRef),
    Service(ServiceRef),
    Parameter(ParameterRef),
}

impl EntityRef {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Adapter(_) => EntityKind::Adapter,
            Self::Device(_) => EntityKind::Device,
            Self::Service(_) => EntityKind::Service,
            Self::Parameter(_) => EntityKind::Parameter,
        }
    }

    #[must_use]
    pub fn hub(&self) -> HubId {
        match self {
            Self::Adapter(r) => r.hub(),
            Self::Device(r) => r.hub(),
            Self::Service(r) => r.hub(),
            Self::Parameter(r) => r.hub(),
        }
    }

    /// Identifier of the referenced entity (last path segment).
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Adapter(r) => r.id(),
            Self::Device(r) => r.id(),
            Self::Service(r) => r.id(),
            Self::Parameter(r) => r.id(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adapter(r) => r.fmt(f),
            Self::Device(r) => r.fmt(f),
            Self::Service(r) => r.fmt(f),
            Self::Parameter(r) => r.fmt(f),
        }
    }
}

impl Reference for EntityRef {
    fn kind(&self) -> EntityKind {
        EntityRef::kind(self)
    }

    fn hub(&self) -> HubId {
        EntityRef::hub(self)
    }

    fn segments(&self) -> Vec<&str> {
        match self {
            Self::Adapter(r) => r.segments(),
            Self::Device(r) => r.segments(),
            Self::Service(r) => r.segments(),
            Self::Parameter(r) => r.segments(),
        }
    }
}

impl From<AdapterRef> for EntityRef {
    fn from(r: AdapterRef) -> Self {
        Self::Adapter(r)
    }
}

impl From<DeviceRef> for EntityRef {
    fn from(r: DeviceRef) -> Self {
        Self::Device(r)
    }
}

impl From<ServiceRef> for EntityRef {
    fn from(r: ServiceRef) -> Self {
        Self::Service(r)
    }
}

impl From<ParameterRef> for EntityRef {
    fn from(r: ParameterRef) -> Self {
        Self::Parameter(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_render_path_when_displayed() {
        let hub = HubId::new();
        let param = ParameterRef::new(hub, "a", "d", "s", "p").unwrap();
        assert_eq!(param.to_string(), "a/d/s/p");
        assert_eq!(param.service().device().adapter().to_string(), "a");
    }

    #[test]
    fn should_compare_structurally() {
        let hub = HubId::new();
        let a = ServiceRef::new(hub, "a", "d", "s").unwrap();
        let b = AdapterRef::new(hub, "a")
            .unwrap()
            .device("d")
            .unwrap()
            .service("s")
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.clone(), b);
    }

    #[test]
    fn should_differ_when_hub_differs() {
        let a = DeviceRef::new(HubId::new(), "a", "d").unwrap();
        let b = DeviceRef::new(HubId::new(), "a", "d").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn should_reject_empty_identifier() {
        let result = AdapterRef::new(HubId::new(), "");
        assert!(matches!(result, Err(HubError::NullArgument("id"))));
    }

    #[test]
    fn should_reject_identifier_with_slash() {
        let result = DeviceRef::new(HubId::new(), "a", "d/x");
        assert!(matches!(
            result,
            Err(HubError::Argument(ArgumentError::InvalidIdentifier(_)))
        ));
    }

    #[test]
    fn should_serialize_as_path_string() {
        let service = ServiceRef::new(HubId::new(), "virtual", "lamp0", "state").unwrap();
        let json = serde_json::to_string(&service).unwrap();
        assert_eq!(json, "\"virtual/lamp0/state\"");
    }

    #[test]
    fn should_list_segments_from_adapter_down() {
        let parameter = ParameterRef::new(HubId::new(), "a", "d", "s", "p").unwrap();
        assert_eq!(parameter.segments(), vec!["a", "d", "s", "p"]);
        assert_eq!(EntityRef::from(parameter.service().clone()).segments().len(), 3);
    }

    #[test]
    fn should_report_kind_and_id_through_entity_ref() {
        let service = ServiceRef::new(HubId::new(), "a", "d", "s").unwrap();
        let entity = EntityRef::from(service.clone());
        assert_eq!(entity.kind(), EntityKind::Service);
        assert_eq!(entity.id(), "s");
        assert_eq!(entity.hub(), service.hub());
    }
}
