//! Device: an entity of an adapter, owning services.

use super::{Service, UserData, push_unique, take_child};
use crate::attribute::Attributes;
use crate::error::{EntityKind, HubError, Rejected};
use crate::reference::validate_identifier;

/// A device and the services it exposes.
#[derive(Debug)]
pub struct Device {
    pub(crate) id: String,
    pub(crate) attributes: Attributes,
    pub(crate) data: Option<UserData>,
    pub(crate) services: Vec<Service>,
}

impl Device {
    /// Allocate an empty device.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, HubError> {
        Self::builder().id(id).build()
    }

    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    #[must_use]
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn service_mut(&mut self, id: &str) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.id == id)
    }

    /// Add a service before the device is attached.
    ///
    /// # Errors
    ///
    /// Returns the service with [`HubError::NotUnique`] if a sibling
    /// already uses its identifier.
    pub fn add_service(&mut self, service: Service) -> Result<(), Rejected<Service>> {
        push_unique(&mut self.services, service, EntityKind::Service, |s| s.id.as_str())
    }

    pub fn remove_service(&mut self, id: &str) -> Option<Service> {
        take_child(&mut self.services, id, |s| s.id.as_str())
    }
}

impl_entity_common!(Device);
impl_user_data!(Device);

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<String>,
    attributes: Vec<(String, String)>,
    data: Option<UserData>,
    services: Vec<Service>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn data(mut self, data: UserData) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is missing or invalid, an
    /// attribute key is rejected, or two services share an identifier.
    pub fn build(self) -> Result<Device, HubError> {
        let id = self.id.unwrap_or_default();
        validate_identifier(&id)?;
        let mut device = Device {
            id,
            attributes: Attributes::new(),
            data: self.data,
            services: Vec::with_capacity(self.services.len()),
        };
        for (key, value) in self.attributes {
            device.attributes.set(key, value)?;
        }
        for service in self.services {
            device.add_service(service)?;
        }
        Ok(device)
    }
}
