//! Adapter: top-level pluggable driver entity owning devices.

use super::{Device, UserData, push_unique, take_child};
use crate::attribute::Attributes;
use crate::error::{EntityKind, HubError, Rejected};
use crate::reference::validate_identifier;

/// An adapter and the devices it drives.
#[derive(Debug)]
pub struct Adapter {
    pub(crate) id: String,
    pub(crate) attributes: Attributes,
    pub(crate) data: Option<UserData>,
    pub(crate) devices: Vec<Device>,
}

impl Adapter {
    /// Allocate an empty adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, HubError> {
        Self::builder().id(id).build()
    }

    #[must_use]
    pub fn builder() -> AdapterBuilder {
        AdapterBuilder::default()
    }

    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    #[must_use]
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn device_mut(&mut self, id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.id == id)
    }

    /// Add a device before the adapter is attached.
    ///
    /// # Errors
    ///
    /// Returns the device with [`HubError::NotUnique`] if a sibling already
    /// uses its identifier.
    pub fn add_device(&mut self, device: Device) -> Result<(), Rejected<Device>> {
        push_unique(&mut self.devices, device, EntityKind::Device, |d| d.id.as_str())
    }

    pub fn remove_device(&mut self, id: &str) -> Option<Device> {
        take_child(&mut self.devices, id, |d| d.id.as_str())
    }
}

impl_entity_common!(Adapter);
impl_user_data!(Adapter);

/// Step-by-step builder for [`Adapter`].
#[derive(Debug, Default)]
pub struct AdapterBuilder {
    id: Option<String>,
    attributes: Vec<(String, String)>,
    data: Option<UserData>,
    devices: Vec<Device>,
}

impl AdapterBuilder {
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
    pub fn device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    /// Consume the builder, validate, and return an [`Adapter`].
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is missing or invalid, an
    /// attribute key is rejected, or two devices share an identifier.
    pub fn build(self) -> Result<Adapter, HubError> {
        let id = self.id.unwrap_or_default();
        validate_identifier(&id)?;
        let mut adapter = Adapter {
            id,
            attributes: Attributes::new(),
            data: self.data,
            devices: Vec::with_capacity(self.devices.len()),
        };
        for (key, value) in self.attributes {
            adapter.attributes.set(key, value)?;
        }
        for device in self.devices {
            adapter.add_device(device)?;
        }
        Ok(adapter)
    }
}
