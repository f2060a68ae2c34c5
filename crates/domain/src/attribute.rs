//! Insertion-ordered string attributes attached to every entity.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{ArgumentError, HubError};

/// Keys starting with this prefix are reserved for generated metadata.
pub const RESERVED_PREFIX: &str = "_";

/// Well-known attribute keys.
pub mod keys {
    /// Network an adapter is connected to.
    pub const NETWORK: &str = "network";
    /// Human readable description.
    pub const DESCRIPTION: &str = "description";
    /// Short vendor name.
    pub const VENDOR: &str = "vendor";
    /// Product identifier, typically set on devices.
    pub const PRODUCT: &str = "product";
    /// Product, firmware or protocol version.
    pub const VERSION: &str = "version";
    /// Physical location (address, room, …).
    pub const LOCATION: &str = "location";
    /// Category on services (`lamp`, `temperature`), datatype on parameters.
    pub const TYPE: &str = "type";
    /// Unit of the value (`C`, `m`, `kg`, …).
    pub const UNIT: &str = "unit";
    /// Maximum value of a parameter.
    pub const MAX: &str = "max";
    /// Minimum value of a parameter.
    pub const MIN: &str = "min";
    /// Increment between values; `1` is assumed when absent.
    pub const STEP: &str = "step";
    /// Scale factor to apply to match `unit`; `1` is assumed when absent.
    pub const SCALE: &str = "scale";
    /// Possible values of an enumeration parameter.
    pub const VALUES: &str = "values";
}

/// Ordered key/value map of entity attributes.
///
/// Setting an existing key replaces its value in place, so enumeration
/// order is the order in which keys were first set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set `key` to `value`, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NullArgument`] for an empty key and
    /// [`ArgumentError::ReservedKey`] for keys using [`RESERVED_PREFIX`].
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, HubError> {
        let key = key.into();
        if key.is_empty() {
            return Err(HubError::NullArgument("key"));
        }
        if key.starts_with(RESERVED_PREFIX) {
            return Err(ArgumentError::ReservedKey(key).into());
        }
        let value = value.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Ok(Some(std::mem::replace(existing, value)));
        }
        self.entries.push((key, value));
        Ok(None)
    }

    /// Remove `key`, returning its value if it was set.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterate `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
