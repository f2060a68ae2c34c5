//! Parameter: leaf metadata describing a service's value space.

use crate::attribute::Attributes;
use crate::error::HubError;
use crate::reference::validate_identifier;

/// A service parameter. Carries attributes only.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub(crate) id: String,
    pub(crate) attributes: Attributes,
}

impl Parameter {
    /// Allocate a parameter with no attributes.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, HubError> {
        Self::builder().id(id).build()
    }

    #[must_use]
    pub fn builder() -> ParameterBuilder {
        ParameterBuilder::default()
    }
}

impl_entity_common!(Parameter);

/// Step-by-step builder for [`Parameter`].
#[derive(Debug, Default)]
pub struct ParameterBuilder {
    id: Option<String>,
    attributes: Vec<(String, String)>,
}

impl ParameterBuilder {
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

    /// Consume the builder, validate, and return a [`Parameter`].
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is missing or invalid, or if an
    /// attribute key is rejected.
    pub fn build(self) -> Result<Parameter, HubError> {
        let id = self.id.unwrap_or_default();
        validate_identifier(&id)?;
        let mut attributes = Attributes::new();
        for (key, value) in self.attributes {
            attributes.set(key, value)?;
        }
        Ok(Parameter { id, attributes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::keys;
    use crate::error::ArgumentError;

    #[test]
    fn should_build_parameter_with_attributes() {
        let parameter = Parameter::builder()
            .id("value")
            .attribute(keys::MIN, "0")
            .attribute(keys::MAX, "1")
            .build()
            .unwrap();
        assert_eq!(parameter.id(), "value");
        assert_eq!(parameter.attribute(keys::MAX), Some("1"));
    }

    #[test]
    fn should_fail_when_id_missing() {
        let result = Parameter::builder().build();
        assert!(matches!(result, Err(HubError::NullArgument("id"))));
    }

    #[test]
    fn should_fail_when_attribute_key_is_reserved() {
        let result = Parameter::builder().id("p").attribute("_id", "x").build();
        assert!(matches!(
            result,
            Err(HubError::Argument(ArgumentError::ReservedKey(_)))
        ));
    }
}
