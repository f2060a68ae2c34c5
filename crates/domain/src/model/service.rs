//! Service: an addressable unit exposing methods and owning parameters.

use std::fmt;
use std::sync::Arc;

use super::{Parameter, UserData, push_unique, take_child};
use crate::attribute::Attributes;
use crate::error::{EntityKind, HubError, Rejected};
use crate::method::Method;
use crate::reference::validate_identifier;
use crate::request::{Outcome, Request};

/// Handler bound to a (service, method) pair.
///
/// Receives the live service's user data and the request, and answers with
/// an [`Outcome`].
pub type Action = Arc<dyn Fn(Option<&mut UserData>, Request) -> Outcome + Send + Sync>;

/// Fixed-size action table indexed by [`Method`].
///
/// An empty slot means the method is not supported by the service.
#[derive(Clone, Default)]
pub struct Actions {
    slots: [Option<Action>; Method::COUNT],
}

impl Actions {
    #[must_use]
    pub fn get(&self, method: Method) -> Option<&Action> {
        self.slots[method.index()].as_ref()
    }

    /// Bind (or unbind with `None`) the action for `method`.
    pub fn set(&mut self, method: Method, action: Option<Action>) -> Option<Action> {
        std::mem::replace(&mut self.slots[method.index()], action)
    }

    #[must_use]
    pub fn has(&self, method: Method) -> bool {
        self.slots[method.index()].is_some()
    }

    /// Methods with a bound action, in table order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        Method::ALL.into_iter().filter(|m| self.has(*m))
    }
}

impl fmt::Debug for Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.methods()).finish()
    }
}

/// A service with its actions and parameters.
#[derive(Debug)]
pub struct Service {
    pub(crate) id: String,
    pub(crate) attributes: Attributes,
    pub(crate) actions: Actions,
    pub(crate) data: Option<UserData>,
    pub(crate) parameters: Vec<Parameter>,
}

impl Service {
    /// Allocate an empty service.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not a valid identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, HubError> {
        Self::builder().id(id).build()
    }

    #[must_use]
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::default()
    }

    #[must_use]
    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    /// Bind `action` to `method`, replacing any previous binding.
    pub fn bind<F>(&mut self, method: Method, action: F) -> Option<Action>
    where
        F: Fn(Option<&mut UserData>, Request) -> Outcome + Send + Sync + 'static,
    {
        self.actions.set(method, Some(Arc::new(action)))
    }

    pub fn unbind(&mut self, method: Method) -> Option<Action> {
        self.actions.set(method, None)
    }

    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[must_use]
    pub fn parameter(&self, id: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id == id)
    }

    /// Add a parameter before the service is attached.
    ///
    /// # Errors
    ///
    /// Returns the parameter with [`HubError::NotUnique`] if a sibling
    /// already uses its identifier.
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<(), Rejected<Parameter>> {
        push_unique(&mut self.parameters, parameter, EntityKind::Parameter, |p| {
            p.id.as_str()
        })
    }

    pub fn remove_parameter(&mut self, id: &str) -> Option<Parameter> {
        take_child(&mut self.parameters, id, |p| p.id.as_str())
    }
}

impl_entity_common!(Service);
impl_user_data!(Service);

/// Step-by-step builder for [`Service`].
#[derive(Default)]
pub struct ServiceBuilder {
    id: Option<String>,
    attributes: Vec<(String, String)>,
    actions: Actions,
    data: Option<UserData>,
    parameters: Vec<Parameter>,
}

impl ServiceBuilder {
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
    pub fn action<F>(mut self, method: Method, action: F) -> Self
    where
        F: Fn(Option<&mut UserData>, Request) -> Outcome + Send + Sync + 'static,
    {
        self.actions.set(method, Some(Arc::new(action)));
        self
    }

    #[must_use]
    pub fn data(mut self, data: UserData) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Consume the builder, validate, and return a [`Service`].
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is missing or invalid, an
    /// attribute key is rejected, or two parameters share an identifier.
    pub fn build(self) -> Result<Service, HubError> {
        let id = self.id.unwrap_or_default();
        validate_identifier(&id)?;
        let mut service = Service {
            id,
            attributes: Attributes::new(),
            actions: self.actions,
            data: self.data,
            parameters: Vec::with_capacity(self.parameters.len()),
        };
        for (key, value) in self.attributes {
            service.attributes.set(key, value)?;
        }
        for parameter in self.parameters {
            service.add_parameter(parameter)?;
        }
        Ok(service)
    }
}
