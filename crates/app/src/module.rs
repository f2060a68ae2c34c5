//! Module lifecycle: the seam the REST façade and device drivers plug into.
//!
//! The [`Daemon`](crate::daemon::Daemon) calls the hooks in this order:
//!
//! 1. [`on_create`](Module::on_create): declare options, allocate resources
//! 2. [`on_parse_option`](Module::on_parse_option): once per supplied option
//! 3. [`on_start`](Module::on_start): attach adapters, bind sockets, start workers
//! 4. (the controller loop runs)
//! 5. [`on_stop`](Module::on_stop): detach adapters, stop workers
//! 6. [`on_destroy`](Module::on_destroy): release what `on_create` allocated
//!
//! Create and start run in registration order; stop and destroy run in
//! reverse.

use homeport_domain::error::{ArgumentError, HubError};

use crate::hub::Hub;

/// An option a module accepts, addressed as `"<module>-<name>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOption {
    pub name: String,
    /// Placeholder for the value in help output, e.g. `"PORT"`.
    pub arg: String,
    pub description: String,
}

/// Handed to [`Module::on_create`].
#[derive(Debug)]
pub struct ModuleContext {
    id: String,
    options: Vec<ModuleOption>,
}

impl ModuleContext {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: Vec::new(),
        }
    }

    /// Identifier the module was registered under.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declare an option.
    ///
    /// # Errors
    ///
    /// - [`HubError::NullArgument`] if `name` is empty
    /// - [`HubError::NotUnique`] if the module already declared `name`
    pub fn add_option(
        &mut self,
        name: impl Into<String>,
        arg: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<(), HubError> {
        let name = name.into();
        if name.is_empty() {
            return Err(HubError::NullArgument("name"));
        }
        if self.options.iter().any(|o| o.name == name) {
            return Err(HubError::NotUnique {
                kind: homeport_domain::error::EntityKind::Module,
                id: format!("{}-{name}", self.id),
            });
        }
        self.options.push(ModuleOption {
            name,
            arg: arg.into(),
            description: description.into(),
        });
        Ok(())
    }

    #[must_use]
    pub fn options(&self) -> &[ModuleOption] {
        &self.options
    }

    pub(crate) fn into_options(self) -> Vec<ModuleOption> {
        self.options
    }
}

/// A pluggable unit of the daemon.
///
/// Implementations live in adapter crates. All hooks run on the controller
/// thread.
pub trait Module: Send {
    /// Declare options and allocate resources.
    ///
    /// # Errors
    ///
    /// A failure aborts daemon creation; modules created earlier are
    /// destroyed in reverse order.
    fn on_create(&mut self, _ctx: &mut ModuleContext) -> Result<(), HubError> {
        Ok(())
    }

    /// Release what [`on_create`](Self::on_create) allocated.
    ///
    /// # Errors
    ///
    /// Failures are logged; the remaining modules are still destroyed.
    fn on_destroy(&mut self) -> Result<(), HubError> {
        Ok(())
    }

    /// Attach entities, bind sockets, start workers.
    ///
    /// # Errors
    ///
    /// A failure aborts the start; modules started earlier are stopped in
    /// reverse order.
    fn on_start(&mut self, hub: &mut Hub) -> Result<(), HubError>;

    /// Undo [`on_start`](Self::on_start).
    ///
    /// # Errors
    ///
    /// Failures are logged; the remaining modules are still stopped.
    fn on_stop(&mut self, hub: &mut Hub) -> Result<(), HubError>;

    /// Receive the value of a declared option.
    ///
    /// # Errors
    ///
    /// The default rejects every option with
    /// [`ArgumentError::UnknownOption`].
    fn on_parse_option(&mut self, name: &str, _value: &str) -> Result<(), HubError> {
        Err(ArgumentError::UnknownOption(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_collect_declared_options() {
        let mut ctx = ModuleContext::new("rest");
        ctx.add_option("port", "PORT", "Port to listen on").unwrap();
        ctx.add_option("host", "HOST", "Address to bind").unwrap();

        let names: Vec<_> = ctx.options().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["port", "host"]);
        assert_eq!(ctx.id(), "rest");
    }

    #[test]
    fn should_reject_duplicate_option() {
        let mut ctx = ModuleContext::new("rest");
        ctx.add_option("port", "PORT", "").unwrap();
        let err = ctx.add_option("port", "PORT", "").unwrap_err();
        assert!(matches!(err, HubError::NotUnique { id, .. } if id == "rest-port"));
    }

    #[test]
    fn should_reject_empty_option_name() {
        let mut ctx = ModuleContext::new("rest");
        assert!(matches!(
            ctx.add_option("", "X", ""),
            Err(HubError::NullArgument("name"))
        ));
    }
}
