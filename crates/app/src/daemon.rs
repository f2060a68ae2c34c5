//! Daemon bootstrap: owns the hub and drives every module through its
//! lifecycle.

use std::future::Future;

use homeport_domain::error::{ArgumentError, EntityKind, HubError};

use crate::handle::HubHandle;
use crate::hub::Hub;
use crate::module::{Module, ModuleContext, ModuleOption};

/// Where the daemon is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Modules may be registered.
    Idle,
    /// Modules created; options may be parsed.
    Created,
    /// Modules started; the controller loop may run.
    Running,
    /// Modules stopped and the hub shut down.
    Stopped,
}

struct Registered {
    id: String,
    module: Box<dyn Module>,
    options: Vec<ModuleOption>,
}

/// The daemon: one hub plus its registered modules.
pub struct Daemon {
    hub: Hub,
    modules: Vec<Registered>,
    state: DaemonState,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::with_hub(Hub::new())
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let modules: Vec<_> = self.modules.iter().map(|m| m.id.as_str()).collect();
        f.debug_struct("Daemon")
            .field("hub", &self.hub)
            .field("modules", &modules)
            .field("state", &self.state)
            .finish()
    }
}

/// Keep the first error, log the rest.
fn log_failure(module: &str, hook: &str, result: &Result<(), HubError>) {
    if let Err(err) = result {
        tracing::warn!(module, hook, error = %err, "module hook failed");
    }
}

fn keep_first(first: &mut Option<HubError>, module: &str, hook: &str, result: Result<(), HubError>) {
    log_failure(module, hook, &result);
    if let Err(err) = result {
        first.get_or_insert(err);
    }
}

impl Daemon {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_hub(hub: Hub) -> Self {
        Self {
            hub,
            modules: Vec::new(),
            state: DaemonState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> DaemonState {
        self.state
    }

    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut Hub {
        &mut self.hub
    }

    #[must_use]
    pub fn handle(&self) -> HubHandle {
        self.hub.handle()
    }

    /// Register a module under `id`.
    ///
    /// # Errors
    ///
    /// - [`HubError::NullArgument`] for an empty id
    /// - [`HubError::NotUnique`] if `id` is already registered
    /// - [`HubError::AlreadyRunning`] once the daemon has been created
    pub fn add_module(&mut self, id: impl Into<String>, module: impl Module + 'static) -> Result<(), HubError> {
        let id = id.into();
        if self.state != DaemonState::Idle {
            return Err(HubError::AlreadyRunning);
        }
        if id.is_empty() {
            return Err(HubError::NullArgument("id"));
        }
        if self.modules.iter().any(|m| m.id == id) {
            return Err(HubError::NotUnique {
                kind: EntityKind::Module,
                id,
            });
        }
        tracing::debug!(module = %id, "module registered");
        self.modules.push(Registered {
            id,
            module: Box::new(module),
            options: Vec::new(),
        });
        Ok(())
    }

    /// Identifiers of the registered modules, in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.id.as_str())
    }

    /// Call `on_create` on every module in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first failure after destroying the modules already
    /// created, in reverse order; [`HubError::AlreadyRunning`] if called
    /// twice.
    pub fn create(&mut self) -> Result<(), HubError> {
        if self.state != DaemonState::Idle {
            return Err(HubError::AlreadyRunning);
        }
        for index in 0..self.modules.len() {
            let entry = &mut self.modules[index];
            let mut ctx = ModuleContext::new(entry.id.clone());
            match entry.module.on_create(&mut ctx) {
                Ok(()) => {
                    entry.options = ctx.into_options();
                    tracing::debug!(module = %entry.id, options = entry.options.len(), "module created");
                }
                Err(err) => {
                    tracing::error!(module = %entry.id, error = %err, "module creation failed");
                    for created in self.modules[..index].iter_mut().rev() {
                        log_failure(&created.id, "on_destroy", &created.module.on_destroy());
                    }
                    return Err(err);
                }
            }
        }
        self.state = DaemonState::Created;
        Ok(())
    }

    /// Every declared option as `("<module>-<name>", option)`.
    pub fn options(&self) -> impl Iterator<Item = (String, &ModuleOption)> {
        self.modules.iter().flat_map(|m| {
            m.options
                .iter()
                .map(move |o| (format!("{}-{}", m.id, o.name), o))
        })
    }

    /// Route `"<module>-<name>"` to that module's `on_parse_option`.
    ///
    /// # Errors
    ///
    /// - [`ArgumentError::UnknownOption`] if no module declared the option,
    ///   or the module rejects it
    /// - [`HubError::NotRunning`] before [`create`](Self::create)
    /// - [`HubError::AlreadyRunning`] after [`start`](Self::start)
    pub fn parse_option(&mut self, key: &str, value: &str) -> Result<(), HubError> {
        match self.state {
            DaemonState::Idle => return Err(HubError::NotRunning),
            DaemonState::Created => {}
            DaemonState::Running | DaemonState::Stopped => return Err(HubError::AlreadyRunning),
        }
        let target = self.modules.iter_mut().find_map(|m| {
            let name = key.strip_prefix(m.id.as_str())?.strip_prefix('-')?;
            m.options.iter().any(|o| o.name == name).then_some((m, name))
        });
        let Some((entry, name)) = target else {
            return Err(ArgumentError::UnknownOption(key.to_string()).into());
        };
        tracing::debug!(module = %entry.id, option = name, "parsing option");
        entry.module.on_parse_option(name, value)
    }

    /// Call `on_start` on every module in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first failure after stopping the modules already
    /// started, in reverse order; [`HubError::NotRunning`] before
    /// [`create`](Self::create); [`HubError::AlreadyRunning`] if called
    /// twice.
    pub fn start(&mut self) -> Result<(), HubError> {
        match self.state {
            DaemonState::Created => {}
            DaemonState::Idle | DaemonState::Stopped => return Err(HubError::NotRunning),
            DaemonState::Running => return Err(HubError::AlreadyRunning),
        }
        for index in 0..self.modules.len() {
            let entry = &mut self.modules[index];
            if let Err(err) = entry.module.on_start(&mut self.hub) {
                tracing::error!(module = %entry.id, error = %err, "module start failed");
                for started in self.modules[..index].iter_mut().rev() {
                    log_failure(&started.id, "on_stop", &started.module.on_stop(&mut self.hub));
                }
                return Err(err);
            }
            tracing::info!(module = %entry.id, "module started");
        }
        self.state = DaemonState::Running;
        Ok(())
    }

    /// Run the controller loop until `signal` resolves or a handle stops it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] unless the daemon was started.
    pub async fn run_until<F: Future>(&mut self, signal: F) -> Result<(), HubError> {
        if self.state != DaemonState::Running {
            return Err(HubError::NotRunning);
        }
        self.hub.run_until(signal).await;
        Ok(())
    }

    /// Call `on_stop` on every module in reverse order, then shut the hub
    /// down.
    ///
    /// # Errors
    ///
    /// Every module is stopped regardless; the first failure is returned.
    /// [`HubError::NotRunning`] unless the daemon was started.
    pub fn stop(&mut self) -> Result<(), HubError> {
        if self.state != DaemonState::Running {
            return Err(HubError::NotRunning);
        }
        let mut first = None;
        for entry in self.modules.iter_mut().rev() {
            let result = entry.module.on_stop(&mut self.hub);
            keep_first(&mut first, &entry.id, "on_stop", result);
            tracing::info!(module = %entry.id, "module stopped");
        }
        self.hub.shutdown();
        self.state = DaemonState::Stopped;
        first.map_or(Ok(()), Err)
    }

    /// Call `on_destroy` on every module in reverse order.
    ///
    /// # Errors
    ///
    /// Every module is destroyed regardless; the first failure is
    /// returned. [`HubError::AlreadyRunning`] while running.
    pub fn destroy(&mut self) -> Result<(), HubError> {
        match self.state {
            DaemonState::Created | DaemonState::Stopped => {}
            DaemonState::Idle => return Ok(()),
            DaemonState::Running => return Err(HubError::AlreadyRunning),
        }
        let mut first = None;
        for entry in self.modules.iter_mut().rev() {
            keep_first(&mut first, &entry.id, "on_destroy", entry.module.on_destroy());
        }
        self.modules.clear();
        self.state = DaemonState::Idle;
        first.map_or(Ok(()), Err)
    }
}
