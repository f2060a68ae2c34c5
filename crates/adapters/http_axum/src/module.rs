//! Daemon module serving the HTTP API.

use std::net::SocketAddr;

use homeport_app::hub::Hub;
use homeport_app::module::{Module, ModuleContext};
use homeport_domain::error::{ArgumentError, HubError};
use homeport_domain::id::ListenerId;
use tokio::sync::oneshot;

use crate::api::events;
use crate::router;
use crate::state::AppState;

/// Identifier the module is usually registered under.
pub const MODULE_ID: &str = "rest";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug)]
struct Running {
    address: SocketAddr,
    listener: ListenerId,
    shutdown: oneshot::Sender<()>,
}

/// Serves the REST API and the event stream for the hub it is started on.
///
/// Must be started from within a tokio runtime; the server runs as a task
/// on that runtime next to the controller loop.
#[derive(Debug)]
pub struct RestModule {
    host: String,
    port: u16,
    running: Option<Running>,
}

impl Default for RestModule {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            running: None,
        }
    }
}

impl RestModule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Address the server is listening on, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.address)
    }

    fn bind(&self) -> Result<tokio::net::TcpListener, HubError> {
        let listener = std::net::TcpListener::bind((self.host.as_str(), self.port)).map_err(|err| {
            tracing::error!(host = %self.host, port = self.port, error = %err, "failed to bind http listener");
            HubError::Allocation("http listener")
        })?;
        listener
            .set_nonblocking(true)
            .and_then(|()| tokio::net::TcpListener::from_std(listener))
            .map_err(|err| {
                tracing::error!(error = %err, "failed to register http listener");
                HubError::Allocation("http listener")
            })
    }
}

impl Module for RestModule {
    fn on_create(&mut self, ctx: &mut ModuleContext) -> Result<(), HubError> {
        ctx.add_option("host", "HOST", "Address the HTTP server binds to")?;
        ctx.add_option("port", "PORT", "Port the HTTP server listens on")?;
        Ok(())
    }

    fn on_parse_option(&mut self, name: &str, value: &str) -> Result<(), HubError> {
        let invalid = || ArgumentError::InvalidOption {
            option: name.to_string(),
            value: value.to_string(),
        };
        match name {
            "host" if value.is_empty() => return Err(invalid().into()),
            "host" => self.host = value.to_string(),
            "port" => self.port = value.parse().map_err(|_| invalid())?,
            _ => return Err(ArgumentError::UnknownOption(name.to_string()).into()),
        }
        Ok(())
    }

    fn on_start(&mut self, hub: &mut Hub) -> Result<(), HubError> {
        if self.running.is_some() {
            return Err(HubError::AlreadyRunning);
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(HubError::Allocation("tokio runtime"));
        }
        let listener = self.bind()?;
        let address = listener
            .local_addr()
            .map_err(|_| HubError::Allocation("http listener"))?;

        let sender = events::channel();
        let state = AppState::new(hub.handle(), &sender);
        // the listener owns the only strong sender
        let subscription = hub.subscribe(events::listener(&sender))?;
        drop(sender);
        let (shutdown, signal) = oneshot::channel::<()>();
        let app = router::build(state);
        tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "http server failed");
            }
        });

        tracing::info!(%address, "http server listening");
        self.running = Some(Running {
            address,
            listener: subscription,
            shutdown,
        });
        Ok(())
    }

    fn on_stop(&mut self, hub: &mut Hub) -> Result<(), HubError> {
        let running = self.running.take().ok_or(HubError::NotRunning)?;
        // dropping the listener closes the event channel and open streams
        let unsubscribed = hub.unsubscribe(running.listener).map(drop);
        // the server may have exited on its own
        let _ = running.shutdown.send(());
        tracing::info!(address = %running.address, "http server stopping");
        unsubscribed
    }
}
