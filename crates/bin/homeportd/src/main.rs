//! # homeportd: homeport daemon
//!
//! Composition root that registers the modules and runs the hub controller.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise `tracing`
//! - Register the enabled modules with the [`Daemon`]
//! - Create the modules, hand them their options, start them
//! - Run the controller loop until SIGINT
//! - Stop and destroy the modules in reverse order
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no hub logic belongs here.

mod config;

use homeport_adapter_http_axum::RestModule;
use homeport_adapter_virtual::VirtualModule;
use homeport_app::daemon::Daemon;
use homeport_domain::error::HubError;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

fn configure(daemon: &mut Daemon, config: &Config) -> Result<(), HubError> {
    if config.modules.virtual_enabled {
        daemon.add_module(homeport_adapter_virtual::MODULE_ID, VirtualModule::new())?;
    }
    if config.modules.rest_enabled {
        daemon.add_module(homeport_adapter_http_axum::MODULE_ID, RestModule::new())?;
    }
    daemon.create()?;
    for (key, value) in config.module_options() {
        daemon.parse_option(&key, &value)?;
    }
    daemon.start()
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    let mut daemon = Daemon::new();
    if let Err(err) = configure(&mut daemon, &config) {
        tracing::error!(error = %err, "failed to start homeportd");
        daemon.destroy()?;
        return Err(err.into());
    }
    tracing::info!(
        hub = %daemon.hub().id(),
        modules = ?daemon.modules().collect::<Vec<_>>(),
        "homeportd started"
    );

    daemon.run_until(shutdown_signal()).await?;

    let stopped = daemon.stop();
    let destroyed = daemon.destroy();
    stopped?;
    destroyed?;
    tracing::info!("homeportd stopped");
    Ok(())
}
