//! # homeport-adapter-virtual
//!
//! Demo module that attaches simulated devices to the hub.
//!
//! ## Provided devices
//!
//! | Device | Service | Methods | Behaviour |
//! |--------|---------|---------|-----------|
//! | `lamp0`…`lampN-1` | `state` | `GET`, `PUT` | Holds `0`/`1`; `PUT` publishes a change when the state flips |
//! | `sensor0` | `temperature` | `GET` | Answered later by a worker thread, which also publishes a reading every interval |
//!
//! ## Options
//!
//! | Option | Default | Meaning |
//! |--------|---------|---------|
//! | `lamps` | `1` | Number of lamps |
//! | `sensor-interval` | `5000` | Milliseconds between sensor readings |

pub mod devices;

use std::sync::mpsc;
use std::time::Duration;

use homeport_app::hub::Hub;
use homeport_app::module::{Module, ModuleContext};
use homeport_domain::attribute::keys;
use homeport_domain::error::{ArgumentError, HubError};
use homeport_domain::model::Adapter;
use homeport_domain::reference::AdapterRef;

use devices::sensor::{self, SensorWorker};

/// Identifier the module is usually registered under.
pub const MODULE_ID: &str = "virtual";
/// Identifier of the adapter the module attaches.
pub const ADAPTER_ID: &str = "virtual";

const DEFAULT_LAMPS: usize = 1;
const DEFAULT_SENSOR_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Debug)]
struct Running {
    adapter: AdapterRef,
    sensor: SensorWorker,
}

/// Module attaching the `virtual` adapter.
#[derive(Debug)]
pub struct VirtualModule {
    lamps: usize,
    sensor_interval: Duration,
    running: Option<Running>,
}

impl Default for VirtualModule {
    fn default() -> Self {
        Self {
            lamps: DEFAULT_LAMPS,
            sensor_interval: DEFAULT_SENSOR_INTERVAL,
            running: None,
        }
    }
}

fn invalid(option: &str, value: &str) -> HubError {
    ArgumentError::InvalidOption {
        option: option.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl VirtualModule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lamps(mut self, lamps: usize) -> Self {
        self.lamps = lamps;
        self
    }

    #[must_use]
    pub fn with_sensor_interval(mut self, interval: Duration) -> Self {
        self.sensor_interval = interval;
        self
    }

    #[must_use]
    pub fn lamps(&self) -> usize {
        self.lamps
    }

    #[must_use]
    pub fn sensor_interval(&self) -> Duration {
        self.sensor_interval
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn build_adapter(&self, hub: &Hub, commands: mpsc::Sender<sensor::Command>) -> Result<Adapter, HubError> {
        let handle = hub.handle();
        let mut builder = Adapter::builder()
            .id(ADAPTER_ID)
            .attribute(keys::DESCRIPTION, "Simulated devices")
            .attribute(keys::NETWORK, "virtual");
        for index in 0..self.lamps {
            builder = builder.device(devices::lamp::lamp(index, &handle)?);
        }
        builder.device(sensor::sensor(commands)?).build()
    }
}

impl Module for VirtualModule {
    fn on_create(&mut self, ctx: &mut ModuleContext) -> Result<(), HubError> {
        ctx.add_option("lamps", "COUNT", "Number of simulated lamps")?;
        ctx.add_option(
            "sensor-interval",
            "MILLISECONDS",
            "Delay between simulated temperature readings",
        )?;
        Ok(())
    }

    fn on_parse_option(&mut self, name: &str, value: &str) -> Result<(), HubError> {
        match name {
            "lamps" => {
                self.lamps = value.parse().map_err(|_| invalid(name, value))?;
            }
            "sensor-interval" => {
                let millis: u64 = value.parse().map_err(|_| invalid(name, value))?;
                if millis == 0 {
                    return Err(invalid(name, value));
                }
                self.sensor_interval = Duration::from_millis(millis);
            }
            _ => return Err(ArgumentError::UnknownOption(name.to_string()).into()),
        }
        Ok(())
    }

    fn on_start(&mut self, hub: &mut Hub) -> Result<(), HubError> {
        if self.running.is_some() {
            return Err(HubError::AlreadyRunning);
        }
        let (commands, receiver) = mpsc::channel();
        let adapter = self.build_adapter(hub, commands.clone())?;
        let adapter = hub.attach_adapter(adapter)?;
        let service = adapter.device(sensor::SENSOR)?.service(sensor::TEMPERATURE)?;

        let sensor = match SensorWorker::spawn(hub.handle(), service, self.sensor_interval, commands, receiver) {
            Ok(sensor) => sensor,
            Err(err) => {
                if let Err(detach) = hub.detach_adapter(&adapter) {
                    tracing::warn!(error = %detach, "virtual adapter not detached");
                }
                return Err(err);
            }
        };
        tracing::info!(adapter = %adapter, lamps = self.lamps, "virtual devices attached");
        self.running = Some(Running { adapter, sensor });
        Ok(())
    }

    fn on_stop(&mut self, hub: &mut Hub) -> Result<(), HubError> {
        let Running { adapter, sensor } = self.running.take().ok_or(HubError::NotRunning)?;
        let detached = hub.detach_adapter(&adapter).map(drop);
        sensor.stop();
        tracing::info!(adapter = %adapter, "virtual devices detached");
        detached
    }
}
