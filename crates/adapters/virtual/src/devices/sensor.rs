//! Virtual temperature sensor.
//!
//! Reads are answered asynchronously: the `GET` action hands the request to
//! a worker thread, which responds through the hub handle. The same worker
//! publishes a new reading every interval.

use std::sync::mpsc::{self, RecvTimeoutError, SendError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use homeport_app::handle::HubHandle;
use homeport_domain::attribute::keys;
use homeport_domain::error::HubError;
use homeport_domain::method::Method;
use homeport_domain::model::{Device, Parameter, Service};
use homeport_domain::reference::ServiceRef;
use homeport_domain::request::{Outcome, Request, Response};
use homeport_domain::status::Status;
use homeport_domain::value::Value;

use super::plain;

pub const SENSOR: &str = "sensor0";
pub const TEMPERATURE: &str = "temperature";
pub const VALUE: &str = "value";

const WORKER_THREAD: &str = "homeport-virtual-sensor";

/// Message to the sensor worker.
#[derive(Debug)]
pub enum Command {
    Read(Request),
    Stop,
}

/// Triangle wave between 21.5 and 22.0 °C.
#[derive(Debug, Default)]
struct Thermometer {
    tick: u32,
}

impl Thermometer {
    fn celsius(&self) -> f64 {
        let phase = self.tick % 10;
        let step = if phase < 5 { phase } else { 10 - phase };
        21.5 + f64::from(step) * 0.1
    }

    fn advance(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    fn reading(&self) -> Value {
        plain(format!("{:.1}", self.celsius()))
    }
}

/// Build the sensor device; reads are forwarded to `commands`.
///
/// # Errors
///
/// Returns a validation error if a builder fails.
pub fn sensor(commands: Sender<Command>) -> Result<Device, HubError> {
    let value = Parameter::builder()
        .id(VALUE)
        .attribute(keys::TYPE, "float")
        .attribute(keys::UNIT, "C")
        .build()?;
    let temperature = Service::builder()
        .id(TEMPERATURE)
        .attribute(keys::TYPE, "temperature")
        .action(Method::Get, move |_, request| {
            if let Err(SendError(Command::Read(request))) = commands.send(Command::Read(request)) {
                return Outcome::status(request, Status::SERVICE_UNAVAILABLE);
            }
            Outcome::Deferred
        })
        .parameter(value)
        .build()?;

    Device::builder()
        .id(SENSOR)
        .attribute(keys::DESCRIPTION, "Virtual temperature sensor")
        .attribute(keys::VENDOR, "homeport")
        .attribute(keys::PRODUCT, "VSensor-1")
        .service(temperature)
        .build()
}

/// Thread answering reads and publishing periodic readings.
#[derive(Debug)]
pub struct SensorWorker {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl SensorWorker {
    /// Start the worker on `receiver`; `commands` must feed that receiver.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Allocation`] if the thread cannot be spawned.
    pub fn spawn(
        handle: HubHandle,
        service: ServiceRef,
        interval: Duration,
        commands: Sender<Command>,
        receiver: mpsc::Receiver<Command>,
    ) -> Result<Self, HubError> {
        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD.to_string())
            .spawn(move || run(&handle, &service, interval, &receiver))
            .map_err(|_| HubError::Allocation("sensor worker"))?;
        Ok(Self {
            commands,
            thread: Some(thread),
        })
    }

    /// Ask the worker to exit and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // the worker may already be gone
        let _ = self.commands.send(Command::Stop);
        if thread.join().is_err() {
            tracing::error!("sensor worker panicked");
        }
    }
}

impl Drop for SensorWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(handle: &HubHandle, service: &ServiceRef, interval: Duration, receiver: &mpsc::Receiver<Command>) {
    let mut thermometer = Thermometer::default();
    tracing::debug!(%service, ?interval, "sensor worker started");
    // reads must not push the next reading back
    let mut next = Instant::now() + interval;
    loop {
        match receiver.recv_timeout(next.saturating_duration_since(Instant::now())) {
            Ok(Command::Read(request)) => {
                let response = Response::new(request, Status::OK).with_value(thermometer.reading());
                if let Err(err) = handle.respond(response) {
                    tracing::warn!(error = %err, "sensor response dropped");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                next += interval;
                thermometer.advance();
                if let Err(err) = handle.changed(service.clone(), thermometer.reading()) {
                    tracing::debug!(error = %err, "sensor reading dropped");
                    if matches!(err, HubError::NotRunning) {
                        break;
                    }
                }
            }
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    tracing::debug!(%service, "sensor worker stopped");
}
