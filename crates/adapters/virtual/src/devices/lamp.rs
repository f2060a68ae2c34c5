//! Virtual lamp: a `state` service holding `0` (off) or `1` (on).

use homeport_app::handle::HubHandle;
use homeport_domain::attribute::keys;
use homeport_domain::error::HubError;
use homeport_domain::method::Method;
use homeport_domain::model::{Device, Parameter, Service, UserData};
use homeport_domain::request::{Outcome, Request};
use homeport_domain::status::Status;
use homeport_domain::value::Value;

use super::plain;

pub const STATE: &str = "state";
pub const VALUE: &str = "value";

#[derive(Debug, Default)]
struct LampState {
    on: bool,
}

fn reading(on: bool) -> Value {
    plain(if on { "1" } else { "0" })
}

fn parse(value: &Value) -> Option<bool> {
    match value.as_text()?.trim() {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

fn get(data: Option<&mut UserData>, request: Request) -> Outcome {
    match data.and_then(UserData::downcast_mut::<LampState>) {
        Some(state) => Outcome::value(request, Status::OK, reading(state.on)),
        None => Outcome::status(request, Status::INTERNAL_SERVER_ERROR),
    }
}

fn put(handle: &HubHandle, data: Option<&mut UserData>, request: Request) -> Outcome {
    let Some(state) = data.and_then(UserData::downcast_mut::<LampState>) else {
        return Outcome::status(request, Status::INTERNAL_SERVER_ERROR);
    };
    let Some(on) = request.value().and_then(parse) else {
        return Outcome::status(request, Status::BAD_REQUEST);
    };
    if state.on != on {
        state.on = on;
        tracing::debug!(service = %request.service(), on, "lamp switched");
        if let Err(err) = handle.changed(request.service().clone(), reading(on)) {
            tracing::warn!(error = %err, "lamp change not published");
        }
    }
    Outcome::value(request, Status::OK, reading(on))
}

/// Build lamp number `index`, publishing its changes through `handle`.
///
/// # Errors
///
/// Returns a validation error if a builder fails.
pub fn lamp(index: usize, handle: &HubHandle) -> Result<Device, HubError> {
    let notifier = handle.clone();
    let value = Parameter::builder()
        .id(VALUE)
        .attribute(keys::TYPE, "int")
        .attribute(keys::MIN, "0")
        .attribute(keys::MAX, "1")
        .build()?;
    let state = Service::builder()
        .id(STATE)
        .attribute(keys::TYPE, "switch")
        .data(UserData::new(LampState::default()))
        .action(Method::Get, get)
        .action(Method::Put, move |data, request| put(&notifier, data, request))
        .parameter(value)
        .build()?;

    Device::builder()
        .id(format!("lamp{index}"))
        .attribute(keys::DESCRIPTION, format!("Virtual lamp {index}"))
        .attribute(keys::VENDOR, "homeport")
        .attribute(keys::PRODUCT, "VLamp-1")
        .service(state)
        .build()
}
