//! JSON snapshot of the live entity tree.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use homeport_domain::attribute::Attributes;
use homeport_domain::error::HubError;
use homeport_domain::id::HubId;
use homeport_domain::method::Method;
use homeport_domain::reference::{AdapterRef, DeviceRef, ServiceRef};
use homeport_domain::store::Store;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ConfigurationView {
    pub hub: HubId,
    pub adapters: Vec<AdapterView>,
}

#[derive(Debug, Serialize)]
pub struct AdapterView {
    pub id: String,
    pub attributes: Attributes,
    pub devices: Vec<DeviceView>,
}

#[derive(Debug, Serialize)]
pub struct DeviceView {
    pub id: String,
    pub attributes: Attributes,
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Serialize)]
pub struct ServiceView {
    pub id: String,
    pub attributes: Attributes,
    pub methods: Vec<Method>,
    pub parameters: Vec<ParameterView>,
}

#[derive(Debug, Serialize)]
pub struct ParameterView {
    pub id: String,
    pub attributes: Attributes,
}

fn service_view(store: &Store, service: &ServiceRef) -> Result<ServiceView, HubError> {
    let parameters = store
        .parameters(service)?
        .iter()
        .map(|parameter| {
            Ok(ParameterView {
                id: parameter.id().to_string(),
                attributes: store.attributes(parameter)?.clone(),
            })
        })
        .collect::<Result<_, HubError>>()?;
    Ok(ServiceView {
        id: service.id().to_string(),
        attributes: store.attributes(service)?.clone(),
        methods: store.methods(service)?,
        parameters,
    })
}

fn device_view(store: &Store, device: &DeviceRef) -> Result<DeviceView, HubError> {
    let services = store
        .services(device)?
        .iter()
        .map(|service| service_view(store, service))
        .collect::<Result<_, _>>()?;
    Ok(DeviceView {
        id: device.id().to_string(),
        attributes: store.attributes(device)?.clone(),
        services,
    })
}

fn adapter_view(store: &Store, adapter: &AdapterRef) -> Result<AdapterView, HubError> {
    let devices = store
        .devices(adapter)?
        .iter()
        .map(|device| device_view(store, device))
        .collect::<Result<_, _>>()?;
    Ok(AdapterView {
        id: adapter.id().to_string(),
        attributes: store.attributes(adapter)?.clone(),
        devices,
    })
}

/// Copy the live tree out of `store`.
///
/// # Errors
///
/// Only fails if the store is inconsistent with its own enumeration.
pub fn snapshot(store: &Store) -> Result<ConfigurationView, HubError> {
    let adapters = store
        .adapters()
        .iter()
        .map(|adapter| adapter_view(store, adapter))
        .collect::<Result<_, _>>()?;
    Ok(ConfigurationView {
        hub: store.hub(),
        adapters,
    })
}

/// `GET /api/configuration`
pub async fn get(State(state): State<AppState>) -> Result<Json<ConfigurationView>, ApiError> {
    let view = state.handle.query(|hub| snapshot(hub.store())).await??;
    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use homeport_domain::model::{Adapter, Device, Parameter, Service};
    use homeport_domain::request::Outcome;
    use homeport_domain::status::Status;

    use super::*;

    #[test]
    fn should_copy_tree_with_methods_and_attributes() {
        let mut store = Store::new(HubId::new());
        let service = Service::builder()
            .id("S1")
            .attribute("type", "switch")
            .action(Method::Put, |_, request| Outcome::status(request, Status::OK))
            .parameter(Parameter::builder().id("P1").attribute("unit", "C").build().unwrap())
            .build()
            .unwrap();
        let adapter = Adapter::builder()
            .id("A1")
            .device(Device::builder().id("D1").service(service).build().unwrap())
            .build()
            .unwrap();
        store.attach_adapter(adapter).unwrap();

        let json = serde_json::to_value(snapshot(&store).unwrap()).unwrap();

        let service = &json["adapters"][0]["devices"][0]["services"][0];
        assert_eq!(service["id"], "S1");
        assert_eq!(service["attributes"]["type"], "switch");
        assert_eq!(service["methods"], serde_json::json!(["PUT"]));
        assert_eq!(service["parameters"][0]["attributes"]["unit"], "C");
        assert_eq!(json["hub"], store.hub().to_string());
    }

    #[test]
    fn should_return_empty_list_for_empty_store() {
        let store = Store::new(HubId::new());
        let view = snapshot(&store).unwrap();
        assert!(view.adapters.is_empty());
    }
}
