//! Request/Response Engine.
//!
//! A submitted request ends in exactly one of four states:
//!
//! | State | Action invoked | Response |
//! |-------|----------------|----------|
//! | [`Dispatch::NotFound`] | no | `404`, built by the engine |
//! | [`Dispatch::MethodNotAllowed`] | no | `405`, built by the engine |
//! | [`Dispatch::Completed`] | yes | returned by the action |
//! | [`Dispatch::Pending`] | yes | sent later by whoever kept the request |
//!
//! Responses are never delivered inline: the controller marshals them back
//! so the completion callback runs on a later iteration.

use std::fmt;

use homeport_domain::request::{Outcome, Request, Response};
use homeport_domain::status::Status;
use homeport_domain::store::Store;

/// How the engine disposed of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The service identity did not resolve.
    NotFound,
    /// The service has no action bound for the method.
    MethodNotAllowed,
    /// The action answered immediately with this status.
    Completed(Status),
    /// The action deferred its answer.
    Pending,
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("not found"),
            Self::MethodNotAllowed => f.write_str("method not allowed"),
            Self::Completed(status) => write!(f, "completed ({status})"),
            Self::Pending => f.write_str("pending"),
        }
    }
}

/// Resolve `request` against `store` and run the bound action.
///
/// Returns the dispatch state and, unless the action deferred, the response
/// that must be marshaled back to the caller.
pub fn dispatch(store: &mut Store, request: Request) -> (Dispatch, Option<Response>) {
    let service = request.service().clone();
    let method = request.method();

    let action = match store.action(&service, method) {
        Ok(Some(action)) => action,
        Ok(None) => {
            let response = Response::new(request, Status::METHOD_NOT_ALLOWED);
            return (Dispatch::MethodNotAllowed, Some(response));
        }
        Err(_) => {
            let response = Response::new(request, Status::NOT_FOUND);
            return (Dispatch::NotFound, Some(response));
        }
    };

    let data = store.data_mut(&service).ok().flatten();
    match action(data, request) {
        Outcome::Immediate(response) => (Dispatch::Completed(response.status()), Some(response)),
        Outcome::Deferred => (Dispatch::Pending, None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use homeport_domain::id::HubId;
    use homeport_domain::method::Method;
    use homeport_domain::model::{Adapter, Device, Service, UserData};
    use homeport_domain::reference::ServiceRef;
    use homeport_domain::value::Value;

    use super::*;

    fn store_with(service: Service) -> (Store, ServiceRef) {
        let mut store = Store::new(HubId::new());
        let adapter = Adapter::builder()
            .id("A1")
            .device(Device::builder().id("D1").service(service).build().unwrap())
            .build()
            .unwrap();
        let adapter = store.attach_adapter(adapter).unwrap();
        let service = adapter.device("D1").unwrap().service("S1").unwrap();
        (store, service)
    }

    #[test]
    fn should_complete_with_action_response() {
        let service = Service::builder()
            .id("S1")
            .action(Method::Get, |_, request| {
                Outcome::value(request, Status::OK, Value::text("42"))
            })
            .build()
            .unwrap();
        let (mut store, target) = store_with(service);

        let (dispatch, response) = dispatch(&mut store, Request::detached(target, Method::Get));

        assert_eq!(dispatch, Dispatch::Completed(Status::OK));
        let response = response.unwrap();
        assert_eq!(response.value().and_then(Value::as_text), Some("42"));
    }

    #[test]
    fn should_answer_405_without_invoking_any_action() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let service = Service::builder()
            .id("S1")
            .action(Method::Get, move |_, request| {
                counter.fetch_add(1, Ordering::SeqCst);
                Outcome::status(request, Status::OK)
            })
            .build()
            .unwrap();
        let (mut store, target) = store_with(service);

        let (dispatch, response) = dispatch(&mut store, Request::detached(target, Method::Put));

        assert_eq!(dispatch, Dispatch::MethodNotAllowed);
        assert_eq!(response.unwrap().status(), Status::METHOD_NOT_ALLOWED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn should_answer_404_when_service_not_attached() {
        let (mut store, target) = store_with(Service::new("S1").unwrap());
        let missing = target.device().service("S2").unwrap();

        let (dispatch, response) = dispatch(&mut store, Request::detached(missing, Method::Get));

        assert_eq!(dispatch, Dispatch::NotFound);
        assert_eq!(response.unwrap().status(), Status::NOT_FOUND);
    }

    #[test]
    fn should_hand_service_data_to_action() {
        let service = Service::builder()
            .id("S1")
            .data(UserData::new(0_u32))
            .action(Method::Put, |data, request| {
                let hits = data.and_then(UserData::downcast_mut::<u32>);
                match hits {
                    Some(hits) => {
                        *hits += 1;
                        Outcome::value(request, Status::OK, Value::text(hits.to_string()))
                    }
                    None => Outcome::status(request, Status::INTERNAL_SERVER_ERROR),
                }
            })
            .build()
            .unwrap();
        let (mut store, target) = store_with(service);

        dispatch(&mut store, Request::detached(target.clone(), Method::Put));
        let (_, response) = dispatch(&mut store, Request::detached(target, Method::Put));

        assert_eq!(response.unwrap().value().and_then(Value::as_text), Some("2"));
    }

    #[test]
    fn should_stay_pending_when_action_defers() {
        let service = Service::builder()
            .id("S1")
            .action(Method::Get, |_, request| {
                drop(request);
                Outcome::Deferred
            })
            .build()
            .unwrap();
        let (mut store, target) = store_with(service);

        let (dispatch, response) = dispatch(&mut store, Request::detached(target, Method::Get));

        assert_eq!(dispatch, Dispatch::Pending);
        assert!(response.is_none());
    }
}
