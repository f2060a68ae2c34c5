//! Request/Response transaction types.
//!
//! A [`Request`] targets a service by reference and carries a method, an
//! optional [`Value`] and an optional completion callback. Actions answer
//! with an [`Outcome`]: either a [`Response`] right away or
//! [`Outcome::Deferred`], in which case whoever holds the request later
//! builds the response and hands it back to the hub.

use std::fmt;

use crate::method::Method;
use crate::reference::ServiceRef;
use crate::status::Status;
use crate::value::Value;

/// Completion callback of a request. Runs at most once, on the controller.
pub type ResponseCallback = Box<dyn FnOnce(Response) + Send>;

/// A method call against a service.
pub struct Request {
    service: ServiceRef,
    method: Method,
    value: Option<Value>,
    on_response: Option<ResponseCallback>,
}

impl Request {
    /// Create a request whose response is delivered to `on_response`.
    pub fn new<F>(service: ServiceRef, method: Method, on_response: F) -> Self
    where
        F: FnOnce(Response) + Send + 'static,
    {
        Self {
            service,
            method,
            value: None,
            on_response: Some(Box::new(on_response)),
        }
    }

    /// Create a request nobody waits on.
    #[must_use]
    pub fn detached(service: ServiceRef, method: Method) -> Self {
        Self {
            service,
            method,
            value: None,
            on_response: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn take_value(&mut self) -> Option<Value> {
        self.value.take()
    }

    /// Whether a completion callback is still pending on this request.
    #[must_use]
    pub fn expects_response(&self) -> bool {
        self.on_response.is_some()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("service", &self.service)
            .field("method", &self.method)
            .field("value", &self.value)
            .field("expects_response", &self.expects_response())
            .finish()
    }
}

/// The answer to a [`Request`]. Owns the request it answers.
pub struct Response {
    request: Request,
    status: Status,
    value: Option<Value>,
}

impl Response {
    #[must_use]
    pub fn new(request: Request, status: Status) -> Self {
        Self {
            request,
            status,
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn take_value(&mut self) -> Option<Value> {
        self.value.take()
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn service(&self) -> &ServiceRef {
        &self.request.service
    }

    /// Hand the response to the request's completion callback.
    ///
    /// Returns `false` if the request had no callback, in which case the
    /// response is simply dropped.
    pub fn complete(mut self) -> bool {
        match self.request.on_response.take() {
            Some(callback) => {
                callback(self);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("service", &self.request.service)
            .field("method", &self.request.method)
            .field("status", &self.status)
            .field("value", &self.value)
            .finish()
    }
}

/// What an action did with a request.
#[derive(Debug)]
pub enum Outcome {
    /// The request is answered now.
    Immediate(Response),
    /// The action kept the request and will respond later, from any thread.
    Deferred,
}

impl Outcome {
    /// Shortcut for `Immediate(Response::new(request, status))`.
    #[must_use]
    pub fn status(request: Request, status: Status) -> Self {
        Self::Immediate(Response::new(request, status))
    }

    /// Shortcut for an immediate response carrying `value`.
    #[must_use]
    pub fn value(request: Request, status: Status, value: Value) -> Self {
        Self::Immediate(Response::new(request, status).with_value(value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::id::HubId;

    fn service() -> ServiceRef {
        ServiceRef::new(HubId::new(), "a", "d", "s").unwrap()
    }

    #[test]
    fn should_invoke_callback_with_response_when_completed() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let request = Request::new(service(), Method::Get, move |response: Response| {
            *sink.lock().unwrap() = Some((response.status(), response.value().cloned()));
        });

        let delivered = Response::new(request, Status::OK)
            .with_value(Value::text("42"))
            .complete();

        assert!(delivered);
        let (status, value) = seen.lock().unwrap().take().unwrap();
        assert_eq!(status, Status::OK);
        assert_eq!(value.unwrap().as_text(), Some("42"));
    }

    #[test]
    fn should_return_false_when_request_is_detached() {
        let request = Request::detached(service(), Method::Put).with_value(Value::text("1"));
        assert!(!Response::new(request, Status::OK).complete());
    }

    #[test]
    fn should_hide_callback_once_consumed() {
        let request = Request::new(service(), Method::Get, |response: Response| {
            assert!(!response.request().expects_response());
        });
        assert!(request.expects_response());
        Response::new(request, Status::NO_CONTENT).complete();
    }

    #[test]
    fn should_build_immediate_outcome_with_value() {
        let request = Request::detached(service(), Method::Get);
        let outcome = Outcome::value(request, Status::OK, Value::text("on"));
        match outcome {
            Outcome::Immediate(response) => {
                assert_eq!(response.status(), Status::OK);
                assert_eq!(response.value().and_then(Value::as_text), Some("on"));
            }
            Outcome::Deferred => panic!("expected an immediate outcome"),
        }
    }
}
