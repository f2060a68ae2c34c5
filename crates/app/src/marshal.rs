//! Task Marshal: hand work from any thread to the controller.
//!
//! One FIFO queue per category plus a single wake signal. Submitting takes
//! ownership of the payload, enqueues it and wakes the controller; it never
//! blocks beyond the queue lock. The controller drains a *snapshot* of every
//! queue per iteration, so anything submitted while a drain is in progress
//! (including from the controller itself) runs on a later iteration.
//!
//! Items within one queue are handled in submission order. There is no
//! ordering across queues.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use homeport_domain::error::HubError;
use homeport_domain::reference::{DeviceRef, ServiceRef};
use homeport_domain::request::{Request, Response};
use homeport_domain::value::Value;
use tokio::sync::Notify;

use crate::hub::Hub;

/// Closure run on the controller with exclusive access to the hub.
pub type Task = Box<dyn FnOnce(&mut Hub) + Send>;

/// A device entering or leaving the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Attached(DeviceRef),
    Detached(DeviceRef),
}

/// A value-change notification for a service.
#[derive(Debug, Clone)]
pub struct Change {
    pub service: ServiceRef,
    pub value: Value,
}

struct Queue<T> {
    items: Mutex<VecDeque<T>>,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Queue<T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Push unless `closed` is set. The flag is checked under the queue lock
    /// so a push never races past a closing drain.
    fn push(&self, item: T, closed: &AtomicBool) -> Result<(), HubError> {
        let mut items = self.lock();
        if closed.load(Ordering::SeqCst) {
            return Err(HubError::NotRunning);
        }
        items.push_back(item);
        Ok(())
    }

    fn drain(&self) -> VecDeque<T> {
        std::mem::take(&mut *self.lock())
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Everything drained from the marshal in one controller iteration.
pub(crate) struct Batch {
    pub tasks: VecDeque<Task>,
    pub devices: VecDeque<DeviceEvent>,
    pub changes: VecDeque<Change>,
    pub requests: VecDeque<Request>,
    pub responses: VecDeque<Response>,
}

impl Batch {
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
            + self.devices.len()
            + self.changes.len()
            + self.requests.len()
            + self.responses.len()
    }
}

/// The queues and wake signal shared between a [`Hub`] and its handles.
#[derive(Default)]
pub struct Marshal {
    tasks: Queue<Task>,
    devices: Queue<DeviceEvent>,
    changes: Queue<Change>,
    requests: Queue<Request>,
    responses: Queue<Response>,
    wake: Notify,
    stop: AtomicBool,
    closed: AtomicBool,
}

impl Marshal {
    fn submit<T>(&self, queue: &Queue<T>, item: T) -> Result<(), HubError> {
        queue.push(item, &self.closed)?;
        self.wake.notify_one();
        Ok(())
    }

    /// Queue a closure for the controller.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] once the marshal is closed.
    pub fn task(&self, task: Task) -> Result<(), HubError> {
        self.submit(&self.tasks, task)
    }

    /// Queue a device attach/detach notification.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] once the marshal is closed.
    pub fn device(&self, event: DeviceEvent) -> Result<(), HubError> {
        self.submit(&self.devices, event)
    }

    /// Queue a value-change notification.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] once the marshal is closed.
    pub fn change(&self, change: Change) -> Result<(), HubError> {
        self.submit(&self.changes, change)
    }

    /// Queue a request for dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] once the marshal is closed.
    pub fn request(&self, request: Request) -> Result<(), HubError> {
        self.submit(&self.requests, request)
    }

    /// Queue a response for delivery to its request's callback.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::NotRunning`] once the marshal is closed.
    pub fn response(&self, response: Response) -> Result<(), HubError> {
        self.submit(&self.responses, response)
    }

    /// Number of items waiting across all queues.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.len()
            + self.devices.len()
            + self.changes.len()
            + self.requests.len()
            + self.responses.len()
    }

    /// Ask the controller loop to return after its current iteration.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until something is submitted or a stop is requested.
    pub(crate) async fn notified(&self) {
        self.wake.notified().await;
    }

    pub(crate) fn drain(&self) -> Batch {
        Batch {
            tasks: self.tasks.drain(),
            devices: self.devices.drain(),
            changes: self.changes.drain(),
            requests: self.requests.drain(),
            responses: self.responses.drain(),
        }
    }

    /// Refuse further submissions and hand back whatever is still queued.
    pub(crate) fn close(&self) -> Batch {
        self.closed.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        self.drain()
    }
}
