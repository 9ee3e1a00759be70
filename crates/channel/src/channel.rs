//! Work-notification channel abstraction (mechanics only).
//!
//! The channel is intentionally lightweight and transport-agnostic: it works
//! with in-memory channels, message brokers, or queue services. Delivery is
//! at-least-once: a notification may arrive more than once, and handlers stay
//! safe because the chunk claim in persistence is the idempotency gate.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::notification::WorkNotification;

/// A subscription to the work-notification stream.
///
/// Each subscription receives a copy of every published notification
/// (broadcast semantics). Designed for single-threaded consumption; spin up
/// one subscription per receiver loop.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<WorkNotification>,
}

impl Subscription {
    pub fn new(receiver: Receiver<WorkNotification>) -> Self {
        Self { receiver }
    }

    /// Block until the next notification is available.
    pub fn recv(&self) -> Result<WorkNotification, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notification without blocking.
    pub fn try_recv(&self) -> Result<WorkNotification, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a notification.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<WorkNotification, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Producer/receiver contract for work notifications.
///
/// `publish` failures are surfaced to the caller, which decides whether to
/// retry; receiver-side handler failures must be surfaced back to the
/// transport (not swallowed) so its redelivery policy can apply.
pub trait WorkChannel: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, notification: WorkNotification) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription;
}

impl<C> WorkChannel for Arc<C>
where
    C: WorkChannel + ?Sized,
{
    type Error = C::Error;

    fn publish(&self, notification: WorkNotification) -> Result<(), Self::Error> {
        (**self).publish(notification)
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }
}
