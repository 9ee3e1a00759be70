//! In-memory work channel for tests and single-process deployments.

use std::sync::{Mutex, mpsc};

use thiserror::Error;

use crate::channel::{Subscription, WorkChannel};
use crate::notification::WorkNotification;

#[derive(Debug, Error)]
pub enum InMemoryChannelError {
    /// Publish failed due to internal lock poisoning.
    #[error("work channel lock poisoned")]
    Poisoned,
}

/// In-memory pub/sub channel.
///
/// - No IO / no async
/// - Best-effort fan-out
/// - At-least-once acceptable (the chunk claim makes handlers idempotent)
#[derive(Debug, Default)]
pub struct InMemoryWorkChannel {
    subscribers: Mutex<Vec<mpsc::Sender<WorkNotification>>>,
}

impl InMemoryWorkChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkChannel for InMemoryWorkChannel {
    type Error = InMemoryChannelError;

    fn publish(&self, notification: WorkNotification) -> Result<(), Self::Error> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryChannelError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(notification.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
