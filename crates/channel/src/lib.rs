//! `stepline-channel` — the asynchronous work-notification channel.
//!
//! Carries "a chunk is ready to run" notifications from the coordinator's
//! producer side back to a coordinator receiver (possibly in another process).
//! The contract is transport-agnostic; an in-memory fan-out implementation is
//! provided for tests and single-process deployments.

pub mod channel;
pub mod in_memory;
pub mod notification;

pub use channel::{Subscription, WorkChannel};
pub use in_memory::{InMemoryChannelError, InMemoryWorkChannel};
pub use notification::WorkNotification;
