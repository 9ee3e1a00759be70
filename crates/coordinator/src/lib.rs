//! `stepline-coordinator` — the batch job orchestration core.
//!
//! Drives a multi-step, asynchronous job to completion: instance lifecycle
//! operations on one side, message-driven step execution on the other, with
//! the durable store ([`persistence::JobPersistence`]) as the single authority
//! on chunk claims and state transitions.

pub mod chunk;
pub mod coordinator;
pub mod error;
pub mod instance;
pub mod persistence;

#[cfg(test)]
mod integration_tests;

pub use chunk::WorkChunk;
pub use coordinator::{JobCoordinator, WorkChannelListener};
pub use error::CoordinatorError;
pub use instance::{JobInstance, JobInstanceStartRequest};
pub use persistence::{InMemoryJobPersistence, JobPersistence, PersistenceError};
