//! Observability helpers for stepline processes.

pub mod tracing;

pub use tracing::init;
