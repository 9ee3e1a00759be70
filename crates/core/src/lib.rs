//! `stepline-core` — foundation building blocks for the batch orchestration core.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod payload;
pub mod status;

pub use error::CoreError;
pub use id::{ChunkId, InstanceId};
pub use payload::{VoidPayload, WorkPayload, is_void};
pub use status::Status;
