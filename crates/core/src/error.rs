//! Core error model.

use thiserror::Error;

/// Errors raised by the core primitives themselves.
///
/// Keep this focused on deterministic failures (identifier parsing). Everything
/// orchestration-related lives in the coordinator's error taxonomy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("SL-0001: invalid identifier: {0}")]
    InvalidId(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
