//! Opaque payload contract for step-to-step data handoff.
//!
//! The coordinator never looks inside a payload: chunks carry
//! `serde_json::Value` and deserialization only happens at the worker seam.
//! `WorkPayload` is the marker implemented by every concrete payload type.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Marker for payload types carried between steps.
pub trait WorkPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable tag recorded on each step definition and used to verify the
    /// output→input chain when a definition is registered.
    fn type_tag() -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// The terminal "no data" payload.
///
/// The first step of a pipeline declares this as its input and the last step
/// as its output. Serializes to JSON `null`, which is what [`is_void`] keys on.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidPayload;

impl WorkPayload for VoidPayload {
    fn type_tag() -> &'static str {
        "void"
    }
}

/// Whether a serialized payload is the void payload.
pub fn is_void(value: &serde_json::Value) -> bool {
    value.is_null()
}
