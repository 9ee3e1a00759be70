//! Data sink: the worker's output channel.
//!
//! Workers are synchronous from the coordinator's perspective, so the sink is
//! a plain accumulator drained after the worker returns. No concurrency
//! primitive needed.

use serde_json::Value;
use stepline_core::WorkPayload;

/// Collects one worker invocation's emitted payloads and recovered errors.
///
/// Each accepted payload becomes a work chunk for the next step, in emission
/// order. Recovered errors are non-fatal; they are aggregated into a single
/// error-count increment on the chunk.
#[derive(Debug)]
pub struct DataSink<O> {
    outputs: Vec<O>,
    recovered_errors: Vec<String>,
}

impl<O: WorkPayload> DataSink<O> {
    pub(crate) fn new() -> Self {
        Self {
            outputs: Vec::new(),
            recovered_errors: Vec::new(),
        }
    }

    /// Emit one downstream payload.
    pub fn accept(&mut self, output: O) {
        self.outputs.push(output);
    }

    /// Record a non-fatal error message. Does not stop execution.
    pub fn recovered_error(&mut self, message: impl Into<String>) {
        self.recovered_errors.push(message.into());
    }

    pub(crate) fn into_parts(self) -> (Vec<O>, Vec<String>) {
        (self.outputs, self.recovered_errors)
    }
}

/// Serialized drain of one invocation's sink, as the coordinator sees it.
#[derive(Debug, Default)]
pub struct SinkDrain {
    pub outputs: Vec<Value>,
    pub recovered_errors: Vec<String>,
}
