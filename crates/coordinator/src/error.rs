//! Coordinator error taxonomy.
//!
//! Codes are stable and embedded in the message so failures stay diagnosable
//! across process boundaries.

use thiserror::Error;

use stepline_core::{ChunkId, InstanceId};

use crate::persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No definition registered under this job type. Start-instance caller error.
    #[error("SL-0201: unknown job type: {0}")]
    UnknownJobType(String),

    /// A notification (or stored instance) references a definition version this
    /// process does not know. Retryable at the transport level: redelivery to a
    /// differently-configured process could succeed.
    #[error("SL-0202: unknown job definition ID[{job_type}] version[{version}]")]
    UnknownDefinition { job_type: String, version: u32 },

    /// Parameter validation failed. Never retried; the message aggregates all
    /// violations deterministically (structural first, custom after).
    #[error(
        "SL-0203: failed to validate parameters for job of type {job_type}:{}",
        render_violations(.violations)
    )]
    InvalidParameters {
        job_type: String,
        violations: Vec<String>,
    },

    #[error("SL-0204: job instance not found: {0}")]
    InstanceNotFound(InstanceId),

    /// A notification names a step id the resolved definition does not contain.
    #[error("SL-0205: unknown step {step_id} in job definition {job_type} version {version}")]
    UnknownStep {
        job_type: String,
        version: u32,
        step_id: String,
    },

    /// A step worker failed. The chunk is already marked errored by the time
    /// this propagates; retry policy belongs to the transport.
    #[error("SL-0206: worker failed for chunk {chunk_id}: {message}")]
    WorkerFailure { chunk_id: ChunkId, message: String },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("SL-0207: failed to publish work notification: {0}")]
    Channel(String),

    /// Stored parameters could not be deserialized/redacted on the read path.
    #[error("SL-0208: stored parameters could not be processed: {0}")]
    ParameterPayload(String),
}

fn render_violations(violations: &[String]) -> String {
    violations
        .iter()
        .map(|v| format!("\n * {v}"))
        .collect::<String>()
}
