//! Definition/registry error model.

use thiserror::Error;

/// A malformed or duplicate job definition.
///
/// Fatal at startup, never raised during steady-state processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("SL-0101: job definition {job_type} version {version} is already registered")]
    DuplicateDefinition { job_type: String, version: u32 },

    #[error("SL-0102: duplicate step id {step_id} in job definition {job_type}")]
    DuplicateStepId { job_type: String, step_id: String },

    #[error(
        "SL-0103: step type chain mismatch in {job_type}: step {from_step} produces {output_type} but step {to_step} expects {input_type}"
    )]
    TypeChainMismatch {
        job_type: String,
        from_step: String,
        to_step: String,
        output_type: String,
        input_type: String,
    },

    #[error("SL-0104: job definition {job_type} has no steps")]
    NoSteps { job_type: String },

    #[error("SL-0105: invalid version {version} for job definition {job_type} (must be >= 1)")]
    InvalidVersion { job_type: String, version: u32 },

    #[error("SL-0106: first step {step_id} of {job_type} must accept the void payload")]
    FirstStepInput { job_type: String, step_id: String },

    #[error("SL-0107: last step {step_id} of {job_type} must produce the void payload")]
    LastStepOutput { job_type: String, step_id: String },
}
