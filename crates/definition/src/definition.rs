//! Job definitions: an ordered step pipeline for one job type/version.

use std::collections::HashSet;
use std::marker::PhantomData;

use serde_json::Value;

use stepline_core::{VoidPayload, WorkPayload};

use crate::error::ConfigurationError;
use crate::parameters::{JobParameters, ParameterCodec, ParametersValidator};
use crate::step::StepDefinition;
use crate::worker::StepWorker;

/// Static blueprint of an ordered step pipeline for one job type/version.
///
/// Immutable once built. The (type, version) identity is pinned onto every
/// instance started from it, so deploying a newer version never changes
/// in-flight work.
pub struct JobDefinition {
    job_type: String,
    version: u32,
    description: String,
    steps: Vec<StepDefinition>,
    codec: ParameterCodec,
}

impl JobDefinition {
    /// Start building a definition for the parameter type `P`.
    pub fn builder<P: JobParameters>(
        job_type: impl Into<String>,
        version: u32,
    ) -> JobDefinitionBuilder<P> {
        JobDefinitionBuilder {
            job_type: job_type.into(),
            version,
            description: String::new(),
            validator: None,
            _parameters: PhantomData,
        }
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Locate a step by id, returning its position in the pipeline as well.
    pub fn step(&self, step_id: &str) -> Option<(usize, &StepDefinition)> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, step)| step.step_id() == step_id)
    }

    pub fn first_step(&self) -> &StepDefinition {
        &self.steps[0]
    }

    pub fn is_last_step(&self, index: usize) -> bool {
        index + 1 == self.steps.len()
    }

    /// Run structural + custom validation over a serialized parameter payload.
    ///
    /// A payload that does not deserialize into the declared parameter type is
    /// itself reported as a violation.
    pub fn validate_parameters(&self, parameters: &Value) -> Vec<String> {
        match self.codec.validate(parameters) {
            Ok(violations) => violations,
            Err(e) => vec![format!("parameters - {e}")],
        }
    }

    /// Redacted copy of a serialized parameter payload, for display.
    pub fn redact_parameters(&self, parameters: &Value) -> Result<Value, serde_json::Error> {
        self.codec.redact(parameters)
    }

    /// Re-verify the invariants the typestate builder guarantees.
    ///
    /// The registry runs this on every registration so that definitions
    /// arriving from other construction paths are held to the same rules.
    pub fn verify(&self) -> Result<(), ConfigurationError> {
        if self.version < 1 {
            return Err(ConfigurationError::InvalidVersion {
                job_type: self.job_type.clone(),
                version: self.version,
            });
        }
        let Some(first) = self.steps.first() else {
            return Err(ConfigurationError::NoSteps {
                job_type: self.job_type.clone(),
            });
        };
        if first.input_type() != VoidPayload::type_tag() {
            return Err(ConfigurationError::FirstStepInput {
                job_type: self.job_type.clone(),
                step_id: first.step_id().to_string(),
            });
        }
        let last = self.steps.last().unwrap_or(first);
        if last.output_type() != VoidPayload::type_tag() {
            return Err(ConfigurationError::LastStepOutput {
                job_type: self.job_type.clone(),
                step_id: last.step_id().to_string(),
            });
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.step_id()) {
                return Err(ConfigurationError::DuplicateStepId {
                    job_type: self.job_type.clone(),
                    step_id: step.step_id().to_string(),
                });
            }
        }

        for pair in self.steps.windows(2) {
            if pair[0].output_type() != pair[1].input_type() {
                return Err(ConfigurationError::TypeChainMismatch {
                    job_type: self.job_type.clone(),
                    from_step: pair[0].step_id().to_string(),
                    to_step: pair[1].step_id().to_string(),
                    output_type: pair[0].output_type().to_string(),
                    input_type: pair[1].input_type().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("job_type", &self.job_type)
            .field("version", &self.version)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

/// Builder entry point: identity, description and parameter capabilities.
pub struct JobDefinitionBuilder<P: JobParameters> {
    job_type: String,
    version: u32,
    description: String,
    validator: Option<Box<dyn ParametersValidator<P>>>,
    _parameters: PhantomData<fn(P)>,
}

impl<P: JobParameters> JobDefinitionBuilder<P> {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach a custom parameters validator; its messages are appended after
    /// the structural ones.
    pub fn parameters_validator(mut self, validator: impl ParametersValidator<P> + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Add the first step. Its input is always the void payload; `O` becomes
    /// the required input type of the following step.
    pub fn first_step<O, W>(
        self,
        step_id: impl Into<String>,
        label: impl Into<String>,
        worker: W,
    ) -> StepChainBuilder<P, O>
    where
        O: WorkPayload,
        W: StepWorker<P, VoidPayload, O>,
    {
        StepChainBuilder {
            job_type: self.job_type,
            version: self.version,
            description: self.description,
            validator: self.validator,
            steps: vec![StepDefinition::new::<P, VoidPayload, O, W>(
                step_id.into(),
                label.into(),
                worker,
            )],
            _output: PhantomData,
        }
    }
}

/// Builder state once at least one step exists. `O` is the output type of the
/// most recently added step, which the next step must consume.
pub struct StepChainBuilder<P: JobParameters, O: WorkPayload> {
    job_type: String,
    version: u32,
    description: String,
    validator: Option<Box<dyn ParametersValidator<P>>>,
    steps: Vec<StepDefinition>,
    _output: PhantomData<fn() -> O>,
}

impl<P: JobParameters, O: WorkPayload> StepChainBuilder<P, O> {
    pub fn intermediate_step<O2, W>(
        mut self,
        step_id: impl Into<String>,
        label: impl Into<String>,
        worker: W,
    ) -> StepChainBuilder<P, O2>
    where
        O2: WorkPayload,
        W: StepWorker<P, O, O2>,
    {
        self.steps.push(StepDefinition::new::<P, O, O2, W>(
            step_id.into(),
            label.into(),
            worker,
        ));
        StepChainBuilder {
            job_type: self.job_type,
            version: self.version,
            description: self.description,
            validator: self.validator,
            steps: self.steps,
            _output: PhantomData,
        }
    }

    /// Add the terminal step and build. The terminal output type must carry
    /// the void tag; `verify` rejects anything else before the definition is
    /// handed out.
    pub fn last_step<O2, W>(
        mut self,
        step_id: impl Into<String>,
        label: impl Into<String>,
        worker: W,
    ) -> Result<JobDefinition, ConfigurationError>
    where
        O2: WorkPayload,
        W: StepWorker<P, O, O2>,
    {
        self.steps.push(StepDefinition::new::<P, O, O2, W>(
            step_id.into(),
            label.into(),
            worker,
        ));
        let definition = JobDefinition {
            job_type: self.job_type,
            version: self.version,
            description: self.description,
            steps: self.steps,
            codec: ParameterCodec::new::<P>(self.validator),
        };
        definition.verify()?;
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::DataSink;
    use crate::worker::{RunOutcome, StepExecutionDetails};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Params {
        source: Option<String>,
    }

    impl JobParameters for Params {}

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Row {
        value: String,
    }

    impl WorkPayload for Row {}

    fn two_step(job_type: &str, version: u32) -> Result<JobDefinition, ConfigurationError> {
        two_step_with_ids(job_type, version, "read", "write")
    }

    fn two_step_with_ids(
        job_type: &str,
        version: u32,
        first_id: &str,
        last_id: &str,
    ) -> Result<JobDefinition, ConfigurationError> {
        JobDefinition::builder::<Params>(job_type, version)
            .description("reads rows then writes them")
            .first_step(
                first_id,
                "Read",
                |_details: StepExecutionDetails<Params, VoidPayload>,
                 _sink: &mut DataSink<Row>| Ok(RunOutcome::new(0)),
            )
            .last_step(
                last_id,
                "Write",
                |_details: StepExecutionDetails<Params, Row>,
                 _sink: &mut DataSink<VoidPayload>| Ok(RunOutcome::new(0)),
            )
    }

    #[test]
    fn builder_records_identity_and_type_tags() {
        let definition = two_step("row-copy", 1).unwrap();
        assert_eq!(definition.job_type(), "row-copy");
        assert_eq!(definition.version(), 1);
        assert_eq!(definition.steps().len(), 2);
        assert_eq!(definition.first_step().input_type(), "void");
        assert_eq!(
            definition.steps()[0].output_type(),
            definition.steps()[1].input_type()
        );
        assert_eq!(definition.steps()[1].output_type(), "void");
        assert!(definition.is_last_step(1));
        assert!(!definition.is_last_step(0));
    }

    #[test]
    fn duplicate_step_ids_are_rejected_at_build() {
        let err = two_step_with_ids("row-copy", 1, "same", "same").unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateStepId { .. }));
    }

    #[test]
    fn version_zero_is_rejected() {
        let err = two_step("row-copy", 0).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidVersion { .. }));
    }

    #[test]
    fn terminal_step_with_a_data_output_is_rejected() {
        let err = JobDefinition::builder::<Params>("row-copy", 1)
            .first_step(
                "read",
                "Read",
                |_details: StepExecutionDetails<Params, VoidPayload>,
                 _sink: &mut DataSink<Row>| Ok(RunOutcome::new(0)),
            )
            .last_step(
                "write",
                "Write",
                |_details: StepExecutionDetails<Params, Row>, _sink: &mut DataSink<Row>| {
                    Ok(RunOutcome::new(0))
                },
            )
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::LastStepOutput { .. }));
    }

    #[test]
    fn step_lookup_returns_pipeline_position() {
        let definition = two_step("row-copy", 1).unwrap();
        let (index, step) = definition.step("write").unwrap();
        assert_eq!(index, 1);
        assert_eq!(step.label(), "Write");
        assert!(definition.step("missing").is_none());
    }

    #[test]
    fn unparseable_parameters_become_a_violation() {
        let definition = two_step("row-copy", 1).unwrap();
        let violations = definition.validate_parameters(&serde_json::json!("not an object"));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].starts_with("parameters - "));
    }
}
