//! Step definitions: typed step roles erased behind a uniform execution surface.
//!
//! The builder knows the concrete parameter/input/output types of every step;
//! here they are erased into `serde_json::Value` at the seam so the
//! coordinator can drive any step of any definition. Deserialization back into
//! the declared types happens immediately before the worker runs.

use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;

use stepline_core::{ChunkId, InstanceId, WorkPayload};

use crate::parameters::JobParameters;
use crate::sink::{DataSink, SinkDrain};
use crate::worker::{RunOutcome, StepExecutionDetails, StepWorker};

/// One step of a job definition.
pub struct StepDefinition {
    step_id: String,
    label: String,
    input_type: &'static str,
    output_type: &'static str,
    worker: Arc<dyn ErasedStepWorker>,
}

impl StepDefinition {
    pub(crate) fn new<P, I, O, W>(step_id: String, label: String, worker: W) -> Self
    where
        P: JobParameters,
        I: WorkPayload,
        O: WorkPayload,
        W: StepWorker<P, I, O>,
    {
        Self {
            step_id,
            label,
            input_type: I::type_tag(),
            output_type: O::type_tag(),
            worker: Arc::new(WorkerAdapter {
                worker,
                _types: PhantomData::<fn(P, I) -> O>,
            }),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Declared input payload type tag.
    pub fn input_type(&self) -> &'static str {
        self.input_type
    }

    /// Declared output payload type tag.
    pub fn output_type(&self) -> &'static str {
        self.output_type
    }

    /// Run the bound worker against serialized parameters and chunk input.
    ///
    /// Deserialization failures surface as worker errors: they mean the stored
    /// payload no longer matches the declared type for this definition version.
    pub fn run_worker(
        &self,
        parameters: &Value,
        input: Option<&Value>,
        instance_id: InstanceId,
        chunk_id: ChunkId,
    ) -> anyhow::Result<(RunOutcome, SinkDrain)> {
        self.worker.run(parameters, input, instance_id, chunk_id)
    }
}

impl core::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("step_id", &self.step_id)
            .field("label", &self.label)
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

/// Type-erased execution surface of one step's worker.
trait ErasedStepWorker: Send + Sync {
    fn run(
        &self,
        parameters: &Value,
        input: Option<&Value>,
        instance_id: InstanceId,
        chunk_id: ChunkId,
    ) -> anyhow::Result<(RunOutcome, SinkDrain)>;
}

struct WorkerAdapter<P, I, O, W> {
    worker: W,
    _types: PhantomData<fn(P, I) -> O>,
}

impl<P, I, O, W> ErasedStepWorker for WorkerAdapter<P, I, O, W>
where
    P: JobParameters,
    I: WorkPayload,
    O: WorkPayload,
    W: StepWorker<P, I, O>,
{
    fn run(
        &self,
        parameters: &Value,
        input: Option<&Value>,
        instance_id: InstanceId,
        chunk_id: ChunkId,
    ) -> anyhow::Result<(RunOutcome, SinkDrain)> {
        let parameters: P = serde_json::from_value(parameters.clone())
            .context("parameters do not match the declared parameter type")?;
        let input: Option<I> = match input {
            Some(value) => Some(
                serde_json::from_value(value.clone())
                    .context("chunk input does not match the declared step input type")?,
            ),
            None => None,
        };

        let mut sink = DataSink::new();
        let details = StepExecutionDetails::new(parameters, input, instance_id, chunk_id);
        let outcome = self.worker.run(details, &mut sink)?;

        let (outputs, recovered_errors) = sink.into_parts();
        let mut drain = SinkDrain {
            recovered_errors,
            ..SinkDrain::default()
        };
        for output in &outputs {
            drain
                .outputs
                .push(serde_json::to_value(output).context("failed to serialize step output")?);
        }
        Ok((outcome, drain))
    }
}
