//! Step worker capability: externally supplied business logic for one step.

use stepline_core::{ChunkId, InstanceId, WorkPayload};

use crate::parameters::JobParameters;
use crate::sink::DataSink;

/// Everything a worker gets to see for one chunk execution: the instance's
/// parameters and the chunk's input payload (absent for the first step).
#[derive(Debug)]
pub struct StepExecutionDetails<P, I> {
    parameters: P,
    input: Option<I>,
    instance_id: InstanceId,
    chunk_id: ChunkId,
}

impl<P, I> StepExecutionDetails<P, I> {
    pub(crate) fn new(
        parameters: P,
        input: Option<I>,
        instance_id: InstanceId,
        chunk_id: ChunkId,
    ) -> Self {
        Self {
            parameters,
            input,
            instance_id,
            chunk_id,
        }
    }

    pub fn parameters(&self) -> &P {
        &self.parameters
    }

    pub fn input(&self) -> Option<&I> {
        self.input.as_ref()
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn chunk_id(&self) -> ChunkId {
        self.chunk_id
    }
}

/// Outcome reported by a worker. Used for observability only.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    records_processed: u32,
}

impl RunOutcome {
    pub fn new(records_processed: u32) -> Self {
        Self { records_processed }
    }

    pub fn records_processed(&self) -> u32 {
        self.records_processed
    }
}

/// One step's pluggable business logic.
///
/// `P` is the job's parameter type, `I` the step's declared input payload and
/// `O` its declared output payload. First steps take `I = VoidPayload` (their
/// input is always absent), last steps declare a void-tagged output.
///
/// A worker may fail with any error ([`anyhow::Error`]); the coordinator
/// treats every failure uniformly as a chunk error.
pub trait StepWorker<P, I, O>: Send + Sync + 'static
where
    P: JobParameters,
    I: WorkPayload,
    O: WorkPayload,
{
    fn run(
        &self,
        details: StepExecutionDetails<P, I>,
        sink: &mut DataSink<O>,
    ) -> anyhow::Result<RunOutcome>;
}

impl<P, I, O, F> StepWorker<P, I, O> for F
where
    P: JobParameters,
    I: WorkPayload,
    O: WorkPayload,
    F: Fn(StepExecutionDetails<P, I>, &mut DataSink<O>) -> anyhow::Result<RunOutcome>
        + Send
        + Sync
        + 'static,
{
    fn run(
        &self,
        details: StepExecutionDetails<P, I>,
        sink: &mut DataSink<O>,
    ) -> anyhow::Result<RunOutcome> {
        self(details, sink)
    }
}
