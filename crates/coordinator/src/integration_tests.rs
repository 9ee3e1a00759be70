//! End-to-end pipeline runs through the background listener.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use stepline_channel::InMemoryWorkChannel;
use stepline_core::{InstanceId, Status, VoidPayload, WorkPayload};
use stepline_definition::{
    DataSink, JobDefinition, JobDefinitionRegistry, JobParameters, RunOutcome,
    StepExecutionDetails,
};

use crate::coordinator::JobCoordinator;
use crate::instance::JobInstanceStartRequest;
use crate::persistence::{InMemoryJobPersistence, JobPersistence};

const JOB_TYPE: &str = "line-report";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ReportParameters {
    line_count: u32,
}

impl JobParameters for ReportParameters {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawLine {
    number: u32,
}

impl WorkPayload for RawLine {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FormattedLine {
    text: String,
}

impl WorkPayload for FormattedLine {}

fn pipeline_definition() -> JobDefinition {
    JobDefinition::builder::<ReportParameters>(JOB_TYPE, 1)
        .description("generate, format and store report lines")
        .first_step(
            "generate",
            "Generate lines",
            |details: StepExecutionDetails<ReportParameters, VoidPayload>,
             sink: &mut DataSink<RawLine>| {
                for number in 0..details.parameters().line_count {
                    sink.accept(RawLine { number });
                }
                Ok(RunOutcome::new(details.parameters().line_count))
            },
        )
        .intermediate_step(
            "format",
            "Format lines",
            |details: StepExecutionDetails<ReportParameters, RawLine>,
             sink: &mut DataSink<FormattedLine>| {
                let line = details.input().ok_or_else(|| {
                    anyhow::anyhow!("format step requires an input line")
                })?;
                sink.accept(FormattedLine {
                    text: format!("line #{}", line.number),
                });
                Ok(RunOutcome::new(1))
            },
        )
        .last_step(
            "store",
            "Store lines",
            |details: StepExecutionDetails<ReportParameters, FormattedLine>,
             _sink: &mut DataSink<VoidPayload>|
             -> Result<RunOutcome> {
                details
                    .input()
                    .ok_or_else(|| anyhow::anyhow!("store step requires an input line"))?;
                Ok(RunOutcome::new(1))
            },
        )
        .unwrap()
}

struct Harness {
    coordinator: Arc<JobCoordinator<Arc<InMemoryJobPersistence>, Arc<InMemoryWorkChannel>>>,
    persistence: Arc<InMemoryJobPersistence>,
}

fn harness() -> Harness {
    let mut registry = JobDefinitionRegistry::new();
    registry.register(pipeline_definition()).unwrap();

    let persistence = InMemoryJobPersistence::arc();
    let channel = Arc::new(InMemoryWorkChannel::new());
    let coordinator = Arc::new(JobCoordinator::new(
        Arc::clone(&persistence),
        channel,
        Arc::new(registry),
    ));

    Harness {
        coordinator,
        persistence,
    }
}

fn await_status(persistence: &InMemoryJobPersistence, instance_id: InstanceId, status: Status) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let current = persistence
            .fetch_instance(instance_id)
            .unwrap()
            .unwrap()
            .status();
        if current == status {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "instance {instance_id} stuck in {current}, expected {status}"
        );
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn pipeline_runs_to_completion_through_the_listener() {
    let harness = harness();
    let listener = Arc::clone(&harness.coordinator).start();

    let request = JobInstanceStartRequest::new(JOB_TYPE, &ReportParameters { line_count: 1 })
        .unwrap();
    let instance_id = harness.coordinator.start_instance(&request).unwrap();

    await_status(&harness.persistence, instance_id, Status::Completed);
    listener.shutdown();

    // One chunk per step, all completed, inputs cleared, no errors recorded.
    let chunks = harness.persistence.chunks_for_instance(instance_id);
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert_eq!(chunk.status(), Status::Completed);
        assert_eq!(chunk.error_count(), 0);
        assert!(chunk.data().is_none());
        assert!(chunk.start_time().is_some());
    }
    assert_eq!(chunks[0].target_step_id(), "generate");
    assert_eq!(chunks[1].target_step_id(), "format");
    assert_eq!(chunks[2].target_step_id(), "store");
}

#[test]
fn fan_out_creates_one_chunk_per_emitted_payload() {
    let harness = harness();
    let listener = Arc::clone(&harness.coordinator).start();

    let request = JobInstanceStartRequest::new(JOB_TYPE, &ReportParameters { line_count: 3 })
        .unwrap();
    let instance_id = harness.coordinator.start_instance(&request).unwrap();

    await_status(&harness.persistence, instance_id, Status::Completed);
    listener.shutdown();

    let chunks = harness.persistence.chunks_for_instance(instance_id);
    // 1 generate + 3 format + 3 store.
    assert_eq!(chunks.len(), 7);
    assert!(chunks.iter().all(|c| c.status() == Status::Completed));

    let format_chunks: Vec<_> = chunks
        .iter()
        .filter(|c| c.target_step_id() == "format")
        .collect();
    assert_eq!(format_chunks.len(), 3);
    // Emission order is preserved in the per-step sequence numbers.
    let sequences: Vec<u32> = format_chunks.iter().map(|c| c.sequence()).collect();
    assert_eq!(sequences, vec![0, 1, 2]);

    assert_eq!(
        chunks
            .iter()
            .filter(|c| c.target_step_id() == "store")
            .count(),
        3
    );
}

#[test]
fn listener_survives_a_failing_chunk_and_keeps_consuming() {
    let mut registry = JobDefinitionRegistry::new();
    registry.register(pipeline_definition()).unwrap();
    let flaky = JobDefinition::builder::<ReportParameters>("flaky", 1)
        .first_step(
            "explode",
            "Explode",
            |_d: StepExecutionDetails<ReportParameters, VoidPayload>,
             _s: &mut DataSink<VoidPayload>| Err(anyhow::anyhow!("synthetic failure")),
        )
        .last_step(
            "finish",
            "Finish",
            |_d: StepExecutionDetails<ReportParameters, VoidPayload>,
             _s: &mut DataSink<VoidPayload>| Ok(RunOutcome::new(0)),
        )
        .unwrap();
    registry.register(flaky).unwrap();

    let persistence = InMemoryJobPersistence::arc();
    let channel = Arc::new(InMemoryWorkChannel::new());
    let coordinator = Arc::new(JobCoordinator::new(
        Arc::clone(&persistence),
        channel,
        Arc::new(registry),
    ));
    let listener = Arc::clone(&coordinator).start();

    let flaky_request =
        JobInstanceStartRequest::new("flaky", &ReportParameters::default()).unwrap();
    let flaky_id = coordinator.start_instance(&flaky_request).unwrap();

    let request =
        JobInstanceStartRequest::new(JOB_TYPE, &ReportParameters { line_count: 1 }).unwrap();
    let healthy_id = coordinator.start_instance(&request).unwrap();

    // The failing chunk must not take the listener down with it.
    await_status(&persistence, healthy_id, Status::Completed);
    listener.shutdown();

    let flaky_chunks = persistence.chunks_for_instance(flaky_id);
    assert_eq!(flaky_chunks.len(), 1);
    assert_eq!(flaky_chunks[0].status(), Status::Errored);
    assert_eq!(flaky_chunks[0].error_message(), Some("synthetic failure"));
}
