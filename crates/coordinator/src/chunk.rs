//! Work chunks: one unit of work bound to one step of one instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stepline_core::{ChunkId, InstanceId, Status};

/// One unit of work, carrying the opaque input payload produced by the
/// previous step (absent for the first step).
///
/// Chunk state machine: `Queued --claim--> InProgress --> {Completed | Errored
/// | Failed}`, all three right-hand states terminal. The claim is an atomic
/// operation owned by the persistence layer; a coordinator never runs a worker
/// for a chunk it did not successfully claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkChunk {
    id: ChunkId,
    job_type: String,
    job_version: u32,
    instance_id: InstanceId,
    target_step_id: String,
    sequence: u32,
    data: Option<Value>,
    status: Status,
    error_count: u32,
    error_message: Option<String>,
    start_time: Option<DateTime<Utc>>,
    records_processed: Option<u32>,
    created_at: DateTime<Utc>,
}

impl WorkChunk {
    /// Persistence-layer use: create a freshly identified, queued chunk.
    pub fn new(
        job_type: impl Into<String>,
        job_version: u32,
        target_step_id: impl Into<String>,
        instance_id: InstanceId,
        sequence: u32,
        data: Option<Value>,
    ) -> Self {
        Self {
            id: ChunkId::new(),
            job_type: job_type.into(),
            job_version,
            instance_id,
            target_step_id: target_step_id.into(),
            sequence,
            data,
            status: Status::Queued,
            error_count: 0,
            error_message: None,
            start_time: None,
            records_processed: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ChunkId {
        self.id
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn job_version(&self) -> u32 {
        self.job_version
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    pub fn target_step_id(&self) -> &str {
        &self.target_step_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn records_processed(&self) -> Option<u32> {
        self.records_processed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Persistence-layer use: the atomic claim. Sets the start timestamp
    /// together with the `InProgress` transition.
    pub fn mark_in_progress(&mut self) {
        self.status = Status::InProgress;
        self.start_time = Some(Utc::now());
    }

    /// Persistence-layer use: terminal success. Clears the stored input (no
    /// longer needed) and records the worker's outcome count.
    pub fn mark_completed_and_clear_data(&mut self, records_processed: u32) {
        self.status = Status::Completed;
        self.data = None;
        self.records_processed = Some(records_processed);
    }

    /// Persistence-layer use: the worker failed.
    pub fn mark_errored(&mut self, error_message: impl Into<String>) {
        self.status = Status::Errored;
        self.error_count += 1;
        self.error_message = Some(error_message.into());
    }

    /// Persistence-layer use: the worker violated its execution contract.
    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.status = Status::Failed;
        self.error_message = Some(error_message.into());
    }

    /// Persistence-layer use: aggregate recovered-error bookkeeping.
    pub fn increment_error_count(&mut self, increment: u32) {
        self.error_count += increment;
    }
}
