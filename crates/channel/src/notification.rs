//! Work notification message shape.

use serde::{Deserialize, Serialize};

use stepline_core::{ChunkId, InstanceId};

/// Announces that one work chunk is ready to execute.
///
/// Carries identities only, never business data: the chunk's input payload is
/// fetched from persistence when the notification is handled, which keeps the
/// message small and makes duplicate delivery harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkNotification {
    job_type: String,
    job_version: u32,
    instance_id: InstanceId,
    chunk_id: ChunkId,
    target_step_id: String,
}

impl WorkNotification {
    pub fn new(
        job_type: impl Into<String>,
        job_version: u32,
        instance_id: InstanceId,
        chunk_id: ChunkId,
        target_step_id: impl Into<String>,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            job_version,
            instance_id,
            chunk_id,
            target_step_id: target_step_id.into(),
        }
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

    pub fn chunk_id(&self) -> ChunkId {
        self.chunk_id
    }

    pub fn target_step_id(&self) -> &str {
        &self.target_step_id
    }
}
