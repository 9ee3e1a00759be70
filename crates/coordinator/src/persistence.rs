//! Durable-store contract for instances and chunks, plus an in-memory
//! implementation for tests and single-process deployments.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use stepline_core::{ChunkId, InstanceId, Status};

use crate::chunk::WorkChunk;
use crate::instance::JobInstance;

/// Persistence error.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("SL-0301: job instance not found: {0}")]
    InstanceNotFound(InstanceId),
    #[error("SL-0302: work chunk not found: {0}")]
    ChunkNotFound(ChunkId),
    #[error("SL-0303: storage error: {0}")]
    Storage(String),
}

/// The contract the coordinator consumes.
///
/// The two `fetch_*_and_mark_in_progress` operations are atomic,
/// compare-and-set-style claims: they are the sole mechanism preventing two
/// concurrent handlers from executing the same chunk twice. Fetches return
/// `Ok(None)` for unknown ids; targeted mutations on unknown ids are errors.
pub trait JobPersistence: Send + Sync {
    /// Store a new instance, assigning its identity.
    fn store_new_instance(&self, instance: JobInstance) -> Result<InstanceId, PersistenceError>;

    fn fetch_instance(&self, instance_id: InstanceId)
    -> Result<Option<JobInstance>, PersistenceError>;

    /// Paged fetch with stable (creation) ordering.
    fn fetch_instances(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobInstance>, PersistenceError>;

    /// Fetch an instance, moving it to `InProgress` if it is not already
    /// terminal. Terminal instances (including cancelled ones) are returned
    /// unchanged so the caller can inspect the status.
    fn fetch_instance_and_mark_in_progress(
        &self,
        instance_id: InstanceId,
    ) -> Result<Option<JobInstance>, PersistenceError>;

    fn mark_instance_as_completed(&self, instance_id: InstanceId)
    -> Result<(), PersistenceError>;

    /// Request cancellation. The store is the authority: terminal instances
    /// are left untouched.
    fn cancel_instance(&self, instance_id: InstanceId) -> Result<(), PersistenceError>;

    /// Store a new queued chunk, assigning its identity.
    fn store_work_chunk(
        &self,
        job_type: &str,
        job_version: u32,
        target_step_id: &str,
        instance_id: InstanceId,
        sequence: u32,
        data: Option<Value>,
    ) -> Result<ChunkId, PersistenceError>;

    /// The atomic chunk claim: succeeds only from `Queued`, setting the start
    /// timestamp together with the transition. Returns `Ok(None)` both for
    /// unknown chunks and for chunks some other handler already claimed, which
    /// callers treat as a stale/duplicate notification.
    fn fetch_work_chunk_and_mark_in_progress(
        &self,
        chunk_id: ChunkId,
    ) -> Result<Option<WorkChunk>, PersistenceError>;

    fn mark_work_chunk_as_completed_and_clear_data(
        &self,
        chunk_id: ChunkId,
        records_processed: u32,
    ) -> Result<(), PersistenceError>;

    fn mark_work_chunk_as_errored_and_increment_error_count(
        &self,
        chunk_id: ChunkId,
        error_message: &str,
    ) -> Result<(), PersistenceError>;

    fn mark_work_chunk_as_failed(
        &self,
        chunk_id: ChunkId,
        error_message: &str,
    ) -> Result<(), PersistenceError>;

    fn increment_work_chunk_error_count(
        &self,
        chunk_id: ChunkId,
        increment: u32,
    ) -> Result<(), PersistenceError>;
}

impl<P> JobPersistence for Arc<P>
where
    P: JobPersistence + ?Sized,
{
    fn store_new_instance(&self, instance: JobInstance) -> Result<InstanceId, PersistenceError> {
        (**self).store_new_instance(instance)
    }

    fn fetch_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Option<JobInstance>, PersistenceError> {
        (**self).fetch_instance(instance_id)
    }

    fn fetch_instances(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobInstance>, PersistenceError> {
        (**self).fetch_instances(limit, offset)
    }

    fn fetch_instance_and_mark_in_progress(
        &self,
        instance_id: InstanceId,
    ) -> Result<Option<JobInstance>, PersistenceError> {
        (**self).fetch_instance_and_mark_in_progress(instance_id)
    }

    fn mark_instance_as_completed(
        &self,
        instance_id: InstanceId,
    ) -> Result<(), PersistenceError> {
        (**self).mark_instance_as_completed(instance_id)
    }

    fn cancel_instance(&self, instance_id: InstanceId) -> Result<(), PersistenceError> {
        (**self).cancel_instance(instance_id)
    }

    fn store_work_chunk(
        &self,
        job_type: &str,
        job_version: u32,
        target_step_id: &str,
        instance_id: InstanceId,
        sequence: u32,
        data: Option<Value>,
    ) -> Result<ChunkId, PersistenceError> {
        (**self).store_work_chunk(
            job_type,
            job_version,
            target_step_id,
            instance_id,
            sequence,
            data,
        )
    }

    fn fetch_work_chunk_and_mark_in_progress(
        &self,
        chunk_id: ChunkId,
    ) -> Result<Option<WorkChunk>, PersistenceError> {
        (**self).fetch_work_chunk_and_mark_in_progress(chunk_id)
    }

    fn mark_work_chunk_as_completed_and_clear_data(
        &self,
        chunk_id: ChunkId,
        records_processed: u32,
    ) -> Result<(), PersistenceError> {
        (**self).mark_work_chunk_as_completed_and_clear_data(chunk_id, records_processed)
    }

    fn mark_work_chunk_as_errored_and_increment_error_count(
        &self,
        chunk_id: ChunkId,
        error_message: &str,
    ) -> Result<(), PersistenceError> {
        (**self).mark_work_chunk_as_errored_and_increment_error_count(chunk_id, error_message)
    }

    fn mark_work_chunk_as_failed(
        &self,
        chunk_id: ChunkId,
        error_message: &str,
    ) -> Result<(), PersistenceError> {
        (**self).mark_work_chunk_as_failed(chunk_id, error_message)
    }

    fn increment_work_chunk_error_count(
        &self,
        chunk_id: ChunkId,
        increment: u32,
    ) -> Result<(), PersistenceError> {
        (**self).increment_work_chunk_error_count(chunk_id, increment)
    }
}

/// In-memory persistence for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobPersistence {
    instances: RwLock<HashMap<InstanceId, JobInstance>>,
    chunks: RwLock<HashMap<ChunkId, WorkChunk>>,
}

impl InMemoryJobPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// All chunks belonging to an instance, in creation order. Dev/test aid.
    pub fn chunks_for_instance(&self, instance_id: InstanceId) -> Vec<WorkChunk> {
        let chunks = self.chunks.read().unwrap();
        let mut result: Vec<_> = chunks
            .values()
            .filter(|c| c.instance_id() == instance_id)
            .cloned()
            .collect();
        result.sort_by_key(|c| c.created_at());
        result
    }
}

impl JobPersistence for InMemoryJobPersistence {
    fn store_new_instance(&self, mut instance: JobInstance) -> Result<InstanceId, PersistenceError> {
        let mut instances = self.instances.write().unwrap();
        let instance_id = InstanceId::new();
        instance.set_instance_id(instance_id);
        instances.insert(instance_id, instance);
        Ok(instance_id)
    }

    fn fetch_instance(
        &self,
        instance_id: InstanceId,
    ) -> Result<Option<JobInstance>, PersistenceError> {
        let instances = self.instances.read().unwrap();
        Ok(instances.get(&instance_id).cloned())
    }

    fn fetch_instances(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<JobInstance>, PersistenceError> {
        let instances = self.instances.read().unwrap();
        let mut result: Vec<_> = instances.values().cloned().collect();
        result.sort_by_key(|i| i.created_at());
        Ok(result.into_iter().skip(offset).take(limit).collect())
    }

    fn fetch_instance_and_mark_in_progress(
        &self,
        instance_id: InstanceId,
    ) -> Result<Option<JobInstance>, PersistenceError> {
        let mut instances = self.instances.write().unwrap();
        let Some(instance) = instances.get_mut(&instance_id) else {
            return Ok(None);
        };
        if !instance.status().is_terminal() {
            instance.set_status(Status::InProgress);
        }
        Ok(Some(instance.clone()))
    }

    fn mark_instance_as_completed(
        &self,
        instance_id: InstanceId,
    ) -> Result<(), PersistenceError> {
        let mut instances = self.instances.write().unwrap();
        let instance = instances
            .get_mut(&instance_id)
            .ok_or(PersistenceError::InstanceNotFound(instance_id))?;
        if !instance.status().is_terminal() {
            instance.set_status(Status::Completed);
        }
        Ok(())
    }

    fn cancel_instance(&self, instance_id: InstanceId) -> Result<(), PersistenceError> {
        let mut instances = self.instances.write().unwrap();
        let instance = instances
            .get_mut(&instance_id)
            .ok_or(PersistenceError::InstanceNotFound(instance_id))?;
        if instance.status().is_terminal() {
            debug!(%instance_id, status = %instance.status(), "cancellation ignored for terminal instance");
        } else {
            instance.set_status(Status::Cancelled);
        }
        Ok(())
    }

    fn store_work_chunk(
        &self,
        job_type: &str,
        job_version: u32,
        target_step_id: &str,
        instance_id: InstanceId,
        sequence: u32,
        data: Option<Value>,
    ) -> Result<ChunkId, PersistenceError> {
        let mut chunks = self.chunks.write().unwrap();
        let chunk = WorkChunk::new(
            job_type,
            job_version,
            target_step_id,
            instance_id,
            sequence,
            data,
        );
        let chunk_id = chunk.id();
        chunks.insert(chunk_id, chunk);
        Ok(chunk_id)
    }

    fn fetch_work_chunk_and_mark_in_progress(
        &self,
        chunk_id: ChunkId,
    ) -> Result<Option<WorkChunk>, PersistenceError> {
        let mut chunks = self.chunks.write().unwrap();
        let Some(chunk) = chunks.get_mut(&chunk_id) else {
            return Ok(None);
        };
        if chunk.status() != Status::Queued {
            // Already claimed (or finished) by another handler.
            return Ok(None);
        }
        chunk.mark_in_progress();
        Ok(Some(chunk.clone()))
    }

    fn mark_work_chunk_as_completed_and_clear_data(
        &self,
        chunk_id: ChunkId,
        records_processed: u32,
    ) -> Result<(), PersistenceError> {
        let mut chunks = self.chunks.write().unwrap();
        let chunk = chunks
            .get_mut(&chunk_id)
            .ok_or(PersistenceError::ChunkNotFound(chunk_id))?;
        chunk.mark_completed_and_clear_data(records_processed);
        Ok(())
    }

    fn mark_work_chunk_as_errored_and_increment_error_count(
        &self,
        chunk_id: ChunkId,
        error_message: &str,
    ) -> Result<(), PersistenceError> {
        let mut chunks = self.chunks.write().unwrap();
        let chunk = chunks
            .get_mut(&chunk_id)
            .ok_or(PersistenceError::ChunkNotFound(chunk_id))?;
        chunk.mark_errored(error_message);
        Ok(())
    }

    fn mark_work_chunk_as_failed(
        &self,
        chunk_id: ChunkId,
        error_message: &str,
    ) -> Result<(), PersistenceError> {
        let mut chunks = self.chunks.write().unwrap();
        let chunk = chunks
            .get_mut(&chunk_id)
            .ok_or(PersistenceError::ChunkNotFound(chunk_id))?;
        chunk.mark_failed(error_message);
        Ok(())
    }

    fn increment_work_chunk_error_count(
        &self,
        chunk_id: ChunkId,
        increment: u32,
    ) -> Result<(), PersistenceError> {
        let mut chunks = self.chunks.write().unwrap();
        let chunk = chunks
            .get_mut(&chunk_id)
            .ok_or(PersistenceError::ChunkNotFound(chunk_id))?;
        chunk.increment_error_count(increment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_chunk(persistence: &InMemoryJobPersistence) -> ChunkId {
        persistence
            .store_work_chunk("export", 1, "read", InstanceId::new(), 0, None)
            .unwrap()
    }

    #[test]
    fn chunk_claim_succeeds_exactly_once() {
        let persistence = InMemoryJobPersistence::new();
        let chunk_id = store_chunk(&persistence);

        let first = persistence
            .fetch_work_chunk_and_mark_in_progress(chunk_id)
            .unwrap();
        assert_eq!(first.unwrap().status(), Status::InProgress);

        // Second claim loses the race.
        let second = persistence
            .fetch_work_chunk_and_mark_in_progress(chunk_id)
            .unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn claim_of_unknown_chunk_is_not_an_error() {
        let persistence = InMemoryJobPersistence::new();
        let missing = persistence
            .fetch_work_chunk_and_mark_in_progress(ChunkId::new())
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn instance_claim_leaves_terminal_statuses_alone() {
        let persistence = InMemoryJobPersistence::new();
        let instance_id = persistence
            .store_new_instance(JobInstance::new("export", 1, Value::Null))
            .unwrap();
        persistence.cancel_instance(instance_id).unwrap();

        let claimed = persistence
            .fetch_instance_and_mark_in_progress(instance_id)
            .unwrap()
            .unwrap();
        assert_eq!(claimed.status(), Status::Cancelled);
    }

    #[test]
    fn cancellation_of_a_completed_instance_is_ignored() {
        let persistence = InMemoryJobPersistence::new();
        let instance_id = persistence
            .store_new_instance(JobInstance::new("export", 1, Value::Null))
            .unwrap();
        persistence.mark_instance_as_completed(instance_id).unwrap();
        persistence.cancel_instance(instance_id).unwrap();

        let instance = persistence.fetch_instance(instance_id).unwrap().unwrap();
        assert_eq!(instance.status(), Status::Completed);
    }

    #[test]
    fn error_bookkeeping_accumulates() {
        let persistence = InMemoryJobPersistence::new();
        let chunk_id = store_chunk(&persistence);
        persistence
            .fetch_work_chunk_and_mark_in_progress(chunk_id)
            .unwrap();

        persistence
            .increment_work_chunk_error_count(chunk_id, 2)
            .unwrap();
        persistence
            .mark_work_chunk_as_errored_and_increment_error_count(chunk_id, "boom")
            .unwrap();

        let chunks = persistence.chunks_for_instance(
            persistence
                .chunks
                .read()
                .unwrap()
                .get(&chunk_id)
                .unwrap()
                .instance_id(),
        );
        assert_eq!(chunks[0].error_count(), 3);
        assert_eq!(chunks[0].error_message(), Some("boom"));
        assert_eq!(chunks[0].status(), Status::Errored);
    }

    #[test]
    fn fetch_instances_pages_in_creation_order() {
        let persistence = InMemoryJobPersistence::new();
        for i in 0..5 {
            persistence
                .store_new_instance(JobInstance::new(
                    format!("job-{i}"),
                    1,
                    Value::Null,
                ))
                .unwrap();
        }

        let page = persistence.fetch_instances(2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].job_type(), "job-1");
        assert_eq!(page[1].job_type(), "job-2");
    }
}
