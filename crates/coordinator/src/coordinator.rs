//! The job coordinator: instance lifecycle operations and the step-execution
//! protocol driven by work notifications.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use stepline_channel::{WorkChannel, WorkNotification};
use stepline_core::InstanceId;
use stepline_definition::JobDefinitionRegistry;

use crate::error::CoordinatorError;
use crate::instance::{JobInstance, JobInstanceStartRequest};
use crate::persistence::JobPersistence;

/// Orchestrates job instances over a durable store and a notification channel.
///
/// Multiple coordinators (threads or processes) may handle notifications
/// concurrently; the persistence layer's atomic chunk claim guarantees each
/// chunk executes at most once.
pub struct JobCoordinator<S, C>
where
    S: JobPersistence,
    C: WorkChannel,
{
    persistence: S,
    channel: C,
    registry: Arc<JobDefinitionRegistry>,
}

impl<S, C> JobCoordinator<S, C>
where
    S: JobPersistence,
    C: WorkChannel,
{
    pub fn new(persistence: S, channel: C, registry: Arc<JobDefinitionRegistry>) -> Self {
        Self {
            persistence,
            channel,
            registry,
        }
    }

    /// Start a new instance of the latest registered version of a job type.
    ///
    /// Side effects happen in a fixed order (instance, then first chunk, then
    /// notification) so nothing on the channel ever references state that does
    /// not exist yet. Nothing is persisted when validation fails.
    pub fn start_instance(
        &self,
        request: &JobInstanceStartRequest,
    ) -> Result<InstanceId, CoordinatorError> {
        let definition = self
            .registry
            .resolve_latest(request.job_type())
            .ok_or_else(|| CoordinatorError::UnknownJobType(request.job_type().to_string()))?;

        let violations = definition.validate_parameters(request.parameters());
        if !violations.is_empty() {
            return Err(CoordinatorError::InvalidParameters {
                job_type: definition.job_type().to_string(),
                violations,
            });
        }

        let instance = JobInstance::new(
            definition.job_type(),
            definition.version(),
            request.parameters().clone(),
        );
        let instance_id = self.persistence.store_new_instance(instance)?;

        let first_step_id = definition.first_step().step_id();
        let chunk_id = self.persistence.store_work_chunk(
            definition.job_type(),
            definition.version(),
            first_step_id,
            instance_id,
            0,
            None,
        )?;
        self.send_notification(WorkNotification::new(
            definition.job_type(),
            definition.version(),
            instance_id,
            chunk_id,
            first_step_id,
        ))?;

        info!(
            job_type = definition.job_type(),
            version = definition.version(),
            %instance_id,
            "started job instance"
        );
        Ok(instance_id)
    }

    /// Fetch one instance, with sensitive parameter fields redacted.
    pub fn get_instance(&self, instance_id: InstanceId) -> Result<JobInstance, CoordinatorError> {
        let instance = self
            .persistence
            .fetch_instance(instance_id)?
            .ok_or(CoordinatorError::InstanceNotFound(instance_id))?;
        self.redacted(instance)
    }

    /// Paged fetch, redacted, ordering delegated to persistence.
    pub fn get_instances(
        &self,
        count: usize,
        offset: usize,
    ) -> Result<Vec<JobInstance>, CoordinatorError> {
        self.persistence
            .fetch_instances(count, offset)?
            .into_iter()
            .map(|instance| self.redacted(instance))
            .collect()
    }

    /// Request cancellation. Advisory: persistence decides whether it is
    /// accepted, and in-flight chunk executions complete naturally.
    pub fn cancel_instance(&self, instance_id: InstanceId) -> Result<(), CoordinatorError> {
        self.persistence.cancel_instance(instance_id)?;
        info!(%instance_id, "requested instance cancellation");
        Ok(())
    }

    fn redacted(&self, mut instance: JobInstance) -> Result<JobInstance, CoordinatorError> {
        let definition = self
            .registry
            .resolve(instance.job_type(), instance.job_version())
            .ok_or_else(|| CoordinatorError::UnknownDefinition {
                job_type: instance.job_type().to_string(),
                version: instance.job_version(),
            })?;
        let redacted = definition
            .redact_parameters(instance.parameters())
            .map_err(|e| CoordinatorError::ParameterPayload(e.to_string()))?;
        instance.replace_parameters(redacted);
        Ok(instance)
    }

    fn send_notification(&self, notification: WorkNotification) -> Result<(), CoordinatorError> {
        self.channel
            .publish(notification)
            .map_err(|e| CoordinatorError::Channel(format!("{e:?}")))
    }

    /// Handle one delivered work notification.
    ///
    /// Returns `Ok(())` for stale references (unknown or already-claimed chunk,
    /// unknown or cancelled instance) so deleted data never turns into a poison
    /// message. Every `Err` is a delivery failure the transport may retry.
    pub fn handle_notification(
        &self,
        notification: &WorkNotification,
    ) -> Result<(), CoordinatorError> {
        // Resolve the definition before touching persistence: an unknown
        // definition must leave no trace in the store.
        let definition = self
            .registry
            .resolve(notification.job_type(), notification.job_version())
            .ok_or_else(|| {
                error!(
                    job_type = notification.job_type(),
                    version = notification.job_version(),
                    "received notification for unknown job definition"
                );
                CoordinatorError::UnknownDefinition {
                    job_type: notification.job_type().to_string(),
                    version: notification.job_version(),
                }
            })?;

        // Atomic chunk claim. Losing it means the chunk was deleted or some
        // other handler already has it; either way this delivery is stale.
        let chunk_id = notification.chunk_id();
        let Some(chunk) = self
            .persistence
            .fetch_work_chunk_and_mark_in_progress(chunk_id)?
        else {
            debug!(%chunk_id, "work chunk unknown or already claimed, ignoring notification");
            return Ok(());
        };

        // Claim the instance.
        let instance_id = notification.instance_id();
        let Some(instance) = self
            .persistence
            .fetch_instance_and_mark_in_progress(instance_id)?
        else {
            debug!(%instance_id, "job instance unknown, ignoring notification");
            return Ok(());
        };
        if instance.status().is_cancelled() {
            debug!(%instance_id, %chunk_id, "job instance is cancelled, skipping chunk");
            return Ok(());
        }

        // Locate the target step.
        let Some((step_index, step)) = definition.step(notification.target_step_id()) else {
            return Err(CoordinatorError::UnknownStep {
                job_type: definition.job_type().to_string(),
                version: definition.version(),
                step_id: notification.target_step_id().to_string(),
            });
        };
        let is_final_step = definition.is_last_step(step_index);

        // Deserialization back into the declared types happens inside the
        // erased worker, immediately before the business logic runs.
        debug!(
            job_type = definition.job_type(),
            step_id = step.step_id(),
            %instance_id,
            %chunk_id,
            "executing step worker"
        );
        let run = step.run_worker(instance.parameters(), chunk.data(), instance_id, chunk_id);

        // Record a worker failure durably before re-raising, so the store
        // reflects it even if the transport never retries.
        let (outcome, drain) = match run {
            Ok(parts) => parts,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(%chunk_id, error = %message, "step worker failed");
                self.persistence
                    .mark_work_chunk_as_errored_and_increment_error_count(chunk_id, &message)?;
                return Err(CoordinatorError::WorkerFailure { chunk_id, message });
            }
        };

        if is_final_step {
            if drain.outputs.iter().any(|o| !stepline_core::is_void(o)) {
                let message = format!(
                    "step {} is the last step of job {} but emitted a non-void payload",
                    step.step_id(),
                    definition.job_type()
                );
                error!(%chunk_id, "{message}");
                self.persistence
                    .mark_work_chunk_as_failed(chunk_id, &message)?;
                return Ok(());
            }
        } else if drain.outputs.is_empty() {
            // The step decided there is no more work to do.
            info!(%instance_id, step_id = step.step_id(), "step produced no work chunks, marking instance as completed");
            self.persistence.mark_instance_as_completed(instance_id)?;
        } else {
            let next_step_id = definition.steps()[step_index + 1].step_id();
            for (sequence, output) in drain.outputs.into_iter().enumerate() {
                let next_chunk_id = self.persistence.store_work_chunk(
                    definition.job_type(),
                    definition.version(),
                    next_step_id,
                    instance_id,
                    sequence as u32,
                    Some(output),
                )?;
                self.send_notification(WorkNotification::new(
                    definition.job_type(),
                    definition.version(),
                    instance_id,
                    next_chunk_id,
                    next_step_id,
                ))?;
            }
        }

        if !drain.recovered_errors.is_empty() {
            self.persistence.increment_work_chunk_error_count(
                chunk_id,
                drain.recovered_errors.len() as u32,
            )?;
        }

        self.persistence
            .mark_work_chunk_as_completed_and_clear_data(chunk_id, outcome.records_processed())?;

        if is_final_step {
            info!(%instance_id, "last step completed, marking instance as completed");
            self.persistence.mark_instance_as_completed(instance_id)?;
        }

        debug!(
            %chunk_id,
            records_processed = outcome.records_processed(),
            "work chunk completed"
        );
        Ok(())
    }
}

/// Handle to the background notification listener.
#[derive(Debug)]
pub struct WorkChannelListener {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkChannelListener {
    /// Request graceful shutdown and wait for the listener to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl<S, C> JobCoordinator<S, C>
where
    S: JobPersistence + 'static,
    C: WorkChannel + 'static,
{
    /// Start consuming work notifications on a background thread.
    ///
    /// Handler failures are logged loudly here; a real transport adapter calls
    /// [`JobCoordinator::handle_notification`] directly and maps the error onto
    /// its own redelivery mechanism.
    pub fn start(self: Arc<Self>) -> WorkChannelListener {
        let subscription = self.channel.subscribe();
        let coordinator = self;
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name("work-channel-listener".to_string())
            .spawn(move || {
                info!("work channel listener started");
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    match subscription.recv_timeout(Duration::from_millis(100)) {
                        Ok(notification) => {
                            if let Err(err) = coordinator.handle_notification(&notification) {
                                error!(
                                    chunk_id = %notification.chunk_id(),
                                    error = %err,
                                    "failed to handle work notification"
                                );
                            }
                        }
                        Err(mpsc::RecvTimeoutError::Timeout) => continue,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("work channel listener stopped");
            })
            .expect("failed to spawn work channel listener thread");

        WorkChannelListener {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}
