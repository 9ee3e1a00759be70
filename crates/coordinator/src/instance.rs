//! Job instances: one execution of a job definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stepline_core::{InstanceId, Status};
use stepline_definition::JobParameters;

/// One running/completed execution of a job definition.
///
/// The definition is referenced by (job type, version), pinned at creation so
/// deploying a newer definition version never changes in-flight instances.
/// Parameters are stored serialized and opaque; they are only deserialized at
/// the worker seam, and redacted copies are produced for the read path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    /// Assigned by the persistence layer on first store; absent before that.
    instance_id: Option<InstanceId>,
    job_type: String,
    job_version: u32,
    parameters: Value,
    status: Status,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobInstance {
    /// A new, not-yet-persisted instance in `Queued` state.
    pub fn new(job_type: impl Into<String>, job_version: u32, parameters: Value) -> Self {
        let now = Utc::now();
        Self {
            instance_id: None,
            job_type: job_type.into(),
            job_version,
            parameters,
            status: Status::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance_id
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn job_version(&self) -> u32 {
        self.job_version
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Deserialize the stored parameters into their declared type.
    pub fn parameters_as<P: JobParameters>(&self) -> Result<P, serde_json::Error> {
        serde_json::from_value(self.parameters.clone())
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Persistence-layer use: bind the store-assigned identity.
    pub fn set_instance_id(&mut self, instance_id: InstanceId) {
        self.instance_id = Some(instance_id);
    }

    /// Persistence-layer use: apply a status transition.
    pub fn set_status(&mut self, status: Status) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Swap in a redacted parameter payload for display.
    pub fn replace_parameters(&mut self, parameters: Value) {
        self.parameters = parameters;
    }
}

/// Request to start a new job instance of the latest definition version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstanceStartRequest {
    job_type: String,
    parameters: Value,
}

impl JobInstanceStartRequest {
    pub fn new<P: JobParameters>(
        job_type: impl Into<String>,
        parameters: &P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            job_type: job_type.into(),
            parameters: serde_json::to_value(parameters)?,
        })
    }

    /// Build from an already-serialized payload (e.g. straight off a wire).
    pub fn from_value(job_type: impl Into<String>, parameters: Value) -> Self {
        Self {
            job_type: job_type.into(),
            parameters,
        }
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn parameters(&self) -> &Value {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instances_are_queued_and_unidentified() {
        let instance = JobInstance::new("export", 1, serde_json::json!({ "a": 1 }));
        assert!(instance.instance_id().is_none());
        assert_eq!(instance.status(), Status::Queued);
        assert_eq!(instance.job_version(), 1);
    }

    #[test]
    fn status_transitions_touch_updated_at() {
        let mut instance = JobInstance::new("export", 1, Value::Null);
        let before = instance.updated_at();
        instance.set_status(Status::InProgress);
        assert_eq!(instance.status(), Status::InProgress);
        assert!(instance.updated_at() >= before);
    }
}
