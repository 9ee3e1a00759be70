//! In-memory catalog of job definitions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::definition::JobDefinition;
use crate::error::ConfigurationError;

/// Resolves (job type, version), or "latest version", to a [`JobDefinition`].
///
/// Populated once at process startup, then shared by reference (`Arc`) and
/// never mutated again. Hot reload, if ever needed, means building a fresh
/// registry and swapping the whole snapshot.
#[derive(Debug, Default)]
pub struct JobDefinitionRegistry {
    definitions: HashMap<String, BTreeMap<u32, Arc<JobDefinition>>>,
}

impl JobDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. Startup-time only.
    pub fn register(&mut self, definition: JobDefinition) -> Result<(), ConfigurationError> {
        definition.verify()?;

        let versions = self
            .definitions
            .entry(definition.job_type().to_string())
            .or_default();
        if versions.contains_key(&definition.version()) {
            return Err(ConfigurationError::DuplicateDefinition {
                job_type: definition.job_type().to_string(),
                version: definition.version(),
            });
        }

        debug!(
            job_type = definition.job_type(),
            version = definition.version(),
            steps = definition.steps().len(),
            "registered job definition"
        );
        versions.insert(definition.version(), Arc::new(definition));
        Ok(())
    }

    pub fn resolve(&self, job_type: &str, version: u32) -> Option<Arc<JobDefinition>> {
        self.definitions.get(job_type)?.get(&version).cloned()
    }

    /// The highest registered version for a job type.
    pub fn resolve_latest(&self, job_type: &str) -> Option<Arc<JobDefinition>> {
        self.definitions
            .get(job_type)?
            .last_key_value()
            .map(|(_, definition)| Arc::clone(definition))
    }

    pub fn job_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::JobParameters;
    use crate::sink::DataSink;
    use crate::worker::{RunOutcome, StepExecutionDetails};
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};
    use stepline_core::VoidPayload;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Params;

    impl JobParameters for Params {}

    fn definition(job_type: &str, version: u32) -> JobDefinition {
        JobDefinition::builder::<Params>(job_type, version)
            .first_step(
                "only",
                "Only step",
                |_details: StepExecutionDetails<Params, VoidPayload>,
                 _sink: &mut DataSink<VoidPayload>| Ok(RunOutcome::new(0)),
            )
            .last_step(
                "done",
                "Done",
                |_details: StepExecutionDetails<Params, VoidPayload>,
                 _sink: &mut DataSink<VoidPayload>| Ok(RunOutcome::new(0)),
            )
            .unwrap()
    }

    #[test]
    fn resolves_exact_and_latest_versions() {
        let mut registry = JobDefinitionRegistry::new();
        registry.register(definition("export", 1)).unwrap();
        registry.register(definition("export", 3)).unwrap();
        registry.register(definition("export", 2)).unwrap();
        registry.register(definition("import", 1)).unwrap();

        assert_eq!(registry.resolve("export", 2).unwrap().version(), 2);
        assert_eq!(registry.resolve_latest("export").unwrap().version(), 3);
        assert_eq!(registry.resolve_latest("import").unwrap().version(), 1);
        assert!(registry.resolve("export", 9).is_none());
        assert!(registry.resolve_latest("unknown").is_none());
    }

    #[test]
    fn duplicate_type_version_pairs_are_rejected() {
        let mut registry = JobDefinitionRegistry::new();
        registry.register(definition("export", 1)).unwrap();
        let err = registry.register(definition("export", 1)).unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateDefinition { .. }));
    }

    proptest! {
        #[test]
        fn latest_is_always_the_maximum_registered_version(
            versions in proptest::collection::hash_set(1u32..500, 1..12)
        ) {
            let mut registry = JobDefinitionRegistry::new();
            for &version in &versions {
                registry.register(definition("p", version)).unwrap();
            }
            let latest = registry.resolve_latest("p").unwrap();
            prop_assert_eq!(latest.version(), *versions.iter().max().unwrap());
        }
    }
}
