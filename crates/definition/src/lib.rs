//! `stepline-definition` — job/step definitions and the capabilities bound to them.
//!
//! A [`JobDefinition`] describes an ordered step pipeline for one job
//! type/version. Definitions are assembled through a typestate builder that
//! chains each step's declared output type into the next step's input type at
//! compile time, then collected into an immutable [`JobDefinitionRegistry`]
//! at process startup.

pub mod definition;
pub mod error;
pub mod parameters;
pub mod registry;
pub mod sink;
pub mod step;
pub mod worker;

pub use definition::{JobDefinition, JobDefinitionBuilder, StepChainBuilder};
pub use error::ConfigurationError;
pub use parameters::{JobParameters, ParametersValidator, rules};
pub use registry::JobDefinitionRegistry;
pub use sink::{DataSink, SinkDrain};
pub use step::StepDefinition;
pub use worker::{RunOutcome, StepExecutionDetails, StepWorker};
