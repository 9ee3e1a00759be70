//! Job parameter contract: structural validation, custom validation, redaction.
//!
//! Parameters travel serialized and opaque through the coordinator; the traits
//! here are the only places that see the concrete type. Structural violations
//! come first (in field declaration order), custom-validator violations after,
//! each source preserving its internal order.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// The parameter payload shape of one job definition.
pub trait JobParameters: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Structural constraint violations, in declaration order. Empty means valid.
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    /// Clear sensitive fields (secrets, credentials) before the value is
    /// rendered for display. The stored form keeps the real values.
    fn redact(&mut self) {}
}

/// Custom validation capability optionally attached to a job definition.
///
/// Runs after the structural checks; its messages are appended to theirs.
pub trait ParametersValidator<P: JobParameters>: Send + Sync {
    fn validate(&self, parameters: &P) -> Vec<String>;
}

impl<P, F> ParametersValidator<P> for F
where
    P: JobParameters,
    F: Fn(&P) -> Vec<String> + Send + Sync,
{
    fn validate(&self, parameters: &P) -> Vec<String> {
        self(parameters)
    }
}

/// Reusable structural rules with stable message wording.
pub mod rules {
    /// Requires a present, non-blank string.
    pub fn not_blank(violations: &mut Vec<String>, field: &str, value: Option<&str>) {
        match value {
            Some(v) if !v.trim().is_empty() => {}
            _ => violations.push(format!("{field} - must not be blank")),
        }
    }

    /// Bounds the length of a string, if present.
    pub fn length_between(
        violations: &mut Vec<String>,
        field: &str,
        value: Option<&str>,
        min: usize,
        max: usize,
    ) {
        if let Some(v) = value
            && (v.len() < min || v.len() > max)
        {
            violations.push(format!("{field} - length must be between {min} and {max}"));
        }
    }
}

/// Type-erased view of one parameter type's capabilities, held by a
/// [`crate::JobDefinition`] so the coordinator can validate and redact
/// serialized payloads without knowing the concrete type.
pub(crate) struct ParameterCodec {
    validate: Box<dyn Fn(&Value) -> Result<Vec<String>, serde_json::Error> + Send + Sync>,
    redact: Box<dyn Fn(&Value) -> Result<Value, serde_json::Error> + Send + Sync>,
}

impl ParameterCodec {
    pub(crate) fn new<P: JobParameters>(
        validator: Option<Box<dyn ParametersValidator<P>>>,
    ) -> Self {
        let validate = Box::new(move |value: &Value| {
            let parameters: P = serde_json::from_value(value.clone())?;
            let mut violations = parameters.validate();
            if let Some(validator) = &validator {
                violations.extend(validator.validate(&parameters));
            }
            Ok(violations)
        });
        let redact = Box::new(|value: &Value| {
            let mut parameters: P = serde_json::from_value(value.clone())?;
            parameters.redact();
            serde_json::to_value(&parameters)
        });
        Self { validate, redact }
    }

    pub(crate) fn validate(&self, value: &Value) -> Result<Vec<String>, serde_json::Error> {
        (self.validate)(value)
    }

    pub(crate) fn redact(&self, value: &Value) -> Result<Value, serde_json::Error> {
        (self.redact)(value)
    }
}
