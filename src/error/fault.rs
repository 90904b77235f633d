//! Fatal error taxonomy.
//!
//! Violations produced by constraint evaluation are *results*, not errors;
//! they are collected in [`crate::ConstraintViolations`]. The variants here
//! terminate the current operation: broken constraint definitions, validator
//! resolution failures, collaborator crashes and startup configuration
//! problems.

use thiserror::Error;

/// Boxed error type for failures raised by external collaborators
/// (traversable resolvers, value extractors, validator initialization).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Fatal failures of descriptor building, resolution or job execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A constraint definition is broken: incompatible composing targets,
    /// ambiguous attribute overrides, conflicting payloads, a validator that
    /// failed to initialize, or a recursive composition.
    #[error("constraint definition error: {0}")]
    ConstraintDefinition(String),

    /// A group or group sequence is declared inconsistently.
    #[error("group definition error: {0}")]
    GroupDefinition(String),

    /// No validator, or more than one maximally specific validator, exists
    /// for a constraint and the type of its annotated element.
    #[error("unexpected type: {0}")]
    UnexpectedType(String),

    /// An external collaborator failed; the failure is wrapped with the
    /// element it concerned and surfaced as a single fatal error.
    #[error("validation failed for {context}: {source}")]
    Validation {
        context: String,
        #[source]
        source: CollaboratorError,
    },

    /// A configuration property could not be parsed at startup.
    #[error("cannot parse value {value:?} for configuration property {key}")]
    Configuration { key: String, value: String },
}

impl EngineError {
    /// Wraps a collaborator failure with the context it occurred in.
    pub fn collaborator(context: impl Into<String>, source: CollaboratorError) -> Self {
        EngineError::Validation {
            context: context.into(),
            source,
        }
    }
}
