//! Error types: the fatal engine taxonomy and accumulated violations.

mod fault;
mod violation;

pub use fault::{CollaboratorError, EngineError};
pub use violation::{ConstraintViolation, ConstraintViolations};
