//! Constraint violation types.
//!
//! This module provides [`ConstraintViolation`] for a single violated
//! constraint and [`ConstraintViolations`] for the ordered, non-empty
//! collection a failed validation produces.

use std::fmt::{self, Display};

use stillwater::prelude::*;

use crate::path::PropertyPath;
use crate::value::{BeanId, Value};

/// A single constraint violation with full context.
///
/// A violation captures everything needed to report a failure:
/// - **path**: where in the validated graph the violation occurred
/// - **message**: the interpolated, human-readable message
/// - **message_template**: the raw template the message was produced from
/// - **invalid_value**: the value that failed the constraint
/// - **constraint_kind**: which constraint kind was violated
/// - **root_type** / **leaf_bean**: the validated root type and the bean
///   hosting the violated element, when one exists
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Path to the violated element.
    pub path: PropertyPath,
    /// Interpolated message.
    pub message: String,
    /// Raw message template the message was interpolated from.
    pub message_template: String,
    /// The value that failed validation.
    pub invalid_value: Value,
    /// Kind of the violated constraint (e.g. `NotBlank`).
    pub constraint_kind: String,
    /// Declared type of the validation root.
    pub root_type: String,
    /// The bean hosting the violated element, if any.
    pub leaf_bean: Option<BeanId>,
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_root() {
            "(root)".to_string()
        } else {
            self.path.to_string()
        };
        write!(f, "{}: {} [{}]", path, self.message, self.constraint_kind)
    }
}

impl std::error::Error for ConstraintViolation {}

/// A non-empty, ordered collection of constraint violations.
///
/// `ConstraintViolations` wraps a `NonEmptyVec<ConstraintViolation>` so a
/// failed validation always carries at least one violation, which makes it
/// usable as the failure side of `Validation<T, ConstraintViolations>`.
/// Order is deterministic: violations appear exactly in evaluation order.
///
/// # Combining
///
/// `ConstraintViolations` implements `Semigroup`, so failures from several
/// validations can be merged:
///
/// ```rust
/// use stillwater::prelude::*;
/// use verdict::{ConstraintViolation, ConstraintViolations, PathNode, PropertyPath, Value};
///
/// fn violation(path: PropertyPath) -> ConstraintViolation {
///     ConstraintViolation {
///         path,
///         message: "must not be null".into(),
///         message_template: "{NotNull.message}".into(),
///         invalid_value: Value::Null,
///         constraint_kind: "NotNull".into(),
///         root_type: "User".into(),
///         leaf_bean: None,
///     }
/// }
///
/// let a = ConstraintViolations::single(violation(
///     PropertyPath::root().child(PathNode::property("name")),
/// ));
/// let b = ConstraintViolations::single(violation(
///     PropertyPath::root().child(PathNode::property("email")),
/// ));
///
/// let combined = a.combine(b);
/// assert_eq!(combined.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolations(NonEmptyVec<ConstraintViolation>);

impl ConstraintViolations {
    /// Creates a collection containing a single violation.
    pub fn single(violation: ConstraintViolation) -> Self {
        Self(NonEmptyVec::singleton(violation))
    }

    /// Creates a collection from a vec of violations.
    ///
    /// Returns `None` if the vec is empty.
    pub fn from_vec(violations: Vec<ConstraintViolation>) -> Option<Self> {
        let mut iter = violations.into_iter();
        let mut collected = NonEmptyVec::singleton(iter.next()?);
        for violation in iter {
            collected = collected.combine(NonEmptyVec::singleton(violation));
        }
        Some(Self(collected))
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the collection is guaranteed non-empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the violations in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &ConstraintViolation> {
        self.0.iter()
    }

    /// The first violation.
    pub fn first(&self) -> &ConstraintViolation {
        self.0.head()
    }

    /// All violations at the given rendered path.
    pub fn at_path(&self, path: &str) -> Vec<&ConstraintViolation> {
        self.0.iter().filter(|v| v.path.to_string() == path).collect()
    }

    /// All violations of the given constraint kind.
    pub fn of_kind(&self, kind: &str) -> Vec<&ConstraintViolation> {
        self.0.iter().filter(|v| v.constraint_kind == kind).collect()
    }

    /// Converts into a plain `Vec`.
    pub fn into_vec(self) -> Vec<ConstraintViolation> {
        self.0.into_vec()
    }
}

impl Semigroup for ConstraintViolations {
    fn combine(self, other: Self) -> Self {
        ConstraintViolations(self.0.combine(other.0))
    }
}

impl Display for ConstraintViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation failed with {} violation(s):", self.len())?;
        for (i, violation) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConstraintViolations {}

impl IntoIterator for ConstraintViolations {
    type Item = ConstraintViolation;
    type IntoIter = std::vec::IntoIter<ConstraintViolation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

impl<'a> IntoIterator for &'a ConstraintViolations {
    type Item = &'a ConstraintViolation;
    type IntoIter = Box<dyn Iterator<Item = &'a ConstraintViolation> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.0.iter())
    }
}
