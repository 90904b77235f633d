//! Constraint registry: definitions and validator implementations.
//!
//! The registry is the process-wide home of the declarative constraint
//! vocabulary. For every constraint kind it stores the
//! [`ConstraintDefinition`] (attribute defaults, composing declarations,
//! attribute overrides, report-as-single marker) and the set of
//! [`ValidatorInfo`] implementations able to evaluate it.
//!
//! # Thread Safety
//!
//! The registry uses `RwLock`-guarded maps:
//! - Many threads may look up definitions and validators concurrently
//! - Registration operations are serialized (write access)

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use crate::error::CollaboratorError;
use crate::job::ConstraintValidatorContext;
use crate::value::{Value, ValueType};

/// Attribute values declared on a constraint, by attribute name.
///
/// Values are `serde_json::Value`, which covers the attribute shapes the
/// built-in vocabulary needs (numbers, strings, string arrays).
pub type AttributeMap = IndexMap<String, serde_json::Value>;

/// Convenience constructor for an [`AttributeMap`].
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use verdict::attrs;
///
/// let attributes = attrs([("min", json!(1)), ("max", json!(10))]);
/// assert_eq!(attributes.get("min"), Some(&json!(1)));
/// ```
pub fn attrs<'a, I>(entries: I) -> AttributeMap
where
    I: IntoIterator<Item = (&'a str, serde_json::Value)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// What a validator implementation evaluates: a single annotated element or
/// the whole parameter array of an executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationTarget {
    AnnotatedElement,
    Parameters,
}

/// Evaluates one constraint kind against values of its declared type.
///
/// A fresh validator instance is created per evaluated constraint
/// occurrence; `initialize` receives the occurrence's merged attributes and
/// may fail, which is surfaced as a constraint definition error.
pub trait ConstraintValidator: Send + Sync {
    /// Prepares the validator from the constraint's attributes.
    fn initialize(&mut self, _attributes: &AttributeMap) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// Evaluates the value; false queues the violations recorded in the
    /// context (at least the default one, unless disabled).
    fn is_valid(&self, value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool;
}

type ValidatorFactory = Arc<dyn Fn() -> Box<dyn ConstraintValidator> + Send + Sync>;

/// Describes one validator implementation declared for a constraint kind.
#[derive(Clone)]
pub struct ValidatorInfo {
    name: String,
    validated_type: ValueType,
    targets: Vec<ValidationTarget>,
    factory: ValidatorFactory,
}

impl ValidatorInfo {
    /// Declares a validator for single annotated elements of the given type.
    pub fn new<F, V>(name: impl Into<String>, validated_type: ValueType, factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: ConstraintValidator + 'static,
    {
        Self {
            name: name.into(),
            validated_type,
            targets: vec![ValidationTarget::AnnotatedElement],
            factory: Arc::new(move || Box::new(factory())),
        }
    }

    /// Replaces the supported validation targets.
    pub fn supporting(mut self, targets: impl IntoIterator<Item = ValidationTarget>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    /// Diagnostic name of the implementation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The validated type the implementation declares.
    pub fn validated_type(&self) -> &ValueType {
        &self.validated_type
    }

    /// True if the implementation supports the given target.
    pub fn supports(&self, target: ValidationTarget) -> bool {
        self.targets.contains(&target)
    }

    /// Supported targets in declaration order.
    pub fn targets(&self) -> &[ValidationTarget] {
        &self.targets
    }

    /// Instantiates a fresh validator.
    pub fn instantiate(&self) -> Box<dyn ConstraintValidator> {
        (self.factory)()
    }
}

impl std::fmt::Debug for ValidatorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorInfo")
            .field("name", &self.name)
            .field("validated_type", &self.validated_type)
            .field("targets", &self.targets)
            .finish()
    }
}

/// A composing constraint occurrence declared on a constraint kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposingDeclaration {
    pub kind: String,
    pub attributes: AttributeMap,
}

/// Maps an attribute of a composed kind onto an attribute of one of its
/// composing constraints.
///
/// `constraint_index == None` addresses the sole composing constraint of
/// `target_kind`; `to == None` reuses the `from` attribute name.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideDeclaration {
    pub from: String,
    pub target_kind: String,
    pub constraint_index: Option<usize>,
    pub to: Option<String>,
}

/// The declarative identity of a constraint kind.
#[derive(Debug, Clone, Default)]
pub struct ConstraintDefinition {
    kind: String,
    attributes: AttributeMap,
    composing: Vec<ComposingDeclaration>,
    overrides: Vec<OverrideDeclaration>,
    report_as_single: bool,
}

impl ConstraintDefinition {
    /// Starts a definition for the given kind.
    ///
    /// The `message` attribute defaults to `{Kind.message}`.
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        let mut attributes = AttributeMap::new();
        attributes.insert(
            "message".into(),
            serde_json::Value::String(format!("{{{}.message}}", kind)),
        );
        Self {
            kind,
            attributes,
            composing: Vec::new(),
            overrides: Vec::new(),
            report_as_single: false,
        }
    }

    /// Declares an attribute default.
    pub fn attribute(mut self, name: impl Into<String>, default: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), default);
        self
    }

    /// Declares a composing constraint occurrence.
    pub fn composing(mut self, kind: impl Into<String>, attributes: AttributeMap) -> Self {
        self.composing.push(ComposingDeclaration {
            kind: kind.into(),
            attributes,
        });
        self
    }

    /// Declares an attribute override onto a composing constraint.
    pub fn override_attribute(
        mut self,
        from: impl Into<String>,
        target_kind: impl Into<String>,
        constraint_index: Option<usize>,
        to: Option<&str>,
    ) -> Self {
        self.overrides.push(OverrideDeclaration {
            from: from.into(),
            target_kind: target_kind.into(),
            constraint_index,
            to: to.map(Into::into),
        });
        self
    }

    /// Marks the kind as report-as-single-violation.
    pub fn report_as_single_violation(mut self) -> Self {
        self.report_as_single = true;
        self
    }

    /// The constraint kind this definition describes.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Declared attribute defaults.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Declared composing constraints.
    pub fn composing_declarations(&self) -> &[ComposingDeclaration] {
        &self.composing
    }

    /// Declared attribute overrides.
    pub fn override_declarations(&self) -> &[OverrideDeclaration] {
        &self.overrides
    }

    /// True if the kind bears the report-as-single-violation marker.
    pub fn is_report_as_single(&self) -> bool {
        self.report_as_single
    }
}

/// Errors raised by registry registration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Attempted to register a definition for a kind that already has one.
    #[error("constraint {0} already defined")]
    DuplicateDefinition(String),

    /// Attempted to register a validator for an undefined constraint kind.
    #[error("constraint {0} is not defined")]
    UnknownConstraint(String),
}

impl From<RegistryError> for crate::error::EngineError {
    fn from(e: RegistryError) -> Self {
        crate::error::EngineError::ConstraintDefinition(e.to_string())
    }
}

/// A thread-safe registry of constraint definitions and their validators.
pub struct ConstraintRegistry {
    definitions: RwLock<HashMap<String, Arc<ConstraintDefinition>>>,
    validators: RwLock<HashMap<String, Vec<ValidatorInfo>>>,
}

impl ConstraintRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            validators: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry pre-populated with the built-in constraint
    /// vocabulary.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        crate::constraints::register_builtins(&registry)
            .expect("built-in constraint vocabulary is consistent");
        registry
    }

    /// Registers a constraint definition.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateDefinition`] if the kind is already
    /// defined.
    pub fn register_definition(
        &self,
        definition: ConstraintDefinition,
    ) -> Result<(), RegistryError> {
        let mut definitions = self.definitions.write();
        if definitions.contains_key(definition.kind()) {
            return Err(RegistryError::DuplicateDefinition(
                definition.kind().to_string(),
            ));
        }
        tracing::debug!(kind = definition.kind(), "registering constraint definition");
        definitions.insert(definition.kind().to_string(), Arc::new(definition));
        Ok(())
    }

    /// Registers a validator implementation for a defined constraint kind.
    pub fn register_validator(
        &self,
        kind: &str,
        info: ValidatorInfo,
    ) -> Result<(), RegistryError> {
        if !self.definitions.read().contains_key(kind) {
            return Err(RegistryError::UnknownConstraint(kind.to_string()));
        }
        self.validators
            .write()
            .entry(kind.to_string())
            .or_default()
            .push(info);
        Ok(())
    }

    /// Looks up a definition by kind.
    pub fn definition(&self, kind: &str) -> Option<Arc<ConstraintDefinition>> {
        self.definitions.read().get(kind).cloned()
    }

    /// The validator implementations declared for a kind, in registration
    /// order.
    pub fn validator_infos(&self, kind: &str) -> Vec<ValidatorInfo> {
        self.validators.read().get(kind).cloned().unwrap_or_default()
    }

    /// Union of the validation targets supported by a kind's validators.
    ///
    /// A defined kind with no validators acts as a pure composition carrier
    /// and reports `{AnnotatedElement}`.
    pub fn supported_targets(&self, kind: &str) -> IndexSet<ValidationTarget> {
        let infos = self.validators.read();
        let targets: IndexSet<ValidationTarget> = infos
            .get(kind)
            .into_iter()
            .flatten()
            .flat_map(|info| info.targets().iter().copied())
            .collect();
        if targets.is_empty() {
            std::iter::once(ValidationTarget::AnnotatedElement).collect()
        } else {
            targets
        }
    }
}

impl Default for ConstraintRegistry {
    fn default() -> Self {
        Self::new()
    }
}
