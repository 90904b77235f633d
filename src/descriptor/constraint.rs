//! Constraint descriptors.
//!
//! A [`ConstraintDescriptor`] is the immutable, fully merged form of one
//! constraint occurrence: definition defaults overlaid with the declared
//! attributes, groups and payload normalized, composing constraints built
//! recursively with attribute overrides applied, and the validator
//! resolution memoized behind an idempotent once-cell.

use std::sync::{Arc, OnceLock};

use indexmap::IndexSet;

use crate::composition::CompositionCache;
use crate::error::EngineError;
use crate::groups::Group;
use crate::metadata::ConstraintDeclaration;
use crate::registry::{AttributeMap, ConstraintRegistry, ValidationTarget, ValidatorInfo};
use crate::resolve::{resolve_validator, ResolutionError, TypeHierarchy};
use crate::value::ValueType;

/// Reserved payload marker requesting container unwrapping.
pub const PAYLOAD_UNWRAP: &str = "Unwrap";
/// Reserved payload marker forbidding container unwrapping.
pub const PAYLOAD_SKIP: &str = "Skip";

/// Where a constraint declaration came from, relative to the validated type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Declared on the validated type itself.
    LocalElement,
    /// Inherited from a parent type.
    Hierarchy,
}

/// The kind of element a constraint is declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Type,
    Field,
    ContainerElement,
    Parameter,
    CrossParameter,
    ReturnValue,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ElementKind::Type => "type",
            ElementKind::Field => "field",
            ElementKind::ContainerElement => "container element",
            ElementKind::Parameter => "parameter",
            ElementKind::CrossParameter => "cross-parameter",
            ElementKind::ReturnValue => "return value",
        };
        write!(f, "{}", text)
    }
}

/// Declared `validationAppliesTo` of a constraint occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintTarget {
    Implicit,
    AnnotatedElement,
    Parameters,
}

/// Unwrapping mode derived from the reserved payload markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateUnwrapped {
    Default,
    Unwrap,
    Skip,
}

/// Services needed while building descriptors.
pub(crate) struct DescriptorContext<'a> {
    pub registry: &'a ConstraintRegistry,
    pub compositions: &'a CompositionCache,
}

/// One constraint occurrence, immutable after build.
#[derive(Debug)]
pub struct ConstraintDescriptor {
    kind: String,
    attributes: AttributeMap,
    message_template: String,
    groups: IndexSet<Group>,
    payload: IndexSet<String>,
    scope: Scope,
    declared_on: ElementKind,
    validation_applies_to: ConstraintTarget,
    validated_type: ValueType,
    target: ValidationTarget,
    report_as_single: bool,
    unwrapping: ValidateUnwrapped,
    composing: Vec<Arc<ConstraintDescriptor>>,
    resolved: OnceLock<Result<ValidatorInfo, ResolutionError>>,
}

impl ConstraintDescriptor {
    pub(crate) fn build(
        declaration: &ConstraintDeclaration,
        scope: Scope,
        declared_on: ElementKind,
        validated_type: &ValueType,
        target: ValidationTarget,
        ctx: &DescriptorContext<'_>,
    ) -> Result<Arc<Self>, EngineError> {
        let mut stack = Vec::new();
        Self::build_inner(
            declaration,
            scope,
            declared_on,
            validated_type,
            target,
            ctx,
            None,
            &mut stack,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn build_inner(
        declaration: &ConstraintDeclaration,
        scope: Scope,
        declared_on: ElementKind,
        validated_type: &ValueType,
        target: ValidationTarget,
        ctx: &DescriptorContext<'_>,
        inherited: Option<(&IndexSet<Group>, &IndexSet<String>)>,
        stack: &mut Vec<String>,
    ) -> Result<Arc<Self>, EngineError> {
        let kind = &declaration.kind;
        if stack.iter().any(|k| k == kind) {
            return Err(EngineError::ConstraintDefinition(format!(
                "recursive constraint composition involving {}",
                kind
            )));
        }

        let definition = ctx.registry.definition(kind).ok_or_else(|| {
            EngineError::ConstraintDefinition(format!("constraint {} is not defined", kind))
        })?;

        // Definition defaults overlaid by the declaration site.
        let mut attributes = definition.attributes().clone();
        for (name, value) in &declaration.attributes {
            attributes.insert(name.clone(), value.clone());
        }

        // Composing constraints share the groups and payload of the
        // constraint they compose.
        let (groups, payload) = match inherited {
            Some((groups, payload)) => (groups.clone(), payload.clone()),
            None => (
                read_groups(&attributes),
                read_string_set(&attributes, "payload"),
            ),
        };

        let unwrapping = match (
            payload.contains(PAYLOAD_UNWRAP),
            payload.contains(PAYLOAD_SKIP),
        ) {
            (true, true) => {
                return Err(EngineError::ConstraintDefinition(format!(
                    "constraint {} carries both {} and {} payloads",
                    kind, PAYLOAD_UNWRAP, PAYLOAD_SKIP
                )))
            }
            (true, false) => ValidateUnwrapped::Unwrap,
            (false, true) => ValidateUnwrapped::Skip,
            (false, false) => ValidateUnwrapped::Default,
        };

        let validation_applies_to = read_applies_to(&attributes, kind)?;
        if validation_applies_to == ConstraintTarget::Parameters
            && target != ValidationTarget::Parameters
        {
            return Err(EngineError::ConstraintDefinition(format!(
                "constraint {} declares validationAppliesTo=PARAMETERS but is declared on a {}",
                kind, declared_on
            )));
        }

        let message_template = attributes
            .get("message")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{{{}.message}}", kind));

        let composition = ctx.compositions.composition(ctx.registry, kind)?;
        let mut composing = Vec::new();
        if composition.is_composed() {
            stack.push(kind.clone());
            for component in composition.components_for(&attributes)? {
                let component = ConstraintDeclaration::new(component.kind, component.attributes);
                composing.push(Self::build_inner(
                    &component,
                    scope,
                    declared_on,
                    validated_type,
                    target,
                    ctx,
                    Some((&groups, &payload)),
                    stack,
                )?);
            }
            stack.pop();
        }

        Ok(Arc::new(Self {
            kind: kind.clone(),
            attributes,
            message_template,
            groups,
            payload,
            scope,
            declared_on,
            validation_applies_to,
            validated_type: validated_type.clone(),
            target,
            report_as_single: definition.is_report_as_single(),
            unwrapping,
            composing,
            resolved: OnceLock::new(),
        }))
    }

    /// The constraint kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The merged attribute map.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// A single attribute value.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// The declared message template.
    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    /// The effective group set; never empty.
    pub fn groups(&self) -> &IndexSet<Group> {
        &self.groups
    }

    /// True if the constraint participates in the given group.
    pub fn in_group(&self, group: &Group) -> bool {
        self.groups.contains(group)
    }

    /// Declared payload markers.
    pub fn payload(&self) -> &IndexSet<String> {
        &self.payload
    }

    /// Where the declaration came from relative to the validated type.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The element kind the constraint is declared on.
    pub fn declared_on(&self) -> ElementKind {
        self.declared_on
    }

    /// Declared `validationAppliesTo`.
    pub fn validation_applies_to(&self) -> ConstraintTarget {
        self.validation_applies_to
    }

    /// The static type of the annotated element.
    pub fn validated_type(&self) -> &ValueType {
        &self.validated_type
    }

    /// The validation target the occurrence is evaluated for.
    pub fn target(&self) -> ValidationTarget {
        self.target
    }

    /// True if the kind bears the report-as-single-violation marker.
    pub fn is_report_as_single(&self) -> bool {
        self.report_as_single
    }

    /// Effective unwrapping mode.
    pub fn unwrapping(&self) -> ValidateUnwrapped {
        self.unwrapping
    }

    /// Composing constraint descriptors, in declaration order.
    pub fn composing(&self) -> &[Arc<ConstraintDescriptor>] {
        &self.composing
    }

    /// Resolves the validator for this occurrence, memoized.
    ///
    /// Returns `Ok(None)` for a pure composition carrier (a kind with no
    /// registered validators but composing constraints).
    pub(crate) fn validator(
        &self,
        registry: &ConstraintRegistry,
        hierarchy: &dyn TypeHierarchy,
    ) -> Result<Option<ValidatorInfo>, EngineError> {
        if !self.composing.is_empty() && registry.validator_infos(&self.kind).is_empty() {
            return Ok(None);
        }
        let outcome = self.resolved.get_or_init(|| {
            resolve_validator(registry, hierarchy, &self.kind, &self.validated_type, self.target)
        });
        outcome.clone().map(Some).map_err(EngineError::from)
    }
}

fn read_groups(attributes: &AttributeMap) -> IndexSet<Group> {
    let declared: IndexSet<Group> = attributes
        .get("groups")
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.as_str())
                .map(Group::new)
                .collect()
        })
        .unwrap_or_default();
    if declared.is_empty() {
        std::iter::once(Group::default_group()).collect()
    } else {
        declared
    }
}

fn read_string_set(attributes: &AttributeMap, name: &str) -> IndexSet<String> {
    attributes
        .get(name)
        .and_then(|v| v.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn read_applies_to(attributes: &AttributeMap, kind: &str) -> Result<ConstraintTarget, EngineError> {
    match attributes.get("validationAppliesTo").and_then(|v| v.as_str()) {
        None => Ok(ConstraintTarget::Implicit),
        Some("IMPLICIT") => Ok(ConstraintTarget::Implicit),
        Some("ANNOTATED_ELEMENT") => Ok(ConstraintTarget::AnnotatedElement),
        Some("PARAMETERS") => Ok(ConstraintTarget::Parameters),
        Some(other) => Err(EngineError::ConstraintDefinition(format!(
            "invalid validationAppliesTo value {:?} on constraint {}",
            other, kind
        ))),
    }
}
