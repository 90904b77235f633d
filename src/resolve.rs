//! Validator resolution.
//!
//! Given a constraint kind, the static type of its annotated element and a
//! validation target, resolution picks the single most specific validator
//! implementation. The element type's ascending type chain (bean parents
//! included) is walked breadth-first; a validator declared for a visited
//! type is kept unless a strictly more specific candidate was already
//! admitted. Anything other than exactly one surviving candidate fails.

use crate::error::EngineError;
use crate::registry::{ConstraintRegistry, ValidationTarget, ValidatorInfo};
use crate::value::ValueType;

/// Supplies the declared parents of bean types.
///
/// The descriptor manager implements this from declared metadata; resolution
/// is otherwise independent of where metadata comes from.
pub trait TypeHierarchy {
    /// Declared parent types of `bean_type`, in declaration order.
    fn parents_of(&self, bean_type: &str) -> Vec<String>;
}

/// A hierarchy with no bean parents.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatHierarchy;

impl TypeHierarchy for FlatHierarchy {
    fn parents_of(&self, _bean_type: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Why resolution failed. Cloneable so the outcome can be memoized on the
/// descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// No validator is applicable to the element type.
    #[error("unexpected type: {0}")]
    NoValidator(String),
    /// More than one maximally specific validator is applicable.
    #[error("unexpected type: {0}")]
    Ambiguous(String),
    /// The declared validator set itself is inconsistent.
    #[error("constraint definition error: {0}")]
    Definition(String),
}

impl From<ResolutionError> for EngineError {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::NoValidator(msg) | ResolutionError::Ambiguous(msg) => {
                EngineError::UnexpectedType(msg)
            }
            ResolutionError::Definition(msg) => EngineError::ConstraintDefinition(msg),
        }
    }
}

/// The ascending type chain of `ty`, breadth-first, starting at `ty` itself
/// and ending at `Any`. Bean parents come from the hierarchy; a bean with no
/// parents ascends through `AnyBean`.
pub fn ascending_types(ty: &ValueType, hierarchy: &dyn TypeHierarchy) -> Vec<ValueType> {
    let mut chain = Vec::new();
    let mut queue = std::collections::VecDeque::from([ty.clone()]);
    while let Some(current) = queue.pop_front() {
        if chain.contains(&current) {
            continue;
        }
        let supertypes = match &current {
            ValueType::Bean(name) => {
                let parents = hierarchy.parents_of(name);
                if parents.is_empty() {
                    vec![ValueType::AnyBean]
                } else {
                    parents.into_iter().map(ValueType::Bean).collect()
                }
            }
            other => other.direct_supertypes(),
        };
        chain.push(current);
        queue.extend(supertypes);
    }
    chain
}

/// True if `sub` is the same type as, or a subtype of, `sup`.
pub fn is_assignable(sup: &ValueType, sub: &ValueType, hierarchy: &dyn TypeHierarchy) -> bool {
    ascending_types(sub, hierarchy).contains(sup)
}

/// Resolves the single most specific validator for
/// `(constraint kind, element type, target)`.
pub fn resolve_validator(
    registry: &ConstraintRegistry,
    hierarchy: &dyn TypeHierarchy,
    kind: &str,
    validated_type: &ValueType,
    target: ValidationTarget,
) -> Result<ValidatorInfo, ResolutionError> {
    let infos = registry.validator_infos(kind);
    match target {
        ValidationTarget::Parameters => resolve_cross_parameter(kind, infos),
        ValidationTarget::AnnotatedElement => {
            resolve_annotated_element(kind, validated_type, infos, hierarchy)
        }
    }
}

fn resolve_cross_parameter(
    kind: &str,
    infos: Vec<ValidatorInfo>,
) -> Result<ValidatorInfo, ResolutionError> {
    let mut cross: Vec<ValidatorInfo> = infos
        .into_iter()
        .filter(|info| info.supports(ValidationTarget::Parameters))
        .collect();

    if cross.is_empty() {
        return Err(ResolutionError::NoValidator(format!(
            "no cross-parameter validator found for constraint {}",
            kind
        )));
    }
    if cross.len() > 1 {
        return Err(ResolutionError::Ambiguous(format!(
            "{} cross-parameter validators found for constraint {}",
            cross.len(),
            kind
        )));
    }
    let result = cross.remove(0);
    if !matches!(result.validated_type(), ValueType::List | ValueType::Any) {
        return Err(ResolutionError::Definition(format!(
            "cross-parameter validator {} does not support validation of a parameter list",
            result.name()
        )));
    }
    Ok(result)
}

fn resolve_annotated_element(
    kind: &str,
    validated_type: &ValueType,
    infos: Vec<ValidatorInfo>,
    hierarchy: &dyn TypeHierarchy,
) -> Result<ValidatorInfo, ResolutionError> {
    let mut by_type: indexmap::IndexMap<ValueType, ValidatorInfo> = indexmap::IndexMap::new();
    for info in infos
        .into_iter()
        .filter(|info| info.supports(ValidationTarget::AnnotatedElement))
    {
        if by_type
            .insert(info.validated_type().clone(), info)
            .is_some()
        {
            return Err(ResolutionError::Ambiguous(format!(
                "several validators of constraint {} declare the same validated type",
                kind
            )));
        }
    }

    let mut candidates: indexmap::IndexMap<ValueType, ValidatorInfo> = indexmap::IndexMap::new();
    for ty in ascending_types(validated_type, hierarchy) {
        if let Some(info) = by_type.get(&ty) {
            // A previously admitted candidate that is a subtype of the
            // current type shadows it on the ascending walk.
            let shadowed = candidates
                .keys()
                .any(|admitted| is_assignable(&ty, admitted, hierarchy));
            if !shadowed {
                candidates.insert(ty, info.clone());
            }
        }
    }

    if candidates.is_empty() {
        return Err(ResolutionError::NoValidator(format!(
            "no validator of constraint {} applies to elements of type {}",
            kind, validated_type
        )));
    }
    if candidates.len() > 1 {
        return Err(ResolutionError::Ambiguous(format!(
            "{} maximally specific validators of constraint {} apply to elements of type {}",
            candidates.len(),
            kind,
            validated_type
        )));
    }
    Ok(candidates.into_iter().next().map(|(_, info)| info).unwrap())
}
