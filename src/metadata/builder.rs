//! The metadata merge pipeline.
//!
//! Several [`MetadataSource`]s can describe the same type, and a type
//! inherits declarations from its parents. This module reduces all of that
//! to one merged view per type:
//!
//! 1. *Level merge*: every source contributing metadata for a type is
//!    merged element-wise. Non-`Abstain` behaviors must agree (consensus);
//!    a consensus of `Override` drops the primary source's contribution.
//! 2. *Hierarchy flatten*: the type's own merged level is combined with its
//!    ancestors' merged levels (breadth-first, deduplicated), unless the own
//!    level's behavior is `Override`, in which case inherited declarations
//!    are ignored. Constructors never inherit.
//!
//! The caller (the descriptor manager) assigns scopes: own-level constraints
//! are local, ancestor-level constraints belong to the hierarchy.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::EngineError;
use crate::metadata::{
    AnnotationBehavior, BeanMetadata, ElementMetadata, ExecutableMetadata, MetadataSource,
};

/// The merged metadata view of one type.
#[derive(Debug, Clone)]
pub(crate) struct MergedBean {
    /// The type's own level, all sources merged.
    pub own: BeanMetadata,
    /// Ancestor levels in breadth-first order, all sources merged per level.
    pub inherited: Vec<BeanMetadata>,
}

/// Merges all source contributions for exactly one type level.
///
/// Returns the merged metadata and the consensus behavior, or `None` when no
/// source describes the type.
pub(crate) fn merge_level(
    sources: &[Arc<dyn MetadataSource>],
    type_name: &str,
) -> Result<Option<(BeanMetadata, AnnotationBehavior)>, EngineError> {
    let mut contributions: Vec<(AnnotationBehavior, BeanMetadata)> = Vec::new();
    for source in sources {
        if let Some(meta) = source.bean(type_name) {
            contributions.push((source.behavior(), meta));
        }
    }
    if contributions.is_empty() {
        return Ok(None);
    }

    let behavior = consensus(
        type_name,
        contributions.iter().map(|(behavior, _)| *behavior),
    )?;

    // A consensus override drops the primary (first) source's contribution,
    // keeping only the overlays, unless the primary is the sole contributor.
    let mut iter = contributions.into_iter();
    let (_, primary) = iter.next().unwrap();
    let overlays: Vec<BeanMetadata> = iter.map(|(_, meta)| meta).collect();

    let mut merged = if behavior == AnnotationBehavior::Override && !overlays.is_empty() {
        BeanMetadata {
            parents: primary.parents.clone(),
            ..BeanMetadata::default()
        }
    } else {
        primary
    };
    for overlay in overlays {
        merge_bean(&mut merged, overlay);
    }
    Ok(Some((merged, behavior)))
}

/// Computes the merged view of a type including its flattened hierarchy.
pub(crate) fn merged_bean(
    sources: &[Arc<dyn MetadataSource>],
    type_name: &str,
) -> Result<Option<MergedBean>, EngineError> {
    let Some((own, behavior)) = merge_level(sources, type_name)? else {
        return Ok(None);
    };

    let mut inherited = Vec::new();
    if behavior != AnnotationBehavior::Override {
        let mut queue: std::collections::VecDeque<String> = own.parents.iter().cloned().collect();
        let mut visited = vec![type_name.to_string()];
        while let Some(ancestor) = queue.pop_front() {
            if visited.contains(&ancestor) {
                continue;
            }
            visited.push(ancestor.clone());
            if let Some((mut level, _)) = merge_level(sources, &ancestor)? {
                queue.extend(level.parents.iter().cloned());
                // Constructors are not inherited.
                level.constructors.clear();
                inherited.push(level);
            }
        }
    }

    Ok(Some(MergedBean { own, inherited }))
}

/// Collects group sequence declarations from all sources.
///
/// A sequence may be declared once; redeclaring it with different components
/// is a group definition error.
pub(crate) fn collect_sequences(
    sources: &[Arc<dyn MetadataSource>],
) -> Result<IndexMap<String, Vec<String>>, EngineError> {
    let mut sequences: IndexMap<String, Vec<String>> = IndexMap::new();
    for source in sources {
        for (name, components) in source.group_sequences() {
            match sequences.get(&name) {
                None => {
                    sequences.insert(name, components);
                }
                Some(existing) if *existing == components => {}
                Some(_) => {
                    return Err(EngineError::GroupDefinition(format!(
                        "group sequence {} declared with conflicting components",
                        name
                    )));
                }
            }
        }
    }
    Ok(sequences)
}

fn consensus(
    type_name: &str,
    behaviors: impl Iterator<Item = AnnotationBehavior>,
) -> Result<AnnotationBehavior, EngineError> {
    let mut decided = AnnotationBehavior::Abstain;
    for behavior in behaviors {
        if behavior == AnnotationBehavior::Abstain {
            continue;
        }
        if decided == AnnotationBehavior::Abstain {
            decided = behavior;
        } else if decided != behavior {
            return Err(EngineError::ConstraintDefinition(format!(
                "metadata sources disagree on annotation behavior for type {}",
                type_name
            )));
        }
    }
    Ok(decided)
}

fn merge_bean(base: &mut BeanMetadata, overlay: BeanMetadata) {
    for parent in overlay.parents {
        if !base.parents.contains(&parent) {
            base.parents.push(parent);
        }
    }
    base.class_constraints.extend(overlay.class_constraints);
    if overlay.group_sequence.is_some() {
        base.group_sequence = overlay.group_sequence;
    }
    for (name, element) in overlay.fields {
        match base.fields.get_mut(&name) {
            Some(existing) => merge_element(existing, element),
            None => {
                base.fields.insert(name, element);
            }
        }
    }
    for (signature, executable) in overlay.methods {
        match base.methods.get_mut(&signature) {
            Some(existing) => merge_executable(existing, executable),
            None => {
                base.methods.insert(signature, executable);
            }
        }
    }
    for (signature, executable) in overlay.constructors {
        match base.constructors.get_mut(&signature) {
            Some(existing) => merge_executable(existing, executable),
            None => {
                base.constructors.insert(signature, executable);
            }
        }
    }
}

pub(crate) fn merge_element(base: &mut ElementMetadata, overlay: ElementMetadata) {
    base.constraints.extend(overlay.constraints);
    base.cascade |= overlay.cascade;
    base.group_conversions.extend(overlay.group_conversions);
    for (key, element) in overlay.container_elements {
        match base.container_elements.get_mut(&key) {
            Some(existing) => merge_element(existing, element),
            None => {
                base.container_elements.insert(key, element);
            }
        }
    }
}

fn merge_executable(base: &mut ExecutableMetadata, overlay: ExecutableMetadata) {
    for (i, parameter) in overlay.parameters.into_iter().enumerate() {
        if let Some(existing) = base.parameters.get_mut(i) {
            merge_element(&mut existing.element, parameter.element);
        }
    }
    base.cross_parameter.extend(overlay.cross_parameter);
    match (&mut base.return_value, overlay.return_value) {
        (Some(existing), Some(value)) => merge_element(existing, value),
        (slot @ None, Some(value)) => *slot = Some(value),
        (_, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::mapping::ConstraintMapping;
    use crate::registry::attrs;
    use crate::value::ValueType;

    fn sources(mappings: Vec<ConstraintMapping>) -> Vec<Arc<dyn MetadataSource>> {
        mappings
            .into_iter()
            .map(|m| Arc::new(m) as Arc<dyn MetadataSource>)
            .collect()
    }

    #[test]
    fn test_unknown_type_has_no_metadata() {
        let sources = sources(vec![ConstraintMapping::new()]);
        assert!(merged_bean(&sources, "Missing").unwrap().is_none());
    }

    #[test]
    fn test_parallel_merge_concatenates_constraints() {
        let primary = ConstraintMapping::new().bean("User", |bean| {
            bean.field("name", ValueType::Str, |f| f.constraint("NotBlank", attrs([])))
        });
        let overlay = ConstraintMapping::new()
            .with_behavior(AnnotationBehavior::Merge)
            .bean("User", |bean| {
                bean.field("name", ValueType::Str, |f| f.constraint("NotNull", attrs([])))
            });

        let merged = merged_bean(&sources(vec![primary, overlay]), "User")
            .unwrap()
            .unwrap();
        let kinds: Vec<_> = merged.own.fields["name"]
            .constraints
            .iter()
            .map(|c| c.kind.clone())
            .collect();
        assert_eq!(kinds, vec!["NotBlank", "NotNull"]);
    }

    #[test]
    fn test_override_drops_primary_level() {
        let primary = ConstraintMapping::new().bean("User", |bean| {
            bean.field("name", ValueType::Str, |f| f.constraint("NotBlank", attrs([])))
        });
        let overlay = ConstraintMapping::new()
            .with_behavior(AnnotationBehavior::Override)
            .bean("User", |bean| {
                bean.field("name", ValueType::Str, |f| f.constraint("NotNull", attrs([])))
            });

        let merged = merged_bean(&sources(vec![primary, overlay]), "User")
            .unwrap()
            .unwrap();
        let kinds: Vec<_> = merged.own.fields["name"]
            .constraints
            .iter()
            .map(|c| c.kind.clone())
            .collect();
        assert_eq!(kinds, vec!["NotNull"]);
    }

    #[test]
    fn test_conflicting_behaviors_rejected() {
        let primary = ConstraintMapping::new().bean("User", |bean| bean);
        let merge_overlay = ConstraintMapping::new()
            .with_behavior(AnnotationBehavior::Merge)
            .bean("User", |bean| bean);
        let override_overlay = ConstraintMapping::new()
            .with_behavior(AnnotationBehavior::Override)
            .bean("User", |bean| bean);

        let result = merged_bean(
            &sources(vec![primary, merge_overlay, override_overlay]),
            "User",
        );
        assert!(matches!(result, Err(EngineError::ConstraintDefinition(_))));
    }

    #[test]
    fn test_hierarchy_flattens_parents() {
        let mapping = ConstraintMapping::new()
            .bean("Base", |bean| {
                bean.field("id", ValueType::Int, |f| f.constraint("Min", attrs([])))
            })
            .bean("Child", |bean| {
                bean.parent("Base")
                    .field("name", ValueType::Str, |f| f.constraint("NotBlank", attrs([])))
            });

        let merged = merged_bean(&sources(vec![mapping]), "Child")
            .unwrap()
            .unwrap();
        assert!(merged.own.fields.contains_key("name"));
        assert_eq!(merged.inherited.len(), 1);
        assert!(merged.inherited[0].fields.contains_key("id"));
    }

    #[test]
    fn test_override_level_ignores_inherited() {
        let primary = ConstraintMapping::new()
            .bean("Base", |bean| {
                bean.field("id", ValueType::Int, |f| f.constraint("Min", attrs([])))
            })
            .bean("Child", |bean| bean.parent("Base"));
        let overlay = ConstraintMapping::new()
            .with_behavior(AnnotationBehavior::Override)
            .bean("Child", |bean| {
                bean.field("name", ValueType::Str, |f| f.constraint("NotBlank", attrs([])))
            });

        let merged = merged_bean(&sources(vec![primary, overlay]), "Child")
            .unwrap()
            .unwrap();
        assert!(merged.inherited.is_empty());
    }

    #[test]
    fn test_constructors_do_not_inherit() {
        let mapping = ConstraintMapping::new()
            .bean("Base", |bean| {
                bean.constructor([("id", ValueType::Int)], |ctor| {
                    ctor.parameter(0, |p| p.constraint("Min", attrs([])))
                })
            })
            .bean("Child", |bean| bean.parent("Base"));

        let merged = merged_bean(&sources(vec![mapping]), "Child")
            .unwrap()
            .unwrap();
        assert!(merged.inherited[0].constructors.is_empty());
    }

    #[test]
    fn test_diamond_hierarchy_visits_once() {
        let mapping = ConstraintMapping::new()
            .bean("Root", |bean| {
                bean.field("id", ValueType::Int, |f| f.constraint("Min", attrs([])))
            })
            .bean("Left", |bean| bean.parent("Root"))
            .bean("Right", |bean| bean.parent("Root"))
            .bean("Bottom", |bean| bean.parent("Left").parent("Right"));

        let merged = merged_bean(&sources(vec![mapping]), "Bottom")
            .unwrap()
            .unwrap();
        let roots = merged
            .inherited
            .iter()
            .filter(|level| level.fields.contains_key("id"))
            .count();
        assert_eq!(roots, 1);
    }

    #[test]
    fn test_conflicting_sequences_rejected() {
        let a = ConstraintMapping::new().group_sequence("Audit", ["A", "B"]);
        let b = ConstraintMapping::new().group_sequence("Audit", ["B", "A"]);
        let result = collect_sequences(&sources(vec![a, b]));
        assert!(matches!(result, Err(EngineError::GroupDefinition(_))));
    }
}
