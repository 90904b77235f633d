//! Immutable per-type descriptors and the descriptor manager.
//!
//! A [`BeanDescriptor`] is the merged, immutable metadata of one type:
//! class-level constraints, constrained properties, methods and
//! constructors, and the optional redefined default group sequence.
//! Cascadable elements (properties, container elements, parameters, return
//! values) share the [`CascadableData`] capability: own constraints, the
//! cascade flag, group conversions and nested container-element
//! descriptors.
//!
//! The [`DescriptorManager`] builds descriptors lazily through the metadata
//! pipeline and caches them per type; publication is idempotent, the first
//! completed descriptor wins and every reader observes the same value.

mod constraint;

pub use constraint::{
    ConstraintDescriptor, ConstraintTarget, ElementKind, Scope, ValidateUnwrapped, PAYLOAD_SKIP,
    PAYLOAD_UNWRAP,
};
pub(crate) use constraint::DescriptorContext;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::composition::CompositionCache;
use crate::error::EngineError;
use crate::groups::Group;
use crate::metadata::builder::{merge_level, merged_bean, MergedBean};
use crate::metadata::{
    ContainerElementKey, ElementMetadata, ExecutableMetadata, MetadataSource, Signature,
};
use crate::registry::{ConstraintRegistry, ValidationTarget};
use crate::resolve::TypeHierarchy;
use crate::value::ValueType;

/// Shared capability of every cascadable element.
#[derive(Debug)]
pub struct CascadableData {
    constraints: Vec<Arc<ConstraintDescriptor>>,
    cascaded: bool,
    group_conversions: IndexMap<Group, Group>,
    container_elements: IndexMap<ContainerElementKey, ContainerElementDescriptor>,
}

impl CascadableData {
    fn build(
        levels: &[(&ElementMetadata, Scope)],
        declared_on: ElementKind,
        target: ValidationTarget,
        ctx: &DescriptorContext<'_>,
    ) -> Result<Self, EngineError> {
        let declared_type = levels[0].0.declared_type.clone();

        let mut constraints = Vec::new();
        let mut cascaded = false;
        let mut group_conversions: IndexMap<Group, Group> = IndexMap::new();
        for (meta, scope) in levels {
            for declaration in &meta.constraints {
                constraints.push(ConstraintDescriptor::build(
                    declaration,
                    *scope,
                    declared_on,
                    &declared_type,
                    target,
                    ctx,
                )?);
            }
            cascaded |= meta.cascade;
            for (from, to) in &meta.group_conversions {
                let from = Group::new(from);
                let to = Group::new(to);
                match group_conversions.get(&from) {
                    None => {
                        group_conversions.insert(from, to);
                    }
                    Some(existing) if *existing == to => {}
                    Some(_) => {
                        return Err(EngineError::GroupDefinition(format!(
                            "duplicate group conversion declared for group {}",
                            from
                        )))
                    }
                }
            }
        }

        let mut keys: Vec<ContainerElementKey> = Vec::new();
        for (meta, _) in levels {
            for key in meta.container_elements.keys() {
                if !keys.contains(key) {
                    keys.push(*key);
                }
            }
        }
        let mut container_elements = IndexMap::new();
        for key in keys {
            let nested: Vec<(&ElementMetadata, Scope)> = levels
                .iter()
                .filter_map(|(meta, scope)| {
                    meta.container_elements.get(&key).map(|e| (e, *scope))
                })
                .collect();
            let data = CascadableData::build(
                &nested,
                ElementKind::ContainerElement,
                ValidationTarget::AnnotatedElement,
                ctx,
            )?;
            container_elements.insert(
                key,
                ContainerElementDescriptor {
                    key,
                    node_name: key.node_name().map(str::to_string),
                    declared_type: nested[0].0.declared_type.clone(),
                    cascadable: data,
                },
            );
        }

        Ok(Self {
            constraints,
            cascaded,
            group_conversions,
            container_elements,
        })
    }

    /// Own constraints, in declaration order (local before inherited).
    pub fn constraints(&self) -> &[Arc<ConstraintDescriptor>] {
        &self.constraints
    }

    /// True if the element requests cascaded validation.
    pub fn is_cascaded(&self) -> bool {
        self.cascaded
    }

    /// Declared group conversions.
    pub fn group_conversions(&self) -> &IndexMap<Group, Group> {
        &self.group_conversions
    }

    /// Applies the element's group conversions to a group.
    pub fn convert_group(&self, group: &Group) -> Group {
        self.group_conversions
            .get(group)
            .cloned()
            .unwrap_or_else(|| group.clone())
    }

    /// Constrained container-element positions of the element.
    pub fn container_elements(
        &self,
    ) -> impl Iterator<Item = &ContainerElementDescriptor> {
        self.container_elements.values()
    }
}

/// A constrained property of a bean.
#[derive(Debug)]
pub struct PropertyDescriptor {
    name: String,
    declared_type: ValueType,
    cascadable: CascadableData,
}

impl PropertyDescriptor {
    /// The property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared static type.
    pub fn declared_type(&self) -> &ValueType {
        &self.declared_type
    }

    /// The cascadable capability of the property.
    pub fn cascadable(&self) -> &CascadableData {
        &self.cascadable
    }

    /// The element kind properties are declared on.
    pub fn element_kind(&self) -> ElementKind {
        ElementKind::Field
    }
}

/// A constrained container-element position.
#[derive(Debug)]
pub struct ContainerElementDescriptor {
    key: ContainerElementKey,
    node_name: Option<String>,
    declared_type: ValueType,
    cascadable: CascadableData,
}

impl ContainerElementDescriptor {
    /// The `(container, type argument)` key.
    pub fn key(&self) -> ContainerElementKey {
        self.key
    }

    /// The path-node name of this position, if it contributes one.
    pub fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }

    /// The declared element type.
    pub fn declared_type(&self) -> &ValueType {
        &self.declared_type
    }

    /// The cascadable capability of the position.
    pub fn cascadable(&self) -> &CascadableData {
        &self.cascadable
    }
}

/// A constrained executable parameter.
#[derive(Debug)]
pub struct ParameterDescriptor {
    name: String,
    index: usize,
    declared_type: ValueType,
    cascadable: CascadableData,
}

impl ParameterDescriptor {
    /// The declared parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The declared static type.
    pub fn declared_type(&self) -> &ValueType {
        &self.declared_type
    }

    /// The cascadable capability of the parameter.
    pub fn cascadable(&self) -> &CascadableData {
        &self.cascadable
    }
}

/// The constrained return value of an executable.
#[derive(Debug)]
pub struct ReturnValueDescriptor {
    declared_type: ValueType,
    cascadable: CascadableData,
}

impl ReturnValueDescriptor {
    /// The declared static type.
    pub fn declared_type(&self) -> &ValueType {
        &self.declared_type
    }

    /// The cascadable capability of the return value.
    pub fn cascadable(&self) -> &CascadableData {
        &self.cascadable
    }
}

/// Method or constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    Method,
    Constructor,
}

/// A constrained method or constructor.
#[derive(Debug)]
pub struct ExecutableDescriptor {
    kind: ExecutableKind,
    signature: Signature,
    parameters: Vec<ParameterDescriptor>,
    cross_parameter: Vec<Arc<ConstraintDescriptor>>,
    return_value: Option<ReturnValueDescriptor>,
}

impl ExecutableDescriptor {
    fn build(
        kind: ExecutableKind,
        signature: &Signature,
        levels: &[(&ExecutableMetadata, Scope)],
        ctx: &DescriptorContext<'_>,
    ) -> Result<Arc<Self>, EngineError> {
        let first = levels[0].0;
        let mut parameters = Vec::new();
        for (index, parameter) in first.parameters.iter().enumerate() {
            let parameter_levels: Vec<(&ElementMetadata, Scope)> = levels
                .iter()
                .filter_map(|(meta, scope)| {
                    meta.parameters.get(index).map(|p| (&p.element, *scope))
                })
                .collect();
            parameters.push(ParameterDescriptor {
                name: parameter.name.clone(),
                index,
                declared_type: parameter.element.declared_type.clone(),
                cascadable: CascadableData::build(
                    &parameter_levels,
                    ElementKind::Parameter,
                    ValidationTarget::AnnotatedElement,
                    ctx,
                )?,
            });
        }

        let mut cross_parameter = Vec::new();
        for (meta, scope) in levels {
            for declaration in &meta.cross_parameter {
                cross_parameter.push(ConstraintDescriptor::build(
                    declaration,
                    *scope,
                    ElementKind::CrossParameter,
                    &ValueType::List,
                    ValidationTarget::Parameters,
                    ctx,
                )?);
            }
        }

        let return_levels: Vec<(&ElementMetadata, Scope)> = levels
            .iter()
            .filter_map(|(meta, scope)| meta.return_value.as_ref().map(|r| (r, *scope)))
            .collect();
        let return_value = if return_levels.is_empty() {
            None
        } else {
            Some(ReturnValueDescriptor {
                declared_type: return_levels[0].0.declared_type.clone(),
                cascadable: CascadableData::build(
                    &return_levels,
                    ElementKind::ReturnValue,
                    ValidationTarget::AnnotatedElement,
                    ctx,
                )?,
            })
        };

        Ok(Arc::new(Self {
            kind,
            signature: signature.clone(),
            parameters,
            cross_parameter,
            return_value,
        }))
    }

    /// Method or constructor.
    pub fn kind(&self) -> ExecutableKind {
        self.kind
    }

    /// The executable signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Parameter descriptors, in declaration order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Cross-parameter constraints.
    pub fn cross_parameter(&self) -> &[Arc<ConstraintDescriptor>] {
        &self.cross_parameter
    }

    /// The constrained return value, if declared.
    pub fn return_value(&self) -> Option<&ReturnValueDescriptor> {
        self.return_value.as_ref()
    }
}

/// The immutable descriptor of one type.
#[derive(Debug)]
pub struct BeanDescriptor {
    type_name: String,
    parents: Vec<String>,
    constraints: Vec<Arc<ConstraintDescriptor>>,
    properties: IndexMap<String, PropertyDescriptor>,
    methods: IndexMap<Signature, Arc<ExecutableDescriptor>>,
    constructors: IndexMap<Signature, Arc<ExecutableDescriptor>>,
    group_sequence: Option<Vec<Group>>,
}

impl BeanDescriptor {
    fn build(
        type_name: &str,
        merged: Option<MergedBean>,
        ctx: &DescriptorContext<'_>,
    ) -> Result<Arc<Self>, EngineError> {
        let Some(merged) = merged else {
            return Ok(Arc::new(Self {
                type_name: type_name.to_string(),
                parents: Vec::new(),
                constraints: Vec::new(),
                properties: IndexMap::new(),
                methods: IndexMap::new(),
                constructors: IndexMap::new(),
                group_sequence: None,
            }));
        };

        let bean_type = ValueType::bean(type_name);
        let mut constraints = Vec::new();
        let class_levels = std::iter::once((&merged.own, Scope::LocalElement))
            .chain(merged.inherited.iter().map(|m| (m, Scope::Hierarchy)));
        for (level, scope) in class_levels {
            for declaration in &level.class_constraints {
                constraints.push(ConstraintDescriptor::build(
                    declaration,
                    scope,
                    ElementKind::Type,
                    &bean_type,
                    ValidationTarget::AnnotatedElement,
                    ctx,
                )?);
            }
        }

        let mut property_names: Vec<String> = merged.own.fields.keys().cloned().collect();
        for level in &merged.inherited {
            for name in level.fields.keys() {
                if !property_names.contains(name) {
                    property_names.push(name.clone());
                }
            }
        }
        let mut properties = IndexMap::new();
        for name in property_names {
            let mut levels: Vec<(&ElementMetadata, Scope)> = Vec::new();
            if let Some(own) = merged.own.fields.get(&name) {
                levels.push((own, Scope::LocalElement));
            }
            for level in &merged.inherited {
                if let Some(inherited) = level.fields.get(&name) {
                    levels.push((inherited, Scope::Hierarchy));
                }
            }
            let cascadable = CascadableData::build(
                &levels,
                ElementKind::Field,
                ValidationTarget::AnnotatedElement,
                ctx,
            )?;
            properties.insert(
                name.clone(),
                PropertyDescriptor {
                    name,
                    declared_type: levels[0].0.declared_type.clone(),
                    cascadable,
                },
            );
        }

        let mut method_signatures: Vec<Signature> = merged.own.methods.keys().cloned().collect();
        for level in &merged.inherited {
            for signature in level.methods.keys() {
                if !method_signatures.contains(signature) {
                    method_signatures.push(signature.clone());
                }
            }
        }
        let mut methods = IndexMap::new();
        for signature in method_signatures {
            let mut levels: Vec<(&ExecutableMetadata, Scope)> = Vec::new();
            if let Some(own) = merged.own.methods.get(&signature) {
                levels.push((own, Scope::LocalElement));
            }
            for level in &merged.inherited {
                if let Some(inherited) = level.methods.get(&signature) {
                    levels.push((inherited, Scope::Hierarchy));
                }
            }
            let descriptor =
                ExecutableDescriptor::build(ExecutableKind::Method, &signature, &levels, ctx)?;
            methods.insert(signature, descriptor);
        }

        let mut constructors = IndexMap::new();
        for (signature, meta) in &merged.own.constructors {
            let descriptor = ExecutableDescriptor::build(
                ExecutableKind::Constructor,
                signature,
                &[(meta, Scope::LocalElement)],
                ctx,
            )?;
            constructors.insert(signature.clone(), descriptor);
        }

        let group_sequence = match &merged.own.group_sequence {
            None => None,
            Some(sequence) if sequence.is_empty() => {
                return Err(EngineError::GroupDefinition(format!(
                    "type {} redefines an empty default group sequence",
                    type_name
                )))
            }
            Some(sequence) => Some(sequence.iter().map(Group::new).collect()),
        };

        Ok(Arc::new(Self {
            type_name: type_name.to_string(),
            parents: merged.own.parents.clone(),
            constraints,
            properties,
            methods,
            constructors,
            group_sequence,
        }))
    }

    /// The described type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Declared parent types.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Class-level constraints.
    pub fn constraints(&self) -> &[Arc<ConstraintDescriptor>] {
        &self.constraints
    }

    /// Constrained properties, in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    /// One property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    /// One constrained method by signature.
    pub fn method(&self, signature: &Signature) -> Option<Arc<ExecutableDescriptor>> {
        self.methods.get(signature).cloned()
    }

    /// One constrained constructor by signature.
    pub fn constructor(&self, signature: &Signature) -> Option<Arc<ExecutableDescriptor>> {
        self.constructors.get(signature).cloned()
    }

    /// The redefined default group sequence, if declared.
    pub fn group_sequence(&self) -> Option<&[Group]> {
        self.group_sequence.as_deref()
    }

    /// True if the type declares nothing validatable.
    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty() && self.properties.is_empty()
    }
}

/// Builds and caches one descriptor per type.
pub struct DescriptorManager {
    sources: Vec<Arc<dyn MetadataSource>>,
    registry: Arc<ConstraintRegistry>,
    compositions: Arc<CompositionCache>,
    cache: RwLock<HashMap<String, Arc<BeanDescriptor>>>,
}

impl DescriptorManager {
    /// Creates a manager over the given sources.
    pub fn new(
        sources: Vec<Arc<dyn MetadataSource>>,
        registry: Arc<ConstraintRegistry>,
        compositions: Arc<CompositionCache>,
    ) -> Self {
        Self {
            sources,
            registry,
            compositions,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the descriptor for a type, building it on first query.
    ///
    /// Racing builders may redo the (pure) build; the first published
    /// descriptor wins and later callers observe it.
    pub fn descriptor(&self, type_name: &str) -> Result<Arc<BeanDescriptor>, EngineError> {
        if let Some(found) = self.cache.read().get(type_name) {
            return Ok(found.clone());
        }
        let merged = merged_bean(&self.sources, type_name)?;
        let ctx = DescriptorContext {
            registry: &self.registry,
            compositions: &self.compositions,
        };
        let built = BeanDescriptor::build(type_name, merged, &ctx)?;
        tracing::debug!(type_name, "built bean descriptor");

        let mut cache = self.cache.write();
        let published = cache
            .entry(type_name.to_string())
            .or_insert(built)
            .clone();
        Ok(published)
    }
}

impl TypeHierarchy for DescriptorManager {
    fn parents_of(&self, bean_type: &str) -> Vec<String> {
        merge_level(&self.sources, bean_type)
            .ok()
            .flatten()
            .map(|(meta, _)| meta.parents)
            .unwrap_or_default()
    }
}
