//! Metadata contracts: the raw, source-agnostic shape of constraint
//! declarations.
//!
//! A [`MetadataSource`] exposes per-type [`BeanMetadata`]; several sources
//! can describe the same type and are merged by the builder pipeline in
//! [`crate::metadata::builder`]. The crate ships one source, the
//! programmatic [`ConstraintMapping`](crate::ConstraintMapping), but the
//! contract is open: file-backed or generated sources plug in the same way.

pub(crate) mod builder;
pub mod mapping;

use std::fmt::{self, Display};

use indexmap::IndexMap;

use crate::registry::AttributeMap;
use crate::value::{ContainerKind, ValueType};

/// How a source's declarations interact with the primary source's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationBehavior {
    /// Combine with the primary declarations.
    Merge,
    /// Replace the primary declarations for types this source describes.
    Override,
    /// No opinion; treated as merge.
    Abstain,
}

impl Default for AnnotationBehavior {
    fn default() -> Self {
        AnnotationBehavior::Abstain
    }
}

/// Identifies a container-element position: the container shape plus the
/// index of the extracted type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerElementKey {
    pub container: ContainerKind,
    pub type_arg: usize,
}

impl ContainerElementKey {
    /// Elements of a list.
    pub fn list_element() -> Self {
        Self {
            container: ContainerKind::List,
            type_arg: 0,
        }
    }

    /// Keys of a map.
    pub fn map_key() -> Self {
        Self {
            container: ContainerKind::Map,
            type_arg: 0,
        }
    }

    /// Values of a map.
    pub fn map_value() -> Self {
        Self {
            container: ContainerKind::Map,
            type_arg: 1,
        }
    }

    /// The value inside an optional.
    pub fn optional_value() -> Self {
        Self {
            container: ContainerKind::Optional,
            type_arg: 0,
        }
    }

    /// The node name this position contributes to paths, if any. Optionals
    /// are transparent and contribute a bare node.
    pub fn node_name(&self) -> Option<&'static str> {
        match (self.container, self.type_arg) {
            (ContainerKind::List, 0) => Some("<list element>"),
            (ContainerKind::Map, 0) => Some("<map key>"),
            (ContainerKind::Map, 1) => Some("<map value>"),
            (ContainerKind::Optional, _) => None,
            _ => Some("<container element>"),
        }
    }
}

impl Display for ContainerElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.container, self.type_arg)
    }
}

/// Signature of a method or constructor: name plus declared parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    parameter_types: Vec<ValueType>,
}

impl Signature {
    /// Creates a signature.
    pub fn new(name: impl Into<String>, parameter_types: impl IntoIterator<Item = ValueType>) -> Self {
        Self {
            name: name.into(),
            parameter_types: parameter_types.into_iter().collect(),
        }
    }

    /// The executable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameter types.
    pub fn parameter_types(&self) -> &[ValueType] {
        &self.parameter_types
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, ty) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ty)?;
        }
        write!(f, ")")
    }
}

/// One constraint occurrence declared at some site.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDeclaration {
    pub kind: String,
    pub attributes: AttributeMap,
}

impl ConstraintDeclaration {
    /// Creates a declaration of the given kind with declared attributes.
    pub fn new(kind: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            kind: kind.into(),
            attributes,
        }
    }
}

/// Raw metadata of a constrainable element: a field, a parameter, a return
/// value or a container-element position.
#[derive(Debug, Clone)]
pub struct ElementMetadata {
    pub declared_type: ValueType,
    pub constraints: Vec<ConstraintDeclaration>,
    pub cascade: bool,
    pub group_conversions: Vec<(String, String)>,
    pub container_elements: IndexMap<ContainerElementKey, ElementMetadata>,
}

impl ElementMetadata {
    /// Creates empty metadata for an element of the given declared type.
    pub fn new(declared_type: ValueType) -> Self {
        Self {
            declared_type,
            constraints: Vec::new(),
            cascade: false,
            group_conversions: Vec::new(),
            container_elements: IndexMap::new(),
        }
    }

    /// True if nothing is declared on the element or inside it.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
            && !self.cascade
            && self.group_conversions.is_empty()
            && self.container_elements.values().all(ElementMetadata::is_empty)
    }
}

/// Raw metadata of one declared parameter.
#[derive(Debug, Clone)]
pub struct ParameterMetadata {
    pub name: String,
    pub element: ElementMetadata,
}

/// Raw metadata of a method or constructor.
#[derive(Debug, Clone)]
pub struct ExecutableMetadata {
    pub parameters: Vec<ParameterMetadata>,
    pub cross_parameter: Vec<ConstraintDeclaration>,
    pub return_value: Option<ElementMetadata>,
}

impl ExecutableMetadata {
    /// Creates metadata with unconstrained parameters of the given names and
    /// types.
    pub fn new(parameters: impl IntoIterator<Item = (String, ValueType)>) -> Self {
        Self {
            parameters: parameters
                .into_iter()
                .map(|(name, ty)| ParameterMetadata {
                    name,
                    element: ElementMetadata::new(ty),
                })
                .collect(),
            cross_parameter: Vec::new(),
            return_value: None,
        }
    }
}

/// Raw metadata of one type at one hierarchy level.
#[derive(Debug, Clone, Default)]
pub struct BeanMetadata {
    pub parents: Vec<String>,
    pub class_constraints: Vec<ConstraintDeclaration>,
    pub group_sequence: Option<Vec<String>>,
    pub fields: IndexMap<String, ElementMetadata>,
    pub methods: IndexMap<Signature, ExecutableMetadata>,
    pub constructors: IndexMap<Signature, ExecutableMetadata>,
}

/// A provider of raw constraint metadata.
///
/// Implementations must be pure per type: repeated queries for the same type
/// return equivalent metadata.
pub trait MetadataSource: Send + Sync {
    /// How this source's declarations combine with the primary source's.
    fn behavior(&self) -> AnnotationBehavior {
        AnnotationBehavior::Abstain
    }

    /// Metadata this source declares for exactly the given type (its own
    /// level only; parents are flattened by the builder pipeline).
    fn bean(&self, type_name: &str) -> Option<BeanMetadata>;

    /// Group sequence kinds this source declares.
    fn group_sequences(&self) -> IndexMap<String, Vec<String>> {
        IndexMap::new()
    }
}
