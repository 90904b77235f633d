//! # Verdict
//!
//! A declarative constraint-validation engine. Constraint metadata is
//! declared per type, merged from any number of sources, and evaluated by a
//! cascading graph traversal that accumulates every violation instead of
//! stopping at the first failure.
//!
//! ## Overview
//!
//! Data under validation lives in an [`ObjectGraph`]: an arena of bean
//! instances referencing each other by id, so cyclic object graphs are
//! first-class. A [`ConstraintMapping`] declares which constraints apply to
//! which elements; the [`ValidatorFactory`] merges all sources into
//! immutable per-type descriptors and hands out validators. Validation
//! returns stillwater's `Validation` with a non-empty, deterministically
//! ordered [`ConstraintViolations`] on failure.
//!
//! ## Example
//!
//! ```rust
//! use verdict::{attrs, ConstraintMapping, ObjectGraph, Value, ValueType, ValidatorFactory};
//!
//! # fn main() -> Result<(), verdict::EngineError> {
//! let factory = ValidatorFactory::builder()
//!     .mapping(ConstraintMapping::new().bean("User", |bean| {
//!         bean.field("name", ValueType::Str, |field| {
//!             field.constraint("NotBlank", attrs([]))
//!         })
//!     }))
//!     .build()?;
//!
//! let mut graph = ObjectGraph::new();
//! let user = graph.add_bean("User");
//! graph.set_field(user, "name", Value::from(""));
//!
//! let outcome = factory.validator().validate(&graph, user, &["Default"])?;
//! assert!(outcome.is_failure());
//! # Ok(())
//! # }
//! ```

pub mod composition;
pub mod config;
mod constraints;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod factory;
pub mod groups;
pub mod job;
pub mod metadata;
pub mod path;
pub mod registry;
pub mod resolve;
pub mod spi;
pub mod value;

pub use config::{EngineProperties, CONSTRAINTS_CACHE_SIZE};
pub use descriptor::{
    BeanDescriptor, CascadableData, ConstraintDescriptor, ConstraintTarget,
    ContainerElementDescriptor, DescriptorManager, ElementKind, ExecutableDescriptor,
    ExecutableKind, ParameterDescriptor, PropertyDescriptor, ReturnValueDescriptor, Scope,
    ValidateUnwrapped, PAYLOAD_SKIP, PAYLOAD_UNWRAP,
};
pub use error::{CollaboratorError, ConstraintViolation, ConstraintViolations, EngineError};
pub use extract::{ExtractedItem, Extraction, ExtractorRegistry, ValueExtractor};
pub use factory::{ValidationOutcome, Validator, ValidatorFactory, ValidatorFactoryBuilder};
pub use groups::{Group, Groups, GroupsComputer, Sequence, DEFAULT_GROUP};
pub use job::{
    ConstraintValidatorContext, ContainerElementNodeBuilder, LeafNodeBuilder, ValidationJob,
    ViolationBuilder,
};
pub use metadata::mapping::{BeanMapping, ConstraintMapping, ElementMapping, ExecutableMapping};
pub use metadata::{
    AnnotationBehavior, BeanMetadata, ConstraintDeclaration, ContainerElementKey,
    ElementMetadata, ExecutableMetadata, MetadataSource, ParameterMetadata, Signature,
};
pub use path::{PathNode, PropertyPath};
pub use registry::{
    attrs, AttributeMap, ComposingDeclaration, ConstraintDefinition, ConstraintRegistry,
    ConstraintValidator, OverrideDeclaration, RegistryError, ValidationTarget, ValidatorInfo,
};
pub use resolve::{ResolutionError, TypeHierarchy};
pub use spi::{
    ClockProvider, DeclaredParameterNames, DefaultMessageInterpolator, MessageContext,
    MessageInterpolator, ParameterNameProvider, SystemClock, TraversableResolver, TraverseAll,
};
pub use value::{BeanId, BeanInstance, ContainerKind, ObjectGraph, Value, ValueType};
