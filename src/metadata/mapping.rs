//! Programmatic constraint mapping.
//!
//! [`ConstraintMapping`] is the crate's primary [`MetadataSource`]: a fluent,
//! closure-scoped way to declare per-type constraints, cascades, group
//! conversions, container elements and executables.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use verdict::{attrs, ConstraintMapping, ValueType};
//!
//! let mapping = ConstraintMapping::new()
//!     .bean("User", |bean| {
//!         bean.field("name", ValueType::Str, |field| {
//!             field.constraint("NotBlank", attrs([]))
//!         })
//!         .field("age", ValueType::Int, |field| {
//!             field.constraint("Min", attrs([("value", json!(0))]))
//!         })
//!     });
//! # let _ = mapping;
//! ```

use indexmap::IndexMap;

use crate::metadata::{
    AnnotationBehavior, BeanMetadata, ConstraintDeclaration, ContainerElementKey,
    ElementMetadata, ExecutableMetadata, MetadataSource, Signature,
};
use crate::registry::AttributeMap;
use crate::value::ValueType;

/// A programmatic metadata source.
#[derive(Debug, Clone, Default)]
pub struct ConstraintMapping {
    behavior: AnnotationBehavior,
    beans: IndexMap<String, BeanMetadata>,
    sequences: IndexMap<String, Vec<String>>,
}

impl ConstraintMapping {
    /// Creates an empty mapping with `Abstain` behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how this mapping combines with the primary source when used as
    /// an overlay.
    pub fn with_behavior(mut self, behavior: AnnotationBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Declares a group sequence kind.
    pub fn group_sequence<I>(mut self, name: impl Into<String>, components: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.sequences.insert(
            name.into(),
            components.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Declares (or replaces) the metadata of a type.
    pub fn bean(
        mut self,
        type_name: impl Into<String>,
        build: impl FnOnce(BeanMapping) -> BeanMapping,
    ) -> Self {
        let type_name = type_name.into();
        let mapping = build(BeanMapping::new(type_name.clone()));
        self.beans.insert(type_name, mapping.meta);
        self
    }
}

impl MetadataSource for ConstraintMapping {
    fn behavior(&self) -> AnnotationBehavior {
        self.behavior
    }

    fn bean(&self, type_name: &str) -> Option<BeanMetadata> {
        self.beans.get(type_name).cloned()
    }

    fn group_sequences(&self) -> IndexMap<String, Vec<String>> {
        self.sequences.clone()
    }
}

/// Builds the metadata of one type.
#[derive(Debug)]
pub struct BeanMapping {
    type_name: String,
    meta: BeanMetadata,
}

impl BeanMapping {
    fn new(type_name: String) -> Self {
        Self {
            type_name,
            meta: BeanMetadata::default(),
        }
    }

    /// Declares a parent type whose constraints this type inherits.
    pub fn parent(mut self, type_name: impl Into<String>) -> Self {
        self.meta.parents.push(type_name.into());
        self
    }

    /// Redefines the default group sequence of this type.
    pub fn group_sequence<I>(mut self, groups: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.meta.group_sequence = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Declares a class-level constraint.
    pub fn constraint(mut self, kind: impl Into<String>, attributes: AttributeMap) -> Self {
        self.meta
            .class_constraints
            .push(ConstraintDeclaration::new(kind, attributes));
        self
    }

    /// Declares a field.
    pub fn field(
        mut self,
        name: impl Into<String>,
        declared_type: ValueType,
        build: impl FnOnce(ElementMapping) -> ElementMapping,
    ) -> Self {
        let mapping = build(ElementMapping::new(declared_type));
        self.meta.fields.insert(name.into(), mapping.meta);
        self
    }

    /// Declares a method.
    pub fn method<'a, P>(
        mut self,
        name: impl Into<String>,
        parameters: P,
        build: impl FnOnce(ExecutableMapping) -> ExecutableMapping,
    ) -> Self
    where
        P: IntoIterator<Item = (&'a str, ValueType)>,
    {
        let parameters: Vec<(String, ValueType)> = parameters
            .into_iter()
            .map(|(n, t)| (n.to_string(), t))
            .collect();
        let signature = Signature::new(name, parameters.iter().map(|(_, t)| t.clone()));
        let mapping = build(ExecutableMapping::new(parameters));
        self.meta.methods.insert(signature, mapping.meta);
        self
    }

    /// Declares a constructor. The signature is named after the type.
    pub fn constructor<'a, P>(
        mut self,
        parameters: P,
        build: impl FnOnce(ExecutableMapping) -> ExecutableMapping,
    ) -> Self
    where
        P: IntoIterator<Item = (&'a str, ValueType)>,
    {
        let parameters: Vec<(String, ValueType)> = parameters
            .into_iter()
            .map(|(n, t)| (n.to_string(), t))
            .collect();
        let signature = Signature::new(
            self.type_name.clone(),
            parameters.iter().map(|(_, t)| t.clone()),
        );
        let mapping = build(ExecutableMapping::new(parameters));
        self.meta.constructors.insert(signature, mapping.meta);
        self
    }
}

/// Builds the metadata of a constrainable element.
#[derive(Debug)]
pub struct ElementMapping {
    meta: ElementMetadata,
}

impl ElementMapping {
    fn new(declared_type: ValueType) -> Self {
        Self {
            meta: ElementMetadata::new(declared_type),
        }
    }

    /// Declares a constraint on the element.
    pub fn constraint(mut self, kind: impl Into<String>, attributes: AttributeMap) -> Self {
        self.meta
            .constraints
            .push(ConstraintDeclaration::new(kind, attributes));
        self
    }

    /// Marks the element for cascaded validation.
    pub fn cascade(mut self) -> Self {
        self.meta.cascade = true;
        self
    }

    /// Declares a group conversion applied when cascading.
    pub fn convert_group(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.meta
            .group_conversions
            .push((from.into(), to.into()));
        self
    }

    /// Declares constraints on a container-element position of the element.
    pub fn container_element(
        mut self,
        key: ContainerElementKey,
        element_type: ValueType,
        build: impl FnOnce(ElementMapping) -> ElementMapping,
    ) -> Self {
        let mapping = build(ElementMapping::new(element_type));
        self.meta.container_elements.insert(key, mapping.meta);
        self
    }
}

/// Builds the metadata of a method or constructor.
#[derive(Debug)]
pub struct ExecutableMapping {
    meta: ExecutableMetadata,
}

impl ExecutableMapping {
    fn new(parameters: Vec<(String, ValueType)>) -> Self {
        Self {
            meta: ExecutableMetadata::new(parameters),
        }
    }

    /// Customizes the parameter at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range for the declared parameters.
    pub fn parameter(
        mut self,
        index: usize,
        build: impl FnOnce(ElementMapping) -> ElementMapping,
    ) -> Self {
        assert!(
            index < self.meta.parameters.len(),
            "parameter index {} out of range",
            index
        );
        let declared = self.meta.parameters[index].element.declared_type.clone();
        let mapping = build(ElementMapping::new(declared));
        self.meta.parameters[index].element = mapping.meta;
        self
    }

    /// Declares a cross-parameter constraint.
    pub fn cross_parameter(mut self, kind: impl Into<String>, attributes: AttributeMap) -> Self {
        self.meta
            .cross_parameter
            .push(ConstraintDeclaration::new(kind, attributes));
        self
    }

    /// Declares the return value.
    pub fn returns(
        mut self,
        declared_type: ValueType,
        build: impl FnOnce(ElementMapping) -> ElementMapping,
    ) -> Self {
        let mapping = build(ElementMapping::new(declared_type));
        self.meta.return_value = Some(mapping.meta);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::attrs;
    use serde_json::json;

    #[test]
    fn test_field_declaration() {
        let mapping = ConstraintMapping::new().bean("User", |bean| {
            bean.field("name", ValueType::Str, |field| {
                field.constraint("NotBlank", attrs([]))
            })
        });

        let meta = MetadataSource::bean(&mapping, "User").unwrap();
        let name = meta.fields.get("name").unwrap();
        assert_eq!(name.declared_type, ValueType::Str);
        assert_eq!(name.constraints.len(), 1);
        assert_eq!(name.constraints[0].kind, "NotBlank");
    }

    #[test]
    fn test_cascade_and_conversion() {
        let mapping = ConstraintMapping::new().bean("Order", |bean| {
            bean.field("customer", ValueType::bean("Customer"), |field| {
                field.cascade().convert_group("Default", "Basic")
            })
        });

        let meta = MetadataSource::bean(&mapping, "Order").unwrap();
        let customer = meta.fields.get("customer").unwrap();
        assert!(customer.cascade);
        assert_eq!(
            customer.group_conversions,
            vec![("Default".to_string(), "Basic".to_string())]
        );
    }

    #[test]
    fn test_container_element_declaration() {
        let mapping = ConstraintMapping::new().bean("Order", |bean| {
            bean.field("tags", ValueType::Map, |field| {
                field.container_element(ContainerElementKey::map_value(), ValueType::Str, |e| {
                    e.constraint("Size", attrs([("min", json!(1))]))
                })
            })
        });

        let meta = MetadataSource::bean(&mapping, "Order").unwrap();
        let tags = meta.fields.get("tags").unwrap();
        let value = tags
            .container_elements
            .get(&ContainerElementKey::map_value())
            .unwrap();
        assert_eq!(value.constraints[0].kind, "Size");
    }

    #[test]
    fn test_method_declaration() {
        let mapping = ConstraintMapping::new().bean("Account", |bean| {
            bean.method("withdraw", [("amount", ValueType::Int)], |method| {
                method
                    .parameter(0, |p| p.constraint("Min", attrs([("value", json!(1))])))
                    .returns(ValueType::Int, |r| r.constraint("Min", attrs([("value", json!(0))])))
            })
        });

        let meta = MetadataSource::bean(&mapping, "Account").unwrap();
        let signature = Signature::new("withdraw", [ValueType::Int]);
        let method = meta.methods.get(&signature).unwrap();
        assert_eq!(method.parameters[0].name, "amount");
        assert_eq!(method.parameters[0].element.constraints.len(), 1);
        assert!(method.return_value.is_some());
    }

    #[test]
    fn test_constructor_signature_named_after_type() {
        let mapping = ConstraintMapping::new().bean("Account", |bean| {
            bean.constructor([("owner", ValueType::Str)], |ctor| {
                ctor.parameter(0, |p| p.constraint("NotBlank", attrs([])))
            })
        });

        let meta = MetadataSource::bean(&mapping, "Account").unwrap();
        let signature = Signature::new("Account", [ValueType::Str]);
        assert!(meta.constructors.contains_key(&signature));
    }

    #[test]
    fn test_group_sequences_exposed() {
        let mapping = ConstraintMapping::new().group_sequence("Complete", ["Default", "Extended"]);
        let sequences = MetadataSource::group_sequences(&mapping);
        assert_eq!(
            sequences.get("Complete"),
            Some(&vec!["Default".to_string(), "Extended".to_string()])
        );
    }
}
