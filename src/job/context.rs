//! The context handed to constraint validators and its violation builder.
//!
//! A validator can disable the default violation and queue custom ones
//! through a fluent builder. The builder is a small state machine over the
//! partial path being assembled; each state is a distinct type so only the
//! operations valid in that state exist.

use crate::descriptor::ConstraintDescriptor;
use crate::error::EngineError;
use crate::path::{PathNode, PropertyPath};
use crate::spi::ClockProvider;
use crate::value::{ContainerKind, ObjectGraph};

/// A violation queued by a validator, before interpolation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingViolation {
    pub template: String,
    pub path: PropertyPath,
}

/// Records the violations produced while evaluating one constraint
/// occurrence against one value.
pub struct ConstraintValidatorContext<'a> {
    descriptor: &'a ConstraintDescriptor,
    base_path: &'a PropertyPath,
    graph: &'a ObjectGraph,
    clock: &'a dyn ClockProvider,
    default_disabled: bool,
    custom: Vec<PendingViolation>,
}

impl<'a> ConstraintValidatorContext<'a> {
    pub(crate) fn new(
        descriptor: &'a ConstraintDescriptor,
        base_path: &'a PropertyPath,
        graph: &'a ObjectGraph,
        clock: &'a dyn ClockProvider,
    ) -> Self {
        Self {
            descriptor,
            base_path,
            graph,
            clock,
            default_disabled: false,
            custom: Vec::new(),
        }
    }

    /// The message template declared by the constraint being evaluated.
    pub fn default_message_template(&self) -> &str {
        self.descriptor.message_template()
    }

    /// The object graph under validation.
    pub fn graph(&self) -> &ObjectGraph {
        self.graph
    }

    /// The configured clock.
    pub fn clock(&self) -> &dyn ClockProvider {
        self.clock
    }

    /// Suppresses the default violation.
    ///
    /// After disabling, at least one custom violation must be added or
    /// collecting the violations fails.
    pub fn disable_default_violation(&mut self) {
        self.default_disabled = true;
    }

    /// Starts building a custom violation with the given template.
    pub fn build_violation_with_template(
        &mut self,
        template: impl Into<String>,
    ) -> ViolationBuilder<'_, 'a> {
        let path = self.base_path.clone();
        ViolationBuilder {
            ctx: self,
            template: template.into(),
            path,
        }
    }

    /// Collects the violations an invalid evaluation must report.
    pub(crate) fn into_required(self) -> Result<Vec<PendingViolation>, EngineError> {
        let mut violations = Vec::new();
        if !self.default_disabled {
            violations.push(PendingViolation {
                template: self.descriptor.message_template().to_string(),
                path: self.base_path.clone(),
            });
        } else if self.custom.is_empty() {
            return Err(EngineError::collaborator(
                self.base_path.to_string(),
                format!(
                    "validator of constraint {} disabled the default violation without adding one",
                    self.descriptor.kind()
                )
                .into(),
            ));
        }
        violations.extend(self.custom);
        Ok(violations)
    }
}

/// Builds a custom violation by appending path nodes.
pub struct ViolationBuilder<'c, 'a> {
    ctx: &'c mut ConstraintValidatorContext<'a>,
    template: String,
    path: PropertyPath,
}

impl<'c, 'a> ViolationBuilder<'c, 'a> {
    /// Appends a property node.
    pub fn add_property_node(mut self, name: impl Into<String>) -> Self {
        self.path.append(PathNode::property(name));
        self
    }

    /// Appends a bean node; only the terminal operation remains.
    pub fn add_bean_node(mut self) -> LeafNodeBuilder<'c, 'a> {
        self.path.append(PathNode::Bean);
        LeafNodeBuilder {
            ctx: self.ctx,
            template: self.template,
            path: self.path,
        }
    }

    /// Appends a container-element node, optionally positioned with
    /// [`ContainerElementNodeBuilder::at_index`] or
    /// [`ContainerElementNodeBuilder::at_key`].
    pub fn add_container_element_node(
        self,
        name: impl Into<String>,
        container: ContainerKind,
        type_arg: usize,
    ) -> ContainerElementNodeBuilder<'c, 'a> {
        let name = name.into();
        ContainerElementNodeBuilder {
            ctx: self.ctx,
            template: self.template,
            path: self.path,
            node: PathNode::container_element(Some(&name), container, type_arg),
            position: None,
        }
    }

    /// Queues the violation at the assembled path.
    pub fn add_constraint_violation(self) {
        self.ctx.custom.push(PendingViolation {
            template: self.template,
            path: self.path,
        });
    }
}

/// Builder state after a container-element node was appended.
pub struct ContainerElementNodeBuilder<'c, 'a> {
    ctx: &'c mut ConstraintValidatorContext<'a>,
    template: String,
    path: PropertyPath,
    node: PathNode,
    position: Option<PathNode>,
}

impl<'c, 'a> ContainerElementNodeBuilder<'c, 'a> {
    /// Positions the container element at an index.
    pub fn at_index(mut self, index: usize) -> Self {
        self.position = Some(PathNode::index(index));
        self
    }

    /// Positions the container element under a key.
    pub fn at_key(mut self, key: impl Into<String>) -> Self {
        self.position = Some(PathNode::key(key));
        self
    }

    fn seal(mut self) -> ViolationBuilder<'c, 'a> {
        if let Some(position) = self.position.take() {
            self.path.append(position);
        }
        self.path.append(self.node);
        ViolationBuilder {
            ctx: self.ctx,
            template: self.template,
            path: self.path,
        }
    }

    /// Continues the path with a property node.
    pub fn add_property_node(self, name: impl Into<String>) -> ViolationBuilder<'c, 'a> {
        self.seal().add_property_node(name)
    }

    /// Queues the violation at the assembled path.
    pub fn add_constraint_violation(self) {
        self.seal().add_constraint_violation();
    }
}

/// Builder state after a bean node; the path is complete.
pub struct LeafNodeBuilder<'c, 'a> {
    ctx: &'c mut ConstraintValidatorContext<'a>,
    template: String,
    path: PropertyPath,
}

impl LeafNodeBuilder<'_, '_> {
    /// Queues the violation at the assembled path.
    pub fn add_constraint_violation(self) {
        self.ctx.custom.push(PendingViolation {
            template: self.template,
            path: self.path,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::CompositionCache;
    use crate::descriptor::{ElementKind, Scope};
    use crate::metadata::ConstraintDeclaration;
    use crate::registry::{attrs, ConstraintDefinition, ConstraintRegistry, ValidationTarget};
    use crate::spi::SystemClock;
    use crate::value::ValueType;
    use std::sync::Arc;

    fn descriptor() -> Arc<ConstraintDescriptor> {
        let registry = ConstraintRegistry::new();
        registry
            .register_definition(ConstraintDefinition::new("Probe"))
            .unwrap();
        let compositions = CompositionCache::new(4);
        let ctx = crate::descriptor::DescriptorContext {
            registry: &registry,
            compositions: &compositions,
        };
        ConstraintDescriptor::build(
            &ConstraintDeclaration::new("Probe", attrs([])),
            Scope::LocalElement,
            ElementKind::Field,
            &ValueType::Str,
            ValidationTarget::AnnotatedElement,
            &ctx,
        )
        .unwrap()
    }

    fn pending(
        descriptor: &ConstraintDescriptor,
        base: &PropertyPath,
        build: impl FnOnce(&mut ConstraintValidatorContext<'_>),
    ) -> Result<Vec<PendingViolation>, EngineError> {
        let graph = ObjectGraph::new();
        let clock = SystemClock;
        let mut ctx = ConstraintValidatorContext::new(descriptor, base, &graph, &clock);
        build(&mut ctx);
        ctx.into_required()
    }

    #[test]
    fn test_default_violation_at_base_path() {
        let descriptor = descriptor();
        let base = PropertyPath::root().child(PathNode::property("name"));
        let violations = pending(&descriptor, &base, |_| {}).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].template, "{Probe.message}");
        assert_eq!(violations[0].path.to_string(), "name");
    }

    #[test]
    fn test_disable_without_custom_fails() {
        let descriptor = descriptor();
        let base = PropertyPath::root();
        let err = pending(&descriptor, &base, |ctx| ctx.disable_default_violation()).unwrap_err();
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_custom_violation_with_property_nodes() {
        let descriptor = descriptor();
        let base = PropertyPath::root().child(PathNode::property("order"));
        let violations = pending(&descriptor, &base, |ctx| {
            ctx.disable_default_violation();
            ctx.build_violation_with_template("{custom}")
                .add_property_node("lines")
                .add_property_node("total")
                .add_constraint_violation();
        })
        .unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path.to_string(), "order.lines.total");
    }

    #[test]
    fn test_container_element_node_at_key() {
        let descriptor = descriptor();
        let base = PropertyPath::root().child(PathNode::property("scores"));
        let violations = pending(&descriptor, &base, |ctx| {
            ctx.disable_default_violation();
            ctx.build_violation_with_template("{custom}")
                .add_container_element_node("<map value>", ContainerKind::Map, 1)
                .at_key("alice")
                .add_constraint_violation();
        })
        .unwrap();
        assert_eq!(violations[0].path.to_string(), "scores[alice].<map value>");
    }

    #[test]
    fn test_bean_node_is_terminal() {
        let descriptor = descriptor();
        let base = PropertyPath::root().child(PathNode::property("owner"));
        let violations = pending(&descriptor, &base, |ctx| {
            ctx.build_violation_with_template("{custom}")
                .add_bean_node()
                .add_constraint_violation();
        })
        .unwrap();
        // Default plus the custom one.
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[1].path.to_string(), "owner");
        assert_eq!(
            violations[1].path.leaf(),
            Some(&PathNode::Bean)
        );
    }
}
