//! The validation job: a single-use, depth-first traversal of a value graph.
//!
//! A job owns a base frame (bean, property, value, parameters or return
//! value), an evaluation plan from the group computer and per-job state: the
//! identity-keyed set of visited beans and the ordered violation list.
//! Frames evaluate their local constraints for the current group and then
//! recurse into constrained sub-elements; sequences short-circuit on the
//! first group that contributed a violation.

mod context;

pub use context::{
    ConstraintValidatorContext, ContainerElementNodeBuilder, LeafNodeBuilder, ViolationBuilder,
};
pub(crate) use context::PendingViolation;

use std::collections::HashSet;
use std::sync::Arc;

use crate::descriptor::{
    BeanDescriptor, CascadableData, ConstraintDescriptor, ContainerElementDescriptor,
    DescriptorManager, ElementKind, ExecutableDescriptor, ParameterDescriptor,
    PropertyDescriptor, ReturnValueDescriptor, ValidateUnwrapped,
};
use crate::error::{ConstraintViolation, EngineError};
use crate::extract::{ExtractedItem, ExtractorRegistry};
use crate::groups::{Group, Groups};
use crate::metadata::ContainerElementKey;
use crate::path::{PathNode, PropertyPath};
use crate::registry::ConstraintRegistry;
use crate::spi::{
    ClockProvider, MessageContext, MessageInterpolator, ParameterNameProvider,
    TraversableResolver,
};
use crate::value::{BeanId, ContainerKind, ObjectGraph, Value};

/// Everything a job reads but never mutates.
pub(crate) struct JobEnv<'g> {
    pub graph: &'g ObjectGraph,
    pub registry: &'g ConstraintRegistry,
    pub manager: &'g DescriptorManager,
    pub extractors: &'g ExtractorRegistry,
    pub resolver: &'g dyn TraversableResolver,
    pub interpolator: &'g dyn MessageInterpolator,
    pub parameter_names: &'g dyn ParameterNameProvider,
    pub clock: &'g dyn ClockProvider,
    pub root_type: String,
}

/// What the job's base frame is rooted in.
pub(crate) enum BaseTarget {
    Bean {
        value: Value,
    },
    Property {
        bean: BeanId,
        property: String,
    },
    PropertyValue {
        type_name: String,
        property: String,
        value: Value,
    },
    Parameters {
        executable: Arc<ExecutableDescriptor>,
        root_node: PathNode,
        object: Option<BeanId>,
        values: Value,
    },
    ReturnValue {
        executable: Arc<ExecutableDescriptor>,
        root_node: PathNode,
        object: Option<BeanId>,
        value: Value,
    },
}

/// Mutable per-job state, single-threaded.
struct JobState {
    seen: HashSet<(BeanId, Group)>,
    results: Vec<ConstraintViolation>,
}

/// The traversal context of one frame: path, value and the ancestor chain
/// used for cycle detection.
struct GraphContext<'v> {
    path: PropertyPath,
    value: &'v Value,
    parent: Option<&'v GraphContext<'v>>,
}

impl<'v> GraphContext<'v> {
    fn root(path: PropertyPath, value: &'v Value) -> Self {
        Self {
            path,
            value,
            parent: None,
        }
    }

    /// Creates a child context, or absence when the value is a bean already
    /// present on the ancestor chain.
    fn child<'s>(
        &'s self,
        nodes: impl IntoIterator<Item = PathNode>,
        value: &'s Value,
    ) -> Option<GraphContext<'s>> {
        if let Some(id) = value.as_bean() {
            if self.stack_contains(id) {
                return None;
            }
        }
        let mut path = self.path.clone();
        for node in nodes {
            path.append(node);
        }
        Some(GraphContext {
            path,
            value,
            parent: Some(self),
        })
    }

    /// A child sharing this context's path, used for unwrapped values.
    fn unwrapped<'s>(&'s self, value: &'s Value) -> GraphContext<'s> {
        GraphContext {
            path: self.path.clone(),
            value,
            parent: Some(self),
        }
    }

    fn stack_contains(&self, id: BeanId) -> bool {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if ctx.value.as_bean() == Some(id) {
                return true;
            }
            current = ctx.parent;
        }
        false
    }
}

/// The cascadable element a sprout frame evaluates.
enum Sprout<'d> {
    Property(&'d PropertyDescriptor),
    Container(&'d ContainerElementDescriptor),
    Parameter(&'d ParameterDescriptor),
    Return(&'d ReturnValueDescriptor),
}

impl<'d> Sprout<'d> {
    fn cascadable(&self) -> &'d CascadableData {
        match self {
            Sprout::Property(d) => d.cascadable(),
            Sprout::Container(d) => d.cascadable(),
            Sprout::Parameter(d) => d.cascadable(),
            Sprout::Return(d) => d.cascadable(),
        }
    }

    fn element_kind(&self) -> ElementKind {
        match self {
            Sprout::Property(_) => ElementKind::Field,
            Sprout::Container(_) => ElementKind::ContainerElement,
            Sprout::Parameter(_) => ElementKind::Parameter,
            Sprout::Return(_) => ElementKind::ReturnValue,
        }
    }
}

/// A single-use validation request.
///
/// Running consumes the job, so its result set is realised exactly once.
pub struct ValidationJob<'g> {
    env: JobEnv<'g>,
    groups: Groups,
    target: BaseTarget,
    cascading: bool,
}

impl<'g> ValidationJob<'g> {
    pub(crate) fn new(
        env: JobEnv<'g>,
        groups: Groups,
        target: BaseTarget,
        cascading: bool,
    ) -> Self {
        Self {
            env,
            groups,
            target,
            cascading,
        }
    }

    /// Runs the job, producing the ordered violation list.
    pub fn run(self) -> Result<Vec<ConstraintViolation>, EngineError> {
        let mut state = JobState {
            seen: HashSet::new(),
            results: Vec::new(),
        };

        let simple: Vec<Group> = self.groups.groups().cloned().collect();
        for group in &simple {
            self.visit_base(&mut state, group)?;
        }
        for sequence in self.groups.sequences() {
            for group in &sequence.groups {
                let before = state.results.len();
                self.visit_base(&mut state, group)?;
                if state.results.len() > before {
                    break;
                }
            }
        }
        tracing::trace!(
            violations = state.results.len(),
            root = %self.env.root_type,
            "validation job finished"
        );
        Ok(state.results)
    }

    fn visit_base(&self, state: &mut JobState, group: &Group) -> Result<(), EngineError> {
        match &self.target {
            BaseTarget::Bean { value } => {
                let ctx = GraphContext::root(PropertyPath::root(), value);
                self.visit_bean(state, &ctx, group)
            }
            BaseTarget::Property { bean, property } => {
                let descriptor = self
                    .env
                    .manager
                    .descriptor(self.env.graph.bean(*bean).type_name())?;
                let Some(descriptor) = descriptor.property(property) else {
                    return Err(EngineError::ConstraintDefinition(format!(
                        "type {} declares no constrained property {}",
                        self.env.root_type, property
                    )));
                };
                let bean_value = Value::Bean(*bean);
                let ctx = GraphContext::root(PropertyPath::root(), &bean_value);
                self.visit_property(state, descriptor, *bean, &ctx, group)
            }
            BaseTarget::PropertyValue {
                type_name,
                property,
                value,
            } => {
                let descriptor = self.env.manager.descriptor(type_name)?;
                let Some(descriptor) = descriptor.property(property) else {
                    return Err(EngineError::ConstraintDefinition(format!(
                        "type {} declares no constrained property {}",
                        type_name, property
                    )));
                };
                let path = PropertyPath::root().child(PathNode::property(property));
                let ctx = GraphContext::root(path, value);
                self.visit_sprout(state, Sprout::Property(descriptor), &ctx, group, None)
            }
            BaseTarget::Parameters {
                executable,
                root_node,
                object,
                values,
            } => self.visit_parameters(state, executable, root_node, *object, values, group),
            BaseTarget::ReturnValue {
                executable,
                root_node,
                object,
                value,
            } => {
                let Some(descriptor) = executable.return_value() else {
                    return Ok(());
                };
                let path = PropertyPath::of([root_node.clone(), PathNode::ReturnValue]);
                let ctx = GraphContext::root(path, value);
                self.visit_sprout(state, Sprout::Return(descriptor), &ctx, group, *object)
            }
        }
    }

    /// Bean frame: type-level constraints, then constrained properties.
    fn visit_bean(
        &self,
        state: &mut JobState,
        ctx: &GraphContext<'_>,
        group: &Group,
    ) -> Result<(), EngineError> {
        let Some(id) = ctx.value.as_bean() else {
            return Ok(());
        };
        if !state.seen.insert((id, group.clone())) {
            return Ok(());
        }

        let descriptor = self
            .env
            .manager
            .descriptor(self.env.graph.bean(id).type_name())?;

        // Default redirection: a redefined default group sequence replaces
        // an incoming Default for this bean's frame, with short-circuit.
        let redirected: Option<&[Group]> = if group.is_default() {
            descriptor.group_sequence()
        } else {
            None
        };
        match redirected {
            None => self.visit_bean_for_group(state, &descriptor, id, ctx, group),
            Some(sequence) => {
                for g in sequence {
                    let before = state.results.len();
                    self.visit_bean_for_group(state, &descriptor, id, ctx, g)?;
                    if state.results.len() > before {
                        break;
                    }
                }
                Ok(())
            }
        }
    }

    fn visit_bean_for_group(
        &self,
        state: &mut JobState,
        descriptor: &BeanDescriptor,
        id: BeanId,
        ctx: &GraphContext<'_>,
        group: &Group,
    ) -> Result<(), EngineError> {
        for constraint in descriptor.constraints() {
            if constraint.in_group(group) {
                self.validate_constraint(state, constraint, ctx, Some(id))?;
            }
        }
        for property in descriptor.properties() {
            self.visit_property(state, property, id, ctx, group)?;
        }
        Ok(())
    }

    /// Evaluates one property of a bean behind the reachability gate.
    fn visit_property(
        &self,
        state: &mut JobState,
        property: &PropertyDescriptor,
        bean: BeanId,
        bean_ctx: &GraphContext<'_>,
        group: &Group,
    ) -> Result<(), EngineError> {
        let node = PathNode::property(property.name());
        let reachable = self
            .env
            .resolver
            .is_reachable(
                bean_ctx.value,
                &node,
                &self.env.root_type,
                &bean_ctx.path,
                property.element_kind(),
            )
            .map_err(|e| {
                EngineError::collaborator(
                    bean_ctx.path.child(node.clone()).to_string(),
                    e,
                )
            })?;
        if !reachable {
            return Ok(());
        }

        let value = self.env.graph.bean(bean).field(property.name());
        let Some(child) = bean_ctx.child([node], value) else {
            return Ok(());
        };
        self.visit_sprout(state, Sprout::Property(property), &child, group, Some(bean))
    }

    /// Parameters frame: cross-parameter constraints, then one sprout frame
    /// per parameter.
    fn visit_parameters(
        &self,
        state: &mut JobState,
        executable: &ExecutableDescriptor,
        root_node: &PathNode,
        object: Option<BeanId>,
        values: &Value,
        group: &Group,
    ) -> Result<(), EngineError> {
        let cross_path = PropertyPath::of([root_node.clone(), PathNode::CrossParameter]);
        let cross_ctx = GraphContext::root(cross_path, values);
        for constraint in executable.cross_parameter() {
            if constraint.in_group(group) {
                self.validate_constraint(state, constraint, &cross_ctx, object)?;
            }
        }

        let names = self.env.parameter_names.parameter_names(executable);
        let Value::List(parameter_values) = values else {
            return Ok(());
        };
        for parameter in executable.parameters() {
            let index = parameter.index();
            let name = names
                .get(index)
                .cloned()
                .unwrap_or_else(|| parameter.name().to_string());
            let value = parameter_values.get(index).unwrap_or(&Value::NULL);
            let path = PropertyPath::of([
                root_node.clone(),
                PathNode::parameter(name, index),
            ]);
            let ctx = GraphContext::root(path, value);
            self.visit_sprout(state, Sprout::Parameter(parameter), &ctx, group, object)?;
        }
        Ok(())
    }

    /// Sprout frame: own constraints, container elements, then the cascade.
    fn visit_sprout(
        &self,
        state: &mut JobState,
        sprout: Sprout<'_>,
        ctx: &GraphContext<'_>,
        group: &Group,
        leaf_bean: Option<BeanId>,
    ) -> Result<(), EngineError> {
        let data = sprout.cascadable();

        for constraint in data.constraints() {
            if !constraint.in_group(group) {
                continue;
            }
            match constraint.unwrapping() {
                ValidateUnwrapped::Default | ValidateUnwrapped::Skip => {
                    self.validate_constraint(state, constraint, ctx, leaf_bean)?;
                }
                ValidateUnwrapped::Unwrap => {
                    self.validate_unwrapped(state, constraint, ctx, leaf_bean)?;
                }
            }
        }

        for container in data.container_elements() {
            let extractor = self.env.extractors.find(container.key()).ok_or_else(|| {
                EngineError::ConstraintDefinition(format!(
                    "no value extractor registered for {}",
                    container.key()
                ))
            })?;
            let extraction = extractor
                .extract(ctx.value)
                .map_err(|e| EngineError::collaborator(ctx.path.to_string(), e))?;
            for (item, value) in extraction {
                let mut nodes = Vec::new();
                match item {
                    ExtractedItem::Indexed(i) => nodes.push(PathNode::index(i)),
                    ExtractedItem::Keyed(k) => nodes.push(PathNode::key(k)),
                    ExtractedItem::Single => {}
                }
                nodes.push(PathNode::container_element(
                    container.node_name(),
                    container.key().container,
                    container.key().type_arg,
                ));
                let holder = value;
                let Some(child) = ctx.child(nodes, holder.as_ref()) else {
                    continue;
                };
                self.visit_sprout(state, Sprout::Container(container), &child, group, leaf_bean)?;
            }
        }

        if data.is_cascaded() && self.cascading {
            if matches!(sprout, Sprout::Property(_)) {
                let mut path_to_object = ctx.path.clone();
                let leaf = path_to_object.remove_leaf().unwrap_or(PathNode::Bean);
                let cascadable = self
                    .env
                    .resolver
                    .is_cascadable(
                        ctx.value,
                        &leaf,
                        &self.env.root_type,
                        &path_to_object,
                        sprout.element_kind(),
                    )
                    .map_err(|e| EngineError::collaborator(ctx.path.to_string(), e))?;
                if !cascadable {
                    return Ok(());
                }
            }
            let converted = data.convert_group(group);
            self.visit_bean(state, ctx, &converted)?;
        }
        Ok(())
    }

    /// Applies an `Unwrap`-marked constraint to the extracted values of the
    /// value's container.
    fn validate_unwrapped(
        &self,
        state: &mut JobState,
        constraint: &Arc<ConstraintDescriptor>,
        ctx: &GraphContext<'_>,
        leaf_bean: Option<BeanId>,
    ) -> Result<(), EngineError> {
        let key = match ctx.value.container_kind() {
            Some(ContainerKind::List) => ContainerElementKey::list_element(),
            Some(ContainerKind::Optional) => ContainerElementKey::optional_value(),
            Some(ContainerKind::Map) | None => {
                return Err(EngineError::ConstraintDefinition(format!(
                    "constraint {} requests unwrapping but {} is not an unwrappable container",
                    constraint.kind(),
                    ctx.value.describe()
                )))
            }
        };
        let extractor = self.env.extractors.find(key).ok_or_else(|| {
            EngineError::ConstraintDefinition(format!(
                "no value extractor registered for {}",
                key
            ))
        })?;
        let extraction = extractor
            .extract(ctx.value)
            .map_err(|e| EngineError::collaborator(ctx.path.to_string(), e))?;
        for (_, value) in extraction {
            let holder = value;
            let unwrapped = ctx.unwrapped(holder.as_ref());
            self.validate_constraint(state, constraint, &unwrapped, leaf_bean)?;
        }
        Ok(())
    }

    /// Evaluates one constraint occurrence against the context value,
    /// including composing constraints and report-as-single-violation
    /// semantics. Returns whether the occurrence held.
    fn validate_constraint(
        &self,
        state: &mut JobState,
        constraint: &Arc<ConstraintDescriptor>,
        ctx: &GraphContext<'_>,
        leaf_bean: Option<BeanId>,
    ) -> Result<bool, EngineError> {
        let resolved = constraint.validator(self.env.registry, self.env.manager)?;

        let mut own_valid = true;
        if let Some(info) = resolved {
            let mut validator = info.instantiate();
            validator.initialize(constraint.attributes()).map_err(|e| {
                EngineError::ConstraintDefinition(format!(
                    "validator {} of constraint {} failed to initialize: {}",
                    info.name(),
                    constraint.kind(),
                    e
                ))
            })?;
            let mut validator_ctx = ConstraintValidatorContext::new(
                constraint,
                &ctx.path,
                self.env.graph,
                self.env.clock,
            );
            own_valid = validator.is_valid(ctx.value, &mut validator_ctx);
            if !own_valid {
                for pending in validator_ctx.into_required()? {
                    let violation = self.materialize(constraint, pending, ctx, leaf_bean);
                    state.results.push(violation);
                }
            }
        }

        if constraint.is_report_as_single() {
            let mut failed = !own_valid;
            if !failed {
                let mark = state.results.len();
                for composing in constraint.composing() {
                    let held = self.validate_constraint(state, composing, ctx, leaf_bean)?;
                    if !held || state.results.len() > mark {
                        // Composing violations are suppressed; the composed
                        // constraint reports its single default violation.
                        state.results.truncate(mark);
                        failed = true;
                        break;
                    }
                }
                if failed {
                    let pending = PendingViolation {
                        template: constraint.message_template().to_string(),
                        path: ctx.path.clone(),
                    };
                    let violation = self.materialize(constraint, pending, ctx, leaf_bean);
                    state.results.push(violation);
                }
            }
            Ok(!failed)
        } else {
            let mut valid = own_valid;
            for composing in constraint.composing() {
                valid &= self.validate_constraint(state, composing, ctx, leaf_bean)?;
            }
            Ok(valid)
        }
    }

    fn materialize(
        &self,
        constraint: &ConstraintDescriptor,
        pending: PendingViolation,
        ctx: &GraphContext<'_>,
        leaf_bean: Option<BeanId>,
    ) -> ConstraintViolation {
        let message = self.env.interpolator.interpolate(
            &pending.template,
            &MessageContext {
                attributes: constraint.attributes(),
                invalid_value: ctx.value,
            },
        );
        ConstraintViolation {
            path: pending.path,
            message,
            message_template: pending.template,
            invalid_value: ctx.value.clone(),
            constraint_kind: constraint.kind().to_string(),
            root_type: self.env.root_type.clone(),
            leaf_bean,
        }
    }
}
