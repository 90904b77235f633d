//! The validator factory and the validation operations.
//!
//! A [`ValidatorFactory`] wires the registry, metadata sources, descriptor
//! cache, extractor scope and collaborator implementations together. It is
//! built once, is cheap to share, and hands out [`Validator`]s whose
//! operations each construct a single-use [`ValidationJob`].

use std::sync::Arc;

use stillwater::Validation;

use crate::composition::CompositionCache;
use crate::config::EngineProperties;
use crate::descriptor::{BeanDescriptor, DescriptorManager};
use crate::error::{ConstraintViolation, ConstraintViolations, EngineError};
use crate::extract::ExtractorRegistry;
use crate::groups::GroupsComputer;
use crate::job::{BaseTarget, JobEnv, ValidationJob};
use crate::metadata::builder::collect_sequences;
use crate::metadata::mapping::ConstraintMapping;
use crate::metadata::{MetadataSource, Signature};
use crate::path::PathNode;
use crate::registry::ConstraintRegistry;
use crate::spi::{
    ClockProvider, DeclaredParameterNames, DefaultMessageInterpolator, MessageInterpolator,
    ParameterNameProvider, SystemClock, TraversableResolver, TraverseAll,
};
use crate::value::{BeanId, ObjectGraph, Value};

/// Success or accumulated violations of one validation operation.
pub type ValidationOutcome = Validation<(), ConstraintViolations>;

fn outcome(violations: Vec<ConstraintViolation>) -> ValidationOutcome {
    match ConstraintViolations::from_vec(violations) {
        Some(violations) => Validation::Failure(violations),
        None => Validation::Success(()),
    }
}

/// Builds [`ValidatorFactory`] instances.
pub struct ValidatorFactoryBuilder {
    sources: Vec<Arc<dyn MetadataSource>>,
    registry: Option<Arc<ConstraintRegistry>>,
    properties: EngineProperties,
    resolver: Arc<dyn TraversableResolver>,
    interpolator: Arc<dyn MessageInterpolator>,
    parameter_names: Arc<dyn ParameterNameProvider>,
    clock: Arc<dyn ClockProvider>,
}

impl ValidatorFactoryBuilder {
    fn new() -> Self {
        Self {
            sources: Vec::new(),
            registry: None,
            properties: EngineProperties::new(),
            resolver: Arc::new(TraverseAll),
            interpolator: Arc::new(DefaultMessageInterpolator),
            parameter_names: Arc::new(DeclaredParameterNames),
            clock: Arc::new(SystemClock),
        }
    }

    /// Adds a programmatic constraint mapping as a metadata source.
    pub fn mapping(self, mapping: ConstraintMapping) -> Self {
        self.source(Arc::new(mapping))
    }

    /// Adds a metadata source. The first source added is the primary one.
    pub fn source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Replaces the constraint registry (defaults to the built-in
    /// vocabulary).
    pub fn registry(mut self, registry: Arc<ConstraintRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces the configuration properties.
    pub fn properties(mut self, properties: EngineProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Replaces the traversable resolver.
    pub fn traversable_resolver(mut self, resolver: Arc<dyn TraversableResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the message interpolator.
    pub fn message_interpolator(mut self, interpolator: Arc<dyn MessageInterpolator>) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Replaces the parameter name provider.
    pub fn parameter_name_provider(mut self, provider: Arc<dyn ParameterNameProvider>) -> Self {
        self.parameter_names = provider;
        self
    }

    /// Replaces the clock provider.
    pub fn clock_provider(mut self, clock: Arc<dyn ClockProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the factory.
    ///
    /// Fails on unparseable configuration, conflicting group sequence
    /// declarations, or a broken extractor manifest.
    pub fn build(self) -> Result<ValidatorFactory, EngineError> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ConstraintRegistry::with_defaults()));
        let cache_size = self.properties.constraints_cache_size()?;
        let compositions = Arc::new(CompositionCache::new(cache_size));
        let sequences = collect_sequences(&self.sources)?;
        let manager = Arc::new(DescriptorManager::new(
            self.sources,
            registry.clone(),
            compositions,
        ));
        let extractors = ExtractorRegistry::bootstrap()?.child();
        tracing::debug!(
            composition_cache_size = cache_size,
            sequences = sequences.len(),
            "validator factory built"
        );
        Ok(ValidatorFactory {
            registry,
            manager,
            extractors,
            groups: GroupsComputer::new(sequences),
            resolver: self.resolver,
            interpolator: self.interpolator,
            parameter_names: self.parameter_names,
            clock: self.clock,
        })
    }
}

/// Shared, immutable engine wiring.
pub struct ValidatorFactory {
    registry: Arc<ConstraintRegistry>,
    manager: Arc<DescriptorManager>,
    extractors: Arc<ExtractorRegistry>,
    groups: GroupsComputer,
    resolver: Arc<dyn TraversableResolver>,
    interpolator: Arc<dyn MessageInterpolator>,
    parameter_names: Arc<dyn ParameterNameProvider>,
    clock: Arc<dyn ClockProvider>,
}

impl ValidatorFactory {
    /// Starts building a factory.
    pub fn builder() -> ValidatorFactoryBuilder {
        ValidatorFactoryBuilder::new()
    }

    /// Hands out a validator backed by this factory.
    pub fn validator(&self) -> Validator<'_> {
        Validator { factory: self }
    }

    /// The descriptor of a type, built on first query and cached.
    pub fn descriptor(&self, type_name: &str) -> Result<Arc<BeanDescriptor>, EngineError> {
        self.manager.descriptor(type_name)
    }

    /// The factory's value-extractor scope. Custom extractors registered
    /// here shadow the built-in ones.
    pub fn extractor_scope(&self) -> &ExtractorRegistry {
        &self.extractors
    }
}

/// Executes validation requests against a factory.
pub struct Validator<'f> {
    factory: &'f ValidatorFactory,
}

impl<'f> Validator<'f> {
    fn env<'g>(&self, graph: &'g ObjectGraph, root_type: String) -> JobEnv<'g>
    where
        'f: 'g,
    {
        JobEnv {
            graph,
            registry: &*self.factory.registry,
            manager: &*self.factory.manager,
            extractors: &*self.factory.extractors,
            resolver: &*self.factory.resolver,
            interpolator: &*self.factory.interpolator,
            parameter_names: &*self.factory.parameter_names,
            clock: &*self.factory.clock,
            root_type,
        }
    }

    /// Validates a bean and everything reachable from it.
    pub fn validate(
        &self,
        graph: &ObjectGraph,
        root: BeanId,
        groups: &[&str],
    ) -> Result<ValidationOutcome, EngineError> {
        let plan = self.factory.groups.compute(groups)?;
        let root_type = graph.bean(root).type_name().to_string();
        let job = ValidationJob::new(
            self.env(graph, root_type),
            plan,
            BaseTarget::Bean {
                value: Value::Bean(root),
            },
            true,
        );
        Ok(outcome(job.run()?))
    }

    /// Validates a single property of a bean. No cascading.
    pub fn validate_property(
        &self,
        graph: &ObjectGraph,
        bean: BeanId,
        property: &str,
        groups: &[&str],
    ) -> Result<ValidationOutcome, EngineError> {
        let plan = self.factory.groups.compute(groups)?;
        let root_type = graph.bean(bean).type_name().to_string();
        let job = ValidationJob::new(
            self.env(graph, root_type),
            plan,
            BaseTarget::Property {
                bean,
                property: property.to_string(),
            },
            false,
        );
        Ok(outcome(job.run()?))
    }

    /// Validates an ad-hoc value against a type's property constraints.
    /// No cascading.
    pub fn validate_value(
        &self,
        graph: &ObjectGraph,
        type_name: &str,
        property: &str,
        value: &Value,
        groups: &[&str],
    ) -> Result<ValidationOutcome, EngineError> {
        let plan = self.factory.groups.compute(groups)?;
        let job = ValidationJob::new(
            self.env(graph, type_name.to_string()),
            plan,
            BaseTarget::PropertyValue {
                type_name: type_name.to_string(),
                property: property.to_string(),
                value: value.clone(),
            },
            false,
        );
        Ok(outcome(job.run()?))
    }

    /// Validates the arguments of a method invocation on `object`.
    pub fn validate_parameters(
        &self,
        graph: &ObjectGraph,
        object: BeanId,
        signature: &Signature,
        values: &[Value],
        groups: &[&str],
    ) -> Result<ValidationOutcome, EngineError> {
        let root_type = graph.bean(object).type_name().to_string();
        let descriptor = self.factory.manager.descriptor(&root_type)?;
        let Some(executable) = descriptor.method(signature) else {
            return Ok(Validation::Success(()));
        };
        let plan = self.factory.groups.compute(groups)?;
        let job = ValidationJob::new(
            self.env(graph, root_type),
            plan,
            BaseTarget::Parameters {
                executable,
                root_node: PathNode::Method(signature.name().to_string()),
                object: Some(object),
                values: Value::List(values.to_vec()),
            },
            true,
        );
        Ok(outcome(job.run()?))
    }

    /// Validates the arguments of a constructor invocation.
    pub fn validate_constructor_parameters(
        &self,
        graph: &ObjectGraph,
        type_name: &str,
        signature: &Signature,
        values: &[Value],
        groups: &[&str],
    ) -> Result<ValidationOutcome, EngineError> {
        let descriptor = self.factory.manager.descriptor(type_name)?;
        let Some(executable) = descriptor.constructor(signature) else {
            return Ok(Validation::Success(()));
        };
        let plan = self.factory.groups.compute(groups)?;
        let job = ValidationJob::new(
            self.env(graph, type_name.to_string()),
            plan,
            BaseTarget::Parameters {
                executable,
                root_node: PathNode::Constructor(signature.name().to_string()),
                object: None,
                values: Value::List(values.to_vec()),
            },
            true,
        );
        Ok(outcome(job.run()?))
    }

    /// Validates the value returned by a method invocation on `object`.
    pub fn validate_return_value(
        &self,
        graph: &ObjectGraph,
        object: BeanId,
        signature: &Signature,
        value: &Value,
        groups: &[&str],
    ) -> Result<ValidationOutcome, EngineError> {
        let root_type = graph.bean(object).type_name().to_string();
        let descriptor = self.factory.manager.descriptor(&root_type)?;
        let Some(executable) = descriptor.method(signature) else {
            return Ok(Validation::Success(()));
        };
        let plan = self.factory.groups.compute(groups)?;
        let job = ValidationJob::new(
            self.env(graph, root_type),
            plan,
            BaseTarget::ReturnValue {
                executable,
                root_node: PathNode::Method(signature.name().to_string()),
                object: Some(object),
                value: value.clone(),
            },
            true,
        );
        Ok(outcome(job.run()?))
    }

    /// Validates the object produced by a constructor invocation.
    pub fn validate_constructor_return_value(
        &self,
        graph: &ObjectGraph,
        type_name: &str,
        signature: &Signature,
        value: &Value,
        groups: &[&str],
    ) -> Result<ValidationOutcome, EngineError> {
        let descriptor = self.factory.manager.descriptor(type_name)?;
        let Some(executable) = descriptor.constructor(signature) else {
            return Ok(Validation::Success(()));
        };
        let plan = self.factory.groups.compute(groups)?;
        let job = ValidationJob::new(
            self.env(graph, type_name.to_string()),
            plan,
            BaseTarget::ReturnValue {
                executable,
                root_node: PathNode::Constructor(signature.name().to_string()),
                object: None,
                value: value.clone(),
            },
            true,
        );
        Ok(outcome(job.run()?))
    }
}
