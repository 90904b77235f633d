//! Custom violations built through the validator context.

use std::sync::Arc;

use stillwater::Validation;
use verdict::{
    attrs, ConstraintDefinition, ConstraintMapping, ConstraintRegistry, ConstraintValidator,
    ConstraintValidatorContext, ConstraintViolations, ContainerKind, EngineError, ObjectGraph,
    ValidationOutcome, ValidatorFactory, ValidatorInfo, Value, ValueType,
};

fn violations(outcome: Result<ValidationOutcome, EngineError>) -> ConstraintViolations {
    match outcome.unwrap() {
        Validation::Failure(violations) => violations,
        Validation::Success(()) => panic!("expected violations"),
    }
}

fn factory_with<V, F>(kind: &str, validated: ValueType, make: F) -> ValidatorFactory
where
    V: ConstraintValidator + 'static,
    F: Fn() -> V + Send + Sync + 'static,
{
    let registry = Arc::new(ConstraintRegistry::with_defaults());
    registry
        .register_definition(ConstraintDefinition::new(kind))
        .unwrap();
    registry
        .register_validator(kind, ValidatorInfo::new(format!("{kind}.custom"), validated, make))
        .unwrap();

    let kind = kind.to_string();
    ValidatorFactory::builder()
        .registry(registry)
        .mapping(ConstraintMapping::new().bean("Order", |bean| {
            bean.constraint(&kind, attrs([]))
        }))
        .build()
        .unwrap()
}

/// A class-level validator that redirects its violation to a property.
struct TotalsMatch;

impl ConstraintValidator for TotalsMatch {
    fn is_valid(&self, value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        let Some(id) = value.as_bean() else {
            return true;
        };
        let bean = ctx.graph().bean(id);
        if bean.field("total") == bean.field("expected") {
            return true;
        }
        ctx.disable_default_violation();
        ctx.build_violation_with_template("{TotalsMatch.message}")
            .add_property_node("total")
            .add_constraint_violation();
        false
    }
}

#[test]
fn test_custom_violation_redirected_to_property() {
    let factory = factory_with("TotalsMatch", ValueType::AnyBean, || TotalsMatch);
    let mut graph = ObjectGraph::new();
    let order = graph.add_bean("Order");
    graph.set_field(order, "total", 10i64);
    graph.set_field(order, "expected", 12i64);

    let found = violations(factory.validator().validate(&graph, order, &["Default"]));
    assert_eq!(found.len(), 1);
    assert_eq!(found.first().path.to_string(), "total");
    assert_eq!(found.first().message_template, "{TotalsMatch.message}");
}

/// Adds a violation inside a keyed container element.
struct FlagEntry;

impl ConstraintValidator for FlagEntry {
    fn is_valid(&self, _value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        ctx.disable_default_violation();
        ctx.build_violation_with_template("{FlagEntry.message}")
            .add_property_node("entries")
            .add_container_element_node("<map value>", ContainerKind::Map, 1)
            .at_key("bad")
            .add_constraint_violation();
        false
    }
}

#[test]
fn test_container_element_violation_path() {
    let factory = factory_with("FlagEntry", ValueType::AnyBean, || FlagEntry);
    let mut graph = ObjectGraph::new();
    let order = graph.add_bean("Order");

    let found = violations(factory.validator().validate(&graph, order, &["Default"]));
    assert_eq!(found.first().path.to_string(), "entries[bad].<map value>");
}

/// Keeps the default violation and adds a second custom one.
struct Doubled;

impl ConstraintValidator for Doubled {
    fn is_valid(&self, _value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        ctx.build_violation_with_template("{Doubled.extra}")
            .add_property_node("detail")
            .add_constraint_violation();
        false
    }
}

#[test]
fn test_default_violation_precedes_custom_ones() {
    let factory = factory_with("Doubled", ValueType::AnyBean, || Doubled);
    let mut graph = ObjectGraph::new();
    let order = graph.add_bean("Order");

    let found = violations(factory.validator().validate(&graph, order, &["Default"]));
    assert_eq!(found.len(), 2);
    assert_eq!(found.first().message_template, "{Doubled.message}");
    let paths: Vec<String> = found.iter().map(|v| v.path.to_string()).collect();
    assert_eq!(paths, vec!["", "detail"]);
}

/// Disables the default violation but never adds a custom one.
struct Silent;

impl ConstraintValidator for Silent {
    fn is_valid(&self, _value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        ctx.disable_default_violation();
        false
    }
}

#[test]
fn test_disabling_default_without_custom_is_fatal() {
    let factory = factory_with("Silent", ValueType::AnyBean, || Silent);
    let mut graph = ObjectGraph::new();
    let order = graph.add_bean("Order");

    let err = factory
        .validator()
        .validate(&graph, order, &["Default"])
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
}

/// Reads the clock through the context.
struct NotInFuture;

impl ConstraintValidator for NotInFuture {
    fn is_valid(&self, value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        let now = ctx
            .clock()
            .now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(i64::MAX);
        match value {
            Value::Null => true,
            Value::Int(timestamp) => *timestamp <= now,
            _ => false,
        }
    }
}

#[test]
fn test_clock_provider_reaches_validators() {
    let registry = Arc::new(ConstraintRegistry::with_defaults());
    registry
        .register_definition(ConstraintDefinition::new("NotInFuture"))
        .unwrap();
    registry
        .register_validator(
            "NotInFuture",
            ValidatorInfo::new("NotInFuture.number", ValueType::Number, || NotInFuture),
        )
        .unwrap();

    let factory = ValidatorFactory::builder()
        .registry(registry)
        .mapping(ConstraintMapping::new().bean("Event", |bean| {
            bean.field("at", ValueType::Int, |f| f.constraint("NotInFuture", attrs([])))
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let event = graph.add_bean("Event");
    graph.set_field(event, "at", i64::MAX);

    let found = violations(factory.validator().validate(&graph, event, &["Default"]));
    assert_eq!(found.first().constraint_kind, "NotInFuture");
}

#[test]
fn test_default_message_template_exposed_to_validators() {
    struct EchoTemplate;

    impl ConstraintValidator for EchoTemplate {
        fn is_valid(&self, _value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
            let template = ctx.default_message_template().to_string();
            ctx.disable_default_violation();
            ctx.build_violation_with_template(template)
                .add_constraint_violation();
            false
        }
    }

    let factory = factory_with("EchoTemplate", ValueType::AnyBean, || EchoTemplate);
    let mut graph = ObjectGraph::new();
    let order = graph.add_bean("Order");

    let found = violations(factory.validator().validate(&graph, order, &["Default"]));
    assert_eq!(found.first().message_template, "{EchoTemplate.message}");
}
