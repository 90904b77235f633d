//! Validator resolution against declared element types.

use std::sync::Arc;

use stillwater::Validation;
use verdict::{
    attrs, ConstraintDefinition, ConstraintMapping, ConstraintRegistry, ConstraintValidator,
    ConstraintValidatorContext, ConstraintViolations, EngineError, ObjectGraph, ValidationOutcome,
    ValidationTarget, ValidatorFactory, ValidatorInfo, Value, ValueType,
};

fn violations(outcome: Result<ValidationOutcome, EngineError>) -> ConstraintViolations {
    match outcome.unwrap() {
        Validation::Failure(violations) => violations,
        Validation::Success(()) => panic!("expected violations"),
    }
}

#[test]
fn test_not_empty_resolves_per_container_shape() {
    let factory = ValidatorFactory::builder()
        .mapping(ConstraintMapping::new().bean("Box", |bean| {
            bean.field("label", ValueType::Str, |f| f.constraint("NotEmpty", attrs([])))
                .field("items", ValueType::List, |f| f.constraint("NotEmpty", attrs([])))
                .field("tags", ValueType::Map, |f| f.constraint("NotEmpty", attrs([])))
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let bean = graph.add_bean("Box");
    graph.set_field(bean, "label", "");
    graph.set_field(bean, "items", Value::List(vec![]));
    graph.set_field(bean, "tags", Value::Map(Default::default()));

    let found = violations(factory.validator().validate(&graph, bean, &["Default"]));
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|v| v.constraint_kind == "NotEmpty"));
}

#[test]
fn test_number_validator_covers_int_and_float() {
    let factory = ValidatorFactory::builder()
        .mapping(ConstraintMapping::new().bean("Reading", |bean| {
            bean.field("count", ValueType::Int, |f| {
                f.constraint("Min", attrs([("value", serde_json::json!(0))]))
            })
            .field("level", ValueType::Float, |f| {
                f.constraint("Min", attrs([("value", serde_json::json!(0))]))
            })
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let reading = graph.add_bean("Reading");
    graph.set_field(reading, "count", -1i64);
    graph.set_field(reading, "level", -0.5f64);

    let found = violations(factory.validator().validate(&graph, reading, &["Default"]));
    assert_eq!(found.len(), 2);
}

#[test]
fn test_no_applicable_validator_is_unexpected_type() {
    // NotBlank only declares a Str validator; a Bool element cannot be
    // served.
    let factory = ValidatorFactory::builder()
        .mapping(ConstraintMapping::new().bean("Flagged", |bean| {
            bean.field("active", ValueType::Bool, |f| f.constraint("NotBlank", attrs([])))
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let bean = graph.add_bean("Flagged");
    graph.set_field(bean, "active", true);

    let err = factory
        .validator()
        .validate(&graph, bean, &["Default"])
        .unwrap_err();
    assert!(matches!(err, EngineError::UnexpectedType(_)));
}

struct AlwaysInvalid;

impl ConstraintValidator for AlwaysInvalid {
    fn is_valid(&self, _value: &Value, _ctx: &mut ConstraintValidatorContext<'_>) -> bool {
        false
    }
}

#[test]
fn test_ambiguous_validators_fail_resolution() {
    let registry = Arc::new(ConstraintRegistry::with_defaults());
    registry
        .register_definition(ConstraintDefinition::new("Confused"))
        .unwrap();
    // Two distinct validators, both maximally specific for a Str element.
    registry
        .register_validator(
            "Confused",
            ValidatorInfo::new("Confused.str", ValueType::Str, || AlwaysInvalid),
        )
        .unwrap();
    registry
        .register_validator(
            "Confused",
            ValidatorInfo::new("Confused.str.again", ValueType::Str, || AlwaysInvalid),
        )
        .unwrap();

    let factory = ValidatorFactory::builder()
        .registry(registry)
        .mapping(ConstraintMapping::new().bean("Doc", |bean| {
            bean.field("title", ValueType::Str, |f| f.constraint("Confused", attrs([])))
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let doc = graph.add_bean("Doc");
    graph.set_field(doc, "title", "x");

    let err = factory
        .validator()
        .validate(&graph, doc, &["Default"])
        .unwrap_err();
    assert!(matches!(err, EngineError::UnexpectedType(_)));
}

#[test]
fn test_most_specific_validator_wins_over_any() {
    struct Recording(&'static str);

    impl ConstraintValidator for Recording {
        fn is_valid(&self, _value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
            ctx.disable_default_violation();
            ctx.build_violation_with_template(self.0).add_constraint_violation();
            false
        }
    }

    let registry = Arc::new(ConstraintRegistry::with_defaults());
    registry
        .register_definition(ConstraintDefinition::new("Tiered"))
        .unwrap();
    registry
        .register_validator(
            "Tiered",
            ValidatorInfo::new("Tiered.any", ValueType::Any, || Recording("{any}")),
        )
        .unwrap();
    registry
        .register_validator(
            "Tiered",
            ValidatorInfo::new("Tiered.str", ValueType::Str, || Recording("{str}")),
        )
        .unwrap();

    let factory = ValidatorFactory::builder()
        .registry(registry)
        .mapping(ConstraintMapping::new().bean("Doc", |bean| {
            bean.field("title", ValueType::Str, |f| f.constraint("Tiered", attrs([])))
                .field("active", ValueType::Bool, |f| f.constraint("Tiered", attrs([])))
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let doc = graph.add_bean("Doc");
    graph.set_field(doc, "title", "x");
    graph.set_field(doc, "active", true);

    let found = violations(factory.validator().validate(&graph, doc, &["Default"]));
    let templates: Vec<String> = found.iter().map(|v| v.message_template.clone()).collect();
    // Str element picks the Str validator; Bool falls back to Any.
    assert_eq!(templates, vec!["{str}", "{any}"]);
}

#[test]
fn test_bean_hierarchy_resolution() {
    struct Tag(&'static str);

    impl ConstraintValidator for Tag {
        fn is_valid(&self, _value: &Value, ctx: &mut ConstraintValidatorContext<'_>) -> bool {
            ctx.disable_default_violation();
            ctx.build_violation_with_template(self.0).add_constraint_violation();
            false
        }
    }

    let registry = Arc::new(ConstraintRegistry::with_defaults());
    registry
        .register_definition(ConstraintDefinition::new("Audited"))
        .unwrap();
    registry
        .register_validator(
            "Audited",
            ValidatorInfo::new("Audited.base", ValueType::bean("Base"), || Tag("{base}")),
        )
        .unwrap();
    registry
        .register_validator(
            "Audited",
            ValidatorInfo::new("Audited.anybean", ValueType::AnyBean, || Tag("{anybean}")),
        )
        .unwrap();

    let factory = ValidatorFactory::builder()
        .registry(registry)
        .mapping(
            ConstraintMapping::new()
                .bean("Base", |bean| bean)
                .bean("Child", |bean| bean.parent("Base"))
                .bean("Holder", |bean| {
                    bean.field("child", ValueType::bean("Child"), |f| {
                        f.constraint("Audited", attrs([]))
                    })
                }),
        )
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let holder = graph.add_bean("Holder");
    let child = graph.add_bean("Child");
    graph.set_field(holder, "child", child);

    // The Base-typed validator is more specific than the AnyBean one.
    let found = violations(factory.validator().validate(&graph, holder, &["Default"]));
    assert_eq!(found.first().message_template, "{base}");
}

#[test]
fn test_cross_parameter_validator_must_accept_parameter_list() {
    let registry = Arc::new(ConstraintRegistry::with_defaults());
    registry
        .register_definition(ConstraintDefinition::new("BadCross"))
        .unwrap();
    registry
        .register_validator(
            "BadCross",
            ValidatorInfo::new("BadCross.str", ValueType::Str, || AlwaysInvalid)
                .supporting([ValidationTarget::Parameters]),
        )
        .unwrap();

    let factory = ValidatorFactory::builder()
        .registry(registry)
        .mapping(ConstraintMapping::new().bean("Service", |bean| {
            bean.method("run", [("input", ValueType::Str)], |m| {
                m.cross_parameter("BadCross", attrs([]))
            })
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let service = graph.add_bean("Service");

    let signature = verdict::Signature::new("run", [ValueType::Str]);
    let err = factory
        .validator()
        .validate_parameters(&graph, service, &signature, &[Value::from("x")], &["Default"])
        .unwrap_err();
    assert!(matches!(err, EngineError::ConstraintDefinition(_)));
}
