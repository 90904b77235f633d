//! Group selection, sequences and default redirection.

use serde_json::json;
use stillwater::Validation;
use verdict::{
    attrs, ConstraintMapping, ConstraintViolations, EngineError, ObjectGraph, ValidationOutcome,
    ValueType, ValidatorFactory,
};

fn violations(outcome: Result<ValidationOutcome, EngineError>) -> ConstraintViolations {
    match outcome.unwrap() {
        Validation::Failure(violations) => violations,
        Validation::Success(()) => panic!("expected violations"),
    }
}

#[test]
fn test_constraint_outside_requested_group_is_skipped() {
    let factory = ValidatorFactory::builder()
        .mapping(ConstraintMapping::new().bean("Form", |bean| {
            bean.field("email", ValueType::Str, |f| {
                f.constraint("NotBlank", attrs([("groups", json!(["Extended"]))]))
            })
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let form = graph.add_bean("Form");
    graph.set_field(form, "email", "");

    let default_outcome = factory
        .validator()
        .validate(&graph, form, &["Default"])
        .unwrap();
    assert!(default_outcome.is_success());

    let extended = violations(factory.validator().validate(&graph, form, &["Extended"]));
    assert_eq!(extended.len(), 1);
}

#[test]
fn test_requested_sequence_short_circuits() {
    let factory = ValidatorFactory::builder()
        .mapping(
            ConstraintMapping::new()
                .group_sequence("Checks", ["Basic", "Deep"])
                .bean("Form", |bean| {
                    bean.field("name", ValueType::Str, |f| {
                        f.constraint("NotBlank", attrs([("groups", json!(["Basic"]))]))
                            .constraint(
                                "Size",
                                attrs([("min", json!(10)), ("groups", json!(["Deep"]))]),
                            )
                    })
                }),
        )
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let form = graph.add_bean("Form");
    graph.set_field(form, "name", "");

    // Basic fails, so Deep is never evaluated.
    let found = violations(factory.validator().validate(&graph, form, &["Checks"]));
    assert_eq!(found.len(), 1);
    assert_eq!(found.first().constraint_kind, "NotBlank");

    // With a Basic-valid value the sequence reaches Deep.
    graph.set_field(form, "name", "short");
    let found = violations(factory.validator().validate(&graph, form, &["Checks"]));
    assert_eq!(found.len(), 1);
    assert_eq!(found.first().constraint_kind, "Size");
}

#[test]
fn test_default_redirection_on_bean_sequence() {
    // Mirrors a class carrying a redefined default group sequence: when
    // Default is requested, the bean evaluates [Default, Extended] in order
    // with short-circuit.
    let factory = ValidatorFactory::builder()
        .mapping(ConstraintMapping::new().bean("Account", |bean| {
            bean.group_sequence(["Default", "Extended"])
                .field("age", ValueType::Int, |f| {
                    f.constraint("Min", attrs([("value", json!(0))])).constraint(
                        "Min",
                        attrs([("value", json!(18)), ("groups", json!(["Extended"]))]),
                    )
                })
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let account = graph.add_bean("Account");
    graph.set_field(account, "age", -1i64);

    // Default-group Min(0) fails and Extended is never evaluated.
    let found = violations(factory.validator().validate(&graph, account, &["Default"]));
    assert_eq!(found.len(), 1);
    assert_eq!(found.first().path.to_string(), "age");
    assert_eq!(found.first().message, "must be greater than or equal to 0");

    // Default passes; redirection continues into Extended.
    graph.set_field(account, "age", 10i64);
    let found = violations(factory.validator().validate(&graph, account, &["Default"]));
    assert_eq!(found.len(), 1);
    assert_eq!(found.first().message, "must be greater than or equal to 18");
}

#[test]
fn test_simple_groups_all_evaluate_without_short_circuit() {
    let factory = ValidatorFactory::builder()
        .mapping(ConstraintMapping::new().bean("Form", |bean| {
            bean.field("a", ValueType::Str, |f| {
                f.constraint("NotBlank", attrs([("groups", json!(["One"]))]))
            })
            .field("b", ValueType::Str, |f| {
                f.constraint("NotBlank", attrs([("groups", json!(["Two"]))]))
            })
        }))
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let form = graph.add_bean("Form");
    graph.set_field(form, "a", "");
    graph.set_field(form, "b", "");

    let found = violations(factory.validator().validate(&graph, form, &["One", "Two"]));
    assert_eq!(found.len(), 2);
}

#[test]
fn test_group_conversion_applies_when_cascading() {
    let factory = ValidatorFactory::builder()
        .mapping(
            ConstraintMapping::new()
                .bean("Order", |bean| {
                    bean.field("customer", ValueType::bean("Customer"), |f| {
                        f.cascade().convert_group("Default", "Basic")
                    })
                })
                .bean("Customer", |bean| {
                    bean.field("name", ValueType::Str, |f| {
                        f.constraint("NotBlank", attrs([("groups", json!(["Basic"]))]))
                    })
                }),
        )
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let order = graph.add_bean("Order");
    let customer = graph.add_bean("Customer");
    graph.set_field(order, "customer", customer);
    graph.set_field(customer, "name", "");

    // Validating the customer directly in Default finds nothing.
    let direct = factory
        .validator()
        .validate(&graph, customer, &["Default"])
        .unwrap();
    assert!(direct.is_success());

    // Cascading from the order converts Default to Basic.
    let found = violations(factory.validator().validate(&graph, order, &["Default"]));
    assert_eq!(found.len(), 1);
    assert_eq!(found.first().path.to_string(), "customer.name");
}

#[test]
fn test_cyclic_sequence_definition_fails_the_request() {
    let factory = ValidatorFactory::builder()
        .mapping(
            ConstraintMapping::new()
                .group_sequence("A", ["B"])
                .group_sequence("B", ["A"])
                .bean("Form", |bean| bean),
        )
        .build()
        .unwrap();
    let mut graph = ObjectGraph::new();
    let form = graph.add_bean("Form");

    let err = factory
        .validator()
        .validate(&graph, form, &["A"])
        .unwrap_err();
    assert!(matches!(err, EngineError::GroupDefinition(_)));
}
