//! Concurrent validation against a shared factory.

use std::sync::Arc;
use std::thread;

use serde_json::json;
use verdict::{attrs, ConstraintMapping, ObjectGraph, Value, ValueType, ValidatorFactory};

fn shared_factory() -> Arc<ValidatorFactory> {
    Arc::new(
        ValidatorFactory::builder()
            .mapping(
                ConstraintMapping::new()
                    .bean("User", |bean| {
                        bean.field("name", ValueType::Str, |f| f.constraint("NotBlank", attrs([])))
                            .field("age", ValueType::Int, |f| {
                                f.constraint("Min", attrs([("value", json!(0))]))
                            })
                    })
                    .bean("Team", |bean| {
                        bean.field("lead", ValueType::bean("User"), |f| f.cascade())
                    }),
            )
            .build()
            .unwrap(),
    )
}

#[test]
fn test_concurrent_validation() {
    let factory = shared_factory();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let factory = Arc::clone(&factory);
            thread::spawn(move || {
                let mut graph = ObjectGraph::new();
                let user = graph.add_bean("User");
                graph.set_field(user, "name", format!("User{}", i));
                graph.set_field(user, "age", 20 + i as i64);

                let outcome = factory
                    .validator()
                    .validate(&graph, user, &["Default"])
                    .unwrap();
                assert!(outcome.is_success());
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_concurrent_validation_over_shared_graph() {
    let factory = shared_factory();

    let mut graph = ObjectGraph::new();
    let user = graph.add_bean("User");
    graph.set_field(user, "name", "");
    graph.set_field(user, "age", -1i64);
    let team = graph.add_bean("Team");
    graph.set_field(team, "lead", user);
    let graph = Arc::new(graph);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let graph = Arc::clone(&graph);
            thread::spawn(move || {
                let outcome = factory
                    .validator()
                    .validate(&graph, team, &["Default"])
                    .unwrap();
                match outcome {
                    stillwater::Validation::Failure(violations) => {
                        let paths: Vec<String> =
                            violations.iter().map(|v| v.path.to_string()).collect();
                        assert_eq!(paths, vec!["lead.name", "lead.age"]);
                    }
                    stillwater::Validation::Success(()) => panic!("expected violations"),
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_descriptor_cache_publishes_one_instance() {
    let factory = shared_factory();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let factory = Arc::clone(&factory);
            thread::spawn(move || factory.descriptor("User").unwrap())
        })
        .collect();

    let descriptors: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for descriptor in &descriptors[1..] {
        assert!(Arc::ptr_eq(&descriptors[0], descriptor));
    }
}

#[test]
fn test_concurrent_metadata_queries() {
    let factory = shared_factory();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let factory = Arc::clone(&factory);
            thread::spawn(move || {
                let type_name = if i % 2 == 0 { "User" } else { "Team" };
                let descriptor = factory.descriptor(type_name).unwrap();
                assert_eq!(descriptor.type_name(), type_name);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_factory_and_graph_values_are_send() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ValidatorFactory>();
    assert_send_sync::<ObjectGraph>();
    assert_send_sync::<Value>();
}
