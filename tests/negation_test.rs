// SPDX-License-Identifier: MIT OR Apache-2.0

//! Negation through the full evaluation mechanism
//!
//! A bounded negation (one with a positive event after it) is decided as soon as a
//! candidate arrives. An unbounded one holds the candidate until its window closes,
//! since a negated event may still show up.

use tree_cep::core::config::EngineConfig;
use tree_cep::core::TreeBasedEvaluationMechanism;
use tree_cep::query_api::{CompositeFormula, Pattern, PatternStructure};

mod common;
use common::{event, init_logging, prim, run};

fn negated(event_type: &str, name: &str) -> PatternStructure {
    PatternStructure::negation(prim(event_type, name))
}

/// Pattern: SEQ(A a, NOT B b, C c), window 100
/// Events: A(1) → B(2) → C(3) → A(4) → C(5)
/// Expected: only A(4)-C(5); every pair starting at A(1) has B(2) between its events
#[test]
fn test_bounded_sequence_negation() {
    let pattern = Pattern::new(
        PatternStructure::seq(vec![prim("A", "a"), negated("B", "b"), prim("C", "c")]),
        CompositeFormula::new(),
        100,
    )
    .unwrap();
    let events = vec![
        event("A", 1),
        event("B", 2),
        event("C", 3),
        event("A", 4),
        event("C", 5),
    ];

    let matches = run(pattern, EngineConfig::default(), events);
    assert_eq!(matches, vec![vec![4, 5]]);
}

/// Pattern: SEQ(A a, B b, NOT C c), window 10
/// Events: A(0) → B(1) → A(5) → B(6) → C(12)
/// Expected:
///   - A(0)-B(1) and A(0)-B(6) are released when C(12) moves the clock past 0 + 10
///   - A(5)-B(6) is still open at C(12) and C(12) falls inside it
#[test]
fn test_unbounded_negation_waits_for_window() {
    let pattern = Pattern::new(
        PatternStructure::seq(vec![prim("A", "a"), prim("B", "b"), negated("C", "c")]),
        CompositeFormula::new(),
        10,
    )
    .unwrap();
    init_logging();
    let mut mechanism = TreeBasedEvaluationMechanism::new(pattern, EngineConfig::default()).unwrap();

    for e in [event("A", 0), event("B", 1), event("A", 5), event("B", 6)] {
        assert!(mechanism.process_event(e).unwrap().is_empty());
    }
    let released: Vec<Vec<i64>> = mechanism
        .process_event(event("C", 12))
        .unwrap()
        .iter()
        .map(|m| m.timestamps())
        .collect();
    assert_eq!(released, vec![vec![0, 1], vec![0, 6]]);
    assert!(mechanism.flush().unwrap().is_empty());
}

/// Pattern: SEQ(A a, B b, NOT C c), window 10
/// Events: A(0) → B(1), then end of stream
/// Expected: the pending match is reported by the final flush
#[test]
fn test_unbounded_negation_released_on_flush() {
    let pattern = Pattern::new(
        PatternStructure::seq(vec![prim("A", "a"), prim("B", "b"), negated("C", "c")]),
        CompositeFormula::new(),
        10,
    )
    .unwrap();
    let matches = run(
        pattern,
        EngineConfig::default(),
        vec![event("A", 0), event("B", 1)],
    );
    assert_eq!(matches, vec![vec![0, 1]]);
}

/// Pattern: AND(A a, NOT B b), window 10
/// Events: B(0) → A(5) → A(20)
/// Expected:
///   - A(5) is negated by B(0), which lies within one window of it
///   - A(20) is reported at the end of the stream
#[test]
fn test_conjunction_negation() {
    let pattern = Pattern::new(
        PatternStructure::and(vec![prim("A", "a"), negated("B", "b")]),
        CompositeFormula::new(),
        10,
    )
    .unwrap();
    let events = vec![event("B", 0), event("A", 5), event("A", 20)];

    let matches = run(pattern, EngineConfig::default(), events);
    assert_eq!(matches, vec![vec![20]]);
}
