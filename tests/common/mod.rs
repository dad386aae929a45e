// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tree_cep::core::config::EngineConfig;
use tree_cep::core::event::{Event, PatternMatch, SharedEvent};
use tree_cep::core::TreeBasedEvaluationMechanism;
use tree_cep::query_api::{CompositeFormula, Pattern, PatternStructure};

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

pub fn event(event_type: &str, timestamp: i64) -> SharedEvent {
    Arc::new(Event::new(event_type, timestamp))
}

pub fn event_with(event_type: &str, timestamp: i64, attribute: &str, value: f64) -> SharedEvent {
    Event::new(event_type, timestamp)
        .with_attribute(attribute, value)
        .into_shared()
}

pub fn prim(event_type: &str, name: &str) -> PatternStructure {
    PatternStructure::primitive(event_type, name)
}

/// SEQ over `(type, name)` pairs with no condition
pub fn seq_pattern(args: &[(&str, &str)], window_ms: i64) -> Pattern {
    Pattern::new(
        PatternStructure::seq(args.iter().map(|(t, n)| prim(t, n)).collect()),
        CompositeFormula::new(),
        window_ms,
    )
    .expect("valid pattern")
}

/// Feed every event, flush at the end and return the timestamps of each match
pub fn run(pattern: Pattern, config: EngineConfig, events: Vec<SharedEvent>) -> Vec<Vec<i64>> {
    init_logging();
    let mut mechanism = TreeBasedEvaluationMechanism::new(pattern, config).expect("mechanism");
    let mut matches: Vec<PatternMatch> = Vec::new();
    for e in events {
        matches.extend(mechanism.process_event(e).expect("event processed"));
    }
    matches.extend(mechanism.flush().expect("flush"));
    matches.iter().map(|m| m.timestamps()).collect()
}

pub fn sorted(mut matches: Vec<Vec<i64>>) -> Vec<Vec<i64>> {
    matches.sort();
    matches
}
