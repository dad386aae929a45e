// SPDX-License-Identifier: MIT OR Apache-2.0

//! Benchmarks for Kleene closure evaluation
//!
//! Run with: cargo bench --bench kleene_powerset_bench
//!
//! Benchmark groups:
//! - kleene_bounded: SEQ(A, KC(B) up to k events, C) with a growing number of B events
//! - kleene_rising: KC over ticks with a consecutive rising-price condition
//! - kleene_policies: the same stream under match-any and match-single

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tree_cep::core::config::{EngineConfig, SelectionStrategy};
use tree_cep::core::event::{Event, SharedEvent};
use tree_cep::core::TreeBasedEvaluationMechanism;
use tree_cep::query_api::{CompositeFormula, Condition, Pattern, PatternStructure, RelOp};

// =============================================================================
// Event generators
// =============================================================================

/// A, then `b_ratio` B events, then C, repeated
fn generate_abc_events(count: usize, b_ratio: usize) -> Vec<SharedEvent> {
    (0..count)
        .map(|i| {
            let event_type = if i % (b_ratio + 2) == 0 {
                "A"
            } else if i % (b_ratio + 2) == b_ratio + 1 {
                "C"
            } else {
                "B"
            };
            Event::new(event_type, i as i64)
                .with_attribute("value", (i * 10) as i64)
                .into_shared()
        })
        .collect()
}

/// Prices that mostly rise and reset every 20 ticks
fn generate_rising_price_events(count: usize) -> Vec<SharedEvent> {
    let mut price = 100.0;
    (0..count)
        .map(|i| {
            if i % 20 == 0 {
                price = 100.0 + (i as f64 * 0.01);
            } else if i % 5 == 4 {
                price -= 5.0;
            } else {
                price += (i as f64 % 10.0) * 0.5;
            }
            Event::new("Tick", i as i64)
                .with_attribute("price", price)
                .into_shared()
        })
        .collect()
}

fn seq_with_kleene(max_size: usize, window_ms: i64) -> Pattern {
    Pattern::new(
        PatternStructure::seq(vec![
            PatternStructure::primitive("A", "a"),
            PatternStructure::kleene(PatternStructure::primitive("B", "b"), 1, Some(max_size)),
            PatternStructure::primitive("C", "c"),
        ]),
        CompositeFormula::new(),
        window_ms,
    )
    .expect("valid pattern")
}

fn count_matches(pattern: &Pattern, config: &EngineConfig, events: &[SharedEvent]) -> usize {
    let mut mechanism =
        TreeBasedEvaluationMechanism::new(pattern.clone(), config.clone()).expect("mechanism");
    let mut matches = 0;
    for event in events {
        matches += mechanism
            .process_event(black_box(event.clone()))
            .expect("event processed")
            .len();
    }
    matches + mechanism.flush().expect("flush").len()
}

// =============================================================================
// Benchmark 1: bounded closure inside a sequence
// =============================================================================

fn bench_kleene_bounded(c: &mut Criterion) {
    let mut group = c.benchmark_group("kleene_bounded");
    group.measurement_time(Duration::from_secs(10));

    for max_size in [2, 4, 6] {
        let events = generate_abc_events(1000, 6);
        let pattern = seq_with_kleene(max_size, 8);
        let config = EngineConfig::default();
        group.throughput(Throughput::Elements(events.len() as u64));

        group.bench_with_input(
            BenchmarkId::new("seq_a_kc_b_c", max_size),
            &events,
            |b, events| b.iter(|| count_matches(&pattern, &config, events)),
        );
    }

    group.finish();
}

// =============================================================================
// Benchmark 2: rising prices
// =============================================================================

fn bench_kleene_rising(c: &mut Criterion) {
    let mut group = c.benchmark_group("kleene_rising");

    for size in [200, 500, 1000] {
        let events = generate_rising_price_events(size);
        let pattern = Pattern::new(
            PatternStructure::kleene(PatternStructure::primitive("Tick", "t"), 2, Some(5)),
            CompositeFormula::new().and(Condition::consecutive("t", "price", RelOp::Lt)),
            6,
        )
        .expect("valid pattern");
        let config = EngineConfig::default();
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("rising_prices", size), &events, |b, events| {
            b.iter(|| count_matches(&pattern, &config, events))
        });
    }

    group.finish();
}

// =============================================================================
// Benchmark 3: consumption policy overhead
// =============================================================================

fn bench_kleene_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("kleene_policies");
    let events = generate_abc_events(1000, 4);
    let pattern = seq_with_kleene(3, 8);

    for strategy in [SelectionStrategy::MatchAny, SelectionStrategy::MatchSingle] {
        let config = EngineConfig {
            primary_selection_strategy: strategy,
            ..EngineConfig::default()
        };
        group.bench_with_input(
            BenchmarkId::new("primary_strategy", strategy.as_str()),
            &events,
            |b, events| b.iter(|| count_matches(&pattern, &config, events)),
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_kleene_bounded,
    bench_kleene_rising,
    bench_kleene_policies,
);

criterion_main!(benches);
