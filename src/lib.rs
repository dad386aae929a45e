// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree-based complex event processing.
//!
//! A [`Pattern`](query_api::Pattern) (SEQ, AND, Kleene closure and negation over
//! typed events, a condition and a time window) is compiled into an evaluation tree
//! whose shape comes from a tree plan. The tree binds events at its leaves and
//! combines partial matches upward until full matches reach the root. An optimizer
//! watches stream statistics and replaces the plan when a cheaper one is expected.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tree_cep::core::config::EngineConfig;
//! use tree_cep::core::event::Event;
//! use tree_cep::core::TreeBasedEvaluationMechanism;
//! use tree_cep::query_api::{CompositeFormula, Pattern, PatternStructure};
//!
//! let pattern = Pattern::new(
//!     PatternStructure::seq(vec![
//!         PatternStructure::primitive("A", "a"),
//!         PatternStructure::kleene(PatternStructure::primitive("B", "b"), 1, Some(3)),
//!     ]),
//!     CompositeFormula::new(),
//!     10_000,
//! )?;
//! let mut mechanism = TreeBasedEvaluationMechanism::new(pattern, EngineConfig::default())?;
//! for ts in 0..5 {
//!     let event_type = if ts == 0 { "A" } else { "B" };
//!     for m in mechanism.process_event(Arc::new(Event::new(event_type, ts)))? {
//!         println!("{:?}", m.timestamps());
//!     }
//! }
//! # Ok::<(), tree_cep::core::CepError>(())
//! ```

pub mod core;
pub mod query_api;
