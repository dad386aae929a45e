// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluation mechanisms driving a pattern over an event stream.

pub mod tree_based_evaluation;

pub use tree_based_evaluation::TreeBasedEvaluationMechanism;
