// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod config;
pub mod error;
pub mod evaluation;
pub mod event;
pub mod optimizer;
pub mod parallel;
pub mod plan;
pub mod statistics;
pub mod tree;
pub mod util;

pub use error::{CepError, CepResult};
pub use evaluation::TreeBasedEvaluationMechanism;
