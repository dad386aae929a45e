// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern definition types.
//!
//! Patterns are assembled programmatically; no pattern language is parsed here.

pub mod consumption_policy;
pub mod formula;
pub mod pattern;
pub mod pattern_structure;

pub use consumption_policy::{ConsumptionPolicies, ContiguousSpec, Mechanism, SingleTypes};
pub use formula::{Bindings, CompositeFormula, Condition, Operand, RelOp};
pub use pattern::Pattern;
pub use pattern_structure::{PatternStructure, PrimitiveEventDefinition, TopOperator};
