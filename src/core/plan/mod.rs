// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree plans and the builders choosing them.

pub mod cost_model;
pub mod invariants;
pub mod iterative_improvement;
pub mod left_deep_builders;
pub mod tree_plan;
pub mod tree_plan_builder;

pub use cost_model::{
    create_cost_model, IntermediateResultsTreeCostModel, TreeCostModel, TreeCostModelType,
};
pub use invariants::{Invariant, InvariantAwareGreedyTreeBuilder, InvariantSet};
pub use iterative_improvement::{
    IterativeImprovementInitType, IterativeImprovementType, LocalSearchTreeBuilder,
};
pub use left_deep_builders::{
    GreedyLeftDeepTreeBuilder, GreedyStep, SortByFrequencyTreeBuilder, TrivialLeftDeepTreeBuilder,
};
pub use tree_plan::{OperatorType, TreePlan, TreePlanNode};
pub use tree_plan_builder::{create_tree_plan_builder, TreePlanBuilder, TreePlanBuilderType};
