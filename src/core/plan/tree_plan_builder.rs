// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree plan builders turn a pattern and a statistics snapshot into a [`TreePlan`].
//!
//! Builders only order the positive arguments. Negated arguments are always stacked
//! on top of the positive part, one negation node each, in argument order.

use super::cost_model::{create_cost_model, TreeCostModelType};
use super::invariants::{InvariantAwareGreedyTreeBuilder, InvariantSet};
use super::iterative_improvement::LocalSearchTreeBuilder;
use super::left_deep_builders::{
    GreedyLeftDeepTreeBuilder, SortByFrequencyTreeBuilder, TrivialLeftDeepTreeBuilder,
};
use super::tree_plan::{OperatorType, TreePlan, TreePlanNode};
use crate::core::config::IterativeImprovementConfig;
use crate::core::error::{CepError, CepResult};
use crate::core::statistics::Statistics;
use crate::query_api::{Pattern, TopOperator};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TreePlanBuilderType {
    #[default]
    TrivialLeftDeepTree,
    SortByFrequencyLeftDeepTree,
    GreedyLeftDeepTree,
    LocalSearchLeftDeepTree,
    InvariantAwareGreedyLeftDeepTree,
}

impl TreePlanBuilderType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TreePlanBuilderType::TrivialLeftDeepTree => "trivial-left-deep-tree",
            TreePlanBuilderType::SortByFrequencyLeftDeepTree => "sort-by-frequency-left-deep-tree",
            TreePlanBuilderType::GreedyLeftDeepTree => "greedy-left-deep-tree",
            TreePlanBuilderType::LocalSearchLeftDeepTree => "local-search-left-deep-tree",
            TreePlanBuilderType::InvariantAwareGreedyLeftDeepTree => {
                "invariant-aware-greedy-left-deep-tree"
            }
        }
    }

    /// Whether plans of this kind are computed from statistics
    #[inline]
    pub const fn requires_statistics(&self) -> bool {
        !matches!(self, TreePlanBuilderType::TrivialLeftDeepTree)
    }
}

impl FromStr for TreePlanBuilderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trivial-left-deep-tree" => Ok(TreePlanBuilderType::TrivialLeftDeepTree),
            "sort-by-frequency-left-deep-tree" => {
                Ok(TreePlanBuilderType::SortByFrequencyLeftDeepTree)
            }
            "greedy-left-deep-tree" => Ok(TreePlanBuilderType::GreedyLeftDeepTree),
            "local-search-left-deep-tree" => Ok(TreePlanBuilderType::LocalSearchLeftDeepTree),
            "invariant-aware-greedy-left-deep-tree" => {
                Ok(TreePlanBuilderType::InvariantAwareGreedyLeftDeepTree)
            }
            _ => Err(format!("Unknown tree plan builder type '{}'", s)),
        }
    }
}

pub trait TreePlanBuilder: Debug + Send + Sync {
    fn kind(&self) -> TreePlanBuilderType;

    /// Shape of the positive part of the plan
    fn create_tree_topology(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<TreePlanNode>;

    fn build_tree_plan(&self, statistics: &Statistics, pattern: &Pattern) -> CepResult<TreePlan> {
        let positive = self.create_tree_topology(statistics, pattern)?;
        Ok(TreePlan::new(add_negative_part(positive, pattern)?))
    }

    /// The plan together with the conditions under which it stays the builder's choice.
    ///
    /// Builders that record no such conditions return `None`.
    fn build_tree_plan_with_invariants(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<(TreePlan, Option<InvariantSet>)> {
        Ok((self.build_tree_plan(statistics, pattern)?, None))
    }
}

/// Create a builder of the given kind scoring plans with the given cost model
pub fn create_tree_plan_builder(
    kind: TreePlanBuilderType,
    cost_model_type: TreeCostModelType,
    iterative_improvement: &IterativeImprovementConfig,
) -> Arc<dyn TreePlanBuilder> {
    match kind {
        TreePlanBuilderType::TrivialLeftDeepTree => Arc::new(TrivialLeftDeepTreeBuilder::new()),
        TreePlanBuilderType::SortByFrequencyLeftDeepTree => {
            Arc::new(SortByFrequencyTreeBuilder::new())
        }
        TreePlanBuilderType::GreedyLeftDeepTree => Arc::new(GreedyLeftDeepTreeBuilder::new()),
        TreePlanBuilderType::LocalSearchLeftDeepTree => Arc::new(LocalSearchTreeBuilder::new(
            create_cost_model(cost_model_type),
            iterative_improvement.clone(),
        )),
        TreePlanBuilderType::InvariantAwareGreedyLeftDeepTree => {
            Arc::new(InvariantAwareGreedyTreeBuilder::new())
        }
    }
}

/// Operator joining two positive parts of the pattern
fn positive_operator(pattern: &Pattern) -> CepResult<OperatorType> {
    match pattern.positive_structure().top_operator() {
        TopOperator::Seq => Ok(OperatorType::Seq),
        TopOperator::And => Ok(OperatorType::And),
        other => Err(CepError::invalid_pattern(format!(
            "unsupported binary operator {:?}",
            other
        ))),
    }
}

/// A plan node joining two subtrees; a negated argument on the right makes it a
/// negation node.
pub fn instantiate_binary_node(
    pattern: &Pattern,
    left: TreePlanNode,
    right: TreePlanNode,
) -> CepResult<TreePlanNode> {
    let mut operator = positive_operator(pattern)?;
    if let TreePlanNode::Leaf { event_index } = right {
        if event_index >= pattern.positive_arg_count() {
            operator = match operator {
                OperatorType::And => OperatorType::NegativeAnd,
                _ => OperatorType::NegativeSeq,
            };
        }
    }
    Ok(TreePlanNode::binary(operator, left, right))
}

/// Left-deep tree over the positive arguments in the given order
pub fn left_deep_topology(order: &[usize], pattern: &Pattern) -> CepResult<TreePlanNode> {
    let Some((&first, rest)) = order.split_first() else {
        return Err(CepError::invalid_pattern("pattern has no positive argument"));
    };
    let mut topology = TreePlanNode::leaf(first);
    for &index in rest {
        topology = instantiate_binary_node(pattern, topology, TreePlanNode::leaf(index))?;
    }
    Ok(topology)
}

/// Stack one negation node per negated argument on top of the positive part
pub fn add_negative_part(positive: TreePlanNode, pattern: &Pattern) -> CepResult<TreePlanNode> {
    let mut topology = positive;
    for index in pattern.positive_arg_count()..pattern.arg_count() {
        topology = instantiate_binary_node(pattern, topology, TreePlanNode::leaf(index))?;
    }
    Ok(topology)
}
