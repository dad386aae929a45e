// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cost models scoring tree plans against a statistics snapshot.

use super::tree_plan::TreePlanNode;
use crate::core::error::{CepError, CepResult};
use crate::core::statistics::{arrival_rates, selectivity_matrix, Statistics, StatisticsKind};
use crate::query_api::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TreeCostModelType {
    #[default]
    #[serde(rename = "intermediate-results")]
    IntermediateResultsTreeCostModel,
}

impl TreeCostModelType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TreeCostModelType::IntermediateResultsTreeCostModel => "intermediate-results",
        }
    }
}

impl FromStr for TreeCostModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "intermediate-results" => Ok(TreeCostModelType::IntermediateResultsTreeCostModel),
            _ => Err(format!(
                "Invalid tree cost model '{}'. Valid values: 'intermediate-results'",
                s
            )),
        }
    }
}

pub trait TreeCostModel: Debug + Send + Sync {
    fn get_plan_cost(
        &self,
        pattern: &Pattern,
        plan: &TreePlanNode,
        statistics: &Statistics,
    ) -> CepResult<f64>;
}

pub fn create_cost_model(kind: TreeCostModelType) -> Arc<dyn TreeCostModel> {
    match kind {
        TreeCostModelType::IntermediateResultsTreeCostModel => {
            Arc::new(IntermediateResultsTreeCostModel)
        }
    }
}

/// Expected number of partial matches held by every node of the plan, summed.
///
/// A positive leaf holds `rate * window * sel[i][i]` matches; an internal node holds
/// the product of its children times the selectivities between their arguments.
/// Negated leaves only filter: they hold nothing and leave their sibling's count as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntermediateResultsTreeCostModel;

struct CostInputs<'a> {
    rates: &'a [f64],
    selectivity: Option<&'a [Vec<f64>]>,
    window_seconds: f64,
    positive_args: usize,
}

impl CostInputs<'_> {
    fn selectivity(&self, a: usize, b: usize) -> f64 {
        if a >= self.positive_args || b >= self.positive_args {
            return 1.0;
        }
        self.selectivity
            .and_then(|matrix| matrix.get(a))
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(1.0)
    }

    /// Returns the node's match count and positive leaves, adding every node's count to `total`
    fn node_cost(&self, node: &TreePlanNode, total: &mut f64) -> (f64, Vec<usize>) {
        match node {
            TreePlanNode::Leaf { event_index } => {
                let i = *event_index;
                if i >= self.positive_args {
                    return (1.0, Vec::new());
                }
                let count = self.rates[i] * self.window_seconds * self.selectivity(i, i);
                *total += count;
                (count, vec![i])
            }
            TreePlanNode::Binary {
                operator,
                left,
                right,
            } => {
                let (left_count, mut left_leaves) = self.node_cost(left, total);
                let (right_count, right_leaves) = self.node_cost(right, total);
                let mut count = left_count * right_count;
                if !operator.is_negative() {
                    for &a in &left_leaves {
                        for &b in &right_leaves {
                            count *= self.selectivity(a, b);
                        }
                    }
                }
                *total += count;
                left_leaves.extend(right_leaves);
                (count, left_leaves)
            }
        }
    }
}

impl TreeCostModel for IntermediateResultsTreeCostModel {
    fn get_plan_cost(
        &self,
        pattern: &Pattern,
        plan: &TreePlanNode,
        statistics: &Statistics,
    ) -> CepResult<f64> {
        let rates = arrival_rates(statistics)?;
        let positive_args = pattern.positive_arg_count();
        if rates.len() < positive_args {
            return Err(CepError::statistics_mismatch(
                StatisticsKind::ArrivalRates.as_str(),
                format!(
                    "{} arrival rates for {} positive arguments",
                    rates.len(),
                    positive_args
                ),
            ));
        }
        let inputs = CostInputs {
            rates,
            selectivity: selectivity_matrix(statistics),
            window_seconds: pattern.window_ms as f64 / 1000.0,
            positive_args,
        };
        let mut total = 0.0;
        inputs.node_cost(plan, &mut total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::tree_plan::OperatorType;
    use crate::core::statistics::StatisticValue;
    use crate::query_api::{CompositeFormula, PatternStructure};

    fn pattern() -> Pattern {
        Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
                PatternStructure::primitive("C", "c"),
            ]),
            CompositeFormula::new(),
            1000,
        )
        .unwrap()
    }

    fn statistics(rates: Vec<f64>) -> Statistics {
        let mut statistics = Statistics::new();
        statistics.insert(
            StatisticsKind::ArrivalRates,
            StatisticValue::ArrivalRates(rates),
        );
        statistics
    }

    fn left_deep(order: [usize; 3]) -> TreePlanNode {
        TreePlanNode::binary(
            OperatorType::Seq,
            TreePlanNode::binary(
                OperatorType::Seq,
                TreePlanNode::leaf(order[0]),
                TreePlanNode::leaf(order[1]),
            ),
            TreePlanNode::leaf(order[2]),
        )
    }

    #[test]
    fn test_rare_events_first_is_cheaper() {
        let model = IntermediateResultsTreeCostModel;
        let statistics = statistics(vec![10.0, 1.0, 2.0]);
        let frequent_first = model
            .get_plan_cost(&pattern(), &left_deep([0, 1, 2]), &statistics)
            .unwrap();
        let rare_first = model
            .get_plan_cost(&pattern(), &left_deep([1, 2, 0]), &statistics)
            .unwrap();
        // leaves 13, then 10 + 20 versus 2 + 20
        assert_eq!(frequent_first, 13.0 + 10.0 + 20.0);
        assert_eq!(rare_first, 13.0 + 2.0 + 20.0);
    }

    #[test]
    fn test_selectivity_scales_join_counts() {
        let model = IntermediateResultsTreeCostModel;
        let mut statistics = statistics(vec![2.0, 2.0, 2.0]);
        statistics.insert(
            StatisticsKind::SelectivityMatrix,
            StatisticValue::SelectivityMatrix(vec![
                vec![1.0, 0.5, 1.0],
                vec![0.5, 1.0, 1.0],
                vec![1.0, 1.0, 1.0],
            ]),
        );
        let cost = model
            .get_plan_cost(&pattern(), &left_deep([0, 1, 2]), &statistics)
            .unwrap();
        // leaves 6, (0,1) = 2 * 2 * 0.5, root = 2 * 2
        assert_eq!(cost, 6.0 + 2.0 + 4.0);
    }

    #[test]
    fn test_missing_rates() {
        let model = create_cost_model(TreeCostModelType::default());
        let result = model.get_plan_cost(&pattern(), &TreePlanNode::leaf(0), &Statistics::new());
        assert!(matches!(result, Err(CepError::MissingStatistics { .. })));

        let result = model.get_plan_cost(&pattern(), &TreePlanNode::leaf(0), &statistics(vec![1.0]));
        assert!(matches!(result, Err(CepError::StatisticsMismatch { .. })));
    }
}
