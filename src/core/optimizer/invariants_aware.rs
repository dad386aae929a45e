// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{build_non_prior_tree_plan_builder, Optimizer, OptimizerType};
use crate::core::error::CepResult;
use crate::core::plan::{InvariantSet, TreeCostModelType, TreePlan, TreePlanBuilder, TreePlanBuilderType};
use crate::core::statistics::Statistics;
use crate::query_api::Pattern;
use std::sync::Arc;

/// Asks for a new plan when no invariants are known or one of them is violated
#[derive(Debug)]
pub struct InvariantsAwareOptimizer {
    tree_plan_builder: Arc<dyn TreePlanBuilder>,
    invariants: Option<InvariantSet>,
}

impl InvariantsAwareOptimizer {
    pub fn new(tree_plan_builder: Arc<dyn TreePlanBuilder>) -> Self {
        Self {
            tree_plan_builder,
            invariants: None,
        }
    }

    pub fn invariants(&self) -> Option<&InvariantSet> {
        self.invariants.as_ref()
    }
}

impl Optimizer for InvariantsAwareOptimizer {
    fn kind(&self) -> OptimizerType {
        OptimizerType::InvariantsAware
    }

    fn is_need_optimize(&self, statistics: &Statistics, pattern: &Pattern) -> CepResult<bool> {
        match &self.invariants {
            None => Ok(true),
            Some(invariants) => {
                let violated = invariants.is_invariants_violated(statistics, pattern)?;
                if violated {
                    log::debug!("plan invariant violated");
                }
                Ok(violated)
            }
        }
    }

    fn build_new_tree_plan_with(
        &mut self,
        statistics: &Statistics,
        pattern: &Pattern,
        builder: &dyn TreePlanBuilder,
    ) -> CepResult<TreePlan> {
        let (plan, invariants) = builder.build_tree_plan_with_invariants(statistics, pattern)?;
        self.invariants = invariants;
        Ok(plan)
    }

    fn tree_plan_builder(&self) -> Arc<dyn TreePlanBuilder> {
        Arc::clone(&self.tree_plan_builder)
    }

    /// The non-prior plan records no invariants, so the first tick re-optimises
    fn build_initial_tree_plan(
        &mut self,
        statistics: &Statistics,
        cost_model_type: TreeCostModelType,
        pattern: &Pattern,
        default_kind: TreePlanBuilderType,
    ) -> CepResult<TreePlan> {
        match build_non_prior_tree_plan_builder(cost_model_type, pattern, default_kind)? {
            Some(builder) => builder.build_tree_plan(statistics, pattern),
            None => self.build_new_tree_plan(statistics, pattern),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::InvariantAwareGreedyTreeBuilder;
    use crate::core::statistics::{StatisticValue, StatisticsKind};
    use crate::query_api::{CompositeFormula, PatternStructure};

    fn pattern() -> Pattern {
        Pattern::new(
            PatternStructure::and(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
                PatternStructure::primitive("C", "c"),
            ]),
            CompositeFormula::new(),
            1000,
        )
        .unwrap()
    }

    fn rates(values: Vec<f64>) -> Statistics {
        let mut statistics = Statistics::new();
        statistics.insert(
            StatisticsKind::ArrivalRates,
            StatisticValue::ArrivalRates(values),
        );
        statistics
    }

    #[test]
    fn test_reoptimizes_only_on_violation() {
        let mut optimizer = InvariantsAwareOptimizer::new(Arc::new(InvariantAwareGreedyTreeBuilder::new()));
        let initial = optimizer
            .build_initial_tree_plan(
                &rates(vec![3.0, 1.0, 2.0]),
                TreeCostModelType::default(),
                &pattern(),
                TreePlanBuilderType::TrivialLeftDeepTree,
            )
            .unwrap();
        assert_eq!(initial.leaf_order(), vec![0, 1, 2]);
        assert!(optimizer.invariants().is_none());
        assert!(optimizer.is_need_optimize(&rates(vec![3.0, 1.0, 2.0]), &pattern()).unwrap());

        let plan = optimizer
            .build_new_tree_plan(&rates(vec![3.0, 1.0, 2.0]), &pattern())
            .unwrap();
        assert_eq!(plan.leaf_order(), vec![1, 2, 0]);
        assert_eq!(optimizer.invariants().map(|i| i.len()), Some(2));
        assert!(!optimizer.is_need_optimize(&rates(vec![6.0, 1.0, 4.0]), &pattern()).unwrap());
        assert!(optimizer.is_need_optimize(&rates(vec![3.0, 2.0, 1.0]), &pattern()).unwrap());
    }
}
