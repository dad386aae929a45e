// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Optimizer, OptimizerType};
use crate::core::error::CepResult;
use crate::core::plan::{TreePlan, TreePlanBuilder};
use crate::core::statistics::Statistics;
use crate::query_api::Pattern;
use std::sync::Arc;

/// Always asks for a new plan, ignoring the statistics
#[derive(Debug)]
pub struct TrivialOptimizer {
    tree_plan_builder: Arc<dyn TreePlanBuilder>,
}

impl TrivialOptimizer {
    pub fn new(tree_plan_builder: Arc<dyn TreePlanBuilder>) -> Self {
        Self { tree_plan_builder }
    }
}

impl Optimizer for TrivialOptimizer {
    fn kind(&self) -> OptimizerType {
        OptimizerType::Trivial
    }

    fn is_need_optimize(&self, _statistics: &Statistics, _pattern: &Pattern) -> CepResult<bool> {
        Ok(true)
    }

    fn build_new_tree_plan_with(
        &mut self,
        statistics: &Statistics,
        pattern: &Pattern,
        builder: &dyn TreePlanBuilder,
    ) -> CepResult<TreePlan> {
        builder.build_tree_plan(statistics, pattern)
    }

    fn tree_plan_builder(&self) -> Arc<dyn TreePlanBuilder> {
        Arc::clone(&self.tree_plan_builder)
    }
}
