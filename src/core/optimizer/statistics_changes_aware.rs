// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Optimizer, OptimizerType};
use crate::core::error::{CepError, CepResult};
use crate::core::plan::{TreePlan, TreePlanBuilder};
use crate::core::statistics::{ChangesAwareTester, Statistics, StatisticsKind};
use crate::query_api::Pattern;
use std::collections::HashMap;
use std::sync::Arc;

/// Asks for a new plan once some statistic changed by more than a factor `t`
/// relative to the snapshot the current plan was built from.
///
/// What "changed by `t`" means is up to the tester registered for each kind.
#[derive(Debug)]
pub struct StatisticsChangesAwareOptimizer {
    tree_plan_builder: Arc<dyn TreePlanBuilder>,
    prev_statistics: Option<Statistics>,
    testers: HashMap<StatisticsKind, Box<dyn ChangesAwareTester>>,
}

impl StatisticsChangesAwareOptimizer {
    pub fn new(
        tree_plan_builder: Arc<dyn TreePlanBuilder>,
        testers: HashMap<StatisticsKind, Box<dyn ChangesAwareTester>>,
    ) -> Self {
        Self {
            tree_plan_builder,
            prev_statistics: None,
            testers,
        }
    }

    /// Snapshot the last plan was built from
    pub fn prev_statistics(&self) -> Option<&Statistics> {
        self.prev_statistics.as_ref()
    }
}

impl Optimizer for StatisticsChangesAwareOptimizer {
    fn kind(&self) -> OptimizerType {
        OptimizerType::StatisticsChangesAware
    }

    fn is_need_optimize(&self, statistics: &Statistics, _pattern: &Pattern) -> CepResult<bool> {
        let prev = self
            .prev_statistics
            .as_ref()
            .ok_or_else(|| CepError::missing_statistics("previous snapshot"))?;
        for (kind, value) in statistics {
            let previous = prev
                .get(kind)
                .ok_or_else(|| CepError::missing_statistics(kind.as_str()))?;
            let tester = self.testers.get(kind).ok_or_else(|| {
                CepError::missing_statistics(format!("{} (no changes tester)", kind))
            })?;
            if tester.is_changed_by_t(value, previous)? {
                log::debug!("statistic '{}' changed beyond threshold", kind);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn build_new_tree_plan_with(
        &mut self,
        statistics: &Statistics,
        pattern: &Pattern,
        builder: &dyn TreePlanBuilder,
    ) -> CepResult<TreePlan> {
        self.prev_statistics = Some(statistics.clone());
        builder.build_tree_plan(statistics, pattern)
    }

    fn tree_plan_builder(&self) -> Arc<dyn TreePlanBuilder> {
        Arc::clone(&self.tree_plan_builder)
    }
}
