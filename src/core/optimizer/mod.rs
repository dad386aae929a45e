// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adaptive plan selection.
//!
//! An optimizer answers two questions on every statistics tick: should the current
//! tree plan be replaced, and if so, by what. The "what" is delegated to a
//! [`TreePlanBuilder`]; variants differ in how they decide the "should".
//!
//! ```text
//! statistics snapshot ──► is_need_optimize ──► build_new_tree_plan ──► TreePlan
//!                              ▲                        │
//!                              └──── state recorded ◄───┘
//! ```

mod invariants_aware;
mod statistics_changes_aware;
mod trivial;

pub use invariants_aware::InvariantsAwareOptimizer;
pub use statistics_changes_aware::StatisticsChangesAwareOptimizer;
pub use trivial::TrivialOptimizer;

use crate::core::config::EngineConfig;
use crate::core::error::{CepError, CepResult};
use crate::core::plan::{
    create_tree_plan_builder, TreeCostModelType, TreePlan, TreePlanBuilder, TreePlanBuilderType,
};
use crate::core::statistics::{default_changes_aware_testers, Statistics};
use crate::query_api::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerType {
    /// Rebuild on every tick
    #[default]
    Trivial,
    /// Rebuild when some statistic moved by more than the configured factor
    StatisticsChangesAware,
    /// Rebuild when a recorded plan invariant no longer holds
    InvariantsAware,
}

impl OptimizerType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OptimizerType::Trivial => "trivial",
            OptimizerType::StatisticsChangesAware => "statistics-changes-aware",
            OptimizerType::InvariantsAware => "invariants-aware",
        }
    }
}

impl fmt::Display for OptimizerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trivial" => Ok(OptimizerType::Trivial),
            "statistics-changes-aware" => Ok(OptimizerType::StatisticsChangesAware),
            "invariants-aware" => Ok(OptimizerType::InvariantsAware),
            _ => Err(format!(
                "Invalid optimizer type '{}'. Valid values: 'trivial', 'statistics-changes-aware', 'invariants-aware'",
                s
            )),
        }
    }
}

pub trait Optimizer: Debug + Send {
    fn kind(&self) -> OptimizerType;

    /// Whether [`build_new_tree_plan`](Self::build_new_tree_plan) should be called.
    /// Never changes the optimizer state.
    fn is_need_optimize(&self, statistics: &Statistics, pattern: &Pattern) -> CepResult<bool>;

    /// Build a plan with `builder` instead of the configured one, recording the
    /// state the next decision needs.
    fn build_new_tree_plan_with(
        &mut self,
        statistics: &Statistics,
        pattern: &Pattern,
        builder: &dyn TreePlanBuilder,
    ) -> CepResult<TreePlan>;

    /// The configured builder
    fn tree_plan_builder(&self) -> Arc<dyn TreePlanBuilder>;

    fn build_new_tree_plan(&mut self, statistics: &Statistics, pattern: &Pattern) -> CepResult<TreePlan> {
        let builder = self.tree_plan_builder();
        self.build_new_tree_plan_with(statistics, pattern, builder.as_ref())
    }

    /// First plan of a pattern.
    ///
    /// Without prior statistics on the pattern the plan comes from a builder that
    /// needs none; the configured builder is used for every later plan.
    fn build_initial_tree_plan(
        &mut self,
        statistics: &Statistics,
        cost_model_type: TreeCostModelType,
        pattern: &Pattern,
        default_kind: TreePlanBuilderType,
    ) -> CepResult<TreePlan> {
        match build_non_prior_tree_plan_builder(cost_model_type, pattern, default_kind)? {
            Some(builder) => self.build_new_tree_plan_with(statistics, pattern, builder.as_ref()),
            None => self.build_new_tree_plan(statistics, pattern),
        }
    }
}

/// Builder for patterns that carry no prior statistics, `None` when they do
pub fn build_non_prior_tree_plan_builder(
    cost_model_type: TreeCostModelType,
    pattern: &Pattern,
    default_kind: TreePlanBuilderType,
) -> CepResult<Option<Arc<dyn TreePlanBuilder>>> {
    if pattern.statistics.is_some() {
        return Ok(None);
    }
    match default_kind {
        TreePlanBuilderType::TrivialLeftDeepTree => Ok(Some(create_tree_plan_builder(
            default_kind,
            cost_model_type,
            &Default::default(),
        ))),
        other => Err(CepError::configuration_with_key(
            format!(
                "tree plan builder '{}' cannot build a plan without prior statistics",
                other.as_str()
            ),
            "default_tree_plan_builder",
        )),
    }
}

/// Create the optimizer selected by `config.optimizer.kind`
pub fn create_optimizer(config: &EngineConfig) -> Box<dyn Optimizer> {
    let builder = create_tree_plan_builder(
        config.optimizer.tree_plan_builder,
        config.default_cost_model,
        &config.iterative_improvement,
    );
    match config.optimizer.kind {
        OptimizerType::Trivial => Box::new(TrivialOptimizer::new(builder)),
        OptimizerType::StatisticsChangesAware => Box::new(StatisticsChangesAwareOptimizer::new(
            builder,
            default_changes_aware_testers(config.optimizer.changes_threshold),
        )),
        OptimizerType::InvariantsAware => {
            if builder.kind() != TreePlanBuilderType::InvariantAwareGreedyLeftDeepTree {
                log::warn!(
                    "invariants-aware optimizer over '{}' records no invariants and rebuilds on every tick",
                    builder.kind().as_str()
                );
            }
            Box::new(InvariantsAwareOptimizer::new(builder))
        }
    }
}
