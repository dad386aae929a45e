// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local search over left-deep argument orders.
//!
//! Starting from a random or greedy order, the search repeatedly moves to the
//! cheapest neighbouring order until no neighbour improves on the current one or
//! the step budget runs out.

use super::cost_model::TreeCostModel;
use super::left_deep_builders::{greedy_order, positive_arrival_rates};
use super::tree_plan::TreePlanNode;
use super::tree_plan_builder::{left_deep_topology, TreePlanBuilder, TreePlanBuilderType};
use crate::core::config::IterativeImprovementConfig;
use crate::core::error::CepResult;
use crate::core::statistics::Statistics;
use crate::query_api::Pattern;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Neighbourhood explored at each step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterativeImprovementType {
    /// Exchange the arguments at two positions
    #[default]
    SwapBased,
    /// Move one argument to another position, shifting the ones in between
    CircleBased,
}

impl FromStr for IterativeImprovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "swap-based" => Ok(IterativeImprovementType::SwapBased),
            "circle-based" => Ok(IterativeImprovementType::CircleBased),
            _ => Err(format!(
                "Invalid iterative improvement type '{}'. Valid values: 'swap-based', 'circle-based'",
                s
            )),
        }
    }
}

/// Starting point of the search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IterativeImprovementInitType {
    #[default]
    Random,
    Greedy,
}

impl FromStr for IterativeImprovementInitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(IterativeImprovementInitType::Random),
            "greedy" => Ok(IterativeImprovementInitType::Greedy),
            _ => Err(format!(
                "Invalid iterative improvement init type '{}'. Valid values: 'random', 'greedy'",
                s
            )),
        }
    }
}

fn neighbours(order: &[usize], kind: IterativeImprovementType) -> Vec<Vec<usize>> {
    let n = order.len();
    let mut result = Vec::new();
    for i in 0..n {
        for j in 0..n {
            match kind {
                IterativeImprovementType::SwapBased if i < j => {
                    let mut next = order.to_vec();
                    next.swap(i, j);
                    result.push(next);
                }
                IterativeImprovementType::CircleBased if i != j => {
                    let mut next = order.to_vec();
                    let moved = next.remove(i);
                    next.insert(j, moved);
                    result.push(next);
                }
                _ => {}
            }
        }
    }
    result
}

/// Left-deep builder refining an initial order by iterative improvement
#[derive(Debug)]
pub struct LocalSearchTreeBuilder {
    cost_model: Arc<dyn TreeCostModel>,
    config: IterativeImprovementConfig,
}

impl LocalSearchTreeBuilder {
    pub fn new(cost_model: Arc<dyn TreeCostModel>, config: IterativeImprovementConfig) -> Self {
        Self { cost_model, config }
    }

    fn initial_order(&self, statistics: &Statistics, pattern: &Pattern) -> CepResult<Vec<usize>> {
        match self.config.init {
            IterativeImprovementInitType::Greedy => Ok(greedy_order(statistics, pattern)?
                .into_iter()
                .map(|step| step.chosen)
                .collect()),
            IterativeImprovementInitType::Random => {
                let mut order: Vec<usize> = (0..pattern.positive_arg_count()).collect();
                let mut rng = match self.config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                order.shuffle(&mut rng);
                Ok(order)
            }
        }
    }

    fn order_cost(&self, order: &[usize], statistics: &Statistics, pattern: &Pattern) -> CepResult<f64> {
        let topology = left_deep_topology(order, pattern)?;
        self.cost_model.get_plan_cost(pattern, &topology, statistics)
    }
}

impl TreePlanBuilder for LocalSearchTreeBuilder {
    fn kind(&self) -> TreePlanBuilderType {
        TreePlanBuilderType::LocalSearchLeftDeepTree
    }

    fn create_tree_topology(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<TreePlanNode> {
        // fail early on missing statistics, whatever the init type
        positive_arrival_rates(statistics, pattern)?;

        let mut order = self.initial_order(statistics, pattern)?;
        let mut cost = self.order_cost(&order, statistics, pattern)?;
        for _ in 0..self.config.max_steps {
            let mut best: Option<(Vec<usize>, f64)> = None;
            for candidate in neighbours(&order, self.config.kind) {
                let candidate_cost = self.order_cost(&candidate, statistics, pattern)?;
                if candidate_cost < best.as_ref().map_or(cost, |(_, c)| *c) {
                    best = Some((candidate, candidate_cost));
                }
            }
            match best {
                Some((next, next_cost)) => {
                    order = next;
                    cost = next_cost;
                }
                None => break,
            }
        }
        log::trace!("local search settled on order {:?} with cost {}", order, cost);
        left_deep_topology(&order, pattern)
    }
}
