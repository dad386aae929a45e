// SPDX-License-Identifier: MIT OR Apache-2.0

//! Left-deep tree plan builders.
//!
//! Each builder picks an order of the positive arguments and nests them left-deep:
//! `(((a0 op a1) op a2) op a3)`.

use super::tree_plan::TreePlanNode;
use super::tree_plan_builder::{left_deep_topology, TreePlanBuilder, TreePlanBuilderType};
use crate::core::error::{CepError, CepResult};
use crate::core::statistics::{arrival_rates, selectivity_matrix, Statistics, StatisticsKind};
use crate::query_api::Pattern;

/// Arguments in declaration order. Needs no statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialLeftDeepTreeBuilder;

impl TrivialLeftDeepTreeBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl TreePlanBuilder for TrivialLeftDeepTreeBuilder {
    fn kind(&self) -> TreePlanBuilderType {
        TreePlanBuilderType::TrivialLeftDeepTree
    }

    fn create_tree_topology(
        &self,
        _statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<TreePlanNode> {
        let order: Vec<usize> = (0..pattern.positive_arg_count()).collect();
        left_deep_topology(&order, pattern)
    }
}

/// Arguments by ascending arrival rate, rarest first
#[derive(Debug, Clone, Copy, Default)]
pub struct SortByFrequencyTreeBuilder;

impl SortByFrequencyTreeBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl TreePlanBuilder for SortByFrequencyTreeBuilder {
    fn kind(&self) -> TreePlanBuilderType {
        TreePlanBuilderType::SortByFrequencyLeftDeepTree
    }

    fn create_tree_topology(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<TreePlanNode> {
        let rates = positive_arrival_rates(statistics, pattern)?;
        let mut order: Vec<usize> = (0..rates.len()).collect();
        order.sort_by(|a, b| rates[*a].total_cmp(&rates[*b]));
        left_deep_topology(&order, pattern)
    }
}

/// Repeatedly appends the argument adding the fewest intermediate results
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyLeftDeepTreeBuilder;

impl GreedyLeftDeepTreeBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl TreePlanBuilder for GreedyLeftDeepTreeBuilder {
    fn kind(&self) -> TreePlanBuilderType {
        TreePlanBuilderType::GreedyLeftDeepTree
    }

    fn create_tree_topology(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<TreePlanNode> {
        let order = greedy_order(statistics, pattern)?
            .into_iter()
            .map(|step| step.chosen)
            .collect::<Vec<_>>();
        left_deep_topology(&order, pattern)
    }
}

/// Arrival rates of the positive arguments
pub(crate) fn positive_arrival_rates<'a>(
    statistics: &'a Statistics,
    pattern: &Pattern,
) -> CepResult<&'a [f64]> {
    let rates = arrival_rates(statistics)?;
    let count = pattern.positive_arg_count();
    if rates.len() < count {
        return Err(CepError::statistics_mismatch(
            StatisticsKind::ArrivalRates.as_str(),
            format!("{} arrival rates for {} positive arguments", rates.len(), count),
        ));
    }
    Ok(&rates[..count])
}

/// One decision of the greedy algorithm: `chosen` was preferred over every
/// argument in `alternatives`, given the arguments already in `prefix`.
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyStep {
    pub prefix: Vec<usize>,
    pub chosen: usize,
    pub alternatives: Vec<usize>,
}

/// Weight of appending `candidate` after `prefix`: its rate times its own
/// selectivity and the selectivities towards every argument already placed.
pub(crate) fn greedy_weight(
    rates: &[f64],
    selectivity: Option<&[Vec<f64>]>,
    prefix: &[usize],
    candidate: usize,
) -> f64 {
    let sel = |a: usize, b: usize| {
        selectivity
            .and_then(|matrix| matrix.get(a))
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(1.0)
    };
    prefix
        .iter()
        .fold(rates[candidate] * sel(candidate, candidate), |weight, &k| {
            weight * sel(k, candidate)
        })
}

/// Greedy order of the positive arguments, with every choice it made
pub(crate) fn greedy_order(statistics: &Statistics, pattern: &Pattern) -> CepResult<Vec<GreedyStep>> {
    let rates = positive_arrival_rates(statistics, pattern)?;
    let selectivity = selectivity_matrix(statistics);
    let mut remaining: Vec<usize> = (0..rates.len()).collect();
    let mut prefix = Vec::with_capacity(rates.len());
    let mut steps = Vec::with_capacity(rates.len());

    while !remaining.is_empty() {
        let mut best_position = 0;
        let mut best_weight = f64::INFINITY;
        for (position, &candidate) in remaining.iter().enumerate() {
            let weight = greedy_weight(rates, selectivity, &prefix, candidate);
            if weight < best_weight {
                best_weight = weight;
                best_position = position;
            }
        }
        let chosen = remaining.remove(best_position);
        steps.push(GreedyStep {
            prefix: prefix.clone(),
            chosen,
            alternatives: remaining.clone(),
        });
        prefix.push(chosen);
    }
    Ok(steps)
}
