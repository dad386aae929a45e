// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plan invariants.
//!
//! A greedy builder makes one choice per position of the order. Each choice holds
//! as long as the chosen argument is still no more expensive than every argument it
//! was preferred over; while all choices hold, rebuilding would yield the same plan.

use super::left_deep_builders::{greedy_order, greedy_weight, positive_arrival_rates, GreedyStep};
use super::tree_plan::{TreePlan, TreePlanNode};
use super::tree_plan_builder::{
    add_negative_part, left_deep_topology, TreePlanBuilder, TreePlanBuilderType,
};
use crate::core::error::CepResult;
use crate::core::statistics::{selectivity_matrix, Statistics};
use crate::query_api::Pattern;

/// One recorded greedy choice
#[derive(Debug, Clone, PartialEq)]
pub struct Invariant {
    step: GreedyStep,
}

impl Invariant {
    pub fn new(step: GreedyStep) -> Self {
        Self { step }
    }

    pub fn step(&self) -> &GreedyStep {
        &self.step
    }

    fn is_violated(&self, rates: &[f64], selectivity: Option<&[Vec<f64>]>) -> bool {
        let step = &self.step;
        let chosen = greedy_weight(rates, selectivity, &step.prefix, step.chosen);
        step.alternatives
            .iter()
            .any(|&alternative| greedy_weight(rates, selectivity, &step.prefix, alternative) < chosen)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvariantSet {
    invariants: Vec<Invariant>,
}

impl InvariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, invariant: Invariant) {
        self.invariants.push(invariant);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    /// Whether any recorded choice would be made differently under `statistics`
    pub fn is_invariants_violated(&self, statistics: &Statistics, pattern: &Pattern) -> CepResult<bool> {
        let rates = positive_arrival_rates(statistics, pattern)?;
        let selectivity = selectivity_matrix(statistics);
        Ok(self
            .invariants
            .iter()
            .any(|invariant| invariant.is_violated(rates, selectivity)))
    }
}

/// Greedy left-deep builder that also reports the invariants of its choices
#[derive(Debug, Clone, Copy, Default)]
pub struct InvariantAwareGreedyTreeBuilder;

impl InvariantAwareGreedyTreeBuilder {
    pub fn new() -> Self {
        Self
    }

    fn greedy_topology(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<(TreePlanNode, InvariantSet)> {
        let steps = greedy_order(statistics, pattern)?;
        let order: Vec<usize> = steps.iter().map(|step| step.chosen).collect();
        let mut invariants = InvariantSet::new();
        for step in steps {
            // the last choice has no alternative left
            if !step.alternatives.is_empty() {
                invariants.add(Invariant::new(step));
            }
        }
        Ok((left_deep_topology(&order, pattern)?, invariants))
    }
}

impl TreePlanBuilder for InvariantAwareGreedyTreeBuilder {
    fn kind(&self) -> TreePlanBuilderType {
        TreePlanBuilderType::InvariantAwareGreedyLeftDeepTree
    }

    fn create_tree_topology(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<TreePlanNode> {
        Ok(self.greedy_topology(statistics, pattern)?.0)
    }

    fn build_tree_plan_with_invariants(
        &self,
        statistics: &Statistics,
        pattern: &Pattern,
    ) -> CepResult<(TreePlan, Option<InvariantSet>)> {
        let (positive, invariants) = self.greedy_topology(statistics, pattern)?;
        let plan = TreePlan::new(add_negative_part(positive, pattern)?);
        Ok((plan, Some(invariants)))
    }
}
