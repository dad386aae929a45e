// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adaptive tree-based evaluation of a single pattern.
//!
//! The mechanism owns the active [`Tree`], a [`StatisticsCollector`] and an
//! [`Optimizer`]. Every `statistics_update_interval` events the optimizer is asked
//! whether the plan should change. A replacement tree is built off to the side, the
//! recently retained events are replayed into it with their output discarded (the
//! old tree already reported those matches), and only then does it replace the
//! active tree. In-flight partial matches are re-derived rather than transferred.

use crate::core::config::{EngineConfig, EvaluationMechanismType, MultiPatternEvaluationApproach};
use crate::core::error::{CepError, CepResult};
use crate::core::event::{PatternMatch, SharedEvent};
use crate::core::optimizer::{create_optimizer, Optimizer};
use crate::core::plan::TreePlan;
use crate::core::statistics::{Statistics, StatisticsCollector};
use crate::core::tree::{Tree, TreeParameters};
use crate::query_api::Pattern;
use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;

#[derive(Debug)]
pub struct TreeBasedEvaluationMechanism {
    pattern: Pattern,
    config: EngineConfig,
    params: TreeParameters,
    tree: Tree,
    optimizer: Box<dyn Optimizer>,
    collector: StatisticsCollector,
    /// Events recent enough to rebuild the state of a replacement tree
    retained: VecDeque<SharedEvent>,
    events_since_update: usize,
    plan_swaps: usize,
}

fn ensure_supported(config: &EngineConfig) -> CepResult<()> {
    match config.evaluation_mechanism_type {
        EvaluationMechanismType::TreeBased => {}
    }
    if config.multi_pattern_approach != MultiPatternEvaluationApproach::TrivialSharingLeaves {
        return Err(CepError::configuration_with_key(
            format!(
                "multi-pattern approach '{}' is not supported for single-pattern evaluation",
                config.multi_pattern_approach.as_str()
            ),
            "multi_pattern_approach",
        ));
    }
    if !config.parallel_execution_mode.is_supported() {
        return Err(CepError::configuration_with_key(
            format!(
                "parallel execution mode '{}' is not supported",
                config.parallel_execution_mode.as_str()
            ),
            "parallel_execution_mode",
        ));
    }
    Ok(())
}

impl TreeBasedEvaluationMechanism {
    pub fn new(pattern: Pattern, config: EngineConfig) -> CepResult<Self> {
        config.validate()?;
        ensure_supported(&config)?;

        let statistics_window = config
            .optimizer
            .statistics_time_window_ms
            .unwrap_or(pattern.window_ms);
        let collector = StatisticsCollector::for_pattern(&pattern, statistics_window);
        // prior statistics win; collected kinds fill the gaps so later comparisons see every kind
        let mut initial_statistics = collector.get_statistics();
        if let Some(prior) = &pattern.statistics {
            initial_statistics.extend(prior.clone());
        }

        let mut optimizer = create_optimizer(&config);
        let plan = optimizer.build_initial_tree_plan(
            &initial_statistics,
            config.default_cost_model,
            &pattern,
            config.default_tree_plan_builder,
        )?;
        let params = TreeParameters::from(&config);
        let tree = Tree::new(&plan, &pattern, &params)?;
        log::info!(
            "pattern {} evaluated by tree {} (plan {}, optimizer {})",
            pattern.full_structure(),
            tree.get_structure_summary(),
            plan,
            optimizer.kind()
        );

        Ok(Self {
            pattern,
            config,
            params,
            tree,
            optimizer,
            collector,
            retained: VecDeque::new(),
            events_since_update: 0,
            plan_swaps: 0,
        })
    }

    /// Feed one event and return the matches it completed
    pub fn process_event(&mut self, event: SharedEvent) -> CepResult<Vec<PatternMatch>> {
        self.collector.event_handler(&event);
        self.retain(event.clone());
        self.tree.handle_event(event)?;
        let matches = self.tree.get_matches();

        self.events_since_update += 1;
        if self.events_since_update >= self.config.optimizer.statistics_update_interval {
            self.events_since_update = 0;
            self.reoptimize()?;
        }
        Ok(matches)
    }

    /// End of stream: the matches still held back by the tree
    pub fn flush(&mut self) -> CepResult<Vec<PatternMatch>> {
        self.tree.get_last_matches()
    }

    /// Evaluate every event of `input` and forward the matches to `output`, until
    /// `input` disconnects. Stops early, without error, when `output` disconnects.
    pub fn eval(&mut self, input: Receiver<SharedEvent>, output: Sender<PatternMatch>) -> CepResult<()> {
        for event in input.iter() {
            for pattern_match in self.process_event(event)? {
                if output.send(pattern_match).is_err() {
                    log::warn!("match receiver disconnected, stopping evaluation");
                    return Ok(());
                }
            }
        }
        for pattern_match in self.flush()? {
            if output.send(pattern_match).is_err() {
                log::warn!("match receiver disconnected before the final matches were sent");
                break;
            }
        }
        Ok(())
    }

    /// Keep the events a stored or pending match (or an event negating one) may use.
    ///
    /// A live match starts within one window of the clock and a negated event may
    /// precede it by another window.
    fn retain(&mut self, event: SharedEvent) {
        let horizon = event
            .timestamp
            .saturating_sub(self.pattern.window_ms.saturating_mul(2));
        while self
            .retained
            .front()
            .is_some_and(|e| e.timestamp < horizon)
        {
            self.retained.pop_front();
        }
        self.retained.push_back(event);
    }

    fn reoptimize(&mut self) -> CepResult<()> {
        let statistics = self.collector.get_statistics();
        if !self.optimizer.is_need_optimize(&statistics, &self.pattern)? {
            log::debug!("optimizer keeps plan {}", self.tree.plan());
            return Ok(());
        }
        let plan = self.optimizer.build_new_tree_plan(&statistics, &self.pattern)?;
        if plan == *self.tree.plan() {
            log::debug!("optimizer rebuilt the current plan {}", plan);
            return Ok(());
        }
        self.swap_plan(plan)
    }

    fn swap_plan(&mut self, plan: TreePlan) -> CepResult<()> {
        let mut tree = Tree::new(&plan, &self.pattern, &self.params)?;
        for event in &self.retained {
            tree.handle_event(event.clone())?;
        }
        let replayed = tree.get_matches().len();
        log::info!(
            "plan {} replaced by {} ({} events replayed, {} matches already reported)",
            self.tree.plan(),
            plan,
            self.retained.len(),
            replayed
        );
        self.tree = tree;
        self.plan_swaps += 1;
        Ok(())
    }

    pub fn current_plan(&self) -> &TreePlan {
        self.tree.plan()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Number of times the active tree was replaced
    pub fn plan_swaps(&self) -> usize {
        self.plan_swaps
    }

    /// Current statistics snapshot
    pub fn statistics(&self) -> Statistics {
        self.collector.get_statistics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Event;
    use crate::core::optimizer::OptimizerType;
    use crate::core::parallel::ParallelExecutionMode;
    use crate::core::plan::TreePlanBuilderType;
    use crate::query_api::{CompositeFormula, PatternStructure};
    use std::sync::Arc;

    fn pattern() -> Pattern {
        Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
            ]),
            CompositeFormula::new(),
            100,
        )
        .unwrap()
    }

    fn event(event_type: &str, ts: i64) -> SharedEvent {
        Arc::new(Event::new(event_type, ts))
    }

    fn adaptive_config(interval: usize) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.optimizer.kind = OptimizerType::Trivial;
        config.optimizer.tree_plan_builder = TreePlanBuilderType::GreedyLeftDeepTree;
        config.optimizer.statistics_update_interval = interval;
        config
    }

    #[test]
    fn test_plan_swap_keeps_in_flight_state() {
        let mut mechanism = TreeBasedEvaluationMechanism::new(pattern(), adaptive_config(4)).unwrap();
        assert_eq!(mechanism.current_plan().leaf_order(), vec![0, 1]);

        let mut reported = Vec::new();
        for e in [event("A", 0), event("A", 1), event("A", 2), event("B", 3)] {
            reported.extend(mechanism.process_event(e).unwrap());
        }
        // B is rarer than A: the greedy plan starts with it
        assert_eq!(mechanism.plan_swaps(), 1);
        assert_eq!(mechanism.current_plan().leaf_order(), vec![1, 0]);
        assert_eq!(reported.len(), 3);

        reported.extend(mechanism.process_event(event("B", 4)).unwrap());
        reported.extend(mechanism.flush().unwrap());
        let timestamps: Vec<Vec<i64>> = reported.iter().map(|m| m.timestamps()).collect();
        assert_eq!(
            timestamps,
            vec![
                vec![0, 3],
                vec![1, 3],
                vec![2, 3],
                vec![0, 4],
                vec![1, 4],
                vec![2, 4]
            ]
        );
    }

    #[test]
    fn test_unbounded_window_does_not_overflow() {
        let pattern = Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
                PatternStructure::negation(PatternStructure::primitive("C", "c")),
            ]),
            CompositeFormula::new(),
            i64::MAX,
        )
        .unwrap();
        let mut mechanism = TreeBasedEvaluationMechanism::new(pattern, EngineConfig::default()).unwrap();
        for e in [event("A", 5), event("B", 10)] {
            assert!(mechanism.process_event(e).unwrap().is_empty());
        }
        let flushed: Vec<Vec<i64>> = mechanism.flush().unwrap().iter().map(|m| m.timestamps()).collect();
        assert_eq!(flushed, vec![vec![5, 10]]);
    }

    #[test]
    fn test_unsupported_configurations() {
        let mut config = EngineConfig::default();
        config.parallel_execution_mode = ParallelExecutionMode::DataParallelism;
        assert!(matches!(
            TreeBasedEvaluationMechanism::new(pattern(), config),
            Err(CepError::Configuration { .. })
        ));

        let mut config = EngineConfig::default();
        config.multi_pattern_approach = MultiPatternEvaluationApproach::TreeMerge;
        assert!(TreeBasedEvaluationMechanism::new(pattern(), config).is_err());
    }

    #[test]
    fn test_eval_over_channels() {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (match_tx, match_rx) = crossbeam_channel::unbounded();
        for e in [event("A", 1), event("B", 2), event("B", 3)] {
            event_tx.send(e).unwrap();
        }
        drop(event_tx);

        let mut mechanism =
            TreeBasedEvaluationMechanism::new(pattern(), EngineConfig::default()).unwrap();
        mechanism.eval(event_rx, match_tx).unwrap();
        let matches: Vec<PatternMatch> = match_rx.iter().collect();
        assert_eq!(matches.len(), 2);
    }
}
