// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern definition: structure, condition, window, policies and prior statistics.
//!
//! Arguments of the top-level operator are addressed by *argument index*, the
//! numbering used by tree plans: the positive arguments in declaration order,
//! followed by the negated ones. Primitive events are addressed by their
//! depth-first *primitive index* in the full structure (see
//! [`PrimitiveEventDefinition`]).

use super::consumption_policy::ConsumptionPolicies;
use super::formula::CompositeFormula;
use super::pattern_structure::{PatternStructure, PrimitiveEventDefinition, TopOperator};
use crate::core::error::{CepError, CepResult};
use crate::core::statistics::Statistics;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct Pattern {
    full_structure: PatternStructure,
    positive_structure: PatternStructure,
    negative_structure: Option<PatternStructure>,
    /// Condition over the named events of the pattern
    pub condition: CompositeFormula,
    /// Maximum time between the earliest and latest event of a match, in milliseconds
    pub window_ms: i64,
    pub consumption_policy: Option<ConsumptionPolicies>,
    /// Prior statistics, if any are known before the stream starts
    pub statistics: Option<Statistics>,
    /// Identifier attached to the matches of this pattern
    pub id: Option<usize>,
    primitives: Vec<PrimitiveEventDefinition>,
    /// argument index -> position among the full structure's top-level arguments
    arg_positions: Vec<usize>,
    positive_arg_count: usize,
}

impl Pattern {
    pub fn new(
        structure: PatternStructure,
        condition: CompositeFormula,
        window_ms: i64,
    ) -> CepResult<Self> {
        if window_ms <= 0 {
            return Err(CepError::invalid_pattern(format!(
                "window must be positive, got {} ms",
                window_ms
            )));
        }
        validate_structure(&structure, true)?;

        let primitives = structure.primitive_events_from(0);
        let mut seen = BTreeSet::new();
        for primitive in &primitives {
            if !seen.insert(primitive.name.clone()) {
                return Err(CepError::invalid_pattern(format!(
                    "event name '{}' is bound more than once",
                    primitive.name
                )));
            }
        }
        let unknown: Vec<String> = condition.names().difference(&seen).cloned().collect();
        if !unknown.is_empty() {
            return Err(CepError::invalid_pattern(format!(
                "condition refers to unknown events {:?}",
                unknown
            )));
        }

        let (positive_structure, negative_structure, arg_positions, positive_arg_count) =
            split_negation(&structure)?;

        Ok(Self {
            full_structure: structure,
            positive_structure,
            negative_structure,
            condition,
            window_ms,
            consumption_policy: None,
            statistics: None,
            id: None,
            primitives,
            arg_positions,
            positive_arg_count,
        })
    }

    pub fn with_consumption_policy(mut self, policy: ConsumptionPolicies) -> CepResult<Self> {
        policy
            .validate(&self.event_names(), &self.event_types())
            .map_err(CepError::invalid_pattern)?;
        self.consumption_policy = Some(policy);
        Ok(self)
    }

    pub fn with_statistics(mut self, statistics: Statistics) -> Self {
        self.statistics = Some(statistics);
        self
    }

    pub fn with_id(mut self, id: usize) -> Self {
        self.id = Some(id);
        self
    }

    #[inline]
    pub fn full_structure(&self) -> &PatternStructure {
        &self.full_structure
    }

    #[inline]
    pub fn positive_structure(&self) -> &PatternStructure {
        &self.positive_structure
    }

    #[inline]
    pub fn negative_structure(&self) -> Option<&PatternStructure> {
        self.negative_structure.as_ref()
    }

    #[inline]
    pub fn top_operator(&self) -> TopOperator {
        self.full_structure.top_operator()
    }

    /// Positive arguments followed by negated ones (negations unwrapped)
    pub fn args(&self) -> Vec<&PatternStructure> {
        // a non-composite positive structure is its own single argument
        let mut args = if self.positive_structure.is_composite() {
            self.positive_structure.get_args()
        } else {
            vec![&self.positive_structure]
        };
        if let Some(negative) = &self.negative_structure {
            args.extend(negative.get_args());
        }
        args
    }

    #[inline]
    pub fn positive_arg_count(&self) -> usize {
        self.positive_arg_count
    }

    #[inline]
    pub fn arg_count(&self) -> usize {
        self.arg_positions.len()
    }

    pub fn primitive_events(&self) -> &[PrimitiveEventDefinition] {
        &self.primitives
    }

    pub fn get_index_by_event_name(&self, name: &str) -> Option<usize> {
        self.primitives.iter().find(|p| p.name == name).map(|p| p.index)
    }

    pub fn get_event_definition(&self, name: &str) -> Option<&PrimitiveEventDefinition> {
        self.primitives.iter().find(|p| p.name == name)
    }

    pub fn event_names(&self) -> BTreeSet<String> {
        self.primitives.iter().map(|p| p.name.clone()).collect()
    }

    pub fn event_types(&self) -> BTreeSet<String> {
        self.primitives.iter().map(|p| p.event_type.clone()).collect()
    }

    /// Event types bound by positive (non-negated) arguments
    pub fn positive_event_types(&self) -> BTreeSet<String> {
        self.positive_structure
            .primitive_events_from(0)
            .into_iter()
            .map(|p| p.event_type)
            .collect()
    }

    /// Primitive events contained in the argument with the given index
    pub fn arg_primitives(&self, arg_index: usize) -> Vec<&PrimitiveEventDefinition> {
        let names = match self.args().get(arg_index) {
            Some(arg) => arg.names(),
            None => return Vec::new(),
        };
        self.primitives
            .iter()
            .filter(|p| names.contains(&p.name))
            .collect()
    }

    /// Whether the negated argument with the given index can still be violated after
    /// every positive event has arrived.
    ///
    /// Under AND every negation is unbounded; under SEQ a negation is bounded when
    /// some positive argument follows it.
    pub fn is_unbounded_negative_arg(&self, arg_index: usize) -> bool {
        if self.top_operator() != TopOperator::Seq {
            return true;
        }
        let Some(position) = self.arg_positions.get(arg_index) else {
            return true;
        };
        !self.arg_positions[..self.positive_arg_count]
            .iter()
            .any(|p| p > position)
    }
}

fn validate_structure(structure: &PatternStructure, is_top: bool) -> CepResult<()> {
    match structure {
        PatternStructure::Primitive { .. } => Ok(()),
        PatternStructure::Seq(args) | PatternStructure::And(args) => {
            if args.is_empty() {
                return Err(CepError::invalid_pattern(format!(
                    "{} has no arguments",
                    structure
                )));
            }
            if args
                .iter()
                .all(|a| matches!(a, PatternStructure::Negation(_)))
            {
                return Err(CepError::invalid_pattern(format!(
                    "{} has no positive argument",
                    structure
                )));
            }
            for arg in args {
                match arg {
                    PatternStructure::Negation(inner) => {
                        if !is_top {
                            return Err(CepError::invalid_pattern(
                                "negation is only supported as an argument of the top-level operator",
                            ));
                        }
                        if !matches!(inner.as_ref(), PatternStructure::Primitive { .. }) {
                            return Err(CepError::invalid_pattern(format!(
                                "only primitive events can be negated, got {}",
                                inner
                            )));
                        }
                    }
                    other => validate_structure(other, false)?,
                }
            }
            Ok(())
        }
        PatternStructure::KleeneClosure {
            arg,
            min_size,
            max_size,
        } => {
            if *min_size == 0 {
                return Err(CepError::invalid_pattern(format!(
                    "{}: min_size must be >= 1",
                    structure
                )));
            }
            if let Some(max) = max_size {
                if min_size > max {
                    return Err(CepError::invalid_pattern(format!(
                        "{}: min_size ({}) cannot be greater than max_size ({})",
                        structure, min_size, max
                    )));
                }
            }
            if arg.contains_negation() {
                return Err(CepError::invalid_pattern(
                    "negation inside a Kleene closure is not supported",
                ));
            }
            validate_structure(arg, false)
        }
        PatternStructure::Negation(_) => Err(CepError::invalid_pattern(
            "a pattern cannot consist of a negation only",
        )),
    }
}

type Split = (PatternStructure, Option<PatternStructure>, Vec<usize>, usize);

fn split_negation(structure: &PatternStructure) -> CepResult<Split> {
    let (args, rebuild): (&Vec<PatternStructure>, fn(Vec<PatternStructure>) -> PatternStructure) =
        match structure {
            PatternStructure::Seq(args) => (args, PatternStructure::Seq),
            PatternStructure::And(args) => (args, PatternStructure::And),
            other => return Ok((other.clone(), None, vec![0], 1)),
        };

    let mut positive = Vec::new();
    let mut negative = Vec::new();
    let mut positive_positions = Vec::new();
    let mut negative_positions = Vec::new();
    for (position, arg) in args.iter().enumerate() {
        match arg {
            PatternStructure::Negation(inner) => {
                negative.push(inner.as_ref().clone());
                negative_positions.push(position);
            }
            other => {
                positive.push(other.clone());
                positive_positions.push(position);
            }
        }
    }
    let positive_arg_count = positive_positions.len();
    let mut arg_positions = positive_positions;
    arg_positions.extend(negative_positions);
    let negative_structure = if negative.is_empty() {
        None
    } else {
        Some(rebuild(negative))
    };
    Ok((rebuild(positive), negative_structure, arg_positions, positive_arg_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_api::formula::{Condition, Operand, RelOp};

    fn seq_with_negation() -> PatternStructure {
        PatternStructure::seq(vec![
            PatternStructure::primitive("A", "a"),
            PatternStructure::negation(PatternStructure::primitive("B", "b")),
            PatternStructure::primitive("C", "c"),
            PatternStructure::negation(PatternStructure::primitive("D", "d")),
        ])
    }

    #[test]
    fn test_negation_split_and_arg_order() {
        let pattern = Pattern::new(seq_with_negation(), CompositeFormula::new(), 1000).unwrap();
        assert_eq!(pattern.positive_arg_count(), 2);
        assert_eq!(pattern.arg_count(), 4);
        let args: Vec<String> = pattern.args().iter().map(|a| a.to_string()).collect();
        assert_eq!(args, vec!["A a", "C c", "B b", "D d"]);
        // b is followed by c, d is last
        assert!(!pattern.is_unbounded_negative_arg(2));
        assert!(pattern.is_unbounded_negative_arg(3));
        assert_eq!(pattern.get_index_by_event_name("c"), Some(2));
    }

    #[test]
    fn test_invalid_patterns() {
        let kc = PatternStructure::kleene(PatternStructure::primitive("A", "a"), 0, None);
        assert!(Pattern::new(kc, CompositeFormula::new(), 10).is_err());

        let kc = PatternStructure::kleene(PatternStructure::primitive("A", "a"), 3, Some(2));
        assert!(Pattern::new(kc, CompositeFormula::new(), 10).is_err());

        let dup = PatternStructure::seq(vec![
            PatternStructure::primitive("A", "a"),
            PatternStructure::primitive("B", "a"),
        ]);
        assert!(Pattern::new(dup, CompositeFormula::new(), 10).is_err());

        let ok = PatternStructure::primitive("A", "a");
        assert!(Pattern::new(ok.clone(), CompositeFormula::new(), 0).is_err());

        let unknown = CompositeFormula::new().and(Condition::compare(
            Operand::attr("z", "x"),
            RelOp::Eq,
            Operand::constant(1i64),
        ));
        assert!(Pattern::new(ok, unknown, 10).is_err());
    }

    #[test]
    fn test_and_negations_are_unbounded() {
        let structure = PatternStructure::and(vec![
            PatternStructure::negation(PatternStructure::primitive("B", "b")),
            PatternStructure::primitive("A", "a"),
        ]);
        let pattern = Pattern::new(structure, CompositeFormula::new(), 10).unwrap();
        assert!(pattern.is_unbounded_negative_arg(1));
        assert_eq!(pattern.positive_event_types().len(), 1);
    }
}
