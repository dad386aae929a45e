// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::core::error::{CepError, CepResult};
use crate::core::event::Event;
use crate::query_api::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Kinds of statistics a collector may maintain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatisticsKind {
    ArrivalRates,
    SelectivityMatrix,
}

impl StatisticsKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            StatisticsKind::ArrivalRates => "arrival-rates",
            StatisticsKind::SelectivityMatrix => "selectivity-matrix",
        }
    }
}

impl fmt::Display for StatisticsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot value of one statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatisticValue {
    /// Events per second, one entry per positive pattern argument
    ArrivalRates(Vec<f64>),
    /// Probability that the conditions between two positive arguments hold;
    /// the diagonal holds the single-argument selectivities
    SelectivityMatrix(Vec<Vec<f64>>),
}

impl StatisticValue {
    pub fn kind(&self) -> StatisticsKind {
        match self {
            StatisticValue::ArrivalRates(_) => StatisticsKind::ArrivalRates,
            StatisticValue::SelectivityMatrix(_) => StatisticsKind::SelectivityMatrix,
        }
    }
}

/// A read snapshot of all statistics, keyed by kind
pub type Statistics = BTreeMap<StatisticsKind, StatisticValue>;

/// Arrival rates of a snapshot, or `MissingStatistics`
pub fn arrival_rates(statistics: &Statistics) -> CepResult<&[f64]> {
    match statistics.get(&StatisticsKind::ArrivalRates) {
        Some(StatisticValue::ArrivalRates(rates)) => Ok(rates),
        _ => Err(CepError::missing_statistics(StatisticsKind::ArrivalRates.as_str())),
    }
}

/// Selectivity matrix of a snapshot, if present
pub fn selectivity_matrix(statistics: &Statistics) -> Option<&[Vec<f64>]> {
    match statistics.get(&StatisticsKind::SelectivityMatrix) {
        Some(StatisticValue::SelectivityMatrix(matrix)) => Some(matrix),
        _ => None,
    }
}

/// A statistic maintained over the stream
pub trait Statistic: fmt::Debug + Send {
    fn kind(&self) -> StatisticsKind;

    /// Account for a new event
    fn update(&mut self, event: &Event);

    /// Current value
    fn value(&self) -> StatisticValue;
}

/// Arrival rate of each positive argument over a sliding time window
#[derive(Debug)]
pub struct ArrivalRatesStatistic {
    arg_event_types: Vec<BTreeSet<String>>,
    arrivals: Vec<VecDeque<i64>>,
    time_window_ms: i64,
}

impl ArrivalRatesStatistic {
    pub fn new(pattern: &Pattern, time_window_ms: i64) -> Self {
        let arg_event_types: Vec<BTreeSet<String>> = (0..pattern.positive_arg_count())
            .map(|i| {
                pattern
                    .arg_primitives(i)
                    .into_iter()
                    .map(|p| p.event_type.clone())
                    .collect()
            })
            .collect();
        let arrivals = vec![VecDeque::new(); arg_event_types.len()];
        Self {
            arg_event_types,
            arrivals,
            time_window_ms: time_window_ms.max(1),
        }
    }
}

impl Statistic for ArrivalRatesStatistic {
    fn kind(&self) -> StatisticsKind {
        StatisticsKind::ArrivalRates
    }

    fn update(&mut self, event: &Event) {
        let cutoff = event.timestamp.saturating_sub(self.time_window_ms);
        for (types, arrivals) in self.arg_event_types.iter().zip(self.arrivals.iter_mut()) {
            if types.contains(&*event.event_type) {
                arrivals.push_back(event.timestamp);
            }
            while arrivals.front().is_some_and(|ts| *ts < cutoff) {
                arrivals.pop_front();
            }
        }
    }

    fn value(&self) -> StatisticValue {
        let seconds = self.time_window_ms as f64 / 1000.0;
        StatisticValue::ArrivalRates(
            self.arrivals
                .iter()
                .map(|arrivals| arrivals.len() as f64 / seconds)
                .collect(),
        )
    }
}

/// Caller-provided selectivities. Estimating them from the stream is left to
/// external collectors implementing [`Statistic`].
#[derive(Debug, Clone)]
pub struct FixedSelectivityMatrix {
    matrix: Vec<Vec<f64>>,
}

impl FixedSelectivityMatrix {
    pub fn new(matrix: Vec<Vec<f64>>) -> Self {
        Self { matrix }
    }

    /// Every condition always holds
    pub fn uniform(size: usize) -> Self {
        Self::new(vec![vec![1.0; size]; size])
    }
}

impl Statistic for FixedSelectivityMatrix {
    fn kind(&self) -> StatisticsKind {
        StatisticsKind::SelectivityMatrix
    }

    fn update(&mut self, _event: &Event) {}

    fn value(&self) -> StatisticValue {
        StatisticValue::SelectivityMatrix(self.matrix.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_api::{CompositeFormula, PatternStructure};

    fn pattern() -> Pattern {
        Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::kleene(PatternStructure::primitive("B", "b"), 1, None),
            ]),
            CompositeFormula::new(),
            10_000,
        )
        .unwrap()
    }

    #[test]
    fn test_arrival_rates_slide_with_time() {
        let mut rates = ArrivalRatesStatistic::new(&pattern(), 2000);
        rates.update(&Event::new("A", 0));
        rates.update(&Event::new("A", 500));
        rates.update(&Event::new("B", 1000));
        assert_eq!(rates.value(), StatisticValue::ArrivalRates(vec![1.0, 0.5]));

        // both A arrivals fall out of the window
        rates.update(&Event::new("C", 2600));
        assert_eq!(rates.value(), StatisticValue::ArrivalRates(vec![0.0, 0.5]));
    }

    #[test]
    fn test_arrival_rates_lookup() {
        let mut statistics = Statistics::new();
        assert!(matches!(
            arrival_rates(&statistics),
            Err(CepError::MissingStatistics { .. })
        ));
        statistics.insert(
            StatisticsKind::ArrivalRates,
            StatisticValue::ArrivalRates(vec![2.0]),
        );
        assert_eq!(arrival_rates(&statistics).unwrap(), &[2.0]);
        assert!(selectivity_matrix(&statistics).is_none());
    }

    #[test]
    fn test_fixed_selectivity_ignores_events() {
        let mut selectivity = FixedSelectivityMatrix::uniform(2);
        selectivity.update(&Event::new("A", 1));
        assert_eq!(
            selectivity.value(),
            StatisticValue::SelectivityMatrix(vec![vec![1.0, 1.0], vec![1.0, 1.0]])
        );
    }
}
