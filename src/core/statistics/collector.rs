// SPDX-License-Identifier: MIT OR Apache-2.0

use super::statistic::{
    ArrivalRatesStatistic, FixedSelectivityMatrix, Statistic, StatisticValue, Statistics,
    StatisticsKind,
};
use crate::core::event::Event;
use crate::query_api::Pattern;
use std::collections::BTreeMap;

/// Collects, maintains and updates statistics from the stream
#[derive(Debug, Default)]
pub struct StatisticsCollector {
    statistics: BTreeMap<StatisticsKind, Box<dyn Statistic>>,
}

impl StatisticsCollector {
    pub fn new(statistics: Vec<Box<dyn Statistic>>) -> Self {
        Self {
            statistics: statistics.into_iter().map(|s| (s.kind(), s)).collect(),
        }
    }

    /// Arrival rates over `time_window_ms` plus a selectivity matrix taken from the
    /// pattern's prior statistics, or a uniform one.
    pub fn for_pattern(pattern: &Pattern, time_window_ms: i64) -> Self {
        let prior_selectivity = pattern.statistics.as_ref().and_then(|prior| {
            match prior.get(&StatisticsKind::SelectivityMatrix) {
                Some(StatisticValue::SelectivityMatrix(matrix)) => Some(matrix.clone()),
                _ => None,
            }
        });
        let selectivity = match prior_selectivity {
            Some(matrix) => FixedSelectivityMatrix::new(matrix),
            None => FixedSelectivityMatrix::uniform(pattern.positive_arg_count()),
        };
        Self::new(vec![
            Box::new(ArrivalRatesStatistic::new(pattern, time_window_ms)),
            Box::new(selectivity),
        ])
    }

    /// Updates the statistics with the new event
    pub fn event_handler(&mut self, event: &Event) {
        for statistic in self.statistics.values_mut() {
            statistic.update(event);
        }
    }

    /// Read snapshot of every statistic
    pub fn get_statistics(&self) -> Statistics {
        self.statistics
            .iter()
            .map(|(kind, statistic)| (*kind, statistic.value()))
            .collect()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &StatisticsKind> {
        self.statistics.keys()
    }
}
