// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stream statistics consumed by the optimizer.

pub mod changes_aware;
pub mod collector;
pub mod statistic;

pub use changes_aware::{
    default_changes_aware_testers, ArrivalRatesChangesTester, ChangesAwareTester,
    SelectivityChangesTester,
};
pub use collector::StatisticsCollector;
pub use statistic::{
    arrival_rates, selectivity_matrix, ArrivalRatesStatistic, FixedSelectivityMatrix, Statistic,
    StatisticValue, Statistics, StatisticsKind,
};
