// SPDX-License-Identifier: MIT OR Apache-2.0

//! "Changed by a factor of t" tests, one per statistics kind.
//!
//! A component is considered changed when `|new - prev| > t * prev`.

use super::statistic::{StatisticValue, StatisticsKind};
use crate::core::error::{CepError, CepResult};
use std::collections::HashMap;
use std::fmt::Debug;

pub trait ChangesAwareTester: Debug + Send + Sync {
    fn is_changed_by_t(&self, new: &StatisticValue, prev: &StatisticValue) -> CepResult<bool>;
}

fn changed_by_factor(new: &[f64], prev: &[f64], t: f64, kind: StatisticsKind) -> CepResult<bool> {
    if new.len() != prev.len() {
        return Err(CepError::statistics_mismatch(
            kind.as_str(),
            format!("{} values compared against {}", new.len(), prev.len()),
        ));
    }
    Ok(new
        .iter()
        .zip(prev)
        .any(|(n, p)| (n - p).abs() > t * p.abs()))
}

#[derive(Debug, Clone)]
pub struct ArrivalRatesChangesTester {
    t: f64,
}

impl ArrivalRatesChangesTester {
    pub fn new(t: f64) -> Self {
        Self { t }
    }
}

impl ChangesAwareTester for ArrivalRatesChangesTester {
    fn is_changed_by_t(&self, new: &StatisticValue, prev: &StatisticValue) -> CepResult<bool> {
        match (new, prev) {
            (StatisticValue::ArrivalRates(new), StatisticValue::ArrivalRates(prev)) => {
                changed_by_factor(new, prev, self.t, StatisticsKind::ArrivalRates)
            }
            _ => Err(CepError::statistics_mismatch(
                StatisticsKind::ArrivalRates.as_str(),
                "expected arrival rates on both sides",
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectivityChangesTester {
    t: f64,
}

impl SelectivityChangesTester {
    pub fn new(t: f64) -> Self {
        Self { t }
    }
}

impl ChangesAwareTester for SelectivityChangesTester {
    fn is_changed_by_t(&self, new: &StatisticValue, prev: &StatisticValue) -> CepResult<bool> {
        match (new, prev) {
            (StatisticValue::SelectivityMatrix(new), StatisticValue::SelectivityMatrix(prev)) => {
                if new.len() != prev.len() {
                    return Err(CepError::statistics_mismatch(
                        StatisticsKind::SelectivityMatrix.as_str(),
                        format!("{} rows compared against {}", new.len(), prev.len()),
                    ));
                }
                for (new_row, prev_row) in new.iter().zip(prev) {
                    if changed_by_factor(new_row, prev_row, self.t, StatisticsKind::SelectivityMatrix)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Err(CepError::statistics_mismatch(
                StatisticsKind::SelectivityMatrix.as_str(),
                "expected selectivity matrices on both sides",
            )),
        }
    }
}

/// Testers for every built-in statistics kind, all using the same factor
pub fn default_changes_aware_testers(t: f64) -> HashMap<StatisticsKind, Box<dyn ChangesAwareTester>> {
    let mut testers: HashMap<StatisticsKind, Box<dyn ChangesAwareTester>> = HashMap::new();
    testers.insert(
        StatisticsKind::ArrivalRates,
        Box::new(ArrivalRatesChangesTester::new(t)),
    );
    testers.insert(
        StatisticsKind::SelectivityMatrix,
        Box::new(SelectivityChangesTester::new(t)),
    );
    testers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrival_rates_change_threshold() {
        let tester = ArrivalRatesChangesTester::new(0.5);
        let prev = StatisticValue::ArrivalRates(vec![10.0, 4.0]);
        let small = StatisticValue::ArrivalRates(vec![14.0, 5.0]);
        let large = StatisticValue::ArrivalRates(vec![10.0, 6.5]);
        assert!(!tester.is_changed_by_t(&small, &prev).unwrap());
        assert!(tester.is_changed_by_t(&large, &prev).unwrap());
        assert!(!tester.is_changed_by_t(&prev, &prev).unwrap());
    }

    #[test]
    fn test_zero_previous_value() {
        let tester = ArrivalRatesChangesTester::new(0.5);
        let prev = StatisticValue::ArrivalRates(vec![0.0]);
        assert!(!tester
            .is_changed_by_t(&StatisticValue::ArrivalRates(vec![0.0]), &prev)
            .unwrap());
        assert!(tester
            .is_changed_by_t(&StatisticValue::ArrivalRates(vec![0.1]), &prev)
            .unwrap());
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let tester = ArrivalRatesChangesTester::new(0.5);
        let result = tester.is_changed_by_t(
            &StatisticValue::ArrivalRates(vec![1.0]),
            &StatisticValue::ArrivalRates(vec![1.0, 2.0]),
        );
        assert!(matches!(result, Err(CepError::StatisticsMismatch { .. })));

        let result = tester.is_changed_by_t(
            &StatisticValue::SelectivityMatrix(vec![]),
            &StatisticValue::ArrivalRates(vec![]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_selectivity_changes() {
        let tester = SelectivityChangesTester::new(0.1);
        let prev = StatisticValue::SelectivityMatrix(vec![vec![1.0, 0.5], vec![0.5, 1.0]]);
        let new = StatisticValue::SelectivityMatrix(vec![vec![1.0, 0.2], vec![0.2, 1.0]]);
        assert!(tester.is_changed_by_t(&new, &prev).unwrap());
        assert_eq!(default_changes_aware_testers(0.1).len(), 2);
    }
}
