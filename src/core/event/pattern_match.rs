// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partial and full pattern matches.
//!
//! A [`PartialMatch`] is immutable once built. Nodes share it with their parent as a
//! [`SharedPartialMatch`] and evict it from their own storage when it expires or is
//! consumed by a consumption policy.

use super::stream_event::SharedEvent;
use crate::query_api::formula::Bindings;
use serde::Serialize;
use std::sync::Arc;

pub type SharedPartialMatch = Arc<PartialMatch>;

/// An event bound to a named position of the pattern
#[derive(Debug, Clone)]
pub struct MatchedEvent {
    /// Name the pattern gives to this position (e.g. `a` in `A a`)
    pub name: Arc<str>,
    /// Index of the position in the full pattern structure
    pub index: usize,
    /// Arrival sequence number assigned by the tree; identifies the stream event
    pub sequence: u64,
    pub event: SharedEvent,
}

impl MatchedEvent {
    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.event.timestamp
    }
}

/// One or more events jointly satisfying part of a pattern
#[derive(Debug, Clone)]
pub struct PartialMatch {
    events: Vec<MatchedEvent>,
    first_timestamp: i64,
    last_timestamp: i64,
}

impl PartialMatch {
    pub fn new(events: Vec<MatchedEvent>) -> Self {
        let first_timestamp = events.iter().map(|e| e.timestamp()).min().unwrap_or(0);
        let last_timestamp = events.iter().map(|e| e.timestamp()).max().unwrap_or(0);
        Self {
            events,
            first_timestamp,
            last_timestamp,
        }
    }

    /// Concatenate the events of several matches, keeping each one's internal order.
    ///
    /// The span of the result is the min/max over the constituent spans.
    pub fn merge<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a PartialMatch>,
    {
        let mut events = Vec::new();
        let mut first_timestamp = i64::MAX;
        let mut last_timestamp = i64::MIN;
        for part in parts {
            first_timestamp = first_timestamp.min(part.first_timestamp);
            last_timestamp = last_timestamp.max(part.last_timestamp);
            events.extend(part.events.iter().cloned());
        }
        if events.is_empty() {
            return Self::new(events);
        }
        Self {
            events,
            first_timestamp,
            last_timestamp,
        }
    }

    #[inline]
    pub fn events(&self) -> &[MatchedEvent] {
        &self.events
    }

    #[inline]
    pub fn first_timestamp(&self) -> i64 {
        self.first_timestamp
    }

    #[inline]
    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    /// Time covered by the match
    #[inline]
    pub fn span(&self) -> i64 {
        self.last_timestamp.saturating_sub(self.first_timestamp)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the stream event with the given sequence number is part of this match
    pub fn contains_sequence(&self, sequence: u64) -> bool {
        self.events.iter().any(|e| e.sequence == sequence)
    }

    /// Whether two matches bind a common stream event
    pub fn shares_event_with(&self, other: &PartialMatch) -> bool {
        self.events
            .iter()
            .any(|e| other.contains_sequence(e.sequence))
    }

    /// Name -> events view used to evaluate formulas
    pub fn bindings(&self) -> Bindings<'_> {
        Bindings::from_matched(self.events.iter())
    }
}

/// A full match emitted at the tree root
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    /// Matched events ordered by pattern position, then by arrival
    pub events: Vec<SharedEvent>,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub pattern_id: Option<usize>,
}

impl PatternMatch {
    pub fn from_partial_match(partial_match: &PartialMatch, pattern_id: Option<usize>) -> Self {
        let mut ordered: Vec<&MatchedEvent> = partial_match.events().iter().collect();
        ordered.sort_by_key(|e| (e.index, e.sequence));
        Self {
            events: ordered.into_iter().map(|e| e.event.clone()).collect(),
            first_timestamp: partial_match.first_timestamp(),
            last_timestamp: partial_match.last_timestamp(),
            pattern_id,
        }
    }

    /// Timestamps of the matched events, in match order
    pub fn timestamps(&self) -> Vec<i64> {
        self.events.iter().map(|e| e.timestamp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::stream_event::Event;

    fn matched(name: &str, index: usize, sequence: u64, ts: i64) -> MatchedEvent {
        MatchedEvent {
            name: Arc::from(name),
            index,
            sequence,
            event: Arc::new(Event::new("A", ts)),
        }
    }

    #[test]
    fn test_span_is_min_max_of_events() {
        let pm = PartialMatch::new(vec![matched("a", 0, 2, 30), matched("b", 1, 1, 10)]);
        assert_eq!(pm.first_timestamp(), 10);
        assert_eq!(pm.last_timestamp(), 30);
        assert_eq!(pm.span(), 20);
    }

    #[test]
    fn test_merge_preserves_side_order() {
        let left = PartialMatch::new(vec![matched("a", 0, 1, 5), matched("a", 0, 2, 7)]);
        let right = PartialMatch::new(vec![matched("b", 1, 3, 9)]);
        let merged = PartialMatch::merge([&left, &right]);
        let sequences: Vec<u64> = merged.events().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(merged.first_timestamp(), 5);
        assert_eq!(merged.last_timestamp(), 9);
        assert!(merged.shares_event_with(&right));
    }

    #[test]
    fn test_pattern_match_orders_by_position() {
        let pm = PartialMatch::new(vec![matched("b", 1, 2, 20), matched("a", 0, 1, 10)]);
        let full = PatternMatch::from_partial_match(&pm, Some(3));
        assert_eq!(full.timestamps(), vec![10, 20]);
        assert_eq!(full.pattern_id, Some(3));
    }
}
