// SPDX-License-Identifier: MIT OR Apache-2.0

//! Negation nodes.
//!
//! The left child produces positive matches, the right child is the leaf of the
//! negated event. A positive match survives when no stored negative event falls in
//! its forbidden range and satisfies the node condition. When the negated event may
//! still arrive after the positive part is complete, the match is held back until
//! the window closes (or the stream is flushed).

use super::evaluation_tree::Tree;
use super::node::{BinaryOperator, NodeId, NodeKind};
use crate::core::error::{CepError, CepResult};
use crate::core::event::{MatchedEvent, PartialMatch, SharedPartialMatch};

/// Whether `negative` falls in the range a NSEQ node forbids for `positive`.
///
/// It must come after every positive event placed before the negated position and
/// before every positive event placed after it. Without such neighbours the window
/// bounds the range.
fn in_sequence_range(
    positive: &PartialMatch,
    negative: &MatchedEvent,
    negative_index: usize,
    window_ms: i64,
) -> bool {
    let key = (negative.timestamp(), negative.sequence);
    let before = positive
        .events()
        .iter()
        .filter(|e| e.index < negative_index)
        .map(|e| (e.timestamp(), e.sequence))
        .max();
    let after = positive
        .events()
        .iter()
        .filter(|e| e.index > negative_index)
        .map(|e| (e.timestamp(), e.sequence))
        .min();
    let lower = match before {
        Some(bound) => key > bound,
        None => negative.timestamp() >= positive.last_timestamp().saturating_sub(window_ms),
    };
    let upper = match after {
        Some(bound) => key < bound,
        None => negative.timestamp() <= positive.first_timestamp().saturating_add(window_ms),
    };
    lower && upper
}

/// NAND: anywhere inside a window that could still contain the whole match
fn in_conjunction_range(positive: &PartialMatch, negative: &MatchedEvent, window_ms: i64) -> bool {
    negative.timestamp() >= positive.last_timestamp().saturating_sub(window_ms)
        && negative.timestamp() <= positive.first_timestamp().saturating_add(window_ms)
}

impl Tree {
    pub(super) fn handle_negation_partial_match(
        &mut self,
        node: NodeId,
        source: NodeId,
        partial_match: SharedPartialMatch,
    ) -> CepResult<()> {
        let NodeKind::Negation {
            left,
            right,
            is_unbounded,
            ..
        } = self.nodes[node.0].kind
        else {
            return Err(CepError::structural(format!("{} is not a negation node", node)));
        };

        if source == right {
            let waiting = self.take_pending(node);
            let before = waiting.len();
            let kept: Vec<SharedPartialMatch> = waiting
                .into_iter()
                .filter(|m| !self.invalidates(node, m, &partial_match))
                .collect();
            if kept.len() < before {
                log::trace!("{} dropped {} pending matches", node, before - kept.len());
            }
            self.restore_pending(node, kept);
            return Ok(());
        }
        if source != left {
            return Err(CepError::structural(format!(
                "{} is not a child of {}",
                source, node
            )));
        }

        self.nodes[right.0]
            .storage
            .clean_expired_partial_matches(partial_match.last_timestamp());
        let negatives = self.nodes[right.0].storage.snapshot();
        if negatives
            .iter()
            .any(|negative| self.invalidates(node, &partial_match, negative))
        {
            return Ok(());
        }

        if is_unbounded
            && !self.flushing
            && self.clock <= partial_match.first_timestamp().saturating_add(self.window_ms)
        {
            if let NodeKind::Negation { pending, .. } = &mut self.nodes[node.0].kind {
                pending.push(partial_match);
            }
            return Ok(());
        }
        self.add_and_propagate(node, partial_match)
    }

    /// Whether `negative` (a single negated event) rules out `positive` at `node`
    fn invalidates(&self, node: NodeId, positive: &PartialMatch, negative: &PartialMatch) -> bool {
        let NodeKind::Negation {
            operator,
            negative_index,
            ..
        } = self.nodes[node.0].kind
        else {
            return false;
        };
        let Some(event) = negative.events().first() else {
            return false;
        };
        if positive.contains_sequence(event.sequence) {
            return false;
        }
        let in_range = match operator {
            BinaryOperator::Seq => in_sequence_range(positive, event, negative_index, self.window_ms),
            BinaryOperator::And => in_conjunction_range(positive, event, self.window_ms),
        };
        in_range
            && self.nodes[node.0]
                .condition
                .eval(&PartialMatch::merge([positive, negative]).bindings())
    }

    fn take_pending(&mut self, node: NodeId) -> Vec<SharedPartialMatch> {
        match &mut self.nodes[node.0].kind {
            NodeKind::Negation { pending, .. } => std::mem::take(pending),
            _ => Vec::new(),
        }
    }

    fn restore_pending(&mut self, node: NodeId, matches: Vec<SharedPartialMatch>) {
        if let NodeKind::Negation { pending, .. } = &mut self.nodes[node.0].kind {
            *pending = matches;
        }
    }

    /// Release the pending matches whose window closed before the current clock
    pub(super) fn release_expired_pending(&mut self) -> CepResult<()> {
        for index in 0..self.nodes.len() {
            let node = NodeId(index);
            if !matches!(self.nodes[index].kind, NodeKind::Negation { .. }) {
                continue;
            }
            let (ready, waiting): (Vec<_>, Vec<_>) = self
                .take_pending(node)
                .into_iter()
                .partition(|m| m.first_timestamp().saturating_add(self.window_ms) < self.clock);
            self.restore_pending(node, waiting);
            for partial_match in ready {
                self.add_and_propagate(node, partial_match)?;
            }
        }
        Ok(())
    }

    /// Release every pending match, bottom-up, regardless of its window
    pub fn flush_pending_matches(&mut self) -> CepResult<()> {
        self.flushing = true;
        let mut result = Ok(());
        for index in 0..self.nodes.len() {
            let node = NodeId(index);
            for partial_match in self.take_pending(node) {
                result = self.add_and_propagate(node, partial_match);
                if result.is_err() {
                    break;
                }
            }
            if result.is_err() {
                break;
            }
        }
        self.flushing = false;
        result
    }

    /// Number of matches held back by negation nodes
    pub fn pending_matches(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| match &n.kind {
                NodeKind::Negation { pending, .. } => pending.len(),
                _ => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Event;
    use std::sync::Arc;

    fn matched(index: usize, sequence: u64, ts: i64) -> MatchedEvent {
        MatchedEvent {
            name: Arc::from(format!("e{}", index)),
            index,
            sequence,
            event: Arc::new(Event::new("X", ts)),
        }
    }

    #[test]
    fn test_sequence_range_between_neighbours() {
        // a(0) !b(1) c(2)
        let positive = PartialMatch::new(vec![matched(0, 0, 10), matched(2, 5, 20)]);
        assert!(in_sequence_range(&positive, &matched(1, 3, 15), 1, 100));
        assert!(!in_sequence_range(&positive, &matched(1, 6, 25), 1, 100));
        assert!(!in_sequence_range(&positive, &matched(1, 0, 5), 1, 100));
    }

    #[test]
    fn test_sequence_range_at_the_end_uses_window() {
        let positive = PartialMatch::new(vec![matched(0, 0, 10), matched(1, 1, 12)]);
        assert!(in_sequence_range(&positive, &matched(2, 4, 20), 2, 10));
        assert!(!in_sequence_range(&positive, &matched(2, 4, 21), 2, 10));
        assert!(!in_sequence_range(&positive, &matched(2, 0, 11), 2, 10));
    }

    #[test]
    fn test_conjunction_range() {
        let positive = PartialMatch::new(vec![matched(0, 0, 10), matched(1, 1, 14)]);
        assert!(in_conjunction_range(&positive, &matched(2, 2, 4), 10));
        assert!(!in_conjunction_range(&positive, &matched(2, 2, 3), 10));
        assert!(in_conjunction_range(&positive, &matched(2, 2, 20), 10));
        assert!(!in_conjunction_range(&positive, &matched(2, 2, 21), 10));
    }

    #[test]
    fn test_ranges_with_unbounded_window() {
        let positive = PartialMatch::new(vec![matched(0, 0, 5), matched(1, 1, 10)]);
        assert!(in_conjunction_range(&positive, &matched(2, 2, i64::MAX), i64::MAX));
        assert!(in_conjunction_range(&positive, &matched(2, 2, -5), i64::MAX));
        assert!(in_sequence_range(&positive, &matched(2, 2, i64::MAX), 2, i64::MAX));
    }
}
