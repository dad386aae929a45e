// SPDX-License-Identifier: MIT OR Apache-2.0

//! SEQ and AND nodes.

use super::evaluation_tree::Tree;
use super::node::{BinaryOperator, NodeId, NodeKind};
use crate::core::error::{CepError, CepResult};
use crate::core::event::{PartialMatch, SharedPartialMatch};
use std::sync::Arc;

/// Whether every cross pair of events respects the pattern order.
///
/// Positions are compared by primitive index, events by (timestamp, arrival).
pub(super) fn is_ordered(left: &PartialMatch, right: &PartialMatch) -> bool {
    left.events().iter().all(|l| {
        right.events().iter().all(|r| {
            let (lk, rk) = ((l.timestamp(), l.sequence), (r.timestamp(), r.sequence));
            match l.index.cmp(&r.index) {
                std::cmp::Ordering::Less => lk < rk,
                std::cmp::Ordering::Greater => lk > rk,
                std::cmp::Ordering::Equal => true,
            }
        })
    })
}

impl Tree {
    pub(super) fn handle_binary_partial_match(
        &mut self,
        node: NodeId,
        source: NodeId,
        partial_match: SharedPartialMatch,
    ) -> CepResult<()> {
        let NodeKind::Binary {
            operator,
            left,
            right,
        } = self.nodes[node.0].kind
        else {
            return Err(CepError::structural(format!("{} is not a binary node", node)));
        };
        let from_left = if source == left {
            true
        } else if source == right {
            false
        } else {
            return Err(CepError::structural(format!(
                "{} is not a child of {}",
                source, node
            )));
        };
        let sibling = if from_left { right } else { left };

        self.nodes[sibling.0]
            .storage
            .clean_expired_partial_matches(partial_match.last_timestamp());
        let candidates = self.nodes[sibling.0].storage.snapshot();

        for other in candidates {
            // consumed while combining an earlier candidate
            if !self.nodes[source.0].storage.contains(&partial_match) {
                break;
            }
            if !self.nodes[sibling.0].storage.contains(&other) {
                continue;
            }
            let (l, r) = if from_left {
                (&partial_match, &other)
            } else {
                (&other, &partial_match)
            };
            if l.shares_event_with(r) {
                continue;
            }
            let merged = PartialMatch::merge([l.as_ref(), r.as_ref()]);
            if merged.span() > self.window_ms {
                continue;
            }
            if operator == BinaryOperator::Seq && !is_ordered(l, r) {
                continue;
            }
            if !self.policy.accept_candidate(&merged) {
                continue;
            }
            if !self.nodes[node.0].condition.eval(&merged.bindings()) {
                continue;
            }
            self.add_and_propagate(node, Arc::new(merged))?;
        }
        Ok(())
    }
}
