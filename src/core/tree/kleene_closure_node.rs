// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kleene closure nodes.
//!
//! Every new child match is combined with each subset of the child matches stored
//! before it, bounded by the closure's maximum size. Subsets are enumerated lazily so
//! only the combinations that fit the bound are ever built.

use super::evaluation_tree::Tree;
use super::node::{NodeId, NodeKind};
use crate::core::error::{CepError, CepResult};
use crate::core::event::{PartialMatch, SharedPartialMatch};
use crate::core::util::BoundedPowerset;
use std::collections::HashSet;
use std::sync::Arc;

fn has_duplicate_events(partial_match: &PartialMatch) -> bool {
    let mut seen = HashSet::with_capacity(partial_match.len());
    !partial_match.events().iter().all(|e| seen.insert(e.sequence))
}

impl Tree {
    pub(super) fn handle_kleene_partial_match(
        &mut self,
        node: NodeId,
        partial_match: SharedPartialMatch,
    ) -> CepResult<()> {
        let NodeKind::KleeneClosure {
            child,
            min_size,
            max_size,
        } = self.nodes[node.0].kind
        else {
            return Err(CepError::structural(format!("{} is not a kleene closure node", node)));
        };
        let child = child.ok_or_else(|| {
            CepError::structural(format!("kleene closure node {} has no child", node))
        })?;

        self.nodes[child.0]
            .storage
            .clean_expired_partial_matches(partial_match.last_timestamp());
        let others: Vec<SharedPartialMatch> = self.nodes[child.0]
            .storage
            .iter()
            .filter(|m| !Arc::ptr_eq(m, &partial_match))
            .cloned()
            .collect();
        let cap = max_size.unwrap_or(others.len() + 1).saturating_sub(1);

        for subset in BoundedPowerset::new(&others, cap) {
            if !self.nodes[child.0].storage.contains(&partial_match) {
                break;
            }
            if subset.len() + 1 < min_size {
                continue;
            }
            if subset
                .iter()
                .any(|m| !self.nodes[child.0].storage.contains(m))
            {
                continue;
            }
            let merged = PartialMatch::merge(
                subset
                    .iter()
                    .map(|m| m.as_ref())
                    .chain(std::iter::once(partial_match.as_ref())),
            );
            if merged.span() > self.window_ms || has_duplicate_events(&merged) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::{Event, MatchedEvent};

    #[test]
    fn test_duplicate_detection() {
        let matched = |sequence| MatchedEvent {
            name: Arc::from("a"),
            index: 0,
            sequence,
            event: Arc::new(Event::new("A", sequence as i64)),
        };
        assert!(!has_duplicate_events(&PartialMatch::new(vec![matched(1), matched(2)])));
        assert!(has_duplicate_events(&PartialMatch::new(vec![matched(1), matched(1)])));
    }
}
