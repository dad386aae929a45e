// SPDX-License-Identifier: MIT OR Apache-2.0

use super::evaluation_tree::Tree;
use super::node::{NodeId, NodeKind};
use crate::core::error::{CepError, CepResult};
use crate::core::event::{MatchedEvent, PartialMatch, SharedEvent};
use std::sync::Arc;

impl Tree {
    /// Bind `event` at `leaf` if the policies and the leaf condition allow it
    pub(super) fn handle_leaf_event(
        &mut self,
        leaf: NodeId,
        event: &SharedEvent,
        sequence: u64,
    ) -> CepResult<()> {
        let NodeKind::Leaf { name, index, .. } = &self.nodes[leaf.0].kind else {
            return Err(CepError::structural(format!("{} is not a leaf", leaf)));
        };
        let (name, index) = (name.clone(), *index);

        if !self.is_negative_leaf(leaf) {
            let cutoff = self.cutoff();
            if !self
                .policy
                .accept_leaf_event(&self.nodes, &event.event_type, index, sequence, cutoff)
            {
                return Ok(());
            }
        }

        let partial_match = PartialMatch::new(vec![MatchedEvent {
            name,
            index,
            sequence,
            event: event.clone(),
        }]);
        if !self.nodes[leaf.0].condition.eval(&partial_match.bindings()) {
            log::trace!(
                "{} @{} filtered out at leaf {}",
                event.event_type,
                event.timestamp,
                leaf
            );
            return Ok(());
        }
        self.add_and_propagate(leaf, Arc::new(partial_match))
    }
}
