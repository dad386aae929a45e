// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree-wide enforcement of consumption policies.
//!
//! Policies are pattern-global: the enforcer looks at (and evicts from) the stores
//! of every node, so it works on the whole node arena rather than on one node.

use super::node::Node;
use crate::core::config::SelectionStrategy;
use crate::core::event::{PartialMatch, SharedPartialMatch};
use crate::query_api::{Mechanism, Pattern};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug)]
pub struct PolicyEnforcer {
    single_types: BTreeSet<String>,
    /// `None` disables the single-type policy
    mechanism: Option<Mechanism>,
    contiguous: Vec<BTreeSet<String>>,
    /// Skip name and its primitive index
    skip: Option<(String, usize)>,
    /// type1: single type -> sequence number of the event holding it
    locks: HashMap<String, u64>,
    /// type2: sequence numbers of reported single-type events -> their timestamps
    consumed: HashMap<u64, i64>,
    window_ms: i64,
}

fn mechanism_of(strategy: SelectionStrategy) -> Option<Mechanism> {
    match strategy {
        SelectionStrategy::MatchAny => None,
        SelectionStrategy::MatchSingle => Some(Mechanism::Type2),
        SelectionStrategy::MatchNext => Some(Mechanism::Type1),
    }
}

impl PolicyEnforcer {
    /// Resolve the pattern's policies against the configured selection strategies.
    ///
    /// Listed single types without a mechanism take the secondary strategy's
    /// mechanism, or type1 when that strategy is `MatchAny`. Without listed single
    /// types, a primary strategy other than `MatchAny` makes every positive event
    /// type single.
    pub fn new(pattern: &Pattern, primary: SelectionStrategy, secondary: SelectionStrategy) -> Self {
        let policy = pattern.consumption_policy.as_ref();
        let (single_types, mechanism) = match policy.and_then(|p| p.single.as_ref()) {
            Some(single) if !single.single_types.is_empty() => (
                single.single_types.clone(),
                Some(
                    single
                        .mechanism
                        .or_else(|| mechanism_of(secondary))
                        .unwrap_or(Mechanism::Type1),
                ),
            ),
            _ => match mechanism_of(primary) {
                Some(mechanism) => (pattern.positive_event_types(), Some(mechanism)),
                None => (BTreeSet::new(), None),
            },
        };
        let contiguous = policy
            .map(|p| {
                p.contiguous
                    .iter()
                    .map(|group| group.iter().cloned().collect())
                    .collect()
            })
            .unwrap_or_default();
        let skip = policy.and_then(|p| p.skip.as_ref()).and_then(|name| {
            pattern
                .get_index_by_event_name(name)
                .map(|index| (name.clone(), index))
        });
        Self {
            single_types,
            mechanism,
            contiguous,
            skip,
            locks: HashMap::new(),
            consumed: HashMap::new(),
            window_ms: pattern.window_ms,
        }
    }

    #[inline]
    pub fn mechanism(&self) -> Option<Mechanism> {
        self.mechanism
    }

    pub fn single_types(&self) -> &BTreeSet<String> {
        &self.single_types
    }

    #[inline]
    fn is_single(&self, event_type: &str) -> bool {
        self.mechanism.is_some() && self.single_types.contains(event_type)
    }

    /// Whether a leaf may bind this event. `cutoff` is the oldest first timestamp a
    /// stored match may have to still count as active.
    pub(crate) fn accept_leaf_event(
        &mut self,
        nodes: &[Node],
        event_type: &str,
        index: usize,
        sequence: u64,
        cutoff: i64,
    ) -> bool {
        if self.mechanism == Some(Mechanism::Type1) && self.is_single(event_type) {
            if let Some(&holder) = self.locks.get(event_type) {
                if holder != sequence {
                    let active = nodes.iter().any(|node| {
                        node.storage
                            .iter()
                            .any(|m| m.first_timestamp() >= cutoff && m.contains_sequence(holder))
                    });
                    if active {
                        log::trace!("{} #{} rejected: type held by #{}", event_type, sequence, holder);
                        return false;
                    }
                    self.locks.remove(event_type);
                }
            }
        }

        if let Some((skip_name, skip_index)) = &self.skip {
            if index <= *skip_index {
                let blocked = nodes.iter().filter(|node| !node.is_leaf()).any(|node| {
                    node.storage.iter().any(|m| {
                        m.first_timestamp() >= cutoff
                            && m.events().iter().any(|e| &*e.name == skip_name.as_str())
                    })
                });
                if blocked {
                    log::trace!("{} #{} rejected: skip point '{}' active", event_type, sequence, skip_name);
                    return false;
                }
            }
        }
        true
    }

    /// Contiguity of a candidate built at an internal node.
    ///
    /// A group is checked once all its names are bound: their events, in arrival
    /// order, must occupy consecutive sequence numbers.
    pub(crate) fn accept_candidate(&self, candidate: &PartialMatch) -> bool {
        self.contiguous.iter().all(|group| {
            let mut sequences: Vec<u64> = candidate
                .events()
                .iter()
                .filter(|e| group.contains(&*e.name))
                .map(|e| e.sequence)
                .collect();
            let bound: BTreeSet<&str> = candidate
                .events()
                .iter()
                .map(|e| &*e.name)
                .filter(|name| group.contains(*name))
                .collect();
            if bound.len() < group.len() {
                return true;
            }
            sequences.sort_unstable();
            sequences.dedup();
            sequences.windows(2).all(|pair| pair[1] == pair[0] + 1)
        })
    }

    /// Bookkeeping after `partial_match` was stored at a non-root node.
    ///
    /// Under type1 the match takes the locks of its single-type events, and shorter
    /// matches holding the same events are evicted everywhere: a locked event never
    /// takes part in two branches.
    pub(crate) fn on_partial_match_stored(&mut self, nodes: &mut [Node], partial_match: &SharedPartialMatch) {
        if self.mechanism != Some(Mechanism::Type1) {
            return;
        }
        let held: Vec<(&str, u64)> = partial_match
            .events()
            .iter()
            .filter(|e| self.is_single(&e.event.event_type))
            .map(|e| (&*e.event.event_type, e.sequence))
            .collect();
        for (event_type, sequence) in &held {
            self.locks.insert(event_type.to_string(), *sequence);
        }
        let single: Vec<u64> = held.iter().map(|(_, sequence)| *sequence).collect();
        if single.is_empty() || partial_match.len() < 2 {
            return;
        }
        let length = partial_match.len();
        for node in nodes.iter_mut() {
            node.storage.evict_where(|m| {
                !Arc::ptr_eq(m, partial_match)
                    && m.len() < length
                    && single.iter().any(|s| m.contains_sequence(*s))
            });
        }
    }

    /// Decide whether a full match is reported, consuming its single-type events.
    ///
    /// A reported match also finishes the attempt that passed the skip point, so the
    /// matches still holding its skip event are evicted and new attempts may start.
    pub(crate) fn on_full_match(&mut self, nodes: &mut [Node], full_match: &PartialMatch, now: i64) -> bool {
        let single: Vec<(u64, i64)> = match self.mechanism {
            Some(_) => full_match
                .events()
                .iter()
                .filter(|e| self.single_types.contains(&*e.event.event_type))
                .map(|e| (e.sequence, e.timestamp()))
                .collect(),
            None => Vec::new(),
        };

        if self.mechanism == Some(Mechanism::Type2) && !single.is_empty() {
            let horizon = now.saturating_sub(self.window_ms);
            self.consumed.retain(|_, timestamp| *timestamp >= horizon);
            if single.iter().any(|(s, _)| self.consumed.contains_key(s)) {
                log::trace!("full match suppressed: single-type event already reported");
                return false;
            }
            self.consumed.extend(single.iter().copied());
        } else if !single.is_empty() {
            self.locks
                .retain(|_, holder| !single.iter().any(|(s, _)| s == holder));
        }

        let mut released: Vec<u64> = single.iter().map(|(s, _)| *s).collect();
        if let Some((skip_name, _)) = &self.skip {
            released.extend(
                full_match
                    .events()
                    .iter()
                    .filter(|e| &*e.name == skip_name.as_str())
                    .map(|e| e.sequence),
            );
        }
        if released.is_empty() {
            return true;
        }
        for node in nodes.iter_mut() {
            node.storage
                .evict_where(|m| released.iter().any(|s| m.contains_sequence(*s)));
        }
        true
    }
}
