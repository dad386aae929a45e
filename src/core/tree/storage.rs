// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-node partial match storage.

use crate::core::event::SharedPartialMatch;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Storage settings shared by every node of a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeStorageParameters {
    /// Keep each store sorted instead of in insertion order
    pub sort_storage: bool,
    /// Number of insertions between two self-cleanups of a store
    pub clean_up_interval: usize,
    /// Sort by last timestamp when true, by first timestamp otherwise
    pub prioritize_sorting_by_timestamp: bool,
}

impl Default for TreeStorageParameters {
    fn default() -> Self {
        Self {
            sort_storage: false,
            clean_up_interval: 10,
            prioritize_sorting_by_timestamp: true,
        }
    }
}

/// Time-ordered store of the partial matches produced by one node.
///
/// Matches are appended in arrival order, or inserted in key order when sorting
/// is enabled. Every `clean_up_interval` insertions the store drops what expired
/// relative to the inserted match.
#[derive(Debug)]
pub struct PartialMatchStorage {
    matches: VecDeque<SharedPartialMatch>,
    /// Allocation addresses of the stored matches. The store holds a handle to each
    /// one, so an address cannot be reused while it is listed here.
    live: HashSet<usize>,
    params: TreeStorageParameters,
    window_ms: i64,
    additions_since_cleanup: usize,
}

#[inline]
fn identity(partial_match: &SharedPartialMatch) -> usize {
    Arc::as_ptr(partial_match) as usize
}

impl PartialMatchStorage {
    pub fn new(params: TreeStorageParameters, window_ms: i64) -> Self {
        Self {
            matches: VecDeque::new(),
            live: HashSet::new(),
            params,
            window_ms,
            additions_since_cleanup: 0,
        }
    }

    fn sort_key(&self, partial_match: &SharedPartialMatch) -> i64 {
        if self.params.prioritize_sorting_by_timestamp {
            partial_match.last_timestamp()
        } else {
            partial_match.first_timestamp()
        }
    }

    pub fn add(&mut self, partial_match: SharedPartialMatch) {
        let trigger = partial_match.last_timestamp();
        self.live.insert(identity(&partial_match));
        if self.params.sort_storage {
            let key = self.sort_key(&partial_match);
            let position = self.matches.partition_point(|m| self.sort_key(m) <= key);
            self.matches.insert(position, partial_match);
        } else {
            self.matches.push_back(partial_match);
        }

        self.additions_since_cleanup += 1;
        if self.additions_since_cleanup >= self.params.clean_up_interval.max(1) {
            self.additions_since_cleanup = 0;
            self.clean_expired_partial_matches(trigger);
        }
    }

    /// Drop every match starting before `trigger_timestamp - window`
    pub fn clean_expired_partial_matches(&mut self, trigger_timestamp: i64) -> usize {
        let cutoff = trigger_timestamp.saturating_sub(self.window_ms);
        let before = self.matches.len();
        if self.params.sort_storage && !self.params.prioritize_sorting_by_timestamp {
            while self
                .matches
                .front()
                .is_some_and(|m| m.first_timestamp() < cutoff)
            {
                if let Some(expired) = self.matches.pop_front() {
                    self.live.remove(&identity(&expired));
                }
            }
        } else {
            let live = &mut self.live;
            self.matches.retain(|m| {
                let keep = m.first_timestamp() >= cutoff;
                if !keep {
                    live.remove(&identity(m));
                }
                keep
            });
        }
        before - self.matches.len()
    }

    /// Remove the matches accepted by `predicate`, returning how many were removed
    pub fn evict_where<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&SharedPartialMatch) -> bool,
    {
        let before = self.matches.len();
        let live = &mut self.live;
        self.matches.retain(|m| {
            let evict = predicate(m);
            if evict {
                live.remove(&identity(m));
            }
            !evict
        });
        before - self.matches.len()
    }

    /// Whether this exact match (not an equal one) is stored
    #[inline]
    pub fn contains(&self, partial_match: &SharedPartialMatch) -> bool {
        self.live.contains(&identity(partial_match))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedPartialMatch> {
        self.matches.iter()
    }

    /// Owned copy of the handles, safe to hold while the store changes
    pub fn snapshot(&self) -> Vec<SharedPartialMatch> {
        self.matches.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&SharedPartialMatch> {
        self.matches.back()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}
