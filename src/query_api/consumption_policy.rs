// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consumption policies restrict which events may take part in which partial matches.
//!
//! Policies are pattern-global: the evaluation tree applies them uniformly to every
//! node (see `core::tree::policy_enforcer`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How single event types are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mechanism {
    /// Only the next compatible event may extend a match; no branching
    Type1,
    /// Branching into several partial matches is allowed, but only one full match
    /// containing a given single-type event is reported
    Type2,
}

/// Event types that may appear at most once across active partial matches
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SingleTypes {
    pub single_types: BTreeSet<String>,
    /// Falls back to the configured secondary selection strategy when `None`
    pub mechanism: Option<Mechanism>,
}

impl SingleTypes {
    pub fn new<I, S>(single_types: I, mechanism: Option<Mechanism>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            single_types: single_types.into_iter().map(Into::into).collect(),
            mechanism,
        }
    }
}

/// Contiguity groups as given by the user: a single list is shorthand for one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContiguousSpec {
    Names(Vec<String>),
    Groups(Vec<Vec<String>>),
}

impl ContiguousSpec {
    pub fn into_groups(self) -> Vec<Vec<String>> {
        match self {
            ContiguousSpec::Names(names) if names.is_empty() => Vec::new(),
            ContiguousSpec::Names(names) => vec![names],
            ContiguousSpec::Groups(groups) => groups,
        }
    }
}

impl From<Vec<&str>> for ContiguousSpec {
    fn from(names: Vec<&str>) -> Self {
        ContiguousSpec::Names(names.into_iter().map(String::from).collect())
    }
}

impl From<Vec<Vec<&str>>> for ContiguousSpec {
    fn from(groups: Vec<Vec<&str>>) -> Self {
        ContiguousSpec::Groups(
            groups
                .into_iter()
                .map(|g| g.into_iter().map(String::from).collect())
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsumptionPolicies {
    pub single: Option<SingleTypes>,
    /// Groups of event names whose events must be adjacent in the stream
    pub contiguous: Vec<Vec<String>>,
    /// Event name after which no new match may start while a match containing it is active
    pub skip: Option<String>,
}

impl ConsumptionPolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_single(mut self, single: SingleTypes) -> Self {
        self.single = Some(single);
        self
    }

    pub fn with_contiguous(mut self, contiguous: impl Into<ContiguousSpec>) -> Self {
        self.contiguous = contiguous.into().into_groups();
        self
    }

    pub fn with_skip(mut self, skip: impl Into<String>) -> Self {
        self.skip = Some(skip.into());
        self
    }

    /// Check every name the policies mention against the pattern
    pub fn validate(
        &self,
        event_names: &BTreeSet<String>,
        event_types: &BTreeSet<String>,
    ) -> Result<(), String> {
        if let Some(single) = &self.single {
            for single_type in &single.single_types {
                if !event_types.contains(single_type) {
                    return Err(format!(
                        "single-type policy names unknown event type '{}'",
                        single_type
                    ));
                }
            }
        }
        for group in &self.contiguous {
            if group.is_empty() {
                return Err("contiguous policy contains an empty group".to_string());
            }
            for name in group {
                if !event_names.contains(name) {
                    return Err(format!("contiguous policy names unknown event '{}'", name));
                }
            }
        }
        if let Some(skip) = &self.skip {
            if !event_names.contains(skip) {
                return Err(format!("skip policy names unknown event '{}'", skip));
            }
        }
        Ok(())
    }
}
