// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluation tree nodes.
//!
//! Nodes live in the tree's arena and refer to each other by [`NodeId`]. A parent
//! link is a plain handle: it owns nothing and is only used to notify upward.

use super::storage::PartialMatchStorage;
use crate::core::event::SharedPartialMatch;
use crate::query_api::CompositeFormula;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Handle of a node in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Composition rule of a binary or negation node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Seq,
    And,
}

#[derive(Debug)]
pub enum NodeKind {
    /// Binds single events of one type
    Leaf {
        event_type: String,
        name: Arc<str>,
        /// Primitive index in the full pattern structure
        index: usize,
    },
    Binary {
        operator: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    KleeneClosure {
        child: Option<NodeId>,
        min_size: usize,
        max_size: Option<usize>,
    },
    /// Positive subtree on the left, negated leaf on the right
    Negation {
        operator: BinaryOperator,
        left: NodeId,
        right: NodeId,
        /// Primitive index of the negated event
        negative_index: usize,
        /// Whether the negated event can still show up after the positive match completed
        is_unbounded: bool,
        /// Positive matches waiting for the window to close, unbounded nodes only
        pending: Vec<SharedPartialMatch>,
    },
}

#[derive(Debug)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    /// Local condition, filled in when the pattern formula is decomposed
    pub(crate) condition: CompositeFormula,
    pub(crate) storage: PartialMatchStorage,
    /// Event names bound anywhere below (and including) this node
    pub(crate) names: BTreeSet<String>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, names: BTreeSet<String>, storage: PartialMatchStorage) -> Self {
        Self {
            kind,
            parent: None,
            condition: CompositeFormula::new(),
            storage,
            names,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Leaf { .. } => Vec::new(),
            NodeKind::Binary { left, right, .. } | NodeKind::Negation { left, right, .. } => {
                vec![*left, *right]
            }
            NodeKind::KleeneClosure { child, .. } => child.iter().copied().collect(),
        }
    }

    pub fn condition(&self) -> &CompositeFormula {
        &self.condition
    }

    pub fn storage(&self) -> &PartialMatchStorage {
        &self.storage
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Operator label used in structure summaries
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Leaf { name, .. } => name.to_string(),
            NodeKind::Binary { operator, .. } => match operator {
                BinaryOperator::Seq => "SEQ".to_string(),
                BinaryOperator::And => "AND".to_string(),
            },
            NodeKind::KleeneClosure { .. } => "KC".to_string(),
            NodeKind::Negation { operator, .. } => match operator {
                BinaryOperator::Seq => "NSEQ".to_string(),
                BinaryOperator::And => "NAND".to_string(),
            },
        }
    }
}
