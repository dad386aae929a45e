// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree plans: the shape of an evaluation tree before any node is instantiated.
//!
//! Plan leaves refer to pattern *arguments* by index (positive arguments first,
//! then negated ones, see [`Pattern::args`](crate::query_api::Pattern::args)).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator of an internal plan node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorType {
    #[serde(rename = "SEQ")]
    Seq,
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "NSEQ")]
    NegativeSeq,
    #[serde(rename = "NAND")]
    NegativeAnd,
}

impl OperatorType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OperatorType::Seq => "SEQ",
            OperatorType::And => "AND",
            OperatorType::NegativeSeq => "NSEQ",
            OperatorType::NegativeAnd => "NAND",
        }
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        matches!(self, OperatorType::NegativeSeq | OperatorType::NegativeAnd)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "kebab-case")]
pub enum TreePlanNode {
    Leaf {
        event_index: usize,
    },
    Binary {
        operator: OperatorType,
        left: Box<TreePlanNode>,
        right: Box<TreePlanNode>,
    },
}

impl TreePlanNode {
    #[inline]
    pub fn leaf(event_index: usize) -> Self {
        TreePlanNode::Leaf { event_index }
    }

    pub fn binary(operator: OperatorType, left: TreePlanNode, right: TreePlanNode) -> Self {
        TreePlanNode::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreePlanNode::Leaf { .. })
    }

    /// Argument indices of the leaves, left to right
    pub fn leaves(&self) -> Vec<usize> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves(&self, out: &mut Vec<usize>) {
        match self {
            TreePlanNode::Leaf { event_index } => out.push(*event_index),
            TreePlanNode::Binary { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }

    /// Visit every node, children before their parent
    pub fn visit_post_order<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a TreePlanNode),
    {
        if let TreePlanNode::Binary { left, right, .. } = self {
            left.visit_post_order(visit);
            right.visit_post_order(visit);
        }
        visit(self);
    }

    pub fn height(&self) -> usize {
        match self {
            TreePlanNode::Leaf { .. } => 0,
            TreePlanNode::Binary { left, right, .. } => 1 + left.height().max(right.height()),
        }
    }
}

impl fmt::Display for TreePlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreePlanNode::Leaf { event_index } => write!(f, "{}", event_index),
            TreePlanNode::Binary {
                operator,
                left,
                right,
            } => write!(f, "({} {} {})", left, operator.as_str(), right),
        }
    }
}

/// A complete plan as produced by a tree plan builder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreePlan {
    pub root: TreePlanNode,
}

impl TreePlan {
    pub fn new(root: TreePlanNode) -> Self {
        Self { root }
    }

    /// Argument indices in the order the leaves appear
    pub fn leaf_order(&self) -> Vec<usize> {
        self.root.leaves()
    }

    /// Compact textual shape, e.g. `((0 SEQ 1) NSEQ 2)`
    pub fn structure_summary(&self) -> String {
        self.root.to_string()
    }
}

impl fmt::Display for TreePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}
