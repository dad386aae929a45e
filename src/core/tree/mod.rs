// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree-based pattern evaluation.

mod binary_node;
pub mod evaluation_tree;
mod kleene_closure_node;
mod leaf_node;
mod negation_node;
pub mod node;
pub mod policy_enforcer;
pub mod storage;

pub use evaluation_tree::{Tree, TreeParameters};
pub use node::{BinaryOperator, Node, NodeId, NodeKind};
pub use policy_enforcer::PolicyEnforcer;
pub use storage::{PartialMatchStorage, TreeStorageParameters};
