// SPDX-License-Identifier: MIT OR Apache-2.0

//! The evaluation tree: nodes instantiated from a [`TreePlan`], fed one event at a time.
//!
//! Events enter through the leaves of their type. Every partial match a node accepts
//! is stored at that node and handed to its parent, which tries to combine it with
//! what its other child stored earlier. Whatever reaches the root is a full match.
//!
//! Nodes are kept in an arena ordered so that children always precede their parent;
//! walking the arena by ascending id is a bottom-up traversal.

use super::node::{BinaryOperator, Node, NodeId, NodeKind};
use super::policy_enforcer::PolicyEnforcer;
use super::storage::{PartialMatchStorage, TreeStorageParameters};
use crate::core::config::{EngineConfig, SelectionStrategy};
use crate::core::error::{CepError, CepResult};
use crate::core::event::{PatternMatch, SharedEvent, SharedPartialMatch};
use crate::core::plan::{OperatorType, TreePlan, TreePlanNode};
use crate::query_api::{CompositeFormula, Pattern, PatternStructure};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Settings applied when a tree is instantiated
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParameters {
    pub storage: TreeStorageParameters,
    pub primary_selection_strategy: SelectionStrategy,
    pub secondary_selection_strategy: SelectionStrategy,
}

impl Default for TreeParameters {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for TreeParameters {
    fn from(config: &EngineConfig) -> Self {
        Self {
            storage: config.storage.clone(),
            primary_selection_strategy: config.primary_selection_strategy,
            secondary_selection_strategy: config.secondary_selection_strategy,
        }
    }
}

#[derive(Debug)]
pub struct Tree {
    pub(super) nodes: Vec<Node>,
    pub(super) root: NodeId,
    /// Event type -> leaves binding it, by primitive index
    pub(super) leaves_by_type: HashMap<String, Vec<NodeId>>,
    pub(super) window_ms: i64,
    pub(super) policy: PolicyEnforcer,
    pub(super) matches: VecDeque<PatternMatch>,
    pub(super) pattern_id: Option<usize>,
    pub(super) next_sequence: u64,
    /// Highest timestamp seen so far
    pub(super) clock: i64,
    /// Set while pending matches are released at end of stream
    pub(super) flushing: bool,
    plan: TreePlan,
}

/// Arena construction state
struct NodeFactory<'p> {
    pattern: &'p Pattern,
    storage: TreeStorageParameters,
    nodes: Vec<Node>,
}

impl<'p> NodeFactory<'p> {
    fn push(&mut self, kind: NodeKind, names: BTreeSet<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        for child in children_of(&kind) {
            self.nodes[child.0].parent = Some(id);
        }
        let storage = PartialMatchStorage::new(self.storage.clone(), self.pattern.window_ms);
        self.nodes.push(Node::new(kind, names, storage));
        id
    }

    fn names(&self, ids: &[NodeId]) -> BTreeSet<String> {
        ids.iter()
            .flat_map(|id| self.nodes[id.0].names.iter().cloned())
            .collect()
    }

    fn build_plan_node(&mut self, plan_node: &TreePlanNode, args: &[&PatternStructure]) -> CepResult<NodeId> {
        match plan_node {
            TreePlanNode::Leaf { event_index } => {
                let arg = args.get(*event_index).ok_or_else(|| {
                    CepError::invalid_pattern(format!(
                        "plan refers to argument {} but the pattern has {}",
                        event_index,
                        args.len()
                    ))
                })?;
                self.build_structure(arg)
            }
            TreePlanNode::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.build_plan_node(left, args)?;
                match operator {
                    OperatorType::Seq | OperatorType::And => {
                        let right = self.build_plan_node(right, args)?;
                        let names = self.names(&[left, right]);
                        let operator = if *operator == OperatorType::Seq {
                            BinaryOperator::Seq
                        } else {
                            BinaryOperator::And
                        };
                        Ok(self.push(
                            NodeKind::Binary {
                                operator,
                                left,
                                right,
                            },
                            names,
                        ))
                    }
                    OperatorType::NegativeSeq | OperatorType::NegativeAnd => {
                        let TreePlanNode::Leaf { event_index } = right.as_ref() else {
                            return Err(CepError::invalid_pattern(
                                "the negated side of a negation node must be a single argument",
                            ));
                        };
                        let right = self.build_plan_node(right, args)?;
                        let negative_index = match &self.nodes[right.0].kind {
                            NodeKind::Leaf { index, .. } => *index,
                            _ => {
                                return Err(CepError::invalid_pattern(
                                    "only primitive events can be negated",
                                ))
                            }
                        };
                        let names = self.names(&[left, right]);
                        let operator = if *operator == OperatorType::NegativeSeq {
                            BinaryOperator::Seq
                        } else {
                            BinaryOperator::And
                        };
                        Ok(self.push(
                            NodeKind::Negation {
                                operator,
                                left,
                                right,
                                negative_index,
                                is_unbounded: self.pattern.is_unbounded_negative_arg(*event_index),
                                pending: Vec::new(),
                            },
                            names,
                        ))
                    }
                }
            }
        }
    }

    /// Nested structures are laid out in declaration order, left-deep
    fn build_structure(&mut self, structure: &PatternStructure) -> CepResult<NodeId> {
        match structure {
            PatternStructure::Primitive { event_type, name } => {
                let index = self.pattern.get_index_by_event_name(name).ok_or_else(|| {
                    CepError::invalid_pattern(format!("unknown event name '{}'", name))
                })?;
                let names = std::iter::once(name.clone()).collect();
                Ok(self.push(
                    NodeKind::Leaf {
                        event_type: event_type.clone(),
                        name: Arc::from(name.as_str()),
                        index,
                    },
                    names,
                ))
            }
            PatternStructure::KleeneClosure {
                arg,
                min_size,
                max_size,
            } => {
                let child = self.build_structure(arg)?;
                let names = self.names(&[child]);
                Ok(self.push(
                    NodeKind::KleeneClosure {
                        child: Some(child),
                        min_size: *min_size,
                        max_size: *max_size,
                    },
                    names,
                ))
            }
            PatternStructure::Seq(args) | PatternStructure::And(args) => {
                let operator = if matches!(structure, PatternStructure::Seq(_)) {
                    BinaryOperator::Seq
                } else {
                    BinaryOperator::And
                };
                let mut args = args.iter();
                let first = args
                    .next()
                    .ok_or_else(|| CepError::invalid_pattern(format!("{} has no arguments", structure)))?;
                let mut current = self.build_structure(first)?;
                for arg in args {
                    let right = self.build_structure(arg)?;
                    let names = self.names(&[current, right]);
                    current = self.push(
                        NodeKind::Binary {
                            operator,
                            left: current,
                            right,
                        },
                        names,
                    );
                }
                Ok(current)
            }
            PatternStructure::Negation(_) => Err(CepError::invalid_pattern(
                "negation is only supported as an argument of the top-level operator",
            )),
        }
    }
}

fn children_of(kind: &NodeKind) -> Vec<NodeId> {
    match kind {
        NodeKind::Leaf { .. } => Vec::new(),
        NodeKind::Binary { left, right, .. } | NodeKind::Negation { left, right, .. } => {
            vec![*left, *right]
        }
        NodeKind::KleeneClosure { child, .. } => child.iter().copied().collect(),
    }
}

impl Tree {
    /// Instantiate the nodes of `plan` for `pattern` and distribute its condition.
    ///
    /// Fails when the plan does not fit the pattern or when some condition cannot be
    /// evaluated by any node.
    pub fn new(plan: &TreePlan, pattern: &Pattern, params: &TreeParameters) -> CepResult<Self> {
        let args = pattern.args();
        let mut factory = NodeFactory {
            pattern,
            storage: params.storage.clone(),
            nodes: Vec::new(),
        };
        let root = factory.build_plan_node(&plan.root, &args)?;
        let mut nodes = factory.nodes;

        let mut leaves_by_type: HashMap<String, Vec<NodeId>> = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            if let NodeKind::Leaf { event_type, .. } = &node.kind {
                leaves_by_type
                    .entry(event_type.clone())
                    .or_default()
                    .push(NodeId(id));
            }
        }
        for leaves in leaves_by_type.values_mut() {
            leaves.sort_by_key(|id| match &nodes[id.0].kind {
                NodeKind::Leaf { index, .. } => *index,
                _ => usize::MAX,
            });
        }

        let closure_names: BTreeSet<String> = nodes
            .iter()
            .filter(|n| matches!(n.kind, NodeKind::KleeneClosure { .. }))
            .flat_map(|n| n.names.iter().cloned())
            .collect();
        let mut formula = pattern.condition.clone();
        apply_formula(&mut nodes, root, &mut formula, &closure_names);
        if !formula.is_empty() {
            return Err(CepError::invalid_pattern(format!(
                "conditions not covered by any node: {:?}",
                formula.get_conditions_list()
            )));
        }

        let policy = PolicyEnforcer::new(
            pattern,
            params.primary_selection_strategy,
            params.secondary_selection_strategy,
        );
        let tree = Self {
            nodes,
            root,
            leaves_by_type,
            window_ms: pattern.window_ms,
            policy,
            matches: VecDeque::new(),
            pattern_id: pattern.id,
            next_sequence: 0,
            clock: i64::MIN,
            flushing: false,
            plan: plan.clone(),
        };
        log::debug!(
            "evaluation tree {} built from plan {}",
            tree.get_structure_summary(),
            plan
        );
        Ok(tree)
    }

    /// Feed one event, in timestamp order
    pub fn handle_event(&mut self, event: SharedEvent) -> CepResult<()> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.clock = self.clock.max(event.timestamp);
        self.release_expired_pending()?;

        let Some(leaves) = self.leaves_by_type.get(&*event.event_type).cloned() else {
            return Ok(());
        };
        for leaf in leaves {
            self.handle_leaf_event(leaf, &event, sequence)?;
        }
        Ok(())
    }

    /// Store `partial_match` at `node` and notify the parent, or report it at the root
    pub(super) fn add_and_propagate(
        &mut self,
        node: NodeId,
        partial_match: SharedPartialMatch,
    ) -> CepResult<()> {
        let Some(parent) = self.nodes[node.0].parent else {
            self.emit(partial_match);
            return Ok(());
        };
        self.nodes[node.0].storage.add(partial_match.clone());
        if !self.is_negative_leaf(node) {
            self.policy
                .on_partial_match_stored(&mut self.nodes, &partial_match);
        }
        self.handle_new_partial_match(parent, node, partial_match)
    }

    fn handle_new_partial_match(
        &mut self,
        node: NodeId,
        source: NodeId,
        partial_match: SharedPartialMatch,
    ) -> CepResult<()> {
        match &self.nodes[node.0].kind {
            NodeKind::Leaf { .. } => Err(CepError::structural(format!(
                "leaf {} received a partial match from {}",
                node, source
            ))),
            NodeKind::Binary { .. } => self.handle_binary_partial_match(node, source, partial_match),
            NodeKind::KleeneClosure { .. } => self.handle_kleene_partial_match(node, partial_match),
            NodeKind::Negation { .. } => {
                self.handle_negation_partial_match(node, source, partial_match)
            }
        }
    }

    fn emit(&mut self, full_match: SharedPartialMatch) {
        if !self
            .policy
            .on_full_match(&mut self.nodes, &full_match, self.clock)
        {
            return;
        }
        log::trace!(
            "full match [{} .. {}] with {} events",
            full_match.first_timestamp(),
            full_match.last_timestamp(),
            full_match.len()
        );
        self.matches
            .push_back(PatternMatch::from_partial_match(&full_match, self.pattern_id));
    }

    pub(super) fn is_negative_leaf(&self, node: NodeId) -> bool {
        self.nodes[node.0]
            .parent
            .is_some_and(|parent| match &self.nodes[parent.0].kind {
                NodeKind::Negation { right, .. } => *right == node,
                _ => false,
            })
    }

    /// Oldest first timestamp a stored match may have and still be extended
    #[inline]
    pub(super) fn cutoff(&self) -> i64 {
        self.clock.saturating_sub(self.window_ms)
    }

    /// Drain the matches reported so far
    pub fn get_matches(&mut self) -> Vec<PatternMatch> {
        self.matches.drain(..).collect()
    }

    /// End of stream: release every pending match, then drain
    pub fn get_last_matches(&mut self) -> CepResult<Vec<PatternMatch>> {
        self.flush_pending_matches()?;
        Ok(self.get_matches())
    }

    /// Nested operator view, e.g. `NSEQ(SEQ(a, c), b)`
    pub fn get_structure_summary(&self) -> String {
        self.summary_of(self.root)
    }

    fn summary_of(&self, node: NodeId) -> String {
        let current = &self.nodes[node.0];
        let children = current.children();
        if children.is_empty() && current.is_leaf() {
            return current.label();
        }
        let inner: Vec<String> = children.iter().map(|c| self.summary_of(*c)).collect();
        format!("{}({})", current.label(), inner.join(", "))
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Leaves in arena order
    pub fn leaves(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.nodes[id.0].is_leaf())
            .collect()
    }

    pub fn plan(&self) -> &TreePlan {
        &self.plan
    }

    pub fn policy(&self) -> &PolicyEnforcer {
        &self.policy
    }

    /// Total number of partial matches held by all node stores
    pub fn stored_partial_matches(&self) -> usize {
        self.nodes.iter().map(|n| n.storage.len()).sum()
    }
}

/// Give every node the conditions it can evaluate, children first.
///
/// Each condition is taken by the lowest node binding all its names, and removed from
/// `formula` so no other node checks it again. A predicate naming events of a Kleene
/// closure sees the whole closure, so the closure's leaves never take it.
fn apply_formula(
    nodes: &mut [Node],
    node: NodeId,
    formula: &mut CompositeFormula,
    closure_names: &BTreeSet<String>,
) {
    for child in nodes[node.0].children() {
        apply_formula(nodes, child, formula, closure_names);
    }
    let current = &nodes[node.0];
    let local = match &current.kind {
        NodeKind::Leaf { .. } => formula.extract_where(|c| {
            let names = c.names();
            !c.is_kleene()
                && !(c.is_predicate() && !names.is_disjoint(closure_names))
                && names.is_subset(&current.names)
        }),
        NodeKind::KleeneClosure { .. } => {
            let local = formula.get_formula_of(&current.names, true);
            formula.consume_formula_of(&current.names, true);
            local
        }
        NodeKind::Binary { .. } | NodeKind::Negation { .. } => {
            formula.extract_where(|c| c.names().is_subset(&current.names))
        }
    };
    nodes[node.0].condition.extend(local);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::Event;
    use crate::query_api::{Condition, Operand, RelOp};

    fn event(event_type: &str, ts: i64) -> SharedEvent {
        Arc::new(Event::new(event_type, ts))
    }

    fn valued(event_type: &str, ts: i64, x: i64) -> SharedEvent {
        Arc::new(Event::new(event_type, ts).with_attribute("x", x))
    }

    fn trivial_plan(pattern: &Pattern) -> TreePlan {
        let mut root = TreePlanNode::leaf(0);
        for index in 1..pattern.arg_count() {
            let operator = match (pattern.top_operator(), index >= pattern.positive_arg_count()) {
                (crate::query_api::TopOperator::And, false) => OperatorType::And,
                (crate::query_api::TopOperator::And, true) => OperatorType::NegativeAnd,
                (_, false) => OperatorType::Seq,
                (_, true) => OperatorType::NegativeSeq,
            };
            root = TreePlanNode::binary(operator, root, TreePlanNode::leaf(index));
        }
        TreePlan::new(root)
    }

    fn tree(pattern: &Pattern) -> Tree {
        Tree::new(&trivial_plan(pattern), pattern, &TreeParameters::default()).unwrap()
    }

    fn run(tree: &mut Tree, events: Vec<SharedEvent>) -> Vec<Vec<i64>> {
        for event in events {
            tree.handle_event(event).unwrap();
        }
        tree.get_last_matches()
            .unwrap()
            .iter()
            .map(|m| m.timestamps())
            .collect()
    }

    #[test]
    fn test_kleene_enumerates_every_bounded_combination() {
        let pattern = Pattern::new(
            PatternStructure::kleene(PatternStructure::primitive("A", "a"), 1, Some(2)),
            CompositeFormula::new(),
            100,
        )
        .unwrap();
        let mut tree = tree(&pattern);
        tree.handle_event(event("A", 1)).unwrap();
        tree.handle_event(event("A", 2)).unwrap();
        tree.get_matches();
        tree.handle_event(event("A", 3)).unwrap();
        let produced: Vec<Vec<i64>> = tree.get_matches().iter().map(|m| m.timestamps()).collect();
        assert_eq!(produced, vec![vec![3], vec![1, 3], vec![2, 3]]);
        assert_eq!(tree.get_structure_summary(), "KC(a)");
    }

    #[test]
    fn test_matches_never_exceed_window() {
        let pattern = Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
            ]),
            CompositeFormula::new(),
            5,
        )
        .unwrap();
        let mut tree = tree(&pattern);
        let produced = run(
            &mut tree,
            vec![event("A", 0), event("A", 4), event("B", 5), event("B", 10)],
        );
        assert_eq!(produced, vec![vec![0, 5], vec![4, 5]]);
    }

    #[test]
    fn test_sequence_order_is_enforced() {
        let pattern = Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
            ]),
            CompositeFormula::new(),
            100,
        )
        .unwrap();
        let mut tree = tree(&pattern);
        let produced = run(&mut tree, vec![event("B", 1), event("A", 2), event("B", 3)]);
        assert_eq!(produced, vec![vec![2, 3]]);
    }

    #[test]
    fn test_each_condition_is_placed_once() {
        let condition = CompositeFormula::new()
            .and(Condition::compare(
                Operand::attr("a", "x"),
                RelOp::Gt,
                Operand::constant(0i64),
            ))
            .and(Condition::compare(
                Operand::attr("a", "x"),
                RelOp::Lt,
                Operand::attr("b", "x"),
            ))
            .and(Condition::compare(
                Operand::attr("b", "x"),
                RelOp::Lt,
                Operand::attr("c", "x"),
            ));
        let pattern = Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
                PatternStructure::primitive("C", "c"),
            ]),
            condition,
            100,
        )
        .unwrap();
        let tree = tree(&pattern);
        let placed: usize = tree
            .nodes()
            .iter()
            .map(|n| n.condition().get_num_conditions())
            .sum();
        assert_eq!(placed, 3);
        // a.x > 0 at leaf a, a < b at SEQ(a, b), b < c at the root
        let root = tree.node(tree.root()).unwrap();
        assert_eq!(root.condition().get_num_conditions(), 1);
        assert_eq!(tree.get_structure_summary(), "SEQ(SEQ(a, b), c)");

        let mut tree = tree;
        let produced = run(
            &mut tree,
            vec![
                valued("A", 1, 0),
                valued("A", 2, 3),
                valued("B", 3, 5),
                valued("C", 4, 4),
                valued("C", 5, 9),
            ],
        );
        assert_eq!(produced, vec![vec![2, 3, 5]]);
    }

    #[test]
    fn test_kleene_condition_stays_on_closure() {
        let condition = CompositeFormula::new().and(Condition::consecutive("a", "x", RelOp::Lt));
        let pattern = Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::kleene(PatternStructure::primitive("A", "a"), 2, None),
                PatternStructure::primitive("B", "b"),
            ]),
            condition,
            100,
        )
        .unwrap();
        let tree = tree(&pattern);
        let closure = tree
            .nodes()
            .iter()
            .find(|n| matches!(n.kind, NodeKind::KleeneClosure { .. }))
            .unwrap();
        assert_eq!(closure.condition().get_num_conditions(), 1);

        let mut tree = tree;
        let produced = run(
            &mut tree,
            vec![valued("A", 1, 1), valued("A", 2, 5), valued("A", 3, 2), valued("B", 4, 0)],
        );
        // increasing runs of length >= 2 only
        assert_eq!(produced, vec![vec![1, 2, 4], vec![1, 3, 4]]);
    }

    #[test]
    fn test_predicate_over_closure_sees_every_event() {
        let within_budget = Condition::predicate(&["a"], "sum(a.x) <= 3", |bindings| {
            bindings
                .get("a")
                .map(|events| {
                    events
                        .iter()
                        .filter_map(|e| e.get("x").and_then(|v| v.as_f64()))
                        .sum::<f64>()
                        <= 3.0
                })
                .unwrap_or(true)
        });
        let pattern = Pattern::new(
            PatternStructure::kleene(PatternStructure::primitive("A", "a"), 1, None),
            CompositeFormula::new().and(within_budget),
            100,
        )
        .unwrap();
        let mut tree = tree(&pattern);
        let leaf = tree
            .nodes()
            .iter()
            .find(|n| n.is_leaf())
            .unwrap();
        assert!(leaf.condition().is_empty());

        let produced = run(&mut tree, vec![valued("A", 1, 2), valued("A", 2, 2)]);
        assert_eq!(produced, vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_plan_mismatch_is_rejected() {
        let pattern = Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("B", "b"),
            ]),
            CompositeFormula::new(),
            100,
        )
        .unwrap();
        let plan = TreePlan::new(TreePlanNode::binary(
            OperatorType::Seq,
            TreePlanNode::leaf(0),
            TreePlanNode::leaf(7),
        ));
        assert!(Tree::new(&plan, &pattern, &TreeParameters::default()).is_err());
    }

    #[test]
    fn test_unbounded_negation_waits_for_window() {
        let pattern = Pattern::new(
            PatternStructure::seq(vec![
                PatternStructure::primitive("A", "a"),
                PatternStructure::primitive("C", "c"),
                PatternStructure::negation(PatternStructure::primitive("B", "b")),
            ]),
            CompositeFormula::new(),
            10,
        )
        .unwrap();
        let mut tree = tree(&pattern);
        assert_eq!(tree.get_structure_summary(), "NSEQ(SEQ(a, c), b)");
        tree.handle_event(event("A", 0)).unwrap();
        tree.handle_event(event("C", 2)).unwrap();
        tree.handle_event(event("A", 20)).unwrap();
        tree.handle_event(event("C", 21)).unwrap();
        // the first match is released once the clock passes its window
        assert_eq!(
            tree.get_matches().iter().map(|m| m.timestamps()).collect::<Vec<_>>(),
            vec![vec![0, 2]]
        );
        tree.handle_event(event("B", 25)).unwrap();
        assert!(tree.get_last_matches().unwrap().is_empty());
    }
}
