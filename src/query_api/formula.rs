// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pattern conditions.
//!
//! A [`CompositeFormula`] is a conjunction of [`Condition`]s over named event
//! bindings. When an evaluation tree is built, the composite formula of the pattern
//! is decomposed across the nodes: each node takes (and removes) the conditions it is
//! able to evaluate, so no condition is checked by two nodes.

use crate::core::event::{AttributeValue, Event, MatchedEvent};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Name -> bound events. A Kleene closure binds several events to one name;
/// they are kept in arrival order.
#[derive(Debug, Default)]
pub struct Bindings<'a> {
    map: HashMap<&'a str, Vec<(u64, &'a Event)>>,
}

impl<'a> Bindings<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_matched<I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a MatchedEvent>,
    {
        let mut bindings = Self::new();
        for matched in events {
            bindings.bind(&matched.name, matched.sequence, &matched.event);
        }
        bindings
    }

    /// Bind an event to a name; `sequence` orders events sharing a name
    pub fn bind(&mut self, name: &'a str, sequence: u64, event: &'a Event) {
        let slot = self.map.entry(name).or_default();
        let position = slot.partition_point(|(s, _)| *s < sequence);
        slot.insert(position, (sequence, event));
    }

    pub fn get(&self, name: &str) -> Option<Vec<&'a Event>> {
        self.map
            .get(name)
            .map(|events| events.iter().map(|(_, e)| *e).collect())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}

/// Relational operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl RelOp {
    #[inline]
    pub fn test(self, ordering: Ordering) -> bool {
        match self {
            RelOp::Eq => ordering == Ordering::Equal,
            RelOp::NotEq => ordering != Ordering::Equal,
            RelOp::Lt => ordering == Ordering::Less,
            RelOp::Le => ordering != Ordering::Greater,
            RelOp::Gt => ordering == Ordering::Greater,
            RelOp::Ge => ordering != Ordering::Less,
        }
    }

    pub const fn symbol(&self) -> &'static str {
        match self {
            RelOp::Eq => "==",
            RelOp::NotEq => "!=",
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        }
    }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `name.attribute` of the event(s) bound to `name`
    Attribute { name: String, attribute: String },
    Constant(AttributeValue),
}

impl Operand {
    pub fn attr(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Operand::Attribute {
            name: name.into(),
            attribute: attribute.into(),
        }
    }

    pub fn constant(value: impl Into<AttributeValue>) -> Self {
        Operand::Constant(value.into())
    }

    /// Values of the operand under the given bindings; `None` when its name is unbound.
    /// A missing attribute yields `None` inside the list.
    fn values<'b>(&'b self, bindings: &Bindings<'b>) -> Option<Vec<Option<&'b AttributeValue>>> {
        match self {
            Operand::Constant(value) => Some(vec![Some(value)]),
            Operand::Attribute { name, attribute } => bindings
                .get(name)
                .map(|events| events.into_iter().map(|e| e.get(attribute)).collect()),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Attribute { name, attribute } => write!(f, "{}.{}", name, attribute),
            Operand::Constant(value) => write!(f, "{}", value),
        }
    }
}

pub type PredicateFn = Arc<dyn for<'b> Fn(&Bindings<'b>) -> bool + Send + Sync>;

/// A single atomic condition
#[derive(Clone)]
pub enum Condition {
    /// `left op right`. With several events bound to a name, the comparison must
    /// hold for every pair of values.
    Compare {
        left: Operand,
        op: RelOp,
        right: Operand,
    },
    /// Kleene condition: `e[i].attribute op e[i+1].attribute` for every two
    /// consecutive events bound to `name`.
    Consecutive {
        name: String,
        attribute: String,
        op: RelOp,
    },
    /// Arbitrary predicate over the given names
    Predicate {
        names: BTreeSet<String>,
        label: String,
        func: PredicateFn,
    },
}

impl Condition {
    pub fn compare(left: Operand, op: RelOp, right: Operand) -> Self {
        Condition::Compare { left, op, right }
    }

    pub fn consecutive(name: impl Into<String>, attribute: impl Into<String>, op: RelOp) -> Self {
        Condition::Consecutive {
            name: name.into(),
            attribute: attribute.into(),
            op,
        }
    }

    pub fn predicate<F>(names: &[&str], label: impl Into<String>, func: F) -> Self
    where
        F: for<'b> Fn(&Bindings<'b>) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate {
            names: names.iter().map(|n| n.to_string()).collect(),
            label: label.into(),
            func: Arc::new(func),
        }
    }

    /// Free variables of the condition
    pub fn names(&self) -> BTreeSet<String> {
        match self {
            Condition::Compare { left, right, .. } => [left, right]
                .into_iter()
                .filter_map(|operand| match operand {
                    Operand::Attribute { name, .. } => Some(name.clone()),
                    Operand::Constant(_) => None,
                })
                .collect(),
            Condition::Consecutive { name, .. } => std::iter::once(name.clone()).collect(),
            Condition::Predicate { names, .. } => names.clone(),
        }
    }

    /// Conditions that only make sense over a Kleene closure's list of events
    #[inline]
    pub fn is_kleene(&self) -> bool {
        matches!(self, Condition::Consecutive { .. })
    }

    /// User predicates: opaque, so they cannot be split over the events of a name
    #[inline]
    pub fn is_predicate(&self) -> bool {
        matches!(self, Condition::Predicate { .. })
    }

    pub fn eval(&self, bindings: &Bindings<'_>) -> bool {
        match self {
            Condition::Compare { left, op, right } => {
                let (Some(lhs), Some(rhs)) = (left.values(bindings), right.values(bindings)) else {
                    return true;
                };
                lhs.iter().all(|l| {
                    rhs.iter().all(|r| match (l, r) {
                        (Some(l), Some(r)) => l.compare(r).map(|o| op.test(o)).unwrap_or(false),
                        _ => false,
                    })
                })
            }
            Condition::Consecutive {
                name,
                attribute,
                op,
            } => {
                let Some(events) = bindings.get(name) else {
                    return true;
                };
                events.windows(2).all(|pair| {
                    match (pair[0].get(attribute), pair[1].get(attribute)) {
                        (Some(a), Some(b)) => a.compare(b).map(|o| op.test(o)).unwrap_or(false),
                        _ => false,
                    }
                })
            }
            Condition::Predicate { func, .. } => func(bindings),
        }
    }

    fn is_relevant_to(&self, names: &BTreeSet<String>, strict: bool) -> bool {
        let own = self.names();
        if own.is_empty() {
            return false;
        }
        if strict {
            own.is_subset(names)
        } else {
            !own.is_disjoint(names)
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { left, op, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Condition::Consecutive {
                name,
                attribute,
                op,
            } => write!(f, "{name}[i].{attribute} {} {name}[i+1].{attribute}", op.symbol()),
            Condition::Predicate { label, names, .. } => write!(f, "{}({:?})", label, names),
        }
    }
}

/// A conjunction of conditions
#[derive(Debug, Clone, Default)]
pub struct CompositeFormula {
    conditions: Vec<Condition>,
}

impl CompositeFormula {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conditions(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    /// Builder-style conjunction
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// An empty formula is always satisfied
    pub fn eval(&self, bindings: &Bindings<'_>) -> bool {
        self.conditions.iter().all(|c| c.eval(bindings))
    }

    /// The sub-formula relevant to `names`.
    ///
    /// With `strict`, only conditions whose free variables are all among `names`;
    /// otherwise every condition mentioning at least one of them.
    pub fn get_formula_of(&self, names: &BTreeSet<String>, strict: bool) -> CompositeFormula {
        CompositeFormula::from_conditions(
            self.conditions
                .iter()
                .filter(|c| c.is_relevant_to(names, strict))
                .cloned()
                .collect(),
        )
    }

    /// Remove what [`get_formula_of`](Self::get_formula_of) would return for the same arguments
    pub fn consume_formula_of(&mut self, names: &BTreeSet<String>, strict: bool) {
        self.conditions.retain(|c| !c.is_relevant_to(names, strict));
    }

    /// Remove and return the conditions accepted by `predicate`
    pub fn extract_where<P>(&mut self, mut predicate: P) -> CompositeFormula
    where
        P: FnMut(&Condition) -> bool,
    {
        let (taken, kept): (Vec<_>, Vec<_>) =
            self.conditions.drain(..).partition(|c| predicate(c));
        self.conditions = kept;
        CompositeFormula::from_conditions(taken)
    }

    /// Append all conditions of another formula
    pub fn extend(&mut self, other: CompositeFormula) {
        self.conditions.extend(other.conditions);
    }

    #[inline]
    pub fn get_num_conditions(&self) -> usize {
        self.conditions.len()
    }

    #[inline]
    pub fn get_conditions_list(&self) -> &[Condition] {
        &self.conditions
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Union of the free variables of all conditions
    pub fn names(&self) -> BTreeSet<String> {
        self.conditions.iter().flat_map(|c| c.names()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    fn event(ts: i64, price: i64) -> Event {
        Event::new("A", ts).with_attribute("price", price)
    }

    #[test]
    fn test_compare_over_single_bindings() {
        let a = event(1, 10);
        let b = event(2, 20);
        let mut bindings = Bindings::new();
        bindings.bind("a", 1, &a);
        bindings.bind("b", 2, &b);
        let lt = Condition::compare(Operand::attr("a", "price"), RelOp::Lt, Operand::attr("b", "price"));
        let gt = Condition::compare(Operand::attr("a", "price"), RelOp::Gt, Operand::attr("b", "price"));
        assert!(lt.eval(&bindings));
        assert!(!gt.eval(&bindings));
    }

    #[test]
    fn test_compare_is_universal_over_kleene_bindings() {
        let a1 = event(1, 5);
        let a2 = event(2, 50);
        let mut bindings = Bindings::new();
        bindings.bind("a", 1, &a1);
        bindings.bind("a", 2, &a2);
        let above_10 = Condition::compare(Operand::attr("a", "price"), RelOp::Gt, Operand::constant(10i64));
        let above_1 = Condition::compare(Operand::attr("a", "price"), RelOp::Gt, Operand::constant(1i64));
        assert!(!above_10.eval(&bindings));
        assert!(above_1.eval(&bindings));
    }

    #[test]
    fn test_missing_attribute_fails() {
        let a = Event::new("A", 1);
        let mut bindings = Bindings::new();
        bindings.bind("a", 1, &a);
        let cond = Condition::compare(Operand::attr("a", "price"), RelOp::Eq, Operand::constant(1i64));
        assert!(!cond.eval(&bindings));
    }

    #[test]
    fn test_consecutive_uses_arrival_order() {
        let first = event(1, 1);
        let second = event(2, 2);
        let third = event(3, 3);
        let mut bindings = Bindings::new();
        // bound out of order on purpose
        bindings.bind("a", 3, &third);
        bindings.bind("a", 1, &first);
        bindings.bind("a", 2, &second);
        let increasing = Condition::consecutive("a", "price", RelOp::Lt);
        assert!(increasing.eval(&bindings));
        assert!(increasing.is_kleene());
    }

    #[test]
    fn test_get_and_consume_formula_of() {
        let mut formula = CompositeFormula::new()
            .and(Condition::compare(Operand::attr("a", "x"), RelOp::Lt, Operand::attr("b", "x")))
            .and(Condition::compare(Operand::attr("a", "x"), RelOp::Gt, Operand::constant(0i64)))
            .and(Condition::consecutive("c", "x", RelOp::Lt));

        let strict_a = formula.get_formula_of(&names(&["a"]), true);
        assert_eq!(strict_a.get_num_conditions(), 1);
        let loose_a = formula.get_formula_of(&names(&["a"]), false);
        assert_eq!(loose_a.get_num_conditions(), 2);

        formula.consume_formula_of(&names(&["a", "b"]), true);
        assert_eq!(formula.get_num_conditions(), 1);
        assert!(formula.names().contains("c"));
        assert!(!formula.names().contains("a"));
    }

    #[test]
    fn test_extract_where_removes_taken_conditions() {
        let mut formula = CompositeFormula::new()
            .and(Condition::consecutive("a", "x", RelOp::Lt))
            .and(Condition::compare(Operand::attr("a", "x"), RelOp::Gt, Operand::constant(0i64)));
        let taken = formula.extract_where(|c| !c.is_kleene());
        assert_eq!(taken.get_num_conditions(), 1);
        assert_eq!(formula.get_num_conditions(), 1);
        assert!(formula.get_conditions_list()[0].is_kleene());
    }

    #[test]
    fn test_predicate_condition() {
        let a = event(1, 7);
        let mut bindings = Bindings::new();
        bindings.bind("a", 1, &a);
        let odd = Condition::predicate(&["a"], "odd_price", |b: &Bindings<'_>| {
            b.get("a")
                .map(|events| {
                    events
                        .iter()
                        .all(|e| matches!(e.get("price"), Some(AttributeValue::Long(p)) if p % 2 == 1))
                })
                .unwrap_or(false)
        });
        assert!(odd.eval(&bindings));
        assert_eq!(odd.names(), names(&["a"]));
    }
}
