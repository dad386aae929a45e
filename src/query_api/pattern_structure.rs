// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;
use std::fmt;

/// Operator tree of a pattern
#[derive(Debug, Clone, PartialEq)]
pub enum PatternStructure {
    /// A single event of `event_type`, bound to `name`
    Primitive { event_type: String, name: String },
    /// Arguments must occur in order
    Seq(Vec<PatternStructure>),
    /// Arguments must all occur, in any order
    And(Vec<PatternStructure>),
    /// Between `min_size` and `max_size` (unbounded when `None`) occurrences of `arg`
    KleeneClosure {
        arg: Box<PatternStructure>,
        min_size: usize,
        max_size: Option<usize>,
    },
    /// `arg` must not occur
    Negation(Box<PatternStructure>),
}

/// Top-level operator of a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopOperator {
    Primitive,
    Seq,
    And,
    KleeneClosure,
    Negation,
}

/// A primitive event of the pattern together with its position.
///
/// `index` numbers the primitives of the full structure depth-first; sequence
/// ordering between events is decided by comparing these indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveEventDefinition {
    pub event_type: String,
    pub name: String,
    pub index: usize,
}

impl PatternStructure {
    pub fn primitive(event_type: impl Into<String>, name: impl Into<String>) -> Self {
        PatternStructure::Primitive {
            event_type: event_type.into(),
            name: name.into(),
        }
    }

    pub fn seq(args: Vec<PatternStructure>) -> Self {
        PatternStructure::Seq(args)
    }

    pub fn and(args: Vec<PatternStructure>) -> Self {
        PatternStructure::And(args)
    }

    pub fn kleene(arg: PatternStructure, min_size: usize, max_size: Option<usize>) -> Self {
        PatternStructure::KleeneClosure {
            arg: Box::new(arg),
            min_size,
            max_size,
        }
    }

    pub fn negation(arg: PatternStructure) -> Self {
        PatternStructure::Negation(Box::new(arg))
    }

    pub fn top_operator(&self) -> TopOperator {
        match self {
            PatternStructure::Primitive { .. } => TopOperator::Primitive,
            PatternStructure::Seq(_) => TopOperator::Seq,
            PatternStructure::And(_) => TopOperator::And,
            PatternStructure::KleeneClosure { .. } => TopOperator::KleeneClosure,
            PatternStructure::Negation(_) => TopOperator::Negation,
        }
    }

    /// Arguments for tree construction: composite args, the unary arg, or the primitive itself
    pub fn get_args(&self) -> Vec<&PatternStructure> {
        match self {
            PatternStructure::Seq(args) | PatternStructure::And(args) => args.iter().collect(),
            PatternStructure::KleeneClosure { arg, .. } | PatternStructure::Negation(arg) => {
                vec![arg.as_ref()]
            }
            PatternStructure::Primitive { .. } => vec![self],
        }
    }

    #[inline]
    pub fn is_composite(&self) -> bool {
        matches!(self, PatternStructure::Seq(_) | PatternStructure::And(_))
    }

    /// Depth-first list of the primitive events, numbered from `first_index`
    pub fn primitive_events_from(&self, first_index: usize) -> Vec<PrimitiveEventDefinition> {
        let mut out = Vec::new();
        self.collect_primitives(first_index, &mut out);
        out
    }

    fn collect_primitives(&self, first_index: usize, out: &mut Vec<PrimitiveEventDefinition>) {
        match self {
            PatternStructure::Primitive { event_type, name } => {
                out.push(PrimitiveEventDefinition {
                    event_type: event_type.clone(),
                    name: name.clone(),
                    index: first_index + out.len(),
                });
            }
            PatternStructure::Seq(args) | PatternStructure::And(args) => {
                for arg in args {
                    arg.collect_primitives(first_index, out);
                }
            }
            PatternStructure::KleeneClosure { arg, .. } | PatternStructure::Negation(arg) => {
                arg.collect_primitives(first_index, out)
            }
        }
    }

    /// Names of all primitive events in the structure
    pub fn names(&self) -> BTreeSet<String> {
        self.primitive_events_from(0)
            .into_iter()
            .map(|p| p.name)
            .collect()
    }

    /// Number of primitive events in the structure
    pub fn primitive_count(&self) -> usize {
        self.primitive_events_from(0).len()
    }

    pub fn contains_negation(&self) -> bool {
        match self {
            PatternStructure::Primitive { .. } => false,
            PatternStructure::Negation(_) => true,
            PatternStructure::Seq(args) | PatternStructure::And(args) => {
                args.iter().any(|a| a.contains_negation())
            }
            PatternStructure::KleeneClosure { arg, .. } => arg.contains_negation(),
        }
    }
}

impl fmt::Display for PatternStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |args: &[PatternStructure]| {
            args.iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            PatternStructure::Primitive { event_type, name } => write!(f, "{} {}", event_type, name),
            PatternStructure::Seq(args) => write!(f, "SEQ({})", join(args)),
            PatternStructure::And(args) => write!(f, "AND({})", join(args)),
            PatternStructure::KleeneClosure {
                arg,
                min_size,
                max_size,
            } => match max_size {
                Some(max) => write!(f, "KC({}){{{},{}}}", arg, min_size, max),
                None => write!(f, "KC({}){{{},}}", arg, min_size),
            },
            PatternStructure::Negation(arg) => write!(f, "NOT({})", arg),
        }
    }
}
