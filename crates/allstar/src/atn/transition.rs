use std::fmt;

use crate::interval::IntervalSet;

/// Edge of the ATN, owned by its source state
///
/// Every variant stores its target state index. Epsilon-like variants
/// (epsilon, rule, predicates, action) never consume input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Transition {
    Epsilon {
        target: usize,
        /// Set on follow links leaving the stop state of a left-recursive rule:
        /// the index of that rule when the return ends its outermost
        /// precedence invocation.
        outermost_precedence_return: Option<usize>,
    },
    Atom {
        target: usize,
        label: i32,
    },
    Range {
        target: usize,
        start: i32,
        stop: i32,
    },
    Set {
        target: usize,
        set: IntervalSet,
    },
    NotSet {
        target: usize,
        set: IntervalSet,
    },
    Wildcard {
        target: usize,
    },
    /// Invokes a rule; `target` is the rule's start state
    Rule {
        target: usize,
        rule_index: usize,
        precedence: i32,
        follow_state: usize,
    },
    Predicate {
        target: usize,
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    Precedence {
        target: usize,
        precedence: i32,
    },
    Action {
        target: usize,
        rule_index: usize,
        action_index: Option<usize>,
        is_ctx_dependent: bool,
    },
}

impl Transition {
    #[must_use]
    pub const fn epsilon(target: usize) -> Self {
        Self::Epsilon {
            target,
            outermost_precedence_return: None,
        }
    }

    #[must_use]
    pub const fn target(&self) -> usize {
        match self {
            Self::Epsilon { target, .. }
            | Self::Atom { target, .. }
            | Self::Range { target, .. }
            | Self::Set { target, .. }
            | Self::NotSet { target, .. }
            | Self::Wildcard { target }
            | Self::Rule { target, .. }
            | Self::Predicate { target, .. }
            | Self::Precedence { target, .. }
            | Self::Action { target, .. } => *target,
        }
    }

    /// Zero-width transitions followed by closure
    #[must_use]
    pub const fn is_epsilon(&self) -> bool {
        matches!(
            self,
            Self::Epsilon { .. }
                | Self::Rule { .. }
                | Self::Predicate { .. }
                | Self::Precedence { .. }
                | Self::Action { .. }
        )
    }

    /// Predicate or precedence predicate
    #[must_use]
    pub const fn is_predicate(&self) -> bool {
        matches!(self, Self::Predicate { .. } | Self::Precedence { .. })
    }

    #[must_use]
    pub const fn outermost_precedence_return(&self) -> Option<usize> {
        match self {
            Self::Epsilon {
                outermost_precedence_return,
                ..
            } => *outermost_precedence_return,
            _ => None,
        }
    }

    /// The symbols this transition is labelled with
    ///
    /// For a not-set transition this is the excluded set, not its complement.
    #[must_use]
    pub fn label(&self) -> Option<IntervalSet> {
        match self {
            Self::Atom { label, .. } => Some(IntervalSet::of(*label)),
            Self::Range { start, stop, .. } => Some(IntervalSet::of_range(*start, *stop)),
            Self::Set { set, .. } | Self::NotSet { set, .. } => Some(set.clone()),
            _ => None,
        }
    }

    /// Does `symbol` follow this edge, given the vocabulary bounds
    #[must_use]
    pub fn matches(&self, symbol: i32, min_vocab: i32, max_vocab: i32) -> bool {
        match self {
            Self::Atom { label, .. } => *label == symbol,
            Self::Range { start, stop, .. } => *start <= symbol && symbol <= *stop,
            Self::Set { set, .. } => set.contains(symbol),
            Self::NotSet { set, .. } => {
                symbol >= min_vocab && symbol <= max_vocab && !set.contains(symbol)
            }
            Self::Wildcard { .. } => symbol >= min_vocab && symbol <= max_vocab,
            _ => false,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsilon { target, .. } => write!(f, "ε->{target}"),
            Self::Atom { label, target } => write!(f, "{label}->{target}"),
            Self::Range {
                start,
                stop,
                target,
            } => write!(f, "{start}..{stop}->{target}"),
            Self::Set { set, target } => write!(f, "{set}->{target}"),
            Self::NotSet { set, target } => write!(f, "~{set}->{target}"),
            Self::Wildcard { target } => write!(f, ".->{target}"),
            Self::Rule {
                rule_index, target, ..
            } => write!(f, "rule {rule_index}->{target}"),
            Self::Predicate {
                rule_index,
                pred_index,
                target,
                ..
            } => write!(f, "pred_{rule_index}:{pred_index}->{target}"),
            Self::Precedence { precedence, target } => {
                write!(f, "{precedence} >= _p->{target}")
            }
            Self::Action {
                rule_index,
                action_index,
                target,
                ..
            } => match action_index {
                Some(index) => write!(f, "action_{rule_index}:{index}->{target}"),
                None => write!(f, "action_{rule_index}->{target}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_classification() {
        assert!(Transition::epsilon(1).is_epsilon());
        assert!(Transition::Precedence {
            target: 1,
            precedence: 2
        }
        .is_epsilon());
        assert!(!Transition::Atom {
            target: 1,
            label: 5
        }
        .is_epsilon());
        assert!(!Transition::Wildcard { target: 1 }.is_epsilon());
    }

    #[test]
    fn test_not_set_respects_vocabulary_bounds() {
        let t = Transition::NotSet {
            target: 0,
            set: IntervalSet::of(3),
        };
        assert!(t.matches(2, 1, 5));
        assert!(!t.matches(3, 1, 5));
        assert!(!t.matches(6, 1, 5));
        assert!(!t.matches(-1, 1, 5));
    }
}
