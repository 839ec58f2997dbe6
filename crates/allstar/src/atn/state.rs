use once_cell::sync::OnceCell;
use std::fmt;

use super::Transition;
use crate::interval::IntervalSet;

/// Kind-specific payload of an ATN state
///
/// Paired states (block start/end, loop entry/back/end, rule start/stop)
/// reference each other by state number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum AtnStateKind {
    Basic,
    RuleStart {
        stop_state: usize,
        is_left_recursive: bool,
    },
    RuleStop,
    BlockStart {
        block: BlockKind,
        end_state: usize,
    },
    BlockEnd {
        start_state: usize,
    },
    StarLoopEntry {
        loop_back_state: usize,
        /// Entry of the operator loop of a left-recursive rule
        is_precedence_decision: bool,
    },
    StarLoopBack,
    PlusLoopBack,
    LoopEnd {
        loop_back_state: usize,
    },
    /// Entry state of a lexer mode
    TokensStart,
}

/// Flavour of a block start state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockKind {
    Basic,
    Plus { loop_back_state: usize },
    Star,
}

impl AtnStateKind {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Basic => "BASIC",
            Self::RuleStart { .. } => "RULE_START",
            Self::RuleStop => "RULE_STOP",
            Self::BlockStart {
                block: BlockKind::Basic,
                ..
            } => "BLOCK_START",
            Self::BlockStart {
                block: BlockKind::Plus { .. },
                ..
            } => "PLUS_BLOCK_START",
            Self::BlockStart {
                block: BlockKind::Star,
                ..
            } => "STAR_BLOCK_START",
            Self::BlockEnd { .. } => "BLOCK_END",
            Self::StarLoopEntry { .. } => "STAR_LOOP_ENTRY",
            Self::StarLoopBack => "STAR_LOOP_BACK",
            Self::PlusLoopBack => "PLUS_LOOP_BACK",
            Self::LoopEnd { .. } => "LOOP_END",
            Self::TokensStart => "TOKEN_START",
        }
    }
}

/// Node of the ATN
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct AtnState {
    pub state_number: usize,
    pub rule_index: usize,
    pub kind: AtnStateKind,
    /// Decision number when this state chooses between alternatives
    pub decision: Option<usize>,
    pub non_greedy: bool,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) epsilon_only: bool,
    /// Lookahead within the rule, computed on first use
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub(crate) next_tokens: OnceCell<IntervalSet>,
}

impl AtnState {
    #[must_use]
    pub fn new(state_number: usize, rule_index: usize, kind: AtnStateKind) -> Self {
        Self {
            state_number,
            rule_index,
            kind,
            decision: None,
            non_greedy: false,
            transitions: Vec::new(),
            epsilon_only: false,
            next_tokens: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[must_use]
    pub fn transition(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    pub(crate) fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    /// Recompute the epsilon-only flag after transitions changed
    pub(crate) fn seal(&mut self) {
        self.epsilon_only =
            !self.transitions.is_empty() && self.transitions.iter().all(Transition::is_epsilon);
    }

    /// True when every outgoing edge is zero-width; such states never appear
    /// in a reach set on their own
    #[must_use]
    pub const fn only_has_epsilon_transitions(&self) -> bool {
        self.epsilon_only
    }

    #[must_use]
    pub const fn is_rule_stop(&self) -> bool {
        matches!(self.kind, AtnStateKind::RuleStop)
    }

    #[must_use]
    pub const fn is_decision(&self) -> bool {
        self.decision.is_some()
    }

    #[must_use]
    pub const fn is_precedence_decision(&self) -> bool {
        matches!(
            self.kind,
            AtnStateKind::StarLoopEntry {
                is_precedence_decision: true,
                ..
            }
        )
    }
}

impl fmt::Display for AtnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state_number)
    }
}
