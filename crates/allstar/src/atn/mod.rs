//! # ATN Graph
//!
//! The augmented transition network a grammar compiles to: states connected
//! by symbol-consuming and zero-width transitions, one sub-automaton per rule.
//! The same representation drives both lexers (symbols are code points) and
//! parsers (symbols are token types).
//!
//! An [`Atn`] is immutable once built. Use [`AtnBuilder`] to construct one
//! in code, or deserialize one with the `serialize` feature and call
//! [`Atn::validate`].

mod builder;
mod ll1;
mod state;
mod transition;

pub use builder::{AtnBuilder, Fragment};
pub use state::{AtnState, AtnStateKind, BlockKind};
pub use transition::Transition;

use std::fmt;
use std::sync::Arc;

use crate::context::RuleContext;
use crate::error::AtnError;
use crate::interval::{IntervalSet, EOF, EPSILON};
use crate::lexer::LexerAction;

/// What the ATN recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum AtnType {
    Lexer,
    Parser,
}

impl fmt::Display for AtnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lexer => "lexer",
            Self::Parser => "parser",
        })
    }
}

/// Immutable grammar automaton
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Atn {
    pub grammar_type: AtnType,
    /// Largest token type of the vocabulary
    pub max_token_type: i32,
    pub states: Vec<AtnState>,
    /// Decision number to decision state
    pub decision_to_state: Vec<usize>,
    pub rule_to_start_state: Vec<usize>,
    pub rule_to_stop_state: Vec<usize>,
    /// Lexer only: token type emitted by each rule
    pub rule_to_token_type: Vec<i32>,
    /// Lexer only: start state of each mode
    pub mode_to_start_state: Vec<usize>,
    /// Lexer only: actions referenced by action transitions
    pub lexer_actions: Vec<LexerAction>,
}

impl Atn {
    #[must_use]
    pub fn new(grammar_type: AtnType, max_token_type: i32) -> Self {
        Self {
            grammar_type,
            max_token_type,
            states: Vec::new(),
            decision_to_state: Vec::new(),
            rule_to_start_state: Vec::new(),
            rule_to_stop_state: Vec::new(),
            rule_to_token_type: Vec::new(),
            mode_to_start_state: Vec::new(),
            lexer_actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self, state: usize) -> Option<&AtnState> {
        self.states.get(state)
    }

    #[must_use]
    pub fn decision_state(&self, decision: usize) -> Option<&AtnState> {
        self.decision_to_state
            .get(decision)
            .and_then(|&state| self.states.get(state))
    }

    #[must_use]
    pub fn number_of_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    #[must_use]
    pub fn number_of_rules(&self) -> usize {
        self.rule_to_start_state.len()
    }

    #[must_use]
    pub fn is_left_recursive(&self, rule: usize) -> bool {
        self.rule_to_start_state
            .get(rule)
            .and_then(|&state| self.states.get(state))
            .is_some_and(|state| {
                matches!(
                    state.kind,
                    AtnStateKind::RuleStart {
                        is_left_recursive: true,
                        ..
                    }
                )
            })
    }

    /// Follow state of the rule transition leaving `invoking_state`
    #[must_use]
    pub fn rule_follow_state(&self, invoking_state: usize) -> Option<usize> {
        match self.states.get(invoking_state)?.transitions.first()? {
            Transition::Rule { follow_state, .. } => Some(*follow_state),
            _ => None,
        }
    }

    /// Symbols that can follow `state` within its rule, computed once
    ///
    /// Contains [`EPSILON`] when the end of the rule is reachable without
    /// consuming input.
    #[must_use]
    pub fn next_tokens(&self, state: usize) -> &IntervalSet {
        static EMPTY: once_cell::sync::Lazy<IntervalSet> =
            once_cell::sync::Lazy::new(IntervalSet::new);
        match self.states.get(state) {
            Some(s) => s.next_tokens.get_or_init(|| self.look(state, None, None)),
            None => &EMPTY,
        }
    }

    /// Symbols that can follow `state` given the parser's invocation stack
    ///
    /// Walks outward through the callers while the rule end is reachable and
    /// adds [`EOF`] when the outermost rule can finish.
    #[must_use]
    pub fn expected_tokens(&self, state: usize, context: Option<&Arc<RuleContext>>) -> IntervalSet {
        let mut following = self.next_tokens(state).clone();
        if !following.contains(EPSILON) {
            return following;
        }
        let mut expected = following.clone();
        expected.remove(EPSILON);
        let mut current = context;
        while let Some(frame) = current {
            let (Some(invoking), Some(parent)) = (frame.invoking_state, frame.parent.as_ref()) else {
                break;
            };
            if !following.contains(EPSILON) {
                break;
            }
            let Some(follow) = self.rule_follow_state(invoking) else {
                break;
            };
            following = self.next_tokens(follow).clone();
            expected.add_set(&following);
            expected.remove(EPSILON);
            current = Some(parent);
        }
        if following.contains(EPSILON) {
            expected.add(EOF);
        }
        expected
    }

    /// Check the invariants simulation relies on
    ///
    /// Every reference must name an existing state, rules must have stop
    /// states, lexers may not use precedence predicates, action indexes must
    /// exist and no loop may be traversable without consuming input.
    pub fn validate(&self) -> Result<(), AtnError> {
        let n = self.states.len();
        let check = |state: usize, target: usize| {
            if target < n {
                Ok(())
            } else {
                Err(AtnError::invalid_state(state, target))
            }
        };

        if self.rule_to_stop_state.len() < self.rule_to_start_state.len() {
            return Err(AtnError::MissingRuleStop {
                rule: self.rule_to_stop_state.len(),
            });
        }
        for (rule, &start) in self.rule_to_start_state.iter().enumerate() {
            check(start, start)?;
            let stop = self.rule_to_stop_state[rule];
            check(start, stop)?;
            if !self.states[stop].is_rule_stop() {
                return Err(AtnError::MissingRuleStop { rule });
            }
        }
        for &state in self
            .decision_to_state
            .iter()
            .chain(self.mode_to_start_state.iter())
        {
            check(state, state)?;
        }

        for state in &self.states {
            for transition in &state.transitions {
                check(state.state_number, transition.target())?;
                match transition {
                    Transition::Rule {
                        follow_state,
                        rule_index,
                        ..
                    } => {
                        check(state.state_number, *follow_state)?;
                        if *rule_index >= self.rule_to_start_state.len() {
                            return Err(AtnError::UnknownRule { rule: *rule_index });
                        }
                    }
                    Transition::Precedence { .. } if self.grammar_type == AtnType::Lexer => {
                        return Err(AtnError::PrecedenceInLexer {
                            state: state.state_number,
                        });
                    }
                    Transition::Action {
                        action_index: Some(index),
                        ..
                    } if self.grammar_type == AtnType::Lexer
                        && *index >= self.lexer_actions.len() =>
                    {
                        return Err(AtnError::UnknownAction {
                            state: state.state_number,
                            index: *index,
                        });
                    }
                    _ => {}
                }
            }
        }

        self.check_epsilon_cycles()
    }

    /// Rules that can finish without consuming input
    fn nullable_rules(&self) -> Vec<bool> {
        let mut nullable = vec![false; self.rule_to_start_state.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (rule, &start) in self.rule_to_start_state.iter().enumerate() {
                if nullable[rule] {
                    continue;
                }
                let stop = self.rule_to_stop_state[rule];
                let mut seen = vec![false; self.states.len()];
                let mut pending = vec![start];
                while let Some(state) = pending.pop() {
                    if state == stop {
                        nullable[rule] = true;
                        changed = true;
                        break;
                    }
                    if std::mem::replace(&mut seen[state], true) || self.states[state].is_rule_stop() {
                        continue;
                    }
                    for transition in &self.states[state].transitions {
                        match transition {
                            Transition::Rule {
                                rule_index,
                                follow_state,
                                ..
                            } => {
                                if nullable[*rule_index] {
                                    pending.push(*follow_state);
                                }
                            }
                            t if t.is_epsilon() => pending.push(t.target()),
                            _ => {}
                        }
                    }
                }
            }
        }
        nullable
    }

    /// Depth-first search over zero-width edges
    ///
    /// A rule invocation leads into the callee, and past the call when the
    /// callee is nullable, so left recursion counts as a cycle. Rule returns
    /// are not followed.
    fn check_epsilon_cycles(&self) -> Result<(), AtnError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        let nullable = self.nullable_rules();
        let zero_width = |state: &AtnState| -> Vec<usize> {
            if state.is_rule_stop() {
                return Vec::new();
            }
            let mut targets = Vec::new();
            for transition in state.transitions.iter().filter(|t| t.is_epsilon()) {
                targets.push(transition.target());
                if let Transition::Rule {
                    rule_index,
                    follow_state,
                    ..
                } = transition
                {
                    if nullable[*rule_index] {
                        targets.push(*follow_state);
                    }
                }
            }
            targets
        };

        let mut marks = vec![Mark::Unvisited; self.states.len()];
        for root in 0..self.states.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            let mut stack = vec![(root, zero_width(&self.states[root]), 0usize)];
            marks[root] = Mark::Active;
            while let Some((state, targets, next)) = stack.last_mut() {
                if let Some(&target) = targets.get(*next) {
                    *next += 1;
                    match marks[target] {
                        Mark::Active => return Err(AtnError::EpsilonCycle { state: target }),
                        Mark::Done => {}
                        Mark::Unvisited => {
                            marks[target] = Mark::Active;
                            let children = zero_width(&self.states[target]);
                            stack.push((target, children, 0));
                        }
                    }
                } else {
                    marks[*state] = Mark::Done;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_dangling_target() {
        let mut atn = Atn::new(AtnType::Parser, 1);
        let mut state = AtnState::new(0, 0, AtnStateKind::Basic);
        state.add_transition(Transition::epsilon(5));
        atn.states.push(state);
        assert_eq!(atn.validate(), Err(AtnError::invalid_state(0, 5)));
    }

    #[test]
    fn test_validate_rejects_epsilon_cycle() {
        let mut atn = Atn::new(AtnType::Parser, 1);
        for i in 0..2 {
            let mut state = AtnState::new(i, 0, AtnStateKind::Basic);
            state.add_transition(Transition::epsilon(1 - i));
            atn.states.push(state);
        }
        assert!(matches!(atn.validate(), Err(AtnError::EpsilonCycle { .. })));
    }

    #[test]
    fn test_validate_rejects_precedence_in_lexer() {
        let mut atn = Atn::new(AtnType::Lexer, 0);
        let mut state = AtnState::new(0, 0, AtnStateKind::Basic);
        state.add_transition(Transition::Precedence {
            target: 1,
            precedence: 1,
        });
        atn.states.push(state);
        atn.states.push(AtnState::new(1, 0, AtnStateKind::Basic));
        assert_eq!(
            atn.validate(),
            Err(AtnError::PrecedenceInLexer { state: 0 })
        );
    }
}
