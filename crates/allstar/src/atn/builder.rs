//! Programmatic ATN construction
//!
//! Builds the same state shapes a grammar compiler produces: every construct
//! is a [`Fragment`] with one entry and one exit state, glued together with
//! epsilon transitions.

use super::{Atn, AtnState, AtnStateKind, AtnType, BlockKind, Transition};
use crate::error::AtnError;
use crate::interval::{IntervalSet, INVALID_TYPE};
use crate::lexer::LexerAction;

/// Sub-automaton with a single entry and a single exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub entry: usize,
    pub exit: usize,
}

/// Builder for lexer and parser ATNs
///
/// ```rust
/// use allstar::atn::AtnBuilder;
///
/// // s : A (B | C)* ;
/// let mut b = AtnBuilder::parser(3);
/// let s = b.rule();
/// let a = b.atom(s, 1);
/// let alt_b = b.atom(s, 2);
/// let alt_c = b.atom(s, 3);
/// let tail = b.star(s, vec![alt_b, alt_c], true);
/// let body = b.seq(s, [a, tail]);
/// b.set_rule_body(s, body);
/// let atn = b.build().unwrap();
/// assert_eq!(atn.number_of_decisions(), 2);
/// ```
#[derive(Debug)]
pub struct AtnBuilder {
    atn: Atn,
}

impl AtnBuilder {
    #[must_use]
    pub fn parser(max_token_type: i32) -> Self {
        Self {
            atn: Atn::new(AtnType::Parser, max_token_type),
        }
    }

    #[must_use]
    pub fn lexer() -> Self {
        Self {
            atn: Atn::new(AtnType::Lexer, crate::interval::MAX_CHAR),
        }
    }

    fn new_state(&mut self, rule: usize, kind: AtnStateKind) -> usize {
        let number = self.atn.states.len();
        self.atn.states.push(AtnState::new(number, rule, kind));
        number
    }

    fn basic(&mut self, rule: usize) -> usize {
        self.new_state(rule, AtnStateKind::Basic)
    }

    fn connect(&mut self, from: usize, transition: Transition) {
        self.atn.states[from].add_transition(transition);
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.connect(from, Transition::epsilon(to));
    }

    fn make_decision(&mut self, state: usize) {
        let decision = self.atn.decision_to_state.len();
        self.atn.decision_to_state.push(state);
        self.atn.states[state].decision = Some(decision);
    }

    fn edge(&mut self, rule: usize, make: impl FnOnce(usize) -> Transition) -> Fragment {
        let entry = self.basic(rule);
        let exit = self.basic(rule);
        self.connect(entry, make(exit));
        Fragment { entry, exit }
    }

    fn add_rule(&mut self, left_recursive: bool, token_type: i32) -> usize {
        let rule = self.atn.rule_to_start_state.len();
        let stop = self.new_state(rule, AtnStateKind::RuleStop);
        let start = self.new_state(
            rule,
            AtnStateKind::RuleStart {
                stop_state: stop,
                is_left_recursive: left_recursive,
            },
        );
        self.atn.rule_to_start_state.push(start);
        self.atn.rule_to_stop_state.push(stop);
        if self.atn.grammar_type == AtnType::Lexer {
            self.atn.rule_to_token_type.push(token_type);
        }
        rule
    }

    /// New parser rule; returns its index
    pub fn rule(&mut self) -> usize {
        self.add_rule(false, INVALID_TYPE)
    }

    /// New rule rewritten for left recursion; its operator loop should be
    /// built with [`AtnBuilder::precedence_loop`]
    pub fn left_recursive_rule(&mut self) -> usize {
        self.add_rule(true, INVALID_TYPE)
    }

    /// New lexer rule emitting `token_type`
    pub fn token_rule(&mut self, token_type: i32) -> usize {
        self.add_rule(false, token_type)
    }

    /// New lexer rule that is only invoked from other rules
    pub fn fragment_rule(&mut self) -> usize {
        self.add_rule(false, INVALID_TYPE)
    }

    /// Connect a rule's start and stop states through `body`
    pub fn set_rule_body(&mut self, rule: usize, body: Fragment) {
        let start = self.atn.rule_to_start_state[rule];
        let stop = self.atn.rule_to_stop_state[rule];
        self.epsilon(start, body.entry);
        self.epsilon(body.exit, stop);
    }

    /// Lexer mode made of `rules`, earlier rules winning ties; returns the
    /// mode number
    pub fn mode(&mut self, rules: &[usize]) -> usize {
        let start = self.new_state(0, AtnStateKind::TokensStart);
        self.make_decision(start);
        for &rule in rules {
            let target = self.atn.rule_to_start_state[rule];
            self.epsilon(start, target);
        }
        self.atn.mode_to_start_state.push(start);
        self.atn.mode_to_start_state.len() - 1
    }

    pub fn atom(&mut self, rule: usize, label: i32) -> Fragment {
        self.edge(rule, |target| Transition::Atom { target, label })
    }

    pub fn range(&mut self, rule: usize, start: i32, stop: i32) -> Fragment {
        self.edge(rule, |target| Transition::Range {
            target,
            start,
            stop,
        })
    }

    pub fn set(&mut self, rule: usize, set: IntervalSet) -> Fragment {
        self.edge(rule, |target| Transition::Set { target, set })
    }

    pub fn not_set(&mut self, rule: usize, set: IntervalSet) -> Fragment {
        self.edge(rule, |target| Transition::NotSet { target, set })
    }

    pub fn wildcard(&mut self, rule: usize) -> Fragment {
        self.edge(rule, |target| Transition::Wildcard { target })
    }

    /// Zero-width fragment
    pub fn empty(&mut self, rule: usize) -> Fragment {
        self.edge(rule, Transition::epsilon)
    }

    /// Lexer literal, one atom per character
    pub fn text(&mut self, rule: usize, text: &str) -> Fragment {
        let atoms: Vec<_> = text.chars().map(|c| self.atom(rule, c as i32)).collect();
        self.seq(rule, atoms)
    }

    /// Concatenation
    pub fn seq(&mut self, rule: usize, parts: impl IntoIterator<Item = Fragment>) -> Fragment {
        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return self.empty(rule);
        };
        let mut exit = first.exit;
        for part in parts {
            self.epsilon(exit, part.entry);
            exit = part.exit;
        }
        Fragment {
            entry: first.entry,
            exit,
        }
    }

    /// `(a | b | ...)`; a decision when there is more than one alternative
    pub fn alt_block(&mut self, rule: usize, alts: Vec<Fragment>) -> Fragment {
        self.block(rule, BlockKind::Basic, alts, false)
    }

    fn block(&mut self, rule: usize, block: BlockKind, alts: Vec<Fragment>, force: bool) -> Fragment {
        let end = self.new_state(rule, AtnStateKind::BlockEnd { start_state: 0 });
        let start = self.new_state(rule, AtnStateKind::BlockStart { block, end_state: end });
        self.atn.states[end].kind = AtnStateKind::BlockEnd { start_state: start };
        if alts.len() > 1 || force {
            self.make_decision(start);
        }
        for alt in alts {
            self.epsilon(start, alt.entry);
            self.epsilon(alt.exit, end);
        }
        Fragment {
            entry: start,
            exit: end,
        }
    }

    /// `x?`, or `x??` when not greedy
    pub fn optional(&mut self, rule: usize, body: Fragment, greedy: bool) -> Fragment {
        let bypass = self.empty(rule);
        let alts = if greedy {
            vec![body, bypass]
        } else {
            vec![bypass, body]
        };
        let fragment = self.block(rule, BlockKind::Basic, alts, true);
        self.atn.states[fragment.entry].non_greedy = !greedy;
        fragment
    }

    /// `(a | b)*`, or `*?` when not greedy
    pub fn star(&mut self, rule: usize, alts: Vec<Fragment>, greedy: bool) -> Fragment {
        self.star_loop(rule, alts, greedy, false)
    }

    /// Operator loop of a left-recursive rule
    ///
    /// Each alternative should start with a precedence predicate and end
    /// with a recursive [`AtnBuilder::rule_ref`] at the next precedence level.
    pub fn precedence_loop(&mut self, rule: usize, alts: Vec<Fragment>) -> Fragment {
        self.star_loop(rule, alts, true, true)
    }

    fn star_loop(
        &mut self,
        rule: usize,
        alts: Vec<Fragment>,
        greedy: bool,
        is_precedence_decision: bool,
    ) -> Fragment {
        let body = self.block(rule, BlockKind::Star, alts, false);
        let loop_back = self.new_state(rule, AtnStateKind::StarLoopBack);
        let entry = self.new_state(
            rule,
            AtnStateKind::StarLoopEntry {
                loop_back_state: loop_back,
                is_precedence_decision,
            },
        );
        let end = self.new_state(
            rule,
            AtnStateKind::LoopEnd {
                loop_back_state: loop_back,
            },
        );
        self.make_decision(entry);
        self.epsilon(body.exit, loop_back);
        self.epsilon(loop_back, entry);
        if greedy {
            self.epsilon(entry, body.entry);
            self.epsilon(entry, end);
        } else {
            self.atn.states[entry].non_greedy = true;
            self.epsilon(entry, end);
            self.epsilon(entry, body.entry);
        }
        Fragment { entry, exit: end }
    }

    /// `(a | b)+`, or `+?` when not greedy
    pub fn plus(&mut self, rule: usize, alts: Vec<Fragment>, greedy: bool) -> Fragment {
        let loop_back = self.new_state(rule, AtnStateKind::PlusLoopBack);
        let body = self.block(rule, BlockKind::Plus { loop_back_state: loop_back }, alts, false);
        let end = self.new_state(
            rule,
            AtnStateKind::LoopEnd {
                loop_back_state: loop_back,
            },
        );
        self.make_decision(loop_back);
        self.epsilon(body.exit, loop_back);
        if greedy {
            self.epsilon(loop_back, body.entry);
            self.epsilon(loop_back, end);
        } else {
            self.atn.states[loop_back].non_greedy = true;
            self.epsilon(loop_back, end);
            self.epsilon(loop_back, body.entry);
        }
        Fragment {
            entry: body.entry,
            exit: end,
        }
    }

    /// Invocation of `target_rule`; `precedence` is the level passed to a
    /// left-recursive rule and 0 otherwise
    pub fn rule_ref(&mut self, rule: usize, target_rule: usize, precedence: i32) -> Fragment {
        let start = self.atn.rule_to_start_state[target_rule];
        self.edge(rule, |follow_state| Transition::Rule {
            target: start,
            rule_index: target_rule,
            precedence,
            follow_state,
        })
    }

    /// Semantic predicate `pred_index` of `rule`
    pub fn predicate(&mut self, rule: usize, pred_index: usize, is_ctx_dependent: bool) -> Fragment {
        self.edge(rule, |target| Transition::Predicate {
            target,
            rule_index: rule,
            pred_index,
            is_ctx_dependent,
        })
    }

    /// `{precedence >= _p}?`
    pub fn precedence(&mut self, rule: usize, precedence: i32) -> Fragment {
        self.edge(rule, |target| Transition::Precedence { target, precedence })
    }

    /// Parser action `action_index` of `rule`
    pub fn action(&mut self, rule: usize, action_index: usize) -> Fragment {
        self.edge(rule, |target| Transition::Action {
            target,
            rule_index: rule,
            action_index: Some(action_index),
            is_ctx_dependent: false,
        })
    }

    /// Lexer command such as `-> skip` or `-> pushMode(X)`
    pub fn lexer_action(&mut self, rule: usize, action: LexerAction) -> Fragment {
        let index = match self.atn.lexer_actions.iter().position(|a| *a == action) {
            Some(index) => index,
            None => {
                self.atn.lexer_actions.push(action);
                self.atn.lexer_actions.len() - 1
            }
        };
        self.edge(rule, |target| Transition::Action {
            target,
            rule_index: rule,
            action_index: Some(index),
            is_ctx_dependent: false,
        })
    }

    /// Finish the ATN: add rule return links, seal states and validate
    pub fn build(mut self) -> Result<Atn, AtnError> {
        let mut returns = Vec::new();
        for state in &self.atn.states {
            for transition in state.transitions() {
                if let Transition::Rule {
                    rule_index,
                    precedence,
                    follow_state,
                    ..
                } = *transition
                {
                    let stop = *self
                        .atn
                        .rule_to_stop_state
                        .get(rule_index)
                        .ok_or(AtnError::UnknownRule { rule: rule_index })?;
                    let outermost = (self.atn.is_left_recursive(rule_index) && precedence == 0)
                        .then_some(rule_index);
                    returns.push((stop, follow_state, outermost));
                }
            }
        }
        for (stop, follow_state, outermost_precedence_return) in returns {
            self.connect(
                stop,
                Transition::Epsilon {
                    target: follow_state,
                    outermost_precedence_return,
                },
            );
        }
        for state in &mut self.atn.states {
            state.seal();
        }
        self.atn.validate()?;
        Ok(self.atn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_shape() {
        let mut b = AtnBuilder::parser(2);
        let s = b.rule();
        let a = b.atom(s, 1);
        let lp = b.star(s, vec![a], true);
        b.set_rule_body(s, lp);
        let atn = b.build().unwrap();

        let entry = &atn.states[lp.entry];
        assert!(matches!(entry.kind, AtnStateKind::StarLoopEntry { .. }));
        assert_eq!(entry.decision, Some(0));
        assert_eq!(entry.transitions().len(), 2);
        assert!(entry.only_has_epsilon_transitions());
        assert!(matches!(
            atn.states[entry.transitions()[1].target()].kind,
            AtnStateKind::LoopEnd { .. }
        ));
    }

    #[test]
    fn test_non_greedy_prefers_exit() {
        let mut b = AtnBuilder::lexer();
        let r = b.token_rule(1);
        let any = b.wildcard(r);
        let lp = b.star(r, vec![any], false);
        b.set_rule_body(r, lp);
        b.mode(&[r]);
        let atn = b.build().unwrap();

        let entry = &atn.states[lp.entry];
        assert!(entry.non_greedy);
        assert!(matches!(
            atn.states[entry.transitions()[0].target()].kind,
            AtnStateKind::LoopEnd { .. }
        ));
    }

    #[test]
    fn test_return_links_mark_outermost_precedence() {
        let mut b = AtnBuilder::parser(3);
        let s = b.rule();
        let e = b.left_recursive_rule();
        let call = b.rule_ref(s, e, 0);
        b.set_rule_body(s, call);
        let prim = b.atom(e, 1);
        let pred = b.precedence(e, 2);
        let op = b.atom(e, 2);
        let recurse = b.rule_ref(e, e, 3);
        let alt = b.seq(e, [pred, op, recurse]);
        let ops = b.precedence_loop(e, vec![alt]);
        let body = b.seq(e, [prim, ops]);
        b.set_rule_body(e, body);
        let atn = b.build().unwrap();

        let stop = &atn.states[atn.rule_to_stop_state[e]];
        let returns: Vec<_> = stop
            .transitions()
            .iter()
            .map(|t| (t.target(), t.outermost_precedence_return()))
            .collect();
        assert!(returns.contains(&(call.exit, Some(e))));
        assert!(returns.contains(&(recurse.exit, None)));
        assert!(atn.states[ops.entry].is_precedence_decision());
    }
}
