//! LL(1) lookahead analysis

use hashbrown::HashSet;
use std::sync::Arc;

use super::{Atn, Transition};
use crate::config::AltSet;
use crate::context::{ContextRef, PredictionContext, RuleContext};
use crate::interval::{IntervalSet, EOF, EPSILON, INVALID_TYPE, MIN_USER_TOKEN_TYPE};

struct Walk {
    state: usize,
    context: Option<ContextRef>,
    /// Rules entered on this path without consuming input
    called: AltSet,
}

impl Atn {
    /// Symbols that can be matched starting at `state`
    ///
    /// Without a context, reaching the end of the rule (or `stop_state`)
    /// adds [`EPSILON`]. With one, the walk returns into the callers and adds
    /// [`EOF`] when the outermost caller can finish. Predicates are
    /// traversed as if true.
    #[must_use]
    pub fn look(
        &self,
        state: usize,
        stop_state: Option<usize>,
        context: Option<&Arc<RuleContext>>,
    ) -> IntervalSet {
        let context = context.map(|ctx| PredictionContext::from_rule_context(self, Some(ctx)));
        self.look_from(state, stop_state, context, true, true)
    }

    /// Lookahead per alternative of a decision state
    ///
    /// An entry is `None` when the alternative starts with a predicate,
    /// since its lookahead then depends on semantics.
    #[must_use]
    pub fn decision_lookahead(&self, state: usize) -> Vec<Option<IntervalSet>> {
        let Some(s) = self.states.get(state) else {
            return Vec::new();
        };
        s.transitions
            .iter()
            .map(|t| {
                let look = self.look_from(t.target(), None, None, false, false);
                // A predicate hit means the decision is not LL(1)
                if look.is_nil() || look.contains(INVALID_TYPE) {
                    None
                } else {
                    Some(look)
                }
            })
            .collect()
    }

    fn look_from(
        &self,
        start: usize,
        stop_state: Option<usize>,
        context: Option<ContextRef>,
        see_through_preds: bool,
        add_eof: bool,
    ) -> IntervalSet {
        let mut look = IntervalSet::new();
        let mut busy: HashSet<(usize, Option<ContextRef>)> = HashSet::new();
        let mut stack = vec![Walk {
            state: start,
            context,
            called: AltSet::new(),
        }];

        while let Some(walk) = stack.pop() {
            if !busy.insert((walk.state, walk.context.clone())) {
                continue;
            }
            let Some(state) = self.states.get(walk.state) else {
                continue;
            };

            if Some(walk.state) == stop_state || state.is_rule_stop() {
                match &walk.context {
                    None => {
                        look.add(EPSILON);
                        continue;
                    }
                    Some(ctx) if ctx.is_empty() && add_eof => {
                        look.add(EOF);
                        continue;
                    }
                    _ => {}
                }
            }

            if state.is_rule_stop() {
                let Some(ctx) = walk.context.as_ref() else {
                    continue;
                };
                if ctx.is_empty() {
                    continue;
                }
                let mut called = walk.called.clone();
                called.remove(state.rule_index);
                // Reverse so the first return state is walked first
                for i in (0..ctx.len()).rev() {
                    stack.push(Walk {
                        state: ctx.return_state(i),
                        context: ctx.parent(i).cloned(),
                        called: called.clone(),
                    });
                }
                continue;
            }

            for transition in state.transitions.iter().rev() {
                match transition {
                    Transition::Rule {
                        target,
                        rule_index,
                        follow_state,
                        ..
                    } => {
                        if walk.called.contains(*rule_index) {
                            continue;
                        }
                        let mut called = walk.called.clone();
                        called.insert(*rule_index);
                        stack.push(Walk {
                            state: *target,
                            context: Some(PredictionContext::singleton(
                                walk.context.clone(),
                                *follow_state,
                            )),
                            called,
                        });
                    }
                    Transition::Predicate { target, .. } | Transition::Precedence { target, .. } => {
                        if see_through_preds {
                            stack.push(Walk {
                                state: *target,
                                context: walk.context.clone(),
                                called: walk.called.clone(),
                            });
                        } else {
                            look.add(INVALID_TYPE);
                        }
                    }
                    t if t.is_epsilon() => stack.push(Walk {
                        state: t.target(),
                        context: walk.context.clone(),
                        called: walk.called.clone(),
                    }),
                    Transition::Wildcard { .. } => {
                        look.add_range(MIN_USER_TOKEN_TYPE, self.max_token_type);
                    }
                    Transition::NotSet { set, .. } => {
                        look.add_set(&set.complement(MIN_USER_TOKEN_TYPE, self.max_token_type));
                    }
                    t => {
                        if let Some(label) = t.label() {
                            look.add_set(&label);
                        }
                    }
                }
            }
        }
        look
    }
}

#[cfg(test)]
mod tests {
    use crate::atn::AtnBuilder;
    use crate::context::RuleContext;
    use crate::interval::{IntervalSet, EOF, EPSILON};

    const A: i32 = 1;
    const B: i32 = 2;
    const C: i32 = 3;

    #[test]
    fn test_next_tokens_within_rule() {
        // s : A? B ;
        let mut b = AtnBuilder::parser(3);
        let s = b.rule();
        let a = b.atom(s, A);
        let opt = b.optional(s, a, true);
        let tail = b.atom(s, B);
        let body = b.seq(s, [opt, tail]);
        b.set_rule_body(s, body);
        let atn = b.build().unwrap();

        let start = atn.rule_to_start_state[s];
        let mut expected = IntervalSet::of(A);
        expected.add(B);
        assert_eq!(atn.next_tokens(start), &expected);
    }

    #[test]
    fn test_expected_tokens_walk_into_callers() {
        // s : r C ; r : A? ;
        let mut b = AtnBuilder::parser(3);
        let s = b.rule();
        let r = b.rule();
        let call = b.rule_ref(s, r, 0);
        let c = b.atom(s, C);
        let body = b.seq(s, [call, c]);
        b.set_rule_body(s, body);
        let a = b.atom(r, A);
        let r_body = b.optional(r, a, true);
        b.set_rule_body(r, r_body);
        let atn = b.build().unwrap();

        let r_start = atn.rule_to_start_state[r];
        let within = atn.next_tokens(r_start);
        assert!(within.contains(A));
        assert!(within.contains(EPSILON));

        let root = RuleContext::root(s);
        let invoking = call.entry;
        let frame = RuleContext::child(&root, invoking, r);
        let expected = atn.expected_tokens(r_start, Some(&frame));
        assert!(expected.contains(A));
        assert!(expected.contains(C));
        assert!(!expected.contains(EPSILON));
        assert!(!expected.contains(EOF));
    }
}
