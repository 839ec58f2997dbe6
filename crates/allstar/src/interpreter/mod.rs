//! # Parser Interpreter
//!
//! Runs a parser ATN directly, without generated code. At every decision it
//! asks [`ParserAtnSimulator`] for an alternative, then follows that edge:
//! matching tokens, entering and leaving rules, checking predicates and
//! running actions. What happened is reported as a stream of
//! [`ParseEvent`]s rather than as a tree.

use compact_str::CompactString;
use std::sync::Arc;

use crate::atn::{Atn, Transition};
use crate::context::{PredictionContextCache, RuleContext};
use crate::dfa::DfaCache;
use crate::error::{AtnError, ParseError};
use crate::interval::MIN_USER_TOKEN_TYPE;
use crate::listener::ErrorListener;
use crate::prediction::{ParserAtnSimulator, PredictionConfig};
use crate::recognizer::{NoopRecognizer, Recognizer};
use crate::semantic::SemanticContext;
use crate::stream::TokenStream;

/// Parse events emitted while interpreting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseEvent {
    /// Entered a rule invocation
    EnterRule { rule: usize, position: usize },
    /// Left a rule, successfully or not
    ExitRule { rule: usize, success: bool },
    /// Consumed a token
    ConsumeToken { kind: i32, text: CompactString },
    /// Chose an alternative at a decision
    Predict { decision: usize, alt: usize },
}

/// Trait for receiving parse events
pub trait ParseEventHandler: Send {
    /// Handle a parse event
    fn handle(&mut self, event: ParseEvent);
}

/// A no-op event handler
pub struct NullEventHandler;

impl ParseEventHandler for NullEventHandler {
    fn handle(&mut self, _event: ParseEvent) {}
}

impl ParseEventHandler for Vec<ParseEvent> {
    fn handle(&mut self, event: ParseEvent) {
        self.push(event);
    }
}

/// Interpreter-side recognizer: precedence checks against the current
/// invocation, everything else to the user's recognizer
struct Host<'a, R> {
    recognizer: &'a mut R,
    precedence_stack: &'a [i32],
}

impl<R: Recognizer> Recognizer for Host<'_, R> {
    fn sempred(&mut self, ctx: Option<&Arc<RuleContext>>, rule: usize, pred: usize) -> bool {
        self.recognizer.sempred(ctx, rule, pred)
    }

    fn precpred(&mut self, _ctx: Option<&Arc<RuleContext>>, precedence: i32) -> bool {
        precedence >= self.precedence()
    }

    fn action(&mut self, ctx: Option<&Arc<RuleContext>>, rule: usize, action: Option<usize>) {
        self.recognizer.action(ctx, rule, action);
    }

    fn precedence(&self) -> i32 {
        self.precedence_stack.last().copied().unwrap_or(-1)
    }
}

/// Position of the walk through the ATN
struct Walk {
    state: usize,
    ctx: Arc<RuleContext>,
    precedence_stack: Vec<i32>,
}

/// Interprets a parser ATN over a token stream
pub struct ParserInterpreter<R = NoopRecognizer> {
    atn: Arc<Atn>,
    simulator: ParserAtnSimulator,
    recognizer: R,
}

impl ParserInterpreter {
    /// Interpreter without predicates or actions
    pub fn new(
        atn: Arc<Atn>,
        dfa: Arc<DfaCache>,
        context_cache: Arc<PredictionContextCache>,
    ) -> Result<Self, AtnError> {
        Self::with_recognizer(atn, dfa, context_cache, NoopRecognizer)
    }
}

impl<R: Recognizer> ParserInterpreter<R> {
    pub fn with_recognizer(
        atn: Arc<Atn>,
        dfa: Arc<DfaCache>,
        context_cache: Arc<PredictionContextCache>,
        recognizer: R,
    ) -> Result<Self, AtnError> {
        let simulator = ParserAtnSimulator::new(Arc::clone(&atn), dfa, context_cache)?;
        Ok(Self {
            atn,
            simulator,
            recognizer,
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: PredictionConfig) -> Self {
        self.simulator.set_config(config);
        self
    }

    pub fn add_error_listener(&mut self, listener: Arc<dyn ErrorListener>) {
        self.simulator.add_error_listener(listener);
    }

    #[must_use]
    pub const fn simulator(&self) -> &ParserAtnSimulator {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut ParserAtnSimulator {
        &mut self.simulator
    }

    pub fn recognizer(&mut self) -> &mut R {
        &mut self.recognizer
    }

    /// Parse `start_rule` from the current input position
    ///
    /// Stops when the start rule finishes; trailing input is left unread.
    /// On failure every open rule receives an unsuccessful `ExitRule`.
    pub fn parse(
        &mut self,
        input: &mut dyn TokenStream,
        start_rule: usize,
        handler: &mut dyn ParseEventHandler,
    ) -> Result<(), ParseError> {
        let start = *self
            .atn
            .rule_to_start_state
            .get(start_rule)
            .ok_or(AtnError::UnknownRule { rule: start_rule })?;
        let mut walk = Walk {
            state: start,
            ctx: RuleContext::root(start_rule),
            precedence_stack: Vec::new(),
        };
        if self.atn.is_left_recursive(start_rule) {
            walk.precedence_stack.push(0);
        }
        tracing::debug!(rule = start_rule, index = input.index(), "parse");
        handler.handle(ParseEvent::EnterRule {
            rule: start_rule,
            position: input.index(),
        });

        let result = self.run(input, &mut walk, handler);
        if let Err(error) = &result {
            tracing::debug!(state = walk.state, index = input.index(), %error, "parse failed");
            let mut frame = Some(&walk.ctx);
            while let Some(ctx) = frame {
                handler.handle(ParseEvent::ExitRule {
                    rule: ctx.rule_index,
                    success: false,
                });
                frame = ctx.parent.as_ref();
            }
        }
        result
    }

    fn run(
        &mut self,
        input: &mut dyn TokenStream,
        walk: &mut Walk,
        handler: &mut dyn ParseEventHandler,
    ) -> Result<(), ParseError> {
        let atn = Arc::clone(&self.atn);
        loop {
            let state = &atn.states[walk.state];
            if state.is_rule_stop() {
                if !self.exit_rule(walk, handler)? {
                    return Ok(());
                }
                continue;
            }

            let alt = match state.decision {
                Some(decision) if state.transitions().len() > 1 => {
                    let mut host = Host {
                        recognizer: &mut self.recognizer,
                        precedence_stack: &walk.precedence_stack,
                    };
                    let alt = self
                        .simulator
                        .adaptive_predict(input, decision, Some(&walk.ctx), &mut host)?;
                    handler.handle(ParseEvent::Predict { decision, alt });
                    alt
                }
                _ => 1,
            };
            let Some(transition) = alt.checked_sub(1).and_then(|i| state.transition(i)) else {
                return Err(self.mismatch(input, walk));
            };

            match transition {
                Transition::Epsilon { .. } => {}
                Transition::Atom { .. }
                | Transition::Range { .. }
                | Transition::Set { .. }
                | Transition::NotSet { .. }
                | Transition::Wildcard { .. } => {
                    let la = input.la(1);
                    if !transition.matches(la, MIN_USER_TOKEN_TYPE, atn.max_token_type) {
                        return Err(self.mismatch(input, walk));
                    }
                    let text = input.lt(1).map(|t| t.text.clone()).unwrap_or_default();
                    handler.handle(ParseEvent::ConsumeToken { kind: la, text });
                    input.consume();
                }
                Transition::Rule {
                    rule_index,
                    precedence,
                    ..
                } => {
                    if atn.is_left_recursive(*rule_index) {
                        walk.precedence_stack.push(*precedence);
                    }
                    walk.ctx = RuleContext::child(&walk.ctx, walk.state, *rule_index);
                    handler.handle(ParseEvent::EnterRule {
                        rule: *rule_index,
                        position: input.index(),
                    });
                }
                Transition::Predicate {
                    rule_index,
                    pred_index,
                    is_ctx_dependent,
                    ..
                } => {
                    let local = (*is_ctx_dependent).then_some(&walk.ctx);
                    if !self.recognizer.sempred(local, *rule_index, *pred_index) {
                        let predicate = SemanticContext::Predicate {
                            rule_index: *rule_index,
                            pred_index: *pred_index,
                            is_ctx_dependent: *is_ctx_dependent,
                        };
                        return Err(ParseError::FailedPredicate {
                            rule_index: *rule_index,
                            predicate: predicate.to_string(),
                        });
                    }
                }
                Transition::Precedence { precedence, .. } => {
                    let mut host = Host {
                        recognizer: &mut self.recognizer,
                        precedence_stack: &walk.precedence_stack,
                    };
                    if !host.precpred(Some(&walk.ctx), *precedence) {
                        let predicate = SemanticContext::Precedence {
                            precedence: *precedence,
                        };
                        return Err(ParseError::FailedPredicate {
                            rule_index: walk.ctx.rule_index,
                            predicate: predicate.to_string(),
                        });
                    }
                }
                Transition::Action {
                    rule_index,
                    action_index,
                    ..
                } => {
                    self.recognizer.action(Some(&walk.ctx), *rule_index, *action_index);
                }
            }
            walk.state = transition.target();
        }
    }

    /// Pop the current rule; false once the start rule is done
    fn exit_rule(
        &self,
        walk: &mut Walk,
        handler: &mut dyn ParseEventHandler,
    ) -> Result<bool, ParseError> {
        let ctx = Arc::clone(&walk.ctx);
        if self.atn.is_left_recursive(ctx.rule_index) {
            walk.precedence_stack.pop();
        }
        handler.handle(ParseEvent::ExitRule {
            rule: ctx.rule_index,
            success: true,
        });
        let (Some(parent), Some(invoking_state)) = (&ctx.parent, ctx.invoking_state) else {
            return Ok(false);
        };
        walk.state = self
            .atn
            .rule_follow_state(invoking_state)
            .ok_or_else(|| AtnError::invalid_state(invoking_state, invoking_state))?;
        walk.ctx = Arc::clone(parent);
        Ok(true)
    }

    fn mismatch(&self, input: &mut dyn TokenStream, walk: &Walk) -> ParseError {
        let expected = self.atn.expected_tokens(walk.state, Some(&walk.ctx));
        ParseError::input_mismatch(expected, input.la(1), input.index())
    }
}

impl<R> std::fmt::Debug for ParserInterpreter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserInterpreter")
            .field("simulator", &self.simulator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::AtnBuilder;
    use crate::lexer::Token;
    use crate::stream::{CommonTokenStream, IntStream};

    const ID: i32 = 1;
    const EQ: i32 = 2;
    const SEMI: i32 = 3;

    fn tokens(types: &[i32]) -> CommonTokenStream {
        let tokens = types.iter().map(|&t| Token::new(t, t.to_string())).collect();
        CommonTokenStream::new(tokens, 0)
    }

    // s : ID EQ ID SEMI | ID SEMI ;
    fn statement_atn() -> Arc<Atn> {
        let mut b = AtnBuilder::parser(3);
        let s = b.rule();
        let parts: Vec<_> = [ID, EQ, ID, SEMI].into_iter().map(|t| b.atom(s, t)).collect();
        let assign = b.seq(s, parts);
        let parts: Vec<_> = [ID, SEMI].into_iter().map(|t| b.atom(s, t)).collect();
        let expr = b.seq(s, parts);
        let body = b.alt_block(s, vec![assign, expr]);
        b.set_rule_body(s, body);
        Arc::new(b.build().unwrap())
    }

    fn interpreter(atn: &Arc<Atn>) -> ParserInterpreter {
        let dfa = Arc::new(DfaCache::new(atn));
        ParserInterpreter::new(Arc::clone(atn), dfa, Arc::new(PredictionContextCache::new())).unwrap()
    }

    #[test]
    fn test_events_follow_the_predicted_alternative() {
        let atn = statement_atn();
        let mut interp = interpreter(&atn);
        let mut input = tokens(&[ID, SEMI]);
        let mut events: Vec<ParseEvent> = Vec::new();
        interp.parse(&mut input, 0, &mut events).unwrap();

        assert_eq!(events[0], ParseEvent::EnterRule { rule: 0, position: 0 });
        assert_eq!(events[1], ParseEvent::Predict { decision: 0, alt: 2 });
        let consumed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ParseEvent::ConsumeToken { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(consumed, [ID, SEMI]);
        assert_eq!(events.last(), Some(&ParseEvent::ExitRule { rule: 0, success: true }));
        assert_eq!(input.index(), 2);
    }

    #[test]
    fn test_mismatch_reports_expected_tokens() {
        let atn = statement_atn();
        let mut interp = interpreter(&atn);
        let mut input = tokens(&[ID, EQ, SEMI]);
        let mut events: Vec<ParseEvent> = Vec::new();
        let err = interp.parse(&mut input, 0, &mut events).unwrap_err();

        let ParseError::InputMismatch {
            expected,
            found,
            index,
        } = &err
        else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(*found, SEMI);
        assert_eq!(*index, 2);
        assert!(expected.contains(ID));
        assert_eq!(events.last(), Some(&ParseEvent::ExitRule { rule: 0, success: false }));
    }

    #[test]
    fn test_unknown_start_rule() {
        let atn = statement_atn();
        let mut interp = interpreter(&atn);
        let err = interp.parse(&mut tokens(&[ID]), 7, &mut NullEventHandler).unwrap_err();
        assert!(matches!(err, ParseError::Atn(AtnError::UnknownRule { rule: 7 })));
    }
}
