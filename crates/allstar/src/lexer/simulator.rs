//! Lexer ATN simulation
//!
//! Matches one token per call: walks the mode's DFA as far as cached edges
//! allow, falls back to ATN closure/reach for unseen characters, and
//! remembers the last accept state so the longest match wins. Ties go to the
//! rule listed first in the mode.

use std::sync::Arc;

use super::{LexerActionExecutor, LexerHost};
use crate::atn::{Atn, AtnType, Transition};
use crate::config::{AtnConfig, AtnConfigSet};
use crate::context::{PredictionContext, EMPTY_RETURN_STATE};
use crate::dfa::{DfaCache, DfaState, StateId};
use crate::error::{AtnError, LexerError};
use crate::interval::{EOF, MAX_CHAR, MIN_CHAR};
use crate::prediction::PredictionStats;
use crate::stream::CharStream;

/// Last accept state seen during a match
#[derive(Debug, Default, Clone)]
struct SimState {
    index: usize,
    line: usize,
    column: usize,
    dfa_state: Option<Arc<DfaState>>,
}

enum Target {
    Error,
    State(Arc<DfaState>),
}

/// Token matcher over a lexer ATN
///
/// Tracks the line and column of the input position; the [`Lexer`](super::Lexer)
/// reads them to stamp tokens.
#[derive(Debug)]
pub struct LexerAtnSimulator {
    atn: Arc<Atn>,
    dfa: Arc<DfaCache>,
    start_index: usize,
    start_line: usize,
    start_column: usize,
    line: usize,
    column: usize,
    mode: usize,
    prev_accept: SimState,
    stats: PredictionStats,
}

impl LexerAtnSimulator {
    /// Fails when `atn` is not a lexer ATN or `dfa` was built for another one
    pub fn new(atn: Arc<Atn>, dfa: Arc<DfaCache>) -> Result<Self, AtnError> {
        if atn.grammar_type != AtnType::Lexer {
            return Err(AtnError::wrong_grammar_type(AtnType::Lexer, atn.grammar_type));
        }
        if dfa.len() != atn.mode_to_start_state.len() {
            return Err(AtnError::CacheMismatch {
                expected: atn.mode_to_start_state.len(),
                found: dfa.len(),
            });
        }
        Ok(Self {
            atn,
            dfa,
            start_index: 0,
            start_line: 1,
            start_column: 0,
            line: 1,
            column: 0,
            mode: 0,
            prev_accept: SimState::default(),
            stats: PredictionStats::default(),
        })
    }

    #[must_use]
    pub fn atn(&self) -> &Arc<Atn> {
        &self.atn
    }

    #[must_use]
    pub fn dfa(&self) -> &Arc<DfaCache> {
        &self.dfa
    }

    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    pub fn set_position(&mut self, line: usize, column: usize) {
        self.line = line;
        self.column = column;
    }

    /// Counters since construction: `predictions` counts matched tokens
    #[must_use]
    pub const fn stats(&self) -> &PredictionStats {
        &self.stats
    }

    /// Reset position tracking for a new input
    pub fn reset(&mut self) {
        self.start_index = 0;
        self.start_line = 1;
        self.start_column = 0;
        self.line = 1;
        self.column = 0;
        self.mode = 0;
        self.prev_accept = SimState::default();
    }

    /// Match one token in `mode` starting at the current input position
    ///
    /// Returns the token type, or [`EOF`] when the input is exhausted. On
    /// success the input sits after the token and its actions have run
    /// against `host`. On failure the input is back at the token start.
    pub fn match_token(
        &mut self,
        input: &mut dyn CharStream,
        mode: usize,
        host: &mut dyn LexerHost,
    ) -> Result<i32, LexerError> {
        if mode >= self.atn.mode_to_start_state.len() {
            return Err(LexerError::UnknownMode { mode });
        }
        self.mode = mode;
        let marker = input.mark();
        self.start_index = input.index();
        self.start_line = self.line;
        self.start_column = self.column;
        self.prev_accept = SimState::default();
        let s0 = self.dfa.lock(mode).and_then(|dfa| dfa.s0().and_then(|s| dfa.state(s).cloned()));
        let result = match s0 {
            Some(s0) => self.exec_atn(input, s0, host),
            None => self.match_atn(input, host),
        };
        input.release(marker);
        if result.is_ok() {
            self.stats.predictions += 1;
        }
        result
    }

    fn match_atn(
        &mut self,
        input: &mut dyn CharStream,
        host: &mut dyn LexerHost,
    ) -> Result<i32, LexerError> {
        let start = self.atn.mode_to_start_state[self.mode];
        tracing::trace!(mode = self.mode, start, "lexer: computing start state");
        let mut s0_closure = self.compute_start_state(input, start, host);
        let suppress_edge = s0_closure.has_semantic_context;
        s0_closure.has_semantic_context = false;
        let next = self.add_dfa_state(s0_closure);
        if !suppress_edge {
            if let Some(mut dfa) = self.dfa.lock(self.mode) {
                dfa.set_s0(next.state_number);
            }
        }
        self.exec_atn(input, next, host)
    }

    fn exec_atn(
        &mut self,
        input: &mut dyn CharStream,
        ds0: Arc<DfaState>,
        host: &mut dyn LexerHost,
    ) -> Result<i32, LexerError> {
        if ds0.is_accept_state {
            self.capture_sim_state(input, &ds0);
        }
        let mut t = input.la(1);
        let mut s = ds0;
        loop {
            let target = match self.existing_target_state(&s, t) {
                Some(target) => {
                    self.stats.dfa_hits += 1;
                    target
                }
                None => self.compute_target_state(input, &s, t, host),
            };
            let Target::State(target) = target else {
                break;
            };
            if t != EOF {
                self.consume(input);
            }
            if target.is_accept_state {
                self.capture_sim_state(input, &target);
                if t == EOF {
                    break;
                }
            }
            t = input.la(1);
            s = target;
        }
        self.fail_or_accept(input, &s.configs, t, host)
    }

    fn existing_target_state(&self, s: &DfaState, t: i32) -> Option<Target> {
        if t < MIN_CHAR {
            return None;
        }
        let dfa = self.dfa.lock(self.mode)?;
        let target = dfa.edge(s.state_number, t)?;
        if target.is_error() {
            return Some(Target::Error);
        }
        dfa.state(target).cloned().map(Target::State)
    }

    fn compute_target_state(
        &mut self,
        input: &mut dyn CharStream,
        s: &DfaState,
        t: i32,
        host: &mut dyn LexerHost,
    ) -> Target {
        self.stats.atn_transitions += 1;
        let mut reach = AtnConfigSet::ordered();
        self.get_reachable_config_set(input, &s.configs, &mut reach, t, host);
        if reach.is_empty() {
            if !reach.has_semantic_context && t >= MIN_CHAR {
                if let Some(mut dfa) = self.dfa.lock(self.mode) {
                    dfa.set_edge(s.state_number, t, StateId::ERROR);
                }
            }
            return Target::Error;
        }
        Target::State(self.add_dfa_edge(s, t, reach))
    }

    fn fail_or_accept(
        &mut self,
        input: &mut dyn CharStream,
        reach: &AtnConfigSet,
        t: i32,
        host: &mut dyn LexerHost,
    ) -> Result<i32, LexerError> {
        if let Some(accepted) = self.prev_accept.dfa_state.clone() {
            let SimState { index, line, column, .. } = self.prev_accept;
            self.accept(input, accepted.lexer_action_executor.as_deref(), index, line, column, host);
            let rule = accepted.prediction.unwrap_or_default();
            return Ok(self.atn.rule_to_token_type.get(rule).copied().unwrap_or(EOF));
        }
        if t == EOF && input.index() == self.start_index {
            return Ok(EOF);
        }
        let text = input.text(self.start_index, input.index());
        tracing::debug!(start = self.start_index, text = %text, "lexer: no viable alternative");
        input.seek(self.start_index);
        self.line = self.start_line;
        self.column = self.start_column;
        Err(LexerError::NoViableAlt {
            start_index: self.start_index,
            text,
            configs: Arc::new(reach.clone()),
        })
    }

    /// Advance every configuration of `closure` over `t` into `reach`
    ///
    /// Once an alternative reaches a rule stop state, its remaining
    /// configurations are only kept if they did not pass through a
    /// non-greedy loop.
    fn get_reachable_config_set(
        &mut self,
        input: &mut dyn CharStream,
        closure: &AtnConfigSet,
        reach: &mut AtnConfigSet,
        t: i32,
        host: &mut dyn LexerHost,
    ) {
        let mut skip_alt = None;
        let atn = Arc::clone(&self.atn);
        for config in closure {
            let current_alt_reached_accept_state = skip_alt == Some(config.alt);
            if current_alt_reached_accept_state && config.passed_through_non_greedy {
                continue;
            }
            for transition in atn.states[config.state].transitions() {
                if !transition.matches(t, MIN_CHAR, MAX_CHAR) {
                    continue;
                }
                let executor = config
                    .lexer_action_executor
                    .as_ref()
                    .map(|e| e.fix_offset_before_match(input.index() - self.start_index));
                let mut next = self.moved(config, transition.target());
                next.lexer_action_executor = executor;
                let treat_eof_as_epsilon = t == EOF;
                if self.closure(
                    input,
                    next,
                    reach,
                    current_alt_reached_accept_state,
                    true,
                    treat_eof_as_epsilon,
                    host,
                ) {
                    skip_alt = Some(config.alt);
                    break;
                }
            }
        }
    }

    fn accept(
        &mut self,
        input: &mut dyn CharStream,
        executor: Option<&LexerActionExecutor>,
        index: usize,
        line: usize,
        column: usize,
        host: &mut dyn LexerHost,
    ) {
        input.seek(index);
        self.line = line;
        self.column = column;
        if let Some(executor) = executor {
            executor.execute(host, input, self.start_index);
        }
    }

    fn compute_start_state(
        &mut self,
        input: &mut dyn CharStream,
        start: usize,
        host: &mut dyn LexerHost,
    ) -> AtnConfigSet {
        let mut configs = AtnConfigSet::ordered();
        let atn = Arc::clone(&self.atn);
        for (i, transition) in atn.states[start].transitions().iter().enumerate() {
            let config = AtnConfig::new(transition.target(), i + 1, PredictionContext::empty());
            self.closure(input, config, &mut configs, false, false, false, host);
        }
        configs
    }

    /// `config` copied to `state`, noting non-greedy decisions on the way
    fn moved(&self, config: &AtnConfig, state: usize) -> AtnConfig {
        self.entering(config.with_state(state), state)
    }

    fn entering(&self, mut config: AtnConfig, state: usize) -> AtnConfig {
        let target = &self.atn.states[state];
        if target.is_decision() && target.non_greedy {
            config.passed_through_non_greedy = true;
        }
        config
    }

    /// Epsilon closure of `config` into `configs`
    ///
    /// Returns true once some configuration of the current alternative
    /// reached a rule stop state. Explores depth first in transition order,
    /// which is what gives earlier alternatives priority.
    #[allow(clippy::too_many_arguments)]
    fn closure(
        &mut self,
        input: &mut dyn CharStream,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        mut reached_accept: bool,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        host: &mut dyn LexerHost,
    ) -> bool {
        let atn = Arc::clone(&self.atn);
        let mut stack = vec![config];
        while let Some(config) = stack.pop() {
            let state = &atn.states[config.state];
            if state.is_rule_stop() {
                let context = Arc::clone(&config.context);
                if context.has_empty_path() {
                    if context.is_empty() {
                        configs.add(config, None);
                        reached_accept = true;
                        continue;
                    }
                    configs.add(config.with_context(config.state, PredictionContext::empty()), None);
                    reached_accept = true;
                }
                let mut returns = Vec::with_capacity(context.len());
                for (parent, return_state) in context.entries() {
                    if return_state == EMPTY_RETURN_STATE {
                        continue;
                    }
                    let parent = parent.cloned().unwrap_or_else(PredictionContext::empty);
                    returns.push(config.with_context(return_state, parent));
                }
                stack.extend(returns.into_iter().rev());
                continue;
            }

            if !state.only_has_epsilon_transitions()
                && (!reached_accept || !config.passed_through_non_greedy)
            {
                configs.add(config.clone(), None);
            }

            let mut children = Vec::new();
            for transition in state.transitions() {
                if let Some(child) = self.get_epsilon_target(
                    input,
                    &config,
                    transition,
                    configs,
                    speculative,
                    treat_eof_as_epsilon,
                    host,
                ) {
                    children.push(child);
                }
            }
            stack.extend(children.into_iter().rev());
        }
        reached_accept
    }

    #[allow(clippy::too_many_arguments)]
    fn get_epsilon_target(
        &mut self,
        input: &mut dyn CharStream,
        config: &AtnConfig,
        transition: &Transition,
        configs: &mut AtnConfigSet,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        host: &mut dyn LexerHost,
    ) -> Option<AtnConfig> {
        match transition {
            Transition::Rule {
                target,
                follow_state,
                ..
            } => {
                let context =
                    PredictionContext::singleton(Some(Arc::clone(&config.context)), *follow_state);
                Some(self.entering(config.with_context(*target, context), *target))
            }
            Transition::Predicate {
                target,
                rule_index,
                pred_index,
                ..
            } => {
                configs.has_semantic_context = true;
                self.evaluate_predicate(input, *rule_index, *pred_index, speculative, host)
                    .then(|| self.moved(config, *target))
            }
            Transition::Action {
                target,
                action_index,
                ..
            } => {
                let action = action_index.and_then(|i| self.atn.lexer_actions.get(i));
                match action {
                    Some(action) if config.context.has_empty_path() => {
                        let executor = LexerActionExecutor::append(
                            config.lexer_action_executor.as_ref(),
                            action.clone(),
                        );
                        let mut next = self.moved(config, *target);
                        next.lexer_action_executor = Some(executor);
                        Some(next)
                    }
                    _ => Some(self.moved(config, *target)),
                }
            }
            Transition::Epsilon { target, .. } => Some(self.moved(config, *target)),
            Transition::Atom { target, .. }
            | Transition::Range { target, .. }
            | Transition::Set { target, .. } => (treat_eof_as_epsilon
                && transition.matches(EOF, MIN_CHAR, MAX_CHAR))
            .then(|| self.moved(config, *target)),
            _ => None,
        }
    }

    /// Evaluate a lexer predicate; when `speculative`, with the current
    /// character consumed so the predicate sees the position after it
    fn evaluate_predicate(
        &mut self,
        input: &mut dyn CharStream,
        rule_index: usize,
        pred_index: usize,
        speculative: bool,
        host: &mut dyn LexerHost,
    ) -> bool {
        if !speculative {
            return host.sempred(None, rule_index, pred_index);
        }
        let (column, line, index) = (self.column, self.line, input.index());
        let marker = input.mark();
        self.consume(input);
        let result = host.sempred(None, rule_index, pred_index);
        self.column = column;
        self.line = line;
        input.seek(index);
        input.release(marker);
        result
    }

    fn capture_sim_state(&mut self, input: &dyn CharStream, state: &Arc<DfaState>) {
        self.prev_accept = SimState {
            index: input.index(),
            line: self.line,
            column: self.column,
            dfa_state: Some(Arc::clone(state)),
        };
    }

    fn add_dfa_edge(&mut self, from: &DfaState, t: i32, mut configs: AtnConfigSet) -> Arc<DfaState> {
        let suppress_edge = configs.has_semantic_context;
        configs.has_semantic_context = false;
        let to = self.add_dfa_state(configs);
        if !suppress_edge && t >= MIN_CHAR {
            if let Some(mut dfa) = self.dfa.lock(self.mode) {
                dfa.set_edge(from.state_number, t, to.state_number);
            }
        }
        to
    }

    /// Intern a configuration set as a DFA state, accepting for the first
    /// rule that finished
    fn add_dfa_state(&self, configs: AtnConfigSet) -> Arc<DfaState> {
        let mut proposed = DfaState::new(configs);
        let finished = proposed
            .configs
            .iter()
            .find(|c| self.atn.states[c.state].is_rule_stop())
            .map(|c| (self.atn.states[c.state].rule_index, c.lexer_action_executor.clone()));
        if let Some((rule, executor)) = finished {
            proposed.is_accept_state = true;
            proposed.prediction = Some(rule);
            proposed.lexer_action_executor = executor;
        }
        match self.dfa.lock(self.mode) {
            Some(mut dfa) => dfa.add_state(proposed),
            None => Arc::new(proposed),
        }
    }

    /// Consume one character, tracking line and column
    pub fn consume(&mut self, input: &mut dyn CharStream) {
        if input.la(1) == '\n' as i32 {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        input.consume();
    }
}
