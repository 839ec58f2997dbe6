//! Adaptive LL(*) prediction
//!
//! [`ParserAtnSimulator::adaptive_predict`] first walks the decision's DFA.
//! When an edge is missing it simulates the ATN without caller context
//! (SLL) and caches the result as a new DFA state. If SLL ends in a conflict,
//! prediction restarts from the decision with the parser's real invocation
//! stack (full-context LL); those results are never cached because they
//! depend on the stack.

use hashbrown::HashSet;
use std::sync::Arc;

use super::{apply_precedence_filter, mode, PredictionConfig, PredictionMode, PredictionStats};
use crate::atn::{Atn, AtnType, Transition};
use crate::config::{AltSet, AtnConfig, AtnConfigSet};
use crate::context::{
    MergeCache, PredictionContext, PredictionContextCache, RuleContext, EMPTY_RETURN_STATE,
};
use crate::dfa::{DfaCache, DfaState, PredPrediction, StateId};
use crate::error::{AtnError, PredictionError, PredictionResult};
use crate::interval::{EOF, EPSILON};
use crate::listener::{ErrorListener, ErrorListeners};
use crate::recognizer::Recognizer;
use crate::semantic::SemanticContext;
use crate::stream::TokenStream;

/// Everything one `adaptive_predict` call works with
struct Call<'a> {
    input: &'a mut dyn TokenStream,
    recognizer: &'a mut dyn Recognizer,
    outer_context: Option<&'a Arc<RuleContext>>,
    start_index: usize,
    decision: usize,
    start_state: usize,
    precedence_dfa: bool,
    merge_cache: MergeCache,
}

/// Closure work item
///
/// `Enter` is a configuration arriving at a state. `Pop` returns from a rule
/// stop state through the `index`-th entry of the configuration's context.
/// `Follow` takes the `index`-th transition of the configuration's state.
/// Continuations are pushed before children so the walk stays depth first
/// in transition order.
enum Frame {
    Enter {
        config: AtnConfig,
        depth: isize,
        collect: bool,
    },
    Pop {
        config: AtnConfig,
        depth: isize,
        collect: bool,
        index: usize,
    },
    Follow {
        config: AtnConfig,
        depth: isize,
        collect: bool,
        index: usize,
    },
}

enum Target {
    Error,
    State(Arc<DfaState>),
}

/// Parser-side ATN simulator
///
/// Owns no input: every call borrows the token stream, the recognizer that
/// evaluates predicates and the parser's current invocation stack. The DFA
/// and context caches are shared through `Arc` and may be used by several
/// simulators built from the same ATN.
#[derive(Debug)]
pub struct ParserAtnSimulator {
    atn: Arc<Atn>,
    dfa: Arc<DfaCache>,
    context_cache: Arc<PredictionContextCache>,
    config: PredictionConfig,
    listeners: ErrorListeners,
    stats: PredictionStats,
}

impl ParserAtnSimulator {
    /// Fails when `atn` is not a parser ATN or `dfa` was built for another one
    pub fn new(
        atn: Arc<Atn>,
        dfa: Arc<DfaCache>,
        context_cache: Arc<PredictionContextCache>,
    ) -> Result<Self, AtnError> {
        if atn.grammar_type != AtnType::Parser {
            return Err(AtnError::wrong_grammar_type(AtnType::Parser, atn.grammar_type));
        }
        if dfa.len() != atn.number_of_decisions() {
            return Err(AtnError::CacheMismatch {
                expected: atn.number_of_decisions(),
                found: dfa.len(),
            });
        }
        Ok(Self {
            atn,
            dfa,
            context_cache,
            config: PredictionConfig::default(),
            listeners: ErrorListeners::new(),
            stats: PredictionStats::new(),
        })
    }

    #[must_use]
    pub const fn with_config(mut self, config: PredictionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PredictionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PredictionConfig) {
        self.config = config;
    }

    pub fn set_prediction_mode(&mut self, mode: PredictionMode) {
        self.config.mode = mode;
    }

    pub fn add_error_listener(&mut self, listener: Arc<dyn ErrorListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_error_listeners(&mut self) {
        self.listeners.clear();
    }

    #[must_use]
    pub const fn atn(&self) -> &Arc<Atn> {
        &self.atn
    }

    #[must_use]
    pub const fn dfa(&self) -> &Arc<DfaCache> {
        &self.dfa
    }

    #[must_use]
    pub const fn context_cache(&self) -> &Arc<PredictionContextCache> {
        &self.context_cache
    }

    #[must_use]
    pub const fn stats(&self) -> &PredictionStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Forget every cached DFA state
    pub fn clear_dfa(&self) {
        self.dfa.reset();
    }

    /// Predict which alternative of `decision` the input starting at the
    /// current position follows
    ///
    /// `outer_context` is the parser's invocation stack, innermost frame
    /// first; `None` means the decision is in the start rule. The input is
    /// left where it was. Alternatives are numbered from 1.
    pub fn adaptive_predict(
        &mut self,
        input: &mut dyn TokenStream,
        decision: usize,
        outer_context: Option<&Arc<RuleContext>>,
        recognizer: &mut dyn Recognizer,
    ) -> PredictionResult<usize> {
        let (start_state, precedence_dfa) = match self.dfa.lock(decision) {
            Some(dfa) => (dfa.atn_start_state, dfa.is_precedence_dfa()),
            None => return Err(PredictionError::UnknownDecision { decision }),
        };
        self.stats.predictions += 1;

        let marker = input.mark();
        let start_index = input.index();
        let mut call = Call {
            input,
            recognizer,
            outer_context,
            start_index,
            decision,
            start_state,
            precedence_dfa,
            merge_cache: MergeCache::new(),
        };
        tracing::trace!(decision, index = start_index, la1 = call.input.la(1), "adaptive_predict");

        let result = self.predict(&mut call);

        call.input.seek(start_index);
        call.input.release(marker);
        match &result {
            Ok(alt) => tracing::trace!(decision, alt, "predicted"),
            Err(PredictionError::NoViableAlt { .. }) => self.stats.no_viable_alts += 1,
            Err(_) => {}
        }
        result
    }

    fn predict(&mut self, call: &mut Call<'_>) -> PredictionResult<usize> {
        let precedence = call.recognizer.precedence();
        let cached = self.dfa.lock(call.decision).and_then(|dfa| {
            let s0 = if call.precedence_dfa {
                dfa.precedence_start_state(precedence)
            } else {
                dfa.s0()
            };
            s0.and_then(|s| dfa.state(s).cloned())
        });

        let s0 = match cached {
            Some(s0) => s0,
            None => {
                let mut s0_closure = self.compute_start_state(call, false);
                if call.precedence_dfa {
                    s0_closure = apply_precedence_filter(
                        &s0_closure,
                        call.recognizer,
                        call.outer_context,
                        Some(&mut call.merge_cache),
                    );
                }
                let s0 = self.add_dfa_state(call.decision, DfaState::new(s0_closure));
                if let Some(mut dfa) = self.dfa.lock(call.decision) {
                    if call.precedence_dfa {
                        dfa.set_precedence_start_state(precedence, s0.state_number);
                    } else {
                        dfa.set_s0(s0.state_number);
                    }
                }
                s0
            }
        };

        self.exec_atn(call, s0)
    }

    /// SLL walk over the DFA, extending it as needed
    fn exec_atn(&mut self, call: &mut Call<'_>, s0: Arc<DfaState>) -> PredictionResult<usize> {
        let mut previous = s0;
        let mut t = call.input.la(1);
        loop {
            let target = match self.existing_target_state(call.decision, &previous, t) {
                Some(target) => {
                    self.stats.dfa_hits += 1;
                    target
                }
                None => self.compute_target_state(call, &previous, t),
            };

            let d = match target {
                Target::State(d) => d,
                Target::Error => {
                    let error = self.no_viable_alt(call, &previous.configs);
                    call.input.seek(call.start_index);
                    if !self.config.bail_on_conflict {
                        if let Some(alt) = self.get_syn_valid_or_sem_invalid_alt_that_finished_decision_entry_rule(
                            call,
                            &previous.configs,
                        ) {
                            return Ok(alt);
                        }
                    }
                    return Err(error);
                }
            };

            if d.requires_full_context && self.config.mode != PredictionMode::Sll {
                let mut conflicting_alts = d.configs.conflicting_alts.clone().unwrap_or_default();
                if let Some(predicates) = &d.predicates {
                    let conflict_index = call.input.index();
                    if conflict_index != call.start_index {
                        call.input.seek(call.start_index);
                    }
                    conflicting_alts = Self::eval_predicates(call, predicates, true);
                    if conflicting_alts.len() == 1 {
                        if let Some(alt) = conflicting_alts.min() {
                            return Ok(alt);
                        }
                    }
                    if conflict_index != call.start_index {
                        call.input.seek(conflict_index);
                    }
                }

                if self.config.bail_on_conflict {
                    tracing::debug!(
                        decision = call.decision,
                        alts = %conflicting_alts,
                        "SLL conflict, bailing out"
                    );
                    return Err(PredictionError::Cancelled {
                        decision: call.decision,
                        start_index: call.start_index,
                        conflicting_alts,
                    });
                }

                self.stats.full_context += 1;
                let stop_index = call.input.index();
                tracing::debug!(
                    decision = call.decision,
                    start = call.start_index,
                    stop = stop_index,
                    alts = %conflicting_alts,
                    "SLL conflict, retrying with full context"
                );
                let s0_closure = self.compute_start_state(call, true);
                self.listeners.report_attempting_full_context(
                    call.decision,
                    call.start_index,
                    stop_index,
                    &conflicting_alts,
                    &d.configs,
                );
                return self.exec_atn_with_full_context(call, &d, s0_closure);
            }

            if d.is_accept_state {
                let Some(predicates) = &d.predicates else {
                    return d.prediction.ok_or_else(|| self.no_viable_alt(call, &d.configs));
                };
                let stop_index = call.input.index();
                call.input.seek(call.start_index);
                let alts = Self::eval_predicates(call, predicates, true);
                return match alts.len() {
                    0 => Err(self.no_viable_alt(call, &d.configs)),
                    1 => alts.min().ok_or_else(|| self.no_viable_alt(call, &d.configs)),
                    _ if self.config.bail_on_conflict => Err(PredictionError::Cancelled {
                        decision: call.decision,
                        start_index: call.start_index,
                        conflicting_alts: alts,
                    }),
                    _ => {
                        self.report_ambiguity(call, stop_index, false, &alts, &d.configs);
                        alts.min().ok_or_else(|| self.no_viable_alt(call, &d.configs))
                    }
                };
            }

            previous = d;
            if t != EOF {
                call.input.consume();
                t = call.input.la(1);
            }
        }
    }

    fn existing_target_state(&self, decision: usize, from: &DfaState, t: i32) -> Option<Target> {
        if t < EOF || t > self.atn.max_token_type {
            return None;
        }
        let dfa = self.dfa.lock(decision)?;
        let target = dfa.edge(from.state_number, t)?;
        if target.is_error() {
            return Some(Target::Error);
        }
        dfa.state(target).cloned().map(Target::State)
    }

    /// Reach over `t` from `previous`, then decide whether the new state
    /// accepts, conflicts or needs more lookahead
    fn compute_target_state(
        &mut self,
        call: &mut Call<'_>,
        previous: &DfaState,
        t: i32,
    ) -> Target {
        self.stats.atn_transitions += 1;
        let Some(reach) = self.compute_reach_set(call, &previous.configs, t, false) else {
            self.add_error_edge(call.decision, previous.state_number, t);
            return Target::Error;
        };

        let mut d = DfaState::new(reach);
        if let Some(alt) = mode::unique_alt(&d.configs) {
            d.is_accept_state = true;
            d.configs.unique_alt = Some(alt);
            d.prediction = Some(alt);
        } else if mode::has_sll_conflict_terminating_prediction(self.config.mode, &self.atn, &d.configs) {
            let conflicting = mode::get_conflicting_alts(&d.configs);
            d.prediction = conflicting.min();
            d.configs.conflicting_alts = Some(conflicting);
            d.requires_full_context = true;
            d.is_accept_state = true;
        }

        if d.is_accept_state && d.configs.has_semantic_context {
            self.predicate_dfa_state(&mut d, call.start_state);
        }

        Target::State(self.add_dfa_edge(call.decision, previous.state_number, t, d))
    }

    /// Attach `(guard, alt)` pairs to an accept state whose alternatives
    /// carry predicates
    fn predicate_dfa_state(&self, d: &mut DfaState, decision_state: usize) {
        let nalts = self.atn.states[decision_state].transitions().len();
        let alts = match d.configs.unique_alt {
            Some(alt) => AltSet::single(alt),
            None => d.configs.conflicting_alts.clone().unwrap_or_default(),
        };
        match Self::get_preds_for_ambig_alts(&alts, &d.configs, nalts) {
            Some(alt_to_pred) => {
                d.predicates = Self::get_predicate_predictions(&alts, &alt_to_pred);
                d.prediction = None;
            }
            None => d.prediction = alts.min(),
        }
    }

    /// Disjunction of the guards of each alternative in `ambig_alts`, or
    /// `None` when no alternative is actually guarded
    fn get_preds_for_ambig_alts(
        ambig_alts: &AltSet,
        configs: &AtnConfigSet,
        nalts: usize,
    ) -> Option<Vec<SemanticContext>> {
        let mut alt_to_pred: Vec<Option<SemanticContext>> = vec![None; nalts + 1];
        for config in configs {
            if !ambig_alts.contains(config.alt) {
                continue;
            }
            let Some(slot) = alt_to_pred.get_mut(config.alt) else {
                continue;
            };
            *slot = Some(match slot.take() {
                None => config.semantic_context.clone(),
                Some(existing) => SemanticContext::or(&existing, &config.semantic_context),
            });
        }
        let alt_to_pred: Vec<SemanticContext> =
            alt_to_pred.into_iter().map(Option::unwrap_or_default).collect();
        let guarded = alt_to_pred.iter().skip(1).filter(|p| !p.is_none()).count();
        (guarded > 0).then_some(alt_to_pred)
    }

    fn get_predicate_predictions(
        ambig_alts: &AltSet,
        alt_to_pred: &[SemanticContext],
    ) -> Option<Vec<PredPrediction>> {
        let pairs: Vec<_> = alt_to_pred
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(alt, _)| ambig_alts.contains(*alt))
            .map(|(alt, pred)| PredPrediction {
                pred: pred.clone(),
                alt,
            })
            .collect();
        let any_guarded = alt_to_pred.iter().skip(1).any(|p| !p.is_none());
        any_guarded.then_some(pairs)
    }

    /// Alternatives whose guards hold, in order; stops at the first when not
    /// `complete`
    fn eval_predicates(call: &mut Call<'_>, predicates: &[PredPrediction], complete: bool) -> AltSet {
        let mut alts = AltSet::new();
        for pair in predicates {
            if pair.pred.is_none() || pair.pred.eval(call.recognizer, call.outer_context) {
                alts.insert(pair.alt);
                if !complete {
                    break;
                }
            }
        }
        alts
    }

    /// Full-context (LL) simulation from the decision start
    fn exec_atn_with_full_context(
        &mut self,
        call: &mut Call<'_>,
        d: &DfaState,
        s0: AtnConfigSet,
    ) -> PredictionResult<usize> {
        let mut previous = s0;
        let mut found_exact_ambig = false;
        call.input.seek(call.start_index);
        let mut t = call.input.la(1);

        let (mut reach, predicted_alt) = loop {
            let Some(mut reach) = self.compute_reach_set(call, &previous, t, true) else {
                let error = self.no_viable_alt(call, &previous);
                call.input.seek(call.start_index);
                if let Some(alt) =
                    self.get_syn_valid_or_sem_invalid_alt_that_finished_decision_entry_rule(call, &previous)
                {
                    return Ok(alt);
                }
                return Err(error);
            };

            let alt_subsets = mode::get_conflicting_alt_subsets(&reach);
            reach.unique_alt = mode::unique_alt(&reach);
            if let Some(alt) = reach.unique_alt {
                break (reach, alt);
            }
            if self.config.mode == PredictionMode::LlExactAmbigDetection {
                if mode::all_subsets_conflict(&alt_subsets) && mode::all_subsets_equal(&alt_subsets) {
                    if let Some(alt) = mode::get_single_viable_alt(&alt_subsets) {
                        found_exact_ambig = true;
                        break (reach, alt);
                    }
                }
            } else if let Some(alt) = mode::resolves_to_just_one_viable_alt(&alt_subsets) {
                break (reach, alt);
            }

            previous = reach;
            if t != EOF {
                call.input.consume();
                t = call.input.la(1);
            }
        };

        let stop_index = call.input.index();
        if reach.unique_alt.is_some() {
            let sll_guess = d.configs.conflicting_alts.as_ref().and_then(AltSet::min);
            if sll_guess != Some(predicted_alt) {
                self.stats.context_sensitivities += 1;
                self.listeners.report_context_sensitivity(
                    call.decision,
                    call.start_index,
                    stop_index,
                    predicted_alt,
                    &reach,
                );
            }
            return Ok(predicted_alt);
        }

        let alts = reach.alts();
        self.report_ambiguity(call, stop_index, found_exact_ambig, &alts, &reach);
        Ok(predicted_alt)
    }

    /// Configurations reachable from `closure` over symbol `t`, closed
    ///
    /// `None` when nothing survives.
    fn compute_reach_set(
        &mut self,
        call: &mut Call<'_>,
        closure: &AtnConfigSet,
        t: i32,
        full_ctx: bool,
    ) -> Option<AtnConfigSet> {
        let mut intermediate = AtnConfigSet::new(full_ctx);
        let mut skipped_stop_states = Vec::new();

        for config in closure {
            let state = &self.atn.states[config.state];
            if state.is_rule_stop() {
                if full_ctx || t == EOF {
                    skipped_stop_states.push(config.clone());
                }
                continue;
            }
            for transition in state.transitions() {
                if transition.matches(t, 0, self.atn.max_token_type) {
                    intermediate.add(config.with_state(transition.target()), Some(&mut call.merge_cache));
                }
            }
        }

        let skip_closure = skipped_stop_states.is_empty()
            && t != EOF
            && (intermediate.len() == 1 || mode::unique_alt(&intermediate).is_some());

        let mut reach = if skip_closure {
            intermediate
        } else {
            let mut reach = AtnConfigSet::new(full_ctx);
            let mut busy = HashSet::new();
            let treat_eof_as_epsilon = t == EOF;
            for config in &intermediate {
                self.closure(call, config.clone(), &mut reach, &mut busy, false, full_ctx, treat_eof_as_epsilon);
            }
            reach
        };

        if t == EOF {
            reach = self.remove_all_configs_not_in_rule_stop_state(call, reach, skip_closure);
        }

        if !skipped_stop_states.is_empty()
            && (!full_ctx || !mode::has_config_in_rule_stop_state(&self.atn, &reach))
        {
            for config in skipped_stop_states {
                reach.add(config, Some(&mut call.merge_cache));
            }
        }

        (!reach.is_empty()).then_some(reach)
    }

    /// Keep configurations that finished their rule, or, when
    /// `look_to_end_of_rule`, that can finish it without consuming input
    fn remove_all_configs_not_in_rule_stop_state(
        &self,
        call: &mut Call<'_>,
        configs: AtnConfigSet,
        look_to_end_of_rule: bool,
    ) -> AtnConfigSet {
        if mode::all_configs_in_rule_stop_states(&self.atn, &configs) {
            return configs;
        }
        let mut result = configs.empty_like();
        for config in &configs {
            let state = &self.atn.states[config.state];
            if state.is_rule_stop() {
                result.add(config.clone(), Some(&mut call.merge_cache));
                continue;
            }
            if look_to_end_of_rule
                && state.only_has_epsilon_transitions()
                && self.atn.next_tokens(config.state).contains(EPSILON)
            {
                let end_of_rule = self.atn.rule_to_stop_state[state.rule_index];
                result.add(config.with_state(end_of_rule), Some(&mut call.merge_cache));
            }
        }
        result
    }

    /// Closure of the decision's alternatives, under the caller's stack when
    /// `full_ctx`
    fn compute_start_state(&mut self, call: &mut Call<'_>, full_ctx: bool) -> AtnConfigSet {
        let initial_context = if full_ctx {
            PredictionContext::from_rule_context(&self.atn, call.outer_context)
        } else {
            PredictionContext::empty()
        };
        let mut configs = AtnConfigSet::new(full_ctx);
        let atn = Arc::clone(&self.atn);
        for (i, transition) in atn.states[call.start_state].transitions().iter().enumerate() {
            let config = AtnConfig::new(transition.target(), i + 1, Arc::clone(&initial_context));
            let mut busy = HashSet::new();
            self.closure(call, config, &mut configs, &mut busy, true, full_ctx, false);
        }
        configs
    }

    /// Epsilon closure of `config` into `configs`
    ///
    /// Without full context, reaching the end of the decision rule follows
    /// every return link of that rule (the caller is unknown). With full
    /// context, an empty stack there means the outermost rule finished.
    #[allow(clippy::too_many_arguments)]
    fn closure(
        &mut self,
        call: &mut Call<'_>,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        busy: &mut HashSet<AtnConfig>,
        collect_predicates: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) {
        let atn = Arc::clone(&self.atn);
        let mut stack = vec![Frame::Enter {
            config,
            depth: 0,
            collect: collect_predicates,
        }];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter {
                    config,
                    depth,
                    collect,
                } => {
                    if atn.states[config.state].is_rule_stop() {
                        if !config.context.is_empty() {
                            stack.push(Frame::Pop {
                                config,
                                depth,
                                collect,
                                index: 0,
                            });
                            continue;
                        }
                        if full_ctx {
                            configs.add(config, Some(&mut call.merge_cache));
                            continue;
                        }
                    }
                    Self::begin_follow(&atn, config, depth, collect, configs, &mut call.merge_cache, &mut stack);
                }

                Frame::Pop {
                    config,
                    depth,
                    collect,
                    index,
                } => {
                    let context = Arc::clone(&config.context);
                    if index >= context.len() {
                        continue;
                    }
                    stack.push(Frame::Pop {
                        config: config.clone(),
                        depth,
                        collect,
                        index: index + 1,
                    });
                    let return_state = context.return_state(index);
                    if return_state == EMPTY_RETURN_STATE {
                        if full_ctx {
                            let finished = config.with_context(config.state, PredictionContext::empty());
                            configs.add(finished, Some(&mut call.merge_cache));
                        } else {
                            Self::begin_follow(&atn, config, depth, collect, configs, &mut call.merge_cache, &mut stack);
                        }
                        continue;
                    }
                    let parent = context
                        .parent(index)
                        .cloned()
                        .unwrap_or_else(PredictionContext::empty);
                    stack.push(Frame::Enter {
                        config: config.with_context(return_state, parent),
                        depth: depth - 1,
                        collect,
                    });
                }

                Frame::Follow {
                    config,
                    depth,
                    collect,
                    index,
                } => {
                    let state = &atn.states[config.state];
                    let Some(transition) = state.transition(index) else {
                        continue;
                    };
                    stack.push(Frame::Follow {
                        config: config.clone(),
                        depth,
                        collect,
                        index: index + 1,
                    });

                    let continue_collecting = collect && !matches!(transition, Transition::Action { .. });
                    let Some(mut next) = Self::get_epsilon_target(
                        call,
                        &config,
                        transition,
                        continue_collecting,
                        depth == 0,
                        full_ctx,
                        treat_eof_as_epsilon,
                    ) else {
                        continue;
                    };

                    let mut new_depth = depth;
                    if state.is_rule_stop() {
                        // Left the decision rule with no caller on the stack
                        if call.precedence_dfa
                            && transition.outermost_precedence_return()
                                == Some(atn.states[call.start_state].rule_index)
                        {
                            next.set_precedence_filter_suppressed(true);
                        }
                        next.reaches_into_outer_context += 1;
                        if !busy.insert(next.clone()) {
                            continue;
                        }
                        configs.dips_into_outer_context = true;
                        new_depth -= 1;
                    } else {
                        if !transition.is_epsilon() && !busy.insert(next.clone()) {
                            continue;
                        }
                        if matches!(transition, Transition::Rule { .. }) && new_depth >= 0 {
                            new_depth += 1;
                        }
                    }
                    stack.push(Frame::Enter {
                        config: next,
                        depth: new_depth,
                        collect: continue_collecting,
                    });
                }
            }
        }
    }

    /// Record `config` unless its state is epsilon-only, then walk its edges
    fn begin_follow(
        atn: &Atn,
        config: AtnConfig,
        depth: isize,
        collect: bool,
        configs: &mut AtnConfigSet,
        merge_cache: &mut MergeCache,
        stack: &mut Vec<Frame>,
    ) {
        if !atn.states[config.state].only_has_epsilon_transitions() {
            configs.add(config.clone(), Some(merge_cache));
        }
        stack.push(Frame::Follow {
            config,
            depth,
            collect,
            index: 0,
        });
    }

    fn get_epsilon_target(
        call: &mut Call<'_>,
        config: &AtnConfig,
        transition: &Transition,
        collect_predicates: bool,
        in_context: bool,
        full_ctx: bool,
        treat_eof_as_epsilon: bool,
    ) -> Option<AtnConfig> {
        match transition {
            Transition::Rule {
                target,
                follow_state,
                ..
            } => {
                let context = PredictionContext::singleton(Some(Arc::clone(&config.context)), *follow_state);
                Some(config.with_context(*target, context))
            }
            Transition::Precedence { target, precedence } => {
                let predicate = SemanticContext::Precedence {
                    precedence: *precedence,
                };
                if collect_predicates && in_context {
                    Self::guarded(call, config, *target, predicate, full_ctx)
                } else {
                    Some(config.with_state(*target))
                }
            }
            Transition::Predicate {
                target,
                rule_index,
                pred_index,
                is_ctx_dependent,
            } => {
                let predicate = SemanticContext::Predicate {
                    rule_index: *rule_index,
                    pred_index: *pred_index,
                    is_ctx_dependent: *is_ctx_dependent,
                };
                if collect_predicates && (!is_ctx_dependent || in_context) {
                    Self::guarded(call, config, *target, predicate, full_ctx)
                } else {
                    Some(config.with_state(*target))
                }
            }
            Transition::Action { target, .. } | Transition::Epsilon { target, .. } => {
                Some(config.with_state(*target))
            }
            Transition::Atom { target, .. }
            | Transition::Range { target, .. }
            | Transition::Set { target, .. } => (treat_eof_as_epsilon
                && transition.matches(EOF, 0, 1))
            .then(|| config.with_state(*target)),
            Transition::NotSet { .. } | Transition::Wildcard { .. } => None,
        }
    }

    /// Cross a predicate edge: with full context the guard is evaluated now
    /// at the decision's start; otherwise it is recorded on the configuration
    fn guarded(
        call: &mut Call<'_>,
        config: &AtnConfig,
        target: usize,
        predicate: SemanticContext,
        full_ctx: bool,
    ) -> Option<AtnConfig> {
        if full_ctx {
            let current = call.input.index();
            call.input.seek(call.start_index);
            let holds = predicate.eval(call.recognizer, call.outer_context);
            call.input.seek(current);
            holds.then(|| config.with_state(target))
        } else {
            let combined = SemanticContext::and(&config.semantic_context, &predicate);
            Some(config.with_semantic_context(target, combined))
        }
    }

    /// At a dead end, an alternative that already finished the decision
    /// rule, preferring configurations whose guards hold
    fn get_syn_valid_or_sem_invalid_alt_that_finished_decision_entry_rule(
        &self,
        call: &mut Call<'_>,
        configs: &AtnConfigSet,
    ) -> Option<usize> {
        let (valid, invalid): (Vec<&AtnConfig>, Vec<&AtnConfig>) = configs.iter().partition(|c| {
            c.semantic_context.is_none() || c.semantic_context.eval(call.recognizer, call.outer_context)
        });
        self.get_alt_that_finished_decision_entry_rule(&valid)
            .or_else(|| self.get_alt_that_finished_decision_entry_rule(&invalid))
    }

    fn get_alt_that_finished_decision_entry_rule(&self, configs: &[&AtnConfig]) -> Option<usize> {
        configs
            .iter()
            .filter(|c| {
                c.outer_context_depth() > 0
                    || (self.atn.states[c.state].is_rule_stop() && c.context.has_empty_path())
            })
            .map(|c| c.alt)
            .min()
    }

    fn no_viable_alt(&self, call: &Call<'_>, configs: &AtnConfigSet) -> PredictionError {
        let offending_index = call.input.index();
        tracing::debug!(
            decision = call.decision,
            start = call.start_index,
            offending = offending_index,
            configs = configs.len(),
            "no viable alternative"
        );
        PredictionError::NoViableAlt {
            decision: call.decision,
            start_index: call.start_index,
            offending_index,
            configs: Arc::new(configs.clone()),
        }
    }

    fn report_ambiguity(
        &mut self,
        call: &Call<'_>,
        stop_index: usize,
        exact: bool,
        alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        self.stats.ambiguities += 1;
        self.listeners
            .report_ambiguity(call.decision, call.start_index, stop_index, exact, alts, configs);
    }

    fn add_error_edge(&self, decision: usize, from: StateId, t: i32) {
        if t < EOF || t > self.atn.max_token_type {
            return;
        }
        if let Some(mut dfa) = self.dfa.lock(decision) {
            dfa.set_edge(from, t, StateId::ERROR);
        }
    }

    fn add_dfa_edge(&self, decision: usize, from: StateId, t: i32, to: DfaState) -> Arc<DfaState> {
        let to = self.add_dfa_state(decision, to);
        if t >= EOF && t <= self.atn.max_token_type {
            if let Some(mut dfa) = self.dfa.lock(decision) {
                dfa.set_edge(from, t, to.state_number);
            }
        }
        to
    }

    /// Intern `d`, canonicalizing its contexts when it is new
    fn add_dfa_state(&self, decision: usize, d: DfaState) -> Arc<DfaState> {
        let cache = &self.context_cache;
        let optimize = self.config.optimize_contexts;
        match self.dfa.lock(decision) {
            Some(mut dfa) => dfa.add_state_with(d, |configs| {
                if optimize {
                    configs.optimize_configs(cache);
                }
            }),
            None => Arc::new(d),
        }
    }
}
