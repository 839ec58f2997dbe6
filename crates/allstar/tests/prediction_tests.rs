//! Tests for adaptive prediction: DFA reuse, SLL conflicts with LL
//! fallback, ambiguity reports, bail-out and predicates

use std::sync::{Arc, Mutex};

use allstar::atn::{Atn, AtnBuilder};
use allstar::config::{AltSet, AtnConfigSet};
use allstar::context::{PredictionContextCache, RuleContext};
use allstar::dfa::DfaCache;
use allstar::error::PredictionError;
use allstar::lexer::Token;
use allstar::listener::ErrorListener;
use allstar::prediction::{ParserAtnSimulator, PredictionConfig, PredictionMode};
use allstar::recognizer::{NoopRecognizer, Recognizer};
use allstar::stream::{CommonTokenStream, IntStream};
use rstest::rstest;
use tracing_subscriber::EnvFilter;

const X: i32 = 1;
const Y: i32 = 2;
const Z: i32 = 3;
const A: i32 = 4;

fn tokens(types: &[i32]) -> CommonTokenStream {
    let tokens = types.iter().map(|&t| Token::new(t, t.to_string())).collect();
    CommonTokenStream::new(tokens, 0)
}

/// Logs prediction steps when run with `RUST_LOG=allstar=trace`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn simulator(atn: &Arc<Atn>) -> ParserAtnSimulator {
    init_tracing();
    let dfa = Arc::new(DfaCache::new(atn));
    ParserAtnSimulator::new(Arc::clone(atn), dfa, Arc::new(PredictionContextCache::new())).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Report {
    Ambiguity { exact: bool, alts: Vec<usize> },
    FullContext { alts: Vec<usize> },
    ContextSensitivity { prediction: usize },
}

#[derive(Default)]
struct Recorder {
    reports: Mutex<Vec<Report>>,
}

impl Recorder {
    fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }
}

impl ErrorListener for Recorder {
    fn report_ambiguity(&self, _: usize, _: usize, _: usize, exact: bool, alts: &AltSet, _: &AtnConfigSet) {
        self.reports.lock().unwrap().push(Report::Ambiguity {
            exact,
            alts: alts.iter().collect(),
        });
    }

    fn report_attempting_full_context(&self, _: usize, _: usize, _: usize, alts: &AltSet, _: &AtnConfigSet) {
        self.reports.lock().unwrap().push(Report::FullContext {
            alts: alts.iter().collect(),
        });
    }

    fn report_context_sensitivity(&self, _: usize, _: usize, _: usize, prediction: usize, _: &AtnConfigSet) {
        self.reports
            .lock()
            .unwrap()
            .push(Report::ContextSensitivity { prediction });
    }
}

/// `s : X A Y | X A Z ;` needs two tokens of lookahead
fn two_token_lookahead() -> Arc<Atn> {
    let mut b = AtnBuilder::parser(4);
    let s = b.rule();
    let parts: Vec<_> = [X, A, Y].into_iter().map(|t| b.atom(s, t)).collect();
    let first = b.seq(s, parts);
    let parts: Vec<_> = [X, A, Z].into_iter().map(|t| b.atom(s, t)).collect();
    let second = b.seq(s, parts);
    let body = b.alt_block(s, vec![first, second]);
    b.set_rule_body(s, body);
    Arc::new(b.build().unwrap())
}

/// Grammar whose decision in `e` is resolved by the caller
///
/// ```text
/// s : X e Y | Z e ;
/// e : A | A Y ;
/// ```
struct CallerSensitive {
    atn: Arc<Atn>,
    decision: usize,
    /// Invoking states of `e` in the first and second alternative of `s`
    calls: [usize; 2],
    s: usize,
    e: usize,
}

fn caller_sensitive() -> CallerSensitive {
    let mut b = AtnBuilder::parser(4);
    let s = b.rule();
    let e = b.rule();

    let x = b.atom(s, X);
    let call1 = b.rule_ref(s, e, 0);
    let y = b.atom(s, Y);
    let alt1 = b.seq(s, [x, call1, y]);
    let z = b.atom(s, Z);
    let call2 = b.rule_ref(s, e, 0);
    let alt2 = b.seq(s, [z, call2]);
    let body = b.alt_block(s, vec![alt1, alt2]);
    b.set_rule_body(s, body);

    let a1 = b.atom(e, A);
    let a2 = b.atom(e, A);
    let y2 = b.atom(e, Y);
    let longer = b.seq(e, [a2, y2]);
    let block = b.alt_block(e, vec![a1, longer]);
    b.set_rule_body(e, block);

    let atn = Arc::new(b.build().unwrap());
    let decision = atn.states[block.entry].decision.unwrap();
    CallerSensitive {
        atn,
        decision,
        calls: [call1.entry, call2.entry],
        s,
        e,
    }
}

impl CallerSensitive {
    fn outer(&self, call: usize) -> Arc<RuleContext> {
        RuleContext::child(&RuleContext::root(self.s), self.calls[call], self.e)
    }
}

#[test]
fn test_second_prediction_walks_cached_edges() {
    let atn = two_token_lookahead();
    let mut sim = simulator(&atn);

    let mut input = tokens(&[X, A, Z]);
    let alt = sim.adaptive_predict(&mut input, 0, None, &mut NoopRecognizer).unwrap();
    assert_eq!(alt, 2);
    assert_eq!(input.index(), 0);
    let computed = sim.stats().atn_transitions;
    let states = sim.dfa().stats().states;
    assert!(computed > 0);

    let mut input = tokens(&[X, A, Z]);
    let alt = sim.adaptive_predict(&mut input, 0, None, &mut NoopRecognizer).unwrap();
    assert_eq!(alt, 2);
    assert_eq!(sim.stats().atn_transitions, computed);
    assert_eq!(sim.dfa().stats().states, states);
    assert_eq!(sim.stats().dfa_hits, 3);
    assert_eq!(sim.stats().predictions, 2);
}

#[test]
fn test_shared_cache_serves_other_simulators() {
    let atn = two_token_lookahead();
    let dfa = Arc::new(DfaCache::new(&atn));
    let contexts = Arc::new(PredictionContextCache::new());
    let mut first = ParserAtnSimulator::new(Arc::clone(&atn), Arc::clone(&dfa), Arc::clone(&contexts)).unwrap();
    let mut second = ParserAtnSimulator::new(Arc::clone(&atn), dfa, contexts).unwrap();

    first
        .adaptive_predict(&mut tokens(&[X, A, Y]), 0, None, &mut NoopRecognizer)
        .unwrap();
    let alt = second
        .adaptive_predict(&mut tokens(&[X, A, Y]), 0, None, &mut NoopRecognizer)
        .unwrap();
    assert_eq!(alt, 1);
    assert_eq!(second.stats().atn_transitions, 0);
}

#[test]
fn test_no_viable_alternative_keeps_position() {
    let atn = two_token_lookahead();
    let mut sim = simulator(&atn);
    let mut input = tokens(&[X, A, X]);
    let err = sim
        .adaptive_predict(&mut input, 0, None, &mut NoopRecognizer)
        .unwrap_err();
    let PredictionError::NoViableAlt {
        start_index,
        offending_index,
        configs,
        ..
    } = &err
    else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(*start_index, 0);
    assert_eq!(*offending_index, 2);
    assert_eq!(configs.alts().iter().collect::<Vec<_>>(), [1, 2]);
    assert_eq!(input.index(), 0);
    assert_eq!(sim.stats().no_viable_alts, 1);
}

#[test]
fn test_unknown_decision() {
    let atn = two_token_lookahead();
    let mut sim = simulator(&atn);
    let err = sim
        .adaptive_predict(&mut tokens(&[X]), 9, None, &mut NoopRecognizer)
        .unwrap_err();
    assert!(matches!(err, PredictionError::UnknownDecision { decision: 9 }));
}

#[rstest]
#[case::first_caller_wants_short_alt(0, 1, false)]
#[case::second_caller_wants_long_alt(1, 2, true)]
fn test_full_context_resolves_sll_conflict(
    #[case] call: usize,
    #[case] expected: usize,
    #[case] sensitive: bool,
) {
    let grammar = caller_sensitive();
    let mut sim = simulator(&grammar.atn);
    let recorder = Arc::new(Recorder::default());
    sim.add_error_listener(recorder.clone());

    let outer = grammar.outer(call);
    let mut input = tokens(&[A, Y]);
    let alt = sim
        .adaptive_predict(&mut input, grammar.decision, Some(&outer), &mut NoopRecognizer)
        .unwrap();
    assert_eq!(alt, expected);
    assert_eq!(input.index(), 0);
    assert_eq!(sim.stats().full_context, 1);

    let reports = recorder.reports();
    assert_eq!(reports[0], Report::FullContext { alts: vec![1, 2] });
    assert_eq!(
        reports.contains(&Report::ContextSensitivity { prediction: 2 }),
        sensitive
    );
    assert_eq!(sim.stats().context_sensitivities, usize::from(sensitive));
}

#[test]
fn test_sll_mode_takes_minimum_alternative() {
    let grammar = caller_sensitive();
    let mut sim = simulator(&grammar.atn).with_config(PredictionConfig::default().with_mode(PredictionMode::Sll));
    let outer = grammar.outer(1);
    let alt = sim
        .adaptive_predict(&mut tokens(&[A, Y]), grammar.decision, Some(&outer), &mut NoopRecognizer)
        .unwrap();
    assert_eq!(alt, 1);
    assert_eq!(sim.stats().full_context, 0);
}

#[test]
fn test_bail_cancels_at_conflict() {
    let grammar = caller_sensitive();
    let mut sim = simulator(&grammar.atn).with_config(PredictionConfig::default().with_bail_on_conflict(true));
    let outer = grammar.outer(1);
    let mut input = tokens(&[A, Y]);
    let err = sim
        .adaptive_predict(&mut input, grammar.decision, Some(&outer), &mut NoopRecognizer)
        .unwrap_err();
    let PredictionError::Cancelled {
        conflicting_alts, ..
    } = &err
    else {
        panic!("unexpected error {err:?}");
    };
    assert_eq!(conflicting_alts.iter().collect::<Vec<_>>(), [1, 2]);
    assert_eq!(input.index(), 0);
}

/// `s : A | A ;`
fn ambiguous() -> Arc<Atn> {
    let mut b = AtnBuilder::parser(4);
    let s = b.rule();
    let first = b.atom(s, A);
    let second = b.atom(s, A);
    let body = b.alt_block(s, vec![first, second]);
    b.set_rule_body(s, body);
    Arc::new(b.build().unwrap())
}

#[rstest]
#[case::ll(PredictionMode::Ll, false)]
#[case::exact(PredictionMode::LlExactAmbigDetection, true)]
fn test_true_ambiguity_predicts_minimum(#[case] mode: PredictionMode, #[case] exact: bool) {
    let atn = ambiguous();
    let mut sim = simulator(&atn).with_config(PredictionConfig::default().with_mode(mode));
    let recorder = Arc::new(Recorder::default());
    sim.add_error_listener(recorder.clone());

    let alt = sim
        .adaptive_predict(&mut tokens(&[A]), 0, None, &mut NoopRecognizer)
        .unwrap();
    assert_eq!(alt, 1);
    assert!(recorder.reports().contains(&Report::Ambiguity {
        exact,
        alts: vec![1, 2],
    }));
    assert_eq!(sim.stats().ambiguities, 1);
}

/// Predicates that hold are listed by index
struct Holds(Vec<usize>);

impl Recognizer for Holds {
    fn sempred(&mut self, _: Option<&Arc<RuleContext>>, _: usize, pred_index: usize) -> bool {
        self.0.contains(&pred_index)
    }
}

/// `s : {p0}? A | {p1}? A ;`
fn guarded() -> Arc<Atn> {
    let mut b = AtnBuilder::parser(4);
    let s = b.rule();
    let p0 = b.predicate(s, 0, false);
    let a0 = b.atom(s, A);
    let first = b.seq(s, [p0, a0]);
    let p1 = b.predicate(s, 1, false);
    let a1 = b.atom(s, A);
    let second = b.seq(s, [p1, a1]);
    let body = b.alt_block(s, vec![first, second]);
    b.set_rule_body(s, body);
    Arc::new(b.build().unwrap())
}

#[rstest]
#[case::first(vec![0], 1)]
#[case::second(vec![1], 2)]
#[case::both_prefer_lower(vec![0, 1], 1)]
fn test_predicates_choose_alternative(#[case] holds: Vec<usize>, #[case] expected: usize) {
    let atn = guarded();
    let mut sim = simulator(&atn);
    let alt = sim
        .adaptive_predict(&mut tokens(&[A]), 0, None, &mut Holds(holds))
        .unwrap();
    assert_eq!(alt, expected);
}

#[test]
fn test_no_predicate_holds() {
    let atn = guarded();
    let mut sim = simulator(&atn);
    let err = sim
        .adaptive_predict(&mut tokens(&[A]), 0, None, &mut Holds(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, PredictionError::NoViableAlt { .. }));
}

#[test]
fn test_predicates_are_reevaluated_on_cached_states() {
    let atn = guarded();
    let mut sim = simulator(&atn);
    let first = sim
        .adaptive_predict(&mut tokens(&[A]), 0, None, &mut Holds(vec![1]))
        .unwrap();
    let second = sim
        .adaptive_predict(&mut tokens(&[A]), 0, None, &mut Holds(vec![0]))
        .unwrap();
    assert_eq!((first, second), (2, 1));
}
