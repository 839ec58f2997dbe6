//! # Error Types
//!
//! Errors raised while building an ATN, predicting alternatives, lexing and
//! interpreting.
//!
//! ## Overview
//!
//! - [`AtnError`]: the automaton itself is malformed. These are fatal and only
//!   produced at construction time, never during simulation.
//! - [`PredictionError`]: adaptive prediction found no viable alternative, or
//!   bail mode cancelled it at the first conflict.
//! - [`LexerError`]: no lexer rule matches at the current position.
//! - [`ParseError`]: raised by the [`ParserInterpreter`](crate::interpreter::ParserInterpreter)
//!   when the input does not follow the ATN.
//!
//! Ambiguity and context sensitivity are not errors; they are reported to an
//! [`ErrorListener`](crate::listener::ErrorListener) and prediction still
//! yields an alternative.

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

use crate::atn::AtnType;
use crate::config::{AltSet, AtnConfigSet};
use crate::interval::IntervalSet;

/// Malformed automaton
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum AtnError {
    #[error("state {state} references missing state {target}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::invalid_state)))]
    InvalidState { state: usize, target: usize },

    #[error("expected a {expected} ATN, found a {found} ATN")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::wrong_grammar_type)))]
    WrongGrammarType { expected: AtnType, found: AtnType },

    #[error("rule {rule} has no stop state")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::missing_rule_stop)))]
    MissingRuleStop { rule: usize },

    #[error("precedence predicate in lexer ATN at state {state}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::precedence_in_lexer)))]
    PrecedenceInLexer { state: usize },

    #[error("epsilon-only cycle through state {state}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(atn::epsilon_cycle),
            help("every loop body must consume at least one symbol")
        )
    )]
    EpsilonCycle { state: usize },

    #[error("unknown lexer action {index} at state {state}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::unknown_action)))]
    UnknownAction { state: usize, index: usize },

    #[error("unknown rule {rule}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::unknown_rule)))]
    UnknownRule { rule: usize },

    #[error("DFA cache holds {found} DFAs but the ATN needs {expected}")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(atn::cache_mismatch),
            help("build the cache with DfaCache::new from the same ATN")
        )
    )]
    CacheMismatch { expected: usize, found: usize },
}

impl AtnError {
    #[must_use]
    pub const fn invalid_state(state: usize, target: usize) -> Self {
        Self::InvalidState { state, target }
    }

    #[must_use]
    pub const fn wrong_grammar_type(expected: AtnType, found: AtnType) -> Self {
        Self::WrongGrammarType { expected, found }
    }
}

/// Failure of a single `adaptive_predict` call
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum PredictionError {
    #[error("no viable alternative for decision {decision} at input index {offending_index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(prediction::no_viable_alt)))]
    NoViableAlt {
        decision: usize,
        start_index: usize,
        offending_index: usize,
        /// Configurations alive just before the dead end
        configs: Arc<AtnConfigSet>,
    },

    #[error("prediction cancelled at decision {decision}: conflict between alternatives {conflicting_alts}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(prediction::cancelled)))]
    Cancelled {
        decision: usize,
        start_index: usize,
        conflicting_alts: AltSet,
    },

    #[error("unknown decision {decision}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(prediction::unknown_decision)))]
    UnknownDecision { decision: usize },
}

impl PredictionError {
    #[must_use]
    pub const fn decision(&self) -> usize {
        match self {
            Self::NoViableAlt { decision, .. }
            | Self::Cancelled { decision, .. }
            | Self::UnknownDecision { decision } => *decision,
        }
    }

    /// Input index where prediction started
    #[must_use]
    pub const fn start_index(&self) -> Option<usize> {
        match self {
            Self::NoViableAlt { start_index, .. } | Self::Cancelled { start_index, .. } => {
                Some(*start_index)
            }
            Self::UnknownDecision { .. } => None,
        }
    }
}

/// Tokenization failure
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum LexerError {
    #[error("token recognition error at index {start_index}: '{text}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::no_viable_alt)))]
    NoViableAlt {
        start_index: usize,
        /// Text from the token start through the offending character
        text: String,
        configs: Arc<AtnConfigSet>,
    },

    #[error("unknown lexer mode {mode}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::unknown_mode)))]
    UnknownMode { mode: usize },
}

/// Interpreter failure
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseError {
    #[error("mismatched input {found} at index {index}, expecting {expected}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::input_mismatch)))]
    InputMismatch {
        expected: IntervalSet,
        found: i32,
        index: usize,
    },

    #[error("rule {rule_index} failed predicate {predicate}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::failed_predicate)))]
    FailedPredicate { rule_index: usize, predicate: String },

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Atn(#[from] AtnError),
}

impl ParseError {
    #[must_use]
    pub const fn input_mismatch(expected: IntervalSet, found: i32, index: usize) -> Self {
        Self::InputMismatch {
            expected,
            found,
            index,
        }
    }
}

/// Result alias for prediction
pub type PredictionResult<T> = Result<T, PredictionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atn_error_display() {
        let error = AtnError::invalid_state(3, 99);
        assert_eq!(format!("{error}"), "state 3 references missing state 99");

        let error = AtnError::wrong_grammar_type(AtnType::Lexer, AtnType::Parser);
        assert_eq!(format!("{error}"), "expected a lexer ATN, found a parser ATN");
    }

    #[test]
    fn test_prediction_error_accessors() {
        let error = PredictionError::Cancelled {
            decision: 4,
            start_index: 10,
            conflicting_alts: [1, 2].into_iter().collect(),
        };
        assert_eq!(error.decision(), 4);
        assert_eq!(error.start_index(), Some(10));
        assert_eq!(
            format!("{error}"),
            "prediction cancelled at decision 4: conflict between alternatives {1, 2}"
        );
    }

    #[test]
    fn test_parse_error_wraps_prediction_error() {
        let error: ParseError = PredictionError::UnknownDecision { decision: 7 }.into();
        assert_eq!(format!("{error}"), "unknown decision 7");
    }
}
