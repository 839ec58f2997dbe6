//! # Configurations
//!
//! An [`AtnConfig`] is one thread of the ATN simulation: an ATN state, the
//! alternative it predicts, the call stack that got it there and the guard
//! that must hold. [`AtnConfigSet`] collects them during closure and becomes
//! the identity of a DFA state once frozen.

mod alts;
mod set;

pub use alts::AltSet;
pub use set::AtnConfigSet;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::context::ContextRef;
use crate::lexer::LexerActionExecutor;
use crate::semantic::SemanticContext;

/// A `(state, alt, context, guard)` tuple plus simulation flags
#[derive(Debug, Clone)]
pub struct AtnConfig {
    pub state: usize,
    /// Alternative of the decision this configuration predicts, 1-based
    pub alt: usize,
    pub context: ContextRef,
    pub semantic_context: SemanticContext,
    /// How many times closure left the decision rule through a follow link
    /// with no real caller on the stack
    pub reaches_into_outer_context: usize,
    pub(crate) precedence_filter_suppressed: bool,
    /// Lexer actions collected on the way to this configuration
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    /// Lexer only: closure went through a non-greedy decision
    pub passed_through_non_greedy: bool,
}

impl AtnConfig {
    #[must_use]
    pub fn new(state: usize, alt: usize, context: ContextRef) -> Self {
        Self {
            state,
            alt,
            context,
            semantic_context: SemanticContext::None,
            reaches_into_outer_context: 0,
            precedence_filter_suppressed: false,
            lexer_action_executor: None,
            passed_through_non_greedy: false,
        }
    }

    /// Same configuration moved to `state`
    #[must_use]
    pub fn with_state(&self, state: usize) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Moved to `state` with a new call stack
    #[must_use]
    pub fn with_context(&self, state: usize, context: ContextRef) -> Self {
        Self {
            state,
            context,
            ..self.clone()
        }
    }

    /// Moved to `state` with a new guard
    #[must_use]
    pub fn with_semantic_context(&self, state: usize, semantic_context: SemanticContext) -> Self {
        Self {
            state,
            semantic_context,
            ..self.clone()
        }
    }

    #[must_use]
    pub const fn outer_context_depth(&self) -> usize {
        self.reaches_into_outer_context
    }

    #[must_use]
    pub const fn is_precedence_filter_suppressed(&self) -> bool {
        self.precedence_filter_suppressed
    }

    pub fn set_precedence_filter_suppressed(&mut self, suppressed: bool) {
        self.precedence_filter_suppressed = suppressed;
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && (Arc::ptr_eq(&self.context, &other.context) || self.context == other.context)
            && self.semantic_context == other.semantic_context
            && self.precedence_filter_suppressed == other.precedence_filter_suppressed
            && self.passed_through_non_greedy == other.passed_through_non_greedy
            && self.lexer_action_executor == other.lexer_action_executor
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.context.hash(state);
        self.semantic_context.hash(state);
        self.passed_through_non_greedy.hash(state);
        self.lexer_action_executor.hash(state);
    }
}

impl fmt::Display for AtnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{}", self.state, self.alt, self.context)?;
        if !self.semantic_context.is_none() {
            write!(f, ",{}", self.semantic_context)?;
        }
        if self.reaches_into_outer_context > 0 {
            write!(f, ",up={}", self.reaches_into_outer_context)?;
        }
        f.write_str(")")
    }
}
