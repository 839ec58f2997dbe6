//! # Recognizer Callbacks
//!
//! Grammar-specific code the simulators call back into: semantic
//! predicates, precedence checks and embedded actions.

use std::sync::Arc;

use crate::context::RuleContext;

/// Hooks a generated or hand-written recognizer supplies
///
/// Every method has a permissive default so grammars without predicates or
/// actions need no code at all.
pub trait Recognizer {
    /// Evaluate predicate `pred_index` of rule `rule_index`
    ///
    /// Lexers receive `None` for the context.
    fn sempred(
        &mut self,
        _local_ctx: Option<&Arc<RuleContext>>,
        _rule_index: usize,
        _pred_index: usize,
    ) -> bool {
        true
    }

    /// Precedence predicate `{precedence >= _p}`
    fn precpred(&mut self, _local_ctx: Option<&Arc<RuleContext>>, _precedence: i32) -> bool {
        true
    }

    /// Run a parser action, or a lexer custom action
    fn action(
        &mut self,
        _local_ctx: Option<&Arc<RuleContext>>,
        _rule_index: usize,
        _action_index: Option<usize>,
    ) {
    }

    /// Precedence level of the innermost left-recursive invocation, used to
    /// select the start state of a precedence DFA
    fn precedence(&self) -> i32 {
        -1
    }
}

/// Recognizer without predicates or actions
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecognizer;

impl Recognizer for NoopRecognizer {}

impl<R: Recognizer + ?Sized> Recognizer for &mut R {
    fn sempred(
        &mut self,
        local_ctx: Option<&Arc<RuleContext>>,
        rule_index: usize,
        pred_index: usize,
    ) -> bool {
        (**self).sempred(local_ctx, rule_index, pred_index)
    }

    fn precpred(&mut self, local_ctx: Option<&Arc<RuleContext>>, precedence: i32) -> bool {
        (**self).precpred(local_ctx, precedence)
    }

    fn action(
        &mut self,
        local_ctx: Option<&Arc<RuleContext>>,
        rule_index: usize,
        action_index: Option<usize>,
    ) {
        (**self).action(local_ctx, rule_index, action_index);
    }

    fn precedence(&self) -> i32 {
        (**self).precedence()
    }
}
