//! # Error Listeners
//!
//! Recognizers report syntax errors and prediction diagnostics through
//! [`ErrorListener`]. Ambiguity, full-context fallback and context
//! sensitivity are advisory: prediction still returns an alternative.

use std::error::Error;
use std::sync::Arc;

use crate::config::{AltSet, AtnConfigSet};
use crate::lexer::Token;

/// Receiver of recognition events
///
/// Every method defaults to doing nothing. Listeners take `&self` so one
/// instance can be shared between recognizers; use interior mutability to
/// collect events.
pub trait ErrorListener: Send + Sync {
    /// Input did not match; `offending_symbol` is `None` for lexer errors
    fn syntax_error(
        &self,
        _offending_symbol: Option<&Token>,
        _line: usize,
        _column: usize,
        _message: &str,
        _error: Option<&dyn Error>,
    ) {
    }

    /// Several alternatives remain viable for the input `start..=stop`
    ///
    /// `exact` is true when full-context prediction proved the ambiguity
    /// rather than stopping at the first conflict.
    fn report_ambiguity(
        &self,
        _decision: usize,
        _start_index: usize,
        _stop_index: usize,
        _exact: bool,
        _ambig_alts: &AltSet,
        _configs: &AtnConfigSet,
    ) {
    }

    /// SLL found a conflict; prediction is retrying with full context
    fn report_attempting_full_context(
        &self,
        _decision: usize,
        _start_index: usize,
        _stop_index: usize,
        _conflicting_alts: &AltSet,
        _configs: &AtnConfigSet,
    ) {
    }

    /// Full context resolved a conflict SLL could not
    fn report_context_sensitivity(
        &self,
        _decision: usize,
        _start_index: usize,
        _stop_index: usize,
        _prediction: usize,
        _configs: &AtnConfigSet,
    ) {
    }
}

/// Fans every event out to a list of listeners, in order
#[derive(Clone, Default)]
pub struct ErrorListeners {
    listeners: Vec<Arc<dyn ErrorListener>>,
}

impl ErrorListeners {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Arc<dyn ErrorListener>) {
        self.listeners.push(listener);
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for ErrorListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

impl ErrorListener for ErrorListeners {
    fn syntax_error(
        &self,
        offending_symbol: Option<&Token>,
        line: usize,
        column: usize,
        message: &str,
        error: Option<&dyn Error>,
    ) {
        for listener in &self.listeners {
            listener.syntax_error(offending_symbol, line, column, message, error);
        }
    }

    fn report_ambiguity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        for listener in &self.listeners {
            listener.report_ambiguity(decision, start_index, stop_index, exact, ambig_alts, configs);
        }
    }

    fn report_attempting_full_context(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        conflicting_alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        for listener in &self.listeners {
            listener.report_attempting_full_context(
                decision,
                start_index,
                stop_index,
                conflicting_alts,
                configs,
            );
        }
    }

    fn report_context_sensitivity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        prediction: usize,
        configs: &AtnConfigSet,
    ) {
        for listener in &self.listeners {
            listener.report_context_sensitivity(decision, start_index, stop_index, prediction, configs);
        }
    }
}

/// Logs every event through `tracing`
///
/// Syntax errors go out at `warn`, prediction diagnostics at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorListener;

impl ErrorListener for TracingErrorListener {
    fn syntax_error(
        &self,
        offending_symbol: Option<&Token>,
        line: usize,
        column: usize,
        message: &str,
        _error: Option<&dyn Error>,
    ) {
        match offending_symbol {
            Some(token) => tracing::warn!(line, column, token = %token, "{message}"),
            None => tracing::warn!(line, column, "{message}"),
        }
    }

    fn report_ambiguity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
        _configs: &AtnConfigSet,
    ) {
        tracing::debug!(
            decision,
            start_index,
            stop_index,
            exact,
            alts = %ambig_alts,
            "ambiguity"
        );
    }

    fn report_attempting_full_context(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        conflicting_alts: &AltSet,
        _configs: &AtnConfigSet,
    ) {
        tracing::debug!(
            decision,
            start_index,
            stop_index,
            alts = %conflicting_alts,
            "attempting full context"
        );
    }

    fn report_context_sensitivity(
        &self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        prediction: usize,
        _configs: &AtnConfigSet,
    ) {
        tracing::debug!(decision, start_index, stop_index, prediction, "context sensitivity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counter {
        events: Mutex<Vec<&'static str>>,
    }

    impl ErrorListener for Counter {
        fn syntax_error(&self, _: Option<&Token>, _: usize, _: usize, _: &str, _: Option<&dyn Error>) {
            self.events.lock().unwrap().push("syntax");
        }

        fn report_ambiguity(&self, _: usize, _: usize, _: usize, _: bool, _: &AltSet, _: &AtnConfigSet) {
            self.events.lock().unwrap().push("ambiguity");
        }
    }

    #[test]
    fn test_proxy_forwards_to_every_listener() {
        let first = Arc::new(Counter::default());
        let second = Arc::new(Counter::default());
        let mut listeners = ErrorListeners::new();
        listeners.add(first.clone());
        listeners.add(Arc::new(TracingErrorListener));
        listeners.add(second.clone());

        listeners.syntax_error(None, 1, 0, "bad", None);
        let alts: AltSet = [1, 2].into_iter().collect();
        listeners.report_ambiguity(0, 0, 1, true, &alts, &AtnConfigSet::new(true));
        listeners.report_context_sensitivity(0, 0, 1, 2, &AtnConfigSet::new(true));

        assert_eq!(*first.events.lock().unwrap(), ["syntax", "ambiguity"]);
        assert_eq!(*second.events.lock().unwrap(), ["syntax", "ambiguity"]);
    }
}
