use std::sync::{Mutex, MutexGuard, PoisonError};

use super::Dfa;
use crate::atn::{Atn, AtnType};

/// Size of a [`DfaCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DfaCacheStats {
    pub dfas: usize,
    pub states: usize,
    pub edges: usize,
}

impl DfaCacheStats {
    /// Mean number of cached states per DFA
    #[must_use]
    pub fn states_per_dfa(&self) -> f64 {
        if self.dfas == 0 {
            0.0
        } else {
            self.states as f64 / self.dfas as f64
        }
    }
}

/// One DFA per decision (parser) or mode (lexer)
///
/// Share it between recognizers built from the same ATN with `Arc`. Each DFA
/// sits behind its own mutex, held only while looking up or adding states
/// and edges; closure runs without any lock.
#[derive(Debug)]
pub struct DfaCache {
    dfas: Vec<Mutex<Dfa>>,
}

impl DfaCache {
    /// Empty DFAs for the decisions of a parser ATN, or the modes of a lexer
    /// ATN
    #[must_use]
    pub fn new(atn: &Atn) -> Self {
        let dfas = match atn.grammar_type {
            AtnType::Parser => atn
                .decision_to_state
                .iter()
                .enumerate()
                .map(|(decision, &state)| {
                    let precedence = atn.states[state].is_precedence_decision();
                    Mutex::new(Dfa::new(decision, state, precedence))
                })
                .collect(),
            AtnType::Lexer => atn
                .mode_to_start_state
                .iter()
                .enumerate()
                .map(|(mode, &state)| Mutex::new(Dfa::new(mode, state, false)))
                .collect(),
        };
        Self { dfas }
    }

    /// Lock the DFA of `decision`
    pub fn lock(&self, decision: usize) -> Option<MutexGuard<'_, Dfa>> {
        self.dfas
            .get(decision)
            .map(|dfa| dfa.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dfas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dfas.is_empty()
    }

    /// Forget everything learned so far
    pub fn reset(&self) {
        for dfa in &self.dfas {
            dfa.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
        tracing::debug!(dfas = self.dfas.len(), "DFA cache reset");
    }

    #[must_use]
    pub fn stats(&self) -> DfaCacheStats {
        let mut stats = DfaCacheStats {
            dfas: self.dfas.len(),
            ..DfaCacheStats::default()
        };
        for dfa in &self.dfas {
            let dfa = dfa.lock().unwrap_or_else(PoisonError::into_inner);
            stats.states += dfa.len();
            stats.edges += dfa.edge_count();
        }
        stats
    }
}
