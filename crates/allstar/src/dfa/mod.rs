//! # DFA Cache
//!
//! Every decision (parser) or mode (lexer) owns a [`Dfa`] that caches what
//! ATN simulation has already worked out. A DFA state is identified by its
//! configuration set; edges are labelled with input symbols and added lazily
//! as new input is seen. Nothing is ever removed except by an explicit reset.
//!
//! States live in an arena addressed by [`StateId`]. The immutable part of a
//! state is shared as `Arc<DfaState>` so simulators can keep using it after
//! releasing the DFA lock; only the edge tables change after insertion.

mod cache;
mod display;

pub use cache::{DfaCache, DfaCacheStats};
pub use display::{DfaDisplay, Vocabulary};

use ahash::AHasher;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::config::AtnConfigSet;
use crate::lexer::LexerActionExecutor;
use crate::semantic::SemanticContext;

/// Position of a state in its DFA's arena; `u32::MAX` is the error target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

impl StateId {
    /// Target of an edge known to lead nowhere
    pub const ERROR: Self = Self(u32::MAX);

    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 == u32::MAX
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Guard and the alternative it selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredPrediction {
    pub pred: SemanticContext,
    pub alt: usize,
}

/// One cached step of prediction
#[derive(Debug)]
pub struct DfaState {
    pub state_number: StateId,
    pub configs: AtnConfigSet,
    pub is_accept_state: bool,
    /// Predicted alternative (parser) or matched rule index (lexer)
    pub prediction: Option<usize>,
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    /// SLL found a conflict here; LL must take over
    pub requires_full_context: bool,
    /// Guards to evaluate in order when the prediction depends on predicates
    pub predicates: Option<Vec<PredPrediction>>,
}

impl DfaState {
    #[must_use]
    pub fn new(configs: AtnConfigSet) -> Self {
        Self {
            state_number: StateId::ERROR,
            configs,
            is_accept_state: false,
            prediction: None,
            lexer_action_executor: None,
            requires_full_context: false,
            predicates: None,
        }
    }
}

fn configs_hash(configs: &AtnConfigSet) -> u64 {
    let mut hasher = AHasher::default();
    configs.hash(&mut hasher);
    hasher.finish()
}

/// Lazily built automaton for one decision or lexer mode
#[derive(Debug)]
pub struct Dfa {
    /// Decision number, or mode number for lexer DFAs
    pub decision: usize,
    /// ATN state the decision starts from
    pub atn_start_state: usize,
    states: Vec<Arc<DfaState>>,
    edges: Vec<HashMap<i32, StateId>>,
    index: HashMap<u64, SmallVec<[StateId; 1]>>,
    s0: Option<StateId>,
    precedence_dfa: bool,
    precedence_start_states: HashMap<i32, StateId>,
}

impl Dfa {
    #[must_use]
    pub fn new(decision: usize, atn_start_state: usize, precedence_dfa: bool) -> Self {
        Self {
            decision,
            atn_start_state,
            states: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            s0: None,
            precedence_dfa,
            precedence_start_states: HashMap::new(),
        }
    }

    /// True for the operator loop of a left-recursive rule, whose start
    /// state depends on the caller's precedence
    #[must_use]
    pub const fn is_precedence_dfa(&self) -> bool {
        self.precedence_dfa
    }

    #[must_use]
    pub const fn s0(&self) -> Option<StateId> {
        self.s0
    }

    pub fn set_s0(&mut self, state: StateId) {
        self.s0 = Some(state);
    }

    #[must_use]
    pub fn precedence_start_state(&self, precedence: i32) -> Option<StateId> {
        if !self.precedence_dfa || precedence < 0 {
            return None;
        }
        self.precedence_start_states.get(&precedence).copied()
    }

    pub fn set_precedence_start_state(&mut self, precedence: i32, state: StateId) {
        if self.precedence_dfa && precedence >= 0 {
            self.precedence_start_states.insert(precedence, state);
        }
    }

    /// `None` for [`StateId::ERROR`]
    #[must_use]
    pub fn state(&self, id: StateId) -> Option<&Arc<DfaState>> {
        self.states.get(id.index())
    }

    /// All states in creation order
    pub fn states(&self) -> impl Iterator<Item = &Arc<DfaState>> {
        self.states.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn edge(&self, from: StateId, symbol: i32) -> Option<StateId> {
        self.edges.get(from.index())?.get(&symbol).copied()
    }

    /// Outgoing edges of `from`, sorted by symbol
    #[must_use]
    pub fn edges_from(&self, from: StateId) -> Vec<(i32, StateId)> {
        let mut edges: Vec<_> = self
            .edges
            .get(from.index())
            .map(|edges| edges.iter().map(|(&s, &t)| (s, t)).collect())
            .unwrap_or_default();
        edges.sort_unstable_by_key(|&(symbol, _)| symbol);
        edges
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(HashMap::len).sum()
    }

    /// Idempotent: the first edge recorded for a symbol wins
    pub fn set_edge(&mut self, from: StateId, symbol: i32, to: StateId) {
        if let Some(edges) = self.edges.get_mut(from.index()) {
            edges.entry(symbol).or_insert(to);
        }
    }

    /// Existing state with an equal configuration set
    #[must_use]
    pub fn find(&self, configs: &AtnConfigSet) -> Option<StateId> {
        self.index
            .get(&configs_hash(configs))?
            .iter()
            .copied()
            .find(|id| self.states[id.index()].configs == *configs)
    }

    /// Register `proposed` unless an equal state exists
    ///
    /// `prepare` runs only for a genuinely new state, before its
    /// configuration set is frozen.
    pub fn add_state_with(
        &mut self,
        mut proposed: DfaState,
        prepare: impl FnOnce(&mut AtnConfigSet),
    ) -> Arc<DfaState> {
        if let Some(existing) = self.find(&proposed.configs) {
            return Arc::clone(&self.states[existing.index()]);
        }
        let hash = configs_hash(&proposed.configs);
        let id = StateId(self.states.len() as u32);
        prepare(&mut proposed.configs);
        proposed.configs.set_read_only(true);
        proposed.state_number = id;
        let state = Arc::new(proposed);
        self.states.push(Arc::clone(&state));
        self.edges.push(HashMap::new());
        self.index.entry(hash).or_default().push(id);
        tracing::trace!(decision = self.decision, state = id.0, "new DFA state");
        state
    }

    pub fn add_state(&mut self, proposed: DfaState) -> Arc<DfaState> {
        self.add_state_with(proposed, |_| {})
    }

    /// Drop every state and edge
    pub fn clear(&mut self) {
        self.states.clear();
        self.edges.clear();
        self.index.clear();
        self.s0 = None;
        self.precedence_start_states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AtnConfig;
    use crate::context::PredictionContext;

    fn configs(states: &[usize]) -> AtnConfigSet {
        let mut set = AtnConfigSet::new(false);
        for &state in states {
            set.add(AtnConfig::new(state, 1, PredictionContext::empty()), None);
        }
        set
    }

    #[test]
    fn test_equal_config_sets_share_a_state() {
        let mut dfa = Dfa::new(0, 0, false);
        let a = dfa.add_state(DfaState::new(configs(&[1, 2])));
        let b = dfa.add_state(DfaState::new(configs(&[1, 2])));
        let c = dfa.add_state(DfaState::new(configs(&[3])));
        assert_eq!(a.state_number, b.state_number);
        assert_ne!(a.state_number, c.state_number);
        assert_eq!(dfa.len(), 2);
        assert!(a.configs.is_read_only());
    }

    #[test]
    fn test_edges_are_monotonic() {
        let mut dfa = Dfa::new(0, 0, false);
        let a = dfa.add_state(DfaState::new(configs(&[1]))).state_number;
        let b = dfa.add_state(DfaState::new(configs(&[2]))).state_number;
        dfa.set_edge(a, 5, b);
        dfa.set_edge(a, 5, StateId::ERROR);
        dfa.set_edge(a, -1, StateId::ERROR);
        assert_eq!(dfa.edge(a, 5), Some(b));
        assert_eq!(dfa.edges_from(a), vec![(-1, StateId::ERROR), (5, b)]);
        assert_eq!(dfa.edge_count(), 2);
        assert!(dfa.state(StateId::ERROR).is_none());
    }

    #[test]
    fn test_precedence_start_states() {
        let mut dfa = Dfa::new(0, 0, true);
        let s = dfa.add_state(DfaState::new(configs(&[1]))).state_number;
        dfa.set_precedence_start_state(2, s);
        assert_eq!(dfa.precedence_start_state(2), Some(s));
        assert_eq!(dfa.precedence_start_state(3), None);
        assert_eq!(dfa.precedence_start_state(-1), None);
    }
}
