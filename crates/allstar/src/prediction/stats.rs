/// Statistics collected during prediction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionStats {
    /// Number of `adaptive_predict` calls (tokens matched, for the lexer)
    pub predictions: usize,
    /// DFA edges followed without ATN simulation
    pub dfa_hits: usize,
    /// Target states computed by ATN simulation
    pub atn_transitions: usize,
    /// SLL conflicts retried with full context
    pub full_context: usize,
    /// True ambiguities reported
    pub ambiguities: usize,
    /// Conflicts that full context resolved differently from SLL
    pub context_sensitivities: usize,
    /// Predictions that found no viable alternative
    pub no_viable_alts: usize,
}

impl PredictionStats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            predictions: 0,
            dfa_hits: 0,
            atn_transitions: 0,
            full_context: 0,
            ambiguities: 0,
            context_sensitivities: 0,
            no_viable_alts: 0,
        }
    }

    /// Fraction of steps answered from the DFA
    #[must_use]
    pub fn dfa_hit_ratio(&self) -> f64 {
        let total = self.dfa_hits + self.atn_transitions;
        if total == 0 {
            0.0
        } else {
            self.dfa_hits as f64 / total as f64
        }
    }

    /// Add counters from another run
    pub fn merge(&mut self, other: &Self) {
        self.predictions += other.predictions;
        self.dfa_hits += other.dfa_hits;
        self.atn_transitions += other.atn_transitions;
        self.full_context += other.full_context;
        self.ambiguities += other.ambiguities;
        self.context_sensitivities += other.context_sensitivities;
        self.no_viable_alts += other.no_viable_alts;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_and_ratio() {
        let mut a = PredictionStats {
            predictions: 2,
            dfa_hits: 3,
            atn_transitions: 1,
            ..PredictionStats::new()
        };
        let b = PredictionStats {
            predictions: 1,
            atn_transitions: 4,
            ambiguities: 1,
            ..PredictionStats::new()
        };
        a.merge(&b);
        assert_eq!(a.predictions, 3);
        assert_eq!(a.atn_transitions, 5);
        assert_eq!(a.ambiguities, 1);
        assert!((a.dfa_hit_ratio() - 3.0 / 8.0).abs() < f64::EPSILON);
        a.reset();
        assert_eq!(a, PredictionStats::default());
    }
}
