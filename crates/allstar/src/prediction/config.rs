use super::PredictionMode;

/// Configuration for adaptive prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictionConfig {
    /// SLL only, SLL with LL fallback, or exact ambiguity detection
    pub mode: PredictionMode,

    /// Give up with `Cancelled` at the first SLL conflict instead of
    /// falling back to full context
    pub bail_on_conflict: bool,

    /// Canonicalize prediction contexts through a shared cache before
    /// storing DFA states
    pub optimize_contexts: bool,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            mode: PredictionMode::Ll,
            bail_on_conflict: false,
            optimize_contexts: true,
        }
    }
}

impl PredictionConfig {
    #[must_use]
    pub const fn with_mode(mut self, mode: PredictionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn with_bail_on_conflict(mut self, bail: bool) -> Self {
        self.bail_on_conflict = bail;
        self
    }

    #[must_use]
    pub const fn with_optimize_contexts(mut self, optimize: bool) -> Self {
        self.optimize_contexts = optimize;
        self
    }
}
