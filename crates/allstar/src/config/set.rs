use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::{AltSet, AtnConfig};
use crate::context::{merge, MergeCache, PredictionContextCache};
use crate::semantic::SemanticContext;

type ConfigKey = (usize, usize, SemanticContext);

/// Insertion-ordered set of configurations
///
/// Parser sets treat configurations with the same `(state, alt, guard)` as
/// one and merge their contexts. Lexer sets (built with
/// [`AtnConfigSet::ordered`]) only drop exact duplicates, because lexer
/// configurations also differ by pending actions.
#[derive(Debug, Clone, Default)]
pub struct AtnConfigSet {
    configs: Vec<AtnConfig>,
    lookup: HashMap<ConfigKey, SmallVec<[usize; 1]>>,
    exact: bool,
    /// Built during full-context (LL) simulation
    pub full_ctx: bool,
    /// Alternative predicted when every configuration agrees
    pub unique_alt: Option<usize>,
    /// Alternatives in conflict when an SLL state requires full context
    pub conflicting_alts: Option<AltSet>,
    pub has_semantic_context: bool,
    pub dips_into_outer_context: bool,
    read_only: bool,
}

impl AtnConfigSet {
    #[must_use]
    pub fn new(full_ctx: bool) -> Self {
        Self {
            full_ctx,
            ..Self::default()
        }
    }

    /// Set that keeps every distinct configuration, for the lexer
    #[must_use]
    pub fn ordered() -> Self {
        Self {
            exact: true,
            ..Self::default()
        }
    }

    /// Same kind of set, empty
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            exact: self.exact,
            full_ctx: self.full_ctx,
            ..Self::default()
        }
    }

    /// Add `config`, merging its context into an existing configuration with
    /// the same state, alternative and guard
    ///
    /// Returns false when nothing was added or changed. A frozen set is never
    /// modified.
    pub fn add(&mut self, config: AtnConfig, merge_cache: Option<&mut MergeCache>) -> bool {
        if self.read_only {
            tracing::warn!(state = config.state, "attempt to modify a frozen configuration set");
            return false;
        }
        if !config.semantic_context.is_none() {
            self.has_semantic_context = true;
        }
        if config.reaches_into_outer_context > 0 {
            self.dips_into_outer_context = true;
        }

        let key = (config.state, config.alt, config.semantic_context.clone());
        let bucket = self.lookup.entry(key).or_default();

        if self.exact {
            if bucket.iter().any(|&i| self.configs[i] == config) {
                return false;
            }
        } else if let Some(&index) = bucket.first() {
            let existing = &mut self.configs[index];
            let root_is_wildcard = !self.full_ctx;
            let merged = merge(&existing.context, &config.context, root_is_wildcard, merge_cache);
            let mut changed = !Arc::ptr_eq(&existing.context, &merged);
            if config.reaches_into_outer_context > existing.reaches_into_outer_context {
                existing.reaches_into_outer_context = config.reaches_into_outer_context;
                changed = true;
            }
            if config.precedence_filter_suppressed && !existing.precedence_filter_suppressed {
                existing.precedence_filter_suppressed = true;
                changed = true;
            }
            existing.context = merged;
            return changed;
        }

        bucket.push(self.configs.len());
        self.configs.push(config);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    #[must_use]
    pub fn configs(&self) -> &[AtnConfig] {
        &self.configs
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&AtnConfig> {
        self.configs.get(index)
    }

    /// Every alternative represented
    #[must_use]
    pub fn alts(&self) -> AltSet {
        self.configs.iter().map(|c| c.alt).collect()
    }

    /// Every ATN state represented
    #[must_use]
    pub fn states(&self) -> HashSet<usize> {
        self.configs.iter().map(|c| c.state).collect()
    }

    /// Non-trivial guards, in configuration order
    #[must_use]
    pub fn predicates(&self) -> Vec<SemanticContext> {
        self.configs
            .iter()
            .filter(|c| !c.semantic_context.is_none())
            .map(|c| c.semantic_context.clone())
            .collect()
    }

    /// Replace every context with its canonical node from `cache`
    pub fn optimize_configs(&mut self, cache: &PredictionContextCache) {
        if self.read_only {
            return;
        }
        for config in &mut self.configs {
            config.context = cache.get_cached_context(&config.context);
        }
    }

    /// Freeze the set; it is attached to a DFA state from now on
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        if read_only {
            self.lookup = HashMap::new();
        }
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl<'a> IntoIterator for &'a AtnConfigSet {
    type Item = &'a AtnConfig;
    type IntoIter = std::slice::Iter<'a, AtnConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

impl PartialEq for AtnConfigSet {
    fn eq(&self, other: &Self) -> bool {
        self.full_ctx == other.full_ctx
            && self.unique_alt == other.unique_alt
            && self.conflicting_alts == other.conflicting_alts
            && self.has_semantic_context == other.has_semantic_context
            && self.dips_into_outer_context == other.dips_into_outer_context
            && self.configs == other.configs
    }
}

impl Eq for AtnConfigSet {}

impl Hash for AtnConfigSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.configs.hash(state);
    }
}

impl fmt::Display for AtnConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, config) in self.configs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{config}")?;
        }
        f.write_str("]")?;
        if self.has_semantic_context {
            f.write_str(",hasSemanticContext")?;
        }
        if let Some(alt) = self.unique_alt {
            write!(f, ",uniqueAlt={alt}")?;
        }
        if let Some(alts) = &self.conflicting_alts {
            write!(f, ",conflictingAlts={alts}")?;
        }
        if self.dips_into_outer_context {
            f.write_str(",dipsIntoOuterContext")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PredictionContext;

    fn ctx(return_state: usize) -> crate::context::ContextRef {
        PredictionContext::singleton(Some(PredictionContext::empty()), return_state)
    }

    #[test]
    fn test_same_key_merges_contexts() {
        let mut set = AtnConfigSet::new(false);
        assert!(set.add(AtnConfig::new(5, 1, ctx(10)), None));
        assert!(set.add(AtnConfig::new(5, 1, ctx(20)), None));
        assert!(set.add(AtnConfig::new(5, 2, ctx(10)), None));
        assert_eq!(set.len(), 2);
        let merged = &set.configs()[0].context;
        assert!(merged.is_array());
        assert_eq!(set.alts(), [1, 2].into_iter().collect::<AltSet>());
    }

    #[test]
    fn test_readding_subsumed_config_reports_no_change() {
        let mut set = AtnConfigSet::new(false);
        assert!(set.add(AtnConfig::new(5, 1, ctx(10)), None));
        assert!(!set.add(AtnConfig::new(5, 1, ctx(10)), None));
        assert!(set.add(AtnConfig::new(5, 1, ctx(20)), None));
        assert!(!set.add(AtnConfig::new(5, 1, ctx(20)), None));

        let mut deeper = AtnConfig::new(5, 1, ctx(10));
        deeper.reaches_into_outer_context = 2;
        assert!(set.add(deeper, None));
        assert_eq!(set.len(), 1);
        assert_eq!(set.configs()[0].reaches_into_outer_context, 2);
    }

    #[test]
    fn test_ordered_set_keeps_distinct_contexts() {
        let mut set = AtnConfigSet::ordered();
        set.add(AtnConfig::new(5, 1, ctx(10)), None);
        set.add(AtnConfig::new(5, 1, ctx(20)), None);
        assert!(!set.add(AtnConfig::new(5, 1, ctx(20)), None));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_flags_follow_added_configs() {
        let mut set = AtnConfigSet::new(true);
        let mut config = AtnConfig::new(1, 1, PredictionContext::empty());
        config.reaches_into_outer_context = 1;
        config.semantic_context = SemanticContext::Precedence { precedence: 1 };
        set.add(config, None);
        assert!(set.dips_into_outer_context);
        assert!(set.has_semantic_context);
        assert_eq!(set.predicates().len(), 1);
    }

    #[test]
    fn test_frozen_set_rejects_additions() {
        let mut set = AtnConfigSet::new(false);
        set.add(AtnConfig::new(1, 1, PredictionContext::empty()), None);
        set.set_read_only(true);
        assert!(!set.add(AtnConfig::new(2, 1, PredictionContext::empty()), None));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_equality_ignores_context_identity() {
        let mut a = AtnConfigSet::new(false);
        let mut b = AtnConfigSet::new(false);
        a.add(AtnConfig::new(3, 1, ctx(7)), None);
        b.add(AtnConfig::new(3, 1, ctx(7)), None);
        assert!(!Arc::ptr_eq(&a.configs()[0].context, &b.configs()[0].context));
        assert_eq!(a, b);
    }
}
