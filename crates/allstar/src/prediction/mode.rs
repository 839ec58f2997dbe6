//! Conflict analysis over configuration sets
//!
//! These functions decide when SLL simulation can stop, when full-context
//! simulation has resolved a decision and when a conflict is a true
//! ambiguity.

use hashbrown::HashMap;

use crate::atn::Atn;
use crate::config::{AltSet, AtnConfigSet};
use crate::context::ContextRef;
use crate::semantic::SemanticContext;

/// Prediction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PredictionMode {
    /// SLL only: never falls back to full context. Fast; may report a
    /// syntax error on input that LL would accept.
    Sll,
    /// SLL first, then full-context LL on conflict
    #[default]
    Ll,
    /// Like `Ll`, but keeps simulating until a conflict is proven to be an
    /// exact ambiguity
    LlExactAmbigDetection,
}

/// Should SLL simulation stop at this set?
///
/// True when every configuration finished the decision rule, or when some
/// conflicting subset exists and no state is tied to a single alternative.
#[must_use]
pub fn has_sll_conflict_terminating_prediction(
    mode: PredictionMode,
    atn: &Atn,
    configs: &AtnConfigSet,
) -> bool {
    if all_configs_in_rule_stop_states(atn, configs) {
        return true;
    }

    // Pure SLL ignores predicates when looking for conflicts; the copy merges
    // with a concrete empty stack
    let stripped;
    let configs = if mode == PredictionMode::Sll && configs.has_semantic_context {
        let mut dup = AtnConfigSet::new(true);
        for config in configs {
            dup.add(
                config.with_semantic_context(config.state, SemanticContext::None),
                None,
            );
        }
        stripped = dup;
        &stripped
    } else {
        configs
    };

    let altsets = get_conflicting_alt_subsets(configs);
    has_conflicting_alt_set(&altsets) && !has_state_associated_with_one_alt(configs)
}

#[must_use]
pub fn has_config_in_rule_stop_state(atn: &Atn, configs: &AtnConfigSet) -> bool {
    configs.iter().any(|c| atn.states[c.state].is_rule_stop())
}

#[must_use]
pub fn all_configs_in_rule_stop_states(atn: &Atn, configs: &AtnConfigSet) -> bool {
    configs.iter().all(|c| atn.states[c.state].is_rule_stop())
}

/// Full-context stop test: true unless some `(state, context)` group is
/// already down to one alternative, in which case LL cannot be ambiguous yet
#[must_use]
pub fn resolves_to_just_one_viable_alt(altsets: &[AltSet]) -> Option<usize> {
    get_single_viable_alt(altsets)
}

#[must_use]
pub fn all_subsets_conflict(altsets: &[AltSet]) -> bool {
    !has_non_conflicting_alt_set(altsets)
}

#[must_use]
pub fn has_non_conflicting_alt_set(altsets: &[AltSet]) -> bool {
    altsets.iter().any(|alts| alts.len() == 1)
}

#[must_use]
pub fn has_conflicting_alt_set(altsets: &[AltSet]) -> bool {
    altsets.iter().any(|alts| alts.len() > 1)
}

#[must_use]
pub fn all_subsets_equal(altsets: &[AltSet]) -> bool {
    altsets.windows(2).all(|pair| pair[0] == pair[1])
}

/// The alternative when every subset agrees on exactly one
#[must_use]
pub fn get_unique_alt(altsets: &[AltSet]) -> Option<usize> {
    let all = get_alts(altsets);
    if all.len() == 1 {
        all.min()
    } else {
        None
    }
}

/// Union of all subsets
#[must_use]
pub fn get_alts(altsets: &[AltSet]) -> AltSet {
    let mut all = AltSet::new();
    for alts in altsets {
        all.union_with(alts);
    }
    all
}

/// Alternatives grouped by `(state, context)`
///
/// A group with more than one alternative is a conflict: the same state
/// under the same stack cannot tell its alternatives apart.
#[must_use]
pub fn get_conflicting_alt_subsets(configs: &AtnConfigSet) -> Vec<AltSet> {
    let mut groups: HashMap<(usize, ContextRef), AltSet> = HashMap::new();
    for config in configs {
        groups
            .entry((config.state, config.context.clone()))
            .or_default()
            .insert(config.alt);
    }
    groups.into_values().collect()
}

/// Alternatives reaching each ATN state
#[must_use]
pub fn get_state_to_alt_map(configs: &AtnConfigSet) -> HashMap<usize, AltSet> {
    let mut map: HashMap<usize, AltSet> = HashMap::new();
    for config in configs {
        map.entry(config.state).or_default().insert(config.alt);
    }
    map
}

#[must_use]
pub fn has_state_associated_with_one_alt(configs: &AtnConfigSet) -> bool {
    get_state_to_alt_map(configs)
        .values()
        .any(|alts| alts.len() == 1)
}

/// The shared minimum alternative when every subset has the same one
#[must_use]
pub fn get_single_viable_alt(altsets: &[AltSet]) -> Option<usize> {
    let mut viable = AltSet::new();
    for alts in altsets {
        if let Some(min) = alts.min() {
            viable.insert(min);
        }
        if viable.len() > 1 {
            return None;
        }
    }
    viable.min()
}

/// The alternative when every configuration agrees
#[must_use]
pub fn unique_alt(configs: &AtnConfigSet) -> Option<usize> {
    let mut alt = None;
    for config in configs {
        match alt {
            None => alt = Some(config.alt),
            Some(existing) if existing != config.alt => return None,
            Some(_) => {}
        }
    }
    alt
}

/// Union of every conflicting subset
#[must_use]
pub fn get_conflicting_alts(configs: &AtnConfigSet) -> AltSet {
    get_alts(&get_conflicting_alt_subsets(configs))
}
