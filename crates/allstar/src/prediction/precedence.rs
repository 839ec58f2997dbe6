//! Start-state filtering for precedence decisions
//!
//! The operator loop of a left-recursive rule decides between "continue the
//! loop" (alternative 1) and "leave the rule" (alternative 2). Whenever both
//! reach the same ATN state under the same stack, leaving would only re-enter
//! the loop from the caller, so the alternative-2 configuration is dropped.
//! Configurations that returned through the rule's own outermost invocation
//! are exempt.

use hashbrown::HashMap;
use std::sync::Arc;

use crate::config::AtnConfigSet;
use crate::context::{ContextRef, MergeCache, RuleContext};
use crate::recognizer::Recognizer;

/// Filter the SLL start state of a precedence DFA
///
/// Precedence predicates on alternative 1 are evaluated against the
/// recognizer's current precedence; configurations whose predicate fails
/// are removed.
pub fn apply_precedence_filter(
    configs: &AtnConfigSet,
    recognizer: &mut dyn Recognizer,
    outer_context: Option<&Arc<RuleContext>>,
    mut merge_cache: Option<&mut MergeCache>,
) -> AtnConfigSet {
    let mut states_from_alt1: HashMap<usize, ContextRef> = HashMap::new();
    let mut filtered = AtnConfigSet::new(configs.full_ctx);

    for config in configs.iter().filter(|c| c.alt == 1) {
        let Some(updated) = config.semantic_context.eval_precedence(recognizer, outer_context) else {
            continue;
        };
        states_from_alt1.insert(config.state, Arc::clone(&config.context));
        let config = if updated == config.semantic_context {
            config.clone()
        } else {
            config.with_semantic_context(config.state, updated)
        };
        filtered.add(config, merge_cache.as_deref_mut());
    }

    for config in configs.iter().filter(|c| c.alt != 1) {
        if !config.is_precedence_filter_suppressed()
            && states_from_alt1
                .get(&config.state)
                .is_some_and(|context| *context == config.context)
        {
            continue;
        }
        filtered.add(config.clone(), merge_cache.as_deref_mut());
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AtnConfig;
    use crate::context::PredictionContext;
    use crate::semantic::SemanticContext;

    struct Level(i32);

    impl Recognizer for Level {
        fn precpred(&mut self, _: Option<&Arc<RuleContext>>, precedence: i32) -> bool {
            precedence >= self.0
        }
    }

    fn ctx(return_state: usize) -> ContextRef {
        PredictionContext::singleton(Some(PredictionContext::empty()), return_state)
    }

    fn config(state: usize, alt: usize, context: ContextRef) -> AtnConfig {
        AtnConfig::new(state, alt, context)
    }

    #[test]
    fn test_drops_exit_alternative_shadowed_by_loop() {
        let mut configs = AtnConfigSet::new(false);
        configs.add(config(10, 1, ctx(3)), None);
        configs.add(config(10, 2, ctx(3)), None);
        configs.add(config(11, 2, ctx(3)), None);
        configs.add(config(12, 1, ctx(5)), None);
        configs.add(config(12, 2, ctx(4)), None);

        let filtered = apply_precedence_filter(&configs, &mut Level(0), None, None);
        let kept: Vec<_> = filtered.iter().map(|c| (c.state, c.alt)).collect();
        assert_eq!(kept, [(10, 1), (12, 1), (11, 2), (12, 2)]);
    }

    #[test]
    fn test_suppressed_configs_survive() {
        let mut configs = AtnConfigSet::new(false);
        configs.add(config(10, 1, ctx(3)), None);
        let mut outer = config(10, 2, ctx(3));
        outer.set_precedence_filter_suppressed(true);
        configs.add(outer, None);

        let filtered = apply_precedence_filter(&configs, &mut Level(0), None, None);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_failed_precedence_removes_loop_and_keeps_exit() {
        let mut configs = AtnConfigSet::new(false);
        let mut looped = config(10, 1, ctx(3));
        looped.semantic_context = SemanticContext::Precedence { precedence: 2 };
        configs.add(looped, None);
        configs.add(config(10, 2, ctx(3)), None);

        let filtered = apply_precedence_filter(&configs, &mut Level(3), None, None);
        let kept: Vec<_> = filtered.iter().map(|c| c.alt).collect();
        assert_eq!(kept, [2]);

        let filtered = apply_precedence_filter(&configs, &mut Level(1), None, None);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.configs()[0].alt, 1);
        assert!(filtered.configs()[0].semantic_context.is_none());
    }
}
