//! Tests for prediction contexts: canonicalization, merge shapes and the
//! size of merged stacks under deep recursion

use std::sync::Arc;

use allstar::context::{merge, MergeCache, PredictionContext, PredictionContextCache, EMPTY_RETURN_STATE};
use proptest::prelude::*;

/// Stack whose frames, innermost first, return to `path`
fn chain(path: &[usize]) -> Arc<PredictionContext> {
    path.iter()
        .rev()
        .fold(PredictionContext::empty(), |parent, &rs| {
            PredictionContext::singleton(Some(parent), rs)
        })
}

fn merged(paths: &[Vec<usize>], root_is_wildcard: bool) -> Arc<PredictionContext> {
    let mut cache = MergeCache::new();
    let mut contexts = paths.iter().map(|p| chain(p));
    let first = contexts.next().unwrap_or_else(PredictionContext::empty);
    contexts.fold(first, |acc, c| merge(&acc, &c, root_is_wildcard, Some(&mut cache)))
}

#[test]
fn test_singleton_is_canonical_through_cache() {
    let cache = PredictionContextCache::new();
    let parent = cache.singleton(Some(PredictionContext::empty()), 3);
    let a = cache.singleton(Some(Arc::clone(&parent)), 8);
    let b = cache.singleton(Some(chain(&[3])), 8);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_empty_return_without_parent_is_empty() {
    let empty = PredictionContext::singleton(None, EMPTY_RETURN_STATE);
    assert!(Arc::ptr_eq(&empty, &PredictionContext::empty()));
    assert!(empty.is_empty());
}

#[test]
fn test_independently_built_contexts_are_equal() {
    let a = chain(&[4, 9, 2]);
    let b = chain(&[4, 9, 2]);
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a, b);
    assert_eq!(a.hash_value(), b.hash_value());
}

#[test]
fn test_same_return_state_merges_parents_into_singleton() {
    let a = chain(&[5, 1]);
    let b = chain(&[5, 2]);
    let m = merge(&a, &b, false, None);
    assert!(!m.is_array());
    assert_eq!(m.len(), 1);
    assert_eq!(m.return_state(0), 5);
    let parent = m.parent(0).unwrap();
    assert!(parent.is_array());
    let returns: Vec<_> = parent.entries().map(|(_, rs)| rs).collect();
    assert_eq!(returns, [1, 2]);
}

#[test]
fn test_different_return_states_make_sorted_array() {
    let a = chain(&[9]);
    let b = chain(&[4]);
    let m = merge(&a, &b, false, None);
    assert!(m.is_array());
    let returns: Vec<_> = m.entries().map(|(_, rs)| rs).collect();
    assert_eq!(returns, [4, 9]);
}

#[test]
fn test_merging_subset_returns_existing_array() {
    let array = merge(&chain(&[4]), &chain(&[9]), false, None);
    assert!(array.is_array());
    let again = merge(&array, &chain(&[9]), false, None);
    assert!(Arc::ptr_eq(&again, &array));
    let reversed = merge(&chain(&[4]), &array, false, None);
    assert!(Arc::ptr_eq(&reversed, &array));
}

#[test]
fn test_wildcard_root_absorbs() {
    let a = chain(&[7, 7]);
    let m = merge(&a, &PredictionContext::empty(), true, None);
    assert!(m.is_empty());

    let full = merge(&a, &PredictionContext::empty(), false, None);
    assert!(full.has_empty_path());
    assert_eq!(full.len(), 2);
}

#[test]
fn test_merge_cache_reuses_results() {
    let mut cache = MergeCache::new();
    let a = chain(&[1, 2]);
    let b = chain(&[1, 3]);
    let first = merge(&a, &b, false, Some(&mut cache));
    let second = merge(&a, &b, false, Some(&mut cache));
    assert!(!cache.is_empty());
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_deep_recursion_stays_linear() {
    // Stacks of a rule that calls itself from the same site N times
    let cache = PredictionContextCache::new();
    let mut merge_cache = MergeCache::new();
    let mut depth_n = PredictionContext::empty();
    let mut acc = PredictionContext::empty();
    for n in 1..=500usize {
        depth_n = cache.singleton(Some(depth_n), 7);
        acc = merge(&acc, &depth_n, false, Some(&mut merge_cache));
        assert!(acc.node_count() <= 4 * n + 4, "depth {n}: {} nodes", acc.node_count());
    }
    assert_eq!(cache.len(), 500);
    let canonical = cache.get_cached_context(&acc);
    assert_eq!(canonical, acc);
    assert!(canonical.node_count() <= acc.node_count());
}

fn path() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..6, 0..4)
}

fn paths() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(path(), 1..4)
}

proptest! {
    #[test]
    fn prop_merge_is_commutative(a in paths(), b in paths(), wildcard in any::<bool>()) {
        let a = merged(&a, wildcard);
        let b = merged(&b, wildcard);
        prop_assert_eq!(merge(&a, &b, wildcard, None), merge(&b, &a, wildcard, None));
    }

    #[test]
    fn prop_merge_is_idempotent(a in paths(), wildcard in any::<bool>()) {
        let a = merged(&a, wildcard);
        prop_assert_eq!(merge(&a, &a, wildcard, None), a);
    }

    #[test]
    fn prop_canonical_form_is_equal(a in paths()) {
        let a = merged(&a, false);
        let cache = PredictionContextCache::new();
        let first = cache.get_cached_context(&a);
        let second = cache.get_cached_context(&a);
        prop_assert_eq!(&first, &a);
        prop_assert!(Arc::ptr_eq(&first, &second));
    }
}
