use hashbrown::HashMap;
use smallvec::SmallVec;
use std::sync::Arc;

use super::{same_parent, ContextRef, MergeCache, PredictionContext, EMPTY_RETURN_STATE};

/// Union of two call stacks
///
/// With `root_is_wildcard` (SLL prediction) the empty context stands for
/// "any caller" and absorbs everything merged with it. Without it (full
/// context) the empty context is a concrete bottom that survives as an
/// [`EMPTY_RETURN_STATE`] entry.
///
/// Returns `a` or `b` itself whenever the union equals one of them, so
/// callers can detect "nothing changed" with [`Arc::ptr_eq`].
pub fn merge(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    if Arc::ptr_eq(a, b) || a == b {
        return Arc::clone(a);
    }

    if !a.is_array() && !b.is_array() {
        return merge_singletons(a, b, root_is_wildcard, cache);
    }

    if root_is_wildcard {
        if a.is_empty() {
            return Arc::clone(a);
        }
        if b.is_empty() {
            return Arc::clone(b);
        }
    }

    merge_arrays(a, b, root_is_wildcard, cache.as_deref_mut())
}

/// Merge two single-frame contexts (the empty context counts as one)
fn merge_singletons(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    if let Some(previous) = cache.as_deref().and_then(|cache| cache.get(a, b)) {
        return previous;
    }

    if let Some(root_merge) = merge_root(a, b, root_is_wildcard) {
        if let Some(cache) = cache.as_deref_mut() {
            cache.insert(a, b, &root_merge);
        }
        return root_merge;
    }

    let (a_parent, a_return) = (a.parent(0), a.return_state(0));
    let (b_parent, b_return) = (b.parent(0), b.return_state(0));

    let merged = if a_return == b_return {
        // Same frame reached through different callers: merge the callers
        // and keep a single frame on top.
        let parent = match (a_parent, b_parent) {
            (Some(pa), Some(pb)) => Some(merge(pa, pb, root_is_wildcard, cache.as_deref_mut())),
            (Some(p), None) | (None, Some(p)) => Some(Arc::clone(p)),
            (None, None) => None,
        };
        if same_handle(parent.as_ref(), a_parent) {
            return Arc::clone(a);
        }
        if same_handle(parent.as_ref(), b_parent) {
            return Arc::clone(b);
        }
        PredictionContext::singleton(parent, a_return)
    } else {
        let (first, second) = if a_return < b_return {
            ((a_parent, a_return), (b_parent, b_return))
        } else {
            ((b_parent, b_return), (a_parent, a_return))
        };
        let shared = same_parent(a_parent, b_parent) && a_parent.is_some();
        let second_parent = if shared { first.0 } else { second.0 };
        PredictionContext::array(
            SmallVec::from_iter([first.0.cloned(), second_parent.cloned()]),
            SmallVec::from_iter([first.1, second.1]),
        )
    };

    if let Some(cache) = cache {
        cache.insert(a, b, &merged);
    }
    merged
}

fn same_handle(a: Option<&ContextRef>, b: Option<&ContextRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Handles every combination involving the empty context
///
/// Returns `None` when neither side is empty.
fn merge_root(a: &ContextRef, b: &ContextRef, root_is_wildcard: bool) -> Option<ContextRef> {
    if root_is_wildcard {
        if a.is_empty() || b.is_empty() {
            return Some(PredictionContext::empty());
        }
        return None;
    }

    match (a.is_empty(), b.is_empty()) {
        (true, true) => Some(PredictionContext::empty()),
        (true, false) => Some(PredictionContext::array(
            SmallVec::from_iter([b.parent(0).cloned(), None]),
            SmallVec::from_iter([b.return_state(0), EMPTY_RETURN_STATE]),
        )),
        (false, true) => Some(PredictionContext::array(
            SmallVec::from_iter([a.parent(0).cloned(), None]),
            SmallVec::from_iter([a.return_state(0), EMPTY_RETURN_STATE]),
        )),
        (false, false) => None,
    }
}

/// Sorted merge of two entry lists
///
/// Entries with equal return states fold into one whose parent is the merge
/// of both parents.
fn merge_arrays(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    if let Some(previous) = cache.as_deref().and_then(|cache| cache.get(a, b)) {
        return previous;
    }

    let capacity = a.len() + b.len();
    let mut parents: SmallVec<[Option<ContextRef>; 2]> = SmallVec::with_capacity(capacity);
    let mut return_states: SmallVec<[usize; 2]> = SmallVec::with_capacity(capacity);

    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (a_parent, a_return) = (a.parent(i), a.return_state(i));
        let (b_parent, b_return) = (b.parent(j), b.return_state(j));
        if a_return == b_return {
            let both_dollars =
                a_return == EMPTY_RETURN_STATE && a_parent.is_none() && b_parent.is_none();
            let same = a_parent.is_some() && same_parent(a_parent, b_parent);
            if both_dollars || same {
                parents.push(a_parent.cloned());
            } else {
                let merged = match (a_parent, b_parent) {
                    (Some(pa), Some(pb)) => {
                        Some(merge(pa, pb, root_is_wildcard, cache.as_deref_mut()))
                    }
                    (Some(p), None) | (None, Some(p)) => Some(Arc::clone(p)),
                    (None, None) => None,
                };
                parents.push(merged);
            }
            return_states.push(a_return);
            i += 1;
            j += 1;
        } else if a_return < b_return {
            parents.push(a_parent.cloned());
            return_states.push(a_return);
            i += 1;
        } else {
            parents.push(b_parent.cloned());
            return_states.push(b_return);
            j += 1;
        }
    }
    for k in i..a.len() {
        parents.push(a.parent(k).cloned());
        return_states.push(a.return_state(k));
    }
    for k in j..b.len() {
        parents.push(b.parent(k).cloned());
        return_states.push(b.return_state(k));
    }

    if return_states.len() == 1 {
        let single = PredictionContext::singleton(parents.pop().flatten(), return_states[0]);
        if let Some(cache) = cache {
            cache.insert(a, b, &single);
        }
        return single;
    }

    combine_common_parents(&mut parents);
    let merged = PredictionContext::array(parents, return_states);

    let result = if *merged == **a {
        Arc::clone(a)
    } else if *merged == **b {
        Arc::clone(b)
    } else {
        merged
    };
    if let Some(cache) = cache {
        cache.insert(a, b, &result);
    }
    result
}

/// Makes structurally equal parents share one handle
fn combine_common_parents(parents: &mut [Option<ContextRef>]) {
    let mut unique: HashMap<ContextRef, ContextRef> = HashMap::with_capacity(parents.len());
    for parent in parents.iter_mut().flatten() {
        let canonical = unique
            .entry(Arc::clone(parent))
            .or_insert_with(|| Arc::clone(parent));
        *parent = Arc::clone(canonical);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(parent: &ContextRef, return_state: usize) -> ContextRef {
        PredictionContext::singleton(Some(Arc::clone(parent)), return_state)
    }

    #[test]
    fn test_same_return_state_merges_parents() {
        let empty = PredictionContext::empty();
        let pa = frame(&empty, 1);
        let pb = frame(&empty, 2);
        let a = frame(&pa, 10);
        let b = frame(&pb, 10);

        let merged = merge(&a, &b, true, None);
        assert!(!merged.is_array());
        assert_eq!(merged.return_state(0), 10);

        let parent = merged.parent(0).expect("merged parent");
        assert!(parent.is_array());
        assert_eq!(parent.return_state(0), 1);
        assert_eq!(parent.return_state(1), 2);
    }

    #[test]
    fn test_different_return_states_make_sorted_array() {
        let empty = PredictionContext::empty();
        let a = frame(&empty, 20);
        let b = frame(&empty, 10);
        let merged = merge(&a, &b, true, None);
        assert!(merged.is_array());
        assert_eq!(merged.entries().map(|(_, rs)| rs).collect::<Vec<_>>(), vec![10, 20]);
        assert!(Arc::ptr_eq(merged.parent(0).unwrap(), merged.parent(1).unwrap()));
    }

    #[test]
    fn test_wildcard_root_absorbs() {
        let empty = PredictionContext::empty();
        let a = frame(&empty, 4);
        let merged = merge(&a, &empty, true, None);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_full_context_root_keeps_empty_path() {
        let empty = PredictionContext::empty();
        let a = frame(&empty, 4);
        let merged = merge(&a, &empty, false, None);
        assert!(merged.is_array());
        assert!(merged.has_empty_path());
        assert_eq!(merged.return_state(0), 4);
        assert!(merged.parent(1).is_none());
    }

    #[test]
    fn test_merge_returns_existing_when_subsumed() {
        let empty = PredictionContext::empty();
        let a = merge(&frame(&empty, 1), &frame(&empty, 2), true, None);
        let b = frame(&empty, 2);
        let merged = merge(&a, &b, true, None);
        assert!(Arc::ptr_eq(&merged, &a));
    }

    #[test]
    fn test_cache_is_consulted_in_both_orders() {
        let empty = PredictionContext::empty();
        let a = frame(&empty, 1);
        let b = frame(&empty, 2);
        let mut cache = MergeCache::default();
        let first = merge(&a, &b, true, Some(&mut cache));
        let second = merge(&b, &a, true, Some(&mut cache));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
