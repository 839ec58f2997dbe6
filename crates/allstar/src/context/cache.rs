use hashbrown::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ContextRef, PredictionContext};

/// Memo of `merge(a, b)` results for one prediction
///
/// Lookups try both argument orders since merge is commutative.
#[derive(Debug, Default)]
pub struct MergeCache {
    merged: HashMap<(ContextRef, ContextRef), ContextRef>,
}

impl MergeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, a: &ContextRef, b: &ContextRef) -> Option<ContextRef> {
        self.merged
            .get(&(Arc::clone(a), Arc::clone(b)))
            .or_else(|| self.merged.get(&(Arc::clone(b), Arc::clone(a))))
            .cloned()
    }

    pub fn insert(&mut self, a: &ContextRef, b: &ContextRef, merged: &ContextRef) {
        self.merged
            .insert((Arc::clone(a), Arc::clone(b)), Arc::clone(merged));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    pub fn clear(&mut self) {
        self.merged.clear();
    }
}

/// Interning table for prediction contexts
///
/// Shared by every simulator built over the same grammar. Structurally equal
/// contexts added here come back as one handle, so DFA states built by
/// different parses point at the same nodes.
#[derive(Debug, Default)]
pub struct PredictionContextCache {
    contexts: Mutex<HashSet<ContextRef>>,
}

impl PredictionContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<ContextRef>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Canonical handle for `context`
    pub fn add(&self, context: &ContextRef) -> ContextRef {
        if context.is_empty() {
            return PredictionContext::empty();
        }
        Self::intern(&mut self.lock(), context)
    }

    fn intern(contexts: &mut HashSet<ContextRef>, context: &ContextRef) -> ContextRef {
        if let Some(existing) = contexts.get(context) {
            return Arc::clone(existing);
        }
        contexts.insert(Arc::clone(context));
        Arc::clone(context)
    }

    /// Canonical one-frame context
    ///
    /// Repeated calls with structurally equal arguments return the same
    /// handle.
    pub fn singleton(&self, parent: Option<ContextRef>, return_state: usize) -> ContextRef {
        self.add(&PredictionContext::singleton(parent, return_state))
    }

    /// Rebuilds `context` so every node in it is the canonical one
    ///
    /// Nodes are visited children-first with an explicit stack. A node whose
    /// parents were all canonical already is interned as is; otherwise a copy
    /// pointing at the canonical parents is interned.
    pub fn get_cached_context(&self, context: &ContextRef) -> ContextRef {
        if context.is_empty() {
            return PredictionContext::empty();
        }

        let mut contexts = self.lock();
        let mut visited: HashMap<usize, ContextRef> = HashMap::new();
        let mut stack: Vec<(ContextRef, bool)> = vec![(Arc::clone(context), false)];

        while let Some((node, expanded)) = stack.pop() {
            let key = Arc::as_ptr(&node) as usize;
            if visited.contains_key(&key) {
                continue;
            }
            if node.is_empty() {
                visited.insert(key, PredictionContext::empty());
                continue;
            }
            if let Some(existing) = contexts.get(&node) {
                visited.insert(key, Arc::clone(existing));
                continue;
            }
            if !expanded {
                stack.push((Arc::clone(&node), true));
                for (parent, _) in node.entries() {
                    if let Some(parent) = parent {
                        if !visited.contains_key(&(Arc::as_ptr(parent) as usize)) {
                            stack.push((Arc::clone(parent), false));
                        }
                    }
                }
                continue;
            }

            let mut changed = false;
            let parents: smallvec::SmallVec<[Option<ContextRef>; 2]> = node
                .entries()
                .map(|(parent, _)| {
                    parent.map(|parent| {
                        let canonical = visited
                            .get(&(Arc::as_ptr(parent) as usize))
                            .cloned()
                            .unwrap_or_else(|| Arc::clone(parent));
                        changed |= !Arc::ptr_eq(&canonical, parent);
                        canonical
                    })
                })
                .collect();

            let updated = if changed {
                let return_states = node.entries().map(|(_, rs)| rs).collect();
                PredictionContext::array(parents, return_states)
            } else {
                node
            };
            let canonical = Self::intern(&mut contexts, &updated);
            visited.insert(key, canonical);
        }

        visited
            .get(&(Arc::as_ptr(context) as usize))
            .cloned()
            .unwrap_or_else(|| Arc::clone(context))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{merge, EMPTY_RETURN_STATE};

    #[test]
    fn test_singleton_is_canonical() {
        let cache = PredictionContextCache::new();
        let first = cache.singleton(Some(PredictionContext::empty()), 7);
        let second = cache.singleton(Some(PredictionContext::empty()), 7);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.singleton(None, EMPTY_RETURN_STATE).is_empty());
    }

    #[test]
    fn test_cached_context_shares_parents() {
        let cache = PredictionContextCache::new();
        let empty = PredictionContext::empty();
        let parent = cache.singleton(Some(Arc::clone(&empty)), 1);

        // Built independently of the cache
        let loose_parent = PredictionContext::singleton(Some(Arc::clone(&empty)), 1);
        let a = PredictionContext::singleton(Some(Arc::clone(&loose_parent)), 2);
        let b = PredictionContext::singleton(Some(loose_parent), 3);
        let merged = merge(&a, &b, true, None);

        let cached = cache.get_cached_context(&merged);
        assert_eq!(cached, merged);
        assert!(Arc::ptr_eq(cached.parent(0).unwrap(), &parent));
        assert!(Arc::ptr_eq(cached.parent(1).unwrap(), &parent));
        assert!(Arc::ptr_eq(&cache.get_cached_context(&merged), &cached));
    }
}
