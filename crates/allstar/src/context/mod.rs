//! # Prediction Contexts
//!
//! A prediction context is one frame of the call stack simulated during ATN
//! closure. Frames are immutable and shared through [`Arc`], forming a
//! graph-structured stack: many configurations point at the same parents, and
//! [`merge`] folds two stacks into one node whose parents are the union of
//! both.
//!
//! ## Shapes
//!
//! - **Empty**: bottom of the stack. Its only return state is
//!   [`EMPTY_RETURN_STATE`].
//! - **Singleton**: one parent and one return state.
//! - **Array**: several `(parent, return state)` pairs sorted by return state.
//!   An entry with return state [`EMPTY_RETURN_STATE`] has no parent and marks
//!   a path that reached the bottom of the stack.
//!
//! Equality is structural and the hash is computed once at construction, so
//! contexts can be keys in hash maps without walking the graph.

mod cache;
mod merge;
mod rule;

pub use cache::{MergeCache, PredictionContextCache};
pub use merge::merge;
pub use rule::RuleContext;

use ahash::AHasher;
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::atn::Atn;

/// Return state of the empty context
///
/// Larger than every real state number, so it always sorts last in an array.
pub const EMPTY_RETURN_STATE: usize = usize::MAX;

/// Shared handle to a context node
pub type ContextRef = Arc<PredictionContext>;

static EMPTY: Lazy<ContextRef> = Lazy::new(|| {
    Arc::new(PredictionContext {
        repr: Repr::Empty,
        hash: compute_hash(std::iter::empty(), &[]),
    })
});

#[derive(Debug)]
enum Repr {
    Empty,
    Singleton {
        parent: Option<ContextRef>,
        return_state: usize,
    },
    Array {
        parents: SmallVec<[Option<ContextRef>; 2]>,
        return_states: SmallVec<[usize; 2]>,
    },
}

/// Node of the graph-structured call stack
#[derive(Debug)]
pub struct PredictionContext {
    repr: Repr,
    hash: u64,
}

fn compute_hash<'a>(
    parents: impl Iterator<Item = Option<&'a ContextRef>>,
    return_states: &[usize],
) -> u64 {
    let mut hasher = AHasher::default();
    for parent in parents {
        hasher.write_u64(parent.map_or(0, |p| p.hash));
    }
    for &return_state in return_states {
        hasher.write_usize(return_state);
    }
    hasher.write_usize(return_states.len());
    hasher.finish()
}

impl PredictionContext {
    /// The canonical empty context
    #[must_use]
    pub fn empty() -> ContextRef {
        Arc::clone(&EMPTY)
    }

    /// A one-frame context on top of `parent`
    ///
    /// Collapses to [`PredictionContext::empty`] for a missing parent with the
    /// empty return state. Use [`PredictionContextCache::singleton`] when the
    /// result must be the shared canonical node.
    #[must_use]
    pub fn singleton(parent: Option<ContextRef>, return_state: usize) -> ContextRef {
        if parent.is_none() && return_state == EMPTY_RETURN_STATE {
            return Self::empty();
        }
        let hash = compute_hash(std::iter::once(parent.as_ref()), &[return_state]);
        Arc::new(Self {
            repr: Repr::Singleton {
                parent,
                return_state,
            },
            hash,
        })
    }

    /// Builds an array context from pairs already sorted by return state
    pub(crate) fn array(
        parents: SmallVec<[Option<ContextRef>; 2]>,
        return_states: SmallVec<[usize; 2]>,
    ) -> ContextRef {
        debug_assert_eq!(parents.len(), return_states.len());
        debug_assert!(return_states.windows(2).all(|w| w[0] < w[1]));
        if return_states.len() == 1 {
            let parent = parents.into_iter().next().flatten();
            return Self::singleton(parent, return_states[0]);
        }
        let hash = compute_hash(parents.iter().map(Option::as_ref), &return_states);
        Arc::new(Self {
            repr: Repr::Array {
                parents,
                return_states,
            },
            hash,
        })
    }

    /// Builds the context for a parser invocation stack
    ///
    /// Each non-root frame contributes the follow state of the rule
    /// transition at its invoking state.
    #[must_use]
    pub fn from_rule_context(atn: &Atn, outer: Option<&Arc<RuleContext>>) -> ContextRef {
        let mut invoking_states = Vec::new();
        let mut current = outer;
        while let Some(frame) = current {
            let (Some(parent), Some(invoking_state)) = (frame.parent.as_ref(), frame.invoking_state)
            else {
                break;
            };
            invoking_states.push(invoking_state);
            current = Some(parent);
        }

        let mut context = Self::empty();
        for &invoking_state in invoking_states.iter().rev() {
            match atn.rule_follow_state(invoking_state) {
                Some(follow_state) => {
                    context = Self::singleton(Some(context), follow_state);
                }
                None => {
                    tracing::warn!(
                        invoking_state,
                        "invoking state has no rule transition, frame ignored"
                    );
                }
            }
        }
        context
    }

    /// Number of `(parent, return state)` pairs
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Empty | Repr::Singleton { .. } => 1,
            Repr::Array { return_states, .. } => return_states.len(),
        }
    }

    #[must_use]
    pub fn parent(&self, index: usize) -> Option<&ContextRef> {
        match &self.repr {
            Repr::Empty => None,
            Repr::Singleton { parent, .. } => {
                debug_assert_eq!(index, 0);
                parent.as_ref()
            }
            Repr::Array { parents, .. } => parents.get(index).and_then(Option::as_ref),
        }
    }

    #[must_use]
    pub fn return_state(&self, index: usize) -> usize {
        match &self.repr {
            Repr::Empty => EMPTY_RETURN_STATE,
            Repr::Singleton { return_state, .. } => *return_state,
            Repr::Array { return_states, .. } => {
                return_states.get(index).copied().unwrap_or(EMPTY_RETURN_STATE)
            }
        }
    }

    /// True only for the bottom-of-stack context
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Empty)
    }

    /// True when some path through this node reaches the bottom of the stack
    #[must_use]
    pub fn has_empty_path(&self) -> bool {
        self.return_state(self.len() - 1) == EMPTY_RETURN_STATE
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self.repr, Repr::Array { .. })
    }

    #[must_use]
    pub const fn hash_value(&self) -> u64 {
        self.hash
    }

    /// Iterate `(parent, return state)` pairs in return-state order
    pub fn entries(&self) -> impl Iterator<Item = (Option<&ContextRef>, usize)> + '_ {
        (0..self.len()).map(move |i| (self.parent(i), self.return_state(i)))
    }

    /// Count of distinct nodes reachable from this one, itself included
    #[must_use]
    pub fn node_count(self: &Arc<Self>) -> usize {
        let mut seen = hashbrown::HashSet::new();
        let mut stack = vec![Arc::clone(self)];
        while let Some(node) = stack.pop() {
            if !seen.insert(Arc::as_ptr(&node) as usize) {
                continue;
            }
            for (parent, _) in node.entries() {
                if let Some(parent) = parent {
                    stack.push(Arc::clone(parent));
                }
            }
        }
        seen.len()
    }
}

pub(crate) fn same_parent(a: Option<&ContextRef>, b: Option<&ContextRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for PredictionContext {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.hash != other.hash {
            return false;
        }
        match (&self.repr, &other.repr) {
            (Repr::Empty, Repr::Empty) => true,
            (
                Repr::Singleton {
                    parent: p1,
                    return_state: r1,
                },
                Repr::Singleton {
                    parent: p2,
                    return_state: r2,
                },
            ) => r1 == r2 && same_parent(p1.as_ref(), p2.as_ref()),
            (
                Repr::Array {
                    parents: p1,
                    return_states: r1,
                },
                Repr::Array {
                    parents: p2,
                    return_states: r2,
                },
            ) => {
                r1 == r2
                    && p1
                        .iter()
                        .zip(p2.iter())
                        .all(|(a, b)| same_parent(a.as_ref(), b.as_ref()))
            }
            _ => false,
        }
    }
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for PredictionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("[]");
        }
        f.write_str("[")?;
        for (i, (parent, return_state)) in self.entries().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if return_state == EMPTY_RETURN_STATE {
                f.write_str("$")?;
                continue;
            }
            write!(f, "{return_state}")?;
            if let Some(parent) = parent {
                if !parent.is_empty() {
                    write!(f, " {parent}")?;
                }
            }
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_collapses_to_empty() {
        let context = PredictionContext::singleton(None, EMPTY_RETURN_STATE);
        assert!(Arc::ptr_eq(&context, &PredictionContext::empty()));
    }

    #[test]
    fn test_structural_equality() {
        let a = PredictionContext::singleton(Some(PredictionContext::empty()), 5);
        let b = PredictionContext::singleton(Some(PredictionContext::empty()), 5);
        let c = PredictionContext::singleton(Some(PredictionContext::empty()), 6);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_path() {
        let empty = PredictionContext::empty();
        assert!(empty.has_empty_path());
        let frame = PredictionContext::singleton(Some(empty), 3);
        assert!(!frame.has_empty_path());
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.return_state(0), 3);
    }

    #[test]
    fn test_display() {
        let empty = PredictionContext::empty();
        let inner = PredictionContext::singleton(Some(empty), 3);
        let outer = PredictionContext::singleton(Some(inner), 7);
        assert_eq!(format!("{outer}"), "[7 [3]]");
    }
}
