use std::sync::Arc;

/// Frame of the parser's real invocation stack
///
/// Prediction only needs the chain of invoking states, so this carries no
/// tree data. Frames are immutable and shared between children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleContext {
    pub parent: Option<Arc<RuleContext>>,
    /// State whose rule transition created this frame, `None` for the root
    pub invoking_state: Option<usize>,
    pub rule_index: usize,
}

impl RuleContext {
    /// Outermost frame of a parse
    #[must_use]
    pub fn root(rule_index: usize) -> Arc<Self> {
        Arc::new(Self {
            parent: None,
            invoking_state: None,
            rule_index,
        })
    }

    /// Frame for `rule_index` invoked from `invoking_state` inside `parent`
    #[must_use]
    pub fn child(parent: &Arc<Self>, invoking_state: usize, rule_index: usize) -> Arc<Self> {
        Arc::new(Self {
            parent: Some(Arc::clone(parent)),
            invoking_state: Some(invoking_state),
            rule_index,
        })
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Number of frames from here to the root, inclusive
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut current = self.parent.as_deref();
        while let Some(frame) = current {
            depth += 1;
            current = frame.parent.as_deref();
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_counts_frames() {
        let root = RuleContext::root(0);
        let child = RuleContext::child(&root, 4, 1);
        let grandchild = RuleContext::child(&child, 9, 2);
        assert_eq!(root.depth(), 1);
        assert_eq!(grandchild.depth(), 3);
        assert!(root.is_root());
        assert!(!grandchild.is_root());
    }
}
