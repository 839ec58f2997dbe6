use ahash::AHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::recognizer::Recognizer;
use crate::stream::CharStream;

/// Command attached to a lexer rule, run when the rule's token is accepted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum LexerAction {
    /// `-> channel(n)`
    Channel(i32),
    /// Embedded code, dispatched to [`Recognizer::action`]
    Custom {
        rule_index: usize,
        action_index: usize,
    },
    /// `-> mode(m)`
    Mode(usize),
    /// `-> more`: keep matching into the same token
    More,
    /// `-> popMode`
    PopMode,
    /// `-> pushMode(m)`
    PushMode(usize),
    /// `-> skip`: discard the token
    Skip,
    /// `-> type(t)`
    Type(i32),
    /// Position-dependent action pinned to `offset` characters past the
    /// token start
    Indexed {
        offset: usize,
        action: Box<LexerAction>,
    },
}

impl LexerAction {
    /// Must run with the input positioned where the action appeared
    #[must_use]
    pub const fn is_position_dependent(&self) -> bool {
        matches!(self, Self::Custom { .. } | Self::Indexed { .. })
    }

    pub fn execute(&self, host: &mut dyn LexerHost) {
        match self {
            Self::Channel(channel) => host.set_channel(*channel),
            Self::Custom {
                rule_index,
                action_index,
            } => host.action(None, *rule_index, Some(*action_index)),
            Self::Mode(mode) => host.set_mode(*mode),
            Self::More => host.more(),
            Self::PopMode => host.pop_mode(),
            Self::PushMode(mode) => host.push_mode(*mode),
            Self::Skip => host.skip(),
            Self::Type(token_type) => host.set_type(*token_type),
            Self::Indexed { action, .. } => action.execute(host),
        }
    }
}

impl fmt::Display for LexerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(channel) => write!(f, "channel({channel})"),
            Self::Custom {
                rule_index,
                action_index,
            } => write!(f, "custom({rule_index}, {action_index})"),
            Self::Mode(mode) => write!(f, "mode({mode})"),
            Self::More => f.write_str("more"),
            Self::PopMode => f.write_str("popMode"),
            Self::PushMode(mode) => write!(f, "pushMode({mode})"),
            Self::Skip => f.write_str("skip"),
            Self::Type(token_type) => write!(f, "type({token_type})"),
            Self::Indexed { offset, action } => write!(f, "{action}@{offset}"),
        }
    }
}

/// State changes lexer actions can make
pub trait LexerActionHost {
    fn set_channel(&mut self, channel: i32);
    fn set_type(&mut self, token_type: i32);
    fn set_mode(&mut self, mode: usize);
    fn push_mode(&mut self, mode: usize);
    fn pop_mode(&mut self);
    fn more(&mut self);
    fn skip(&mut self);
}

/// What the lexer simulator calls back into
pub trait LexerHost: Recognizer + LexerActionHost {}

impl<T: Recognizer + LexerActionHost + ?Sized> LexerHost for T {}

/// Actions collected along one lexer path, in order
///
/// Executors are immutable and shared between configurations; every change
/// builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerActionExecutor {
    actions: Arc<[LexerAction]>,
    hash: u64,
}

impl LexerActionExecutor {
    #[must_use]
    pub fn new(actions: Vec<LexerAction>) -> Self {
        let mut hasher = AHasher::default();
        actions.hash(&mut hasher);
        Self {
            actions: actions.into(),
            hash: hasher.finish(),
        }
    }

    /// `executor` followed by `action`
    #[must_use]
    pub fn append(executor: Option<&Arc<Self>>, action: LexerAction) -> Arc<Self> {
        let mut actions = executor.map_or_else(Vec::new, |e| e.actions.to_vec());
        actions.push(action);
        Arc::new(Self::new(actions))
    }

    #[must_use]
    pub fn actions(&self) -> &[LexerAction] {
        &self.actions
    }

    /// Pin position-dependent actions to `offset`, the distance from the
    /// token start to the character about to be matched
    ///
    /// Returns `self` unchanged when no action needs pinning.
    #[must_use]
    pub fn fix_offset_before_match(self: &Arc<Self>, offset: usize) -> Arc<Self> {
        if !self
            .actions
            .iter()
            .any(|a| a.is_position_dependent() && !matches!(a, LexerAction::Indexed { .. }))
        {
            return Arc::clone(self);
        }
        let actions = self
            .actions
            .iter()
            .map(|action| {
                if action.is_position_dependent() && !matches!(action, LexerAction::Indexed { .. }) {
                    LexerAction::Indexed {
                        offset,
                        action: Box::new(action.clone()),
                    }
                } else {
                    action.clone()
                }
            })
            .collect();
        Arc::new(Self::new(actions))
    }

    /// Run every action for a token spanning `start_index` to the current
    /// input position
    ///
    /// Indexed actions see the input at their recorded offset; the input is
    /// left at the token end afterwards.
    pub fn execute(&self, host: &mut dyn LexerHost, input: &mut dyn CharStream, start_index: usize) {
        let stop_index = input.index();
        let mut requires_seek = false;
        for action in self.actions.iter() {
            let action = match action {
                LexerAction::Indexed { offset, action } => {
                    let index = start_index + offset;
                    input.seek(index);
                    requires_seek = index != stop_index;
                    action.as_ref()
                }
                action if action.is_position_dependent() => {
                    input.seek(stop_index);
                    requires_seek = false;
                    action
                }
                action => action,
            };
            action.execute(host);
        }
        if requires_seek {
            input.seek(stop_index);
        }
    }
}

impl Hash for LexerActionExecutor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RuleContext;
    use crate::stream::{CodePointCharStream, IntStream};

    #[derive(Default)]
    struct Recording {
        log: Vec<String>,
    }

    impl Recognizer for Recording {
        fn action(&mut self, _: Option<&Arc<RuleContext>>, rule: usize, action: Option<usize>) {
            self.log.push(format!("custom {rule} {action:?}"));
        }
    }

    impl LexerActionHost for Recording {
        fn set_channel(&mut self, channel: i32) {
            self.log.push(format!("channel {channel}"));
        }
        fn set_type(&mut self, token_type: i32) {
            self.log.push(format!("type {token_type}"));
        }
        fn set_mode(&mut self, mode: usize) {
            self.log.push(format!("mode {mode}"));
        }
        fn push_mode(&mut self, mode: usize) {
            self.log.push(format!("push {mode}"));
        }
        fn pop_mode(&mut self) {
            self.log.push("pop".into());
        }
        fn more(&mut self) {
            self.log.push("more".into());
        }
        fn skip(&mut self) {
            self.log.push("skip".into());
        }
    }

    #[test]
    fn test_fix_offset_only_wraps_custom_actions() {
        let executor = LexerActionExecutor::append(None, LexerAction::Skip);
        assert!(Arc::ptr_eq(&executor, &executor.fix_offset_before_match(2)));

        let custom = LexerAction::Custom {
            rule_index: 0,
            action_index: 1,
        };
        let executor = LexerActionExecutor::append(Some(&executor), custom.clone());
        let fixed = executor.fix_offset_before_match(2);
        assert_eq!(fixed.actions()[0], LexerAction::Skip);
        assert_eq!(
            fixed.actions()[1],
            LexerAction::Indexed {
                offset: 2,
                action: Box::new(custom)
            }
        );
        assert!(Arc::ptr_eq(&fixed, &fixed.fix_offset_before_match(5)));
    }

    #[test]
    fn test_execute_runs_in_order_and_restores_input() {
        let executor = LexerActionExecutor::new(vec![
            LexerAction::Indexed {
                offset: 1,
                action: Box::new(LexerAction::Custom {
                    rule_index: 2,
                    action_index: 0,
                }),
            },
            LexerAction::Channel(1),
        ]);
        let mut input = CodePointCharStream::new("abcd");
        input.seek(3);
        let mut host = Recording::default();
        executor.execute(&mut host, &mut input, 0);
        assert_eq!(host.log, ["custom 2 Some(0)", "channel 1"]);
        assert_eq!(input.index(), 3);
    }
}
