use compact_str::CompactString;
use std::fmt;

use crate::interval::EOF;
use crate::stream::CharStream;

/// Channel the parser reads by default
pub const DEFAULT_CHANNEL: i32 = 0;

/// Conventional channel for whitespace and comments
pub const HIDDEN_CHANNEL: i32 = 1;

/// Lexed symbol with its span and position
///
/// Positions are code point indexes into the character stream; `end` is
/// exclusive, so an EOF token has `start == end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub token_type: i32,
    pub channel: i32,
    pub start: usize,
    pub end: usize,
    /// 1-based line of the first character
    pub line: usize,
    /// 0-based column of the first character
    pub column: usize,
    /// Position in the token stream, assigned when buffered
    pub token_index: Option<usize>,
    pub text: CompactString,
}

impl Token {
    #[must_use]
    pub fn eof(position: usize, line: usize, column: usize) -> Self {
        Self {
            token_type: EOF,
            channel: DEFAULT_CHANNEL,
            start: position,
            end: position,
            line,
            column,
            token_index: None,
            text: CompactString::const_new("<EOF>"),
        }
    }

    /// Default-channel token with no source position
    #[must_use]
    pub fn new(token_type: i32, text: impl Into<CompactString>) -> Self {
        Self {
            token_type,
            channel: DEFAULT_CHANNEL,
            start: 0,
            end: 0,
            line: 1,
            column: 0,
            token_index: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.token_type == EOF
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.text.escape_debug();
        write!(
            f,
            "[@{},{}:{}='{}',<{}>",
            self.token_index.map_or(-1, |i| i as isize),
            self.start,
            self.end as isize - 1,
            text,
            self.token_type
        )?;
        if self.channel != DEFAULT_CHANNEL {
            write!(f, ",channel={}", self.channel)?;
        }
        write!(f, ",{}:{}]", self.line, self.column)
    }
}

/// What the lexer knows about a token when it emits one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpec {
    pub token_type: i32,
    pub channel: i32,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// Replacement text; `None` takes the matched input
    pub text: Option<CompactString>,
}

/// Builds the tokens a lexer emits
pub trait TokenFactory: Send + Sync {
    fn create(&self, input: &dyn CharStream, spec: TokenSpec) -> Token;
}

/// Copies token text out of the input
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonTokenFactory;

impl TokenFactory for CommonTokenFactory {
    fn create(&self, input: &dyn CharStream, spec: TokenSpec) -> Token {
        let text = match spec.text {
            Some(text) => text,
            None if spec.token_type == EOF => CompactString::const_new("<EOF>"),
            None if spec.end > spec.start => CompactString::from(input.text(spec.start, spec.end - 1)),
            None => CompactString::default(),
        };
        Token {
            token_type: spec.token_type,
            channel: spec.channel,
            start: spec.start,
            end: spec.end,
            line: spec.line,
            column: spec.column,
            token_index: None,
            text,
        }
    }
}
