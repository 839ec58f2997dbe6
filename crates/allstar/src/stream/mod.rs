//! # Input Streams
//!
//! The simulators read symbols through these traits instead of owning the
//! input, so the same lexer can run over any character source and the same
//! parser over any token source.
//!
//! ## Overview
//!
//! - [`IntStream`]: symbols by signed lookahead, with an index that can be
//!   saved and restored.
//! - [`CharStream`]: an `IntStream` of code points that can also return text.
//! - [`TokenStream`]: an `IntStream` of token types that can also return
//!   the tokens themselves.
//! - [`TokenSource`]: anything that produces tokens one at a time, such as
//!   the [`Lexer`](crate::lexer::Lexer).
//!
//! ## Usage
//!
//! ```rust
//! use allstar::stream::{CharStream, CodePointCharStream, IntStream};
//!
//! let mut input = CodePointCharStream::new("ab");
//! assert_eq!(input.la(1), 'a' as i32);
//! input.consume();
//! assert_eq!(input.la(-1), 'a' as i32);
//! assert_eq!(input.text(0, 1), "ab");
//! ```

mod chars;
mod tokens;

pub use chars::CodePointCharStream;
pub use tokens::CommonTokenStream;

use crate::error::LexerError;
use crate::interval::EOF;
use crate::lexer::Token;

/// Name reported when a stream has no better one
pub const UNKNOWN_SOURCE_NAME: &str = "<unknown>";

/// Stream of integer symbols
///
/// `la(1)` is the next symbol, `la(-1)` the previous one; both return
/// [`EOF`] past either end. `la(0)` is undefined and returns 0.
pub trait IntStream {
    /// Advance past the current symbol; a no-op at EOF
    fn consume(&mut self);

    /// Symbol at signed offset `i` from the current position
    fn la(&mut self, i: isize) -> i32;

    /// Pin the buffer so `seek` can return here; in-memory streams need not
    /// do anything
    fn mark(&mut self) -> isize {
        -1
    }

    fn release(&mut self, _marker: isize) {}

    /// Index of the next symbol
    fn index(&self) -> usize;

    fn seek(&mut self, index: usize);

    /// Total number of symbols
    fn size(&self) -> usize;

    fn source_name(&self) -> &str {
        UNKNOWN_SOURCE_NAME
    }
}

/// Stream of code points
pub trait CharStream: IntStream {
    /// Text of the inclusive index range `start..=stop`, clamped to the
    /// stream
    fn text(&self, start: usize, stop: usize) -> String;
}

/// Stream of tokens, filtered to one channel
pub trait TokenStream: IntStream {
    /// Token at signed offset `k` from the current position
    fn lt(&mut self, k: isize) -> Option<&Token>;

    /// Token by absolute index, whatever its channel
    fn get(&self, index: usize) -> Option<&Token>;

    /// Concatenated text of tokens `start..=stop`
    fn text(&self, start: usize, stop: usize) -> String;
}

/// Producer of tokens
pub trait TokenSource {
    /// Next token; an [`EOF`] token once the input is exhausted
    fn next_token(&mut self) -> Result<Token, LexerError>;

    fn line(&self) -> usize;

    fn column(&self) -> usize;

    fn source_name(&self) -> &str {
        UNKNOWN_SOURCE_NAME
    }

    /// Every token up to and including EOF
    fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.token_type == EOF;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }
}
