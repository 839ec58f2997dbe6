//! # Lexer
//!
//! Tokenization driven by a lexer ATN.
//!
//! ## Overview
//!
//! [`LexerAtnSimulator`] matches one token at a time with maximal munch,
//! caching what it learns in a per-mode DFA. [`Lexer`] drives it: it keeps
//! the mode stack, applies `skip`/`more`/`type`/`channel` commands, builds
//! tokens through a [`TokenFactory`] and recovers from unmatched input.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use allstar::atn::AtnBuilder;
//! use allstar::dfa::DfaCache;
//! use allstar::lexer::{Lexer, LexerAction};
//! use allstar::stream::{CodePointCharStream, TokenSource};
//!
//! // ID : [a-z]+ ; WS : ' '+ -> skip ;
//! let mut b = AtnBuilder::lexer();
//! let id = b.token_rule(1);
//! let letters = b.range(id, 'a' as i32, 'z' as i32);
//! let body = b.plus(id, vec![letters], true);
//! b.set_rule_body(id, body);
//! let ws = b.token_rule(2);
//! let space = b.atom(ws, ' ' as i32);
//! let spaces = b.plus(ws, vec![space], true);
//! let skip = b.lexer_action(ws, LexerAction::Skip);
//! let body = b.seq(ws, [spaces, skip]);
//! b.set_rule_body(ws, body);
//! b.mode(&[id, ws]);
//! let atn = Arc::new(b.build().unwrap());
//!
//! let cache = Arc::new(DfaCache::new(&atn));
//! let input = CodePointCharStream::new("ab cd");
//! let mut lexer = Lexer::new(atn, cache, input).unwrap();
//! let tokens = lexer.tokenize().unwrap();
//! let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
//! assert_eq!(texts, ["ab", "cd", "<EOF>"]);
//! ```

mod action;
mod simulator;
mod token;

pub use action::{LexerAction, LexerActionExecutor, LexerActionHost, LexerHost};
pub use simulator::LexerAtnSimulator;
pub use token::{CommonTokenFactory, Token, TokenFactory, TokenSpec, DEFAULT_CHANNEL, HIDDEN_CHANNEL};

use compact_str::CompactString;
use std::sync::Arc;

use crate::atn::Atn;
use crate::context::RuleContext;
use crate::dfa::DfaCache;
use crate::error::{AtnError, LexerError};
use crate::interval::{EOF, INVALID_TYPE};
use crate::listener::{ErrorListener, ErrorListeners};
use crate::recognizer::{NoopRecognizer, Recognizer};
use crate::stream::{CharStream, TokenSource};

/// Mode every lexer starts in
pub const DEFAULT_MODE: usize = 0;

const MORE: i32 = -2;
const SKIP: i32 = -3;

/// Lexer behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LexerConfig {
    /// Report unmatched input to the listeners and skip one character
    /// instead of returning the error
    pub recover_on_error: bool,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            recover_on_error: true,
        }
    }
}

impl LexerConfig {
    #[must_use]
    pub const fn with_recover_on_error(mut self, recover: bool) -> Self {
        self.recover_on_error = recover;
        self
    }
}

/// Token under construction
#[derive(Debug)]
struct TokenState {
    token_type: i32,
    channel: i32,
    mode: usize,
    mode_stack: Vec<usize>,
    text: Option<CompactString>,
}

impl Default for TokenState {
    fn default() -> Self {
        Self {
            token_type: INVALID_TYPE,
            channel: DEFAULT_CHANNEL,
            mode: DEFAULT_MODE,
            mode_stack: Vec::new(),
            text: None,
        }
    }
}

/// Lexer commands see the token state; predicates and custom actions go
/// to the user's recognizer
struct Host<'a, R> {
    state: &'a mut TokenState,
    recognizer: &'a mut R,
}

impl<R: Recognizer> Recognizer for Host<'_, R> {
    fn sempred(&mut self, ctx: Option<&Arc<RuleContext>>, rule: usize, pred: usize) -> bool {
        self.recognizer.sempred(ctx, rule, pred)
    }

    fn action(&mut self, ctx: Option<&Arc<RuleContext>>, rule: usize, action: Option<usize>) {
        self.recognizer.action(ctx, rule, action);
    }
}

impl<R> LexerActionHost for Host<'_, R> {
    fn set_channel(&mut self, channel: i32) {
        self.state.channel = channel;
    }

    fn set_type(&mut self, token_type: i32) {
        self.state.token_type = token_type;
    }

    fn set_mode(&mut self, mode: usize) {
        self.state.mode = mode;
    }

    fn push_mode(&mut self, mode: usize) {
        self.state.mode_stack.push(self.state.mode);
        self.state.mode = mode;
    }

    fn pop_mode(&mut self) {
        match self.state.mode_stack.pop() {
            Some(mode) => self.state.mode = mode,
            None => tracing::warn!(mode = self.state.mode, "popMode with an empty mode stack"),
        }
    }

    fn more(&mut self) {
        self.state.token_type = MORE;
    }

    fn skip(&mut self) {
        self.state.token_type = SKIP;
    }
}

/// Token source over a character stream
pub struct Lexer<I, R = NoopRecognizer> {
    input: I,
    recognizer: R,
    interpreter: LexerAtnSimulator,
    factory: Box<dyn TokenFactory>,
    listeners: ErrorListeners,
    config: LexerConfig,
    state: TokenState,
    hit_eof: bool,
    token_start_index: usize,
    token_start_line: usize,
    token_start_column: usize,
}

impl<I: CharStream> Lexer<I> {
    /// Lexer without predicates or custom actions
    pub fn new(atn: Arc<Atn>, cache: Arc<DfaCache>, input: I) -> Result<Self, AtnError> {
        Self::with_recognizer(atn, cache, input, NoopRecognizer)
    }
}

impl<I: CharStream, R: Recognizer> Lexer<I, R> {
    pub fn with_recognizer(
        atn: Arc<Atn>,
        cache: Arc<DfaCache>,
        input: I,
        recognizer: R,
    ) -> Result<Self, AtnError> {
        Ok(Self {
            input,
            recognizer,
            interpreter: LexerAtnSimulator::new(atn, cache)?,
            factory: Box::new(CommonTokenFactory),
            listeners: ErrorListeners::new(),
            config: LexerConfig::default(),
            state: TokenState::default(),
            hit_eof: false,
            token_start_index: 0,
            token_start_line: 1,
            token_start_column: 0,
        })
    }

    #[must_use]
    pub fn with_config(mut self, config: LexerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_token_factory(mut self, factory: impl TokenFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    pub fn add_error_listener(&mut self, listener: Arc<dyn ErrorListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_error_listeners(&mut self) {
        self.listeners.clear();
    }

    #[must_use]
    pub const fn interpreter(&self) -> &LexerAtnSimulator {
        &self.interpreter
    }

    #[must_use]
    pub const fn input(&self) -> &I {
        &self.input
    }

    #[must_use]
    pub fn recognizer(&mut self) -> &mut R {
        &mut self.recognizer
    }

    #[must_use]
    pub const fn mode(&self) -> usize {
        self.state.mode
    }

    pub fn set_mode(&mut self, mode: usize) {
        self.state.mode = mode;
    }

    /// Stack of modes saved by `pushMode`, innermost last
    #[must_use]
    pub fn mode_stack(&self) -> &[usize] {
        &self.state.mode_stack
    }

    /// Start over on the same input
    pub fn reset(&mut self) {
        self.input.seek(0);
        self.state = TokenState::default();
        self.hit_eof = false;
        self.interpreter.reset();
    }

    /// Override the text of the token being built
    pub fn set_text(&mut self, text: impl Into<CompactString>) {
        self.state.text = Some(text.into());
    }

    fn emit(&self) -> Token {
        let end = self.input.index();
        self.factory.create(
            &self.input,
            TokenSpec {
                token_type: self.state.token_type,
                channel: self.state.channel,
                start: self.token_start_index,
                end,
                line: self.token_start_line,
                column: self.token_start_column,
                text: self.state.text.clone(),
            },
        )
    }

    fn emit_eof(&self) -> Token {
        let index = self.input.index();
        self.factory.create(
            &self.input,
            TokenSpec {
                token_type: EOF,
                channel: DEFAULT_CHANNEL,
                start: index,
                end: index,
                line: self.interpreter.line(),
                column: self.interpreter.column(),
                text: None,
            },
        )
    }

    fn notify_listeners(&self, error: &LexerError) {
        let message = format!("{error}");
        self.listeners.syntax_error(
            None,
            self.token_start_line,
            self.token_start_column,
            &message,
            Some(error as &dyn std::error::Error),
        );
    }

    /// Skip the offending character
    fn recover(&mut self) {
        if self.input.la(1) != EOF {
            self.interpreter.consume(&mut self.input);
        }
    }

    /// Match one token, accumulating through `more`
    ///
    /// Returns `None` when the token was skipped.
    fn match_one(&mut self) -> Result<Option<Token>, LexerError> {
        self.state.channel = DEFAULT_CHANNEL;
        self.state.text = None;
        self.token_start_index = self.input.index();
        self.token_start_line = self.interpreter.line();
        self.token_start_column = self.interpreter.column();
        loop {
            self.state.token_type = INVALID_TYPE;
            let mode = self.state.mode;
            let mut host = Host {
                state: &mut self.state,
                recognizer: &mut self.recognizer,
            };
            let matched = match self.interpreter.match_token(&mut self.input, mode, &mut host) {
                Ok(token_type) => token_type,
                Err(error) if self.config.recover_on_error => {
                    self.notify_listeners(&error);
                    self.recover();
                    SKIP
                }
                Err(error) => return Err(error),
            };
            if self.input.la(1) == EOF {
                self.hit_eof = true;
            }
            if self.state.token_type == INVALID_TYPE {
                self.state.token_type = matched;
            }
            match self.state.token_type {
                SKIP => return Ok(None),
                MORE => continue,
                _ => return Ok(Some(self.emit())),
            }
        }
    }
}

impl<I: CharStream, R: Recognizer> TokenSource for Lexer<I, R> {
    fn next_token(&mut self) -> Result<Token, LexerError> {
        loop {
            if self.hit_eof {
                return Ok(self.emit_eof());
            }
            if let Some(token) = self.match_one()? {
                tracing::trace!(
                    token_type = token.token_type,
                    start = token.start,
                    end = token.end,
                    "lexer: token"
                );
                return Ok(token);
            }
        }
    }

    fn line(&self) -> usize {
        self.interpreter.line()
    }

    fn column(&self) -> usize {
        self.interpreter.column()
    }

    fn source_name(&self) -> &str {
        self.input.source_name()
    }
}
