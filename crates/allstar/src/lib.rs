//! # Allstar
//!
//! Runtime for ATN-based recognizers: adaptive LL(*) prediction for parsers
//! and DFA-cached maximal-munch matching for lexers.
//!
//! ## Overview
//!
//! A grammar compiles to an augmented transition network ([`atn::Atn`]):
//! one small automaton per rule, linked by rule invocations. This crate
//! simulates that network.
//!
//! - **Prediction**: [`prediction::ParserAtnSimulator`] chooses an
//!   alternative at each parser decision. It tries cheap SLL simulation
//!   first and falls back to full-context LL only on conflicts.
//! - **Caching**: every decision (and every lexer mode) owns a lazily built
//!   DFA inside a shared [`dfa::DfaCache`], so steady-state prediction walks
//!   cached edges.
//! - **Lexing**: [`lexer::Lexer`] turns a character stream into tokens,
//!   running lexer commands such as `skip`, `more`, `pushMode`.
//! - **Interpretation**: [`interpreter::ParserInterpreter`] drives the
//!   parser ATN directly and reports what it matched as events.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use allstar::atn::AtnBuilder;
//! use allstar::context::PredictionContextCache;
//! use allstar::dfa::DfaCache;
//! use allstar::interpreter::{ParseEvent, ParserInterpreter};
//! use allstar::lexer::Lexer;
//! use allstar::stream::{CodePointCharStream, CommonTokenStream, IntStream};
//!
//! const NUM: i32 = 1;
//! const PLUS: i32 = 2;
//!
//! // NUM : [0-9]+ ; PLUS : '+' ;
//! let mut lb = AtnBuilder::lexer();
//! let num = lb.token_rule(NUM);
//! let digit = lb.range(num, '0' as i32, '9' as i32);
//! let digits = lb.plus(num, vec![digit], true);
//! lb.set_rule_body(num, digits);
//! let plus = lb.token_rule(PLUS);
//! let sign = lb.atom(plus, '+' as i32);
//! lb.set_rule_body(plus, sign);
//! lb.mode(&[num, plus]);
//! let lexer_atn = Arc::new(lb.build().unwrap());
//!
//! // sum : NUM (PLUS NUM)* ;
//! let mut pb = AtnBuilder::parser(2);
//! let sum = pb.rule();
//! let first = pb.atom(sum, NUM);
//! let op = pb.atom(sum, PLUS);
//! let operand = pb.atom(sum, NUM);
//! let tail = pb.seq(sum, [op, operand]);
//! let tails = pb.star(sum, vec![tail], true);
//! let body = pb.seq(sum, [first, tails]);
//! pb.set_rule_body(sum, body);
//! let parser_atn = Arc::new(pb.build().unwrap());
//!
//! let lexer_dfa = Arc::new(DfaCache::new(&lexer_atn));
//! let mut lexer = Lexer::new(lexer_atn, lexer_dfa, CodePointCharStream::new("1+22+3")).unwrap();
//! let mut tokens = CommonTokenStream::from_source(&mut lexer).unwrap();
//!
//! let parser_dfa = Arc::new(DfaCache::new(&parser_atn));
//! let contexts = Arc::new(PredictionContextCache::new());
//! let mut parser = ParserInterpreter::new(parser_atn, parser_dfa, contexts).unwrap();
//! let mut events: Vec<ParseEvent> = Vec::new();
//! parser.parse(&mut tokens, sum, &mut events).unwrap();
//!
//! let consumed = events
//!     .iter()
//!     .filter(|e| matches!(e, ParseEvent::ConsumeToken { .. }))
//!     .count();
//! assert_eq!(consumed, 5);
//! assert_eq!(tokens.la(1), allstar::interval::EOF);
//! ```
//!
//! ## Modules
//!
//! - [`atn`] - The network, its builder and LL(1) analysis
//! - [`context`] - Graph-structured prediction stacks and their merge
//! - [`config`] - Configurations and configuration sets
//! - [`prediction`] - Adaptive prediction and conflict analysis
//! - [`dfa`] - Per-decision DFA caches
//! - [`lexer`] - Lexer simulator, actions and driver
//! - [`interpreter`] - ATN-driven parser
//! - [`error`] - ATN, lexer and parse errors

pub mod atn;
pub mod config;
pub mod context;
pub mod dfa;
pub mod error;
pub mod interpreter;
pub mod interval;
pub mod lexer;
pub mod listener;
pub mod prediction;
pub mod recognizer;
pub mod semantic;
pub mod stream;

// Re-export commonly used types
pub use atn::{Atn, AtnBuilder, AtnType};
pub use context::{PredictionContext, PredictionContextCache, RuleContext};
pub use dfa::DfaCache;
pub use error::{AtnError, LexerError, ParseError, PredictionError};
pub use interpreter::{ParseEvent, ParseEventHandler, ParserInterpreter};
pub use interval::{IntervalSet, EOF, EPSILON};
pub use lexer::{Lexer, LexerConfig, Token};
pub use listener::{ErrorListener, TracingErrorListener};
pub use prediction::{ParserAtnSimulator, PredictionConfig, PredictionMode, PredictionStats};
pub use recognizer::{NoopRecognizer, Recognizer};
pub use stream::{CodePointCharStream, CommonTokenStream};
