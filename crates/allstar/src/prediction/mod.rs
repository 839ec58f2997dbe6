//! # Adaptive Prediction
//!
//! Choosing an alternative at a parser decision with arbitrary lookahead.
//!
//! [`ParserAtnSimulator`] is the entry point. It caches what it learns in a
//! shared [`DfaCache`](crate::dfa::DfaCache), so repeated decisions on
//! similar input are answered by walking DFA edges only. The conflict
//! analysis that decides when simulation may stop lives in [`mode`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use allstar::atn::AtnBuilder;
//! use allstar::context::PredictionContextCache;
//! use allstar::dfa::DfaCache;
//! use allstar::lexer::Token;
//! use allstar::prediction::ParserAtnSimulator;
//! use allstar::recognizer::NoopRecognizer;
//! use allstar::stream::CommonTokenStream;
//!
//! // s : A B | A C ;
//! const A: i32 = 1;
//! const B: i32 = 2;
//! const C: i32 = 3;
//! let mut b = AtnBuilder::parser(3);
//! let s = b.rule();
//! let (a1, b1) = (b.atom(s, A), b.atom(s, B));
//! let ab = b.seq(s, [a1, b1]);
//! let (a2, c2) = (b.atom(s, A), b.atom(s, C));
//! let ac = b.seq(s, [a2, c2]);
//! let body = b.alt_block(s, vec![ab, ac]);
//! b.set_rule_body(s, body);
//! let atn = Arc::new(b.build().unwrap());
//!
//! let dfa = Arc::new(DfaCache::new(&atn));
//! let contexts = Arc::new(PredictionContextCache::new());
//! let mut sim = ParserAtnSimulator::new(atn, dfa, contexts).unwrap();
//!
//! let tokens = vec![Token::new(A, "a"), Token::new(C, "c")];
//! let mut input = CommonTokenStream::new(tokens, 0);
//! let alt = sim.adaptive_predict(&mut input, 0, None, &mut NoopRecognizer).unwrap();
//! assert_eq!(alt, 2);
//! ```

mod config;
pub mod mode;
mod precedence;
mod simulator;
mod stats;

pub use config::PredictionConfig;
pub use mode::PredictionMode;
pub use precedence::apply_precedence_filter;
pub use simulator::ParserAtnSimulator;
pub use stats::PredictionStats;
