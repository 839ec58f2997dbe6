#![no_main]
use allstar::atn::AtnBuilder;
use allstar::context::PredictionContextCache;
use allstar::dfa::DfaCache;
use allstar::interpreter::{NullEventHandler, ParserInterpreter};
use allstar::interval::EOF;
use allstar::lexer::Token;
use allstar::stream::CommonTokenStream;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

const A: i32 = 1;
const B: i32 = 2;
const C: i32 = 3;

fuzz_target!(|data: &[u8]| {
    // s : x* EOF ; x : A+ B | A+ C | B C? ;
    let mut b = AtnBuilder::parser(3);
    let s = b.rule();
    let x = b.rule();
    let call = b.rule_ref(s, x, 0);
    let calls = b.star(s, vec![call], true);
    let eof = b.atom(s, EOF);
    let body = b.seq(s, [calls, eof]);
    b.set_rule_body(s, body);

    let a = b.atom(x, A);
    let run = b.plus(x, vec![a], true);
    let end = b.atom(x, B);
    let first = b.seq(x, [run, end]);
    let a = b.atom(x, A);
    let run = b.plus(x, vec![a], true);
    let end = b.atom(x, C);
    let second = b.seq(x, [run, end]);
    let lead = b.atom(x, B);
    let c = b.atom(x, C);
    let tail = b.optional(x, c, true);
    let third = b.seq(x, [lead, tail]);
    let body = b.alt_block(x, vec![first, second, third]);
    b.set_rule_body(x, body);
    let Ok(atn) = b.build() else {
        return;
    };
    let atn = Arc::new(atn);

    let tokens = data
        .iter()
        .map(|byte| Token::new(i32::from(byte % 3) + 1, ""))
        .collect();
    let mut input = CommonTokenStream::new(tokens, 0);
    let dfa = Arc::new(DfaCache::new(&atn));
    let Ok(mut parser) = ParserInterpreter::new(atn, dfa, Arc::new(PredictionContextCache::new())) else {
        return;
    };
    // Syntax errors are fine; panics are not
    let _ = parser.parse(&mut input, s, &mut NullEventHandler);
});
