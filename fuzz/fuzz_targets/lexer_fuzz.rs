#![no_main]
use allstar::atn::AtnBuilder;
use allstar::dfa::DfaCache;
use allstar::interval::EOF;
use allstar::lexer::{Lexer, LexerAction};
use allstar::stream::{CodePointCharStream, TokenSource};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // ID : [a-z]+ ; NUM : [0-9]+ ('.' [0-9]+)? ; WS : ' '+ -> skip ;
    let mut b = AtnBuilder::lexer();
    let id = b.token_rule(1);
    let letter = b.range(id, 'a' as i32, 'z' as i32);
    let body = b.plus(id, vec![letter], true);
    b.set_rule_body(id, body);
    let num = b.token_rule(2);
    let digit = b.range(num, '0' as i32, '9' as i32);
    let whole = b.plus(num, vec![digit], true);
    let dot = b.atom(num, '.' as i32);
    let digit = b.range(num, '0' as i32, '9' as i32);
    let fraction = b.plus(num, vec![digit], true);
    let tail = b.seq(num, [dot, fraction]);
    let tail = b.optional(num, tail, true);
    let body = b.seq(num, [whole, tail]);
    b.set_rule_body(num, body);
    let ws = b.token_rule(3);
    let blank = b.text(ws, " ");
    let blanks = b.plus(ws, vec![blank], true);
    let skip = b.lexer_action(ws, LexerAction::Skip);
    let body = b.seq(ws, [blanks, skip]);
    b.set_rule_body(ws, body);
    b.mode(&[id, num, ws]);
    let Ok(atn) = b.build() else {
        return;
    };
    let atn = Arc::new(atn);

    let cache = Arc::new(DfaCache::new(&atn));
    let Ok(mut lexer) = Lexer::new(atn, cache, CodePointCharStream::new(input)) else {
        return;
    };
    // Recovery is on, so every input must tokenize to a final EOF
    let tokens = lexer.tokenize().expect("recovering lexer never fails");
    assert_eq!(tokens.last().map(|t| t.token_type), Some(EOF));
    for pair in tokens.windows(2) {
        assert!(pair[0].end <= pair[1].start);
    }
});
