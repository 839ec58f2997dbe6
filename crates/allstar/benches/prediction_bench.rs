use allstar::atn::{Atn, AtnBuilder};
use allstar::context::PredictionContextCache;
use allstar::dfa::DfaCache;
use allstar::interpreter::{NullEventHandler, ParserInterpreter};
use allstar::lexer::{Lexer, LexerAction};
use allstar::stream::{CodePointCharStream, CommonTokenStream, TokenSource};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

const NUM: i32 = 1;
const PLUS: i32 = 2;
const STAR: i32 = 3;
const WS: i32 = 4;

fn lexer_atn() -> Arc<Atn> {
    let mut b = AtnBuilder::lexer();
    let num = b.token_rule(NUM);
    let digit = b.range(num, '0' as i32, '9' as i32);
    let body = b.plus(num, vec![digit], true);
    b.set_rule_body(num, body);
    let plus = b.token_rule(PLUS);
    let body = b.atom(plus, '+' as i32);
    b.set_rule_body(plus, body);
    let star = b.token_rule(STAR);
    let body = b.atom(star, '*' as i32);
    b.set_rule_body(star, body);
    let ws = b.token_rule(WS);
    let space = b.atom(ws, ' ' as i32);
    let spaces = b.plus(ws, vec![space], true);
    let skip = b.lexer_action(ws, LexerAction::Skip);
    let body = b.seq(ws, [spaces, skip]);
    b.set_rule_body(ws, body);
    b.mode(&[num, plus, star, ws]);
    Arc::new(b.build().unwrap())
}

/// `s : e EOF ; e : e '*' e | e '+' e | NUM ;`
fn parser_atn() -> Arc<Atn> {
    let mut b = AtnBuilder::parser(4);
    let s = b.rule();
    let e = b.left_recursive_rule();
    let call = b.rule_ref(s, e, 0);
    let eof = b.atom(s, allstar::interval::EOF);
    let body = b.seq(s, [call, eof]);
    b.set_rule_body(s, body);

    let primary = b.atom(e, NUM);
    let p2 = b.precedence(e, 2);
    let star = b.atom(e, STAR);
    let rhs = b.rule_ref(e, e, 3);
    let mul = b.seq(e, [p2, star, rhs]);
    let p1 = b.precedence(e, 1);
    let plus = b.atom(e, PLUS);
    let rhs = b.rule_ref(e, e, 2);
    let add = b.seq(e, [p1, plus, rhs]);
    let ops = b.precedence_loop(e, vec![mul, add]);
    let body = b.seq(e, [primary, ops]);
    b.set_rule_body(e, body);
    Arc::new(b.build().unwrap())
}

fn expression(terms: usize) -> String {
    let mut text = String::from("1");
    for i in 0..terms {
        text.push_str(if i % 3 == 0 { " * " } else { " + " });
        text.push_str(&(i * 37 % 1000).to_string());
    }
    text
}

fn bench_lexing(c: &mut Criterion) {
    let atn = lexer_atn();
    let text = expression(500);
    let mut group = c.benchmark_group("lexing");

    group.bench_function("cold_dfa", |b| {
        b.iter(|| {
            let cache = Arc::new(DfaCache::new(&atn));
            let mut lexer = Lexer::new(Arc::clone(&atn), cache, CodePointCharStream::new(&text)).unwrap();
            black_box(lexer.tokenize().unwrap());
        });
    });

    let cache = Arc::new(DfaCache::new(&atn));
    group.bench_function("warm_dfa", |b| {
        b.iter(|| {
            let mut lexer =
                Lexer::new(Arc::clone(&atn), Arc::clone(&cache), CodePointCharStream::new(&text)).unwrap();
            black_box(lexer.tokenize().unwrap());
        });
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let lexer_atn = lexer_atn();
    let lexer_cache = Arc::new(DfaCache::new(&lexer_atn));
    let text = expression(200);
    let mut lexer = Lexer::new(lexer_atn, lexer_cache, CodePointCharStream::new(&text)).unwrap();
    let tokens = CommonTokenStream::from_source(&mut lexer).unwrap();

    let atn = parser_atn();
    let mut group = c.benchmark_group("prediction");

    group.bench_function("cold_dfa", |b| {
        b.iter(|| {
            let dfa = Arc::new(DfaCache::new(&atn));
            let contexts = Arc::new(PredictionContextCache::new());
            let mut parser = ParserInterpreter::new(Arc::clone(&atn), dfa, contexts).unwrap();
            let mut input = tokens.clone();
            black_box(parser.parse(&mut input, 0, &mut NullEventHandler)).unwrap();
        });
    });

    let dfa = Arc::new(DfaCache::new(&atn));
    let contexts = Arc::new(PredictionContextCache::new());
    let mut parser = ParserInterpreter::new(Arc::clone(&atn), dfa, contexts).unwrap();
    group.bench_function("warm_dfa", |b| {
        b.iter(|| {
            let mut input = tokens.clone();
            black_box(parser.parse(&mut input, 0, &mut NullEventHandler)).unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_lexing, bench_prediction);
criterion_main!(benches);
