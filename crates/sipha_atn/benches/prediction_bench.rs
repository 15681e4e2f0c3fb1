use criterion::{Criterion, criterion_group, criterion_main};
use sipha_atn::recognizer::SilentErrorListener;
use sipha_atn::stream::{CodePointStream, SymbolStream};
use sipha_atn::testing::{AtnInterpreter, Element, GeneratorConfig, LexerGrammar, ParserGrammar, SentenceGenerator};
use sipha_atn::{DefaultRecognizer, Lexer, ParserAtnSimulator, SharedCache};
use std::hint::black_box;
use std::sync::Arc;

const ID: i32 = 1;
const INT: i32 = 2;
const PLUS: i32 = 3;
const STAR: i32 = 4;
const LPAREN: i32 = 5;
const RPAREN: i32 = 6;
const SEMI: i32 = 7;

fn t(token_type: i32) -> Element {
    Element::token(token_type)
}

/// prog : (expr ';')+ EOF ;  expr : expr '*' expr | expr '+' expr | ID | INT | '(' expr ')' ;
fn expressions() -> ParserGrammar {
    ParserGrammar::new()
        .rule(
            "prog",
            vec![vec![
                Element::plus(vec![vec![Element::rule("expr"), t(SEMI)]]),
                Element::eof(),
            ]],
        )
        .precedence_rule(
            "expr",
            vec![vec![t(ID)], vec![t(INT)], vec![t(LPAREN), Element::rule("expr"), t(RPAREN)]],
            vec![
                (2, vec![t(STAR), Element::rule_with_precedence("expr", 3)]),
                (1, vec![t(PLUS), Element::rule_with_precedence("expr", 2)]),
            ],
        )
}

fn lexer_cache() -> Arc<SharedCache> {
    let atn = LexerGrammar::new()
        .rule(
            "ID",
            ID,
            vec![vec![Element::plus(vec![vec![Element::range('a', 'z')]])]],
        )
        .rule(
            "INT",
            INT,
            vec![vec![Element::plus(vec![vec![Element::range('0', '9')]])]],
        )
        .rule("PLUS", PLUS, vec![vec![Element::text("+")]])
        .rule("STAR", STAR, vec![vec![Element::text("*")]])
        .rule("LPAREN", LPAREN, vec![vec![Element::text("(")]])
        .rule("RPAREN", RPAREN, vec![vec![Element::text(")")]])
        .rule("SEMI", SEMI, vec![vec![Element::text(";")]])
        .rule(
            "WS",
            8,
            vec![vec![Element::plus(vec![vec![Element::set(&[' ', '\n'])]]), Element::skip()]],
        )
        .build()
        .unwrap();
    Arc::new(SharedCache::new(Arc::new(atn)))
}

fn parse_all(simulator: &ParserAtnSimulator, sentences: &[Vec<i32>]) -> usize {
    let interpreter = AtnInterpreter::new(simulator);
    sentences
        .iter()
        .map(|sentence| {
            let mut input = SymbolStream::new(sentence.clone());
            interpreter
                .parse(&mut input, 0, &mut DefaultRecognizer, &mut SilentErrorListener)
                .map_or(0, |trace| trace.consumed)
        })
        .sum()
}

fn bench_prediction(c: &mut Criterion) {
    let grammar = expressions();
    let atn = Arc::new(grammar.build().unwrap());
    let config = GeneratorConfig {
        max_depth: 6,
        seed: Some(42),
        ..GeneratorConfig::default()
    };
    let sentences = SentenceGenerator::new(&grammar, config).generate_many(0, 50);

    c.bench_function("predict_cold_cache", |b| {
        b.iter(|| {
            let simulator = ParserAtnSimulator::new(Arc::new(SharedCache::new(Arc::clone(&atn))));
            black_box(parse_all(&simulator, black_box(&sentences)))
        });
    });

    let warm = ParserAtnSimulator::new(Arc::new(SharedCache::new(Arc::clone(&atn))));
    parse_all(&warm, &sentences);
    c.bench_function("predict_warm_cache", |b| {
        b.iter(|| black_box(parse_all(&warm, black_box(&sentences))));
    });
}

fn bench_lexing(c: &mut Criterion) {
    let source = "alpha + 12 * (beta + 3);\n".repeat(200);
    let cache = lexer_cache();

    c.bench_function("lex_cold_cache", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(lexer_cache(), CodePointStream::new(black_box(&source)));
            black_box(lexer.all_tokens().map(|tokens| tokens.len()).unwrap_or(0))
        });
    });

    c.bench_function("lex_warm_cache", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(Arc::clone(&cache), CodePointStream::new(black_box(&source)));
            black_box(lexer.all_tokens().map(|tokens| tokens.len()).unwrap_or(0))
        });
    });
}

criterion_group!(benches, bench_prediction, bench_lexing);
criterion_main!(benches);
