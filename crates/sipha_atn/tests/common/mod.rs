//! Grammars and listeners shared by the integration tests.

#![allow(dead_code)]

use sipha_atn::config::AtnConfigSet;
use sipha_atn::misc::AltSet;
use sipha_atn::stream::SymbolStream;
use sipha_atn::testing::{AtnInterpreter, Element, ParseTrace, ParserGrammar};
use sipha_atn::{
    DefaultRecognizer, ErrorListener, ParserAtnSimulator, ParserSimulatorConfig, RecognitionError, SharedCache,
};
use std::sync::Arc;

pub const ID: i32 = 1;
pub const INT: i32 = 2;
pub const ASSIGN: i32 = 3;
pub const SEMI: i32 = 4;
pub const LPAREN: i32 = 5;
pub const RPAREN: i32 = 6;
pub const IF: i32 = 7;
pub const ELSE: i32 = 8;
pub const LBRACE: i32 = 9;
pub const RBRACE: i32 = 10;
pub const COMMA: i32 = 11;
pub const STAR: i32 = 12;
pub const PLUS: i32 = 13;

fn t(token_type: i32) -> Element {
    Element::token(token_type)
}

/// A small statement language:
///
/// ```text
/// prog  : stmt+ EOF ;
/// stmt  : ID '=' expr ';' | ID '(' args? ')' ';' | 'if' expr block ('else' block)? ;
/// block : '{' stmt* '}' ;
/// args  : expr (',' expr)* ;
/// expr  : expr '*' expr | expr '+' expr | ID | INT | '(' expr ')' ;
/// ```
pub fn statements() -> ParserGrammar {
    ParserGrammar::new()
        .rule(
            "prog",
            vec![vec![Element::plus(vec![vec![Element::rule("stmt")]]), Element::eof()]],
        )
        .rule(
            "stmt",
            vec![
                vec![t(ID), t(ASSIGN), Element::rule("expr"), t(SEMI)],
                vec![
                    t(ID),
                    t(LPAREN),
                    Element::optional(vec![vec![Element::rule("args")]]),
                    t(RPAREN),
                    t(SEMI),
                ],
                vec![
                    t(IF),
                    Element::rule("expr"),
                    Element::rule("block"),
                    Element::optional(vec![vec![t(ELSE), Element::rule("block")]]),
                ],
            ],
        )
        .rule(
            "block",
            vec![vec![t(LBRACE), Element::star(vec![vec![Element::rule("stmt")]]), t(RBRACE)]],
        )
        .rule(
            "args",
            vec![vec![
                Element::rule("expr"),
                Element::star(vec![vec![t(COMMA), Element::rule("expr")]]),
            ]],
        )
        .precedence_rule(
            "expr",
            vec![
                vec![t(ID)],
                vec![t(INT)],
                vec![t(LPAREN), Element::rule("expr"), t(RPAREN)],
            ],
            vec![
                (2, vec![t(STAR), Element::rule_with_precedence("expr", 3)]),
                (1, vec![t(PLUS), Element::rule_with_precedence("expr", 2)]),
            ],
        )
}

pub fn simulator(grammar: &ParserGrammar) -> ParserAtnSimulator {
    simulator_with(grammar, ParserSimulatorConfig::default())
}

/// Routes the crate's tracing output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn simulator_with(grammar: &ParserGrammar, config: ParserSimulatorConfig) -> ParserAtnSimulator {
    init_tracing();
    let atn = grammar.build().expect("fixture grammar builds");
    ParserAtnSimulator::with_config(Arc::new(SharedCache::new(Arc::new(atn))), config)
}

/// Parses `symbols` from rule 0.
pub fn parse(
    simulator: &ParserAtnSimulator,
    symbols: &[i32],
    listener: &mut dyn ErrorListener,
) -> Result<ParseTrace, RecognitionError> {
    let mut input = SymbolStream::new(symbols.to_vec());
    AtnInterpreter::new(simulator).parse(&mut input, 0, &mut DefaultRecognizer, listener)
}

/// Records every diagnostic event.
#[derive(Debug, Default)]
pub struct Recorder {
    pub syntax_errors: Vec<String>,
    pub ambiguities: Vec<Ambiguity>,
    pub full_context_attempts: Vec<(usize, usize, usize)>,
    pub context_sensitivities: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub decision: usize,
    pub start_index: usize,
    pub stop_index: usize,
    pub exact: bool,
    pub alts: Vec<usize>,
}

impl ErrorListener for Recorder {
    fn syntax_error(&mut self, _line: usize, _column: usize, message: &str, _error: Option<&RecognitionError>) {
        self.syntax_errors.push(message.to_owned());
    }

    fn report_ambiguity(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
        _configs: &AtnConfigSet,
    ) {
        self.ambiguities.push(Ambiguity {
            decision,
            start_index,
            stop_index,
            exact,
            alts: ambig_alts.iter().collect(),
        });
    }

    fn report_attempting_full_context(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        _conflicting_alts: &AltSet,
        _configs: &AtnConfigSet,
    ) {
        self.full_context_attempts.push((decision, start_index, stop_index));
    }

    fn report_context_sensitivity(
        &mut self,
        decision: usize,
        _start_index: usize,
        _stop_index: usize,
        prediction: usize,
        _configs: &AtnConfigSet,
    ) {
        self.context_sensitivities.push((decision, prediction));
    }
}
