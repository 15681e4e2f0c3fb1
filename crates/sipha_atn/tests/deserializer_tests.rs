//! Loading serialized ATNs and running both simulators on them.

use proptest::prelude::*;
use sipha_atn::atn::{
    deserialize, deserialize_str, AtnDeserializationOptions, LexerAction, StateId, BASE_SERIALIZED_UUID,
    SERIALIZED_VERSION,
};
use sipha_atn::error::AtnError;
use sipha_atn::recognizer::SilentErrorListener;
use sipha_atn::stream::{CodePointStream, SymbolStream};
use sipha_atn::testing::{Element, ParserGrammar};
use sipha_atn::token::EOF;
use sipha_atn::{Atn, DefaultRecognizer, GrammarType, Lexer, ParserAtnSimulator, RecognitionError, SharedCache};
use std::sync::Arc;

/// Version verbatim, then the feature UUID and every value shifted by 2.
fn encode(values: &[i32]) -> Vec<u16> {
    let mut out = vec![SERIALIZED_VERSION];
    for i in 0..8 {
        out.push(((BASE_SERIALIZED_UUID >> (16 * i)) as u16).wrapping_add(2));
    }
    out.extend(values.iter().map(|&v| (v as u16).wrapping_add(2)));
    out
}

/// s : (A | B) EOF ;
fn choice_parser() -> Vec<i32> {
    vec![
        1, 2, // parser, max token type
        8, // states
        2, 0, // 0: rule start
        7, 0, // 1: rule stop
        3, 0, 5, // 2: block start, ends at 5
        1, 0, // 3
        1, 0, // 4
        8, 0, // 5: block end
        1, 0, // 6
        1, 0, // 7
        0, 0, // non-greedy, precedence
        1, 0, // rules
        0, // modes
        0, // sets
        8, // edges
        0, 2, 1, 0, 0, 0, //
        2, 3, 1, 0, 0, 0, //
        2, 4, 1, 0, 0, 0, //
        3, 5, 5, 1, 0, 0, //
        4, 5, 5, 2, 0, 0, //
        5, 6, 1, 0, 0, 0, //
        6, 7, 5, 0, 0, 1, //
        7, 1, 1, 0, 0, 0, //
        1, 2, // decisions
    ]
}

/// T : 'a' ;  S : ' ' -> skip ;
fn skip_lexer() -> Vec<i32> {
    vec![
        0, 2, // lexer, max token type
        8, // states
        6, 0xFFFF, // 0: tokens start
        2, 0, // 1
        7, 0, // 2
        1, 0, // 3
        2, 1, // 4
        7, 1, // 5
        1, 1, // 6
        1, 1, // 7
        0, 0, // non-greedy, precedence
        2, 1, 1, 4, 2, // rules with token types
        1, 0, // one mode
        0, // sets
        7, // edges
        0, 1, 1, 0, 0, 0, //
        0, 4, 1, 0, 0, 0, //
        1, 3, 1, 0, 0, 0, //
        3, 2, 5, 'a' as i32, 0, 0, //
        4, 6, 1, 0, 0, 0, //
        6, 7, 5, ' ' as i32, 0, 0, //
        7, 5, 6, 1, 0, 0, //
        1, 0, // decisions
        1, 6, 0, 0, // lexer actions: skip
    ]
}

fn load(values: &[i32]) -> Result<Atn, AtnError> {
    deserialize(&encode(values), &AtnDeserializationOptions::default())
}

fn predict(atn: Atn, symbols: Vec<i32>) -> Result<usize, RecognitionError> {
    let sim = ParserAtnSimulator::new(Arc::new(SharedCache::new(Arc::new(atn))));
    let mut input = SymbolStream::new(symbols);
    sim.adaptive_predict(&mut input, 0, &[], &mut DefaultRecognizer, &mut SilentErrorListener)
}

#[test]
fn test_loaded_parser_predicts_like_built_one() {
    let loaded = load(&choice_parser()).unwrap();
    assert_eq!(loaded.grammar_type(), GrammarType::Parser);
    assert_eq!(loaded.number_of_decisions(), 1);
    assert_eq!(loaded.decision_state(0), Some(StateId(2)));

    let built = || {
        ParserGrammar::new()
            .rule(
                "s",
                vec![vec![
                    Element::block(vec![vec![Element::token(1)], vec![Element::token(2)]]),
                    Element::eof(),
                ]],
            )
            .build()
            .unwrap()
    };
    for symbols in [vec![1, EOF], vec![2, EOF]] {
        let expected = predict(built(), symbols.clone()).unwrap();
        assert_eq!(predict(load(&choice_parser()).unwrap(), symbols).unwrap(), expected);
    }
    let err = predict(loaded, vec![3, EOF]).unwrap_err();
    assert!(matches!(err, RecognitionError::NoViableAlt { offending_symbol: 3, .. }));
}

#[test]
fn test_loaded_lexer_runs_actions() {
    let atn = load(&skip_lexer()).unwrap();
    assert_eq!(atn.grammar_type(), GrammarType::Lexer);
    assert_eq!(atn.mode_count(), 1);
    assert_eq!(atn.rule_token_type(1), Some(2));
    assert_eq!(atn.lexer_action(0), Some(&LexerAction::Skip));

    let mut lexer = Lexer::new(Arc::new(SharedCache::new(Arc::new(atn))), CodePointStream::new("a  a"));
    lexer.set_error_listener(Box::new(SilentErrorListener));
    let tokens = lexer.all_tokens().unwrap();
    let kinds: Vec<i32> = tokens.iter().map(|t| t.token_type).collect();
    assert_eq!(kinds, [1, 1, EOF]);
    assert_eq!(tokens[1].start, 3);
}

#[test]
fn test_string_form_loads() {
    let data = encode(&choice_parser());
    let text = String::from_utf16(&data).unwrap();
    let atn = deserialize_str(&text, &AtnDeserializationOptions::default()).unwrap();
    assert_eq!(atn.states().len(), 8);
}

#[test]
fn test_every_truncation_is_unexpected_end() {
    let data = encode(&choice_parser());
    for len in 0..data.len() {
        let err = deserialize(&data[..len], &AtnDeserializationOptions::default()).unwrap_err();
        assert_eq!(err, AtnError::UnexpectedEnd { offset: len }, "prefix of {len} units");
    }
}

#[test]
fn test_rejects_other_versions() {
    let mut data = encode(&choice_parser());
    data[0] = 2;
    assert_eq!(
        deserialize(&data, &AtnDeserializationOptions::default()).unwrap_err(),
        AtnError::UnsupportedVersion {
            found: 2,
            expected: SERIALIZED_VERSION,
        }
    );
}

#[test]
fn test_rejects_edge_to_missing_state() {
    let mut values = choice_parser();
    // target of the last edge
    let last_edge = values.len() - 2 - 6;
    values[last_edge + 1] = 99;
    assert_eq!(
        load(&values).unwrap_err(),
        AtnError::StateOutOfRange { index: 99, count: 8 }
    );
}

#[test]
fn test_rejects_unknown_state_type() {
    let mut values = choice_parser();
    values[3] = 13;
    assert!(matches!(
        load(&values).unwrap_err(),
        AtnError::InvalidStateType { value: 13, .. }
    ));
}

#[test]
fn test_rejects_unknown_lexer_action() {
    let mut values = skip_lexer();
    let action_type = values.len() - 3;
    values[action_type] = 9;
    assert!(matches!(
        load(&values).unwrap_err(),
        AtnError::InvalidLexerActionType { value: 9, .. }
    ));
}

#[test]
fn test_verification_catches_missing_decision() {
    let mut values = choice_parser();
    let n = values.len();
    values.truncate(n - 2);
    values.push(0);
    let err = load(&values).unwrap_err();
    assert!(matches!(err, AtnError::InvariantViolated { state: 2, .. }), "{err:?}");

    let lenient = AtnDeserializationOptions {
        verify_atn: false,
        ..AtnDeserializationOptions::default()
    };
    assert!(deserialize(&encode(&values), &lenient).is_ok());
}

proptest! {
    #[test]
    fn garbage_never_panics(tail in prop::collection::vec(any::<u16>(), 0..200)) {
        let mut data = encode(&[]);
        data.extend(tail);
        let _ = deserialize(&data, &AtnDeserializationOptions::default());
    }

    #[test]
    fn corrupted_parser_never_panics(index in 0usize..80, value in any::<u16>()) {
        let mut data = encode(&choice_parser());
        let index = 9 + index % (data.len() - 9);
        data[index] = value;
        for generate_rule_bypass_transitions in [false, true] {
            let options = AtnDeserializationOptions { verify_atn: true, generate_rule_bypass_transitions };
            let _ = deserialize(&data, &options);
        }
    }
}
