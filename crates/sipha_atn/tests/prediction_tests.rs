//! Integration tests for adaptive prediction: diagnostics, termination on
//! recursive grammars and cache behavior.

mod common;

use common::*;
use proptest::prelude::*;
use sipha_atn::recognizer::SilentErrorListener;
use sipha_atn::stream::{IntStream, SymbolStream};
use sipha_atn::testing::{Element, GeneratorConfig, ParserGrammar, SentenceGenerator};
use sipha_atn::token::EOF;
use sipha_atn::{DefaultRecognizer, ParserSimulatorConfig, PredictionMode, RecognitionError};

const A: i32 = 1;
const B: i32 = 2;

/// s : x EOF ;  x : A B | A B ;
fn ambiguous() -> ParserGrammar {
    ParserGrammar::new()
        .rule("s", vec![vec![Element::rule("x"), Element::eof()]])
        .rule(
            "x",
            vec![
                vec![Element::token(A), Element::token(B)],
                vec![Element::token(A), Element::token(B)],
            ],
        )
}

#[test]
fn test_ambiguity_picks_lowest_alt_and_reports_once() {
    let sim = simulator(&ambiguous());
    let mut recorder = Recorder::default();
    let trace = parse(&sim, &[A, B, EOF], &mut recorder).unwrap();
    assert_eq!(trace.alts_for(0), vec![1]);
    assert_eq!(recorder.full_context_attempts.len(), 1);
    assert_eq!(
        recorder.ambiguities,
        vec![Ambiguity {
            decision: 0,
            start_index: 0,
            stop_index: 1,
            exact: false,
            alts: vec![1, 2],
        }]
    );
    assert!(recorder.context_sensitivities.is_empty());
}

#[test]
fn test_exact_ambiguity_detection() {
    let config = ParserSimulatorConfig {
        prediction_mode: PredictionMode::LlExactAmbigDetection,
        ..ParserSimulatorConfig::default()
    };
    let sim = simulator_with(&ambiguous(), config);
    let mut recorder = Recorder::default();
    parse(&sim, &[A, B, EOF], &mut recorder).unwrap();
    assert_eq!(recorder.ambiguities.len(), 1);
    assert!(recorder.ambiguities[0].exact);
    assert_eq!(recorder.ambiguities[0].alts, vec![1, 2]);
}

#[test]
fn test_ambiguity_reports_can_be_silenced() {
    let config = ParserSimulatorConfig {
        report_ambiguity: false,
        ..ParserSimulatorConfig::default()
    };
    let sim = simulator_with(&ambiguous(), config);
    let mut recorder = Recorder::default();
    let trace = parse(&sim, &[A, B, EOF], &mut recorder).unwrap();
    assert_eq!(trace.alts_for(0), vec![1]);
    assert!(recorder.ambiguities.is_empty());
}

#[test]
fn test_no_viable_alt_diagnostics() {
    let grammar = statements();
    let sim = simulator(&grammar);
    let err = parse(&sim, &[ID, INT, SEMI, EOF], &mut SilentErrorListener).unwrap_err();
    let RecognitionError::NoViableAlt {
        decision,
        start_index,
        offending_index,
        offending_symbol,
        ref dead_end_configs,
    } = err
    else {
        panic!("expected no viable alt, got {err:?}");
    };
    let atn = sim.atn();
    let state = atn.decision_state(decision).unwrap();
    assert_eq!(atn.state(state).rule_index(), grammar.rule_index("stmt"));
    assert_eq!((start_index, offending_index, offending_symbol), (0, 1, INT));
    assert!(!dead_end_configs.is_empty());
    assert_eq!(err.start_index(), Some(0));
}

#[test]
fn test_right_recursion_terminates() {
    // s : a EOF ;  a : X a | Y ;
    let grammar = ParserGrammar::new()
        .rule("s", vec![vec![Element::rule("a"), Element::eof()]])
        .rule(
            "a",
            vec![vec![Element::token(1), Element::rule("a")], vec![Element::token(2)]],
        );
    let sim = simulator(&grammar);
    let mut input = vec![1; 500];
    input.extend([2, EOF]);
    let trace = parse(&sim, &input, &mut SilentErrorListener).unwrap();
    assert_eq!(trace.consumed, 501);
    assert_eq!(trace.alts_for(0).last(), Some(&2));
}

#[test]
fn test_precedence_recursion_terminates() {
    let sim = simulator(&statements());
    let mut input = vec![ID, ASSIGN, INT];
    for i in 0..200 {
        input.push(if i % 2 == 0 { PLUS } else { STAR });
        input.push(ID);
    }
    input.extend([SEMI, EOF]);
    let trace = parse(&sim, &input, &mut SilentErrorListener).unwrap();
    assert_eq!(trace.consumed, input.len() - 1);
}

#[test]
fn test_unrewritten_left_recursion_terminates() {
    // s : a EOF ;  a : a X | Y ;
    let grammar = ParserGrammar::new()
        .rule("s", vec![vec![Element::rule("a"), Element::eof()]])
        .rule(
            "a",
            vec![vec![Element::rule("a"), Element::token(1)], vec![Element::token(2)]],
        );
    let sim = simulator(&grammar);
    let mut input = SymbolStream::new(vec![2, 1, EOF]);
    let alt = sim
        .adaptive_predict(&mut input, 0, &[], &mut DefaultRecognizer, &mut SilentErrorListener)
        .unwrap();
    assert_eq!(alt, 1);
}

#[test]
fn test_epsilon_loop_terminates() {
    // s : (A?)* B EOF ;
    let grammar = ParserGrammar::new().rule(
        "s",
        vec![vec![
            Element::star(vec![vec![Element::optional(vec![vec![Element::token(A)]])]]),
            Element::token(B),
            Element::eof(),
        ]],
    );
    let sim = simulator(&grammar);
    let mut input = SymbolStream::new(vec![B, EOF]);
    let result = sim.adaptive_predict(&mut input, 0, &[], &mut DefaultRecognizer, &mut SilentErrorListener);
    assert!(result.is_ok());
    assert_eq!(input.index(), 0);
}

fn sample_sentences(count: usize) -> Vec<Vec<i32>> {
    let grammar = statements();
    let config = GeneratorConfig {
        max_depth: 5,
        max_repetitions: 3,
        seed: Some(0x5eed),
        ..GeneratorConfig::default()
    };
    SentenceGenerator::new(&grammar, config).generate_many(0, count)
}

#[test]
fn test_warm_cache_is_deterministic() {
    let sentences = sample_sentences(30);
    let sim = simulator(&statements());
    let cold: Vec<_> = sentences
        .iter()
        .map(|s| parse(&sim, s, &mut SilentErrorListener).unwrap())
        .collect();
    let states = sim.cache().dfa_state_count();
    assert!(states > 0);

    let warm: Vec<_> = sentences
        .iter()
        .map(|s| parse(&sim, s, &mut SilentErrorListener).unwrap())
        .collect();
    assert_eq!(cold, warm);
    assert_eq!(sim.cache().dfa_state_count(), states);

    // A fresh cache fed the inputs in another order agrees too.
    let other = simulator(&statements());
    for (sentence, expected) in sentences.iter().zip(&cold).rev() {
        assert_eq!(&parse(&other, sentence, &mut SilentErrorListener).unwrap(), expected);
    }
}

#[test]
fn test_clearing_dfa_keeps_results() {
    let sentences = sample_sentences(10);
    let sim = simulator(&statements());
    let before: Vec<_> = sentences
        .iter()
        .map(|s| parse(&sim, s, &mut SilentErrorListener).unwrap())
        .collect();
    sim.cache().clear_dfa();
    assert_eq!(sim.cache().dfa_state_count(), 0);
    for (sentence, expected) in sentences.iter().zip(&before) {
        assert_eq!(&parse(&sim, sentence, &mut SilentErrorListener).unwrap(), expected);
    }
}

#[test]
fn test_force_full_context_agrees() {
    let sentences = sample_sentences(15);
    let sim = simulator(&statements());
    let full = simulator_with(
        &statements(),
        ParserSimulatorConfig {
            force_full_context: true,
            ..ParserSimulatorConfig::default()
        },
    );
    for sentence in &sentences {
        assert_eq!(
            parse(&sim, sentence, &mut SilentErrorListener).unwrap(),
            parse(&full, sentence, &mut SilentErrorListener).unwrap()
        );
    }
    assert_eq!(full.cache().dfa_state_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn valid_sentences_parse_and_sll_agrees_with_ll(seed in any::<u64>()) {
        let grammar = statements();
        let config = GeneratorConfig { max_depth: 5, max_repetitions: 3, seed: Some(seed), ..GeneratorConfig::default() };
        let sentence = SentenceGenerator::new(&grammar, config).generate(0);

        let ll = simulator(&grammar);
        let ll_trace = parse(&ll, &sentence, &mut SilentErrorListener);
        prop_assert!(ll_trace.is_ok(), "LL rejected {:?}: {:?}", sentence, ll_trace);

        let sll = simulator_with(&grammar, ParserSimulatorConfig {
            prediction_mode: PredictionMode::Sll,
            ..ParserSimulatorConfig::default()
        });
        if let Ok(sll_trace) = parse(&sll, &sentence, &mut SilentErrorListener) {
            prop_assert_eq!(sll_trace, ll_trace.unwrap());
        }
    }

    #[test]
    fn mutated_sentences_never_panic(seed in any::<u64>(), mutations in 1usize..6) {
        let grammar = statements();
        let config = GeneratorConfig { max_depth: 4, max_repetitions: 3, seed: Some(seed), ..GeneratorConfig::default() };
        let sentence = SentenceGenerator::new(&grammar, config).generate_mutated(0, mutations);
        let sim = simulator(&grammar);
        let _ = parse(&sim, &sentence, &mut SilentErrorListener);
    }
}
