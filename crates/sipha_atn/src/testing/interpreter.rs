//! # ATN Interpreter
//!
//! Follows a parser ATN over a symbol stream the way a generated parser would,
//! asking [`ParserAtnSimulator`] at every decision. Rule invocations are tracked on
//! a frame stack, so predictions see the real outer context and full-context
//! prediction behaves exactly as it does inside a parser.

use crate::atn::{StateId, TransitionKind};
use crate::error::RecognitionError;
use crate::prediction::ParserAtnSimulator;
use crate::recognizer::{ErrorListener, Recognizer};
use crate::stream::IntStream;
use crate::token::EOF;
use smallvec::{smallvec, SmallVec};

/// One decision taken while interpreting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub decision: usize,
    /// Input index the prediction started at.
    pub index: usize,
    pub alt: usize,
}

/// What a successful run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseTrace {
    pub predictions: Vec<Prediction>,
    /// Symbols consumed, not counting EOF.
    pub consumed: usize,
}

impl ParseTrace {
    /// The alternatives chosen at `decision`, in order.
    #[must_use]
    pub fn alts_for(&self, decision: usize) -> Vec<usize> {
        self.predictions
            .iter()
            .filter(|p| p.decision == decision)
            .map(|p| p.alt)
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    invoking_state: StateId,
    follow_state: StateId,
}

/// Reports the interpreter's precedence level and forwards everything else.
struct PrecedenceScope<'r> {
    inner: &'r mut dyn Recognizer,
    precedence: i32,
}

impl Recognizer for PrecedenceScope<'_> {
    fn sempred(&mut self, rule_index: usize, pred_index: usize, is_ctx_dependent: bool) -> bool {
        self.inner.sempred(rule_index, pred_index, is_ctx_dependent)
    }

    fn precpred(&mut self, precedence: i32) -> bool {
        precedence >= self.precedence
    }

    fn precedence(&self) -> i32 {
        self.precedence
    }

    fn action(&mut self, rule_index: usize, action_index: usize) {
        self.inner.action(rule_index, action_index);
    }
}

/// Drives a parser ATN without generated code.
#[derive(Debug, Clone, Copy)]
pub struct AtnInterpreter<'s> {
    simulator: &'s ParserAtnSimulator,
}

impl<'s> AtnInterpreter<'s> {
    #[must_use]
    pub const fn new(simulator: &'s ParserAtnSimulator) -> Self {
        Self { simulator }
    }

    /// Recognizes one invocation of `rule_index` starting at the current input
    /// position. Input after the rule is left unread.
    ///
    /// # Errors
    ///
    /// The first prediction failure, mismatched symbol or failed predicate.
    ///
    /// # Panics
    ///
    /// If `rule_index` is not a rule of the ATN.
    pub fn parse(
        &self,
        input: &mut dyn IntStream,
        rule_index: usize,
        recognizer: &mut dyn Recognizer,
        listener: &mut dyn ErrorListener,
    ) -> Result<ParseTrace, RecognitionError> {
        let atn = self.simulator.atn();
        let Some(mut state) = atn.rule_start(rule_index) else {
            panic!("rule {rule_index} is not defined");
        };
        let mut frames: Vec<Frame> = Vec::new();
        let mut precedence_stack: SmallVec<[i32; 8]> = smallvec![0];
        let mut recognizer = PrecedenceScope {
            inner: recognizer,
            precedence: 0,
        };
        let mut trace = ParseTrace::default();

        loop {
            let s = atn.state(state);
            if s.is_rule_stop() {
                let Some(frame) = frames.pop() else {
                    return Ok(trace);
                };
                precedence_stack.pop();
                recognizer.precedence = precedence_stack.last().copied().unwrap_or(0);
                state = frame.follow_state;
                continue;
            }

            let transitions = s.transitions();
            let alt = match s.decision() {
                Some(decision) if transitions.len() > 1 => {
                    let outer: SmallVec<[StateId; 16]> =
                        frames.iter().rev().map(|f| f.invoking_state).collect();
                    let index = input.index();
                    let alt = self
                        .simulator
                        .adaptive_predict(input, decision, &outer, &mut recognizer, listener)?;
                    trace.predictions.push(Prediction { decision, index, alt });
                    alt
                }
                _ => 1,
            };
            let Some(t) = transitions.get(alt - 1) else {
                return Err(RecognitionError::MismatchedInput {
                    index: input.index(),
                    found: input.la(1),
                    expected: String::new(),
                });
            };

            match &t.kind {
                TransitionKind::Epsilon { .. } => {}
                TransitionKind::Rule {
                    rule_index,
                    precedence,
                    follow_state,
                } => {
                    frames.push(Frame {
                        invoking_state: state,
                        follow_state: *follow_state,
                    });
                    let level = if atn.is_left_recursive_rule(*rule_index) {
                        *precedence
                    } else {
                        recognizer.precedence
                    };
                    precedence_stack.push(level);
                    recognizer.precedence = level;
                }
                TransitionKind::Predicate {
                    rule_index,
                    pred_index,
                    is_ctx_dependent,
                } => {
                    if !recognizer.sempred(*rule_index, *pred_index, *is_ctx_dependent) {
                        return Err(RecognitionError::FailedPredicate {
                            rule_index: *rule_index,
                            pred_index: *pred_index,
                            message: format!("predicate {pred_index} failed"),
                        });
                    }
                }
                TransitionKind::Precedence { precedence } => {
                    if !recognizer.precpred(*precedence) {
                        return Err(RecognitionError::FailedPredicate {
                            rule_index: s.rule_index().unwrap_or_default(),
                            pred_index: 0,
                            message: format!("precpred(_ctx, {precedence})"),
                        });
                    }
                }
                TransitionKind::Action {
                    rule_index,
                    action_index,
                    ..
                } => {
                    if let Some(action_index) = action_index {
                        recognizer.action(*rule_index, *action_index);
                    }
                }
                _ => {
                    let symbol = input.la(1);
                    if !t.matches(symbol, 1, atn.max_token_type()) {
                        return Err(RecognitionError::MismatchedInput {
                            index: input.index(),
                            found: symbol,
                            expected: t.label().map(|l| l.to_string()).unwrap_or_default(),
                        });
                    }
                    if symbol != EOF {
                        input.consume();
                        trace.consumed += 1;
                    }
                }
            }
            state = t.target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SharedCache;
    use crate::recognizer::{DefaultRecognizer, SilentErrorListener};
    use crate::stream::SymbolStream;
    use crate::testing::grammar::{Element, ParserGrammar};
    use std::sync::Arc;

    const INT: i32 = 1;
    const PLUS: i32 = 2;
    const STAR: i32 = 3;

    fn simulator(grammar: ParserGrammar) -> ParserAtnSimulator {
        ParserAtnSimulator::new(Arc::new(SharedCache::new(Arc::new(grammar.build().unwrap()))))
    }

    fn run(sim: &ParserAtnSimulator, symbols: Vec<i32>) -> Result<ParseTrace, RecognitionError> {
        let mut input = SymbolStream::new(symbols);
        AtnInterpreter::new(sim).parse(&mut input, 0, &mut DefaultRecognizer, &mut SilentErrorListener)
    }

    fn expressions() -> ParserGrammar {
        // s : e EOF ;  e : e '*' e | e '+' e | INT ;
        ParserGrammar::new()
            .rule("s", vec![vec![Element::rule("e"), Element::eof()]])
            .precedence_rule(
                "e",
                vec![vec![Element::token(INT)]],
                vec![
                    (2, vec![Element::token(STAR), Element::rule_with_precedence("e", 3)]),
                    (1, vec![Element::token(PLUS), Element::rule_with_precedence("e", 2)]),
                ],
            )
    }

    #[test]
    fn test_parse_nested_rules() {
        let sim = simulator(
            ParserGrammar::new()
                .rule("s", vec![vec![Element::rule("a"), Element::eof()]])
                .rule("a", vec![vec![Element::token(1), Element::token(2)], vec![Element::token(3)]]),
        );
        let trace = run(&sim, vec![1, 2, EOF]).unwrap();
        assert_eq!(trace.consumed, 2);
        assert_eq!(trace.alts_for(0), vec![1]);
    }

    #[test]
    fn test_precedence_climbing() {
        let sim = simulator(expressions());
        let trace = run(&sim, vec![INT, PLUS, INT, STAR, INT, EOF]).unwrap();
        assert_eq!(trace.consumed, 5);
        let loop_decision = (0..sim.atn().number_of_decisions())
            .find(|&d| {
                sim.atn()
                    .decision_state(d)
                    .is_some_and(|s| sim.atn().state(s).is_precedence_decision())
            })
            .unwrap();
        // Enter '+', enter '*', then exit at all three levels.
        assert_eq!(trace.alts_for(loop_decision), vec![1, 1, 2, 2, 2]);
    }

    #[test]
    fn test_mismatched_input() {
        let sim = simulator(ParserGrammar::new().rule("s", vec![vec![Element::token(1), Element::token(2)]]));
        let err = run(&sim, vec![1, 3, EOF]).unwrap_err();
        assert!(matches!(err, RecognitionError::MismatchedInput { index: 1, found: 3, .. }));
    }

    #[test]
    fn test_failed_predicate() {
        struct Never;
        impl Recognizer for Never {
            fn sempred(&mut self, _: usize, _: usize, _: bool) -> bool {
                false
            }
        }
        let sim = simulator(ParserGrammar::new().rule("s", vec![vec![Element::predicate(4), Element::token(1)]]));
        let mut input = SymbolStream::new(vec![1, EOF]);
        let err = AtnInterpreter::new(&sim)
            .parse(&mut input, 0, &mut Never, &mut SilentErrorListener)
            .unwrap_err();
        assert!(matches!(err, RecognitionError::FailedPredicate { pred_index: 4, .. }));
    }
}
