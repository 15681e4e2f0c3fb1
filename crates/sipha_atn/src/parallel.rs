//! # Parallel Batches
//!
//! Tokenize or predict over many inputs at once on the rayon thread pool.
//!
//! ## Overview
//!
//! Every job in a batch runs against the same [`SharedCache`], so DFA states
//! learned by one input are reused by the others while the batch is still
//! running. Jobs are independent: one failing input never affects another.

use crate::cache::SharedCache;
use crate::error::RecognitionError;
use crate::lexer::Lexer;
use crate::prediction::ParserAtnSimulator;
use crate::recognizer::{DefaultRecognizer, ErrorListener, SilentErrorListener};
use crate::stream::{CodePointStream, SymbolStream};
use crate::token::Token;
use rayon::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A syntax error reported while lexing one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxMessage {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Result of tokenizing a single source
#[derive(Debug)]
pub struct TokenizeResult {
    /// The source identifier (path or index)
    pub source_id: String,
    /// Tokens up to and including EOF, or up to the failure
    pub tokens: Vec<Token>,
    /// Recoverable errors the lexer reported and skipped past
    pub errors: Vec<SyntaxMessage>,
    /// The error that stopped lexing, if any
    pub failure: Option<RecognitionError>,
    pub duration: Duration,
}

impl TokenizeResult {
    /// Check if tokenizing succeeded without errors
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failure.is_none() && self.errors.is_empty()
    }
}

#[derive(Default, Clone)]
struct Collector(Rc<RefCell<Vec<SyntaxMessage>>>);

impl ErrorListener for Collector {
    fn syntax_error(&mut self, line: usize, column: usize, message: &str, _error: Option<&RecognitionError>) {
        self.0.borrow_mut().push(SyntaxMessage {
            line,
            column,
            message: message.to_owned(),
        });
    }
}

/// Tokenizes every `(source_id, text)` pair in parallel.
///
/// Results come back in input order.
#[must_use]
pub fn tokenize_batch(cache: &Arc<SharedCache>, sources: &[(String, String)]) -> Vec<TokenizeResult> {
    tracing::debug!(sources = sources.len(), "tokenizing batch");
    sources
        .par_iter()
        .map(|(source_id, text)| {
            let start = Instant::now();
            let collector = Collector::default();
            let mut lexer = Lexer::new(Arc::clone(cache), CodePointStream::with_name(text, source_id));
            lexer.set_error_listener(Box::new(collector.clone()));
            let (tokens, failure) = match lexer.all_tokens() {
                Ok(tokens) => (tokens, None),
                Err(err) => (Vec::new(), Some(err)),
            };
            let errors = collector.0.take();
            TokenizeResult {
                source_id: source_id.clone(),
                tokens,
                errors,
                failure,
                duration: start.elapsed(),
            }
        })
        .collect()
}

/// Predicts `decision` at the start of every input in parallel, with an empty
/// outer context and no embedded grammar code.
///
/// Results come back in input order.
#[must_use]
pub fn predict_batch(
    simulator: &ParserAtnSimulator,
    decision: usize,
    inputs: &[Vec<i32>],
) -> Vec<Result<usize, RecognitionError>> {
    inputs
        .par_iter()
        .map(|symbols| {
            let mut input = SymbolStream::new(symbols.clone());
            simulator.adaptive_predict(
                &mut input,
                decision,
                &[],
                &mut DefaultRecognizer,
                &mut SilentErrorListener,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::grammar::{Element, LexerGrammar, ParserGrammar};

    #[test]
    fn test_tokenize_batch_keeps_order_and_errors() {
        let atn = LexerGrammar::new()
            .rule("ID", 1, vec![vec![Element::plus(vec![vec![Element::range('a', 'z')]])]])
            .rule("WS", 2, vec![vec![Element::text(" "), Element::skip()]])
            .build()
            .unwrap();
        let cache = Arc::new(SharedCache::new(Arc::new(atn)));
        let sources: Vec<(String, String)> = (0..16)
            .map(|i| (format!("src{i}"), if i % 4 == 0 { "ab ?c".to_owned() } else { "ab cd".to_owned() }))
            .collect();
        let results = tokenize_batch(&cache, &sources);
        assert_eq!(results.len(), 16);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.source_id, format!("src{i}"));
            assert_eq!(result.tokens.len(), 3);
            assert_eq!(result.is_ok(), i % 4 != 0);
        }
        assert_eq!(results[0].errors[0].message, "token recognition error at: '?'");
    }

    #[test]
    fn test_predict_batch_matches_sequential() {
        let atn = ParserGrammar::new()
            .rule(
                "s",
                vec![
                    vec![Element::token(1), Element::token(2)],
                    vec![Element::token(1), Element::token(3)],
                ],
            )
            .build()
            .unwrap();
        let sim = ParserAtnSimulator::new(Arc::new(SharedCache::new(Arc::new(atn))));
        let inputs: Vec<Vec<i32>> = (0..64).map(|i| vec![1, 2 + i % 2]).collect();
        let results = predict_batch(&sim, 0, &inputs);
        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.unwrap(), 1 + i % 2);
        }
    }
}
