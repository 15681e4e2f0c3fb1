//! # Sipha ATN
//!
//! A runtime for grammars compiled to augmented transition networks, with
//! adaptive LL(*) prediction for parsers and DFA-cached simulation for lexers.
//!
//! ## Overview
//!
//! - **ATN graphs**: load the serialized form emitted by grammar tools, or build
//!   one directly with [`AtnBuilder`]
//! - **Adaptive prediction**: [`ParserAtnSimulator`] picks an alternative at each
//!   decision using SLL first and full-context LL when needed, caching what it
//!   learns in per-decision DFAs
//! - **Lexing**: [`Lexer`] turns characters into tokens with longest-match,
//!   first-rule-wins semantics, modes and lexer commands
//! - **Shared caches**: one [`SharedCache`] per grammar, safely shared between
//!   threads, so every parse benefits from what earlier parses learned
//!
//! ## Quick Start
//!
//! ```rust
//! use sipha_atn::stream::{CodePointStream, SymbolStream};
//! use sipha_atn::testing::{AtnInterpreter, Element, LexerGrammar, ParserGrammar};
//! use sipha_atn::{DefaultRecognizer, Lexer, ParserAtnSimulator, SharedCache, SilentErrorListener};
//! use std::sync::Arc;
//!
//! const NUM: i32 = 1;
//! const PLUS: i32 = 2;
//!
//! // 1. A lexer: NUM : [0-9]+ ; PLUS : '+' ; WS : ' ' -> skip ;
//! let lexer_atn = LexerGrammar::new()
//!     .rule("NUM", NUM, vec![vec![Element::plus(vec![vec![Element::range('0', '9')]])]])
//!     .rule("PLUS", PLUS, vec![vec![Element::text("+")]])
//!     .rule("WS", 3, vec![vec![Element::text(" "), Element::skip()]])
//!     .build()
//!     .unwrap();
//! let lexer_cache = Arc::new(SharedCache::new(Arc::new(lexer_atn)));
//! let tokens = Lexer::new(lexer_cache, CodePointStream::new("1 + 22")).all_tokens().unwrap();
//!
//! // 2. A parser: s : NUM (PLUS NUM)* EOF ;
//! let parser_atn = ParserGrammar::new()
//!     .rule(
//!         "s",
//!         vec![vec![
//!             Element::token(NUM),
//!             Element::star(vec![vec![Element::token(PLUS), Element::token(NUM)]]),
//!             Element::eof(),
//!         ]],
//!     )
//!     .build()
//!     .unwrap();
//! let simulator = ParserAtnSimulator::new(Arc::new(SharedCache::new(Arc::new(parser_atn))));
//!
//! // 3. Predict every decision along the way
//! let mut input = SymbolStream::from_tokens(&tokens);
//! let trace = AtnInterpreter::new(&simulator)
//!     .parse(&mut input, 0, &mut DefaultRecognizer, &mut SilentErrorListener)
//!     .unwrap();
//! assert_eq!(trace.consumed, 3);
//! assert_eq!(trace.alts_for(0), vec![1, 2]);
//! ```

pub mod atn;
pub mod cache;
pub mod config;
pub mod context;
pub mod dfa;
pub mod error;
pub mod lexer;
pub mod misc;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod prediction;
pub mod recognizer;
pub mod semantic;
pub mod stream;
pub mod testing;
pub mod token;

// Re-export commonly used types
pub use atn::{deserialize, Atn, AtnBuilder, AtnDeserializationOptions, GrammarType, StateId};
pub use cache::SharedCache;
pub use error::{AtnError, RecognitionError};
pub use lexer::{Lexer, LexerAtnSimulator};
pub use prediction::{ParserAtnSimulator, ParserSimulatorConfig, PredictionMode};
pub use recognizer::{
    ConsoleErrorListener, DefaultRecognizer, ErrorListener, ProxyErrorListener, Recognizer, SilentErrorListener,
    Vocabulary,
};
pub use token::Token;
