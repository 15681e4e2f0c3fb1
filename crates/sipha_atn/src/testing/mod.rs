//! # Testing Utilities
//!
//! Helpers for exercising the runtime without a grammar tool.
//!
//! ## Grammar Fixtures
//!
//! [`grammar`] compiles small parser and lexer grammars written as Rust values into
//! verified ATNs.
//!
//! ## Interpreting
//!
//! [`AtnInterpreter`] walks a parser ATN over a symbol stream and records every
//! prediction, which is what a generated parser would ask the simulator.
//!
//! ## Property-Based Testing
//!
//! [`generators`] produces random sentences of a fixture grammar for use with
//! `proptest`, plus mutated sentences for robustness tests.

pub mod generators;
pub mod grammar;
mod interpreter;

pub use generators::{GeneratorConfig, SentenceGenerator};
pub use grammar::{Element, GrammarError, LexerGrammar, ParserGrammar};
pub use interpreter::{AtnInterpreter, ParseTrace, Prediction};
