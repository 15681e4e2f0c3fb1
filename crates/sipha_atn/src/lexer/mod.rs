//! # Lexer Module
//!
//! Tokenization by simulating a lexer ATN.
//!
//! ## Overview
//!
//! [`LexerAtnSimulator`] finds the longest token at the current position. Ties go to
//! the rule listed first. Non-greedy loops stop as soon as the rest of the rule can
//! match. What it learns is cached in one DFA per mode, with edges kept for ASCII
//! input only.
//!
//! [`Lexer`] drives the simulator: it runs lexer commands (`skip`, `more`, `type`,
//! `channel`, `mode`, `pushMode`, `popMode` and custom actions), tracks lines and
//! columns, and recovers from unmatchable input by dropping one code point.
//!
//! ## Usage
//!
//! ```rust
//! use sipha_atn::atn::LexerAction;
//! use sipha_atn::cache::SharedCache;
//! use sipha_atn::lexer::Lexer;
//! use sipha_atn::stream::{CodePointStream, TokenSource};
//! use sipha_atn::testing::grammar::{Element, LexerGrammar};
//! use std::sync::Arc;
//!
//! let atn = LexerGrammar::new()
//!     .rule("NUM", 1, vec![vec![Element::plus(vec![vec![Element::range('0', '9')]])]])
//!     .rule("WS", 2, vec![vec![Element::text(" "), Element::action(LexerAction::Channel(1))]])
//!     .build()
//!     .unwrap();
//! let cache = Arc::new(SharedCache::new(Arc::new(atn)));
//! let mut lexer = Lexer::new(cache, CodePointStream::new("12 3"));
//! let first = lexer.next_token().unwrap();
//! assert_eq!((first.token_type, first.text.as_str()), (1, "12"));
//! assert_eq!(lexer.next_token().unwrap().channel, 1);
//! ```

mod driver;
mod simulator;

pub use driver::{Lexer, DEFAULT_MODE};
pub use simulator::{LexerAtnSimulator, LexerMatch};
