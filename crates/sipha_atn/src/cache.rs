//! # Shared Caches
//!
//! [`SharedCache`] bundles everything a grammar's simulators learn across parses:
//! the ATN itself, one DFA per decision (parsers) or per mode (lexers), and the
//! prediction-context hash-consing table. Create one per grammar and hand clones of
//! the `Arc` to every simulator.
//!
//! ```rust
//! use sipha_atn::cache::SharedCache;
//! use sipha_atn::testing::grammar::{Element, ParserGrammar};
//! use std::sync::Arc;
//!
//! let atn = ParserGrammar::new()
//!     .rule("s", vec![vec![Element::token(1)], vec![Element::token(2)]])
//!     .build()
//!     .unwrap();
//! let cache = Arc::new(SharedCache::new(Arc::new(atn)));
//! assert_eq!(cache.dfas().len(), 1);
//! assert_eq!(cache.dfa_state_count(), 0);
//! ```

use crate::atn::{Atn, GrammarType};
use crate::context::PredictionContextCache;
use crate::dfa::Dfa;
use std::sync::Arc;

/// Per-grammar state shared by every simulator instance.
#[derive(Debug)]
pub struct SharedCache {
    atn: Arc<Atn>,
    dfas: Vec<Dfa>,
    context_cache: PredictionContextCache,
}

impl SharedCache {
    /// Creates empty DFAs for every decision (parser ATN) or mode (lexer ATN).
    #[must_use]
    pub fn new(atn: Arc<Atn>) -> Self {
        let dfas = match atn.grammar_type() {
            GrammarType::Parser => atn
                .decision_to_state
                .iter()
                .enumerate()
                .map(|(decision, &state)| Dfa::new(decision, state, atn.state(state).is_precedence_decision()))
                .collect(),
            GrammarType::Lexer => atn
                .mode_to_start_state
                .iter()
                .enumerate()
                .map(|(mode, &state)| Dfa::new(mode, state, false))
                .collect(),
        };
        Self {
            atn,
            dfas,
            context_cache: PredictionContextCache::new(),
        }
    }

    #[must_use]
    pub fn atn(&self) -> &Atn {
        &self.atn
    }

    #[must_use]
    pub fn atn_arc(&self) -> &Arc<Atn> {
        &self.atn
    }

    /// DFA of decision `index` (parsers) or mode `index` (lexers).
    #[must_use]
    pub fn dfa(&self, index: usize) -> Option<&Dfa> {
        self.dfas.get(index)
    }

    #[must_use]
    pub fn dfas(&self) -> &[Dfa] {
        &self.dfas
    }

    #[must_use]
    pub fn context_cache(&self) -> &PredictionContextCache {
        &self.context_cache
    }

    /// Total number of DFA states across all DFAs.
    #[must_use]
    pub fn dfa_state_count(&self) -> usize {
        self.dfas.iter().map(Dfa::len).sum()
    }

    /// Forgets everything learned so far. The context table is kept.
    pub fn clear_dfa(&self) {
        for dfa in &self.dfas {
            dfa.clear();
        }
    }
}
