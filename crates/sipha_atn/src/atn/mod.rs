//! # Augmented Transition Networks
//!
//! An ATN is the grammar compiled into a graph: one sub-network per rule, joined by
//! rule-call transitions. The simulators in [`crate::prediction`] and [`crate::lexer`]
//! walk this graph to decide which alternative to take or which token to emit.
//!
//! ATNs are immutable once built. They are produced either by [`deserialize`] from
//! the serialized form emitted by grammar tools, or by [`AtnBuilder`] directly.
//!
//! ```rust
//! use sipha_atn::atn::{AtnBuilder, GrammarType, StateKind, Transition};
//!
//! // r : 1 ;
//! let mut builder = AtnBuilder::new(GrammarType::Parser, 1);
//! let start = builder.add_state(StateKind::RuleStart { stop_state: None, is_left_recursive: false }, Some(0));
//! let stop = builder.add_state(StateKind::RuleStop, Some(0));
//! let a = builder.add_state(StateKind::Basic, Some(0));
//! let b = builder.add_state(StateKind::Basic, Some(0));
//! builder.add_rule(start, None).unwrap();
//! builder.add_transition(start, Transition::epsilon(a)).unwrap();
//! builder.add_transition(a, Transition::atom(b, 1)).unwrap();
//! builder.add_transition(b, Transition::epsilon(stop)).unwrap();
//! let atn = builder.build().unwrap();
//! assert_eq!(atn.next_tokens(a).to_string(), "1");
//! ```

mod builder;
mod deserializer;
mod lexer_action;
mod ll1;
mod state;
mod transition;

pub use builder::AtnBuilder;
pub use deserializer::{
    deserialize, deserialize_str, AtnDeserializationOptions, ADDED_UNICODE_SMP, BASE_SERIALIZED_UUID, SERIALIZED_VERSION,
};
pub use lexer_action::{LexerAction, LexerActionExecutor, LexerControl};
pub use ll1::Ll1Analyzer;
pub use state::{AtnState, StateId, StateKind};
pub use transition::{Transition, TransitionKind};

use crate::misc::IntervalSet;
use crate::token::{EOF, EPSILON};

/// Whether an ATN recognizes characters or tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum GrammarType {
    Lexer,
    Parser,
}

/// An immutable, verified ATN.
#[derive(Debug, Clone)]
pub struct Atn {
    pub(crate) grammar_type: GrammarType,
    pub(crate) max_token_type: i32,
    pub(crate) states: Vec<AtnState>,
    pub(crate) decision_to_state: Vec<StateId>,
    pub(crate) rule_to_start_state: Vec<StateId>,
    pub(crate) rule_to_stop_state: Vec<StateId>,
    pub(crate) rule_to_token_type: Vec<i32>,
    pub(crate) mode_to_start_state: Vec<StateId>,
    pub(crate) lexer_actions: Vec<LexerAction>,
}

impl Atn {
    #[must_use]
    pub const fn grammar_type(&self) -> GrammarType {
        self.grammar_type
    }

    /// Largest token type (parsers) or code point (lexers) the grammar uses.
    #[must_use]
    pub const fn max_token_type(&self) -> i32 {
        self.max_token_type
    }

    /// State `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this ATN.
    #[must_use]
    pub fn state(&self, id: StateId) -> &AtnState {
        &self.states[id.index()]
    }

    #[must_use]
    pub fn states(&self) -> &[AtnState] {
        &self.states
    }

    #[must_use]
    pub fn number_of_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    #[must_use]
    pub fn decision_state(&self, decision: usize) -> Option<StateId> {
        self.decision_to_state.get(decision).copied()
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rule_to_start_state.len()
    }

    #[must_use]
    pub fn rule_start(&self, rule_index: usize) -> Option<StateId> {
        self.rule_to_start_state.get(rule_index).copied()
    }

    #[must_use]
    pub fn rule_stop(&self, rule_index: usize) -> Option<StateId> {
        self.rule_to_stop_state.get(rule_index).copied()
    }

    /// Whether `rule_index` was rewritten from a left-recursive rule.
    #[must_use]
    pub fn is_left_recursive_rule(&self, rule_index: usize) -> bool {
        self.rule_start(rule_index).is_some_and(|s| {
            matches!(
                self.state(s).kind,
                StateKind::RuleStart {
                    is_left_recursive: true,
                    ..
                }
            )
        })
    }

    /// Token type emitted by lexer rule `rule_index`.
    #[must_use]
    pub fn rule_token_type(&self, rule_index: usize) -> Option<i32> {
        self.rule_to_token_type.get(rule_index).copied()
    }

    #[must_use]
    pub fn mode_count(&self) -> usize {
        self.mode_to_start_state.len()
    }

    #[must_use]
    pub fn mode_start(&self, mode: usize) -> Option<StateId> {
        self.mode_to_start_state.get(mode).copied()
    }

    #[must_use]
    pub fn lexer_action(&self, index: usize) -> Option<&LexerAction> {
        self.lexer_actions.get(index)
    }

    /// Tokens that can follow `state` within its rule. Contains [`EPSILON`] if the
    /// end of the rule is reachable without consuming input.
    ///
    /// The result is computed once per state and cached.
    pub fn next_tokens(&self, state: StateId) -> &IntervalSet {
        self.state(state)
            .next_token_within_rule
            .get_or_init(|| Ll1Analyzer::new(self).look(state, None, None))
    }

    /// Tokens that can follow `state` given the invocation stack `outer_context`
    /// (invoking states, innermost first). Contains [`EOF`] if the outermost rule can end.
    #[must_use]
    pub fn next_tokens_in_context(&self, state: StateId, outer_context: &[StateId]) -> IntervalSet {
        let context = crate::context::from_invocation_stack(self, outer_context);
        Ll1Analyzer::new(self).look(state, None, Some(context))
    }

    /// Tokens the parser would accept at `state`, climbing through the invoking rules in
    /// `outer_context` while the current rule can end without consuming input.
    #[must_use]
    pub fn expected_tokens(&self, state: StateId, outer_context: &[StateId]) -> IntervalSet {
        let mut following = self.next_tokens(state).clone();
        if !following.contains(EPSILON) {
            return following;
        }
        let mut expected = following.clone();
        expected.remove(EPSILON);
        for &invoking in outer_context {
            if !following.contains(EPSILON) {
                break;
            }
            let follow = self.state(invoking).transitions.first().and_then(|t| match t.kind {
                TransitionKind::Rule { follow_state, .. } => Some(follow_state),
                _ => None,
            });
            let Some(follow) = follow else {
                break;
            };
            following = self.next_tokens(follow).clone();
            expected.add_set(&following);
            expected.remove(EPSILON);
        }
        if following.contains(EPSILON) {
            expected.add(EOF);
        }
        expected
    }
}
