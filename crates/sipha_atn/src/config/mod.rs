//! # ATN Configurations
//!
//! A configuration is one live possibility while simulating the ATN: "in state `s`,
//! predicting alternative `alt`, with call stack `context`, guarded by
//! `semantic_context`". Lexer configurations also carry the actions collected on
//! the way and whether a non-greedy decision was crossed.

mod set;

pub use set::AtnConfigSet;

use crate::atn::{AtnState, LexerActionExecutor, StateId};
use crate::context::ContextRef;
use crate::semantic::SemanticContext;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Lexer-only configuration data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LexerConfigExt {
    pub action_executor: Option<Arc<LexerActionExecutor>>,
    pub passed_through_non_greedy_decision: bool,
}

/// A (state, alternative, context, semantic context) tuple.
#[derive(Debug, Clone)]
pub struct AtnConfig {
    pub state: StateId,
    /// Alternative being predicted, numbered from 1.
    pub alt: usize,
    pub context: ContextRef,
    pub semantic_context: SemanticContext,
    /// How many times closure popped past the decision's starting rule. Not part of
    /// equality.
    pub reaches_into_outer_context: u32,
    pub precedence_filter_suppressed: bool,
    pub lexer: Option<LexerConfigExt>,
}

impl AtnConfig {
    /// A parser configuration with no predicates.
    #[must_use]
    pub fn new(state: StateId, alt: usize, context: ContextRef) -> Self {
        Self {
            state,
            alt,
            context,
            semantic_context: SemanticContext::NONE,
            reaches_into_outer_context: 0,
            precedence_filter_suppressed: false,
            lexer: None,
        }
    }

    /// A lexer configuration starting at `state`.
    #[must_use]
    pub fn new_lexer(
        state: &AtnState,
        alt: usize,
        context: ContextRef,
        action_executor: Option<Arc<LexerActionExecutor>>,
    ) -> Self {
        Self {
            lexer: Some(LexerConfigExt {
                action_executor,
                passed_through_non_greedy_decision: state.is_decision_state() && state.is_non_greedy(),
            }),
            ..Self::new(state.id(), alt, context)
        }
    }

    fn moved_to(&self, target: &AtnState) -> Self {
        let mut next = self.clone();
        next.state = target.id();
        if let Some(ext) = &mut next.lexer {
            ext.passed_through_non_greedy_decision |= target.is_decision_state() && target.is_non_greedy();
        }
        next
    }

    /// Same configuration, moved to `target`.
    #[must_use]
    pub fn derive(&self, target: &AtnState) -> Self {
        self.moved_to(target)
    }

    #[must_use]
    pub fn derive_with_context(&self, target: &AtnState, context: ContextRef) -> Self {
        let mut next = self.moved_to(target);
        next.context = context;
        next
    }

    #[must_use]
    pub fn derive_with_semantic(&self, target: &AtnState, semantic_context: SemanticContext) -> Self {
        let mut next = self.moved_to(target);
        next.semantic_context = semantic_context;
        next
    }

    /// Lexer derivation that replaces the action executor.
    #[must_use]
    pub fn derive_with_executor(&self, target: &AtnState, executor: Option<Arc<LexerActionExecutor>>) -> Self {
        let mut next = self.moved_to(target);
        let ext = next.lexer.get_or_insert_with(LexerConfigExt::default);
        ext.action_executor = executor;
        next
    }

    #[must_use]
    pub fn action_executor(&self) -> Option<&Arc<LexerActionExecutor>> {
        self.lexer.as_ref().and_then(|l| l.action_executor.as_ref())
    }

    #[must_use]
    pub fn passed_through_non_greedy_decision(&self) -> bool {
        self.lexer.as_ref().is_some_and(|l| l.passed_through_non_greedy_decision)
    }

    #[must_use]
    pub const fn outer_context_depth(&self) -> u32 {
        self.reaches_into_outer_context
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && self.precedence_filter_suppressed == other.precedence_filter_suppressed
            && (Arc::ptr_eq(&self.context, &other.context) || self.context == other.context)
            && self.semantic_context == other.semantic_context
            && self.lexer == other.lexer
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.context.hash(state);
        self.semantic_context.hash(state);
        self.precedence_filter_suppressed.hash(state);
        self.lexer.hash(state);
    }
}

impl fmt::Display for AtnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},[{}]", self.state, self.alt, self.context)?;
        if !self.semantic_context.is_none() {
            write!(f, ",{}", self.semantic_context)?;
        }
        if self.reaches_into_outer_context > 0 {
            write!(f, ",up={}", self.reaches_into_outer_context)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::StateKind;
    use crate::context::PredictionContext;

    #[test]
    fn test_equality_ignores_outer_depth() {
        let ctx = PredictionContext::empty();
        let a = AtnConfig::new(StateId(3), 1, ctx.clone());
        let mut b = a.clone();
        b.reaches_into_outer_context = 2;
        assert_eq!(a, b);
        let c = AtnConfig::new(StateId(3), 2, ctx);
        assert_ne!(a, c);
    }

    #[test]
    fn test_lexer_derive_tracks_non_greedy() {
        let start = AtnState::new(StateId(0), StateKind::Basic, Some(0));
        let mut decision = AtnState::new(
            StateId(1),
            StateKind::BlockStart {
                end_state: Some(StateId(2)),
            },
            Some(0),
        );
        decision.non_greedy = true;
        let config = AtnConfig::new_lexer(&start, 1, PredictionContext::empty(), None);
        assert!(!config.passed_through_non_greedy_decision());
        let next = config.derive(&decision);
        assert!(next.passed_through_non_greedy_decision());
        assert_ne!(config, next.derive(&start));
    }

    #[test]
    fn test_display() {
        let config = AtnConfig::new(StateId(4), 2, PredictionContext::empty());
        assert_eq!(config.to_string(), "(4,2,[$])");
    }
}
