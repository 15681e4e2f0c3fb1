//! # Error Types
//!
//! Two families of errors are produced by this crate:
//!
//! - [`AtnError`]: a serialized or hand-built ATN is malformed. These are fatal for
//!   the grammar: nothing can be predicted from a graph that fails to load.
//! - [`RecognitionError`]: prediction or lexing could not proceed on a particular
//!   input. The parser or lexer driving the runtime decides how to recover.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, both enums derive [`miette::Diagnostic`]
//! with stable diagnostic codes.

use crate::atn::StateId;
use crate::config::AtnConfigSet;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Errors raised while deserializing, building or verifying an ATN.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum AtnError {
    #[error("unsupported serialized ATN version {found} (expected {expected})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::unsupported_version)))]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("unsupported serialized ATN feature set {uuid}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::unsupported_uuid)))]
    UnsupportedUuid { uuid: String },

    #[error("invalid state type {value} at offset {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::invalid_state_type)))]
    InvalidStateType { value: u16, offset: usize },

    #[error("invalid transition type {value} at offset {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::invalid_transition_type)))]
    InvalidTransitionType { value: u16, offset: usize },

    #[error("invalid lexer action type {value} at offset {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::invalid_lexer_action_type)))]
    InvalidLexerActionType { value: u16, offset: usize },

    #[error("state {index} out of range ({count} states)")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::state_out_of_range)))]
    StateOutOfRange { index: usize, count: usize },

    #[error("rule {index} out of range ({count} rules)")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::rule_out_of_range)))]
    RuleOutOfRange { index: usize, count: usize },

    #[error("serialized ATN ended unexpectedly at offset {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::unexpected_end)))]
    UnexpectedEnd { offset: usize },

    #[error("invalid ATN at state {state}: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::invariant_violated)))]
    InvariantViolated { state: usize, reason: &'static str },
}

impl AtnError {
    /// Create an invariant violation error for `state`
    #[must_use]
    pub const fn invariant(state: StateId, reason: &'static str) -> Self {
        Self::InvariantViolated {
            state: state.0 as usize,
            reason,
        }
    }

    /// Create a state-out-of-range error
    #[must_use]
    pub const fn state_out_of_range(index: usize, count: usize) -> Self {
        Self::StateOutOfRange { index, count }
    }
}

/// Errors raised while predicting or lexing a particular input.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum RecognitionError {
    /// No alternative of `decision` can match the input starting at `start_index`.
    #[error("no viable alternative at input index {offending_index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::no_viable_alt)))]
    NoViableAlt {
        decision: usize,
        start_index: usize,
        offending_index: usize,
        offending_symbol: i32,
        dead_end_configs: Arc<AtnConfigSet>,
    },

    /// No token rule matches the characters starting at `start_index`.
    #[error("token recognition error at index {start_index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::no_viable_alt)))]
    LexerNoViableAlt {
        start_index: usize,
        dead_end_configs: Arc<AtnConfigSet>,
    },

    /// A semantic predicate failed while following the predicted alternative.
    #[error("rule {rule_index} failed predicate {pred_index}: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::failed_predicate)))]
    FailedPredicate {
        rule_index: usize,
        pred_index: usize,
        message: String,
    },

    /// An input symbol did not match the transition the parser was following.
    #[error("mismatched input {found} at index {index}, expecting {expected}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::mismatched_input)))]
    MismatchedInput {
        index: usize,
        found: i32,
        expected: String,
    },

    /// Prediction gave up after the configured number of reach steps.
    #[error("decision {decision} exceeded {steps} lookahead steps starting at index {start_index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::reach_budget)))]
    ReachBudgetExhausted {
        decision: usize,
        start_index: usize,
        steps: usize,
    },

    /// Prediction was asked about a decision the ATN does not have.
    #[error("unknown decision {decision}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::unknown_decision)))]
    UnknownDecision { decision: usize },

    /// A `popMode` lexer command ran with an empty mode stack.
    #[error("popMode with an empty mode stack at index {index}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::mode_stack_underflow)))]
    ModeStackUnderflow { index: usize },
}

impl RecognitionError {
    /// Input index where the failing prediction or token started.
    #[must_use]
    pub const fn start_index(&self) -> Option<usize> {
        match self {
            Self::NoViableAlt { start_index, .. }
            | Self::LexerNoViableAlt { start_index, .. }
            | Self::ReachBudgetExhausted { start_index, .. } => Some(*start_index),
            Self::MismatchedInput { index, .. } | Self::ModeStackUnderflow { index } => Some(*index),
            Self::FailedPredicate { .. } | Self::UnknownDecision { .. } => None,
        }
    }

    /// Configurations that were alive when prediction failed, if any.
    #[must_use]
    pub fn dead_end_configs(&self) -> Option<&AtnConfigSet> {
        match self {
            Self::NoViableAlt {
                dead_end_configs, ..
            }
            | Self::LexerNoViableAlt {
                dead_end_configs, ..
            } => Some(dead_end_configs),
            _ => None,
        }
    }
}

/// Result alias for recognition operations
pub type RecognitionResult<T> = Result<T, RecognitionError>;
