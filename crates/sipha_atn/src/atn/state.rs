use super::transition::Transition;
use crate::misc::IntervalSet;
use once_cell::sync::OnceCell;
use std::fmt;

/// Index of a state in [`super::Atn::states`].
///
/// Uses u32 which is sufficient for all practical ATN sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(pub u32);

impl StateId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The structural role of a state, with the links that role needs.
///
/// Links are `Option` because the deserializer and [`super::AtnBuilder`] resolve them
/// in a second pass; a verified ATN has every required link set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    /// Placeholder for a state slot the grammar compiler removed.
    Invalid,
    Basic,
    RuleStart {
        stop_state: Option<StateId>,
        is_left_recursive: bool,
    },
    /// Start of a `( ... | ... )` block.
    BlockStart { end_state: Option<StateId> },
    /// Start of the block inside `( ... )+`.
    PlusBlockStart {
        end_state: Option<StateId>,
        loop_back_state: Option<StateId>,
    },
    /// Start of the block inside `( ... )*`.
    StarBlockStart { end_state: Option<StateId> },
    /// Decision over all token rules of one lexer mode.
    TokensStart,
    RuleStop,
    BlockEnd { start_state: Option<StateId> },
    StarLoopBack,
    StarLoopEntry {
        loop_back_state: Option<StateId>,
        is_precedence_decision: bool,
    },
    PlusLoopBack,
    LoopEnd { loop_back_state: Option<StateId> },
}

impl StateKind {
    pub const INVALID: u16 = 0;
    pub const BASIC: u16 = 1;
    pub const RULE_START: u16 = 2;
    pub const BLOCK_START: u16 = 3;
    pub const PLUS_BLOCK_START: u16 = 4;
    pub const STAR_BLOCK_START: u16 = 5;
    pub const TOKEN_START: u16 = 6;
    pub const RULE_STOP: u16 = 7;
    pub const BLOCK_END: u16 = 8;
    pub const STAR_LOOP_BACK: u16 = 9;
    pub const STAR_LOOP_ENTRY: u16 = 10;
    pub const PLUS_LOOP_BACK: u16 = 11;
    pub const LOOP_END: u16 = 12;

    /// Builds a kind with unresolved links from its serialized type code.
    #[must_use]
    pub const fn from_serialized(code: u16) -> Option<Self> {
        Some(match code {
            Self::INVALID => Self::Invalid,
            Self::BASIC => Self::Basic,
            Self::RULE_START => Self::RuleStart {
                stop_state: None,
                is_left_recursive: false,
            },
            Self::BLOCK_START => Self::BlockStart { end_state: None },
            Self::PLUS_BLOCK_START => Self::PlusBlockStart {
                end_state: None,
                loop_back_state: None,
            },
            Self::STAR_BLOCK_START => Self::StarBlockStart { end_state: None },
            Self::TOKEN_START => Self::TokensStart,
            Self::RULE_STOP => Self::RuleStop,
            Self::BLOCK_END => Self::BlockEnd { start_state: None },
            Self::STAR_LOOP_BACK => Self::StarLoopBack,
            Self::STAR_LOOP_ENTRY => Self::StarLoopEntry {
                loop_back_state: None,
                is_precedence_decision: false,
            },
            Self::PLUS_LOOP_BACK => Self::PlusLoopBack,
            Self::LOOP_END => Self::LoopEnd {
                loop_back_state: None,
            },
            _ => return None,
        })
    }

    #[must_use]
    pub const fn serialization_type(&self) -> u16 {
        match self {
            Self::Invalid => Self::INVALID,
            Self::Basic => Self::BASIC,
            Self::RuleStart { .. } => Self::RULE_START,
            Self::BlockStart { .. } => Self::BLOCK_START,
            Self::PlusBlockStart { .. } => Self::PLUS_BLOCK_START,
            Self::StarBlockStart { .. } => Self::STAR_BLOCK_START,
            Self::TokensStart => Self::TOKEN_START,
            Self::RuleStop => Self::RULE_STOP,
            Self::BlockEnd { .. } => Self::BLOCK_END,
            Self::StarLoopBack => Self::STAR_LOOP_BACK,
            Self::StarLoopEntry { .. } => Self::STAR_LOOP_ENTRY,
            Self::PlusLoopBack => Self::PLUS_LOOP_BACK,
            Self::LoopEnd { .. } => Self::LOOP_END,
        }
    }

    /// States where more than one outgoing transition is a choice point.
    #[must_use]
    pub const fn is_decision_kind(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. }
                | Self::PlusBlockStart { .. }
                | Self::StarBlockStart { .. }
                | Self::TokensStart
                | Self::StarLoopEntry { .. }
                | Self::PlusLoopBack
        )
    }

    #[must_use]
    pub const fn is_block_start(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. } | Self::PlusBlockStart { .. } | Self::StarBlockStart { .. }
        )
    }

    /// End state of a block start, if this is one.
    #[must_use]
    pub const fn block_end_state(&self) -> Option<StateId> {
        match self {
            Self::BlockStart { end_state }
            | Self::PlusBlockStart { end_state, .. }
            | Self::StarBlockStart { end_state } => *end_state,
            _ => None,
        }
    }
}

/// A node of the ATN.
#[derive(Debug, Clone)]
pub struct AtnState {
    pub(crate) id: StateId,
    pub(crate) rule_index: Option<usize>,
    pub(crate) kind: StateKind,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) epsilon_only_transitions: bool,
    pub(crate) decision: Option<usize>,
    pub(crate) non_greedy: bool,
    pub(crate) next_token_within_rule: OnceCell<IntervalSet>,
}

impl AtnState {
    #[must_use]
    pub fn new(id: StateId, kind: StateKind, rule_index: Option<usize>) -> Self {
        Self {
            id,
            rule_index,
            kind,
            transitions: Vec::new(),
            epsilon_only_transitions: false,
            decision: None,
            non_greedy: false,
            next_token_within_rule: OnceCell::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> StateId {
        self.id
    }

    /// Rule the state belongs to. `None` for lexer mode start states.
    #[must_use]
    pub const fn rule_index(&self) -> Option<usize> {
        self.rule_index
    }

    #[must_use]
    pub const fn kind(&self) -> &StateKind {
        &self.kind
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[must_use]
    pub fn transition(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    /// True when every outgoing transition is epsilon. False for states with no transitions.
    #[must_use]
    pub const fn epsilon_only_transitions(&self) -> bool {
        self.epsilon_only_transitions
    }

    /// Decision number, for decision states registered with the ATN.
    #[must_use]
    pub const fn decision(&self) -> Option<usize> {
        self.decision
    }

    #[must_use]
    pub const fn is_non_greedy(&self) -> bool {
        self.non_greedy
    }

    #[must_use]
    pub const fn is_rule_stop(&self) -> bool {
        matches!(self.kind, StateKind::RuleStop)
    }

    #[must_use]
    pub const fn is_decision_state(&self) -> bool {
        self.kind.is_decision_kind()
    }

    #[must_use]
    pub const fn is_precedence_decision(&self) -> bool {
        matches!(
            self.kind,
            StateKind::StarLoopEntry {
                is_precedence_decision: true,
                ..
            }
        )
    }

    pub(crate) fn add_transition(&mut self, transition: Transition) {
        if self.transitions.is_empty() {
            self.epsilon_only_transitions = transition.is_epsilon();
        } else if self.epsilon_only_transitions != transition.is_epsilon() {
            tracing::warn!(
                state = self.id.0,
                "ATN state has both epsilon and non-epsilon transitions"
            );
            self.epsilon_only_transitions = false;
        }
        let duplicate = self
            .transitions
            .iter()
            .any(|t| t.target == transition.target && t.kind == transition.kind);
        if !duplicate {
            self.transitions.push(transition);
        }
    }

    pub(crate) fn remove_last_transition(&mut self) -> Option<Transition> {
        let removed = self.transitions.pop();
        if self.transitions.is_empty() {
            self.epsilon_only_transitions = false;
        }
        removed
    }
}
