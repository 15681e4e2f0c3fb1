use crate::error::RecognitionError;
use crate::stream::IntStream;
use std::sync::Arc;

/// Receiver of lexer commands. Implemented by the lexer driver.
pub trait LexerControl {
    fn skip(&mut self);
    fn more(&mut self);
    fn set_type(&mut self, token_type: i32);
    fn set_channel(&mut self, channel: i32);
    fn set_mode(&mut self, mode: usize);
    fn push_mode(&mut self, mode: usize);
    /// Returns false when the mode stack is empty.
    fn pop_mode(&mut self) -> bool;
    /// Runs a grammar-embedded action.
    fn custom_action(&mut self, rule_index: usize, action_index: usize);
}

/// A lexer command attached to a token rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LexerAction {
    Channel(i32),
    Custom {
        rule_index: usize,
        action_index: usize,
    },
    Mode(usize),
    More,
    PopMode,
    PushMode(usize),
    Skip,
    Type(i32),
    /// A position-dependent action pinned to `offset` code points after the token start.
    Indexed {
        offset: usize,
        action: Box<LexerAction>,
    },
}

impl LexerAction {
    pub const CHANNEL: u16 = 0;
    pub const CUSTOM: u16 = 1;
    pub const MODE: u16 = 2;
    pub const MORE: u16 = 3;
    pub const POP_MODE: u16 = 4;
    pub const PUSH_MODE: u16 = 5;
    pub const SKIP: u16 = 6;
    pub const TYPE: u16 = 7;

    /// Position-dependent actions must run with the input at the position where
    /// they appear in the rule rather than at the end of the token.
    #[must_use]
    pub const fn is_position_dependent(&self) -> bool {
        matches!(self, Self::Custom { .. } | Self::Indexed { .. })
    }

    #[must_use]
    pub fn action_type(&self) -> u16 {
        match self {
            Self::Channel(_) => Self::CHANNEL,
            Self::Custom { .. } => Self::CUSTOM,
            Self::Mode(_) => Self::MODE,
            Self::More => Self::MORE,
            Self::PopMode => Self::POP_MODE,
            Self::PushMode(_) => Self::PUSH_MODE,
            Self::Skip => Self::SKIP,
            Self::Type(_) => Self::TYPE,
            Self::Indexed { action, .. } => action.action_type(),
        }
    }

    fn execute(&self, control: &mut dyn LexerControl, index: usize) -> Result<(), RecognitionError> {
        match self {
            Self::Channel(channel) => control.set_channel(*channel),
            Self::Custom {
                rule_index,
                action_index,
            } => control.custom_action(*rule_index, *action_index),
            Self::Mode(mode) => control.set_mode(*mode),
            Self::More => control.more(),
            Self::PopMode => {
                if !control.pop_mode() {
                    return Err(RecognitionError::ModeStackUnderflow { index });
                }
            }
            Self::PushMode(mode) => control.push_mode(*mode),
            Self::Skip => control.skip(),
            Self::Type(token_type) => control.set_type(*token_type),
            Self::Indexed { action, .. } => action.execute(control, index)?,
        }
        Ok(())
    }
}

/// The ordered list of actions to run when a token is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LexerActionExecutor {
    actions: Vec<LexerAction>,
}

impl LexerActionExecutor {
    #[must_use]
    pub fn new(actions: Vec<LexerAction>) -> Self {
        Self { actions }
    }

    #[must_use]
    pub fn actions(&self) -> &[LexerAction] {
        &self.actions
    }

    /// Returns a new executor with `action` appended to `executor`'s list.
    #[must_use]
    pub fn append(executor: Option<&Arc<LexerActionExecutor>>, action: LexerAction) -> Arc<Self> {
        let mut actions = executor.map(|e| e.actions.clone()).unwrap_or_default();
        actions.push(action);
        Arc::new(Self { actions })
    }

    /// Pins every position-dependent action that is not yet pinned to `offset`.
    ///
    /// Returns `self` unchanged when nothing needed pinning so DFA states keep sharing
    /// the same executor.
    #[must_use]
    pub fn fix_offset_before_match(self: &Arc<Self>, offset: usize) -> Arc<Self> {
        let needs_fix = self
            .actions
            .iter()
            .any(|a| a.is_position_dependent() && !matches!(a, LexerAction::Indexed { .. }));
        if !needs_fix {
            return Arc::clone(self);
        }
        let actions = self
            .actions
            .iter()
            .map(|a| match a {
                LexerAction::Indexed { .. } => a.clone(),
                _ if a.is_position_dependent() => LexerAction::Indexed {
                    offset,
                    action: Box::new(a.clone()),
                },
                _ => a.clone(),
            })
            .collect();
        Arc::new(Self { actions })
    }

    /// Runs the actions against `control`.
    ///
    /// Pinned actions run with `input` positioned at `start_index + offset`; the
    /// input is left at the token end afterwards.
    pub fn execute(
        &self,
        control: &mut dyn LexerControl,
        input: &mut dyn IntStream,
        start_index: usize,
    ) -> Result<(), RecognitionError> {
        let stop_index = input.index();
        let mut requires_seek = false;
        let mut result = Ok(());
        for action in &self.actions {
            match action {
                LexerAction::Indexed { offset, .. } => {
                    input.seek(start_index + offset);
                    requires_seek = start_index + offset != stop_index;
                }
                _ if action.is_position_dependent() => {
                    input.seek(stop_index);
                    requires_seek = false;
                }
                _ => {}
            }
            result = action.execute(control, stop_index);
            if result.is_err() {
                break;
            }
        }
        if requires_seek {
            input.seek(stop_index);
        }
        result
    }
}
