use super::state::StateId;
use crate::misc::IntervalSet;
use crate::token::EOF;
use std::fmt;

/// What a transition matches, or which side effect it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// `outermost_precedence_return` is set on the derived return edge of a call into a
    /// left-recursive rule made with precedence 0, and names that rule.
    Epsilon {
        outermost_precedence_return: Option<usize>,
    },
    Range {
        start: i32,
        stop: i32,
    },
    /// Call of `rule_index`. The transition target is the callee's start state.
    Rule {
        rule_index: usize,
        precedence: i32,
        follow_state: StateId,
    },
    Predicate {
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    Atom {
        label: i32,
    },
    Action {
        rule_index: usize,
        action_index: Option<usize>,
        is_ctx_dependent: bool,
    },
    Set {
        set: IntervalSet,
    },
    NotSet {
        set: IntervalSet,
    },
    Wildcard,
    Precedence {
        precedence: i32,
    },
}

impl TransitionKind {
    pub const EPSILON: u16 = 1;
    pub const RANGE: u16 = 2;
    pub const RULE: u16 = 3;
    pub const PREDICATE: u16 = 4;
    pub const ATOM: u16 = 5;
    pub const ACTION: u16 = 6;
    pub const SET: u16 = 7;
    pub const NOT_SET: u16 = 8;
    pub const WILDCARD: u16 = 9;
    pub const PRECEDENCE: u16 = 10;

    #[must_use]
    pub const fn serialization_type(&self) -> u16 {
        match self {
            Self::Epsilon { .. } => Self::EPSILON,
            Self::Range { .. } => Self::RANGE,
            Self::Rule { .. } => Self::RULE,
            Self::Predicate { .. } => Self::PREDICATE,
            Self::Atom { .. } => Self::ATOM,
            Self::Action { .. } => Self::ACTION,
            Self::Set { .. } => Self::SET,
            Self::NotSet { .. } => Self::NOT_SET,
            Self::Wildcard => Self::WILDCARD,
            Self::Precedence { .. } => Self::PRECEDENCE,
        }
    }
}

/// A labeled edge of the ATN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition {
    pub target: StateId,
    pub kind: TransitionKind,
}

impl Transition {
    #[must_use]
    pub const fn new(target: StateId, kind: TransitionKind) -> Self {
        Self { target, kind }
    }

    #[must_use]
    pub const fn epsilon(target: StateId) -> Self {
        Self::new(
            target,
            TransitionKind::Epsilon {
                outermost_precedence_return: None,
            },
        )
    }

    #[must_use]
    pub const fn atom(target: StateId, label: i32) -> Self {
        Self::new(target, TransitionKind::Atom { label })
    }

    /// Epsilon transitions do not consume input: plain epsilon, rule calls,
    /// predicates, actions and precedence predicates.
    #[must_use]
    pub const fn is_epsilon(&self) -> bool {
        matches!(
            self.kind,
            TransitionKind::Epsilon { .. }
                | TransitionKind::Rule { .. }
                | TransitionKind::Predicate { .. }
                | TransitionKind::Action { .. }
                | TransitionKind::Precedence { .. }
        )
    }

    /// Whether `symbol` is consumed by this transition, given the vocabulary bounds
    /// used to interpret wildcards and negated sets.
    #[must_use]
    pub fn matches(&self, symbol: i32, min_vocabulary: i32, max_vocabulary: i32) -> bool {
        match &self.kind {
            TransitionKind::Atom { label } => *label == symbol,
            TransitionKind::Range { start, stop } => *start <= symbol && symbol <= *stop,
            TransitionKind::Set { set } => set.contains(symbol),
            TransitionKind::NotSet { set } => {
                symbol >= min_vocabulary && symbol <= max_vocabulary && !set.contains(symbol)
            }
            TransitionKind::Wildcard => symbol >= min_vocabulary && symbol <= max_vocabulary,
            _ => false,
        }
    }

    /// Symbols matched by a labeled transition. Negated sets return the excluded symbols.
    #[must_use]
    pub fn label(&self) -> Option<IntervalSet> {
        match &self.kind {
            TransitionKind::Atom { label } => Some(IntervalSet::of(*label)),
            TransitionKind::Range { start, stop } => Some(IntervalSet::of_range(*start, *stop)),
            TransitionKind::Set { set } | TransitionKind::NotSet { set } => Some(set.clone()),
            _ => None,
        }
    }

    /// True if the transition can match the EOF symbol.
    #[must_use]
    pub fn matches_eof(&self) -> bool {
        match &self.kind {
            TransitionKind::Atom { label } => *label == EOF,
            TransitionKind::Range { start, stop } => *start <= EOF && EOF <= *stop,
            TransitionKind::Set { set } => set.contains(EOF),
            _ => false,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TransitionKind::Epsilon { .. } => write!(f, "ε->{}", self.target),
            TransitionKind::Range { start, stop } => write!(f, "{start}..{stop}->{}", self.target),
            TransitionKind::Rule { rule_index, .. } => {
                write!(f, "rule {rule_index}->{}", self.target)
            }
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                ..
            } => write!(f, "pred_{rule_index}:{pred_index}->{}", self.target),
            TransitionKind::Atom { label } => write!(f, "{label}->{}", self.target),
            TransitionKind::Action {
                rule_index,
                action_index,
                ..
            } => match action_index {
                Some(action) => write!(f, "action_{rule_index}:{action}->{}", self.target),
                None => write!(f, "action_{rule_index}->{}", self.target),
            },
            TransitionKind::Set { set } => write!(f, "{set}->{}", self.target),
            TransitionKind::NotSet { set } => write!(f, "~{set}->{}", self.target),
            TransitionKind::Wildcard => write!(f, ".->{}", self.target),
            TransitionKind::Precedence { precedence } => {
                write!(f, "{precedence} >= _p->{}", self.target)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_set_respects_vocabulary_bounds() {
        let t = Transition::new(
            StateId(1),
            TransitionKind::NotSet {
                set: IntervalSet::of_range(2, 3),
            },
        );
        assert!(t.matches(1, 1, 5));
        assert!(!t.matches(2, 1, 5));
        assert!(!t.matches(6, 1, 5));
        assert!(!t.matches(EOF, 1, 5), "EOF is outside any vocabulary");
    }

    #[test]
    fn test_epsilon_classification() {
        let rule = Transition::new(
            StateId(3),
            TransitionKind::Rule {
                rule_index: 0,
                precedence: 0,
                follow_state: StateId(4),
            },
        );
        assert!(rule.is_epsilon());
        assert!(!Transition::atom(StateId(1), 5).is_epsilon());
        assert!(Transition::atom(StateId(1), EOF).matches_eof());
    }
}
