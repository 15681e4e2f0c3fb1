//! # Semantic Contexts
//!
//! Boolean expressions over grammar predicates, attached to configurations that
//! passed through `{...}?` or `{precpred(...)}?` transitions. Operands of
//! conjunctions and disjunctions are flattened, deduplicated and kept in a canonical
//! order, so two contexts built from the same predicates compare equal.

use crate::recognizer::Recognizer;
use std::fmt;
use std::sync::Arc;

/// A predicate expression, evaluated against a [`Recognizer`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SemanticContext {
    /// Always true.
    Empty,
    Predicate {
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    /// `precedence >= current precedence level`.
    Precedence { precedence: i32 },
    And(Arc<[SemanticContext]>),
    Or(Arc<[SemanticContext]>),
}

impl Default for SemanticContext {
    fn default() -> Self {
        Self::NONE
    }
}

fn push_operand(operands: &mut Vec<SemanticContext>, ctx: &SemanticContext, and: bool) {
    match ctx {
        SemanticContext::And(inner) if and => operands.extend(inner.iter().cloned()),
        SemanticContext::Or(inner) if !and => operands.extend(inner.iter().cloned()),
        other => operands.push(other.clone()),
    }
}

/// Sorts, dedups and collapses precedence predicates into one: the lowest for a
/// conjunction, the highest for a disjunction.
fn normalize(mut operands: Vec<SemanticContext>, and: bool) -> Vec<SemanticContext> {
    let reduced = operands
        .iter()
        .filter_map(|o| match o {
            SemanticContext::Precedence { precedence } => Some(*precedence),
            _ => None,
        })
        .reduce(|a, b| if and { a.min(b) } else { a.max(b) });
    if let Some(precedence) = reduced {
        operands.retain(|o| !matches!(o, SemanticContext::Precedence { .. }));
        operands.push(SemanticContext::Precedence { precedence });
    }
    operands.sort();
    operands.dedup();
    operands
}

impl SemanticContext {
    /// The always-true context.
    pub const NONE: SemanticContext = SemanticContext::Empty;

    #[must_use]
    pub const fn predicate(rule_index: usize, pred_index: usize, is_ctx_dependent: bool) -> Self {
        Self::Predicate {
            rule_index,
            pred_index,
            is_ctx_dependent,
        }
    }

    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// `a && b`. `NONE` is the identity.
    #[must_use]
    pub fn and(a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if a.is_none() {
            return b.clone();
        }
        if b.is_none() || a == b {
            return a.clone();
        }
        let mut operands = Vec::new();
        push_operand(&mut operands, a, true);
        push_operand(&mut operands, b, true);
        let mut operands = normalize(operands, true);
        if operands.len() == 1 {
            return operands.remove(0);
        }
        Self::And(operands.into())
    }

    /// `a || b`. `NONE` absorbs the other side.
    #[must_use]
    pub fn or(a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if a.is_none() || b.is_none() {
            return Self::NONE;
        }
        if a == b {
            return a.clone();
        }
        let mut operands = Vec::new();
        push_operand(&mut operands, a, false);
        push_operand(&mut operands, b, false);
        let mut operands = normalize(operands, false);
        if operands.len() == 1 {
            return operands.remove(0);
        }
        Self::Or(operands.into())
    }

    /// Evaluates the expression with the recognizer's current state.
    pub fn evaluate(&self, recognizer: &mut dyn Recognizer) -> bool {
        match self {
            Self::Empty => true,
            Self::Predicate {
                rule_index,
                pred_index,
                is_ctx_dependent,
            } => recognizer.sempred(*rule_index, *pred_index, *is_ctx_dependent),
            Self::Precedence { precedence } => recognizer.precpred(*precedence),
            Self::And(operands) => operands.iter().all(|o| o.evaluate(recognizer)),
            Self::Or(operands) => operands.iter().any(|o| o.evaluate(recognizer)),
        }
    }

    /// Evaluates only the precedence predicates, leaving the rest in place.
    ///
    /// Returns `None` when the expression is known to be false, and `NONE` when it is
    /// known to be true.
    pub fn eval_precedence(&self, recognizer: &mut dyn Recognizer) -> Option<SemanticContext> {
        match self {
            Self::Empty | Self::Predicate { .. } => Some(self.clone()),
            Self::Precedence { precedence } => recognizer.precpred(*precedence).then_some(Self::NONE),
            Self::And(operands) => {
                let mut differs = false;
                let mut kept = Vec::new();
                for operand in operands.iter() {
                    let evaluated = operand.eval_precedence(recognizer)?;
                    differs |= evaluated != *operand;
                    if !evaluated.is_none() {
                        kept.push(evaluated);
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                Some(kept.iter().fold(Self::NONE, |acc, o| Self::and(&acc, o)))
            }
            Self::Or(operands) => {
                let mut differs = false;
                let mut kept = Vec::new();
                for operand in operands.iter() {
                    match operand.eval_precedence(recognizer) {
                        Some(evaluated) if evaluated.is_none() => return Some(Self::NONE),
                        Some(evaluated) => {
                            differs |= evaluated != *operand;
                            kept.push(evaluated);
                        }
                        None => differs = true,
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                let mut iter = kept.into_iter();
                let first = iter.next()?;
                Some(iter.fold(first, |acc, o| Self::or(&acc, &o)))
            }
        }
    }

    /// Whether any predicate in the expression depends on the rule context.
    #[must_use]
    pub fn is_ctx_dependent(&self) -> bool {
        match self {
            Self::Predicate {
                is_ctx_dependent, ..
            } => *is_ctx_dependent,
            Self::And(operands) | Self::Or(operands) => operands.iter().any(Self::is_ctx_dependent),
            Self::Empty | Self::Precedence { .. } => false,
        }
    }
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, operands: &[SemanticContext], sep: &str| {
            for (i, o) in operands.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                write!(f, "{o}")?;
            }
            Ok(())
        };
        match self {
            Self::Empty => f.write_str("{true}?"),
            Self::Predicate {
                rule_index,
                pred_index,
                is_ctx_dependent,
            } => {
                let ctx = if *is_ctx_dependent { "@" } else { "" };
                write!(f, "{{{rule_index}:{pred_index}}}?{ctx}")
            }
            Self::Precedence { precedence } => write!(f, "{{{precedence}>=prec}}?"),
            Self::And(operands) => join(f, operands, "&&"),
            Self::Or(operands) => join(f, operands, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Preds(Vec<bool>, i32);

    impl Recognizer for Preds {
        fn sempred(&mut self, _rule: usize, pred: usize, _ctx: bool) -> bool {
            self.0[pred]
        }

        fn precedence(&self) -> i32 {
            self.1
        }
    }

    fn p(i: usize) -> SemanticContext {
        SemanticContext::predicate(0, i, false)
    }

    #[test]
    fn test_and_or_identities() {
        let a = p(0);
        assert_eq!(SemanticContext::and(&SemanticContext::NONE, &a), a);
        assert_eq!(SemanticContext::or(&SemanticContext::NONE, &a), SemanticContext::NONE);
        assert_eq!(SemanticContext::and(&a, &a), a);
    }

    #[test]
    fn test_operands_are_canonical() {
        let ab = SemanticContext::and(&p(0), &p(1));
        let ba = SemanticContext::and(&p(1), &p(0));
        assert_eq!(ab, ba);
        let nested = SemanticContext::and(&ab, &p(0));
        assert_eq!(nested, ab);
    }

    #[test]
    fn test_precedence_reduction() {
        let lo = SemanticContext::Precedence { precedence: 2 };
        let hi = SemanticContext::Precedence { precedence: 5 };
        assert_eq!(SemanticContext::and(&lo, &hi), lo);
        assert_eq!(SemanticContext::or(&lo, &hi), hi);
    }

    #[test]
    fn test_evaluate() {
        let mut r = Preds(vec![true, false], 0);
        assert!(p(0).evaluate(&mut r));
        assert!(!SemanticContext::and(&p(0), &p(1)).evaluate(&mut r));
        assert!(SemanticContext::or(&p(0), &p(1)).evaluate(&mut r));
    }

    #[test]
    fn test_eval_precedence() {
        let mut r = Preds(vec![true], 3);
        let pass = SemanticContext::Precedence { precedence: 4 };
        let fail = SemanticContext::Precedence { precedence: 1 };
        assert_eq!(pass.eval_precedence(&mut r), Some(SemanticContext::NONE));
        assert_eq!(fail.eval_precedence(&mut r), None);
        let mixed = SemanticContext::and(&pass, &p(0));
        assert_eq!(mixed.eval_precedence(&mut r), Some(p(0)));
        let either = SemanticContext::or(&fail, &p(0));
        assert_eq!(either.eval_precedence(&mut r), Some(p(0)));
    }
}
