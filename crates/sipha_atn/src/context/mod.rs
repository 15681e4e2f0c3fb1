//! # Prediction Contexts
//!
//! A prediction context is a graph-structured call stack: each node holds one or more
//! return states, each paired with a parent context. Contexts are immutable and shared
//! through [`Arc`], so many configurations can point at the same stack suffix.
//!
//! The empty context `$` is the bottom of every stack. When prediction runs without
//! knowledge of the real caller (SLL), `$` stands for "any caller"; during
//! full-context prediction it means "the start rule returned".
//!
//! ```rust
//! use sipha_atn::context::{merge, PredictionContext};
//!
//! let empty = PredictionContext::empty();
//! let a = PredictionContext::singleton(empty.clone(), 5);
//! let b = PredictionContext::singleton(empty.clone(), 9);
//! let merged = merge(&a, &b, true, None);
//! assert_eq!(merged.len(), 2);
//! assert_eq!(merged.return_state(0), 5);
//! assert_eq!(merged.return_state(1), 9);
//! ```

mod cache;
mod merge;

pub use cache::{cached_context, PredictionContextCache, VisitedContexts};
pub use merge::{merge, MergeCache};

use crate::atn::{Atn, StateId, TransitionKind};
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Return state marking the bottom of a stack.
pub const EMPTY_RETURN_STATE: u32 = u32::MAX;

/// Shared handle to a context node.
pub type ContextRef = Arc<PredictionContext>;

static EMPTY: Lazy<ContextRef> = Lazy::new(|| Arc::new(PredictionContext::Empty));

/// A node of the graph-structured stack.
#[derive(Debug)]
pub enum PredictionContext {
    /// `$`, the bottom of the stack.
    Empty,
    /// One return state over one parent.
    Singleton {
        parent: ContextRef,
        return_state: u32,
        hash: u64,
    },
    /// Several return states, sorted ascending. A `$` entry has no parent and,
    /// because [`EMPTY_RETURN_STATE`] is the largest value, always sorts last.
    Array {
        parents: SmallVec<[Option<ContextRef>; 2]>,
        return_states: SmallVec<[u32; 2]>,
        hash: u64,
    },
}

fn hasher() -> ahash::AHasher {
    ahash::AHasher::default()
}

fn parent_hash(parent: Option<&ContextRef>) -> u64 {
    parent.map_or(0, |p| p.cached_hash())
}

const EMPTY_HASH: u64 = 0x9E37_79B9_7F4A_7C15;

impl PredictionContext {
    /// The shared `$` context.
    #[must_use]
    pub fn empty() -> ContextRef {
        Arc::clone(&EMPTY)
    }

    /// Pushes `return_state` on `parent`.
    #[must_use]
    pub fn singleton(parent: ContextRef, return_state: u32) -> ContextRef {
        let mut h = hasher();
        1u8.hash(&mut h);
        parent.cached_hash().hash(&mut h);
        return_state.hash(&mut h);
        Arc::new(Self::Singleton {
            hash: h.finish(),
            parent,
            return_state,
        })
    }

    /// Like [`singleton`](Self::singleton) but accepts the `$` pair `(None, EMPTY_RETURN_STATE)`.
    #[must_use]
    pub fn from_parts(parent: Option<ContextRef>, return_state: u32) -> ContextRef {
        match parent {
            None => Self::empty(),
            Some(p) => Self::singleton(p, return_state),
        }
    }

    /// Builds an array node. Callers keep `return_states` sorted and pass at least two entries.
    pub(crate) fn array(
        parents: SmallVec<[Option<ContextRef>; 2]>,
        return_states: SmallVec<[u32; 2]>,
    ) -> ContextRef {
        debug_assert_eq!(parents.len(), return_states.len());
        debug_assert!(return_states.windows(2).all(|w| w[0] <= w[1]));
        let mut h = hasher();
        2u8.hash(&mut h);
        for p in &parents {
            parent_hash(p.as_ref()).hash(&mut h);
        }
        return_states.hash(&mut h);
        Arc::new(Self::Array {
            hash: h.finish(),
            parents,
            return_states,
        })
    }

    #[must_use]
    pub const fn cached_hash(&self) -> u64 {
        match self {
            Self::Empty => EMPTY_HASH,
            Self::Singleton { hash, .. } | Self::Array { hash, .. } => *hash,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Number of (parent, return state) pairs. `$` counts as one pair.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Empty | Self::Singleton { .. } => 1,
            Self::Array { return_states, .. } => return_states.len(),
        }
    }

    #[must_use]
    pub fn return_state(&self, index: usize) -> u32 {
        match self {
            Self::Empty => EMPTY_RETURN_STATE,
            Self::Singleton { return_state, .. } => *return_state,
            Self::Array { return_states, .. } => return_states[index],
        }
    }

    /// Parent of pair `index`; `None` for a `$` entry.
    #[must_use]
    pub fn parent(&self, index: usize) -> Option<&ContextRef> {
        match self {
            Self::Empty => None,
            Self::Singleton { parent, .. } => Some(parent),
            Self::Array { parents, .. } => parents[index].as_ref(),
        }
    }

    /// True when some path through the stack ends at `$` right here.
    #[must_use]
    pub fn has_empty_path(&self) -> bool {
        self.return_state(self.len() - 1) == EMPTY_RETURN_STATE
    }

    /// Number of distinct nodes reachable from this one, itself included.
    #[must_use]
    pub fn node_count(self: &Arc<Self>) -> usize {
        let mut seen = hashbrown::HashSet::new();
        let mut stack = vec![Arc::clone(self)];
        while let Some(ctx) = stack.pop() {
            if !seen.insert(Arc::as_ptr(&ctx) as usize) {
                continue;
            }
            for i in 0..ctx.len() {
                if let Some(p) = ctx.parent(i) {
                    stack.push(Arc::clone(p));
                }
            }
        }
        seen.len()
    }
}

fn same(a: &ContextRef, b: &ContextRef) -> bool {
    Arc::ptr_eq(a, b) || **a == **b
}

impl PartialEq for PredictionContext {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.cached_hash() != other.cached_hash() {
            return false;
        }
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (
                Self::Singleton {
                    parent: pa,
                    return_state: ra,
                    ..
                },
                Self::Singleton {
                    parent: pb,
                    return_state: rb,
                    ..
                },
            ) => ra == rb && same(pa, pb),
            (
                Self::Array {
                    parents: pa,
                    return_states: ra,
                    ..
                },
                Self::Array {
                    parents: pb,
                    return_states: rb,
                    ..
                },
            ) => {
                ra == rb
                    && pa.iter().zip(pb.iter()).all(|(a, b)| match (a, b) {
                        (None, None) => true,
                        (Some(a), Some(b)) => same(a, b),
                        _ => false,
                    })
            }
            _ => false,
        }
    }
}

impl Eq for PredictionContext {}

impl Hash for PredictionContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash());
    }
}

impl fmt::Display for PredictionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("$"),
            Self::Singleton {
                parent,
                return_state,
                ..
            } => {
                if parent.is_empty() {
                    write!(f, "{return_state}")
                } else {
                    write!(f, "{return_state} {parent}")
                }
            }
            Self::Array {
                parents,
                return_states,
                ..
            } => {
                f.write_str("[")?;
                for (i, (rs, p)) in return_states.iter().zip(parents.iter()).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if *rs == EMPTY_RETURN_STATE {
                        f.write_str("$")?;
                        continue;
                    }
                    write!(f, "{rs}")?;
                    if let Some(p) = p {
                        if !p.is_empty() {
                            write!(f, " {p}")?;
                        }
                    }
                }
                f.write_str("]")
            }
        }
    }
}

/// Builds the context for an invocation stack.
///
/// `invoking_states` lists the states that made each active rule call, innermost
/// first. Each contributes the follow state of its rule transition. An empty slice
/// gives `$`.
#[must_use]
pub fn from_invocation_stack(atn: &Atn, invoking_states: &[StateId]) -> ContextRef {
    let mut context = PredictionContext::empty();
    for &invoking in invoking_states.iter().rev() {
        let follow = atn
            .state(invoking)
            .transitions()
            .first()
            .and_then(|t| match t.kind {
                TransitionKind::Rule { follow_state, .. } => Some(follow_state),
                _ => None,
            });
        match follow {
            Some(follow) => context = PredictionContext::singleton(context, follow.0),
            None => tracing::warn!(
                state = invoking.0,
                "invoking state has no rule transition; ignoring frame"
            ),
        }
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = PredictionContext::singleton(PredictionContext::empty(), 3);
        let b = PredictionContext::singleton(PredictionContext::empty(), 3);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_eq!(a.cached_hash(), b.cached_hash());
        let c = PredictionContext::singleton(PredictionContext::empty(), 4);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_context_shape() {
        let empty = PredictionContext::empty();
        assert!(empty.is_empty());
        assert!(empty.has_empty_path());
        assert_eq!(empty.len(), 1);
        assert_eq!(empty.return_state(0), EMPTY_RETURN_STATE);
        assert!(empty.parent(0).is_none());
        assert!(Arc::ptr_eq(&empty, &PredictionContext::empty()));
    }

    #[test]
    fn test_display() {
        let inner = PredictionContext::singleton(PredictionContext::empty(), 7);
        let outer = PredictionContext::singleton(inner, 2);
        assert_eq!(outer.to_string(), "2 7");
        assert_eq!(outer.node_count(), 3);
    }
}
