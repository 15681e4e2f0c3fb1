//! Shared hash-consing table for prediction contexts.

use super::{ContextRef, PredictionContext};
use dashmap::DashMap;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Contexts already canonicalized during one promotion pass, keyed by node address.
///
/// The value keeps the original node alive so its address cannot be reused
/// while the map exists.
pub type VisitedContexts = HashMap<usize, (ContextRef, ContextRef)>;

/// Process-wide table mapping every context to its canonical instance.
///
/// Insert-if-absent is atomic, so concurrent parses that build the same
/// context agree on one shared node.
#[derive(Debug, Default)]
pub struct PredictionContextCache {
    table: DashMap<ContextRef, ContextRef, ahash::RandomState>,
}

impl PredictionContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical instance for `ctx`, inserting it if absent.
    pub fn add(&self, ctx: &ContextRef) -> ContextRef {
        if ctx.is_empty() {
            return PredictionContext::empty();
        }
        Arc::clone(
            self.table
                .entry(Arc::clone(ctx))
                .or_insert_with(|| Arc::clone(ctx))
                .value(),
        )
    }

    #[must_use]
    pub fn get(&self, ctx: &ContextRef) -> Option<ContextRef> {
        self.table.get(ctx).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Rewrites `ctx` so that it and all its ancestors are canonical cache entries.
pub fn cached_context(
    ctx: &ContextRef,
    cache: &PredictionContextCache,
    visited: &mut VisitedContexts,
) -> ContextRef {
    if ctx.is_empty() {
        return Arc::clone(ctx);
    }
    let key = Arc::as_ptr(ctx) as usize;
    if let Some((_, done)) = visited.get(&key) {
        return Arc::clone(done);
    }
    if let Some(existing) = cache.get(ctx) {
        visited.insert(key, (Arc::clone(ctx), Arc::clone(&existing)));
        return existing;
    }

    let mut changed = false;
    let mut parents: SmallVec<[Option<ContextRef>; 2]> = SmallVec::with_capacity(ctx.len());
    for i in 0..ctx.len() {
        let original = ctx.parent(i);
        let parent = original.map(|p| cached_context(p, cache, visited));
        if let (Some(new), Some(old)) = (&parent, original) {
            if !Arc::ptr_eq(new, old) {
                changed = true;
            }
        }
        parents.push(parent);
    }

    if !changed {
        let canonical = cache.add(ctx);
        visited.insert(key, (Arc::clone(ctx), Arc::clone(&canonical)));
        return canonical;
    }

    let updated = if parents.len() == 1 {
        PredictionContext::from_parts(parents.pop().flatten(), ctx.return_state(0))
    } else {
        let return_states = (0..ctx.len()).map(|i| ctx.return_state(i)).collect();
        PredictionContext::array(parents, return_states)
    };
    let canonical = cache.add(&updated);
    visited.insert(
        Arc::as_ptr(&updated) as usize,
        (Arc::clone(&updated), Arc::clone(&canonical)),
    );
    visited.insert(key, (Arc::clone(ctx), Arc::clone(&canonical)));
    canonical
}
