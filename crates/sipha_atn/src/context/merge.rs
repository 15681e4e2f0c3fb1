use super::{ContextRef, PredictionContext, EMPTY_RETURN_STATE};
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::sync::Arc;

type Pairs = (SmallVec<[Option<ContextRef>; 2]>, SmallVec<[u32; 2]>);

/// Memo of merge results for one prediction, keyed by operand pair.
#[derive(Debug, Default)]
pub struct MergeCache {
    results: HashMap<(ContextRef, ContextRef), ContextRef>,
}

impl MergeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, a: &ContextRef, b: &ContextRef) -> Option<ContextRef> {
        self.results
            .get(&(Arc::clone(a), Arc::clone(b)))
            .or_else(|| self.results.get(&(Arc::clone(b), Arc::clone(a))))
            .cloned()
    }

    fn put(&mut self, a: &ContextRef, b: &ContextRef, result: &ContextRef) {
        self.results
            .insert((Arc::clone(a), Arc::clone(b)), Arc::clone(result));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn is_array(ctx: &PredictionContext) -> bool {
    matches!(ctx, PredictionContext::Array { .. })
}

/// Merges two stacks into one that represents both.
///
/// With `root_is_wildcard` (SLL prediction) `$` absorbs anything it is merged with.
/// Otherwise `$` is kept as an explicit alternative: `$ + x = [x, $]`.
/// Returns one of the operands whenever the result would equal it.
pub fn merge(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    cache: Option<&mut MergeCache>,
) -> ContextRef {
    if Arc::ptr_eq(a, b) || a == b {
        return Arc::clone(a);
    }
    if !is_array(a) && !is_array(b) {
        return merge_singletons(a, b, root_is_wildcard, cache);
    }
    if root_is_wildcard {
        if a.is_empty() {
            return Arc::clone(a);
        }
        if b.is_empty() {
            return Arc::clone(b);
        }
    }
    merge_arrays(a, b, root_is_wildcard, cache)
}

fn merge_root(a: &ContextRef, b: &ContextRef, root_is_wildcard: bool) -> Option<ContextRef> {
    if root_is_wildcard {
        if a.is_empty() || b.is_empty() {
            return Some(PredictionContext::empty());
        }
        return None;
    }
    // $ + x = [x, $]
    let other = match (a.is_empty(), b.is_empty()) {
        (true, true) => return Some(PredictionContext::empty()),
        (true, false) => b,
        (false, true) => a,
        (false, false) => return None,
    };
    let parents = SmallVec::from_iter([other.parent(0).cloned(), None]);
    let return_states = SmallVec::from_iter([other.return_state(0), EMPTY_RETURN_STATE]);
    Some(PredictionContext::array(parents, return_states))
}

fn merge_singletons(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    if let Some(previous) = cache.as_deref().and_then(|c| c.get(a, b)) {
        return previous;
    }
    if let Some(root) = merge_root(a, b, root_is_wildcard) {
        if let Some(c) = cache.as_deref_mut() {
            c.put(a, b, &root);
        }
        return root;
    }

    let (PredictionContext::Singleton {
        parent: a_parent,
        return_state: a_rs,
        ..
    }, PredictionContext::Singleton {
        parent: b_parent,
        return_state: b_rs,
        ..
    }) = (&**a, &**b)
    else {
        unreachable!("merge_root handles every empty operand");
    };

    if a_rs == b_rs {
        // ax + ay = a'[x,y]
        let parent = merge(a_parent, b_parent, root_is_wildcard, cache.as_deref_mut());
        if Arc::ptr_eq(&parent, a_parent) {
            return Arc::clone(a);
        }
        if Arc::ptr_eq(&parent, b_parent) {
            return Arc::clone(b);
        }
        let merged = PredictionContext::singleton(parent, *a_rs);
        if let Some(c) = cache {
            c.put(a, b, &merged);
        }
        return merged;
    }

    // ax + bx = [a,b]x, ax + by = [ax,by]
    let shared_parent = Arc::ptr_eq(a_parent, b_parent) || a_parent == b_parent;
    let (first, second) = if a_rs < b_rs {
        ((a_parent, *a_rs), (b_parent, *b_rs))
    } else {
        ((b_parent, *b_rs), (a_parent, *a_rs))
    };
    let parents: SmallVec<[Option<ContextRef>; 2]> = if shared_parent {
        SmallVec::from_iter([Some(Arc::clone(a_parent)), Some(Arc::clone(a_parent))])
    } else {
        SmallVec::from_iter([Some(Arc::clone(first.0)), Some(Arc::clone(second.0))])
    };
    let merged = PredictionContext::array(parents, SmallVec::from_iter([first.1, second.1]));
    if let Some(c) = cache {
        c.put(a, b, &merged);
    }
    merged
}

fn pairs(ctx: &PredictionContext) -> Pairs {
    match ctx {
        PredictionContext::Array {
            parents,
            return_states,
            ..
        } => (parents.clone(), return_states.clone()),
        _ => (
            SmallVec::from_iter([ctx.parent(0).cloned()]),
            SmallVec::from_iter([ctx.return_state(0)]),
        ),
    }
}

fn merge_arrays(
    a: &ContextRef,
    b: &ContextRef,
    root_is_wildcard: bool,
    mut cache: Option<&mut MergeCache>,
) -> ContextRef {
    if let Some(previous) = cache.as_deref().and_then(|c| c.get(a, b)) {
        return previous;
    }
    let (a_parents, a_states) = pairs(a);
    let (b_parents, b_states) = pairs(b);

    let capacity = a_states.len() + b_states.len();
    let mut parents: SmallVec<[Option<ContextRef>; 2]> = SmallVec::with_capacity(capacity);
    let mut states: SmallVec<[u32; 2]> = SmallVec::with_capacity(capacity);
    let (mut i, mut j) = (0, 0);
    while i < a_states.len() && j < b_states.len() {
        let a_parent = &a_parents[i];
        let b_parent = &b_parents[j];
        if a_states[i] == b_states[j] {
            let merged_parent = match (a_parent, b_parent) {
                (Some(x), Some(y)) if Arc::ptr_eq(x, y) || x == y => Some(Arc::clone(x)),
                (Some(x), Some(y)) => Some(merge(x, y, root_is_wildcard, cache.as_deref_mut())),
                (x, _) => x.clone(),
            };
            parents.push(merged_parent);
            states.push(a_states[i]);
            i += 1;
            j += 1;
        } else if a_states[i] < b_states[j] {
            parents.push(a_parent.clone());
            states.push(a_states[i]);
            i += 1;
        } else {
            parents.push(b_parent.clone());
            states.push(b_states[j]);
            j += 1;
        }
    }
    parents.extend(a_parents[i..].iter().cloned());
    states.extend_from_slice(&a_states[i..]);
    parents.extend(b_parents[j..].iter().cloned());
    states.extend_from_slice(&b_states[j..]);

    if states.len() == 1 {
        let single = PredictionContext::from_parts(parents.pop().flatten(), states[0]);
        if let Some(c) = cache {
            c.put(a, b, &single);
        }
        return single;
    }

    combine_common_parents(&mut parents);
    let merged = PredictionContext::array(parents, states);
    let result = if *merged == **a {
        Arc::clone(a)
    } else if *merged == **b {
        Arc::clone(b)
    } else {
        merged
    };
    if let Some(c) = cache {
        c.put(a, b, &result);
    }
    result
}

/// Makes value-equal parents within one array share a single node.
fn combine_common_parents(parents: &mut [Option<ContextRef>]) {
    let mut unique: HashMap<ContextRef, ContextRef> = HashMap::new();
    for parent in parents.iter_mut().flatten() {
        let canonical = unique
            .entry(Arc::clone(parent))
            .or_insert_with(|| Arc::clone(parent));
        *parent = Arc::clone(canonical);
    }
}
