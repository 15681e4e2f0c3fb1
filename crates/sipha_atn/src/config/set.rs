use super::AtnConfig;
use crate::atn::StateId;
use crate::context::{cached_context, merge, MergeCache, PredictionContextCache, VisitedContexts};
use crate::misc::AltSet;
use crate::semantic::SemanticContext;
use hashbrown::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Lookup {
    /// Configurations differing only in context share one entry whose context is
    /// the merge of both.
    Merging(HashMap<(StateId, usize, SemanticContext), usize>),
    /// Exact duplicates are dropped; insertion order is preserved. Used by the lexer,
    /// where order decides which rule wins.
    Exact(HashSet<AtnConfig>),
}

/// A deduplicating collection of configurations.
#[derive(Debug, Clone)]
pub struct AtnConfigSet {
    configs: Vec<AtnConfig>,
    lookup: Lookup,
    full_ctx: bool,
    unique_alt: Option<usize>,
    conflicting_alts: Option<AltSet>,
    has_semantic_context: bool,
    dips_into_outer_context: bool,
    read_only: bool,
    cached_hash: Option<u64>,
}

impl AtnConfigSet {
    /// A merging set. `full_ctx` selects full-context merge rules for `$`.
    #[must_use]
    pub fn new(full_ctx: bool) -> Self {
        Self {
            configs: Vec::new(),
            lookup: Lookup::Merging(HashMap::new()),
            full_ctx,
            unique_alt: None,
            conflicting_alts: None,
            has_semantic_context: false,
            dips_into_outer_context: false,
            read_only: false,
            cached_hash: None,
        }
    }

    /// An insertion-ordered set that only drops exact duplicates.
    #[must_use]
    pub fn new_ordered() -> Self {
        Self {
            lookup: Lookup::Exact(HashSet::new()),
            ..Self::new(false)
        }
    }

    /// An empty set with the same mode and merge rules as `self`.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        match self.lookup {
            Lookup::Merging(_) => Self::new(self.full_ctx),
            Lookup::Exact(_) => Self::new_ordered(),
        }
    }

    /// Adds `config`, merging its context into an existing entry when one matches.
    ///
    /// Returns true when a new entry was created.
    ///
    /// # Panics
    ///
    /// Panics if the set has been frozen into a DFA state.
    pub fn add(&mut self, config: AtnConfig, merge_cache: Option<&mut MergeCache>) -> bool {
        assert!(!self.read_only, "configuration set is frozen");
        if !config.semantic_context.is_none() {
            self.has_semantic_context = true;
        }
        if config.reaches_into_outer_context > 0 {
            self.dips_into_outer_context = true;
        }
        match &mut self.lookup {
            Lookup::Merging(index) => {
                let key = (config.state, config.alt, config.semantic_context.clone());
                if let Some(&i) = index.get(&key) {
                    let existing = &mut self.configs[i];
                    let root_is_wildcard = !self.full_ctx;
                    existing.context = merge(&existing.context, &config.context, root_is_wildcard, merge_cache);
                    existing.reaches_into_outer_context = existing
                        .reaches_into_outer_context
                        .max(config.reaches_into_outer_context);
                    existing.precedence_filter_suppressed |= config.precedence_filter_suppressed;
                    return false;
                }
                index.insert(key, self.configs.len());
            }
            Lookup::Exact(seen) => {
                if !seen.insert(config.clone()) {
                    return false;
                }
            }
        }
        self.configs.push(config);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    #[must_use]
    pub fn configs(&self) -> &[AtnConfig] {
        &self.configs
    }

    /// Every alternative that appears in the set.
    #[must_use]
    pub fn alts(&self) -> AltSet {
        self.configs.iter().map(|c| c.alt).collect()
    }

    #[must_use]
    pub fn states(&self) -> HashSet<StateId> {
        self.configs.iter().map(|c| c.state).collect()
    }

    /// Non-trivial semantic contexts, in configuration order.
    #[must_use]
    pub fn predicates(&self) -> Vec<SemanticContext> {
        self.configs
            .iter()
            .filter(|c| !c.semantic_context.is_none())
            .map(|c| c.semantic_context.clone())
            .collect()
    }

    /// Replaces every context with its canonical instance from `cache`.
    pub fn optimize_configs(&mut self, cache: &PredictionContextCache) {
        if self.read_only || self.configs.is_empty() {
            return;
        }
        let mut visited = VisitedContexts::new();
        for config in &mut self.configs {
            config.context = cached_context(&config.context, cache, &mut visited);
        }
    }

    /// Makes the set immutable and fixes its hash.
    pub fn freeze(&mut self) {
        if self.read_only {
            return;
        }
        self.cached_hash = Some(self.compute_hash());
        self.read_only = true;
        match &mut self.lookup {
            Lookup::Merging(index) => *index = HashMap::new(),
            Lookup::Exact(seen) => *seen = HashSet::new(),
        }
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub const fn full_ctx(&self) -> bool {
        self.full_ctx
    }

    #[must_use]
    pub const fn unique_alt(&self) -> Option<usize> {
        self.unique_alt
    }

    pub fn set_unique_alt(&mut self, alt: Option<usize>) {
        self.unique_alt = alt;
    }

    #[must_use]
    pub fn conflicting_alts(&self) -> Option<&AltSet> {
        self.conflicting_alts.as_ref()
    }

    pub fn set_conflicting_alts(&mut self, alts: Option<AltSet>) {
        self.conflicting_alts = alts;
    }

    #[must_use]
    pub const fn has_semantic_context(&self) -> bool {
        self.has_semantic_context
    }

    pub fn set_has_semantic_context(&mut self, value: bool) {
        self.has_semantic_context = value;
    }

    #[must_use]
    pub const fn dips_into_outer_context(&self) -> bool {
        self.dips_into_outer_context
    }

    pub(crate) fn mark_dips_into_outer_context(&mut self) {
        self.dips_into_outer_context = true;
    }

    fn compute_hash(&self) -> u64 {
        let mut h = ahash::AHasher::default();
        self.configs.hash(&mut h);
        h.finish()
    }

    /// Wraps the set for sharing in a DFA state or error.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl PartialEq for AtnConfigSet {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if let (Some(a), Some(b)) = (self.cached_hash, other.cached_hash) {
            if a != b {
                return false;
            }
        }
        self.full_ctx == other.full_ctx
            && self.unique_alt == other.unique_alt
            && self.conflicting_alts == other.conflicting_alts
            && self.has_semantic_context == other.has_semantic_context
            && self.dips_into_outer_context == other.dips_into_outer_context
            && self.configs == other.configs
    }
}

impl Eq for AtnConfigSet {}

impl Hash for AtnConfigSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash.unwrap_or_else(|| self.compute_hash()));
    }
}

impl<'a> IntoIterator for &'a AtnConfigSet {
    type Item = &'a AtnConfig;
    type IntoIter = std::slice::Iter<'a, AtnConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

impl fmt::Display for AtnConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, c) in self.configs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{c}")?;
        }
        f.write_str("]")?;
        if self.has_semantic_context {
            f.write_str(",hasSemanticContext")?;
        }
        if let Some(alt) = self.unique_alt {
            write!(f, ",uniqueAlt={alt}")?;
        }
        if let Some(alts) = &self.conflicting_alts {
            write!(f, ",conflictingAlts={alts}")?;
        }
        if self.dips_into_outer_context {
            f.write_str(",dipsIntoOuterContext")?;
        }
        Ok(())
    }
}
