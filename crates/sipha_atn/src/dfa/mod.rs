//! # DFA Cache
//!
//! Each decision (or lexer mode) owns a [`Dfa`] that memoizes the outcome of ATN
//! simulation. A [`DfaState`] wraps the frozen configuration set reached after
//! some prefix of lookahead; its edges record where the next symbol leads.
//!
//! States are published only once fully built and never change afterwards except
//! by gaining edges, so readers on other threads can follow edges without taking
//! the state table lock.

use crate::atn::{LexerActionExecutor, StateId};
use crate::config::AtnConfigSet;
use crate::context::PredictionContextCache;
use crate::recognizer::Vocabulary;
use crate::semantic::SemanticContext;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Smallest code point with a cached lexer DFA edge.
pub const MIN_LEXER_DFA_EDGE: i32 = 0;
/// Largest code point with a cached lexer DFA edge.
pub const MAX_LEXER_DFA_EDGE: i32 = 127;

/// Number of a state within its [`Dfa`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DfaStateId(pub u32);

impl DfaStateId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DfaStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Cached outcome of following one symbol out of a DFA state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DfaEdge {
    /// The symbol leads nowhere; prediction fails.
    Error,
    Target(DfaStateId),
}

/// An alternative guarded by a predicate, stored on accept states that need
/// predicate evaluation to decide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredPrediction {
    pub pred: SemanticContext,
    pub alt: usize,
}

impl fmt::Display for PredPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pred, self.alt)
    }
}

/// A node of a decision's DFA.
#[derive(Debug)]
pub struct DfaState {
    pub(crate) state_number: DfaStateId,
    pub(crate) configs: Arc<AtnConfigSet>,
    pub(crate) is_accept_state: bool,
    /// Predicted alternative of a parser accept state.
    pub(crate) prediction: Option<usize>,
    /// Token type of a lexer accept state.
    pub(crate) lexer_token_type: Option<i32>,
    pub(crate) lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    pub(crate) requires_full_context: bool,
    pub(crate) predicates: Option<Vec<PredPrediction>>,
    edges: RwLock<Vec<Option<DfaEdge>>>,
}

impl DfaState {
    /// An unpublished, non-accepting state over `configs`.
    #[must_use]
    pub fn new(configs: AtnConfigSet) -> Self {
        Self {
            state_number: DfaStateId(u32::MAX),
            configs: Arc::new(configs),
            is_accept_state: false,
            prediction: None,
            lexer_token_type: None,
            lexer_action_executor: None,
            requires_full_context: false,
            predicates: None,
            edges: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn state_number(&self) -> DfaStateId {
        self.state_number
    }

    #[must_use]
    pub fn configs(&self) -> &Arc<AtnConfigSet> {
        &self.configs
    }

    #[must_use]
    pub const fn is_accept_state(&self) -> bool {
        self.is_accept_state
    }

    #[must_use]
    pub const fn prediction(&self) -> Option<usize> {
        self.prediction
    }

    #[must_use]
    pub const fn lexer_token_type(&self) -> Option<i32> {
        self.lexer_token_type
    }

    #[must_use]
    pub fn lexer_action_executor(&self) -> Option<&Arc<LexerActionExecutor>> {
        self.lexer_action_executor.as_ref()
    }

    #[must_use]
    pub const fn requires_full_context(&self) -> bool {
        self.requires_full_context
    }

    #[must_use]
    pub fn predicates(&self) -> Option<&[PredPrediction]> {
        self.predicates.as_deref()
    }

    /// Edge stored at slot `index`.
    #[must_use]
    pub fn edge(&self, index: usize) -> Option<DfaEdge> {
        self.edges.read().get(index).copied().flatten()
    }

    pub fn set_edge(&self, index: usize, edge: DfaEdge) {
        let mut edges = self.edges.write();
        if edges.len() <= index {
            edges.resize(index + 1, None);
        }
        edges[index] = Some(edge);
    }

    /// Snapshot of the populated edges as `(slot, edge)` pairs.
    #[must_use]
    pub fn edges(&self) -> Vec<(usize, DfaEdge)> {
        self.edges
            .read()
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.map(|e| (i, e)))
            .collect()
    }
}

#[derive(Debug, Default)]
struct DfaStates {
    states: Vec<Arc<DfaState>>,
    index: HashMap<Arc<AtnConfigSet>, DfaStateId>,
}

/// The DFA of one decision or lexer mode.
#[derive(Debug)]
pub struct Dfa {
    decision: usize,
    atn_start_state: StateId,
    precedence_dfa: bool,
    states: RwLock<DfaStates>,
    s0: RwLock<Option<DfaStateId>>,
    precedence_start_states: RwLock<HashMap<i32, DfaStateId>>,
}

impl Dfa {
    #[must_use]
    pub fn new(decision: usize, atn_start_state: StateId, precedence_dfa: bool) -> Self {
        Self {
            decision,
            atn_start_state,
            precedence_dfa,
            states: RwLock::new(DfaStates::default()),
            s0: RwLock::new(None),
            precedence_start_states: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn decision(&self) -> usize {
        self.decision
    }

    #[must_use]
    pub const fn atn_start_state(&self) -> StateId {
        self.atn_start_state
    }

    /// Whether start states are kept per precedence level.
    #[must_use]
    pub const fn is_precedence_dfa(&self) -> bool {
        self.precedence_dfa
    }

    #[must_use]
    pub fn state(&self, id: DfaStateId) -> Option<Arc<DfaState>> {
        self.states.read().states.get(id.index()).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.read().states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Published states, in creation order.
    #[must_use]
    pub fn states(&self) -> Vec<Arc<DfaState>> {
        self.states.read().states.clone()
    }

    #[must_use]
    pub fn s0(&self) -> Option<Arc<DfaState>> {
        let id = (*self.s0.read())?;
        self.state(id)
    }

    pub fn set_s0(&self, state: &DfaState) {
        *self.s0.write() = Some(state.state_number);
    }

    #[must_use]
    pub fn precedence_start_state(&self, precedence: i32) -> Option<Arc<DfaState>> {
        let id = self.precedence_start_states.read().get(&precedence).copied()?;
        self.state(id)
    }

    pub fn set_precedence_start_state(&self, precedence: i32, state: &DfaState) {
        self.precedence_start_states
            .write()
            .insert(precedence, state.state_number);
    }

    /// Publishes `state`, or returns the existing state with equal configurations.
    ///
    /// With a context cache the configurations are canonicalized first. The set is
    /// frozen either way.
    pub fn add_state(&self, mut state: DfaState, context_cache: Option<&PredictionContextCache>) -> Arc<DfaState> {
        let mut table = self.states.write();
        if let Some(&existing) = table.index.get(&*state.configs) {
            return Arc::clone(&table.states[existing.index()]);
        }
        let configs = Arc::make_mut(&mut state.configs);
        if !configs.is_read_only() {
            if let Some(cache) = context_cache {
                configs.optimize_configs(cache);
            }
            configs.freeze();
        }
        let id = DfaStateId(table.states.len() as u32);
        state.state_number = id;
        let state = Arc::new(state);
        table.index.insert(Arc::clone(&state.configs), id);
        table.states.push(Arc::clone(&state));
        tracing::trace!(decision = self.decision, state = id.0, "added DFA state");
        state
    }

    /// Drops every state and start state.
    pub fn clear(&self) {
        let mut table = self.states.write();
        *table = DfaStates::default();
        *self.s0.write() = None;
        self.precedence_start_states.write().clear();
    }

    fn state_label(s: &DfaState, lexer: bool) -> String {
        let mut label = String::new();
        if s.is_accept_state {
            label.push(':');
        }
        label.push_str(&s.state_number.to_string());
        if s.requires_full_context {
            label.push('^');
        }
        if s.is_accept_state {
            if let Some(preds) = &s.predicates {
                let rendered: Vec<String> = preds.iter().map(ToString::to_string).collect();
                label.push_str(&format!("=>[{}]", rendered.join(", ")));
            } else if lexer {
                if let Some(t) = s.lexer_token_type {
                    label.push_str(&format!("=>{t}"));
                }
            } else if let Some(alt) = s.prediction {
                label.push_str(&format!("=>{alt}"));
            }
        }
        label
    }

    fn render_with(&self, lexer: bool, edge_label: impl Fn(usize) -> String) -> String {
        let states = self.states();
        let mut out = String::new();
        for s in &states {
            for (slot, edge) in s.edges() {
                let DfaEdge::Target(target) = edge else {
                    continue;
                };
                let Some(t) = states.get(target.index()) else {
                    continue;
                };
                out.push_str(&Self::state_label(s, lexer));
                out.push('-');
                out.push_str(&edge_label(slot));
                out.push_str("->");
                out.push_str(&Self::state_label(t, lexer));
                out.push('\n');
            }
        }
        out
    }

    /// Renders a parser DFA as `s0-ID->:s1=>2` lines. Edge slot `i` is token `i - 1`.
    #[must_use]
    pub fn render(&self, vocabulary: &Vocabulary) -> String {
        self.render_with(false, |slot| vocabulary.display_name(slot as i32 - 1))
    }

    /// Renders a lexer DFA with quoted characters as edge labels.
    #[must_use]
    pub fn render_lexer(&self) -> String {
        self.render_with(true, |slot| {
            let c = u32::try_from(slot as i32 + MIN_LEXER_DFA_EDGE)
                .ok()
                .and_then(char::from_u32)
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            format!("'{c}'")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AtnConfig;
    use crate::context::PredictionContext;

    fn set_of(state: u32, alt: usize) -> AtnConfigSet {
        let mut set = AtnConfigSet::new(false);
        set.add(AtnConfig::new(StateId(state), alt, PredictionContext::empty()), None);
        set
    }

    #[test]
    fn test_add_state_dedups_by_configs() {
        let dfa = Dfa::new(0, StateId(0), false);
        let a = dfa.add_state(DfaState::new(set_of(1, 1)), None);
        let b = dfa.add_state(DfaState::new(set_of(1, 1)), None);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.configs().is_read_only());
        let c = dfa.add_state(DfaState::new(set_of(2, 1)), None);
        assert_eq!(c.state_number(), DfaStateId(1));
        assert_eq!(dfa.len(), 2);
    }

    #[test]
    fn test_render_parser_dfa() {
        let dfa = Dfa::new(0, StateId(0), false);
        let s0 = dfa.add_state(DfaState::new(set_of(1, 1)), None);
        let mut accept = DfaState::new(set_of(2, 2));
        accept.is_accept_state = true;
        accept.prediction = Some(2);
        let s1 = dfa.add_state(accept, None);
        s0.set_edge(4, DfaEdge::Target(s1.state_number()));
        s0.set_edge(5, DfaEdge::Error);
        let vocab = Vocabulary::from_symbolic(&["A", "B", "C"]);
        assert_eq!(dfa.render(&vocab), "s0-C->:s1=>2\n");
    }

    #[test]
    fn test_render_lexer_dfa() {
        let dfa = Dfa::new(0, StateId(0), false);
        let s0 = dfa.add_state(DfaState::new(set_of(1, 1)), None);
        let mut accept = DfaState::new(set_of(2, 1));
        accept.is_accept_state = true;
        accept.lexer_token_type = Some(1);
        let s1 = dfa.add_state(accept, None);
        s0.set_edge('a' as usize, DfaEdge::Target(s1.state_number()));
        assert_eq!(dfa.render_lexer(), "s0-'a'->:s1=>1\n");
    }
}
