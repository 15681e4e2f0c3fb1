use crate::atn::{AtnState, LexerActionExecutor, StateId, Transition, TransitionKind};
use crate::cache::SharedCache;
use crate::config::{AtnConfig, AtnConfigSet};
use crate::context::{PredictionContext, EMPTY_RETURN_STATE};
use crate::dfa::{Dfa, DfaEdge, DfaState, MAX_LEXER_DFA_EDGE, MIN_LEXER_DFA_EDGE};
use crate::error::RecognitionError;
use crate::recognizer::Recognizer;
use crate::stream::IntStream;
use crate::token::EOF;
use hashbrown::HashSet;
use std::sync::Arc;

/// Largest Unicode code point; bounds wildcards and negated sets.
const MAX_CHAR_VALUE: i32 = 0x0010_FFFF;

/// Outcome of one successful [`LexerAtnSimulator::match_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerMatch {
    /// Token type of the winning rule, or [`EOF`] at the end of input.
    pub token_type: i32,
    /// Actions of the winning rule, still to be executed by the caller.
    pub action_executor: Option<Arc<LexerActionExecutor>>,
}

/// Last accept state seen while scanning, with the position right after it.
#[derive(Debug, Default)]
struct SimState {
    index: usize,
    line: usize,
    column: usize,
    dfa_state: Option<Arc<DfaState>>,
}

/// Bookkeeping for one closure computation.
#[derive(Default)]
struct ClosureWalk {
    /// Configurations already expanded, keyed with the accept flag they were reached under.
    busy: HashSet<(AtnConfig, bool)>,
    /// Rules entered along the current path without matching a character.
    entered_rules: Vec<usize>,
}

/// Longest-match token recognition over a lexer ATN, with one DFA per mode.
#[derive(Debug, Clone)]
pub struct LexerAtnSimulator {
    cache: Arc<SharedCache>,
    start_index: usize,
    line: usize,
    column: usize,
}

impl LexerAtnSimulator {
    #[must_use]
    pub fn new(cache: Arc<SharedCache>) -> Self {
        Self {
            cache,
            start_index: 0,
            line: 1,
            column: 0,
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SharedCache> {
        &self.cache
    }

    /// Current line, starting at 1.
    #[must_use]
    pub const fn line(&self) -> usize {
        self.line
    }

    /// Current column in code points, starting at 0.
    #[must_use]
    pub const fn column(&self) -> usize {
        self.column
    }

    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    pub fn set_column(&mut self, column: usize) {
        self.column = column;
    }

    /// Rewinds position tracking to the start of a new input.
    pub fn reset(&mut self) {
        self.start_index = 0;
        self.line = 1;
        self.column = 0;
    }

    /// DFA of `mode`.
    #[must_use]
    pub fn dfa(&self, mode: usize) -> Option<&Dfa> {
        self.cache.dfa(mode)
    }

    /// Consumes one code point, keeping line and column current.
    pub fn consume(&mut self, input: &mut dyn IntStream) {
        if input.la(1) == '\n' as i32 {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        input.consume();
    }

    /// Matches the longest token of `mode` at the current input position.
    ///
    /// On success the input sits right after the token and the winning rule's actions
    /// are returned unexecuted. At the end of input the match is [`EOF`].
    ///
    /// # Errors
    ///
    /// [`RecognitionError::LexerNoViableAlt`] when no rule matches. The input is left
    /// where scanning stopped.
    pub fn match_token(
        &mut self,
        input: &mut dyn IntStream,
        mode: usize,
        recognizer: &mut dyn Recognizer,
    ) -> Result<LexerMatch, RecognitionError> {
        let cache = Arc::clone(&self.cache);
        let Some(dfa) = cache.dfa(mode) else {
            return Err(RecognitionError::LexerNoViableAlt {
                start_index: input.index(),
                dead_end_configs: Arc::new(AtnConfigSet::new_ordered()),
            });
        };
        self.start_index = input.index();
        match dfa.s0() {
            Some(s0) => self.exec_atn(input, dfa, s0, recognizer),
            None => self.match_atn(input, dfa, recognizer),
        }
    }

    fn match_atn(
        &mut self,
        input: &mut dyn IntStream,
        dfa: &Dfa,
        recognizer: &mut dyn Recognizer,
    ) -> Result<LexerMatch, RecognitionError> {
        let mut s0_closure = self.compute_start_state(dfa.atn_start_state(), recognizer);
        let suppress_edge = s0_closure.has_semantic_context();
        s0_closure.set_has_semantic_context(false);
        let next = self.add_dfa_state(dfa, s0_closure);
        if !suppress_edge {
            dfa.set_s0(&next);
        }
        self.exec_atn(input, dfa, next, recognizer)
    }

    fn exec_atn(
        &mut self,
        input: &mut dyn IntStream,
        dfa: &Dfa,
        ds0: Arc<DfaState>,
        recognizer: &mut dyn Recognizer,
    ) -> Result<LexerMatch, RecognitionError> {
        let mut prev_accept = SimState::default();
        if ds0.is_accept_state() {
            self.capture_sim_state(&mut prev_accept, input, &ds0);
        }
        let mut t = input.la(1);
        let mut s = ds0;
        loop {
            let target = match Self::existing_target_state(&s, t) {
                Some(DfaEdge::Error) => None,
                Some(DfaEdge::Target(id)) => match dfa.state(id) {
                    Some(state) => Some(state),
                    None => self.compute_target_state(input, dfa, &s, t, recognizer),
                },
                None => self.compute_target_state(input, dfa, &s, t, recognizer),
            };
            let Some(target) = target else {
                break;
            };
            tracing::trace!(mode = dfa.decision(), symbol = t, state = %target.state_number(), "lexer step");
            if t != EOF {
                self.consume(input);
            }
            if target.is_accept_state() {
                self.capture_sim_state(&mut prev_accept, input, &target);
                if t == EOF {
                    break;
                }
            }
            t = input.la(1);
            s = target;
        }
        self.fail_or_accept(prev_accept, input, s.configs(), t)
    }

    fn existing_target_state(s: &DfaState, t: i32) -> Option<DfaEdge> {
        if !(MIN_LEXER_DFA_EDGE..=MAX_LEXER_DFA_EDGE).contains(&t) {
            return None;
        }
        s.edge(usize::try_from(t - MIN_LEXER_DFA_EDGE).ok()?)
    }

    fn compute_target_state(
        &mut self,
        input: &mut dyn IntStream,
        dfa: &Dfa,
        s: &DfaState,
        t: i32,
        recognizer: &mut dyn Recognizer,
    ) -> Option<Arc<DfaState>> {
        let mut reach = AtnConfigSet::new_ordered();
        self.reachable_config_set(input, s.configs(), &mut reach, t, recognizer);
        if reach.is_empty() {
            if !reach.has_semantic_context() {
                Self::add_dfa_edge(s, t, DfaEdge::Error);
            }
            return None;
        }
        let suppress_edge = reach.has_semantic_context();
        reach.set_has_semantic_context(false);
        let to = self.add_dfa_state(dfa, reach);
        if !suppress_edge {
            Self::add_dfa_edge(s, t, DfaEdge::Target(to.state_number()));
        }
        Some(to)
    }

    fn add_dfa_edge(from: &DfaState, t: i32, edge: DfaEdge) {
        if !(MIN_LEXER_DFA_EDGE..=MAX_LEXER_DFA_EDGE).contains(&t) {
            // only ASCII edges are cached
            return;
        }
        if let Ok(slot) = usize::try_from(t - MIN_LEXER_DFA_EDGE) {
            from.set_edge(slot, edge);
        }
    }

    /// Publishes `configs` as a DFA state. The first configuration that finished its
    /// rule decides the token type and actions.
    fn add_dfa_state(&self, dfa: &Dfa, configs: AtnConfigSet) -> Arc<DfaState> {
        let atn = self.cache.atn();
        let winner = configs
            .iter()
            .find(|c| atn.state(c.state).is_rule_stop())
            .map(|c| {
                let token_type = atn
                    .state(c.state)
                    .rule_index()
                    .and_then(|r| atn.rule_token_type(r));
                (token_type, c.action_executor().cloned())
            });
        let mut proposed = DfaState::new(configs);
        if let Some((token_type, executor)) = winner {
            proposed.is_accept_state = true;
            proposed.lexer_token_type = token_type;
            proposed.lexer_action_executor = executor;
        }
        dfa.add_state(proposed, Some(self.cache.context_cache()))
    }

    fn capture_sim_state(&self, settings: &mut SimState, input: &dyn IntStream, dfa_state: &Arc<DfaState>) {
        settings.index = input.index();
        settings.line = self.line;
        settings.column = self.column;
        settings.dfa_state = Some(Arc::clone(dfa_state));
    }

    fn fail_or_accept(
        &mut self,
        prev_accept: SimState,
        input: &mut dyn IntStream,
        reach: &Arc<AtnConfigSet>,
        t: i32,
    ) -> Result<LexerMatch, RecognitionError> {
        if let Some(accepted) = prev_accept.dfa_state {
            input.seek(prev_accept.index);
            self.line = prev_accept.line;
            self.column = prev_accept.column;
            return Ok(LexerMatch {
                token_type: accepted.lexer_token_type().unwrap_or(crate::token::INVALID_TYPE),
                action_executor: accepted.lexer_action_executor().cloned(),
            });
        }
        if t == EOF && input.index() == self.start_index {
            return Ok(LexerMatch {
                token_type: EOF,
                action_executor: None,
            });
        }
        Err(RecognitionError::LexerNoViableAlt {
            start_index: self.start_index,
            dead_end_configs: Arc::clone(reach),
        })
    }

    /// Configurations reachable from `closure` on `t`. Once an alternative reaches
    /// an accept state, its configurations that crossed a non-greedy decision stop.
    fn reachable_config_set(
        &mut self,
        input: &mut dyn IntStream,
        closure: &AtnConfigSet,
        reach: &mut AtnConfigSet,
        t: i32,
        recognizer: &mut dyn Recognizer,
    ) {
        let atn = Arc::clone(self.cache.atn_arc());
        let mut skip_alt = None;
        for c in closure {
            let current_alt_reached_accept_state = skip_alt == Some(c.alt);
            if current_alt_reached_accept_state && c.passed_through_non_greedy_decision() {
                continue;
            }
            for trans in atn.state(c.state).transitions() {
                if !trans.matches(t, 0, MAX_CHAR_VALUE) {
                    continue;
                }
                let executor = c
                    .action_executor()
                    .map(|e| e.fix_offset_before_match(input.index() - self.start_index));
                let next = c.derive_with_executor(atn.state(trans.target), executor);
                let mut walk = ClosureWalk::default();
                if self.closure(next, reach, &mut walk, current_alt_reached_accept_state, t == EOF, recognizer) {
                    skip_alt = Some(c.alt);
                    break;
                }
            }
        }
    }

    fn compute_start_state(
        &mut self,
        p: StateId,
        recognizer: &mut dyn Recognizer,
    ) -> AtnConfigSet {
        let atn = Arc::clone(self.cache.atn_arc());
        let mut configs = AtnConfigSet::new_ordered();
        for (i, t) in atn.state(p).transitions().iter().enumerate() {
            let c = AtnConfig::new_lexer(atn.state(t.target), i + 1, PredictionContext::empty(), None);
            self.closure(c, &mut configs, &mut ClosureWalk::default(), false, false, recognizer);
        }
        configs
    }

    /// Epsilon closure of `config` into `configs`. Returns whether the alternative
    /// reached an accept state.
    fn closure(
        &mut self,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        walk: &mut ClosureWalk,
        mut current_alt_reached_accept_state: bool,
        treat_eof_as_epsilon: bool,
        recognizer: &mut dyn Recognizer,
    ) -> bool {
        if !walk.busy.insert((config.clone(), current_alt_reached_accept_state)) {
            return current_alt_reached_accept_state;
        }
        let atn = Arc::clone(self.cache.atn_arc());
        let state = atn.state(config.state);
        if state.is_rule_stop() {
            if config.context.has_empty_path() {
                if config.context.is_empty() {
                    configs.add(config, None);
                    return true;
                }
                configs.add(config.derive_with_context(state, PredictionContext::empty()), None);
                current_alt_reached_accept_state = true;
            }
            if !config.context.is_empty() {
                for i in 0..config.context.len() {
                    let return_state = config.context.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        continue;
                    }
                    let Some(parent) = config.context.parent(i) else {
                        continue;
                    };
                    let returned =
                        config.derive_with_context(atn.state(StateId(return_state)), Arc::clone(parent));
                    let popped = match (walk.entered_rules.last(), state.rule_index()) {
                        (Some(&entered), Some(exited)) if entered == exited => walk.entered_rules.pop(),
                        _ => None,
                    };
                    current_alt_reached_accept_state = self.closure(
                        returned,
                        configs,
                        walk,
                        current_alt_reached_accept_state,
                        treat_eof_as_epsilon,
                        recognizer,
                    );
                    if let Some(rule) = popped {
                        walk.entered_rules.push(rule);
                    }
                }
            }
            return current_alt_reached_accept_state;
        }

        if !state.epsilon_only_transitions()
            && (!current_alt_reached_accept_state || !config.passed_through_non_greedy_decision())
        {
            configs.add(config.clone(), None);
        }
        for t in state.transitions() {
            let entered_rule = match t.kind {
                TransitionKind::Rule { rule_index, .. } => {
                    if walk.entered_rules.contains(&rule_index) {
                        tracing::trace!(rule = rule_index, "skipping rule re-entered without input");
                        continue;
                    }
                    Some(rule_index)
                }
                _ => None,
            };
            let Some(c) = self.epsilon_target(&config, state, t, configs, treat_eof_as_epsilon, recognizer) else {
                continue;
            };
            if let Some(rule) = entered_rule {
                walk.entered_rules.push(rule);
            }
            current_alt_reached_accept_state = self.closure(
                c,
                configs,
                walk,
                current_alt_reached_accept_state,
                treat_eof_as_epsilon,
                recognizer,
            );
            if entered_rule.is_some() {
                walk.entered_rules.pop();
            }
        }
        current_alt_reached_accept_state
    }

    fn epsilon_target(
        &self,
        config: &AtnConfig,
        source: &AtnState,
        t: &Transition,
        configs: &mut AtnConfigSet,
        treat_eof_as_epsilon: bool,
        recognizer: &mut dyn Recognizer,
    ) -> Option<AtnConfig> {
        let atn = self.cache.atn();
        let target = atn.state(t.target);
        match &t.kind {
            TransitionKind::Rule { follow_state, .. } => {
                let context = PredictionContext::singleton(Arc::clone(&config.context), follow_state.0);
                Some(config.derive_with_context(target, context))
            }
            TransitionKind::Precedence { .. } => {
                tracing::warn!(state = source.id().0, "precedence predicate in a lexer ATN; ignoring");
                None
            }
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                ..
            } => {
                // results depend on the input, so the DFA must not cache this edge
                configs.set_has_semantic_context(true);
                recognizer
                    .sempred(*rule_index, *pred_index, false)
                    .then(|| config.derive(target))
            }
            TransitionKind::Action { action_index, .. } => {
                // actions of rules invoked from another rule are ignored
                let action = action_index.and_then(|i| atn.lexer_action(i));
                match action {
                    Some(action) if config.context.has_empty_path() => {
                        let executor = LexerActionExecutor::append(config.action_executor(), action.clone());
                        Some(config.derive_with_executor(target, Some(executor)))
                    }
                    _ => Some(config.derive(target)),
                }
            }
            TransitionKind::Epsilon { .. } => Some(config.derive(target)),
            TransitionKind::Atom { .. } | TransitionKind::Range { .. } | TransitionKind::Set { .. } => {
                (treat_eof_as_epsilon && t.matches(EOF, 0, MAX_CHAR_VALUE)).then(|| config.derive(target))
            }
            TransitionKind::NotSet { .. } | TransitionKind::Wildcard => None,
        }
    }
}
