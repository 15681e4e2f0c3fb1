use super::{
    all_configs_in_rule_stop_states, all_subsets_conflict, all_subsets_equal, alt_that_finished_decision_entry_rule,
    conflicting_alt_subsets, conflicting_alts, has_config_in_rule_stop_state, has_sll_conflict_terminating_prediction,
    resolves_to_just_one_viable_alt, single_viable_alt, unique_alt, ParserSimulatorConfig, PredictionMode,
};
use crate::atn::{Atn, AtnState, StateId, Transition, TransitionKind};
use crate::cache::SharedCache;
use crate::config::{AtnConfig, AtnConfigSet};
use crate::context::{from_invocation_stack, ContextRef, MergeCache, PredictionContext, EMPTY_RETURN_STATE};
use crate::dfa::{Dfa, DfaEdge, DfaState, PredPrediction};
use crate::error::RecognitionError;
use crate::misc::AltSet;
use crate::recognizer::{ErrorListener, Recognizer};
use crate::semantic::SemanticContext;
use crate::stream::IntStream;
use crate::token::{EOF, EPSILON};
use hashbrown::{HashMap, HashSet};
use std::sync::Arc;

/// Adaptive LL(*) prediction over a parser ATN.
///
/// The simulator itself is cheap; everything it learns lives in the
/// [`SharedCache`], so one cache can serve many simulators and threads.
#[derive(Debug, Clone)]
pub struct ParserAtnSimulator {
    cache: Arc<SharedCache>,
    config: ParserSimulatorConfig,
}

#[derive(Debug, Clone, Copy)]
struct ClosureFlags {
    collect_predicates: bool,
    full_ctx: bool,
    treat_eof_as_epsilon: bool,
}

/// Bookkeeping for one closure computation.
#[derive(Default)]
struct ClosureWalk {
    /// Configurations already expanded, split by whether they left the decision rule.
    busy: HashSet<(AtnConfig, bool)>,
    /// Rules entered along the current path without consuming input.
    entered_rules: Vec<usize>,
}

/// State of a single `adaptive_predict` call.
struct PredictionRun<'a> {
    atn: &'a Atn,
    dfa: &'a Dfa,
    cache: &'a SharedCache,
    settings: &'a ParserSimulatorConfig,
    input: &'a mut dyn IntStream,
    recognizer: &'a mut dyn Recognizer,
    listener: &'a mut dyn ErrorListener,
    outer_context: &'a [StateId],
    start_index: usize,
    merge_cache: MergeCache,
    steps: usize,
}

impl ParserAtnSimulator {
    #[must_use]
    pub fn new(cache: Arc<SharedCache>) -> Self {
        Self::with_config(cache, ParserSimulatorConfig::default())
    }

    #[must_use]
    pub fn with_config(cache: Arc<SharedCache>, config: ParserSimulatorConfig) -> Self {
        Self { cache, config }
    }

    #[must_use]
    pub fn config(&self) -> &ParserSimulatorConfig {
        &self.config
    }

    pub fn set_prediction_mode(&mut self, mode: PredictionMode) {
        self.config.prediction_mode = mode;
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SharedCache> {
        &self.cache
    }

    #[must_use]
    pub fn atn(&self) -> &Atn {
        self.cache.atn()
    }

    /// Predicts which alternative of `decision` matches the input at its current
    /// position.
    ///
    /// `outer_context` is the invocation stack of the rule containing the decision,
    /// as invoking states innermost first; it is only consulted when SLL prediction
    /// conflicts. The input is left where it was found.
    ///
    /// # Errors
    ///
    /// [`RecognitionError::NoViableAlt`] when no alternative matches,
    /// [`RecognitionError::ReachBudgetExhausted`] when `max_reach_steps` runs out and
    /// [`RecognitionError::UnknownDecision`] for a decision the ATN does not have.
    pub fn adaptive_predict(
        &self,
        input: &mut dyn IntStream,
        decision: usize,
        outer_context: &[StateId],
        recognizer: &mut dyn Recognizer,
        listener: &mut dyn ErrorListener,
    ) -> Result<usize, RecognitionError> {
        let dfa = self
            .cache
            .dfa(decision)
            .ok_or(RecognitionError::UnknownDecision { decision })?;
        let start_index = input.index();
        let mut run = PredictionRun {
            atn: self.cache.atn(),
            dfa,
            cache: &self.cache,
            settings: &self.config,
            input,
            recognizer,
            listener,
            outer_context,
            start_index,
            merge_cache: MergeCache::new(),
            steps: 0,
        };
        let result = run.predict();
        run.input.seek(start_index);
        match &result {
            Ok(alt) => tracing::trace!(decision, alt, start_index, "predicted alternative"),
            Err(error) => tracing::trace!(decision, start_index, %error, "prediction failed"),
        }
        result
    }
}

fn edge_slot(symbol: i32) -> Option<usize> {
    usize::try_from(symbol + 1).ok()
}

impl PredictionRun<'_> {
    fn predict(&mut self) -> Result<usize, RecognitionError> {
        if self.settings.force_full_context {
            let s0 = self.compute_start_state(self.dfa.atn_start_state(), true);
            return self.exec_atn_with_full_context(s0);
        }
        let s0 = match self.existing_start_state() {
            Some(s0) => s0,
            None => self.build_start_state(),
        };
        self.exec_atn(s0)
    }

    fn existing_start_state(&self) -> Option<Arc<DfaState>> {
        if self.dfa.is_precedence_dfa() {
            self.dfa.precedence_start_state(self.recognizer.precedence())
        } else {
            self.dfa.s0()
        }
    }

    fn build_start_state(&mut self) -> Arc<DfaState> {
        let closure = self.compute_start_state(self.dfa.atn_start_state(), false);
        if self.dfa.is_precedence_dfa() {
            let filtered = self.apply_precedence_filter(&closure);
            let s0 = self
                .dfa
                .add_state(DfaState::new(filtered), Some(self.cache.context_cache()));
            self.dfa
                .set_precedence_start_state(self.recognizer.precedence(), &s0);
            s0
        } else {
            let s0 = self
                .dfa
                .add_state(DfaState::new(closure), Some(self.cache.context_cache()));
            self.dfa.set_s0(&s0);
            s0
        }
    }

    fn step(&mut self) -> Result<(), RecognitionError> {
        self.steps += 1;
        match self.settings.max_reach_steps {
            Some(max) if self.steps > max => Err(RecognitionError::ReachBudgetExhausted {
                decision: self.dfa.decision(),
                start_index: self.start_index,
                steps: max,
            }),
            _ => Ok(()),
        }
    }

    fn no_viable_alt(&mut self, configs: Arc<AtnConfigSet>) -> RecognitionError {
        RecognitionError::NoViableAlt {
            decision: self.dfa.decision(),
            start_index: self.start_index,
            offending_index: self.input.index(),
            offending_symbol: self.input.la(1),
            dead_end_configs: configs,
        }
    }

    /// SLL prediction over the decision DFA, extending it as needed.
    fn exec_atn(&mut self, s0: Arc<DfaState>) -> Result<usize, RecognitionError> {
        let decision = self.dfa.decision();
        let mut previous = s0;
        let mut t = self.input.la(1);
        loop {
            self.step()?;
            let target = match edge_slot(t).and_then(|slot| previous.edge(slot)) {
                Some(DfaEdge::Error) => None,
                Some(DfaEdge::Target(id)) => match self.dfa.state(id) {
                    Some(state) => Some(state),
                    None => self.compute_target_state(&previous, t),
                },
                None => self.compute_target_state(&previous, t),
            };

            let Some(d) = target else {
                let error = self.no_viable_alt(Arc::clone(previous.configs()));
                self.input.seek(self.start_index);
                if let Some(alt) = self.syn_valid_or_sem_invalid_alt(previous.configs()) {
                    return Ok(alt);
                }
                return Err(error);
            };

            if d.requires_full_context && self.settings.prediction_mode != PredictionMode::Sll {
                let mut conflicting = d.configs.conflicting_alts().cloned().unwrap_or_default();
                if let Some(predicates) = &d.predicates {
                    let conflict_index = self.input.index();
                    if conflict_index != self.start_index {
                        self.input.seek(self.start_index);
                    }
                    conflicting = self.eval_pred_predictions(predicates, true);
                    if conflicting.len() == 1 {
                        if let Some(alt) = conflicting.min() {
                            return Ok(alt);
                        }
                    }
                    if conflict_index != self.start_index {
                        self.input.seek(conflict_index);
                    }
                }
                tracing::debug!(
                    decision,
                    start_index = self.start_index,
                    index = self.input.index(),
                    alts = %conflicting,
                    "SLL conflict; retrying with full context"
                );
                let s0_closure = self.compute_start_state(self.dfa.atn_start_state(), true);
                self.listener.report_attempting_full_context(
                    decision,
                    self.start_index,
                    self.input.index(),
                    &conflicting,
                    &d.configs,
                );
                return self.exec_atn_with_full_context(s0_closure);
            }

            if d.is_accept_state {
                let Some(predicates) = &d.predicates else {
                    if let Some(alt) = d.prediction {
                        return Ok(alt);
                    }
                    return Err(self.no_viable_alt(Arc::clone(&d.configs)));
                };
                let stop_index = self.input.index();
                self.input.seek(self.start_index);
                let alts = self.eval_pred_predictions(predicates, true);
                let Some(alt) = alts.min() else {
                    return Err(self.no_viable_alt(Arc::clone(&d.configs)));
                };
                if alts.len() > 1 {
                    self.report_ambiguity(stop_index, false, &alts, &d.configs);
                }
                return Ok(alt);
            }

            previous = d;
            if t != EOF {
                self.input.consume();
                t = self.input.la(1);
            }
        }
    }

    fn add_dfa_edge(&self, from: &DfaState, t: i32, edge: DfaEdge) {
        if t > self.atn.max_token_type() {
            return;
        }
        if let Some(slot) = edge_slot(t) {
            from.set_edge(slot, edge);
        }
    }

    fn compute_target_state(&mut self, previous: &DfaState, t: i32) -> Option<Arc<DfaState>> {
        let Some(mut reach) = self.compute_reach_set(previous.configs(), t, false) else {
            self.add_dfa_edge(previous, t, DfaEdge::Error);
            return None;
        };

        let mut is_accept_state = false;
        let mut requires_full_context = false;
        let mut prediction = None;
        if let Some(alt) = unique_alt(&reach) {
            reach.set_unique_alt(Some(alt));
            is_accept_state = true;
            prediction = Some(alt);
        } else if has_sll_conflict_terminating_prediction(self.settings.prediction_mode, self.atn, &reach) {
            let alts = conflicting_alts(&reach);
            prediction = alts.min();
            reach.set_conflicting_alts(Some(alts));
            requires_full_context = true;
            is_accept_state = true;
        }

        let mut predicates = None;
        if is_accept_state && reach.has_semantic_context() {
            let nalts = self.atn.state(self.dfa.atn_start_state()).transitions().len();
            let alts_to_collect = match reach.unique_alt() {
                Some(alt) => AltSet::of(alt),
                None => reach.conflicting_alts().cloned().unwrap_or_default(),
            };
            match preds_for_ambig_alts(&alts_to_collect, &reach, nalts) {
                Some(alt_to_pred) => {
                    predicates = pred_predictions(&alts_to_collect, &alt_to_pred);
                    prediction = None;
                }
                None => prediction = alts_to_collect.min(),
            }
        }

        let mut state = DfaState::new(reach);
        state.is_accept_state = is_accept_state;
        state.requires_full_context = requires_full_context;
        state.prediction = if predicates.is_some() { None } else { prediction };
        state.predicates = predicates;
        let published = self.dfa.add_state(state, Some(self.cache.context_cache()));
        self.add_dfa_edge(previous, t, DfaEdge::Target(published.state_number()));
        Some(published)
    }

    /// LL prediction with the real invocation stack. Never touches the DFA.
    fn exec_atn_with_full_context(&mut self, s0: AtnConfigSet) -> Result<usize, RecognitionError> {
        let mode = self.settings.prediction_mode;
        let mut found_exact_ambig = false;
        let mut previous = s0;
        self.input.seek(self.start_index);
        let mut t = self.input.la(1);
        let (predicted, reach) = loop {
            self.step()?;
            let Some(mut reach) = self.compute_reach_set(&previous, t, true) else {
                let offending_index = self.input.index();
                let offending_symbol = self.input.la(1);
                self.input.seek(self.start_index);
                if let Some(alt) = self.syn_valid_or_sem_invalid_alt(&previous) {
                    return Ok(alt);
                }
                return Err(RecognitionError::NoViableAlt {
                    decision: self.dfa.decision(),
                    start_index: self.start_index,
                    offending_index,
                    offending_symbol,
                    dead_end_configs: Arc::new(previous),
                });
            };
            let subsets = conflicting_alt_subsets(&reach);
            let unique = unique_alt(&reach);
            reach.set_unique_alt(unique);
            if let Some(alt) = unique {
                break (alt, reach);
            }
            if mode == PredictionMode::LlExactAmbigDetection {
                if all_subsets_conflict(&subsets) && all_subsets_equal(&subsets) {
                    if let Some(alt) = single_viable_alt(&subsets) {
                        found_exact_ambig = true;
                        break (alt, reach);
                    }
                }
            } else if let Some(alt) = resolves_to_just_one_viable_alt(&subsets) {
                break (alt, reach);
            }
            previous = reach;
            if t != EOF {
                self.input.consume();
                t = self.input.la(1);
            }
        };

        let stop_index = self.input.index();
        if reach.unique_alt().is_some() {
            tracing::debug!(
                decision = self.dfa.decision(),
                start_index = self.start_index,
                stop_index,
                predicted,
                "context sensitivity"
            );
            self.listener.report_context_sensitivity(
                self.dfa.decision(),
                self.start_index,
                stop_index,
                predicted,
                &reach,
            );
            return Ok(predicted);
        }
        self.report_ambiguity(stop_index, found_exact_ambig, &reach.alts(), &reach);
        Ok(predicted)
    }

    fn report_ambiguity(&mut self, stop_index: usize, exact: bool, alts: &AltSet, configs: &AtnConfigSet) {
        tracing::debug!(
            decision = self.dfa.decision(),
            start_index = self.start_index,
            stop_index,
            exact,
            alts = %alts,
            "ambiguity"
        );
        if self.settings.report_ambiguity {
            self.listener
                .report_ambiguity(self.dfa.decision(), self.start_index, stop_index, exact, alts, configs);
        }
    }

    fn compute_reach_set(&mut self, closure: &AtnConfigSet, t: i32, full_ctx: bool) -> Option<AtnConfigSet> {
        let atn = self.atn;
        tracing::trace!(decision = self.dfa.decision(), symbol = t, configs = closure.len(), full_ctx, "reach");
        let mut intermediate = AtnConfigSet::new(full_ctx);
        let mut skipped_stop_states = Vec::new();
        for c in closure {
            let state = atn.state(c.state);
            if state.is_rule_stop() {
                if full_ctx || t == EOF {
                    skipped_stop_states.push(c.clone());
                }
                continue;
            }
            for trans in state.transitions() {
                if trans.matches(t, 0, atn.max_token_type()) {
                    intermediate.add(c.derive(atn.state(trans.target)), Some(&mut self.merge_cache));
                }
            }
        }

        let skip_closure = skipped_stop_states.is_empty()
            && t != EOF
            && (intermediate.len() == 1 || unique_alt(&intermediate).is_some());
        let mut reach = if skip_closure {
            intermediate
        } else {
            let mut reach = AtnConfigSet::new(full_ctx);
            let flags = ClosureFlags {
                collect_predicates: false,
                full_ctx,
                treat_eof_as_epsilon: t == EOF,
            };
            let mut walk = ClosureWalk::default();
            for c in &intermediate {
                self.closure_checking_stop_state(c.clone(), &mut reach, &mut walk, flags, 0);
            }
            reach
        };

        if t == EOF {
            reach = self.remove_all_configs_not_in_rule_stop_state(reach, skip_closure);
        }
        if !skipped_stop_states.is_empty() && (!full_ctx || !has_config_in_rule_stop_state(atn, &reach)) {
            for c in skipped_stop_states {
                reach.add(c, Some(&mut self.merge_cache));
            }
        }
        (!reach.is_empty()).then_some(reach)
    }

    /// Keeps configurations that finished their rule. With `look_to_end_of_rule`,
    /// configurations that can reach the rule end without consuming input are moved
    /// to the rule stop state.
    fn remove_all_configs_not_in_rule_stop_state(
        &mut self,
        configs: AtnConfigSet,
        look_to_end_of_rule: bool,
    ) -> AtnConfigSet {
        let atn = self.atn;
        if all_configs_in_rule_stop_states(atn, &configs) {
            return configs;
        }
        let mut result = AtnConfigSet::new(configs.full_ctx());
        for config in &configs {
            let state = atn.state(config.state);
            if state.is_rule_stop() {
                result.add(config.clone(), Some(&mut self.merge_cache));
                continue;
            }
            if look_to_end_of_rule
                && state.epsilon_only_transitions()
                && atn.next_tokens(config.state).contains(EPSILON)
            {
                if let Some(stop) = state.rule_index().and_then(|r| atn.rule_stop(r)) {
                    result.add(config.derive(atn.state(stop)), Some(&mut self.merge_cache));
                }
            }
        }
        result
    }

    fn compute_start_state(&mut self, p: StateId, full_ctx: bool) -> AtnConfigSet {
        let atn = self.atn;
        let initial_context = if full_ctx {
            from_invocation_stack(atn, self.outer_context)
        } else {
            PredictionContext::empty()
        };
        let mut configs = AtnConfigSet::new(full_ctx);
        let flags = ClosureFlags {
            collect_predicates: true,
            full_ctx,
            treat_eof_as_epsilon: false,
        };
        for (i, t) in atn.state(p).transitions().iter().enumerate() {
            let c = AtnConfig::new(t.target, i + 1, Arc::clone(&initial_context));
            let mut walk = ClosureWalk::default();
            self.closure_checking_stop_state(c, &mut configs, &mut walk, flags, 0);
        }
        configs
    }

    /// Removes configurations of alternatives other than 1 that alt 1 already covers
    /// at the same state and context, after evaluating precedence predicates.
    fn apply_precedence_filter(&mut self, configs: &AtnConfigSet) -> AtnConfigSet {
        let mut states_from_alt1: HashMap<StateId, ContextRef> = HashMap::new();
        let mut filtered = AtnConfigSet::new(configs.full_ctx());
        for config in configs.iter().filter(|c| c.alt == 1) {
            let Some(updated) = config.semantic_context.eval_precedence(&mut *self.recognizer) else {
                continue;
            };
            states_from_alt1.insert(config.state, Arc::clone(&config.context));
            let mut kept = config.clone();
            kept.semantic_context = updated;
            filtered.add(kept, Some(&mut self.merge_cache));
        }
        for config in configs.iter().filter(|c| c.alt != 1) {
            if !config.precedence_filter_suppressed
                && states_from_alt1
                    .get(&config.state)
                    .is_some_and(|ctx| **ctx == *config.context)
            {
                continue;
            }
            filtered.add(config.clone(), Some(&mut self.merge_cache));
        }
        filtered
    }

    fn closure_checking_stop_state(
        &mut self,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        walk: &mut ClosureWalk,
        flags: ClosureFlags,
        depth: i32,
    ) {
        let dipped = config.reaches_into_outer_context > 0;
        if !walk.busy.insert((config.clone(), dipped)) {
            return;
        }
        let atn = self.atn;
        let state = atn.state(config.state);
        if state.is_rule_stop() {
            if !config.context.is_empty() {
                for i in 0..config.context.len() {
                    let return_state = config.context.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        if flags.full_ctx {
                            let finished = config.derive_with_context(state, PredictionContext::empty());
                            configs.add(finished, Some(&mut self.merge_cache));
                        } else {
                            self.closure_inner(&config, configs, walk, flags, depth);
                        }
                        continue;
                    }
                    let Some(parent) = config.context.parent(i) else {
                        continue;
                    };
                    let returned = config.derive_with_context(atn.state(StateId(return_state)), Arc::clone(parent));
                    let popped = match (walk.entered_rules.last(), state.rule_index()) {
                        (Some(&entered), Some(exited)) if entered == exited => walk.entered_rules.pop(),
                        _ => None,
                    };
                    self.closure_checking_stop_state(returned, configs, walk, flags, depth - 1);
                    if let Some(rule) = popped {
                        walk.entered_rules.push(rule);
                    }
                }
                return;
            }
            if flags.full_ctx {
                // end of the start rule
                configs.add(config, Some(&mut self.merge_cache));
                return;
            }
        }
        self.closure_inner(&config, configs, walk, flags, depth);
    }

    fn closure_inner(
        &mut self,
        config: &AtnConfig,
        configs: &mut AtnConfigSet,
        walk: &mut ClosureWalk,
        flags: ClosureFlags,
        depth: i32,
    ) {
        let atn = self.atn;
        let state = atn.state(config.state);
        if !state.epsilon_only_transitions() {
            // EOF transitions can act as epsilon too, so keep going
            configs.add(config.clone(), Some(&mut self.merge_cache));
        }
        for t in state.transitions() {
            let entered_rule = match t.kind {
                TransitionKind::Rule { rule_index, .. } => {
                    if walk.entered_rules.contains(&rule_index) {
                        tracing::trace!(rule = rule_index, "skipping left-recursive rule entry");
                        continue;
                    }
                    Some(rule_index)
                }
                _ => None,
            };
            let collect = flags.collect_predicates && !matches!(t.kind, TransitionKind::Action { .. });
            let Some(mut c) = self.epsilon_target(config, t, collect, depth == 0, flags) else {
                continue;
            };
            let mut new_depth = depth;
            if state.is_rule_stop() {
                // fell off the end of the decision rule
                if self.dfa.is_precedence_dfa() {
                    if let TransitionKind::Epsilon {
                        outermost_precedence_return: Some(rule),
                    } = t.kind
                    {
                        if Some(rule) == atn.state(self.dfa.atn_start_state()).rule_index() {
                            c.precedence_filter_suppressed = true;
                        }
                    }
                }
                c.reaches_into_outer_context += 1;
                if walk.busy.contains(&(c.clone(), true)) {
                    continue;
                }
                configs.mark_dips_into_outer_context();
                new_depth -= 1;
            } else if entered_rule.is_some() && new_depth >= 0 {
                new_depth += 1;
            }
            if let Some(rule) = entered_rule {
                walk.entered_rules.push(rule);
            }
            self.closure_checking_stop_state(c, configs, walk, flags, new_depth);
            if entered_rule.is_some() {
                walk.entered_rules.pop();
            }
        }
    }

    fn epsilon_target(
        &mut self,
        config: &AtnConfig,
        t: &Transition,
        collect_predicates: bool,
        in_context: bool,
        flags: ClosureFlags,
    ) -> Option<AtnConfig> {
        let target = self.atn.state(t.target);
        match &t.kind {
            TransitionKind::Rule { follow_state, .. } => {
                let context = PredictionContext::singleton(Arc::clone(&config.context), follow_state.0);
                Some(config.derive_with_context(target, context))
            }
            TransitionKind::Precedence { precedence } => {
                let pred = SemanticContext::Precedence {
                    precedence: *precedence,
                };
                let evaluate = collect_predicates && in_context;
                self.predicate_target(config, target, &pred, evaluate, flags.full_ctx)
            }
            TransitionKind::Predicate {
                rule_index,
                pred_index,
                is_ctx_dependent,
            } => {
                let pred = SemanticContext::predicate(*rule_index, *pred_index, *is_ctx_dependent);
                let evaluate = collect_predicates && (!*is_ctx_dependent || in_context);
                self.predicate_target(config, target, &pred, evaluate, flags.full_ctx)
            }
            TransitionKind::Action { .. } | TransitionKind::Epsilon { .. } => Some(config.derive(target)),
            TransitionKind::Atom { .. } | TransitionKind::Range { .. } | TransitionKind::Set { .. } => {
                (flags.treat_eof_as_epsilon && t.matches(EOF, 0, 1)).then(|| config.derive(target))
            }
            TransitionKind::NotSet { .. } | TransitionKind::Wildcard => None,
        }
    }

    /// Full-context prediction evaluates predicates on the spot; SLL records them in
    /// the configuration's semantic context.
    fn predicate_target(
        &mut self,
        config: &AtnConfig,
        target: &AtnState,
        pred: &SemanticContext,
        evaluate: bool,
        full_ctx: bool,
    ) -> Option<AtnConfig> {
        if !evaluate {
            return Some(config.derive(target));
        }
        if full_ctx {
            let current = self.input.index();
            self.input.seek(self.start_index);
            let holds = pred.evaluate(&mut *self.recognizer);
            self.input.seek(current);
            return holds.then(|| config.derive(target));
        }
        let combined = SemanticContext::and(&config.semantic_context, pred);
        Some(config.derive_with_semantic(target, combined))
    }

    fn eval_pred_predictions(&mut self, predictions: &[PredPrediction], complete: bool) -> AltSet {
        let mut alts = AltSet::new();
        for pair in predictions {
            if pair.pred.is_none() || pair.pred.evaluate(&mut *self.recognizer) {
                alts.insert(pair.alt);
                if !complete {
                    break;
                }
            }
        }
        alts
    }

    /// On a dead end, prefers an alternative that already finished the decision rule:
    /// first among configurations whose predicates hold, then among the rest.
    fn syn_valid_or_sem_invalid_alt(&mut self, configs: &AtnConfigSet) -> Option<usize> {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for c in configs {
            if c.semantic_context.is_none() || c.semantic_context.evaluate(&mut *self.recognizer) {
                valid.push(c);
            } else {
                invalid.push(c);
            }
        }
        alt_that_finished_decision_entry_rule(self.atn, valid)
            .or_else(|| alt_that_finished_decision_entry_rule(self.atn, invalid))
    }
}

/// OR of the predicates guarding each alternative in `ambig_alts`, indexed by
/// alternative. `None` when no alternative carries a predicate.
fn preds_for_ambig_alts(ambig_alts: &AltSet, configs: &AtnConfigSet, nalts: usize) -> Option<Vec<SemanticContext>> {
    let mut alt_to_pred: Vec<Option<SemanticContext>> = vec![None; nalts + 1];
    for c in configs {
        if !ambig_alts.contains(c.alt) {
            continue;
        }
        if let Some(slot) = alt_to_pred.get_mut(c.alt) {
            *slot = Some(match slot.take() {
                None => c.semantic_context.clone(),
                Some(existing) => SemanticContext::or(&existing, &c.semantic_context),
            });
        }
    }
    let resolved: Vec<SemanticContext> = alt_to_pred
        .into_iter()
        .map(|p| p.unwrap_or(SemanticContext::NONE))
        .collect();
    let predicated = resolved.iter().skip(1).filter(|p| !p.is_none()).count();
    (predicated > 0).then_some(resolved)
}

fn pred_predictions(ambig_alts: &AltSet, alt_to_pred: &[SemanticContext]) -> Option<Vec<PredPrediction>> {
    let mut pairs = Vec::new();
    let mut contains_predicate = false;
    for (alt, pred) in alt_to_pred.iter().enumerate().skip(1) {
        if ambig_alts.contains(alt) {
            pairs.push(PredPrediction {
                pred: pred.clone(),
                alt,
            });
        }
        contains_predicate |= !pred.is_none();
    }
    contains_predicate.then_some(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{DefaultRecognizer, SilentErrorListener};
    use crate::stream::SymbolStream;
    use crate::testing::grammar::{Element, ParserGrammar};

    fn simulator(grammar: ParserGrammar) -> ParserAtnSimulator {
        let atn = grammar.build().unwrap();
        ParserAtnSimulator::new(Arc::new(SharedCache::new(Arc::new(atn))))
    }

    fn predict(sim: &ParserAtnSimulator, decision: usize, symbols: Vec<i32>) -> Result<usize, RecognitionError> {
        let mut input = SymbolStream::new(symbols);
        sim.adaptive_predict(&mut input, decision, &[], &mut DefaultRecognizer, &mut SilentErrorListener)
    }

    #[test]
    fn test_ll1_decision() {
        let sim = simulator(ParserGrammar::new().rule(
            "s",
            vec![vec![Element::token(1)], vec![Element::token(2)]],
        ));
        assert_eq!(predict(&sim, 0, vec![1]).unwrap(), 1);
        assert_eq!(predict(&sim, 0, vec![2]).unwrap(), 2);
    }

    #[test]
    fn test_ll2_decision_needs_second_token() {
        let sim = simulator(ParserGrammar::new().rule(
            "s",
            vec![
                vec![Element::token(1), Element::token(2)],
                vec![Element::token(1), Element::token(3)],
            ],
        ));
        assert_eq!(predict(&sim, 0, vec![1, 3]).unwrap(), 2);
        assert_eq!(predict(&sim, 0, vec![1, 2]).unwrap(), 1);
    }

    #[test]
    fn test_input_position_is_restored() {
        let sim = simulator(ParserGrammar::new().rule(
            "s",
            vec![
                vec![Element::token(1), Element::token(2)],
                vec![Element::token(1), Element::token(3)],
            ],
        ));
        let mut input = SymbolStream::new(vec![1, 3]);
        sim.adaptive_predict(&mut input, 0, &[], &mut DefaultRecognizer, &mut SilentErrorListener)
            .unwrap();
        assert_eq!(input.index(), 0);
    }

    #[test]
    fn test_no_viable_alt() {
        let sim = simulator(ParserGrammar::new().rule(
            "s",
            vec![vec![Element::token(1)], vec![Element::token(2)]],
        ));
        match predict(&sim, 0, vec![3]) {
            Err(RecognitionError::NoViableAlt {
                offending_symbol,
                dead_end_configs,
                ..
            }) => {
                assert_eq!(offending_symbol, 3);
                assert!(!dead_end_configs.is_empty());
            }
            other => panic!("expected no viable alt, got {other:?}"),
        }
    }

    #[test]
    fn test_reach_budget() {
        let atn = ParserGrammar::new()
            .rule(
                "s",
                vec![
                    vec![Element::token(1), Element::token(1), Element::token(2)],
                    vec![Element::token(1), Element::token(1), Element::token(3)],
                ],
            )
            .build()
            .unwrap();
        let config = ParserSimulatorConfig {
            max_reach_steps: Some(1),
            ..ParserSimulatorConfig::default()
        };
        let sim = ParserAtnSimulator::with_config(Arc::new(SharedCache::new(Arc::new(atn))), config);
        let err = predict(&sim, 0, vec![1, 1, 2]).unwrap_err();
        assert!(matches!(err, RecognitionError::ReachBudgetExhausted { steps: 1, .. }));
    }

    #[test]
    fn test_unknown_decision() {
        let sim = simulator(ParserGrammar::new().rule("s", vec![vec![Element::token(1)]]));
        assert!(matches!(
            predict(&sim, 7, vec![1]),
            Err(RecognitionError::UnknownDecision { decision: 7 })
        ));
    }

    #[test]
    fn test_predicates_choose_alternative() {
        struct Flip(bool);
        impl Recognizer for Flip {
            fn sempred(&mut self, _rule: usize, pred: usize, _ctx: bool) -> bool {
                (pred == 0) == self.0
            }
        }
        let sim = simulator(ParserGrammar::new().rule(
            "s",
            vec![
                vec![Element::predicate(0), Element::token(1)],
                vec![Element::predicate(1), Element::token(1)],
            ],
        ));
        let mut input = SymbolStream::new(vec![1]);
        let alt = sim
            .adaptive_predict(&mut input, 0, &[], &mut Flip(true), &mut SilentErrorListener)
            .unwrap();
        assert_eq!(alt, 1);
        let alt = sim
            .adaptive_predict(&mut input, 0, &[], &mut Flip(false), &mut SilentErrorListener)
            .unwrap();
        assert_eq!(alt, 2);
    }
}
