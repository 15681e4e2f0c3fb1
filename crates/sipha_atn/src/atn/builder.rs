use super::deserializer::AtnDeserializationOptions;
use super::lexer_action::LexerAction;
use super::state::{AtnState, StateId, StateKind};
use super::transition::{Transition, TransitionKind};
use super::{Atn, GrammarType};
use crate::error::AtnError;

/// Assembles an [`Atn`] state by state.
///
/// `build` derives everything the graph implies: rule stop states, return edges
/// from rule stop states to follow states, block start/end and loop links, and
/// precedence decisions. It then verifies the structure.
#[derive(Debug, Clone)]
pub struct AtnBuilder {
    atn: Atn,
    rule_token_types: Vec<Option<i32>>,
}

impl AtnBuilder {
    #[must_use]
    pub fn new(grammar_type: GrammarType, max_token_type: i32) -> Self {
        Self {
            atn: Atn {
                grammar_type,
                max_token_type,
                states: Vec::new(),
                decision_to_state: Vec::new(),
                rule_to_start_state: Vec::new(),
                rule_to_stop_state: Vec::new(),
                rule_to_token_type: Vec::new(),
                mode_to_start_state: Vec::new(),
                lexer_actions: Vec::new(),
            },
            rule_token_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.atn.states.len()
    }

    pub fn add_state(&mut self, kind: StateKind, rule_index: Option<usize>) -> StateId {
        let id = StateId(self.atn.states.len() as u32);
        self.atn.states.push(AtnState::new(id, kind, rule_index));
        id
    }

    fn check(&self, id: StateId) -> Result<(), AtnError> {
        if id.index() < self.atn.states.len() {
            Ok(())
        } else {
            Err(AtnError::state_out_of_range(id.index(), self.atn.states.len()))
        }
    }

    pub(crate) fn state_mut(&mut self, id: StateId) -> Result<&mut AtnState, AtnError> {
        self.check(id)?;
        Ok(&mut self.atn.states[id.index()])
    }

    /// Mutable access to the kind of `id`, for setting links such as block end states.
    pub fn kind_mut(&mut self, id: StateId) -> Result<&mut StateKind, AtnError> {
        Ok(&mut self.state_mut(id)?.kind)
    }

    pub fn add_transition(&mut self, from: StateId, transition: Transition) -> Result<(), AtnError> {
        self.check(transition.target)?;
        if let TransitionKind::Rule { follow_state, .. } = transition.kind {
            self.check(follow_state)?;
        }
        self.state_mut(from)?.add_transition(transition);
        Ok(())
    }

    /// Registers a rule starting at `start`. Lexer rules carry the token type they emit.
    pub fn add_rule(&mut self, start: StateId, token_type: Option<i32>) -> Result<usize, AtnError> {
        self.check(start)?;
        if !matches!(self.atn.states[start.index()].kind, StateKind::RuleStart { .. }) {
            return Err(AtnError::invariant(start, "rule must start at a rule start state"));
        }
        self.atn.rule_to_start_state.push(start);
        self.rule_token_types.push(token_type);
        Ok(self.atn.rule_to_start_state.len() - 1)
    }

    pub fn add_mode(&mut self, start: StateId) -> Result<usize, AtnError> {
        self.check(start)?;
        if !matches!(self.atn.states[start.index()].kind, StateKind::TokensStart) {
            return Err(AtnError::invariant(start, "mode must start at a tokens start state"));
        }
        self.atn.mode_to_start_state.push(start);
        Ok(self.atn.mode_to_start_state.len() - 1)
    }

    /// Assigns the next decision number to `state`.
    pub fn define_decision(&mut self, state: StateId) -> Result<usize, AtnError> {
        let decision = self.atn.decision_to_state.len();
        let s = self.state_mut(state)?;
        if !s.kind.is_decision_kind() {
            return Err(AtnError::invariant(state, "only decision states can define decisions"));
        }
        s.decision = Some(decision);
        self.atn.decision_to_state.push(state);
        Ok(decision)
    }

    pub fn set_non_greedy(&mut self, state: StateId) -> Result<(), AtnError> {
        let s = self.state_mut(state)?;
        if !s.kind.is_decision_kind() {
            return Err(AtnError::invariant(state, "only decision states can be non-greedy"));
        }
        s.non_greedy = true;
        Ok(())
    }

    /// Marks the rule whose start state is `start` as rewritten from left recursion.
    pub fn set_left_recursive(&mut self, start: StateId) -> Result<(), AtnError> {
        match self.kind_mut(start)? {
            StateKind::RuleStart {
                is_left_recursive, ..
            } => {
                *is_left_recursive = true;
                Ok(())
            }
            _ => Err(AtnError::invariant(start, "only rule start states can be left-recursive")),
        }
    }

    pub fn add_lexer_action(&mut self, action: LexerAction) -> usize {
        self.atn.lexer_actions.push(action);
        self.atn.lexer_actions.len() - 1
    }

    /// Finishes the ATN with default options: verification on, no bypass transitions.
    pub fn build(self) -> Result<Atn, AtnError> {
        self.build_with(&AtnDeserializationOptions::default())
    }

    pub fn build_with(mut self, options: &AtnDeserializationOptions) -> Result<Atn, AtnError> {
        self.resolve_rules()?;
        self.add_rule_return_edges()?;
        self.link_blocks_and_loops()?;
        if self.atn.grammar_type == GrammarType::Parser {
            self.mark_precedence_decisions();
        }
        if options.verify_atn {
            verify(&self.atn)?;
        }
        if options.generate_rule_bypass_transitions && self.atn.grammar_type == GrammarType::Parser
        {
            self.generate_rule_bypass_transitions()?;
            if options.verify_atn {
                verify(&self.atn)?;
            }
        }
        tracing::debug!(
            states = self.atn.states.len(),
            rules = self.atn.rule_to_start_state.len(),
            decisions = self.atn.decision_to_state.len(),
            "built ATN"
        );
        Ok(self.atn)
    }

    fn resolve_rules(&mut self) -> Result<(), AtnError> {
        let rule_count = self.atn.rule_to_start_state.len();
        let mut stops = vec![None; rule_count];
        for state in &self.atn.states {
            if let (StateKind::RuleStop, Some(rule)) = (&state.kind, state.rule_index) {
                let slot = stops.get_mut(rule).ok_or(AtnError::RuleOutOfRange {
                    index: rule,
                    count: rule_count,
                })?;
                *slot = Some(state.id);
            }
        }
        self.atn.rule_to_stop_state.clear();
        for (rule, stop) in stops.into_iter().enumerate() {
            let start = self.atn.rule_to_start_state[rule];
            let stop = stop.ok_or_else(|| AtnError::invariant(start, "rule has no stop state"))?;
            if let StateKind::RuleStart { stop_state, .. } = &mut self.atn.states[start.index()].kind {
                *stop_state = Some(stop);
            }
            self.atn.rule_to_stop_state.push(stop);
        }
        self.atn.rule_to_token_type = match self.atn.grammar_type {
            GrammarType::Lexer => self
                .rule_token_types
                .iter()
                .map(|t| t.unwrap_or(crate::token::INVALID_TYPE))
                .collect(),
            GrammarType::Parser => Vec::new(),
        };
        Ok(())
    }

    fn add_rule_return_edges(&mut self) -> Result<(), AtnError> {
        let mut edges = Vec::new();
        for state in &self.atn.states {
            for t in &state.transitions {
                let TransitionKind::Rule {
                    precedence,
                    follow_state,
                    ..
                } = t.kind
                else {
                    continue;
                };
                let callee = self.atn.states[t.target.index()]
                    .rule_index
                    .ok_or_else(|| AtnError::invariant(t.target, "rule call target has no rule"))?;
                let stop = *self.atn.rule_to_stop_state.get(callee).ok_or(AtnError::RuleOutOfRange {
                    index: callee,
                    count: self.atn.rule_to_stop_state.len(),
                })?;
                let outermost_precedence_return =
                    (self.atn.is_left_recursive_rule(callee) && precedence == 0).then_some(callee);
                edges.push((
                    stop,
                    Transition::new(
                        follow_state,
                        TransitionKind::Epsilon {
                            outermost_precedence_return,
                        },
                    ),
                ));
            }
        }
        for (stop, edge) in edges {
            self.atn.states[stop.index()].add_transition(edge);
        }
        Ok(())
    }

    fn link_blocks_and_loops(&mut self) -> Result<(), AtnError> {
        let mut block_links = Vec::new();
        let mut loop_links = Vec::new();
        for state in &self.atn.states {
            if state.kind.is_block_start() {
                let end = state
                    .kind
                    .block_end_state()
                    .ok_or_else(|| AtnError::invariant(state.id, "block start has no end state"))?;
                block_links.push((state.id, end));
            }
            match state.kind {
                StateKind::PlusLoopBack => {
                    for t in &state.transitions {
                        if matches!(self.atn.states[t.target.index()].kind, StateKind::PlusBlockStart { .. }) {
                            loop_links.push((t.target, state.id));
                        }
                    }
                }
                StateKind::StarLoopBack => {
                    for t in &state.transitions {
                        if matches!(self.atn.states[t.target.index()].kind, StateKind::StarLoopEntry { .. }) {
                            loop_links.push((t.target, state.id));
                        }
                    }
                }
                _ => {}
            }
        }
        for (start, end) in block_links {
            self.check(end)?;
            match &mut self.atn.states[end.index()].kind {
                StateKind::BlockEnd { start_state } => {
                    if start_state.is_some_and(|s| s != start) {
                        return Err(AtnError::invariant(end, "block end is shared by two block starts"));
                    }
                    *start_state = Some(start);
                }
                _ => return Err(AtnError::invariant(start, "block end state has the wrong type")),
            }
        }
        for (target, loop_back) in loop_links {
            match &mut self.atn.states[target.index()].kind {
                StateKind::PlusBlockStart { loop_back_state, .. }
                | StateKind::StarLoopEntry { loop_back_state, .. } => *loop_back_state = Some(loop_back),
                _ => {}
            }
        }
        Ok(())
    }

    /// Flags the star-loop entry that closes the prefix of each left-recursive rule.
    fn mark_precedence_decisions(&mut self) {
        let mut marked = Vec::new();
        for state in &self.atn.states {
            if !matches!(state.kind, StateKind::StarLoopEntry { .. }) {
                continue;
            }
            let Some(rule) = state.rule_index else {
                continue;
            };
            if !self.atn.is_left_recursive_rule(rule) {
                continue;
            }
            if is_precedence_loop_entry(&self.atn, state) {
                marked.push(state.id);
            }
        }
        for id in marked {
            if let StateKind::StarLoopEntry {
                is_precedence_decision,
                ..
            } = &mut self.atn.states[id.index()].kind
            {
                *is_precedence_decision = true;
            }
        }
    }

    fn generate_rule_bypass_transitions(&mut self) -> Result<(), AtnError> {
        let rule_count = self.atn.rule_to_start_state.len();
        let max_token_type = self.atn.max_token_type;
        self.atn.rule_to_token_type = (0..rule_count)
            .map(|i| max_token_type + i as i32 + 1)
            .collect();
        for rule in 0..rule_count {
            let bypass_start = self.add_state(StateKind::BlockStart { end_state: None }, Some(rule));
            let bypass_stop = self.add_state(StateKind::BlockEnd { start_state: None }, Some(rule));
            self.atn.states[bypass_start.index()].kind = StateKind::BlockStart {
                end_state: Some(bypass_stop),
            };
            self.atn.states[bypass_stop.index()].kind = StateKind::BlockEnd {
                start_state: Some(bypass_start),
            };
            self.define_decision(bypass_start)?;

            let (end_state, exclude) = if self.atn.is_left_recursive_rule(rule) {
                let entry = self
                    .atn
                    .states
                    .iter()
                    .find(|s| {
                        s.rule_index == Some(rule)
                            && matches!(s.kind, StateKind::StarLoopEntry { .. })
                            && is_precedence_loop_entry(&self.atn, s)
                    })
                    .ok_or_else(|| {
                        AtnError::invariant(
                            self.atn.rule_to_start_state[rule],
                            "cannot find the end of the precedence rule prefix",
                        )
                    })?;
                let loop_back = match entry.kind {
                    StateKind::StarLoopEntry {
                        loop_back_state: Some(lb),
                        ..
                    } => lb,
                    _ => return Err(AtnError::invariant(entry.id, "star loop entry has no loop back")),
                };
                (entry.id, Some((loop_back, 0usize)))
            } else {
                (self.atn.rule_to_stop_state[rule], None)
            };

            for state in &mut self.atn.states {
                let id = state.id;
                for (i, t) in state.transitions.iter_mut().enumerate() {
                    if exclude == Some((id, i)) {
                        continue;
                    }
                    if t.target == end_state {
                        t.target = bypass_stop;
                    }
                }
            }

            let rule_start = self.atn.rule_to_start_state[rule];
            while let Some(t) = self.atn.states[rule_start.index()].remove_last_transition() {
                self.atn.states[bypass_start.index()].add_transition(t);
            }
            self.atn.states[rule_start.index()].add_transition(Transition::epsilon(bypass_start));
            self.atn.states[bypass_stop.index()].add_transition(Transition::epsilon(end_state));

            let match_state = self.add_state(StateKind::Basic, Some(rule));
            let token_type = self.atn.rule_to_token_type[rule];
            self.atn.states[match_state.index()].add_transition(Transition::atom(bypass_stop, token_type));
            self.atn.states[bypass_start.index()].add_transition(Transition::epsilon(match_state));
        }
        Ok(())
    }
}

fn is_precedence_loop_entry(atn: &Atn, state: &AtnState) -> bool {
    let Some(last) = state.transitions.last() else {
        return false;
    };
    let loop_end = &atn.states[last.target.index()];
    matches!(loop_end.kind, StateKind::LoopEnd { .. })
        && loop_end.epsilon_only_transitions
        && loop_end
            .transitions
            .first()
            .is_some_and(|t| atn.states[t.target.index()].is_rule_stop())
}

/// Checks the structural invariants simulators rely on.
pub(crate) fn verify(atn: &Atn) -> Result<(), AtnError> {
    let kind_of = |id: StateId| &atn.states[id.index()].kind;
    for state in &atn.states {
        let id = state.id;
        let fail = |reason: &'static str| Err(AtnError::invariant(id, reason));
        if matches!(state.kind, StateKind::Invalid) {
            continue;
        }
        if !(state.epsilon_only_transitions || state.transitions.len() <= 1) {
            return fail("state mixes several transitions with a non-epsilon transition");
        }
        match &state.kind {
            StateKind::PlusBlockStart {
                loop_back_state: None,
                ..
            } => return fail("plus block start has no loop back state"),
            StateKind::StarLoopEntry {
                loop_back_state, ..
            } => {
                if loop_back_state.is_none() {
                    return fail("star loop entry has no loop back state");
                }
                if state.transitions.len() != 2 {
                    return fail("star loop entry must have exactly two transitions");
                }
                let first = kind_of(state.transitions[0].target);
                let second = kind_of(state.transitions[1].target);
                match (first, second) {
                    (StateKind::StarBlockStart { .. }, StateKind::LoopEnd { .. }) => {
                        if state.non_greedy {
                            return fail("greedy star loop entry is marked non-greedy");
                        }
                    }
                    (StateKind::LoopEnd { .. }, StateKind::StarBlockStart { .. }) => {
                        if !state.non_greedy {
                            return fail("non-greedy star loop entry is not marked non-greedy");
                        }
                    }
                    _ => return fail("star loop entry must lead to a star block and a loop end"),
                }
            }
            StateKind::StarLoopBack => {
                if state.transitions.len() != 1
                    || !matches!(kind_of(state.transitions[0].target), StateKind::StarLoopEntry { .. })
                {
                    return fail("star loop back must have one transition to a star loop entry");
                }
            }
            StateKind::LoopEnd {
                loop_back_state: None,
            } => return fail("loop end has no loop back state"),
            StateKind::RuleStart {
                stop_state: None, ..
            } => return fail("rule start has no stop state"),
            StateKind::BlockStart { end_state: None }
            | StateKind::PlusBlockStart { end_state: None, .. }
            | StateKind::StarBlockStart { end_state: None } => {
                return fail("block start has no end state")
            }
            StateKind::BlockEnd { start_state: None } => return fail("block end has no start state"),
            _ => {}
        }
        if state.kind.is_decision_kind() {
            if state.transitions.len() > 1 && state.decision.is_none() {
                return fail("decision state with several transitions has no decision number");
            }
        } else if state.transitions.len() > 1 && !state.is_rule_stop() {
            return fail("non-decision state has several transitions");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_shell(builder: &mut AtnBuilder, rule: usize) -> (StateId, StateId) {
        let start = builder.add_state(
            StateKind::RuleStart {
                stop_state: None,
                is_left_recursive: false,
            },
            Some(rule),
        );
        let stop = builder.add_state(StateKind::RuleStop, Some(rule));
        (start, stop)
    }

    #[test]
    fn test_build_derives_return_edges() {
        // s : r 2 ; r : 1 ;
        let mut b = AtnBuilder::new(GrammarType::Parser, 2);
        let (s_start, s_stop) = rule_shell(&mut b, 0);
        let (r_start, r_stop) = rule_shell(&mut b, 1);
        b.add_rule(s_start, None).unwrap();
        b.add_rule(r_start, None).unwrap();
        let call = b.add_state(StateKind::Basic, Some(0));
        let follow = b.add_state(StateKind::Basic, Some(0));
        let after = b.add_state(StateKind::Basic, Some(0));
        b.add_transition(s_start, Transition::epsilon(call)).unwrap();
        b.add_transition(
            call,
            Transition::new(
                r_start,
                TransitionKind::Rule {
                    rule_index: 1,
                    precedence: 0,
                    follow_state: follow,
                },
            ),
        )
        .unwrap();
        b.add_transition(follow, Transition::atom(after, 2)).unwrap();
        b.add_transition(after, Transition::epsilon(s_stop)).unwrap();
        let m = b.add_state(StateKind::Basic, Some(1));
        let n = b.add_state(StateKind::Basic, Some(1));
        b.add_transition(r_start, Transition::epsilon(m)).unwrap();
        b.add_transition(m, Transition::atom(n, 1)).unwrap();
        b.add_transition(n, Transition::epsilon(r_stop)).unwrap();

        let atn = b.build().unwrap();
        assert_eq!(atn.rule_stop(1), Some(r_stop));
        let returns = atn.state(r_stop).transitions();
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].target, follow);
        assert!(atn.state(r_stop).epsilon_only_transitions());
    }

    #[test]
    fn test_missing_block_end_is_rejected() {
        let mut b = AtnBuilder::new(GrammarType::Parser, 1);
        let (start, _stop) = rule_shell(&mut b, 0);
        b.add_rule(start, None).unwrap();
        let block = b.add_state(StateKind::BlockStart { end_state: None }, Some(0));
        b.add_transition(start, Transition::epsilon(block)).unwrap();
        let err = b.build().unwrap_err();
        assert!(matches!(err, AtnError::InvariantViolated { .. }));
    }

    #[test]
    fn test_transition_target_out_of_range() {
        let mut b = AtnBuilder::new(GrammarType::Parser, 1);
        let s = b.add_state(StateKind::Basic, Some(0));
        let err = b.add_transition(s, Transition::epsilon(StateId(9))).unwrap_err();
        assert_eq!(err, AtnError::StateOutOfRange { index: 9, count: 1 });
    }

    #[test]
    fn test_decision_requires_decision_state() {
        let mut b = AtnBuilder::new(GrammarType::Parser, 1);
        let s = b.add_state(StateKind::Basic, Some(0));
        assert!(b.define_decision(s).is_err());
    }
}
