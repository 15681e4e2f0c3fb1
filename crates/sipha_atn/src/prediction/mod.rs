//! # Adaptive Prediction
//!
//! [`ParserAtnSimulator`] answers "which alternative does decision `d` take at this
//! input position?" It first simulates the ATN with local context only (SLL),
//! caching what it learns in the decision's DFA. When SLL reaches a conflict it
//! cannot resolve, it retries with the caller's real invocation stack (LL).
//!
//! The free functions in this module analyse configuration sets for conflicts.
//! They are shared by both prediction phases.

mod parser;

pub use parser::ParserAtnSimulator;

use crate::atn::{Atn, StateId};
use crate::config::{AtnConfig, AtnConfigSet};
use crate::context::ContextRef;
use crate::misc::AltSet;
use crate::semantic::SemanticContext;
use hashbrown::HashMap;

/// How hard prediction works to tell alternatives apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PredictionMode {
    /// Local-context prediction only. Fast, but may report a syntax error or pick
    /// the wrong alternative for grammars that need the caller's context.
    Sll,
    /// SLL first, full-context LL on conflict. Stops at the first conflict LL
    /// cannot resolve and takes the lowest alternative.
    #[default]
    Ll,
    /// Like [`Ll`](Self::Ll) but keeps consuming until the conflict is known to be an
    /// exact ambiguity, so the reported alternatives are precise.
    LlExactAmbigDetection,
}

/// Tuning for [`ParserAtnSimulator`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ParserSimulatorConfig {
    pub prediction_mode: PredictionMode,
    /// Upper bound on lookahead steps per prediction, across both phases.
    pub max_reach_steps: Option<usize>,
    /// Send ambiguity reports to the error listener.
    pub report_ambiguity: bool,
    /// Skip SLL and always predict with full context.
    pub force_full_context: bool,
}

impl Default for ParserSimulatorConfig {
    fn default() -> Self {
        Self {
            prediction_mode: PredictionMode::Ll,
            max_reach_steps: None,
            report_ambiguity: true,
            force_full_context: false,
        }
    }
}

/// Whether SLL prediction should stop at `configs`.
///
/// True when every configuration has finished the decision rule, or when some
/// state/context pair predicts several alternatives and no state predicts a
/// single one.
#[must_use]
pub fn has_sll_conflict_terminating_prediction(mode: PredictionMode, atn: &Atn, configs: &AtnConfigSet) -> bool {
    if all_configs_in_rule_stop_states(atn, configs) {
        return true;
    }
    let stripped;
    let configs = if mode == PredictionMode::Sll && configs.has_semantic_context() {
        // merge configurations that differ only in their predicates
        let mut dup = AtnConfigSet::new(true);
        for c in configs {
            let mut plain = c.clone();
            plain.semantic_context = SemanticContext::NONE;
            dup.add(plain, None);
        }
        stripped = dup;
        &stripped
    } else {
        configs
    };
    let subsets = conflicting_alt_subsets(configs);
    has_conflicting_alt_set(&subsets) && !has_state_associated_with_one_alt(configs)
}

#[must_use]
pub fn has_config_in_rule_stop_state(atn: &Atn, configs: &AtnConfigSet) -> bool {
    configs.iter().any(|c| atn.state(c.state).is_rule_stop())
}

#[must_use]
pub fn all_configs_in_rule_stop_states(atn: &Atn, configs: &AtnConfigSet) -> bool {
    configs.iter().all(|c| atn.state(c.state).is_rule_stop())
}

/// Alternatives grouped by (state, context), in first-seen order.
#[must_use]
pub fn conflicting_alt_subsets(configs: &AtnConfigSet) -> Vec<AltSet> {
    let mut index: HashMap<(StateId, ContextRef), usize> = HashMap::new();
    let mut subsets: Vec<AltSet> = Vec::new();
    for c in configs {
        let slot = *index
            .entry((c.state, c.context.clone()))
            .or_insert_with(|| {
                subsets.push(AltSet::new());
                subsets.len() - 1
            });
        subsets[slot].insert(c.alt);
    }
    subsets
}

/// Alternatives grouped by state.
#[must_use]
pub fn state_to_alt_map(configs: &AtnConfigSet) -> HashMap<StateId, AltSet> {
    let mut map: HashMap<StateId, AltSet> = HashMap::new();
    for c in configs {
        map.entry(c.state).or_default().insert(c.alt);
    }
    map
}

#[must_use]
pub fn has_state_associated_with_one_alt(configs: &AtnConfigSet) -> bool {
    state_to_alt_map(configs).values().any(|alts| alts.len() == 1)
}

/// The single alternative every subset's minimum agrees on.
#[must_use]
pub fn resolves_to_just_one_viable_alt(subsets: &[AltSet]) -> Option<usize> {
    single_viable_alt(subsets)
}

#[must_use]
pub fn single_viable_alt(subsets: &[AltSet]) -> Option<usize> {
    let mut viable = AltSet::new();
    for alts in subsets {
        if let Some(min) = alts.min() {
            viable.insert(min);
            if viable.len() > 1 {
                return None;
            }
        }
    }
    viable.min()
}

#[must_use]
pub fn all_subsets_conflict(subsets: &[AltSet]) -> bool {
    !has_non_conflicting_alt_set(subsets)
}

#[must_use]
pub fn has_non_conflicting_alt_set(subsets: &[AltSet]) -> bool {
    subsets.iter().any(|alts| alts.len() == 1)
}

#[must_use]
pub fn has_conflicting_alt_set(subsets: &[AltSet]) -> bool {
    subsets.iter().any(|alts| alts.len() > 1)
}

#[must_use]
pub fn all_subsets_equal(subsets: &[AltSet]) -> bool {
    subsets.windows(2).all(|w| w[0] == w[1])
}

/// Union of all subsets.
#[must_use]
pub fn alts_of(subsets: &[AltSet]) -> AltSet {
    let mut all = AltSet::new();
    for alts in subsets {
        all.union_with(alts);
    }
    all
}

/// The one alternative shared by every configuration, if there is exactly one.
#[must_use]
pub fn unique_alt(configs: &AtnConfigSet) -> Option<usize> {
    let mut alt = None;
    for c in configs {
        match alt {
            None => alt = Some(c.alt),
            Some(a) if a != c.alt => return None,
            Some(_) => {}
        }
    }
    alt
}

/// Alternatives involved in some conflicting subset.
#[must_use]
pub fn conflicting_alts(configs: &AtnConfigSet) -> AltSet {
    alts_of(&conflicting_alt_subsets(configs))
}

/// Configurations that can still finish the decision's rule: those that fell off
/// the start rule (or already sit in a rule stop state with `$` reachable).
fn finished_decision_entry_rule(atn: &Atn, config: &AtnConfig) -> bool {
    config.reaches_into_outer_context > 0
        || (atn.state(config.state).is_rule_stop() && config.context.has_empty_path())
}

/// Lowest alternative that reached the end of the decision's entry rule.
#[must_use]
pub fn alt_that_finished_decision_entry_rule<'a>(
    atn: &Atn,
    configs: impl IntoIterator<Item = &'a AtnConfig>,
) -> Option<usize> {
    configs
        .into_iter()
        .filter(|c| finished_decision_entry_rule(atn, c))
        .map(|c| c.alt)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PredictionContext;

    fn set(entries: &[(u32, usize, u32)]) -> AtnConfigSet {
        let mut s = AtnConfigSet::new(false);
        for &(state, alt, rs) in entries {
            let ctx = PredictionContext::singleton(PredictionContext::empty(), rs);
            s.add(AtnConfig::new(StateId(state), alt, ctx), None);
        }
        s
    }

    #[test]
    fn test_conflicting_subsets_group_by_state_and_context() {
        let s = set(&[(1, 1, 9), (1, 2, 9), (2, 1, 9), (1, 3, 8)]);
        let subsets = conflicting_alt_subsets(&s);
        assert_eq!(subsets.len(), 3);
        assert_eq!(subsets[0].to_string(), "{1, 2}");
        assert!(has_conflicting_alt_set(&subsets));
        assert!(has_non_conflicting_alt_set(&subsets));
        assert!(!all_subsets_conflict(&subsets));
    }

    #[test]
    fn test_single_viable_alt() {
        let a: AltSet = [1, 2].into_iter().collect();
        let b: AltSet = [1, 3].into_iter().collect();
        assert_eq!(resolves_to_just_one_viable_alt(&[a.clone(), b.clone()]), Some(1));
        let c: AltSet = [2, 3].into_iter().collect();
        assert_eq!(resolves_to_just_one_viable_alt(&[a, c]), None);
        assert!(all_subsets_equal(&[b.clone(), b]));
    }

    #[test]
    fn test_unique_alt() {
        assert_eq!(unique_alt(&set(&[(1, 2, 9), (3, 2, 8)])), Some(2));
        assert_eq!(unique_alt(&set(&[(1, 2, 9), (3, 1, 8)])), None);
        assert_eq!(unique_alt(&AtnConfigSet::new(false)), None);
    }

    #[test]
    fn test_state_associated_with_one_alt() {
        assert!(has_state_associated_with_one_alt(&set(&[(1, 1, 9), (2, 2, 9)])));
        assert!(!has_state_associated_with_one_alt(&set(&[(1, 1, 9), (1, 2, 9)])));
    }
}
