use super::state::StateId;
use super::transition::TransitionKind;
use super::Atn;
use crate::context::{ContextRef, EMPTY_RETURN_STATE};
use crate::misc::IntervalSet;
use crate::token::{EOF, EPSILON, MIN_USER_TOKEN_TYPE};
use hashbrown::HashSet;
use smallvec::SmallVec;

/// Upper bound on states visited by one lookahead computation.
const MAX_LOOK_VISITS: usize = 100_000;

/// Call stack used while computing lookahead.
///
/// `frames` are return states pushed during the walk, innermost last. `bottom` is
/// the caller-supplied context below them; `None` means "unknown", which makes the
/// end of the starting rule contribute [`EPSILON`].
#[derive(Clone, PartialEq, Eq, Hash)]
struct LookStack {
    frames: SmallVec<[u32; 4]>,
    bottom: Option<ContextRef>,
}

/// Computes LL(1) lookahead sets over an ATN, ignoring predicates.
pub struct Ll1Analyzer<'a> {
    atn: &'a Atn,
}

struct LookWalk {
    look: IntervalSet,
    busy: HashSet<(StateId, LookStack)>,
    called_rules: HashSet<usize>,
    visits: usize,
    stop: Option<StateId>,
}

impl<'a> Ll1Analyzer<'a> {
    #[must_use]
    pub const fn new(atn: &'a Atn) -> Self {
        Self { atn }
    }

    /// Symbols that can follow `state`.
    ///
    /// Reaching `stop` (or the end of the starting rule when `context` is `None`)
    /// adds [`EPSILON`]. With a context, reaching the end of the outermost rule adds [`EOF`].
    #[must_use]
    pub fn look(&self, state: StateId, stop: Option<StateId>, context: Option<ContextRef>) -> IntervalSet {
        let mut walk = LookWalk {
            look: IntervalSet::new(),
            busy: HashSet::new(),
            called_rules: HashSet::new(),
            visits: 0,
            stop,
        };
        let stack = LookStack {
            frames: SmallVec::new(),
            bottom: context,
        };
        self.walk(state, stack, &mut walk);
        if walk.visits > MAX_LOOK_VISITS {
            tracing::warn!(state = state.0, "lookahead computation truncated");
        }
        walk.look
    }

    fn walk(&self, s: StateId, stack: LookStack, w: &mut LookWalk) {
        w.visits += 1;
        if w.visits > MAX_LOOK_VISITS {
            return;
        }
        if !w.busy.insert((s, stack.clone())) {
            return;
        }
        let state = self.atn.state(s);
        if Some(s) == w.stop || state.is_rule_stop() {
            if stack.frames.is_empty() {
                match &stack.bottom {
                    None => {
                        w.look.add(EPSILON);
                        return;
                    }
                    Some(ctx) if ctx.is_empty() => {
                        w.look.add(EOF);
                        return;
                    }
                    Some(_) => {}
                }
            }
        }
        if state.is_rule_stop() {
            let removed = state.rule_index.is_some_and(|r| w.called_rules.remove(&r));
            let mut frames = stack.frames.clone();
            if let Some(return_state) = frames.pop() {
                self.walk(
                    StateId(return_state),
                    LookStack {
                        frames,
                        bottom: stack.bottom.clone(),
                    },
                    w,
                );
            } else if let Some(ctx) = &stack.bottom {
                for i in 0..ctx.len() {
                    let return_state = ctx.return_state(i);
                    if return_state == EMPTY_RETURN_STATE {
                        w.look.add(EOF);
                        continue;
                    }
                    let parent = ctx.parent(i).cloned();
                    self.walk(
                        StateId(return_state),
                        LookStack {
                            frames: SmallVec::new(),
                            bottom: parent,
                        },
                        w,
                    );
                }
            }
            if removed {
                if let Some(r) = state.rule_index {
                    w.called_rules.insert(r);
                }
            }
            return;
        }

        for t in state.transitions() {
            match &t.kind {
                TransitionKind::Rule { follow_state, .. } => {
                    let Some(callee) = self.atn.state(t.target).rule_index else {
                        continue;
                    };
                    if w.called_rules.contains(&callee) {
                        continue;
                    }
                    let mut pushed = stack.clone();
                    pushed.frames.push(follow_state.0);
                    w.called_rules.insert(callee);
                    self.walk(t.target, pushed, w);
                    w.called_rules.remove(&callee);
                }
                TransitionKind::Predicate { .. }
                | TransitionKind::Precedence { .. }
                | TransitionKind::Epsilon { .. }
                | TransitionKind::Action { .. } => self.walk(t.target, stack.clone(), w),
                TransitionKind::Wildcard => {
                    w.look.add_range(MIN_USER_TOKEN_TYPE, self.atn.max_token_type);
                }
                TransitionKind::NotSet { set } => {
                    let vocabulary = IntervalSet::of_range(MIN_USER_TOKEN_TYPE, self.atn.max_token_type);
                    w.look.add_set(&set.complement(&vocabulary));
                }
                _ => {
                    if let Some(label) = t.label() {
                        w.look.add_set(&label);
                    }
                }
            }
        }
    }
}
