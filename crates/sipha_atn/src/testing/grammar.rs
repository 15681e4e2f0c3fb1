//! # Grammar Fixtures
//!
//! A small grammar notation compiled straight to an ATN, so tests and examples do
//! not need serialized ATNs from an external tool.
//!
//! ```rust
//! use sipha_atn::testing::grammar::{Element, ParserGrammar};
//!
//! // s : A ( B | C )* ;
//! let atn = ParserGrammar::new()
//!     .rule(
//!         "s",
//!         vec![vec![
//!             Element::token(1),
//!             Element::star(vec![vec![Element::token(2)], vec![Element::token(3)]]),
//!         ]],
//!     )
//!     .build()
//!     .unwrap();
//! assert_eq!(atn.number_of_decisions(), 2);
//! ```
//!
//! Decisions are numbered in the order their states are created: rule blocks first,
//! then nested blocks in grammar order. A loop's own decision comes before the
//! decision of the block it repeats.

use crate::atn::{
    Atn, AtnBuilder, AtnDeserializationOptions, GrammarType, LexerAction, StateId, StateKind, Transition,
    TransitionKind,
};
use crate::error::AtnError;
use crate::misc::IntervalSet;
use crate::token::EOF;
use compact_str::CompactString;
use hashbrown::HashMap;
use thiserror::Error;

/// Errors raised while compiling a fixture grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("reference to undefined rule `{0}`")]
    UnknownRule(CompactString),

    #[error("rule `{0}` is defined twice")]
    DuplicateRule(CompactString),

    #[error(transparent)]
    Atn(#[from] AtnError),
}

/// One element of an alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    Atom(i32),
    Range(i32, i32),
    Set(IntervalSet),
    NotSet(IntervalSet),
    Wildcard,
    /// Literal text, one atom per code point.
    Text(CompactString),
    Rule {
        name: CompactString,
        precedence: i32,
    },
    Predicate {
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    /// `{precpred(_ctx, n)}?`
    Precedence(i32),
    /// Embedded parser action.
    Action(usize),
    /// Lexer command.
    Command(LexerAction),
    Block(Vec<Vec<Element>>),
    Optional {
        alts: Vec<Vec<Element>>,
        greedy: bool,
    },
    Star {
        alts: Vec<Vec<Element>>,
        greedy: bool,
    },
    Plus {
        alts: Vec<Vec<Element>>,
        greedy: bool,
    },
}

fn char_set(chars: &[char]) -> IntervalSet {
    let mut set = IntervalSet::new();
    for &c in chars {
        set.add(c as i32);
    }
    set
}

impl Element {
    #[must_use]
    pub fn token(token_type: i32) -> Self {
        Self::Atom(token_type)
    }

    #[must_use]
    pub fn eof() -> Self {
        Self::Atom(EOF)
    }

    /// Inclusive range of code points.
    #[must_use]
    pub fn range(start: char, stop: char) -> Self {
        Self::Range(start as i32, stop as i32)
    }

    #[must_use]
    pub fn token_range(start: i32, stop: i32) -> Self {
        Self::Range(start, stop)
    }

    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::Text(CompactString::from(text))
    }

    #[must_use]
    pub fn set(chars: &[char]) -> Self {
        Self::Set(char_set(chars))
    }

    #[must_use]
    pub fn not_set(chars: &[char]) -> Self {
        Self::NotSet(char_set(chars))
    }

    #[must_use]
    pub fn token_set(tokens: &[i32]) -> Self {
        let mut set = IntervalSet::new();
        for &t in tokens {
            set.add(t);
        }
        Self::Set(set)
    }

    #[must_use]
    pub fn wildcard() -> Self {
        Self::Wildcard
    }

    #[must_use]
    pub fn rule(name: &str) -> Self {
        Self::rule_with_precedence(name, 0)
    }

    /// Call of a precedence rule, as in `e[3]`.
    #[must_use]
    pub fn rule_with_precedence(name: &str, precedence: i32) -> Self {
        Self::Rule {
            name: CompactString::from(name),
            precedence,
        }
    }

    #[must_use]
    pub fn predicate(pred_index: usize) -> Self {
        Self::Predicate {
            pred_index,
            is_ctx_dependent: false,
        }
    }

    /// A predicate that reads the rule's local context, such as `$x` or `$ctx`.
    #[must_use]
    pub fn ctx_predicate(pred_index: usize) -> Self {
        Self::Predicate {
            pred_index,
            is_ctx_dependent: true,
        }
    }

    #[must_use]
    pub fn precpred(precedence: i32) -> Self {
        Self::Precedence(precedence)
    }

    #[must_use]
    pub fn parser_action(action_index: usize) -> Self {
        Self::Action(action_index)
    }

    #[must_use]
    pub fn action(action: LexerAction) -> Self {
        Self::Command(action)
    }

    #[must_use]
    pub fn skip() -> Self {
        Self::Command(LexerAction::Skip)
    }

    #[must_use]
    pub fn more() -> Self {
        Self::Command(LexerAction::More)
    }

    #[must_use]
    pub fn block(alts: Vec<Vec<Element>>) -> Self {
        Self::Block(alts)
    }

    #[must_use]
    pub fn optional(alts: Vec<Vec<Element>>) -> Self {
        Self::Optional { alts, greedy: true }
    }

    #[must_use]
    pub fn star(alts: Vec<Vec<Element>>) -> Self {
        Self::Star { alts, greedy: true }
    }

    #[must_use]
    pub fn plus(alts: Vec<Vec<Element>>) -> Self {
        Self::Plus { alts, greedy: true }
    }

    /// `( ... )*?`
    #[must_use]
    pub fn lazy_star(alts: Vec<Vec<Element>>) -> Self {
        Self::Star { alts, greedy: false }
    }

    /// `( ... )+?`
    #[must_use]
    pub fn lazy_plus(alts: Vec<Vec<Element>>) -> Self {
        Self::Plus { alts, greedy: false }
    }

    /// `( ... )??`
    #[must_use]
    pub fn lazy_optional(alts: Vec<Vec<Element>>) -> Self {
        Self::Optional { alts, greedy: false }
    }

    fn max_symbol(&self) -> i32 {
        let nested = |alts: &Vec<Vec<Element>>| {
            alts.iter()
                .flatten()
                .map(Element::max_symbol)
                .max()
                .unwrap_or(0)
        };
        match self {
            Self::Atom(t) => *t,
            Self::Range(_, stop) => *stop,
            Self::Set(set) | Self::NotSet(set) => set.max_element().unwrap_or(0),
            Self::Text(text) => text.chars().map(|c| c as i32).max().unwrap_or(0),
            Self::Block(alts)
            | Self::Optional { alts, .. }
            | Self::Star { alts, .. }
            | Self::Plus { alts, .. } => nested(alts),
            _ => 0,
        }
    }
}

/// Body of a parser rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleBody {
    Alternatives(Vec<Vec<Element>>),
    /// A left-recursive rule rewritten as a precedence loop:
    /// `primary ( {precpred(p)}? suffix )*`.
    Precedence {
        primary: Vec<Vec<Element>>,
        suffixes: Vec<(i32, Vec<Element>)>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDef {
    pub name: CompactString,
    pub body: RuleBody,
    /// Token type emitted by a lexer rule. `None` for parser rules and fragments.
    pub token_type: Option<i32>,
    /// Fragments are only reachable from other lexer rules.
    pub fragment: bool,
    pub mode: usize,
}

impl RuleDef {
    /// Every alternative of the rule, with precedence suffixes as alternatives of
    /// their own.
    pub fn alternatives(&self) -> impl Iterator<Item = &Vec<Element>> {
        let (primary, suffixes): (&[Vec<Element>], &[(i32, Vec<Element>)]) = match &self.body {
            RuleBody::Alternatives(alts) => (alts.as_slice(), &[][..]),
            RuleBody::Precedence { primary, suffixes } => (primary.as_slice(), suffixes.as_slice()),
        };
        primary.iter().chain(suffixes.iter().map(|(_, alt)| alt))
    }
}

/// Parser grammar fixture. The first rule is the start rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserGrammar {
    rules: Vec<RuleDef>,
    max_token_type: Option<i32>,
}

impl ParserGrammar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the vocabulary size. Defaults to the largest token type mentioned.
    #[must_use]
    pub fn max_token_type(mut self, max_token_type: i32) -> Self {
        self.max_token_type = Some(max_token_type);
        self
    }

    #[must_use]
    pub fn rule(mut self, name: &str, alts: Vec<Vec<Element>>) -> Self {
        self.rules.push(RuleDef {
            name: CompactString::from(name),
            body: RuleBody::Alternatives(alts),
            token_type: None,
            fragment: false,
            mode: 0,
        });
        self
    }

    /// Adds a left-recursive rule in its rewritten form. Each suffix alternative is
    /// guarded by `{precpred(_ctx, p)}?` with its precedence `p`.
    ///
    /// `e : e '*' e | e '+' e | INT ;` becomes
    ///
    /// ```text
    /// precedence_rule("e", [[INT]], [(2, ['*', e[3]]), (1, ['+', e[2]])])
    /// ```
    #[must_use]
    pub fn precedence_rule(
        mut self,
        name: &str,
        primary: Vec<Vec<Element>>,
        suffixes: Vec<(i32, Vec<Element>)>,
    ) -> Self {
        self.rules.push(RuleDef {
            name: CompactString::from(name),
            body: RuleBody::Precedence { primary, suffixes },
            token_type: None,
            fragment: false,
            mode: 0,
        });
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[RuleDef] {
        &self.rules
    }

    #[must_use]
    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }

    /// Largest token type of the vocabulary.
    #[must_use]
    pub fn vocabulary_max(&self) -> i32 {
        self.max_token_type.unwrap_or_else(|| {
            self.rules
                .iter()
                .flat_map(RuleDef::alternatives)
                .flatten()
                .map(Element::max_symbol)
                .max()
                .unwrap_or(0)
                .max(1)
        })
    }

    /// Compiles the grammar with verification on.
    ///
    /// # Errors
    ///
    /// Undefined or duplicate rule names, or an ATN that fails verification.
    pub fn build(&self) -> Result<Atn, GrammarError> {
        self.build_with(&AtnDeserializationOptions::default())
    }

    pub fn build_with(&self, options: &AtnDeserializationOptions) -> Result<Atn, GrammarError> {
        let mut compiler = Compiler::new(GrammarType::Parser, self.vocabulary_max(), &self.rules)?;
        compiler.compile_rules()?;
        Ok(compiler.builder.build_with(options)?)
    }
}

/// Lexer grammar fixture. Rules belong to the mode opened most recently by
/// [`mode`](Self::mode); mode 0 is open initially.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexerGrammar {
    rules: Vec<RuleDef>,
    modes: usize,
}

impl LexerGrammar {
    #[must_use]
    pub fn new() -> Self {
        Self { rules: Vec::new(), modes: 1 }
    }

    /// Adds a token rule emitting `token_type`.
    #[must_use]
    pub fn rule(mut self, name: &str, token_type: i32, alts: Vec<Vec<Element>>) -> Self {
        self.rules.push(RuleDef {
            name: CompactString::from(name),
            body: RuleBody::Alternatives(alts),
            token_type: Some(token_type),
            fragment: false,
            mode: self.modes - 1,
        });
        self
    }

    #[must_use]
    pub fn fragment(mut self, name: &str, alts: Vec<Vec<Element>>) -> Self {
        self.rules.push(RuleDef {
            name: CompactString::from(name),
            body: RuleBody::Alternatives(alts),
            token_type: None,
            fragment: true,
            mode: self.modes - 1,
        });
        self
    }

    /// Opens the next mode.
    #[must_use]
    pub fn mode(mut self) -> Self {
        self.modes += 1;
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[RuleDef] {
        &self.rules
    }

    /// # Errors
    ///
    /// Undefined or duplicate rule names, or an ATN that fails verification.
    pub fn build(&self) -> Result<Atn, GrammarError> {
        let max = self
            .rules
            .iter()
            .filter_map(|r| r.token_type)
            .max()
            .unwrap_or(1);
        let mut compiler = Compiler::new(GrammarType::Lexer, max, &self.rules)?;
        let mut mode_starts = Vec::with_capacity(self.modes);
        for _ in 0..self.modes {
            let start = compiler.builder.add_state(StateKind::TokensStart, None);
            mode_starts.push(start);
        }
        compiler.compile_rules()?;
        for (mode, &start) in mode_starts.iter().enumerate() {
            compiler.builder.add_mode(start)?;
            let entries: Vec<StateId> = self
                .rules
                .iter()
                .zip(&compiler.rule_states)
                .filter(|(r, _)| r.mode == mode && !r.fragment)
                .map(|(_, &(rule_start, _))| rule_start)
                .collect();
            if entries.len() > 1 {
                compiler.builder.define_decision(start)?;
            }
            for rule_start in entries {
                compiler.builder.add_transition(start, Transition::epsilon(rule_start))?;
            }
        }
        Ok(compiler.builder.build()?)
    }
}

/// A compiled piece of the graph, entered at `left` and left at `right`.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    left: StateId,
    right: StateId,
}

struct Compiler<'g> {
    builder: AtnBuilder,
    rules: &'g [RuleDef],
    names: HashMap<&'g str, usize>,
    rule_states: Vec<(StateId, StateId)>,
    actions: Vec<LexerAction>,
}

impl<'g> Compiler<'g> {
    fn new(grammar_type: GrammarType, max_token_type: i32, rules: &'g [RuleDef]) -> Result<Self, GrammarError> {
        let mut builder = AtnBuilder::new(grammar_type, max_token_type);
        let mut names = HashMap::new();
        let mut rule_states = Vec::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            if names.insert(rule.name.as_str(), index).is_some() {
                return Err(GrammarError::DuplicateRule(rule.name.clone()));
            }
            let start = builder.add_state(
                StateKind::RuleStart {
                    stop_state: None,
                    is_left_recursive: matches!(rule.body, RuleBody::Precedence { .. }),
                },
                Some(index),
            );
            let stop = builder.add_state(StateKind::RuleStop, Some(index));
            builder.add_rule(start, rule.token_type)?;
            rule_states.push((start, stop));
        }
        Ok(Self {
            builder,
            rules,
            names,
            rule_states,
            actions: Vec::new(),
        })
    }

    fn compile_rules(&mut self) -> Result<(), GrammarError> {
        for (rule, def) in self.rules.iter().enumerate() {
            let (start, stop) = self.rule_states[rule];
            match &def.body {
                RuleBody::Alternatives(alts) => {
                    let body = self.alternatives(rule, alts)?;
                    self.epsilon(start, body.left)?;
                    self.epsilon(body.right, stop)?;
                }
                RuleBody::Precedence { primary, suffixes } => {
                    let body = self.alternatives(rule, primary)?;
                    self.epsilon(start, body.left)?;
                    let suffix_alts: Vec<Vec<Element>> = suffixes
                        .iter()
                        .map(|(p, alt)| {
                            let mut guarded = Vec::with_capacity(alt.len() + 1);
                            guarded.push(Element::Precedence(*p));
                            guarded.extend(alt.iter().cloned());
                            guarded
                        })
                        .collect();
                    let entry = self.star_loop(rule, &suffix_alts, true, Some(stop))?;
                    self.epsilon(body.right, entry.left)?;
                }
            }
        }
        Ok(())
    }

    fn epsilon(&mut self, from: StateId, to: StateId) -> Result<(), GrammarError> {
        Ok(self.builder.add_transition(from, Transition::epsilon(to))?)
    }

    fn basic(&mut self, rule: usize) -> StateId {
        self.builder.add_state(StateKind::Basic, Some(rule))
    }

    /// Two basic states joined by `kind`.
    fn edge(&mut self, rule: usize, kind: TransitionKind) -> Result<Fragment, GrammarError> {
        let left = self.basic(rule);
        let right = self.basic(rule);
        self.builder.add_transition(left, Transition::new(right, kind))?;
        Ok(Fragment { left, right })
    }

    /// A rule body or block: a plain sequence for one alternative, a decision block
    /// otherwise.
    fn alternatives(&mut self, rule: usize, alts: &[Vec<Element>]) -> Result<Fragment, GrammarError> {
        match alts {
            [single] => self.sequence(rule, single),
            _ => self.block(rule, StateKind::BlockStart { end_state: None }, alts, None),
        }
    }

    fn sequence(&mut self, rule: usize, elements: &[Element]) -> Result<Fragment, GrammarError> {
        let Some((first, rest)) = elements.split_first() else {
            let s = self.basic(rule);
            return Ok(Fragment { left: s, right: s });
        };
        let head = self.element(rule, first)?;
        let mut right = head.right;
        for element in rest {
            let next = self.element(rule, element)?;
            self.epsilon(right, next.left)?;
            right = next.right;
        }
        Ok(Fragment {
            left: head.left,
            right,
        })
    }

    /// Block start of `kind` leading to each alternative, all joined at a new block
    /// end. `bypass` adds an empty alternative first (`Some(false)`) or last
    /// (`Some(true)`).
    fn block(
        &mut self,
        rule: usize,
        kind: StateKind,
        alts: &[Vec<Element>],
        bypass: Option<bool>,
    ) -> Result<Fragment, GrammarError> {
        let start = self.builder.add_state(kind, Some(rule));
        let end = self.builder.add_state(StateKind::BlockEnd { start_state: None }, Some(rule));
        match self.builder.kind_mut(start)? {
            StateKind::BlockStart { end_state }
            | StateKind::StarBlockStart { end_state }
            | StateKind::PlusBlockStart { end_state, .. } => *end_state = Some(end),
            _ => {}
        }
        if alts.len() + usize::from(bypass.is_some()) > 1 {
            self.builder.define_decision(start)?;
        }
        if bypass == Some(false) {
            self.builder.set_non_greedy(start)?;
            self.epsilon(start, end)?;
        }
        for alt in alts {
            let body = self.sequence(rule, alt)?;
            self.epsilon(start, body.left)?;
            self.epsilon(body.right, end)?;
        }
        if bypass == Some(true) {
            self.epsilon(start, end)?;
        }
        Ok(Fragment {
            left: start,
            right: end,
        })
    }

    /// `( alts )*`. With `exit_to`, the loop end leads straight there, which is how
    /// precedence loops end their rule.
    fn star_loop(
        &mut self,
        rule: usize,
        alts: &[Vec<Element>],
        greedy: bool,
        exit_to: Option<StateId>,
    ) -> Result<Fragment, GrammarError> {
        let entry = self.builder.add_state(
            StateKind::StarLoopEntry {
                loop_back_state: None,
                is_precedence_decision: false,
            },
            Some(rule),
        );
        self.builder.define_decision(entry)?;
        let body = self.block(rule, StateKind::StarBlockStart { end_state: None }, alts, None)?;
        let loop_back = self.builder.add_state(StateKind::StarLoopBack, Some(rule));
        let loop_end = self.builder.add_state(
            StateKind::LoopEnd {
                loop_back_state: Some(loop_back),
            },
            Some(rule),
        );
        self.epsilon(body.right, loop_back)?;
        self.epsilon(loop_back, entry)?;
        if greedy {
            self.epsilon(entry, body.left)?;
            self.epsilon(entry, loop_end)?;
        } else {
            self.builder.set_non_greedy(entry)?;
            self.epsilon(entry, loop_end)?;
            self.epsilon(entry, body.left)?;
        }
        let right = match exit_to {
            Some(target) => {
                self.epsilon(loop_end, target)?;
                target
            }
            None => loop_end,
        };
        Ok(Fragment { left: entry, right })
    }

    /// `( alts )+`
    fn plus_loop(&mut self, rule: usize, alts: &[Vec<Element>], greedy: bool) -> Result<Fragment, GrammarError> {
        let loop_back = self.builder.add_state(StateKind::PlusLoopBack, Some(rule));
        self.builder.define_decision(loop_back)?;
        let body = self.block(
            rule,
            StateKind::PlusBlockStart {
                end_state: None,
                loop_back_state: None,
            },
            alts,
            None,
        )?;
        let loop_end = self.builder.add_state(
            StateKind::LoopEnd {
                loop_back_state: Some(loop_back),
            },
            Some(rule),
        );
        self.epsilon(body.right, loop_back)?;
        if greedy {
            self.epsilon(loop_back, body.left)?;
            self.epsilon(loop_back, loop_end)?;
        } else {
            self.builder.set_non_greedy(loop_back)?;
            self.epsilon(loop_back, loop_end)?;
            self.epsilon(loop_back, body.left)?;
        }
        Ok(Fragment {
            left: body.left,
            right: loop_end,
        })
    }

    fn element(&mut self, rule: usize, element: &Element) -> Result<Fragment, GrammarError> {
        match element {
            Element::Atom(t) => self.edge(rule, TransitionKind::Atom { label: *t }),
            Element::Range(start, stop) => self.edge(
                rule,
                TransitionKind::Range {
                    start: *start,
                    stop: *stop,
                },
            ),
            Element::Set(set) => self.edge(rule, TransitionKind::Set { set: set.clone() }),
            Element::NotSet(set) => self.edge(rule, TransitionKind::NotSet { set: set.clone() }),
            Element::Wildcard => self.edge(rule, TransitionKind::Wildcard),
            Element::Text(text) => {
                let atoms: Vec<Element> = text.chars().map(|c| Element::Atom(c as i32)).collect();
                self.sequence(rule, &atoms)
            }
            Element::Rule { name, precedence } => {
                let callee = *self
                    .names
                    .get(name.as_str())
                    .ok_or_else(|| GrammarError::UnknownRule(name.clone()))?;
                let left = self.basic(rule);
                let right = self.basic(rule);
                let transition = Transition::new(
                    self.rule_states[callee].0,
                    TransitionKind::Rule {
                        rule_index: callee,
                        precedence: *precedence,
                        follow_state: right,
                    },
                );
                self.builder.add_transition(left, transition)?;
                Ok(Fragment { left, right })
            }
            Element::Predicate {
                pred_index,
                is_ctx_dependent,
            } => self.edge(
                rule,
                TransitionKind::Predicate {
                    rule_index: rule,
                    pred_index: *pred_index,
                    is_ctx_dependent: *is_ctx_dependent,
                },
            ),
            Element::Precedence(precedence) => self.edge(
                rule,
                TransitionKind::Precedence {
                    precedence: *precedence,
                },
            ),
            Element::Action(action_index) => self.edge(
                rule,
                TransitionKind::Action {
                    rule_index: rule,
                    action_index: Some(*action_index),
                    is_ctx_dependent: false,
                },
            ),
            Element::Command(action) => {
                let index = match self.actions.iter().position(|a| a == action) {
                    Some(index) => index,
                    None => {
                        self.actions.push(action.clone());
                        self.builder.add_lexer_action(action.clone())
                    }
                };
                self.edge(
                    rule,
                    TransitionKind::Action {
                        rule_index: rule,
                        action_index: Some(index),
                        is_ctx_dependent: false,
                    },
                )
            }
            Element::Block(alts) => self.block(rule, StateKind::BlockStart { end_state: None }, alts, None),
            Element::Optional { alts, greedy } => {
                self.block(rule, StateKind::BlockStart { end_state: None }, alts, Some(*greedy))
            }
            Element::Star { alts, greedy } => self.star_loop(rule, alts, *greedy, None),
            Element::Plus { alts, greedy } => self.plus_loop(rule, alts, *greedy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_with_alternatives_defines_decision() {
        let atn = ParserGrammar::new()
            .rule("s", vec![vec![Element::token(1)], vec![Element::token(2)]])
            .build()
            .unwrap();
        assert_eq!(atn.number_of_decisions(), 1);
        let decision = atn.decision_state(0).unwrap();
        assert_eq!(atn.state(decision).transitions().len(), 2);
        assert_eq!(atn.max_token_type(), 2);
    }

    #[test]
    fn test_unknown_rule() {
        let err = ParserGrammar::new()
            .rule("s", vec![vec![Element::rule("x")]])
            .build()
            .unwrap_err();
        assert_eq!(err, GrammarError::UnknownRule("x".into()));
    }

    #[test]
    fn test_duplicate_rule() {
        let err = ParserGrammar::new()
            .rule("s", vec![vec![Element::token(1)]])
            .rule("s", vec![vec![Element::token(2)]])
            .build()
            .unwrap_err();
        assert_eq!(err, GrammarError::DuplicateRule("s".into()));
    }

    #[test]
    fn test_precedence_rule_marks_precedence_decision() {
        let atn = ParserGrammar::new()
            .precedence_rule(
                "e",
                vec![vec![Element::token(1)]],
                vec![(1, vec![Element::token(2), Element::rule_with_precedence("e", 2)])],
            )
            .build()
            .unwrap();
        assert!(atn.is_left_recursive_rule(0));
        let precedence_decisions = (0..atn.number_of_decisions())
            .filter_map(|d| atn.decision_state(d))
            .filter(|&s| atn.state(s).is_precedence_decision())
            .count();
        assert_eq!(precedence_decisions, 1);
    }

    #[test]
    fn test_lexer_modes_and_actions() {
        let atn = LexerGrammar::new()
            .rule("A", 1, vec![vec![Element::text("a"), Element::skip()]])
            .rule("B", 2, vec![vec![Element::text("b"), Element::skip()]])
            .mode()
            .rule("C", 3, vec![vec![Element::text("c")]])
            .build()
            .unwrap();
        assert_eq!(atn.mode_count(), 2);
        assert_eq!(atn.rule_token_type(2), Some(3));
        assert_eq!(atn.lexer_action(0), Some(&LexerAction::Skip));
        assert!(atn.lexer_action(1).is_none());
    }
}
