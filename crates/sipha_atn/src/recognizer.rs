//! # Recognizer Callbacks and Diagnostics
//!
//! The simulators never run grammar code themselves. Predicates, precedence checks
//! and custom actions are delegated to a [`Recognizer`], and everything worth telling
//! the user about goes through an [`ErrorListener`].

use crate::config::AtnConfigSet;
use crate::error::RecognitionError;
use crate::misc::AltSet;
use crate::token::EOF;
use compact_str::CompactString;

/// Host-side behavior the simulators call back into.
///
/// The defaults describe a grammar without embedded code: every predicate holds,
/// every precedence check passes and actions do nothing.
pub trait Recognizer {
    /// Evaluates predicate `pred_index` of rule `rule_index`.
    fn sempred(&mut self, rule_index: usize, pred_index: usize, is_ctx_dependent: bool) -> bool {
        let _ = (rule_index, pred_index, is_ctx_dependent);
        true
    }

    /// Evaluates `{precpred(_ctx, precedence)}?` against the active precedence level.
    fn precpred(&mut self, precedence: i32) -> bool {
        precedence >= self.precedence()
    }

    /// Precedence level of the innermost left-recursive rule invocation.
    fn precedence(&self) -> i32 {
        0
    }

    /// Runs custom action `action_index` of rule `rule_index`.
    fn action(&mut self, rule_index: usize, action_index: usize) {
        let _ = (rule_index, action_index);
    }
}

/// A recognizer with no embedded grammar code.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRecognizer;

impl Recognizer for DefaultRecognizer {}

/// Receiver of syntax errors and prediction diagnostics.
///
/// All methods default to doing nothing, so listeners override only what they need.
pub trait ErrorListener {
    fn syntax_error(
        &mut self,
        line: usize,
        column: usize,
        message: &str,
        error: Option<&RecognitionError>,
    ) {
        let _ = (line, column, message, error);
    }

    /// Full-context prediction found input that several alternatives match.
    fn report_ambiguity(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        let _ = (decision, start_index, stop_index, exact, ambig_alts, configs);
    }

    /// SLL prediction conflicted and prediction is retrying with full context.
    fn report_attempting_full_context(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        conflicting_alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        let _ = (decision, start_index, stop_index, conflicting_alts, configs);
    }

    /// Full-context prediction resolved a conflict SLL could not, to `prediction`.
    fn report_context_sensitivity(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        prediction: usize,
        configs: &AtnConfigSet,
    ) {
        let _ = (decision, start_index, stop_index, prediction, configs);
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentErrorListener;

impl ErrorListener for SilentErrorListener {}

/// Prints syntax errors to stderr as `line L:C msg`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleErrorListener;

impl ErrorListener for ConsoleErrorListener {
    fn syntax_error(
        &mut self,
        line: usize,
        column: usize,
        message: &str,
        _error: Option<&RecognitionError>,
    ) {
        eprintln!("line {line}:{column} {message}");
    }
}

/// Forwards every event to each of its listeners in order.
#[derive(Default)]
pub struct ProxyErrorListener<'a> {
    listeners: Vec<&'a mut dyn ErrorListener>,
}

impl<'a> ProxyErrorListener<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: &'a mut dyn ErrorListener) {
        self.listeners.push(listener);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl ErrorListener for ProxyErrorListener<'_> {
    fn syntax_error(
        &mut self,
        line: usize,
        column: usize,
        message: &str,
        error: Option<&RecognitionError>,
    ) {
        for l in &mut self.listeners {
            l.syntax_error(line, column, message, error);
        }
    }

    fn report_ambiguity(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        exact: bool,
        ambig_alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        for l in &mut self.listeners {
            l.report_ambiguity(decision, start_index, stop_index, exact, ambig_alts, configs);
        }
    }

    fn report_attempting_full_context(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        conflicting_alts: &AltSet,
        configs: &AtnConfigSet,
    ) {
        for l in &mut self.listeners {
            l.report_attempting_full_context(decision, start_index, stop_index, conflicting_alts, configs);
        }
    }

    fn report_context_sensitivity(
        &mut self,
        decision: usize,
        start_index: usize,
        stop_index: usize,
        prediction: usize,
        configs: &AtnConfigSet,
    ) {
        for l in &mut self.listeners {
            l.report_context_sensitivity(decision, start_index, stop_index, prediction, configs);
        }
    }
}

/// Display names for token types.
///
/// `literal_names[t]` is the quoted literal of token `t` (`'+'`), `symbolic_names[t]`
/// its rule name (`PLUS`). Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    literal_names: Vec<Option<CompactString>>,
    symbolic_names: Vec<Option<CompactString>>,
}

impl Vocabulary {
    #[must_use]
    pub fn new(literal_names: Vec<Option<CompactString>>, symbolic_names: Vec<Option<CompactString>>) -> Self {
        Self {
            literal_names,
            symbolic_names,
        }
    }

    /// Builds a vocabulary from symbolic names only, starting at token type 1.
    #[must_use]
    pub fn from_symbolic<S: AsRef<str>>(names: &[S]) -> Self {
        let mut symbolic = vec![None];
        symbolic.extend(names.iter().map(|n| Some(CompactString::new(n.as_ref()))));
        Self {
            literal_names: Vec::new(),
            symbolic_names: symbolic,
        }
    }

    fn lookup(names: &[Option<CompactString>], token_type: i32) -> Option<&str> {
        usize::try_from(token_type)
            .ok()
            .and_then(|i| names.get(i))
            .and_then(|n| n.as_deref())
    }

    #[must_use]
    pub fn literal_name(&self, token_type: i32) -> Option<&str> {
        Self::lookup(&self.literal_names, token_type)
    }

    #[must_use]
    pub fn symbolic_name(&self, token_type: i32) -> Option<&str> {
        if token_type == EOF {
            return Some("EOF");
        }
        Self::lookup(&self.symbolic_names, token_type)
    }

    /// Literal name if there is one, else the symbolic name, else the number.
    #[must_use]
    pub fn display_name(&self, token_type: i32) -> String {
        self.literal_name(token_type)
            .or_else(|| self.symbolic_name(token_type))
            .map_or_else(|| token_type.to_string(), str::to_string)
    }

    #[must_use]
    pub fn max_token_type(&self) -> usize {
        self.literal_names
            .len()
            .max(self.symbolic_names.len())
            .saturating_sub(1)
    }
}
