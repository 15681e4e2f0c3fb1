use super::simulator::LexerAtnSimulator;
use crate::atn::LexerControl;
use crate::cache::SharedCache;
use crate::error::RecognitionError;
use crate::recognizer::{ConsoleErrorListener, DefaultRecognizer, ErrorListener, Recognizer};
use crate::stream::{CharStream, TokenSource};
use crate::token::{Token, DEFAULT_CHANNEL, EOF, INVALID_TYPE};
use compact_str::CompactString;
use std::sync::Arc;

/// Mode every lexer starts in.
pub const DEFAULT_MODE: usize = 0;

/// What the actions of the last match asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Emit,
    Skip,
    More,
}

/// Per-token state the lexer commands write to.
#[derive(Debug)]
struct TokenState<R> {
    recognizer: R,
    token_type: i32,
    channel: i32,
    disposition: Disposition,
    mode: usize,
    mode_stack: Vec<usize>,
}

impl<R: Recognizer> LexerControl for TokenState<R> {
    fn skip(&mut self) {
        self.disposition = Disposition::Skip;
    }

    fn more(&mut self) {
        self.disposition = Disposition::More;
    }

    fn set_type(&mut self, token_type: i32) {
        self.token_type = token_type;
    }

    fn set_channel(&mut self, channel: i32) {
        self.channel = channel;
    }

    fn set_mode(&mut self, mode: usize) {
        self.mode = mode;
    }

    fn push_mode(&mut self, mode: usize) {
        tracing::trace!(from = self.mode, to = mode, "push mode");
        self.mode_stack.push(self.mode);
        self.mode = mode;
    }

    fn pop_mode(&mut self) -> bool {
        match self.mode_stack.pop() {
            Some(mode) => {
                tracing::trace!(from = self.mode, to = mode, "pop mode");
                self.mode = mode;
                true
            }
            None => false,
        }
    }

    fn custom_action(&mut self, rule_index: usize, action_index: usize) {
        self.recognizer.action(rule_index, action_index);
    }
}

/// Turns a character stream into tokens.
///
/// Each call to [`next_token`](TokenSource::next_token) matches the longest token of
/// the current mode, runs the winning rule's commands and emits, skips or extends
/// the token accordingly. Unmatchable input is reported to the error listener,
/// one code point is dropped and lexing continues.
///
/// ```rust
/// use sipha_atn::cache::SharedCache;
/// use sipha_atn::lexer::Lexer;
/// use sipha_atn::stream::CodePointStream;
/// use sipha_atn::testing::grammar::{Element, LexerGrammar};
/// use std::sync::Arc;
///
/// let atn = LexerGrammar::new()
///     .rule("ID", 1, vec![vec![Element::plus(vec![vec![Element::range('a', 'z')]])]])
///     .rule("WS", 2, vec![vec![Element::text(" "), Element::skip()]])
///     .build()
///     .unwrap();
/// let cache = Arc::new(SharedCache::new(Arc::new(atn)));
/// let mut lexer = Lexer::new(cache, CodePointStream::new("ab cd"));
/// let tokens = lexer.all_tokens().unwrap();
/// let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(texts, ["ab", "cd", ""]);
/// ```
pub struct Lexer<I, R = DefaultRecognizer> {
    interpreter: LexerAtnSimulator,
    input: I,
    state: TokenState<R>,
    listener: Box<dyn ErrorListener>,
    token_start_index: usize,
    token_start_line: usize,
    token_start_column: usize,
    hit_eof: bool,
    emitted: usize,
}

impl<I: CharStream> Lexer<I> {
    /// A lexer without embedded grammar code, reporting errors to stderr.
    #[must_use]
    pub fn new(cache: Arc<SharedCache>, input: I) -> Self {
        Self::with_recognizer(cache, input, DefaultRecognizer)
    }
}

impl<I: CharStream, R: Recognizer> Lexer<I, R> {
    #[must_use]
    pub fn with_recognizer(cache: Arc<SharedCache>, input: I, recognizer: R) -> Self {
        Self {
            interpreter: LexerAtnSimulator::new(cache),
            input,
            state: TokenState {
                recognizer,
                token_type: INVALID_TYPE,
                channel: DEFAULT_CHANNEL,
                disposition: Disposition::Emit,
                mode: DEFAULT_MODE,
                mode_stack: Vec::new(),
            },
            listener: Box::new(ConsoleErrorListener),
            token_start_index: 0,
            token_start_line: 1,
            token_start_column: 0,
            hit_eof: false,
            emitted: 0,
        }
    }

    pub fn set_error_listener(&mut self, listener: Box<dyn ErrorListener>) {
        self.listener = listener;
    }

    #[must_use]
    pub fn interpreter(&self) -> &LexerAtnSimulator {
        &self.interpreter
    }

    #[must_use]
    pub fn input(&self) -> &I {
        &self.input
    }

    #[must_use]
    pub fn recognizer(&self) -> &R {
        &self.state.recognizer
    }

    pub fn recognizer_mut(&mut self) -> &mut R {
        &mut self.state.recognizer
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> usize {
        self.state.mode
    }

    pub fn set_mode(&mut self, mode: usize) {
        self.state.set_mode(mode);
    }

    pub fn push_mode(&mut self, mode: usize) {
        self.state.push_mode(mode);
    }

    /// Returns to the mode saved by the last [`push_mode`](Self::push_mode).
    ///
    /// # Errors
    ///
    /// [`RecognitionError::ModeStackUnderflow`] when no mode was pushed.
    pub fn pop_mode(&mut self) -> Result<usize, RecognitionError> {
        if self.state.pop_mode() {
            Ok(self.state.mode)
        } else {
            Err(RecognitionError::ModeStackUnderflow {
                index: self.input.index(),
            })
        }
    }

    #[must_use]
    pub fn mode_stack(&self) -> &[usize] {
        &self.state.mode_stack
    }

    /// Rewinds to the start of the input and the default mode. The shared DFAs are kept.
    pub fn reset(&mut self) {
        self.input.seek(0);
        self.interpreter.reset();
        self.state.token_type = INVALID_TYPE;
        self.state.channel = DEFAULT_CHANNEL;
        self.state.disposition = Disposition::Emit;
        self.state.mode = DEFAULT_MODE;
        self.state.mode_stack.clear();
        self.hit_eof = false;
        self.emitted = 0;
    }

    /// Drops one code point after a token recognition error.
    pub fn recover(&mut self) {
        if self.input.la(1) != EOF {
            self.interpreter.consume(&mut self.input);
        }
    }

    /// Every remaining token, ending with EOF.
    ///
    /// # Errors
    ///
    /// Propagates errors from lexer commands, such as popping an empty mode stack.
    pub fn all_tokens(&mut self) -> Result<Vec<Token>, RecognitionError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.is_eof();
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn notify_token_error(&mut self, error: &RecognitionError) {
        let text = self.input.text(self.token_start_index, self.input.index() + 1);
        let message = format!("token recognition error at: '{}'", escape(&text));
        tracing::debug!(
            line = self.token_start_line,
            column = self.token_start_column,
            %message,
            "lexer error"
        );
        self.listener
            .syntax_error(self.token_start_line, self.token_start_column, &message, Some(error));
    }

    fn emit(&mut self) -> Token {
        let end = self.input.index();
        let token = Token {
            token_type: self.state.token_type,
            channel: self.state.channel,
            start: self.token_start_index,
            end,
            line: self.token_start_line,
            column: self.token_start_column,
            text: CompactString::from(self.input.text(self.token_start_index, end)),
            token_index: self.emitted,
        };
        self.emitted += 1;
        token
    }

    fn emit_eof(&mut self) -> Token {
        let index = self.input.index();
        let token = Token {
            token_type: EOF,
            channel: DEFAULT_CHANNEL,
            start: index,
            end: index,
            line: self.interpreter.line(),
            column: self.interpreter.column(),
            text: CompactString::default(),
            token_index: self.emitted,
        };
        self.emitted += 1;
        token
    }
}

impl<I: CharStream, R: Recognizer> TokenSource for Lexer<I, R> {
    fn next_token(&mut self) -> Result<Token, RecognitionError> {
        'outer: loop {
            if self.hit_eof {
                return Ok(self.emit_eof());
            }
            self.state.channel = DEFAULT_CHANNEL;
            self.token_start_index = self.input.index();
            self.token_start_line = self.interpreter.line();
            self.token_start_column = self.interpreter.column();
            loop {
                self.state.token_type = INVALID_TYPE;
                self.state.disposition = Disposition::Emit;
                let start = self.input.index();
                let matched = self
                    .interpreter
                    .match_token(&mut self.input, self.state.mode, &mut self.state.recognizer);
                let token_type = match matched {
                    Ok(m) => {
                        if let Some(executor) = m.action_executor {
                            executor.execute(&mut self.state, &mut self.input, start)?;
                        }
                        m.token_type
                    }
                    Err(error) => {
                        self.notify_token_error(&error);
                        self.recover();
                        self.state.disposition = Disposition::Skip;
                        INVALID_TYPE
                    }
                };
                if self.input.la(1) == EOF {
                    self.hit_eof = true;
                }
                if self.state.token_type == INVALID_TYPE {
                    self.state.token_type = token_type;
                }
                match self.state.disposition {
                    Disposition::Skip => continue 'outer,
                    Disposition::More => continue,
                    Disposition::Emit => break,
                }
            }
            if self.state.token_type == EOF {
                return Ok(self.emit_eof());
            }
            return Ok(self.emit());
        }
    }

    fn line(&self) -> usize {
        self.interpreter.line()
    }

    fn column(&self) -> usize {
        self.interpreter.column()
    }

    fn source_name(&self) -> &str {
        self.input.source_name()
    }
}

fn escape(text: &str) -> String {
    text.replace('\n', "\\n").replace('\r', "\\r").replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atn::LexerAction;
    use crate::recognizer::SilentErrorListener;
    use crate::stream::CodePointStream;
    use crate::testing::grammar::{Element, LexerGrammar};

    fn lexer(grammar: LexerGrammar, text: &str) -> Lexer<CodePointStream> {
        let atn = grammar.build().unwrap();
        let mut lexer = Lexer::new(Arc::new(SharedCache::new(Arc::new(atn))), CodePointStream::new(text));
        lexer.set_error_listener(Box::new(SilentErrorListener));
        lexer
    }

    fn kinds(tokens: &[Token]) -> Vec<i32> {
        tokens.iter().map(|t| t.token_type).collect()
    }

    fn ident() -> Vec<Vec<Element>> {
        vec![vec![Element::plus(vec![vec![Element::range('a', 'z')]])]]
    }

    #[test]
    fn test_positions_and_lines() {
        let mut lx = lexer(
            LexerGrammar::new()
                .rule("ID", 1, ident())
                .rule("NL", 2, vec![vec![Element::text("\n"), Element::skip()]]),
            "ab\ncd",
        );
        let tokens = lx.all_tokens().unwrap();
        assert_eq!(kinds(&tokens), [1, 1, EOF]);
        assert_eq!((tokens[1].line, tokens[1].column), (2, 0));
        assert_eq!((tokens[1].start, tokens[1].end), (3, 5));
        assert_eq!(tokens[1].token_index, 1);
        assert_eq!(tokens[2].start, 5);
    }

    #[test]
    fn test_channel_and_type_commands() {
        let mut lx = lexer(
            LexerGrammar::new()
                .rule("ID", 1, ident())
                .rule(
                    "WS",
                    2,
                    vec![vec![Element::text(" "), Element::action(LexerAction::Channel(1))]],
                )
                .rule(
                    "DASH",
                    3,
                    vec![vec![Element::text("-"), Element::action(LexerAction::Type(1))]],
                ),
            "a -",
        );
        let tokens = lx.all_tokens().unwrap();
        assert_eq!(kinds(&tokens), [1, 2, 1, EOF]);
        assert_eq!(tokens[1].channel, 1);
    }

    #[test]
    fn test_more_extends_token() {
        let mut lx = lexer(
            LexerGrammar::new()
                .rule("HASH", 1, vec![vec![Element::text("#"), Element::more()]])
                .rule("ID", 2, ident()),
            "#ab",
        );
        let tokens = lx.all_tokens().unwrap();
        assert_eq!(kinds(&tokens), [2, EOF]);
        assert_eq!(tokens[0].text, "#ab");
    }

    #[test]
    fn test_modes() {
        // mode 0: '"' -> pushMode(1); ID. mode 1: '"' -> popMode; any other char
        let mut lx = lexer(
            LexerGrammar::new()
                .rule(
                    "OPEN",
                    1,
                    vec![vec![Element::text("\""), Element::action(LexerAction::PushMode(1))]],
                )
                .rule("ID", 2, ident())
                .mode()
                .rule(
                    "CLOSE",
                    3,
                    vec![vec![Element::text("\""), Element::action(LexerAction::PopMode)]],
                )
                .rule("CHAR", 4, vec![vec![Element::not_set(&['"'])]]),
            "a\"b\"c",
        );
        let tokens = lx.all_tokens().unwrap();
        assert_eq!(kinds(&tokens), [2, 1, 4, 3, 2, EOF]);
        assert!(lx.mode_stack().is_empty());
        assert_eq!(lx.mode(), DEFAULT_MODE);
    }

    #[test]
    fn test_pop_mode_underflow_is_an_error() {
        let mut lx = lexer(
            LexerGrammar::new().rule("X", 1, vec![vec![Element::text("x"), Element::action(LexerAction::PopMode)]]),
            "x",
        );
        assert!(matches!(
            lx.next_token(),
            Err(RecognitionError::ModeStackUnderflow { .. })
        ));
    }

    #[test]
    fn test_recovery_drops_unmatched_input() {
        #[derive(Default)]
        struct Recording(Vec<String>);
        impl ErrorListener for Recording {
            fn syntax_error(&mut self, line: usize, column: usize, message: &str, _: Option<&RecognitionError>) {
                self.0.push(format!("{line}:{column} {message}"));
            }
        }
        let atn = LexerGrammar::new().rule("ID", 1, ident()).build().unwrap();
        let mut lx = Lexer::new(Arc::new(SharedCache::new(Arc::new(atn))), CodePointStream::new("a?b"));
        lx.set_error_listener(Box::new(Recording::default()));
        let tokens = lx.all_tokens().unwrap();
        assert_eq!(kinds(&tokens), [1, 1, EOF]);
        assert_eq!(tokens[1].text, "b");
        assert_eq!(tokens[1].column, 2);
    }

    #[test]
    fn test_custom_actions_reach_recognizer() {
        #[derive(Default)]
        struct Counter(Vec<(usize, usize)>);
        impl Recognizer for Counter {
            fn action(&mut self, rule_index: usize, action_index: usize) {
                self.0.push((rule_index, action_index));
            }
        }
        let atn = LexerGrammar::new()
            .rule(
                "ID",
                1,
                vec![vec![
                    Element::plus(vec![vec![Element::range('a', 'z')]]),
                    Element::action(LexerAction::Custom {
                        rule_index: 0,
                        action_index: 4,
                    }),
                ]],
            )
            .build()
            .unwrap();
        let mut lx = Lexer::with_recognizer(
            Arc::new(SharedCache::new(Arc::new(atn))),
            CodePointStream::new("abc"),
            Counter::default(),
        );
        lx.next_token().unwrap();
        assert_eq!(lx.recognizer().0, [(0, 4)]);
    }
}
