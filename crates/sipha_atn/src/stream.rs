//! # Symbol Streams
//!
//! The simulators read input through [`IntStream`]: a cursor over integer symbols
//! (code points for lexers, token types for parsers) with arbitrary lookahead and
//! the ability to seek back to an earlier index.
//!
//! ```rust
//! use sipha_atn::stream::{IntStream, SymbolStream};
//! use sipha_atn::token::EOF;
//!
//! let mut stream = SymbolStream::new(vec![4, 5]);
//! let checkpoint = stream.checkpoint();
//! assert_eq!(stream.la(1), 4);
//! stream.consume();
//! stream.consume();
//! assert_eq!(stream.la(1), EOF);
//! stream.restore(checkpoint);
//! assert_eq!(stream.la(2), 5);
//! ```

use crate::error::RecognitionError;
use crate::token::{Token, EOF};

/// A checkpoint for restoring stream position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamCheckpoint {
    /// The symbol index
    pub index: usize,
}

/// Cursor over a sequence of integer symbols.
pub trait IntStream {
    /// Symbol at `offset` relative to the cursor: `la(1)` is the next unconsumed
    /// symbol, `la(-1)` the previously consumed one. Returns [`EOF`] outside the input.
    fn la(&mut self, offset: isize) -> i32;

    /// Advances past the current symbol. Consuming at EOF is a no-op.
    fn consume(&mut self);

    /// Index of the next unconsumed symbol.
    fn index(&self) -> usize;

    /// Moves the cursor to `index`, clamped to the input length.
    fn seek(&mut self, index: usize);

    /// Number of symbols, when known.
    fn size(&self) -> Option<usize>;

    /// Create a checkpoint that can be used to restore position
    fn checkpoint(&self) -> StreamCheckpoint {
        StreamCheckpoint {
            index: self.index(),
        }
    }

    /// Restore to a previously saved checkpoint
    fn restore(&mut self, checkpoint: StreamCheckpoint) {
        self.seek(checkpoint.index);
    }

    /// Check if the stream is at the end
    fn is_at_end(&mut self) -> bool {
        self.la(1) == EOF
    }
}

/// A character stream that can also return slices of its text.
pub trait CharStream: IntStream {
    /// Text of the code points in `start..end`.
    fn text(&self, start: usize, end: usize) -> String;

    /// Name used in diagnostics.
    fn source_name(&self) -> &str {
        "<unknown>"
    }
}

/// A producer of tokens, such as [`crate::lexer::Lexer`].
pub trait TokenSource {
    /// The next token. After the input is exhausted, every call returns an EOF token.
    fn next_token(&mut self) -> Result<Token, RecognitionError>;

    /// Line of the current input position, starting at 1.
    fn line(&self) -> usize;

    /// Column of the current input position, starting at 0.
    fn column(&self) -> usize;

    fn source_name(&self) -> &str {
        "<unknown>"
    }
}

fn lookahead<T: Copy>(data: &[T], cursor: usize, offset: isize, to_symbol: impl Fn(T) -> i32) -> i32 {
    let position = match offset {
        0 => return 0,
        o if o > 0 => cursor.checked_add((o - 1) as usize),
        o => cursor.checked_sub(o.unsigned_abs()),
    };
    position
        .and_then(|p| data.get(p).copied())
        .map_or(EOF, to_symbol)
}

/// A fully buffered stream of Unicode code points.
#[derive(Debug, Clone)]
pub struct CodePointStream {
    data: Vec<char>,
    position: usize,
    name: String,
}

impl CodePointStream {
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self::with_name(text, "<unknown>")
    }

    #[must_use]
    pub fn with_name(text: &str, name: &str) -> Self {
        Self {
            data: text.chars().collect(),
            position: 0,
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl IntStream for CodePointStream {
    fn la(&mut self, offset: isize) -> i32 {
        lookahead(&self.data, self.position, offset, |c| c as i32)
    }

    fn consume(&mut self) {
        if self.position < self.data.len() {
            self.position += 1;
        }
    }

    fn index(&self) -> usize {
        self.position
    }

    fn seek(&mut self, index: usize) {
        self.position = index.min(self.data.len());
    }

    fn size(&self) -> Option<usize> {
        Some(self.data.len())
    }
}

impl CharStream for CodePointStream {
    fn text(&self, start: usize, end: usize) -> String {
        let end = end.min(self.data.len());
        if start >= end {
            return String::new();
        }
        self.data[start..end].iter().collect()
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

/// A buffered stream of token types, as seen by a parser.
///
/// The stream always reads [`EOF`] past its last symbol, whether or not an explicit
/// EOF symbol was supplied.
#[derive(Debug, Clone, Default)]
pub struct SymbolStream {
    symbols: Vec<i32>,
    position: usize,
}

impl SymbolStream {
    #[must_use]
    pub fn new(symbols: Vec<i32>) -> Self {
        Self {
            symbols,
            position: 0,
        }
    }

    /// Builds a stream from lexer output, keeping only default-channel tokens.
    #[must_use]
    pub fn from_tokens(tokens: &[Token]) -> Self {
        Self::new(
            tokens
                .iter()
                .filter(|t| t.is_default_channel() || t.is_eof())
                .map(|t| t.token_type)
                .collect(),
        )
    }

    #[must_use]
    pub fn symbols(&self) -> &[i32] {
        &self.symbols
    }
}

impl IntStream for SymbolStream {
    fn la(&mut self, offset: isize) -> i32 {
        lookahead(&self.symbols, self.position, offset, |t| t)
    }

    fn consume(&mut self) {
        if self.position < self.symbols.len() && self.symbols[self.position] != EOF {
            self.position += 1;
        }
    }

    fn index(&self) -> usize {
        self.position
    }

    fn seek(&mut self, index: usize) {
        self.position = index.min(self.symbols.len());
    }

    fn size(&self) -> Option<usize> {
        Some(self.symbols.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_point_lookahead() {
        let mut stream = CodePointStream::new("a\u{1F600}b");
        assert_eq!(stream.la(1), 'a' as i32);
        assert_eq!(stream.la(2), 0x1F600);
        assert_eq!(stream.la(-1), EOF);
        stream.consume();
        assert_eq!(stream.la(-1), 'a' as i32);
        stream.seek(10);
        assert_eq!(stream.index(), 3);
        assert_eq!(stream.la(1), EOF);
        assert_eq!(stream.text(1, 3), "\u{1F600}b");
    }

    #[test]
    fn test_symbol_stream_stops_at_eof() {
        let mut stream = SymbolStream::new(vec![3, EOF]);
        stream.consume();
        stream.consume();
        stream.consume();
        assert_eq!(stream.index(), 1);
        assert!(stream.is_at_end());
    }
}
