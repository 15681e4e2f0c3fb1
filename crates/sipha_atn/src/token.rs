//! Token types and the reserved symbol values shared by lexers and parsers.

use compact_str::CompactString;
use std::fmt;

/// End of input. Also the value [`crate::stream::IntStream::la`] returns past the end.
pub const EOF: i32 = -1;

/// Marker for "epsilon" inside lookahead sets computed by the LL(1) analyzer.
pub const EPSILON: i32 = -2;

/// Never a valid token type.
pub const INVALID_TYPE: i32 = 0;

/// Smallest token type a grammar may assign.
pub const MIN_USER_TOKEN_TYPE: i32 = 1;

/// Channel parsers read from.
pub const DEFAULT_CHANNEL: i32 = 0;

/// Conventional channel for whitespace and comments.
pub const HIDDEN_CHANNEL: i32 = 1;

/// A token produced by [`crate::lexer::Lexer`].
///
/// `start` and `end` are code point offsets into the character stream; `end` is exclusive.
/// The EOF token is empty and sits at the end of the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub token_type: i32,
    pub channel: i32,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub text: CompactString,
    /// Position of the token in the emitted token sequence.
    pub token_index: usize,
}

impl Token {
    /// Returns true for the end-of-input token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.token_type == EOF
    }

    /// Returns true when the token is on the parser's default channel.
    #[must_use]
    pub const fn is_default_channel(&self) -> bool {
        self.channel == DEFAULT_CHANNEL
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = if self.is_eof() {
            "<EOF>".to_string()
        } else {
            self.text
                .replace('\n', "\\n")
                .replace('\r', "\\r")
                .replace('\t', "\\t")
        };
        write!(
            f,
            "[@{},{}:{}='{}',<{}>",
            self.token_index,
            self.start,
            self.end.saturating_sub(1),
            text,
            self.token_type
        )?;
        if self.channel > DEFAULT_CHANNEL {
            write!(f, ",channel={}", self.channel)?;
        }
        write!(f, ",{}:{}]", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_display() {
        let token = Token {
            token_type: 3,
            channel: HIDDEN_CHANNEL,
            start: 4,
            end: 6,
            line: 1,
            column: 4,
            text: CompactString::new("a\n"),
            token_index: 2,
        };
        assert_eq!(token.to_string(), "[@2,4:5='a\\n',<3>,channel=1,1:4]");
        assert!(!token.is_default_channel());
    }
}
