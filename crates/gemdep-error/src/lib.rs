//! The single structured error kind produced by the Gemfile/Podspec tokenizer
//! and parser.
//!
//! Unlike a typical multi-variant `thiserror` enum, the specification for
//! this front end calls for exactly one error shape shared by every failure
//! path, so the fields are fixed and the `Display` wire format is exact
//! rather than derived. A `thiserror::Error`-style enum would fight that
//! contract (each variant would need its own format string duplicating the
//! shared suffix), so this crate implements `Display`/`Error` by hand.

use std::fmt;

/// Result alias used throughout the tokenizer and parser.
pub type Result<T> = std::result::Result<T, GemfileError>;

/// A tokenizer or parser failure, with enough positional context to point a
/// caller at the exact byte in the source that broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GemfileError {
    /// One of the fixed message strings documented on [`GemfileError::new`].
    pub message: &'static str,
    /// Byte offset into the source where the error was detected.
    pub offset: usize,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    /// First byte of the previously emitted token's text, or `0x00` at
    /// start of input. Included to make "what was the lexer looking at"
    /// visible without re-threading the whole token stream into the error.
    pub prev_first_byte: u8,
    /// For unterminated-literal errors, the (line, column) of the opening
    /// delimiter so the caller can see the full unclosed span.
    pub opener: Option<(usize, usize)>,
}

impl GemfileError {
    /// Build an error with no recorded opener.
    pub fn new(
        message: &'static str,
        offset: usize,
        line: usize,
        column: usize,
        prev_first_byte: u8,
    ) -> Self {
        GemfileError { message, offset, line, column, prev_first_byte, opener: None }
    }

    /// Attach the opening-delimiter position, for unterminated-literal
    /// errors where the caller benefits from seeing both ends of the span.
    pub fn with_opener(mut self, line: usize, column: usize) -> Self {
        self.opener = Some((line, column));
        self
    }
}

impl fmt::Display for GemfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{}:{} prev=0x{:02x}",
            self.message, self.line, self.column, self.prev_first_byte
        )?;
        if let Some((line, column)) = self.opener {
            write!(f, " opener@{line}:{column}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GemfileError {}

/// The fixed set of lexer failure messages (§4.1 / §7).
pub mod messages {
    pub const TOKEN_QUOTA_EXCEEDED: &str = "token quota exceeded";
    pub const RUNAWAY_LEXER: &str = "runaway lexer";
    pub const UNKNOWN_CHARACTER: &str = "unknown character";
    pub const UNTERMINATED_STRING: &str = "unterminated string";
    pub const STRING_TOO_LONG: &str = "string literal too long";
    pub const UNTERMINATED_SYMBOL: &str = "unterminated symbol";
    pub const SYMBOL_TOO_LONG: &str = "symbol literal too long";
    pub const UNTERMINATED_PERCENT_LITERAL: &str = "unterminated %q/%w literal";
    pub const PERCENT_LITERAL_TOO_LONG: &str = "%q/%w literal too long";
    pub const NAME_LITERAL_EXPECTED: &str = "name literal expected";
    pub const NESTING_TOO_DEEP: &str = "nesting too deep";
}
