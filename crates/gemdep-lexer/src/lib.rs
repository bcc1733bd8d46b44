//! Allocation-frugal tokenizer for the Gemfile/Podfile/gemspec/podspec DSL
//! subset.
//!
//! The tokenizer never allocates per-character; it scans the source as a
//! byte slice and hands back tokens whose `text` is a slice of the original
//! `Arc<str>` backing buffer. It recognizes only the lexical shapes the DSL
//! subset needs (percent literals, symbols, `::`, quoted strings) and fails
//! fast — via [`gemdep_error::GemfileError`] — on anything it cannot make
//! sense of or that exceeds a safety cap. See `SPEC_FULL.md` §4.1 for the
//! exact rules this module implements.

use std::sync::Arc;

use gemdep_error::{messages, GemfileError, Result};
use gemdep_token::{Limits, Token, TokenKind};

/// Tokenize `source` using the default safety caps.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    tokenize_with_limits(source, Limits::default())
}

/// Tokenize `source` with caller-supplied safety caps.
pub fn tokenize_with_limits(source: &str, limits: Limits) -> Result<Vec<Token>> {
    Lexer::new(source, limits).run()
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    len: usize,
    pos: usize,
    line: usize,
    column: usize,
    limits: Limits,
    max_iterations: usize,
    iterations: usize,
    prev_first_byte: u8,
    tokens: Vec<Token>,
}

const fn bracket_close(open: u8) -> u8 {
    match open {
        b'{' => b'}',
        b'[' => b']',
        b'(' => b')',
        b'<' => b'>',
        other => other,
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'?' | b'!')
}

fn is_symbol_body_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, limits: Limits) -> Self {
        let max_iterations = input.len().saturating_mul(limits.max_iterations_per_byte).max(1);
        Lexer {
            input,
            bytes: input.as_bytes(),
            len: input.len(),
            pos: 0,
            line: 1,
            column: 1,
            limits,
            max_iterations,
            iterations: 0,
            prev_first_byte: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        loop {
            self.iterations += 1;
            if self.iterations > self.max_iterations {
                return Err(self.error(messages::RUNAWAY_LEXER));
            }
            if self.pos >= self.len {
                break;
            }
            if let Some(token) = self.scan_one()? {
                self.push(token)?;
            }
        }
        let eof = Token::new(TokenKind::EndOfFile, "", self.len, self.len, self.line, self.column);
        self.tokens.push(eof);
        Ok(self.tokens)
    }

    fn push(&mut self, token: Token) -> Result<()> {
        if self.tokens.len() >= self.limits.max_tokens {
            return Err(self.error(messages::TOKEN_QUOTA_EXCEEDED));
        }
        self.prev_first_byte = token.text.as_bytes().first().copied().unwrap_or(0);
        self.tokens.push(token);
        Ok(())
    }

    fn error(&self, message: &'static str) -> GemfileError {
        GemfileError::new(message, self.pos, self.line, self.column, self.prev_first_byte)
    }

    #[inline]
    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Consume exactly one byte, updating line/column bookkeeping.
    fn advance_one(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        b
    }

    /// Scan a delimited body. `self.pos` must be positioned at the opening
    /// delimiter; this consumes it, then consumes bytes (honoring
    /// backslash-escapes and the literal-length cap) until the unescaped
    /// `close` byte is found, which is also consumed. Mirrors the shared
    /// shape of quoted strings, quoted symbols, and percent literals
    /// (§4.1).
    fn scan_delimited(
        &mut self,
        close: u8,
        too_long: &'static str,
        unterminated: &'static str,
        opener_line: usize,
        opener_column: usize,
    ) -> Result<()> {
        self.advance_one(); // opening delimiter
        let mut body_len = 0usize;
        loop {
            if self.pos >= self.len {
                return Err(GemfileError::new(
                    unterminated,
                    self.pos,
                    self.line,
                    self.column,
                    self.prev_first_byte,
                )
                .with_opener(opener_line, opener_column));
            }
            let b = self.bytes[self.pos];
            if b == b'\\' {
                self.advance_one();
                body_len += 1;
                if self.pos < self.len {
                    self.advance_one();
                    body_len += 1;
                }
            } else if b == close {
                self.advance_one();
                return Ok(());
            } else {
                self.advance_one();
                body_len += 1;
            }
            if body_len > self.limits.max_literal_len {
                return Err(GemfileError::new(
                    too_long,
                    self.pos,
                    self.line,
                    self.column,
                    self.prev_first_byte,
                )
                .with_opener(opener_line, opener_column));
            }
        }
    }

    fn slice(&self, start: usize, end: usize) -> Arc<str> {
        Arc::from(&self.input[start..end])
    }

    /// Scan and return the next token, or `None` for whitespace/comments
    /// that produce no token.
    fn scan_one(&mut self) -> Result<Option<Token>> {
        let start = self.pos;
        let start_line = self.line;
        let start_column = self.column;
        let b = self.bytes[self.pos];

        match b {
            b' ' | b'\t' => {
                self.advance_one();
                Ok(None)
            }
            b'\n' => {
                self.advance_one();
                Ok(Some(Token::new(
                    TokenKind::NewLine,
                    self.slice(start, start + 1),
                    start,
                    start + 1,
                    start_line,
                    start_column,
                )))
            }
            b'#' => {
                while self.pos < self.len && self.bytes[self.pos] != b'\n' {
                    self.advance_one();
                }
                Ok(None)
            }
            b',' | b'(' | b')' | b'[' | b']' | b'.' | b'=' => {
                self.advance_one();
                let kind = match b {
                    b',' => TokenKind::Comma,
                    b'(' => TokenKind::LeftParen,
                    b')' => TokenKind::RightParen,
                    b'[' => TokenKind::LeftBracket,
                    b']' => TokenKind::RightBracket,
                    b'.' => TokenKind::Dot,
                    b'=' => TokenKind::Equals,
                    _ => unreachable!(),
                };
                Ok(Some(Token::new(
                    kind,
                    self.slice(start, start + 1),
                    start,
                    start + 1,
                    start_line,
                    start_column,
                )))
            }
            b'{' | b'}' | b'<' | b'>' | b'-' | b'+' | b'&' | b'*' | b'/' | b';' => {
                self.advance_one();
                Ok(None)
            }
            b':' => self.scan_colon(start, start_line, start_column),
            b'|' => {
                self.advance_one();
                Ok(Some(Token::new(
                    TokenKind::Symbol,
                    self.slice(start, start + 1),
                    start,
                    start + 1,
                    start_line,
                    start_column,
                )))
            }
            b'\'' | b'"' => {
                self.scan_delimited(
                    b,
                    messages::STRING_TOO_LONG,
                    messages::UNTERMINATED_STRING,
                    start_line,
                    start_column,
                )?;
                Ok(Some(Token::new(
                    TokenKind::String,
                    self.slice(start, self.pos),
                    start,
                    self.pos,
                    start_line,
                    start_column,
                )))
            }
            b'%' if matches!(self.peek(1), Some(b'q') | Some(b'w')) => {
                self.scan_percent_literal(start, start_line, start_column)
            }
            b if is_ident_start(b) => Ok(Some(self.scan_identifier(start, start_line, start_column))),
            b if b.is_ascii_digit() => Ok(Some(self.scan_integer(start, start_line, start_column))),
            _ => Err(self.error(messages::UNKNOWN_CHARACTER)),
        }
    }

    fn scan_colon(&mut self, start: usize, start_line: usize, start_column: usize) -> Result<Option<Token>> {
        let prev = if self.pos > 0 { Some(self.bytes[self.pos - 1]) } else { None };
        let next = self.peek(1);

        if prev == Some(b':') || next == Some(b':') {
            self.advance_one();
            return Ok(Some(Token::new(
                TokenKind::Colon,
                self.slice(start, start + 1),
                start,
                start + 1,
                start_line,
                start_column,
            )));
        }

        if matches!(next, Some(b'\'') | Some(b'"')) {
            self.advance_one(); // the ':' itself
            let close = self.bytes[self.pos];
            self.scan_delimited(
                close,
                messages::SYMBOL_TOO_LONG,
                messages::UNTERMINATED_SYMBOL,
                start_line,
                start_column,
            )?;
            return Ok(Some(Token::new(
                TokenKind::Symbol,
                self.slice(start, self.pos),
                start,
                self.pos,
                start_line,
                start_column,
            )));
        }

        if matches!(next, Some(b) if is_symbol_body_continue(b)) {
            self.advance_one(); // ':'
            while self.pos < self.len && is_symbol_body_continue(self.bytes[self.pos]) {
                self.advance_one();
            }
            return Ok(Some(Token::new(
                TokenKind::Symbol,
                self.slice(start, self.pos),
                start,
                self.pos,
                start_line,
                start_column,
            )));
        }

        self.advance_one();
        Ok(Some(Token::new(
            TokenKind::Colon,
            self.slice(start, start + 1),
            start,
            start + 1,
            start_line,
            start_column,
        )))
    }

    fn scan_percent_literal(
        &mut self,
        start: usize,
        start_line: usize,
        start_column: usize,
    ) -> Result<Option<Token>> {
        self.advance_one(); // '%'
        self.advance_one(); // 'q' or 'w'
        if self.pos >= self.len {
            return Err(GemfileError::new(
                messages::UNTERMINATED_PERCENT_LITERAL,
                self.pos,
                self.line,
                self.column,
                self.prev_first_byte,
            )
            .with_opener(start_line, start_column));
        }
        let opener = self.bytes[self.pos];
        let closer = bracket_close(opener);
        self.scan_delimited(
            closer,
            messages::PERCENT_LITERAL_TOO_LONG,
            messages::UNTERMINATED_PERCENT_LITERAL,
            start_line,
            start_column,
        )?;
        Ok(Some(Token::new(
            TokenKind::String,
            self.slice(start, self.pos),
            start,
            self.pos,
            start_line,
            start_column,
        )))
    }

    fn scan_identifier(&mut self, start: usize, start_line: usize, start_column: usize) -> Token {
        self.advance_one();
        while self.pos < self.len && is_ident_continue(self.bytes[self.pos]) {
            self.advance_one();
        }
        let text = self.slice(start, self.pos);
        let kind = match &*text {
            "do" => TokenKind::Do,
            "end" => TokenKind::End,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            _ => TokenKind::Identifier,
        };
        Token::new(kind, text, start, self.pos, start_line, start_column)
    }

    fn scan_integer(&mut self, start: usize, start_line: usize, start_column: usize) -> Token {
        self.advance_one();
        while self.pos < self.len && self.bytes[self.pos].is_ascii_digit() {
            self.advance_one();
        }
        Token::new(TokenKind::Integer, self.slice(start, self.pos), start, self.pos, start_line, start_column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn single_char_tokens() {
        assert_eq!(
            kinds(",()[].="),
            vec![
                TokenKind::Comma,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Dot,
                TokenKind::Equals,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn silent_punctuation_emits_nothing() {
        assert_eq!(kinds("{}<>-+&*/;"), vec![TokenKind::EndOfFile]);
    }

    #[test]
    fn double_colon_is_two_colon_tokens() {
        assert_eq!(kinds("Gem::Specification"), vec![
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::Colon,
            TokenKind::Identifier,
            TokenKind::EndOfFile,
        ]);
    }

    #[test]
    fn quoted_symbol() {
        let tokens = tokenize(r#":"hello world""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Symbol);
        assert_eq!(&*tokens[0].text, r#":"hello world""#);
    }

    #[test]
    fn unquoted_symbol() {
        let tokens = tokenize(":mri").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Symbol);
        assert_eq!(&*tokens[0].text, ":mri");
    }

    #[test]
    fn bare_colon_not_followed_by_symbol_body() {
        let tokens = tokenize(": ").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Colon);
    }

    #[test]
    fn pipe_is_symbol_token() {
        assert_eq!(kinds("|s|"), vec![TokenKind::Symbol, TokenKind::Identifier, TokenKind::Symbol, TokenKind::EndOfFile]);
    }

    #[test]
    fn percent_q_angle_brackets() {
        let tokens = tokenize("%q<gemname>").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(&*tokens[0].text, "%q<gemname>");
    }

    #[test]
    fn percent_w_brackets() {
        let tokens = tokenize("%w[~>1.0 >=1.5]").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(&*tokens[0].text, "%w[~>1.0 >=1.5]");
    }

    #[test]
    fn percent_q_self_paired_delimiter() {
        let tokens = tokenize("%q|hi|").unwrap();
        assert_eq!(&*tokens[0].text, "%q|hi|");
    }

    #[test]
    fn comment_consumes_to_end_of_line() {
        assert_eq!(kinds("gem 'x' # comment\ngem 'y'"), vec![
            TokenKind::Identifier,
            TokenKind::String,
            TokenKind::NewLine,
            TokenKind::Identifier,
            TokenKind::String,
            TokenKind::EndOfFile,
        ]);
    }

    #[test]
    fn keywords() {
        assert_eq!(kinds("do end if else"), vec![
            TokenKind::Do,
            TokenKind::End,
            TokenKind::If,
            TokenKind::Else,
            TokenKind::EndOfFile,
        ]);
    }

    #[test]
    fn backslash_escapes_any_next_char() {
        let tokens = tokenize(r#"'it\'s fine'"#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(&*tokens[0].text, r#"'it\'s fine'"#);
    }

    #[test]
    fn unterminated_string_fails() {
        let err = tokenize("'unterminated").unwrap_err();
        assert_eq!(err.message, gemdep_error::messages::UNTERMINATED_STRING);
    }

    #[test]
    fn unknown_character_fails() {
        let err = tokenize("^").unwrap_err();
        assert_eq!(err.message, gemdep_error::messages::UNKNOWN_CHARACTER);
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfFile]);
    }

    #[test]
    fn token_quota_is_enforced() {
        let limits = Limits { max_tokens: 2, ..Limits::default() };
        let err = tokenize_with_limits("a b c", limits).unwrap_err();
        assert_eq!(err.message, gemdep_error::messages::TOKEN_QUOTA_EXCEEDED);
    }

    #[test]
    fn line_and_column_track_newlines() {
        let tokens = tokenize("gem\n  'x'").unwrap();
        let string_tok = tokens.iter().find(|t| t.kind == TokenKind::String).unwrap();
        assert_eq!(string_tok.line, 2);
        assert_eq!(string_tok.column, 3);
    }

    #[test]
    fn positions_are_monotonically_nondecreasing() {
        let tokens = tokenize("gem 'rails', '>= 6.0', group: :test\n").unwrap();
        let mut last = 0;
        for t in &tokens {
            assert!(t.start >= last);
            last = t.start;
        }
    }
}
