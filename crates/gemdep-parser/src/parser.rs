//! The recursive-descent parser (§4.2, §4.3): walks the token stream,
//! recognizes the DSL-shaped subset, and recovers past anything else.

use std::sync::Arc;

use gemdep_error::{messages, GemfileError, Result};
use gemdep_token::{Limits, Token, TokenKind};

use crate::normalize::{expand_word_array, format_version, is_word_array, normalize};
use crate::output::{GemDeclaration, Groups, ParseOutput};

/// What ends the current run of statements being parsed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum BodyStop {
    /// Top level of the file: only end-of-file terminates.
    Top,
    /// Inside a `do ... end` block: a matching `end` terminates.
    Block,
}

/// What ends the current run of statements inside a spec constructor body.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SpecStop {
    /// Normal block body: only `end` terminates.
    BlockEnd,
    /// The first branch of an `if`: `else` also terminates (unconsumed).
    IfBranch,
}

/// What a spec body run stopped on.
#[derive(Clone, Copy, PartialEq, Eq)]
enum SpecTerminator {
    End,
    Else,
    Eof,
}

struct ParsedDependency {
    decl: GemDeclaration,
    effective_groups: Vec<String>,
}

pub(crate) struct Parser<'s> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    limits: Limits,
    sink: &'s mut dyn FnMut(&str),
    self_name: Option<String>,
    self_version: Option<String>,
    runtime: Vec<GemDeclaration>,
    development: Vec<GemDeclaration>,
}

impl<'s> Parser<'s> {
    pub(crate) fn new(tokens: Vec<Token>, limits: Limits, sink: &'s mut dyn FnMut(&str)) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            limits,
            sink,
            self_name: None,
            self_version: None,
            runtime: Vec::new(),
            development: Vec::new(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<ParseOutput> {
        self.parse_body(Vec::new(), Vec::new(), BodyStop::Top)?;
        Ok(ParseOutput {
            self_name: self.self_name,
            self_version: self.self_version,
            groups: Groups { runtime: self.runtime, development: self.development },
        })
    }

    // ---- cursor helpers -------------------------------------------------

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn current_kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn current_text(&self) -> Arc<str> {
        self.tokens[self.pos].text.clone()
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.tokens.get(self.pos + offset).map(|t| t.kind).unwrap_or(TokenKind::EndOfFile)
    }

    fn peek_text(&self, offset: usize) -> Arc<str> {
        self.tokens.get(self.pos + offset).map(|t| t.text.clone()).unwrap_or_else(|| Arc::from(""))
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn prev_first_byte(&self) -> u8 {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].text.as_bytes().first().copied().unwrap_or(0)
        }
    }

    fn fatal(&self, message: &'static str) -> GemfileError {
        let token = self.current();
        GemfileError::new(message, token.start, token.line, token.column, self.prev_first_byte())
    }

    fn note(&mut self, message: String) {
        (self.sink)(&message);
    }

    /// Dynamic string interpolation is a non-goal (§1); when we see it we
    /// can't resolve it, so we just flag it and keep the literal text.
    fn check_interpolation(&mut self, raw: &str) {
        if raw.contains("#{") {
            self.note(format!("unresolved string interpolation: {raw}"));
        }
    }

    fn enter_block(&mut self) -> Result<()> {
        if self.depth >= self.limits.max_nesting {
            return Err(self.fatal(messages::NESTING_TOO_DEEP));
        }
        self.depth += 1;
        Ok(())
    }

    fn exit_block(&mut self) {
        self.depth -= 1;
    }

    /// Discard tokens through (and including) the next `NewLine`, or through
    /// end-of-file. Used both for "discard the rest of the line" and for
    /// trailing-conditional handling — both just mean "skip to the next
    /// line" (§4.2).
    fn discard_through_newline(&mut self) {
        while !matches!(self.current_kind(), TokenKind::NewLine | TokenKind::EndOfFile) {
            self.advance();
        }
        if self.current_kind() == TokenKind::NewLine {
            self.advance();
        }
    }

    /// Skip a `do ... end` or `( ... )` block that doesn't belong to any
    /// recognized statement form, counting nested opens/closes of the same
    /// kind so a stray block doesn't desynchronize the cursor.
    fn skip_balanced(&mut self) -> Result<()> {
        match self.current_kind() {
            TokenKind::Do => {
                self.enter_block()?;
                self.advance();
                let mut depth = 1usize;
                while depth > 0 {
                    match self.current_kind() {
                        TokenKind::EndOfFile => break,
                        TokenKind::Do => {
                            depth += 1;
                            self.advance();
                        }
                        TokenKind::End => {
                            depth -= 1;
                            self.advance();
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
                self.exit_block();
            }
            TokenKind::LeftParen => {
                self.advance();
                let mut depth = 1usize;
                while depth > 0 {
                    match self.current_kind() {
                        TokenKind::EndOfFile => break,
                        TokenKind::LeftParen => {
                            depth += 1;
                            self.advance();
                        }
                        TokenKind::RightParen => {
                            depth -= 1;
                            self.advance();
                        }
                        _ => {
                            self.advance();
                        }
                    }
                }
            }
            _ => {}
        }
        self.discard_through_newline();
        Ok(())
    }

    // ---- top-level / Gemfile-Podfile body (§4.2) -------------------------

    fn at_spec_constructor(&self) -> bool {
        if self.current_kind() != TokenKind::Identifier {
            return false;
        }
        let namespace = self.current_text();
        if &*namespace != "Gem" && &*namespace != "Pod" {
            return false;
        }
        if self.peek_kind(1) != TokenKind::Colon || self.peek_kind(2) != TokenKind::Colon {
            return false;
        }
        if self.peek_kind(3) != TokenKind::Identifier {
            return false;
        }
        let class_name = self.peek_text(3);
        let ok_class = (&*namespace == "Gem" && &*class_name == "Specification")
            || (&*namespace == "Pod" && &*class_name == "Spec");
        if !ok_class {
            return false;
        }
        if self.peek_kind(4) != TokenKind::Dot {
            return false;
        }
        self.peek_kind(5) == TokenKind::Identifier && &*self.peek_text(5) == "new"
    }

    fn parse_labels(&mut self) -> Vec<String> {
        let mut labels = Vec::new();
        loop {
            match self.current_kind() {
                TokenKind::Symbol | TokenKind::String => {
                    let raw = self.current_text();
                    self.check_interpolation(&raw);
                    self.advance();
                    labels.push(normalize(&raw));
                }
                TokenKind::Identifier => {
                    let raw = self.current_text().to_string();
                    self.advance();
                    labels.push(raw);
                }
                _ => break,
            }
            if self.current_kind() == TokenKind::Comma {
                self.advance();
                continue;
            }
            break;
        }
        labels
    }

    fn parse_body(
        &mut self,
        active_groups: Vec<String>,
        active_platforms: Vec<String>,
        stop: BodyStop,
    ) -> Result<()> {
        loop {
            match self.current_kind() {
                TokenKind::EndOfFile => return Ok(()),
                TokenKind::End if stop == BodyStop::Block => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::Identifier => {
                    let text = self.current_text();
                    match &*text {
                        "gem" | "pod" => {
                            self.advance();
                            self.parse_and_route_dependency(&active_groups, &active_platforms)?;
                        }
                        "group" | "target" => {
                            self.advance();
                            let labels = self.parse_labels();
                            if self.current_kind() == TokenKind::Do {
                                self.advance();
                                self.enter_block()?;
                                self.parse_body(labels, active_platforms.clone(), BodyStop::Block)?;
                                self.exit_block();
                            } else {
                                self.discard_through_newline();
                            }
                        }
                        "platforms" => {
                            self.advance();
                            let labels = self.parse_labels();
                            if self.current_kind() == TokenKind::Do {
                                self.advance();
                                self.enter_block()?;
                                self.parse_body(active_groups.clone(), labels, BodyStop::Block)?;
                                self.exit_block();
                            } else {
                                self.discard_through_newline();
                            }
                        }
                        "source" => {
                            self.advance();
                            self.discard_through_newline();
                        }
                        _ if self.at_spec_constructor() => {
                            self.advance_n(6);
                            self.parse_spec_constructor()?;
                        }
                        _ => {
                            self.discard_through_newline();
                        }
                    }
                }
                TokenKind::Do | TokenKind::LeftParen => {
                    self.skip_balanced()?;
                }
                _ => {
                    self.discard_through_newline();
                }
            }
        }
    }

    fn parse_and_route_dependency(
        &mut self,
        active_groups: &[String],
        active_platforms: &[String],
    ) -> Result<()> {
        let parsed = self.parse_dependency_args(active_groups, active_platforms)?;
        let mut decl = parsed.decl;
        let had_conditional = self.current_kind() == TokenKind::If;
        let group_dev =
            parsed.effective_groups.iter().any(|g| g == "development" || g == "test");
        decl.groups =
            if group_dev || had_conditional { None } else { Some(parsed.effective_groups.clone()) };
        if group_dev {
            self.development.push(decl);
        } else {
            self.runtime.push(decl);
        }
        self.discard_through_newline();
        Ok(())
    }

    /// Parse the `NAME [, VERSION|ARRAY|KEY=>VALUE]...` argument form shared
    /// by `gem`/`pod` statements and every gemspec dependency method
    /// (§4.2, §4.3).
    fn parse_dependency_args(
        &mut self,
        outer_groups: &[String],
        outer_platforms: &[String],
    ) -> Result<ParsedDependency> {
        let had_paren = if self.current_kind() == TokenKind::LeftParen {
            self.advance();
            true
        } else {
            false
        };

        let name = match self.current_kind() {
            TokenKind::String | TokenKind::Symbol => {
                let raw = self.current_text();
                self.check_interpolation(&raw);
                self.advance();
                normalize(&raw)
            }
            TokenKind::Identifier => {
                let raw = self.current_text().to_string();
                self.advance();
                raw
            }
            _ => return Err(self.fatal(messages::NAME_LITERAL_EXPECTED)),
        };

        if self.current_kind() == TokenKind::Dot
            && self.peek_kind(1) == TokenKind::Identifier
            && &*self.peek_text(1) == "freeze"
        {
            self.advance();
            self.advance();
        }

        let mut decl = GemDeclaration::new(name);
        let mut inline_groups: Vec<String> = Vec::new();
        let mut inline_platforms: Vec<String> = Vec::new();

        'pairs: while self.current_kind() == TokenKind::Comma {
            self.advance();
            match self.current_kind() {
                TokenKind::String => {
                    let raw = self.current_text();
                    self.check_interpolation(&raw);
                    self.advance();
                    if is_word_array(&raw) {
                        let content = normalize(&raw);
                        for piece in expand_word_array(&content) {
                            decl.versions.push(format_version(&piece));
                        }
                    } else {
                        decl.versions.push(format_version(&normalize(&raw)));
                    }
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    loop {
                        match self.current_kind() {
                            TokenKind::String => {
                                let value = normalize(&self.current_text());
                                self.advance();
                                decl.versions.push(format_version(&value));
                                if self.current_kind() == TokenKind::Comma {
                                    self.advance();
                                    continue;
                                }
                            }
                            TokenKind::RightBracket => {
                                self.advance();
                                break;
                            }
                            _ => break,
                        }
                    }
                }
                TokenKind::Symbol | TokenKind::Identifier => {
                    let is_symbol = self.current_kind() == TokenKind::Symbol;
                    let key_raw = self.current_text();
                    let delim = self.peek_kind(1);
                    if delim != TokenKind::Equals && delim != TokenKind::Colon {
                        break 'pairs;
                    }
                    let key = if is_symbol { normalize(&key_raw) } else { key_raw.to_string() };
                    self.advance(); // key
                    self.advance(); // '=' or ':'
                    match key.as_str() {
                        "group" => {
                            if matches!(self.current_kind(), TokenKind::Identifier | TokenKind::Symbol)
                            {
                                let raw = self.current_text();
                                self.advance();
                                inline_groups.push(normalize(&raw));
                            }
                        }
                        "platforms" => {
                            if self.current_kind() == TokenKind::LeftBracket {
                                self.advance();
                                loop {
                                    match self.current_kind() {
                                        TokenKind::Symbol => {
                                            let value = normalize(&self.current_text());
                                            self.advance();
                                            inline_platforms.push(value);
                                            if self.current_kind() == TokenKind::Comma {
                                                self.advance();
                                                continue;
                                            }
                                        }
                                        TokenKind::RightBracket => {
                                            self.advance();
                                            break;
                                        }
                                        _ => break,
                                    }
                                }
                            }
                        }
                        "git" | "github" => {
                            if matches!(
                                self.current_kind(),
                                TokenKind::String | TokenKind::Symbol | TokenKind::Identifier
                            ) {
                                let raw = self.current_text();
                                self.check_interpolation(&raw);
                                self.advance();
                                decl.git = Some(normalize(&raw));
                            }
                        }
                        "path" => {
                            if matches!(
                                self.current_kind(),
                                TokenKind::String | TokenKind::Symbol | TokenKind::Identifier
                            ) {
                                let raw = self.current_text();
                                self.check_interpolation(&raw);
                                self.advance();
                                decl.path = Some(normalize(&raw));
                            }
                        }
                        "require" => {
                            // Only a String literal can turn this false (§9 open
                            // question); a bare `true`/`false` identifier is not
                            // specially handled, matching the source behavior.
                            if self.current_kind() == TokenKind::String {
                                let raw = self.current_text();
                                self.advance();
                                decl.require = Some(normalize(&raw) != "false");
                            } else if matches!(
                                self.current_kind(),
                                TokenKind::Symbol | TokenKind::Identifier
                            ) {
                                self.advance();
                                decl.require = Some(true);
                            }
                        }
                        _ => break 'pairs,
                    }
                }
                _ => break 'pairs,
            }
        }

        if had_paren && self.current_kind() == TokenKind::RightParen {
            self.advance();
        }

        let mut effective_groups = outer_groups.to_vec();
        effective_groups.extend(inline_groups);
        let mut effective_platforms = outer_platforms.to_vec();
        effective_platforms.extend(inline_platforms);
        decl.platforms = effective_platforms;

        Ok(ParsedDependency { decl, effective_groups })
    }

    // ---- gemspec/podspec constructor (§4.3) ------------------------------

    fn parse_spec_constructor(&mut self) -> Result<()> {
        if self.current_kind() == TokenKind::String {
            let raw = self.current_text();
            self.check_interpolation(&raw);
            self.self_name = Some(normalize(&raw));
            self.advance();
        }

        if self.current_kind() != TokenKind::Do {
            return Ok(());
        }
        self.advance();

        let mut block_arg: Option<String> = None;
        if self.current_kind() == TokenKind::Symbol && &*self.current_text() == "|" {
            self.advance();
            if self.current_kind() == TokenKind::Identifier {
                block_arg = Some(self.current_text().to_string());
                self.advance();
            }
            if self.current_kind() == TokenKind::Symbol && &*self.current_text() == "|" {
                self.advance();
            }
        }

        self.enter_block()?;
        self.parse_spec_body(block_arg.as_deref(), SpecStop::BlockEnd)?;
        self.exit_block();
        Ok(())
    }

    fn parse_spec_body(
        &mut self,
        block_arg: Option<&str>,
        stop: SpecStop,
    ) -> Result<SpecTerminator> {
        loop {
            match self.current_kind() {
                TokenKind::End => {
                    self.advance();
                    return Ok(SpecTerminator::End);
                }
                TokenKind::Else if stop == SpecStop::IfBranch => {
                    return Ok(SpecTerminator::Else);
                }
                TokenKind::EndOfFile => return Ok(SpecTerminator::Eof),
                TokenKind::If => {
                    self.advance();
                    self.discard_through_newline();
                    self.enter_block()?;
                    let terminator = self.parse_spec_body(block_arg, SpecStop::IfBranch)?;
                    self.exit_block();
                    if terminator == SpecTerminator::Else {
                        self.skip_until_matching_end();
                    }
                }
                _ => {
                    self.parse_spec_statement(block_arg)?;
                }
            }
        }
    }

    /// Only the `if` branch is interpreted (§4.3, §9); skip the `else`
    /// branch wholesale through its matching `end`.
    fn skip_until_matching_end(&mut self) {
        self.advance(); // 'else'
        let mut depth = 1usize;
        while depth > 0 {
            match self.current_kind() {
                TokenKind::EndOfFile => return,
                TokenKind::Do | TokenKind::If => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::End => {
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_spec_statement(&mut self, block_arg: Option<&str>) -> Result<()> {
        if self.current_kind() != TokenKind::Identifier {
            self.discard_through_newline();
            return Ok(());
        }
        let receiver = self.current_text();
        if let Some(expected) = block_arg {
            if &*receiver != expected {
                self.discard_through_newline();
                return Ok(());
            }
        }
        self.advance();

        if self.current_kind() != TokenKind::Dot {
            self.discard_through_newline();
            return Ok(());
        }
        self.advance();

        if self.current_kind() != TokenKind::Identifier {
            self.discard_through_newline();
            return Ok(());
        }
        let method = self.current_text().to_string();
        self.advance();

        if self.current_kind() == TokenKind::Equals {
            self.advance();
            if self.current_kind() == TokenKind::String {
                let raw = self.current_text();
                self.check_interpolation(&raw);
                let value = normalize(&raw);
                self.advance();
                match method.as_str() {
                    "name" => self.self_name = Some(value),
                    "version" => self.self_version = Some(value),
                    _ => {}
                }
            }
        } else if method == "send" {
            self.parse_spec_send()?;
        } else if matches!(
            method.as_str(),
            "add_dependency" | "add_runtime_dependency" | "add_development_dependency" | "dependency"
        ) {
            self.parse_spec_dependency_call(&method)?;
        }

        self.discard_through_newline();
        Ok(())
    }

    fn parse_spec_send(&mut self) -> Result<()> {
        let had_paren = if self.current_kind() == TokenKind::LeftParen {
            self.advance();
            true
        } else {
            false
        };

        if self.current_kind() != TokenKind::Symbol {
            return Ok(());
        }
        let symbol_text = normalize(&self.current_text());
        if !symbol_text.contains("dependency") {
            self.note(format!("unresolved dynamic dispatch via send: {symbol_text}"));
            return Ok(());
        }
        self.advance();

        if self.current_kind() != TokenKind::Comma {
            return Ok(());
        }
        self.advance();

        let is_dev_method = symbol_text.contains("development");
        let parsed = self.parse_dependency_args(&[], &[])?;
        self.route_spec_dependency(parsed, is_dev_method, false);

        if had_paren && self.current_kind() == TokenKind::RightParen {
            self.advance();
        }
        Ok(())
    }

    fn parse_spec_dependency_call(&mut self, method: &str) -> Result<()> {
        let parsed = self.parse_dependency_args(&[], &[])?;
        let force_strip_groups = method == "dependency";
        self.route_spec_dependency(parsed, method.contains("development"), force_strip_groups);
        Ok(())
    }

    fn route_spec_dependency(
        &mut self,
        parsed: ParsedDependency,
        is_dev_method: bool,
        force_strip_groups: bool,
    ) {
        let mut decl = parsed.decl;
        let group_dev = parsed.effective_groups.iter().any(|g| g == "development" || g == "test");
        decl.groups =
            if force_strip_groups || group_dev { None } else { Some(parsed.effective_groups.clone()) };
        if is_dev_method || group_dev {
            self.development.push(decl);
        } else {
            self.runtime.push(decl);
        }
    }
}
