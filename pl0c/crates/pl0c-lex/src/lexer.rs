//! The PL/0 lexer.
//!
//! Longest-match tokenization over the double-buffered input. The lexer
//! never aborts: invalid input produces error tokens and diagnostics on
//! the shared handler, and scanning continues so the parser can surface
//! further problems downstream.

use pl0c_util::{DiagnosticBuilder, Handler, Span};

use crate::buffer::SourceBuffer;
use crate::source::Source;
use crate::token::{keyword_from_ident, Token, TokenKind};

/// Lexer for PL/0 source text.
pub struct Lexer<'a> {
    buffer: SourceBuffer,
    handler: &'a Handler,
    token_line: u32,
    token_column: u32,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over a primed buffer.
    pub fn new(buffer: SourceBuffer, handler: &'a Handler) -> Self {
        Self {
            buffer,
            handler,
            token_line: 1,
            token_column: 1,
        }
    }

    /// Create a lexer over an in-memory string.
    pub fn from_str(text: &str, handler: &'a Handler) -> Self {
        Self::new(SourceBuffer::new(Source::from_str(text)), handler)
    }

    /// Tokenize the whole input. The result always ends with exactly
    /// one EOF token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    /// Take the buffer's completed-line cache for the renderer.
    pub fn take_lines(&mut self) -> Vec<String> {
        self.buffer.take_lines()
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        self.token_line = self.buffer.line();
        self.token_column = self.buffer.column();
        self.buffer.mark_lexeme_start();

        if self.buffer.at_eof() {
            return self.make_token(TokenKind::Eof);
        }

        match self.buffer.current() {
            b'a'..=b'z' | b'A'..=b'Z' => self.lex_ident_or_keyword(),
            b'_' => self.lex_underscore_ident(),
            b'0'..=b'9' => self.lex_number(),
            _ => self.lex_operator(),
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.buffer.current() {
                b' ' | b'\t' | b'\r' | b'\n' => self.buffer.advance(),
                _ => return,
            }
        }
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        self.consume_ident_tail();
        let text = self.buffer.lexeme();
        let kind = keyword_from_ident(&text).unwrap_or(TokenKind::Ident);
        Token::new(kind, text, self.token_line, self.token_column)
    }

    fn lex_underscore_ident(&mut self) -> Token {
        self.consume_ident_tail();
        self.error_token(
            "invalid identifier (cannot start with '_')",
            Some("identifiers must start with a letter"),
            None,
        )
    }

    fn lex_number(&mut self) -> Token {
        while self.buffer.current().is_ascii_digit() {
            self.buffer.advance();
        }

        // A letter or underscore glued to the literal makes the whole
        // run one invalid identifier, not a number followed by a name.
        if is_ident_continue(self.buffer.current()) {
            self.consume_ident_tail();
            return self.error_token(
                "invalid identifier (cannot start with a digit)",
                Some("identifiers must start with a letter"),
                None,
            );
        }

        let text = self.buffer.lexeme();
        match text.parse::<i64>() {
            Ok(value) => {
                if value > i32::MAX as i64 {
                    DiagnosticBuilder::warning("integer literal is too large")
                        .span(self.token_span(text.len()))
                        .help("PL/0 integers are 32-bit signed")
                        .emit(self.handler);
                }
                Token::new(TokenKind::Number, text, self.token_line, self.token_column)
            }
            Err(_) => self.error_token("integer literal overflows", None, None),
        }
    }

    fn lex_operator(&mut self) -> Token {
        match self.buffer.current() {
            b'+' => self.single(TokenKind::Plus),
            b'-' => self.single(TokenKind::Minus),
            b'*' => self.single(TokenKind::Star),
            b'/' => self.single(TokenKind::Slash),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b',' => self.single(TokenKind::Comma),
            b';' => self.single(TokenKind::Semicolon),
            b'=' => self.single(TokenKind::Eq),
            b'<' => match self.buffer.peek(1) {
                b'=' => self.double(TokenKind::Le),
                b'>' => self.double(TokenKind::Ne),
                _ => self.single(TokenKind::Lt),
            },
            b'>' => match self.buffer.peek(1) {
                b'=' => self.double(TokenKind::Ge),
                _ => self.single(TokenKind::Gt),
            },
            b':' => {
                if self.buffer.peek(1) == b'=' {
                    self.double(TokenKind::Assign)
                } else {
                    self.buffer.advance();
                    self.error_token(
                        "stray ':'",
                        Some("assignment is written ':='"),
                        Some(":="),
                    )
                }
            }
            b'!' => {
                if self.buffer.peek(1) == b'=' {
                    self.buffer.advance();
                    self.buffer.advance();
                    self.error_token(
                        "'!=' is not valid in PL/0",
                        Some("inequality is written '<>'"),
                        Some("<>"),
                    )
                } else {
                    self.buffer.advance();
                    self.error_token(
                        "'!' is not valid in PL/0",
                        Some("PL/0 has no logical operators"),
                        None,
                    )
                }
            }
            b'&' => self.logical_operator(b'&', "'&'", "'&&'"),
            b'|' => self.logical_operator(b'|', "'|'", "'||'"),
            b'{' | b'}' => {
                let what = if self.buffer.current() == b'{' { "'{'" } else { "'}'" };
                self.buffer.advance();
                self.error_token(
                    &format!("{} is not valid in PL/0", what),
                    Some("blocks are written with begin/end"),
                    None,
                )
            }
            b'[' | b']' => {
                let what = if self.buffer.current() == b'[' { "'['" } else { "']'" };
                self.buffer.advance();
                self.error_token(
                    &format!("{} is not valid in PL/0", what),
                    Some("there are no arrays in PL/0"),
                    None,
                )
            }
            b'"' | b'\'' => {
                self.buffer.advance();
                self.error_token(
                    "string quote is not valid in PL/0",
                    Some("there are no string literals in PL/0"),
                    None,
                )
            }
            _ => self.lex_invalid_run(),
        }
    }

    fn logical_operator(&mut self, ch: u8, single: &str, doubled: &str) -> Token {
        let name = if self.buffer.peek(1) == ch {
            self.buffer.advance();
            self.buffer.advance();
            doubled
        } else {
            self.buffer.advance();
            single
        };
        self.error_token(
            &format!("{} is not valid in PL/0", name),
            Some("PL/0 has no logical operators"),
            None,
        )
    }

    /// Coalesce a run of bytes that cannot start any token into one
    /// error token. Multi-byte UTF-8 sequences are consumed whole, so a
    /// single glyph yields a single token.
    fn lex_invalid_run(&mut self) -> Token {
        let mut glyphs = 0usize;
        loop {
            let lead = self.buffer.current();
            if lead == 0 || is_token_start(lead) || lead.is_ascii_whitespace() {
                break;
            }
            for _ in 0..utf8_sequence_len(lead) {
                self.buffer.advance();
            }
            glyphs += 1;
        }

        let text = self.buffer.lexeme();
        let message = if glyphs == 1 {
            match text.chars().next() {
                Some(c) if c != char::REPLACEMENT_CHARACTER => {
                    format!("unexpected character '{}'", c)
                }
                _ => "unexpected character".to_string(),
            }
        } else {
            "unexpected characters".to_string()
        };
        self.error_token(&message, None, None)
    }

    fn consume_ident_tail(&mut self) {
        while is_ident_continue(self.buffer.current()) {
            self.buffer.advance();
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        self.buffer.advance();
        self.make_token(kind)
    }

    fn double(&mut self, kind: TokenKind) -> Token {
        self.buffer.advance();
        self.buffer.advance();
        self.make_token(kind)
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            self.buffer.lexeme(),
            self.token_line,
            self.token_column,
        )
    }

    fn token_span(&self, len: usize) -> Span {
        Span::new(self.token_line, self.token_column, len.max(1) as u32)
    }

    fn error_token(&mut self, message: &str, help: Option<&str>, fixit: Option<&str>) -> Token {
        let text = self.buffer.lexeme();
        let mut builder =
            DiagnosticBuilder::error(message).span(self.token_span(text.len()));
        if let Some(help) = help {
            builder = builder.help(help);
        }
        if let Some(fixit) = fixit {
            builder = builder.fixit(fixit);
        }
        builder.emit(self.handler);
        Token::new(TokenKind::Error, text, self.token_line, self.token_column)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Bytes that can begin a valid token (or carry their own targeted
/// diagnostic). An invalid run stops at any of these.
fn is_token_start(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'_' | b'+'
                | b'-'
                | b'*'
                | b'/'
                | b'('
                | b')'
                | b','
                | b';'
                | b'='
                | b'<'
                | b'>'
                | b':'
                | b'!'
                | b'&'
                | b'|'
                | b'{'
                | b'}'
                | b'['
                | b']'
                | b'"'
                | b'\''
        )
}

/// Length of the UTF-8 sequence introduced by `lead`, from the lead
/// byte's bit pattern. Stray continuation bytes count as length 1.
fn utf8_sequence_len(lead: u8) -> usize {
    match lead {
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 1,
    }
}


#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Tokenization is deterministic: identical input yields
        /// identical token sequences including positions.
        #[test]
        fn lexing_is_deterministic(source in ".{0,200}") {
            let first = {
                let handler = Handler::new();
                Lexer::from_str(&source, &handler).tokenize()
            };
            let second = {
                let handler = Handler::new();
                Lexer::from_str(&source, &handler).tokenize()
            };
            prop_assert_eq!(first, second);
        }

        /// The lexer terminates with exactly one EOF token on any
        /// input, error-ridden or not.
        #[test]
        fn lexing_always_terminates(source in prop::collection::vec(any::<u8>(), 0..400)) {
            let handler = Handler::new();
            let text = String::from_utf8_lossy(&source).into_owned();
            let tokens = Lexer::from_str(&text, &handler).tokenize();
            let eof_count = tokens
                .iter()
                .filter(|t| t.kind == TokenKind::Eof)
                .count();
            prop_assert_eq!(eof_count, 1);
            prop_assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
        }

        /// Lexeme bytes plus skipped whitespace account for every
        /// input byte (modulo '\r', which is silently consumed).
        #[test]
        fn byte_conservation(source in "[ -~\t\n]{0,300}") {
            let handler = Handler::new();
            let tokens = Lexer::from_str(&source, &handler).tokenize();
            let token_bytes: usize = tokens.iter().map(|t| t.text.len()).sum();
            let whitespace = source
                .bytes()
                .filter(|b| matches!(b, b' ' | b'\t' | b'\n'))
                .count();
            prop_assert_eq!(token_bytes + whitespace, source.len());
        }
    }
}
