//! pl0c-lex - Lexical Analyzer
//!
//! Lexical analysis turns PL/0 source bytes into a token stream:
//!
//! ```text
//! Source bytes
//!      │
//!      ▼
//! [SourceBuffer]  two 4096-byte halves with NUL sentinels
//!      │
//!      ▼
//! [Lexer]         longest-match scanning, keyword classification
//!      │
//!      ▼
//! Token stream    terminated by exactly one EOF token
//! ```
//!
//! The buffer owns its character source (file, memory, or borrowed
//! reader) and tracks byte positions: the sentinel scheme means the
//! scanner's hot loop performs a single comparison to detect both
//! half-boundaries and end of input. Completed source lines are cached
//! as a side effect so diagnostics can show them without re-reading
//! the file.
//!
//! Errors never stop the lexer. Invalid input becomes error tokens
//! with diagnostics on the shared handler: glued digit/identifier runs
//! (`123abc`), a leading underscore, stray `:`, C-style operators
//! (`!=`, `&&`, `||`), braces, brackets, quotes, and arbitrary invalid
//! runs (one token per multi-byte UTF-8 glyph). The parser continues
//! over error tokens and reports its own diagnostics downstream.

pub mod buffer;
pub mod lexer;
pub mod source;
pub mod token;

pub use buffer::{SourceBuffer, BLOCK};
pub use lexer::Lexer;
pub use source::Source;
pub use token::{keyword_from_ident, Token, TokenKind};

#[cfg(test)]
mod tests {
    use super::*;
    use pl0c_util::Handler;

    #[test]
    fn test_buffer_swap_transparency() {
        // A file larger than one buffer half must lex identically to
        // the same source fed as a string: the token streams are
        // compared position by position.
        let mut source = String::new();
        for i in 0..500 {
            source.push_str("const limit := 100; var value; begin value := limit end;\n");
            if i == 250 {
                source.push_str("while value <= 10 do value := value + 1;\n");
            }
        }
        assert!(source.len() > 2 * BLOCK);

        let handler = Handler::new();
        let from_memory = Lexer::from_str(&source, &handler).tokenize();

        let handler2 = Handler::new();
        let reader_source = Source::from_reader(std::io::Cursor::new(source.into_bytes()));
        let mut lexer = Lexer::new(SourceBuffer::new(reader_source), &handler2);
        let from_reader = lexer.tokenize();

        assert_eq!(from_memory, from_reader);
    }
}
