//! pl0c-drv - Compiler Driver
//!
//! The driver is the entry point and orchestrator for the pipeline:
//!
//! ```text
//! Source file (.pl0)
//!        │
//!        ▼
//!   [Lexer] ──▶ token stream          (--tokens prints it)
//!        │
//!        ▼
//!   [Parser + emitter] ──▶ code       (--ast / --symbols / --code)
//!        │
//!        ▼
//!   [Virtual machine]                 (--run, the default)
//! ```
//!
//! Control flow is strictly sequential across phases. The diagnostic
//! tally is consulted between phases: any error renders its messages,
//! prints the summary line, and stops before the next phase with exit
//! code 1. Warnings never block.
//!
//! File lookup tries, in order: the literal path, `<input>.pl0`,
//! `test/<input>`, `test/<input>.pl0`, `../test/<input>`, and
//! `../test/<input>.pl0`.

pub mod error;

pub use error::{DriverError, Result};

use pl0c_lex::{Lexer, Source, SourceBuffer, Token, TokenKind};
use pl0c_par::{ParseResult, Parser, Symbol};
use pl0c_util::{Handler, Level, Renderer};
use pl0c_vm::Machine;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Driver configuration, built from the CLI flags (or `Default` for
/// library use: compile and run, print nothing extra).
#[derive(Debug, Clone)]
pub struct Config {
    /// Echo the source with line numbers before the phases.
    pub show_source: bool,
    /// Print the token table.
    pub show_tokens: bool,
    /// Print the parse-tree trace.
    pub show_ast: bool,
    /// Print the symbol-table journal.
    pub show_symbols: bool,
    /// Print the instruction listing.
    pub show_code: bool,
    /// Stop after lexing.
    pub lex_only: bool,
    /// Execute the generated code.
    pub run: bool,
    /// Per-step execution trace.
    pub debug: bool,
    /// ANSI color in diagnostics.
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            show_source: false,
            show_tokens: false,
            show_ast: false,
            show_symbols: false,
            show_code: false,
            lex_only: false,
            run: true,
            debug: false,
            color: true,
        }
    }
}

/// One compiler invocation: configuration plus the diagnostic state
/// shared by every phase.
pub struct Session {
    /// Configuration for this run.
    pub config: Config,
    handler: Handler,
    errors: usize,
    warnings: usize,
}

impl Session {
    /// Create a session.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handler: Handler::new(),
            errors: 0,
            warnings: 0,
        }
    }

    /// Full pipeline against the real standard streams: locate the
    /// file, compile, and (by default) execute.
    pub fn run_path(&mut self, input: &str) -> Result<()> {
        let parsed = self.compile_path(input)?;
        if let Some(parsed) = parsed {
            if self.config.run {
                let stdin = std::io::stdin();
                let mut reader = stdin.lock();
                let stdout = std::io::stdout();
                let mut writer = stdout.lock();
                self.execute(&parsed, &mut reader, &mut writer)?;
            }
        }
        Ok(())
    }

    /// Locate and compile a file. Returns `None` when configured to
    /// stop after lexing.
    pub fn compile_path(&mut self, input: &str) -> Result<Option<ParseResult>> {
        let path =
            locate_source(input).ok_or_else(|| DriverError::FileNotFound(input.to_string()))?;
        info!("compiling {}", path.display());
        let source = Source::open(&path).map_err(|source| DriverError::Io {
            path: path.clone(),
            source,
        })?;
        self.compile(&path.display().to_string(), source)
    }

    /// Compile in-memory source text (tests, library callers).
    pub fn compile_source(&mut self, name: &str, text: &str) -> Result<Option<ParseResult>> {
        self.compile(name, Source::from_str(text))
    }

    fn compile(&mut self, name: &str, source: Source) -> Result<Option<ParseResult>> {
        debug!("phase: lex");
        let mut lexer = Lexer::new(SourceBuffer::new(source), &self.handler);
        let tokens = lexer.tokenize();
        let lines = lexer.take_lines();
        let renderer = Renderer::new(name, lines.clone(), self.config.color);

        if self.config.show_source {
            print_source(&lines);
        }
        if self.config.show_tokens {
            print_tokens(&tokens);
        }

        if self.flush_diagnostics(&renderer) > 0 {
            return self.fail();
        }
        if self.config.lex_only {
            self.summarize();
            return Ok(None);
        }

        debug!("phase: parse");
        let parsed = Parser::new(tokens, &self.handler).parse();

        if self.config.show_ast {
            print_trace(&parsed.trace);
        }
        if self.config.show_symbols {
            print_symbols(&parsed.symbols);
        }
        if self.config.show_code {
            print!("{}", parsed.program.listing());
        }

        if self.flush_diagnostics(&renderer) > 0 {
            return self.fail();
        }

        self.summarize();
        Ok(Some(parsed))
    }

    /// Execute compiled code against the given streams.
    pub fn execute(
        &mut self,
        parsed: &ParseResult,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<()> {
        debug!("phase: run");
        let mut machine = Machine::new(parsed.program.instructions(), input, output)
            .with_trace(self.config.debug);
        machine.run()?;
        Ok(())
    }

    /// Render pending diagnostics to stderr; returns how many were
    /// errors.
    fn flush_diagnostics(&mut self, renderer: &Renderer) -> usize {
        let diagnostics = self.handler.take();
        if diagnostics.is_empty() {
            return 0;
        }
        let errors = diagnostics.iter().filter(|d| d.level.is_error()).count();
        let warnings = diagnostics
            .iter()
            .filter(|d| d.level == Level::Warning)
            .count();
        self.errors += errors;
        self.warnings += warnings;
        eprintln!("{}", renderer.render_all(&diagnostics));
        errors
    }

    fn summarize(&self) {
        if self.errors > 0 || self.warnings > 0 {
            eprintln!("{} error(s), {} warning(s)", self.errors, self.warnings);
        }
    }

    fn fail(&mut self) -> Result<Option<ParseResult>> {
        self.summarize();
        Err(DriverError::CompileFailed(self.errors))
    }

    /// Total errors rendered so far.
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Total warnings rendered so far.
    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}

/// Resolve an input argument to a source file, trying the literal path
/// first, then the `.pl0` extension, then the test directories.
pub fn locate_source(input: &str) -> Option<PathBuf> {
    let with_extension = format!("{}.pl0", input);
    let candidates = [
        PathBuf::from(input),
        PathBuf::from(&with_extension),
        Path::new("test").join(input),
        Path::new("test").join(&with_extension),
        Path::new("../test").join(input),
        Path::new("../test").join(&with_extension),
    ];
    candidates.into_iter().find(|path| path.is_file())
}

fn print_source(lines: &[String]) {
    let width = lines.len().to_string().len().max(3);
    for (index, line) in lines.iter().enumerate() {
        println!("{:>width$} | {}", index + 1, line, width = width);
    }
}

fn print_tokens(tokens: &[Token]) {
    for token in tokens {
        if token.kind == TokenKind::Eof {
            println!("{:>4}:{:<4} {:<12}", token.line, token.column, "Eof");
            continue;
        }
        println!(
            "{:>4}:{:<4} {:<12} {}",
            token.line,
            token.column,
            format!("{:?}", token.kind),
            token.text
        );
    }
}

fn print_trace(trace: &[String]) {
    for line in trace {
        println!("{}", line);
    }
}

fn print_symbols(symbols: &[Symbol]) {
    println!("{:<6} {:<10} {:<16} {}", "level", "kind", "name", "value");
    for symbol in symbols {
        println!(
            "{:<6} {:<10} {:<16} {}",
            symbol.level,
            symbol.kind.to_string(),
            symbol.name,
            symbol.payload
        );
    }
}
