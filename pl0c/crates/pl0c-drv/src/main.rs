//! The `pl0` command-line interface.
//!
//! Thin adapter over [`pl0c_drv::Session`]: parses flags with clap,
//! installs the tracing subscriber for `-V/--verbose` phase banners,
//! and maps driver errors to exit code 1.

use clap::{ArgAction, Parser};
use pl0c_drv::{Config, DriverError, Session};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// PL/0 compiler and interpreter.
#[derive(Parser, Debug)]
#[command(name = "pl0")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run PL/0 programs", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Input program; also tried as <input>.pl0 and under test/
    input: String,

    /// Print the token table
    #[arg(short = 't', long)]
    tokens: bool,

    /// Print the parse-tree trace
    #[arg(short = 'a', long)]
    ast: bool,

    /// Print the symbol table
    #[arg(short = 's', long)]
    symbols: bool,

    /// Print the instruction listing
    #[arg(short = 'c', long)]
    code: bool,

    /// Echo the source with line numbers before the phases
    #[arg(long)]
    source: bool,

    /// Enable --tokens --ast --symbols --code --source
    #[arg(long)]
    all: bool,

    /// Execute the generated code (the default)
    #[arg(long, overrides_with = "no_run")]
    run: bool,

    /// Compile without executing
    #[arg(long)]
    no_run: bool,

    /// Per-step execution trace with stack snapshots
    #[arg(short = 'd', long)]
    debug: bool,

    /// Stop after lexing (implies --tokens --no-run)
    #[arg(long)]
    lexer_only: bool,

    /// Stop after parsing (implies --ast --no-run)
    #[arg(long)]
    parse_only: bool,

    /// Stop after compiling (implies --no-run)
    #[arg(long)]
    compile_only: bool,

    /// Disable ANSI color escapes
    #[arg(long)]
    no_color: bool,

    /// Print phase banners
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Print version information and exit
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

impl Cli {
    fn to_config(&self) -> Config {
        let run = !(self.no_run || self.lexer_only || self.parse_only || self.compile_only);
        Config {
            show_source: self.source || self.all,
            show_tokens: self.tokens || self.all || self.lexer_only,
            show_ast: self.ast || self.all || self.parse_only,
            show_symbols: self.symbols || self.all,
            show_code: self.code || self.all,
            lex_only: self.lexer_only,
            run,
            debug: self.debug,
            color: !self.no_color,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
            .init();
    }

    let mut session = Session::new(cli.to_config());
    match session.run_path(&cli.input) {
        Ok(()) => {}
        Err(DriverError::CompileFailed(_)) => {
            // Diagnostics and the summary line are already on stderr.
            std::process::exit(1);
        }
        Err(error) => {
            eprintln!("error: {}", error);
            std::process::exit(1);
        }
    }
}
