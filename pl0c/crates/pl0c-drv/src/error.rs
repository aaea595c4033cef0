//! Driver-level errors.
//!
//! Compile diagnostics are not Rust errors; they accumulate in the
//! diagnostic handler and are rendered to stderr. What surfaces here is
//! everything that stops the driver itself: missing inputs, I/O
//! failures, a non-zero error tally between phases, and runtime halts.

use pl0c_vm::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors the driver maps to exit code 1.
#[derive(Debug, Error)]
pub enum DriverError {
    /// No candidate path resolved to a readable file.
    #[error("file not found: '{0}' (tried the literal path, '.pl0', and the test directories)")]
    FileNotFound(String),

    /// The source could not be opened or read.
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A phase finished with errors; diagnostics were already rendered.
    #[error("compilation failed with {0} error(s)")]
    CompileFailed(usize),

    /// The virtual machine halted.
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

/// Driver result alias.
pub type Result<T> = std::result::Result<T, DriverError>;
