//! pl0c-vm - Stack-Based Virtual Machine
//!
//! Executes the instruction vector produced by the parser. The machine
//! keeps four scalar registers and one data stack:
//!
//! ```text
//! P  program counter (next instruction index)
//! T  top-of-stack index (-1 when empty)
//! B  base of the current activation record
//! I  instruction register (the instruction being executed)
//! ```
//!
//! Every activation record is a three-word header followed by locals:
//!
//! ```text
//! offset 0: return address  (instruction index to resume at)
//! offset 1: dynamic link    (base of the caller's record)
//! offset 2: static link     (base of the lexically enclosing record)
//! offset 3..: locals and parameters in declaration order
//! ```
//!
//! `base(L)` resolves a lexical level difference by following the
//! static-link slot L times, which implements nested-procedure scoping
//! without closures. RET discards the current frame and restores P and
//! B from the header; execution stops when a RET leaves T below zero,
//! which is the only normal termination condition.
//!
//! Runtime errors (division by zero, stack overflow, malformed input
//! on `read`) halt immediately. There is no retry and no partial
//! recovery.

mod machine;

pub use machine::{Machine, RuntimeError, STACK_CAPACITY};
