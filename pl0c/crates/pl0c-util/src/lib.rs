//! pl0c-util - Diagnostic and Source-Location Infrastructure
//!
//! This crate provides the foundation types shared by every phase of the
//! PL/0 compiler: source locations, the diagnostic model, and the
//! terminal renderer that produces Clang-style messages.
//!
//! The compilation phases (lexer, parser, virtual machine) never print
//! anything themselves. They report [`Diagnostic`] values to a shared
//! [`Handler`], which collects them behind interior mutability so the
//! lexer and parser can hold the same `&Handler`. The driver consults
//! the handler's error tally between phases and asks the [`Renderer`]
//! to format whatever accumulated.
//!
//! Severity levels:
//! - `error` blocks progression to the next phase and forces exit code 1
//! - `warning` is advisory and never blocks
//! - `note` attaches context to another diagnostic
//!
//! A diagnostic may carry a free-text help suggestion and a literal
//! fix-it replacement; the renderer prints them on dedicated `help:`
//! and `try:` gutter lines below the caret underline.

pub mod diagnostic;
pub mod span;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, Handler, Level, Renderer};
pub use span::Span;
