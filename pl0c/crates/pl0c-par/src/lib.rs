//! pl0c-par - Parser and Code Emitter
//!
//! Single-pass predictive recursive descent over the PL/0 grammar:
//!
//! ```ebnf
//! program   = "program" ident ";" block ;
//! block     = [ "const" constdef { "," constdef } ";" ]
//!             [ "var" ident { "," ident } ";" ]
//!             { "procedure" ident "(" [ ident { "," ident } ] ")" ";" block ";" }
//!             statement ;
//! constdef  = ident ":=" [ "+" | "-" ] number ;
//! statement = ident ":=" expression
//!           | "call" ident "(" [ expression { "," expression } ] ")"
//!           | "begin" statement { ";" statement } "end"
//!           | "if" condition "then" statement [ "else" statement ]
//!           | "while" condition "do" statement
//!           | "read" "(" ident { "," ident } ")"
//!           | "write" "(" expression { "," expression } ")"
//!           | (* empty *) ;
//! condition = "odd" expression
//!           | expression ( "=" | "<>" | "<" | "<=" | ">" | ">=" ) expression ;
//! expression = [ "+" | "-" ] term { ( "+" | "-" ) term } ;
//! term      = factor { ( "*" | "/" ) factor } ;
//! factor    = ident | number | "(" expression ")" ;
//! ```
//!
//! There is no AST. Each production appends instructions as soon as its
//! operands' positions are known; forward jumps are emitted with a
//! placeholder target of 0 and patched once the target address exists.
//! Every block starts with a `JMP` over its nested procedure bodies,
//! followed by `INT` to allocate the frame; the first instruction of a
//! program is therefore always that outermost jump.
//!
//! Semantic checking rides along on the scoped symbol table: undeclared
//! and redeclared names, assignment to constants or procedures, calls
//! of non-procedures, procedures used as values, and reads into
//! non-variables are all reported here, with context-sensitive fix-its
//! for `=` where `:=` was required.
//!
//! On an unexpected token the parser records the error and a
//! synchronization scanner skips ahead, halting at `;` (which it
//! consumes), `begin`, `end`, `const`, `var`, `procedure`, or end of
//! file. No diagnostic aborts the parse; the driver consults the error
//! tally afterwards.

pub mod symtab;

pub use symtab::{Symbol, SymbolKind, SymbolTable};

use pl0c_code::{Opcode, Operation, Program};
use pl0c_lex::{Token, TokenKind};
use pl0c_util::{DiagnosticBuilder, Handler};

/// Everything the parse produces: the instruction vector, the
/// declaration journal for the symbol dump, and the production trace.
pub struct ParseResult {
    /// Emitted instructions, read-only from here on.
    pub program: Program,
    /// Every declaration, in source order (scopes themselves are
    /// popped during the single pass).
    pub symbols: Vec<Symbol>,
    /// Indented production-entry trace for `--ast`.
    pub trace: Vec<String>,
}

/// Recursive-descent parser with inline code emission.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    position: usize,
    handler: &'a Handler,
    table: SymbolTable,
    program: Program,
    trace: Vec<String>,
    trace_depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser over a token stream (terminated by EOF).
    pub fn new(tokens: Vec<Token>, handler: &'a Handler) -> Self {
        Self {
            tokens,
            position: 0,
            handler,
            table: SymbolTable::new(),
            program: Program::new(),
            trace: Vec::new(),
            trace_depth: 0,
        }
    }

    /// Parse the whole program, emitting code as it goes. The driver
    /// decides success from the handler's error tally.
    pub fn parse(mut self) -> ParseResult {
        self.trace_enter("program");

        if !self.expect(TokenKind::Program) {
            self.recover_to_sync_point();
        }
        self.expect(TokenKind::Ident);
        self.expect(TokenKind::Semicolon);

        self.table.enter_scope();
        self.block();
        self.program.emit(Opcode::Opr, 0, Operation::Ret.code());
        self.table.exit_scope();

        if self.current().kind != TokenKind::Eof {
            let token = self.current().clone();
            DiagnosticBuilder::error(format!(
                "unexpected {} after program end",
                token.kind.describe()
            ))
            .span(token.span())
            .emit(self.handler);
        }

        self.trace_exit();
        ParseResult {
            program: self.program,
            symbols: self.table.take_journal(),
            trace: self.trace,
        }
    }

    // ------------------------------------------------------------------
    // Blocks and declarations
    // ------------------------------------------------------------------

    fn block(&mut self) {
        self.trace_enter("block");

        // Reserve a jump over the nested procedure bodies; patched once
        // they have been emitted.
        let jump = self.program.emit(Opcode::Jmp, 0, 0);

        if self.current().kind == TokenKind::Const {
            self.const_declarations();
        }
        if self.current().kind == TokenKind::Var {
            self.var_declarations();
        }
        while self.current().kind == TokenKind::Procedure {
            self.procedure_declaration();
        }

        self.program.patch(jump, self.program.next_addr());
        self.program.emit(Opcode::Int, 0, self.table.frame_size());

        self.statement();
        self.trace_exit();
    }

    fn const_declarations(&mut self) {
        self.trace_enter("const-declaration");
        self.advance(); // const

        loop {
            let name = match self.current().kind {
                TokenKind::Ident => {
                    let token = self.current().clone();
                    self.advance();
                    token
                }
                _ => {
                    self.error_here("expected constant name after 'const'", None);
                    self.recover_to_sync_point();
                    self.trace_exit();
                    return;
                }
            };

            match self.current().kind {
                TokenKind::Assign => self.advance(),
                TokenKind::Eq => {
                    let span = self.current().span();
                    DiagnosticBuilder::error("use ':=' to initialize a constant")
                        .span(span)
                        .fixit(":=")
                        .emit(self.handler);
                    self.advance();
                }
                _ => self.error_here("expected ':=' in constant declaration", Some(":=")),
            }

            let mut sign = 1i64;
            match self.current().kind {
                TokenKind::Plus => self.advance(),
                TokenKind::Minus => {
                    sign = -1;
                    self.advance();
                }
                _ => {}
            }

            let value = match self.current().kind {
                TokenKind::Number => {
                    let value = self.current().text.parse::<i64>().unwrap_or(0);
                    self.advance();
                    sign * value
                }
                _ => {
                    self.error_here("expected integer constant", None);
                    self.recover_to_sync_point();
                    self.trace_exit();
                    return;
                }
            };

            if self.table.lookup_current(&name.text).is_some() {
                self.report_redeclaration(&name);
            } else {
                self.table.declare(&name.text, SymbolKind::Constant, value);
            }

            if self.current().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(TokenKind::Semicolon);
        self.trace_exit();
    }

    fn var_declarations(&mut self) {
        self.trace_enter("var-declaration");
        self.advance(); // var

        loop {
            match self.current().kind {
                TokenKind::Ident => {
                    let name = self.current().clone();
                    self.advance();
                    if self.table.lookup_current(&name.text).is_some() {
                        self.report_redeclaration(&name);
                    } else {
                        self.table.declare(&name.text, SymbolKind::Variable, 0);
                    }
                }
                _ => {
                    self.error_here("expected variable name after 'var'", None);
                    self.recover_to_sync_point();
                    self.trace_exit();
                    return;
                }
            }

            if self.current().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(TokenKind::Semicolon);
        self.trace_exit();
    }

    fn procedure_declaration(&mut self) {
        self.trace_enter("procedure-declaration");
        self.advance(); // procedure

        let name = match self.current().kind {
            TokenKind::Ident => {
                let token = self.current().clone();
                self.advance();
                Some(token)
            }
            _ => {
                self.error_here("expected procedure name after 'procedure'", None);
                None
            }
        };

        // The procedure symbol lives in the enclosing scope; its entry
        // address is the next instruction, which will be the new
        // block's jump over any further nesting.
        if let Some(name) = &name {
            if self.table.lookup_current(&name.text).is_some() {
                self.report_redeclaration(name);
            } else {
                self.table.declare(
                    &name.text,
                    SymbolKind::Procedure,
                    self.program.next_addr() as i64,
                );
            }
        }

        // Parameter names are accepted syntactically and become
        // variables of the new scope; the call sequence evaluates
        // arguments but does not deliver them (see `call_statement`).
        let mut params: Vec<Token> = Vec::new();
        self.expect(TokenKind::LParen);
        if self.current().kind == TokenKind::Ident {
            params.push(self.current().clone());
            self.advance();
            while self.current().kind == TokenKind::Comma {
                self.advance();
                match self.current().kind {
                    TokenKind::Ident => {
                        params.push(self.current().clone());
                        self.advance();
                    }
                    _ => {
                        self.error_here("expected parameter name after ','", None);
                        break;
                    }
                }
            }
        }
        self.expect(TokenKind::RParen);
        self.expect(TokenKind::Semicolon);

        self.table.enter_scope();
        for param in &params {
            if self.table.lookup_current(&param.text).is_some() {
                self.report_redeclaration(param);
            } else {
                self.table.declare(&param.text, SymbolKind::Variable, 0);
            }
        }

        self.block();
        self.program.emit(Opcode::Opr, 0, Operation::Ret.code());
        self.table.exit_scope();

        self.expect(TokenKind::Semicolon);
        self.trace_exit();
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn statement(&mut self) {
        // Error tokens were already diagnosed by the lexer.
        while self.current().kind == TokenKind::Error {
            self.advance();
        }

        self.trace_enter("statement");
        match self.current().kind {
            TokenKind::Ident => self.assignment(),
            TokenKind::Call => self.call_statement(),
            TokenKind::Begin => self.begin_block(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Read => self.read_statement(),
            TokenKind::Write => self.write_statement(),
            // The empty statement: nothing between ';' and 'end' (or a
            // trailing ';') is tolerated.
            TokenKind::Semicolon | TokenKind::End | TokenKind::Eof => {}
            kind => {
                self.error_here(
                    &format!("unexpected {} at start of statement", kind.describe()),
                    None,
                );
                self.recover_to_sync_point();
            }
        }
        self.trace_exit();
    }

    fn assignment(&mut self) {
        let name = self.current().clone();
        self.advance();

        match self.current().kind {
            TokenKind::Assign => self.advance(),
            TokenKind::Eq => {
                let span = self.current().span();
                DiagnosticBuilder::error("use ':=' for assignment")
                    .span(span)
                    .help("'=' compares; ':=' assigns")
                    .fixit(":=")
                    .emit(self.handler);
                self.advance();
            }
            _ => self.error_here("expected ':=' after identifier", Some(":=")),
        }

        let target = self.resolve(&name).and_then(|symbol| match symbol.kind {
            SymbolKind::Variable => Some(symbol),
            SymbolKind::Constant => {
                DiagnosticBuilder::error(format!("cannot assign to constant '{}'", name.text))
                    .span(name.span())
                    .emit(self.handler);
                None
            }
            SymbolKind::Procedure => {
                DiagnosticBuilder::error(format!("cannot assign to procedure '{}'", name.text))
                    .span(name.span())
                    .emit(self.handler);
                None
            }
        });

        self.expression();

        if let Some(symbol) = target {
            let level = self.table.current_level() - symbol.level;
            self.program.emit(Opcode::Sto, level, symbol.payload);
        }
    }

    /// `call id ( [exp {, exp}] )`. Arguments are parsed and their
    /// evaluation code emitted (the values land on the stack), but the
    /// emitted `CAL` does not deliver them into the callee frame: the
    /// callee's `INT` repositions T past them. This mirrors the
    /// classical dialect, where parameter syntax is decoration.
    fn call_statement(&mut self) {
        self.advance(); // call

        let callee = match self.current().kind {
            TokenKind::Ident => {
                let token = self.current().clone();
                self.advance();
                Some(token)
            }
            _ => {
                self.error_here("expected procedure name after 'call'", None);
                None
            }
        };

        let target = callee.as_ref().and_then(|name| {
            self.resolve(name).and_then(|symbol| match symbol.kind {
                SymbolKind::Procedure => Some(symbol),
                _ => {
                    DiagnosticBuilder::error(format!("'{}' is not a procedure", name.text))
                        .span(name.span())
                        .emit(self.handler);
                    None
                }
            })
        });

        self.expect(TokenKind::LParen);
        if !matches!(self.current().kind, TokenKind::RParen | TokenKind::Eof) {
            self.expression();
            while self.current().kind == TokenKind::Comma {
                self.advance();
                self.expression();
            }
        }
        self.expect(TokenKind::RParen);

        if let Some(symbol) = target {
            let level = self.table.current_level() - symbol.level;
            self.program.emit(Opcode::Cal, level, symbol.payload);
        }
    }

    fn begin_block(&mut self) {
        self.advance(); // begin

        loop {
            if matches!(self.current().kind, TokenKind::End | TokenKind::Eof) {
                break;
            }
            self.statement();
            match self.current().kind {
                TokenKind::Semicolon => self.advance(),
                TokenKind::End | TokenKind::Eof => break,
                kind if starts_statement(kind) => {
                    self.error_here("expected ';' between statements", Some(";"));
                }
                _ => break,
            }
        }

        self.expect(TokenKind::End);
    }

    fn if_statement(&mut self) {
        self.advance(); // if
        self.condition();
        self.expect_keyword(TokenKind::Then, "expected 'then' after condition");

        let skip = self.program.emit(Opcode::Jpc, 0, 0);
        self.statement();

        if self.current().kind == TokenKind::Else {
            self.advance();
            let exit = self.program.emit(Opcode::Jmp, 0, 0);
            self.program.patch(skip, self.program.next_addr());
            self.statement();
            self.program.patch(exit, self.program.next_addr());
        } else {
            self.program.patch(skip, self.program.next_addr());
        }
    }

    fn while_statement(&mut self) {
        self.advance(); // while

        let top = self.program.next_addr();
        self.condition();
        self.expect_keyword(TokenKind::Do, "expected 'do' after condition");

        let exit = self.program.emit(Opcode::Jpc, 0, 0);
        self.statement();
        self.program.emit(Opcode::Jmp, 0, top as i64);
        self.program.patch(exit, self.program.next_addr());
    }

    fn read_statement(&mut self) {
        self.advance(); // read
        self.expect(TokenKind::LParen);

        loop {
            match self.current().kind {
                TokenKind::Ident => {
                    let name = self.current().clone();
                    self.advance();
                    if let Some(symbol) = self.resolve(&name) {
                        match symbol.kind {
                            SymbolKind::Variable => {
                                let level = self.table.current_level() - symbol.level;
                                self.program.emit(Opcode::Red, level, symbol.payload);
                            }
                            SymbolKind::Constant => {
                                DiagnosticBuilder::error(format!(
                                    "cannot read into constant '{}'",
                                    name.text
                                ))
                                .span(name.span())
                                .emit(self.handler);
                            }
                            SymbolKind::Procedure => {
                                DiagnosticBuilder::error(format!(
                                    "cannot read into procedure '{}'",
                                    name.text
                                ))
                                .span(name.span())
                                .emit(self.handler);
                            }
                        }
                    }
                }
                _ => {
                    self.error_here("expected variable name in 'read'", None);
                    break;
                }
            }

            if self.current().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }

        self.expect(TokenKind::RParen);
    }

    fn write_statement(&mut self) {
        self.advance(); // write
        self.expect(TokenKind::LParen);

        if !matches!(self.current().kind, TokenKind::RParen | TokenKind::Eof) {
            self.expression();
            self.program.emit(Opcode::Wrt, 0, 0);
            while self.current().kind == TokenKind::Comma {
                self.advance();
                self.expression();
                self.program.emit(Opcode::Wrt, 0, 0);
            }
        }

        self.expect(TokenKind::RParen);
    }

    // ------------------------------------------------------------------
    // Conditions and expressions
    // ------------------------------------------------------------------

    fn condition(&mut self) {
        self.trace_enter("condition");

        if self.current().kind == TokenKind::Odd {
            self.advance();
            self.expression();
            self.program.emit(Opcode::Opr, 0, Operation::Odd.code());
            self.trace_exit();
            return;
        }

        self.expression();
        let operation = match self.current().kind {
            TokenKind::Eq => Some(Operation::Eq),
            TokenKind::Ne => Some(Operation::Neq),
            TokenKind::Lt => Some(Operation::Lt),
            TokenKind::Le => Some(Operation::Le),
            TokenKind::Gt => Some(Operation::Gt),
            TokenKind::Ge => Some(Operation::Ge),
            _ => {
                self.error_here("expected relational operator in condition", None);
                None
            }
        };

        if let Some(operation) = operation {
            self.advance();
            self.expression();
            self.program.emit(Opcode::Opr, 0, operation.code());
        }

        self.trace_exit();
    }

    fn expression(&mut self) {
        self.trace_enter("expression");

        let negate = match self.current().kind {
            TokenKind::Plus => {
                self.advance();
                false
            }
            TokenKind::Minus => {
                self.advance();
                true
            }
            _ => false,
        };

        self.term();
        if negate {
            self.program.emit(Opcode::Opr, 0, Operation::Neg.code());
        }

        loop {
            let operation = match self.current().kind {
                TokenKind::Plus => Operation::Add,
                TokenKind::Minus => Operation::Sub,
                _ => break,
            };
            self.advance();
            self.term();
            self.program.emit(Opcode::Opr, 0, operation.code());
        }

        self.trace_exit();
    }

    fn term(&mut self) {
        self.trace_enter("term");

        self.factor();
        loop {
            let operation = match self.current().kind {
                TokenKind::Star => Operation::Mul,
                TokenKind::Slash => Operation::Div,
                _ => break,
            };
            self.advance();
            self.factor();
            self.program.emit(Opcode::Opr, 0, operation.code());
        }

        self.trace_exit();
    }

    fn factor(&mut self) {
        self.trace_enter("factor");

        match self.current().kind {
            TokenKind::Ident => {
                let name = self.current().clone();
                self.advance();
                match self.resolve(&name) {
                    Some(symbol) => match symbol.kind {
                        SymbolKind::Constant => {
                            self.program.emit(Opcode::Lit, 0, symbol.payload);
                        }
                        SymbolKind::Variable => {
                            let level = self.table.current_level() - symbol.level;
                            self.program.emit(Opcode::Lod, level, symbol.payload);
                        }
                        SymbolKind::Procedure => {
                            DiagnosticBuilder::error(format!(
                                "procedure '{}' cannot be used as a value",
                                name.text
                            ))
                            .span(name.span())
                            .emit(self.handler);
                            self.program.emit(Opcode::Lit, 0, 0);
                        }
                    },
                    // Undeclared: already reported; keep the stack shape.
                    None => {
                        self.program.emit(Opcode::Lit, 0, 0);
                    }
                }
            }
            TokenKind::Number => {
                let value = self.current().text.parse::<i64>().unwrap_or(0);
                self.advance();
                self.program.emit(Opcode::Lit, 0, value);
            }
            TokenKind::LParen => {
                self.advance();
                self.expression();
                self.expect(TokenKind::RParen);
            }
            TokenKind::Error => {
                // Already diagnosed by the lexer.
                self.advance();
                self.program.emit(Opcode::Lit, 0, 0);
            }
            kind => {
                self.error_here(
                    &format!("expected expression, found {}", kind.describe()),
                    None,
                );
                self.program.emit(Opcode::Lit, 0, 0);
            }
        }

        self.trace_exit();
    }

    // ------------------------------------------------------------------
    // Token plumbing, diagnostics, recovery
    // ------------------------------------------------------------------

    fn current(&self) -> &Token {
        // The stream always ends with EOF; clamp defensively.
        self.tokens
            .get(self.position)
            .unwrap_or_else(|| self.tokens.last().expect("token stream is never empty"))
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    /// Expect a specific token, consuming it on match. On mismatch,
    /// report at the current token (with an insertion fix-it for
    /// punctuation) and continue as if the token had been present.
    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.current().kind == kind {
            self.advance();
            return true;
        }

        let fixit = match kind {
            TokenKind::Semicolon => Some(";"),
            TokenKind::RParen => Some(")"),
            TokenKind::Assign => Some(":="),
            TokenKind::End => Some("end"),
            _ => None,
        };
        self.error_here(&format!("expected {}", kind.describe()), fixit);
        false
    }

    /// Expect a statement keyword (`then`, `do`) with a tailored
    /// message and an insertion fix-it.
    fn expect_keyword(&mut self, kind: TokenKind, message: &str) -> bool {
        if self.current().kind == kind {
            self.advance();
            return true;
        }
        let fixit = match kind {
            TokenKind::Then => "then",
            TokenKind::Do => "do",
            _ => kind.describe(),
        };
        self.error_here(message, Some(fixit));
        false
    }

    fn error_here(&mut self, message: &str, fixit: Option<&str>) {
        let span = self.current().span();
        let mut builder = DiagnosticBuilder::error(message).span(span);
        if let Some(fixit) = fixit {
            builder = builder.fixit(fixit);
        }
        builder.emit(self.handler);
    }

    fn report_redeclaration(&mut self, name: &Token) {
        DiagnosticBuilder::error(format!("redeclaration of '{}'", name.text))
            .span(name.span())
            .help("each name may be declared once per scope")
            .emit(self.handler);
    }

    /// Resolve an identifier, reporting "use of undeclared identifier"
    /// if no scope declares it.
    fn resolve(&mut self, name: &Token) -> Option<Symbol> {
        match self.table.lookup(&name.text) {
            Some(symbol) => Some(symbol.clone()),
            None => {
                DiagnosticBuilder::error(format!(
                    "use of undeclared identifier '{}'",
                    name.text
                ))
                .span(name.span())
                .emit(self.handler);
                None
            }
        }
    }

    /// Skip ahead to a synchronization point: a ';' (consumed),
    /// 'begin', 'end', 'const', 'var', 'procedure', or EOF. Always
    /// consumes at least one token so the caller makes progress.
    fn recover_to_sync_point(&mut self) {
        if self.current().kind != TokenKind::Eof {
            self.advance();
        }
        loop {
            match self.current().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Begin
                | TokenKind::End
                | TokenKind::Const
                | TokenKind::Var
                | TokenKind::Procedure
                | TokenKind::Eof => return,
                _ => self.advance(),
            }
        }
    }

    // ------------------------------------------------------------------
    // Parse trace
    // ------------------------------------------------------------------

    fn trace_enter(&mut self, label: &str) {
        let token = self.current();
        let brief = if token.text.is_empty() {
            token.kind.describe().to_string()
        } else {
            token.text.clone()
        };
        self.trace.push(format!(
            "{}{} ({})",
            "  ".repeat(self.trace_depth),
            label,
            brief
        ));
        self.trace_depth += 1;
    }

    fn trace_exit(&mut self) {
        self.trace_depth = self.trace_depth.saturating_sub(1);
    }
}

fn starts_statement(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Call
            | TokenKind::Begin
            | TokenKind::If
            | TokenKind::While
            | TokenKind::Read
            | TokenKind::Write
    )
}
