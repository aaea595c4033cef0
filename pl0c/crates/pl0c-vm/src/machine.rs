//! The fetch-execute loop.

use pl0c_code::{Instruction, Opcode, Operation};
use std::io::{BufRead, Write};
use thiserror::Error;

/// Data stack capacity, in slots. Sized once at construction.
pub const STACK_CAPACITY: usize = 10_000;

/// Errors that halt execution. No retry, no partial recovery.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("unknown operation code {0}")]
    UnknownOperation(i64),
    #[error("invalid input: expected an integer")]
    InvalidInput,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The PL/0 stack machine.
///
/// Owns its data stack; borrows the instruction vector and the I/O
/// endpoints so tests can substitute in-memory readers and writers for
/// stdin/stdout.
pub struct Machine<'a> {
    code: &'a [Instruction],
    stack: Vec<i64>,
    /// Program counter: next instruction index.
    p: usize,
    /// Top-of-stack index; -1 when the stack is empty.
    t: i64,
    /// Base of the current activation record.
    b: usize,
    /// Instruction register: the instruction being executed.
    i: Instruction,
    input: &'a mut dyn BufRead,
    output: &'a mut dyn Write,
    trace: bool,
}

impl<'a> Machine<'a> {
    /// Create a machine over a finished instruction vector.
    pub fn new(
        code: &'a [Instruction],
        input: &'a mut dyn BufRead,
        output: &'a mut dyn Write,
    ) -> Self {
        Self {
            code,
            stack: vec![0; STACK_CAPACITY],
            p: 0,
            t: -1,
            b: 0,
            i: Instruction::new(Opcode::Jmp, 0, 0),
            input,
            output,
            trace: false,
        }
    }

    /// Enable the per-step execution trace (printed to stderr).
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Execute from instruction 0 until the program returns from its
    /// outermost frame or a runtime error halts it.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.step()? {}
        Ok(())
    }

    /// Execute one instruction. Returns false once execution has
    /// terminated normally.
    fn step(&mut self) -> Result<bool, RuntimeError> {
        debug_assert!(self.p < self.code.len(), "P ran off the end of the code");
        if self.p >= self.code.len() {
            return Ok(false);
        }

        self.i = self.code[self.p];
        self.p += 1;

        let keep_going = match self.i.op {
            Opcode::Lit => {
                self.push(self.i.addr)?;
                true
            }
            Opcode::Opr => self.operate(self.i.addr)?,
            Opcode::Lod => {
                let value = self.stack[self.base(self.i.level) + self.i.addr as usize];
                self.push(value)?;
                true
            }
            Opcode::Sto => {
                let slot = self.base(self.i.level) + self.i.addr as usize;
                self.stack[slot] = self.pop();
                true
            }
            Opcode::Cal => {
                let static_link = self.base(self.i.level);
                let frame = (self.t + 1) as usize;
                if frame + 2 >= STACK_CAPACITY {
                    return Err(RuntimeError::StackOverflow);
                }
                self.stack[frame] = self.p as i64; // RA
                self.stack[frame + 1] = self.b as i64; // DL
                self.stack[frame + 2] = static_link as i64; // SL
                self.b = frame;
                self.p = self.i.addr as usize;
                true
            }
            Opcode::Int => {
                self.t += self.i.addr;
                if self.t as usize >= STACK_CAPACITY {
                    return Err(RuntimeError::StackOverflow);
                }
                true
            }
            Opcode::Jmp => {
                self.p = self.i.addr as usize;
                true
            }
            Opcode::Jpc => {
                if self.pop() == 0 {
                    self.p = self.i.addr as usize;
                }
                true
            }
            Opcode::Red => {
                let value = self.read_integer()?;
                let slot = self.base(self.i.level) + self.i.addr as usize;
                self.stack[slot] = value;
                true
            }
            Opcode::Wrt => {
                let value = self.pop();
                writeln!(self.output, "{}", value)?;
                self.output.flush()?;
                true
            }
        };

        if self.trace {
            self.print_trace();
        }
        Ok(keep_going)
    }

    /// Dispatch an OPR sub-operation. Returns false when a RET leaves
    /// the stack empty, which terminates the machine.
    fn operate(&mut self, code: i64) -> Result<bool, RuntimeError> {
        let operation =
            Operation::from_code(code).ok_or(RuntimeError::UnknownOperation(code))?;

        match operation {
            Operation::Ret => {
                self.t = self.b as i64 - 1;
                self.p = self.stack[self.b] as usize;
                self.b = self.stack[self.b + 1] as usize;
                // The only normal termination condition.
                return Ok(self.t >= 0);
            }
            Operation::Neg => {
                let top = self.pop();
                self.push(top.wrapping_neg())?;
            }
            Operation::Odd => {
                let top = self.pop();
                self.push(top & 1)?;
            }
            Operation::Add
            | Operation::Sub
            | Operation::Mul
            | Operation::Div
            | Operation::Eq
            | Operation::Neq
            | Operation::Lt
            | Operation::Ge
            | Operation::Gt
            | Operation::Le => {
                let rhs = self.pop();
                let lhs = self.pop();
                let value = match operation {
                    Operation::Add => lhs.wrapping_add(rhs),
                    Operation::Sub => lhs.wrapping_sub(rhs),
                    Operation::Mul => lhs.wrapping_mul(rhs),
                    Operation::Div => {
                        if rhs == 0 {
                            return Err(RuntimeError::DivisionByZero);
                        }
                        lhs.wrapping_div(rhs)
                    }
                    Operation::Eq => (lhs == rhs) as i64,
                    Operation::Neq => (lhs != rhs) as i64,
                    Operation::Lt => (lhs < rhs) as i64,
                    Operation::Ge => (lhs >= rhs) as i64,
                    Operation::Gt => (lhs > rhs) as i64,
                    Operation::Le => (lhs <= rhs) as i64,
                    _ => unreachable!(),
                };
                self.push(value)?;
            }
        }
        Ok(true)
    }

    /// Resolve a lexical level difference by walking the static links.
    fn base(&self, level: u32) -> usize {
        let mut base = self.b;
        for _ in 0..level {
            base = self.stack[base + 2] as usize;
        }
        base
    }

    fn push(&mut self, value: i64) -> Result<(), RuntimeError> {
        self.t += 1;
        if self.t as usize >= STACK_CAPACITY {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack[self.t as usize] = value;
        Ok(())
    }

    fn pop(&mut self) -> i64 {
        debug_assert!(self.t >= 0, "pop from empty stack");
        let value = self.stack[self.t as usize];
        self.t -= 1;
        value
    }

    /// Prompt with `? ` and read one signed integer from a line of
    /// input. Malformed or missing input halts the machine.
    fn read_integer(&mut self) -> Result<i64, RuntimeError> {
        write!(self.output, "? ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(RuntimeError::InvalidInput);
        }
        line.trim().parse::<i64>().map_err(|_| RuntimeError::InvalidInput)
    }

    fn print_trace(&self) {
        let visible = &self.stack[..(self.t + 1).max(0) as usize];
        let window_start = visible.len().saturating_sub(8);
        let window: Vec<String> = visible[window_start..]
            .iter()
            .map(|v| v.to_string())
            .collect();
        let ellipsis = if window_start > 0 { "... " } else { "" };
        eprintln!(
            "{:>4}  {:<12}  P={:<4} T={:<4} B={:<4}  stack=[{}{}]",
            self.p.saturating_sub(1),
            self.i.to_string(),
            self.p,
            self.t,
            self.b,
            ellipsis,
            window.join(" ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl0c_code::{Instruction, Opcode, Operation};
    use std::io::Cursor;

    fn ins(op: Opcode, level: u32, addr: i64) -> Instruction {
        Instruction::new(op, level, addr)
    }

    fn opr(operation: Operation) -> Instruction {
        ins(Opcode::Opr, 0, operation.code())
    }

    fn run(code: &[Instruction], input: &str) -> Result<String, RuntimeError> {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = Machine::new(code, &mut reader, &mut output).run();
        result.map(|_| String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_lit_write_ret() {
        let code = [
            ins(Opcode::Lit, 0, 42),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "42\n");
    }

    #[test]
    fn test_binary_operand_order() {
        let code = [
            ins(Opcode::Lit, 0, 10),
            ins(Opcode::Lit, 0, 4),
            opr(Operation::Sub),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "6\n");
    }

    #[test]
    fn test_arithmetic_chain() {
        // 2 + 3 * 4 with precedence already encoded in the order.
        let code = [
            ins(Opcode::Lit, 0, 2),
            ins(Opcode::Lit, 0, 3),
            ins(Opcode::Lit, 0, 4),
            opr(Operation::Mul),
            opr(Operation::Add),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "14\n");
    }

    #[test]
    fn test_neg() {
        let code = [
            ins(Opcode::Lit, 0, 9),
            opr(Operation::Neg),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "-9\n");
    }

    #[test]
    fn test_odd() {
        for (value, expect) in [(5, "1\n"), (4, "0\n"), (-3, "1\n")] {
            let code = [
                ins(Opcode::Lit, 0, value),
                opr(Operation::Odd),
                ins(Opcode::Wrt, 0, 0),
                opr(Operation::Ret),
            ];
            assert_eq!(run(&code, "").unwrap(), expect, "odd({})", value);
        }
    }

    #[test]
    fn test_relational_results_are_zero_or_one() {
        let cases = [
            (Operation::Eq, 3, 3, 1),
            (Operation::Eq, 3, 4, 0),
            (Operation::Neq, 3, 4, 1),
            (Operation::Lt, 3, 5, 1),
            (Operation::Lt, 5, 3, 0),
            (Operation::Le, 3, 3, 1),
            (Operation::Gt, 5, 3, 1),
            (Operation::Ge, 3, 3, 1),
            (Operation::Ge, 2, 3, 0),
        ];
        for (operation, lhs, rhs, expect) in cases {
            let code = [
                ins(Opcode::Lit, 0, lhs),
                ins(Opcode::Lit, 0, rhs),
                opr(operation),
                ins(Opcode::Wrt, 0, 0),
                opr(Operation::Ret),
            ];
            assert_eq!(
                run(&code, "").unwrap(),
                format!("{}\n", expect),
                "{:?} {} {}",
                operation,
                lhs,
                rhs
            );
        }
    }

    #[test]
    fn test_jpc_pops_and_branches_on_zero() {
        let code = [
            ins(Opcode::Lit, 0, 0),
            ins(Opcode::Jpc, 0, 4),
            ins(Opcode::Lit, 0, 111),
            ins(Opcode::Wrt, 0, 0),
            ins(Opcode::Lit, 0, 222),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "222\n");
    }

    #[test]
    fn test_jpc_falls_through_on_nonzero() {
        let code = [
            ins(Opcode::Lit, 0, 1),
            ins(Opcode::Jpc, 0, 4),
            ins(Opcode::Lit, 0, 111),
            ins(Opcode::Wrt, 0, 0),
            ins(Opcode::Lit, 0, 222),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "111\n222\n");
    }

    #[test]
    fn test_store_and_load() {
        let code = [
            ins(Opcode::Int, 0, 4),
            ins(Opcode::Lit, 0, 7),
            ins(Opcode::Sto, 0, 3),
            ins(Opcode::Lod, 0, 3),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "7\n");
    }

    #[test]
    fn test_call_and_return() {
        let code = [
            ins(Opcode::Jmp, 0, 5),
            ins(Opcode::Int, 0, 3),
            ins(Opcode::Lit, 0, 7),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
            ins(Opcode::Int, 0, 3),
            ins(Opcode::Cal, 0, 1),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "7\n");
    }

    #[test]
    fn test_static_link_reaches_enclosing_frame() {
        // Main stores 99 into its local, then calls a procedure that
        // loads it through one static link.
        let code = [
            ins(Opcode::Jmp, 0, 5),
            ins(Opcode::Int, 0, 3),
            ins(Opcode::Lod, 1, 3),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
            ins(Opcode::Int, 0, 4),
            ins(Opcode::Lit, 0, 99),
            ins(Opcode::Sto, 0, 3),
            ins(Opcode::Cal, 0, 1),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "").unwrap(), "99\n");
    }

    #[test]
    fn test_read_prompts_and_stores() {
        let code = [
            ins(Opcode::Int, 0, 4),
            ins(Opcode::Red, 0, 3),
            ins(Opcode::Lod, 0, 3),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        let out = run(&code, "5\n").unwrap();
        assert_eq!(out, "? 5\n");
    }

    #[test]
    fn test_read_negative_integer() {
        let code = [
            ins(Opcode::Int, 0, 4),
            ins(Opcode::Red, 0, 3),
            ins(Opcode::Lod, 0, 3),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        assert_eq!(run(&code, "-12\n").unwrap(), "? -12\n");
    }

    #[test]
    fn test_read_malformed_input_halts() {
        let code = [ins(Opcode::Int, 0, 4), ins(Opcode::Red, 0, 3)];
        assert!(matches!(
            run(&code, "five\n"),
            Err(RuntimeError::InvalidInput)
        ));
    }

    #[test]
    fn test_read_at_eof_halts() {
        let code = [ins(Opcode::Int, 0, 4), ins(Opcode::Red, 0, 3)];
        assert!(matches!(run(&code, ""), Err(RuntimeError::InvalidInput)));
    }

    #[test]
    fn test_division_by_zero() {
        let code = [
            ins(Opcode::Lit, 0, 1),
            ins(Opcode::Lit, 0, 0),
            opr(Operation::Div),
        ];
        let err = run(&code, "").unwrap_err();
        assert_eq!(err.to_string(), "Division by zero");
    }

    #[test]
    fn test_stack_overflow_from_int() {
        let code = [ins(Opcode::Int, 0, STACK_CAPACITY as i64 + 1)];
        let err = run(&code, "").unwrap_err();
        assert_eq!(err.to_string(), "Stack overflow");
    }

    #[test]
    fn test_stack_overflow_from_runaway_recursion() {
        let code = [
            ins(Opcode::Cal, 0, 1),
            ins(Opcode::Int, 0, 3),
            ins(Opcode::Cal, 0, 1),
        ];
        assert!(matches!(run(&code, ""), Err(RuntimeError::StackOverflow)));
    }

    #[test]
    fn test_reserved_operation_code_halts() {
        let code = [ins(Opcode::Opr, 0, 7)];
        assert!(matches!(
            run(&code, ""),
            Err(RuntimeError::UnknownOperation(7))
        ));
    }

    #[test]
    fn test_execution_is_deterministic() {
        let code = [
            ins(Opcode::Int, 0, 4),
            ins(Opcode::Red, 0, 3),
            ins(Opcode::Lod, 0, 3),
            ins(Opcode::Lit, 0, 2),
            opr(Operation::Mul),
            ins(Opcode::Wrt, 0, 0),
            opr(Operation::Ret),
        ];
        let first = run(&code, "21\n").unwrap();
        let second = run(&code, "21\n").unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "? 42\n");
    }
}
