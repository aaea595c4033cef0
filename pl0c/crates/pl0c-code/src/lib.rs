//! pl0c-code - Stack-Machine Instruction Set
//!
//! The compiler's one intermediate representation: a flat vector of
//! three-field instructions `(opcode, level, address)` for the PL/0
//! stack machine. The parser appends instructions as it recognizes
//! productions and patches forward-jump targets in place; the virtual
//! machine executes the finished vector without further lowering.
//!
//! The `level` field is a lexical level difference (how many static
//! links to walk); `address` is overloaded per opcode: a literal value
//! for `LIT`, a frame offset for `LOD`/`STO`/`RED`, an instruction
//! index for `JMP`/`JPC`/`CAL`, a frame size for `INT`, and a
//! sub-operation code for `OPR`.

use std::fmt;

/// Machine opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Push a literal value.
    Lit,
    /// Arithmetic/relational/return operation; `addr` selects which.
    Opr,
    /// Push a variable's value from `base(level) + addr`.
    Lod,
    /// Pop into the variable at `base(level) + addr`.
    Sto,
    /// Call the procedure at instruction `addr`.
    Cal,
    /// Grow the stack by `addr` slots (frame allocation).
    Int,
    /// Unconditional jump to instruction `addr`.
    Jmp,
    /// Pop; jump to instruction `addr` if the value is zero.
    Jpc,
    /// Read an integer from input into `base(level) + addr`.
    Red,
    /// Pop and print the top of stack.
    Wrt,
}

impl Opcode {
    /// Mnemonic, as printed in listings.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Lit => "LIT",
            Opcode::Opr => "OPR",
            Opcode::Lod => "LOD",
            Opcode::Sto => "STO",
            Opcode::Cal => "CAL",
            Opcode::Int => "INT",
            Opcode::Jmp => "JMP",
            Opcode::Jpc => "JPC",
            Opcode::Red => "RED",
            Opcode::Wrt => "WRT",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// OPR sub-operations, numbered per the classical PL/0 opcode table.
/// Code 7 is reserved and unused; note LE=13 and GE=11 are not
/// adjacent to LT/GT.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Ret = 0,
    Neg = 1,
    Add = 2,
    Sub = 3,
    Mul = 4,
    Div = 5,
    Odd = 6,
    Eq = 8,
    Neq = 9,
    Lt = 10,
    Ge = 11,
    Gt = 12,
    Le = 13,
}

impl Operation {
    /// Numeric code carried in the instruction's address field.
    #[inline]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Decode an address field back into an operation.
    pub fn from_code(code: i64) -> Option<Operation> {
        match code {
            0 => Some(Operation::Ret),
            1 => Some(Operation::Neg),
            2 => Some(Operation::Add),
            3 => Some(Operation::Sub),
            4 => Some(Operation::Mul),
            5 => Some(Operation::Div),
            6 => Some(Operation::Odd),
            8 => Some(Operation::Eq),
            9 => Some(Operation::Neq),
            10 => Some(Operation::Lt),
            11 => Some(Operation::Ge),
            12 => Some(Operation::Gt),
            13 => Some(Operation::Le),
            _ => None,
        }
    }
}

/// One machine instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// Opcode.
    pub op: Opcode,
    /// Lexical level difference (0 for most opcodes).
    pub level: u32,
    /// Opcode-specific payload; see the module docs.
    pub addr: i64,
}

impl Instruction {
    /// Create an instruction.
    pub const fn new(op: Opcode, level: u32, addr: i64) -> Self {
        Self { op, level, addr }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.op, self.level, self.addr)
    }
}

/// The append-only program vector.
///
/// Grown during parsing; jump targets are patched in place once known.
/// The first instruction of a complete program is always an
/// unconditional jump past nested procedure bodies to the main entry.
#[derive(Default)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction, returning its index.
    pub fn emit(&mut self, op: Opcode, level: u32, addr: i64) -> usize {
        self.instructions.push(Instruction::new(op, level, addr));
        self.instructions.len() - 1
    }

    /// Index the next emitted instruction will receive.
    #[inline]
    pub fn next_addr(&self) -> usize {
        self.instructions.len()
    }

    /// Patch the address field of the instruction at `index` (forward
    /// jumps are emitted with a placeholder target of 0).
    pub fn patch(&mut self, index: usize, addr: usize) {
        self.instructions[index].addr = addr as i64;
    }

    /// The finished instruction slice.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True if nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Format the instruction listing, one `index  OP level addr` row
    /// per instruction.
    pub fn listing(&self) -> String {
        let width = self.instructions.len().to_string().len().max(3);
        let mut out = String::new();
        for (index, instruction) in self.instructions.iter().enumerate() {
            out.push_str(&format!(
                "{:>width$}  {}  {}  {}\n",
                index,
                instruction.op,
                instruction.level,
                instruction.addr,
                width = width
            ));
        }
        out
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.listing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_codes_match_classical_table() {
        assert_eq!(Operation::Ret.code(), 0);
        assert_eq!(Operation::Neg.code(), 1);
        assert_eq!(Operation::Add.code(), 2);
        assert_eq!(Operation::Sub.code(), 3);
        assert_eq!(Operation::Mul.code(), 4);
        assert_eq!(Operation::Div.code(), 5);
        assert_eq!(Operation::Odd.code(), 6);
        assert_eq!(Operation::Eq.code(), 8);
        assert_eq!(Operation::Neq.code(), 9);
        assert_eq!(Operation::Lt.code(), 10);
        assert_eq!(Operation::Ge.code(), 11);
        assert_eq!(Operation::Gt.code(), 12);
        assert_eq!(Operation::Le.code(), 13);
    }

    #[test]
    fn test_operation_round_trip() {
        for code in 0..=13 {
            if code == 7 {
                assert_eq!(Operation::from_code(7), None);
                continue;
            }
            let op = Operation::from_code(code).unwrap();
            assert_eq!(op.code(), code);
        }
        assert_eq!(Operation::from_code(14), None);
        assert_eq!(Operation::from_code(-1), None);
    }

    #[test]
    fn test_emit_returns_indices() {
        let mut program = Program::new();
        assert_eq!(program.emit(Opcode::Jmp, 0, 0), 0);
        assert_eq!(program.emit(Opcode::Int, 0, 4), 1);
        assert_eq!(program.next_addr(), 2);
    }

    #[test]
    fn test_patch_rewrites_addr() {
        let mut program = Program::new();
        let jump = program.emit(Opcode::Jmp, 0, 0);
        program.emit(Opcode::Int, 0, 3);
        program.patch(jump, program.next_addr());
        assert_eq!(program.instructions()[jump].addr, 2);
    }

    #[test]
    fn test_negative_literal_addr() {
        let mut program = Program::new();
        program.emit(Opcode::Lit, 0, -7);
        assert_eq!(program.instructions()[0].addr, -7);
    }

    #[test]
    fn test_listing_format() {
        let mut program = Program::new();
        program.emit(Opcode::Jmp, 0, 1);
        program.emit(Opcode::Int, 0, 4);
        let listing = program.listing();
        assert!(listing.contains("  0  JMP  0  1"));
        assert!(listing.contains("  1  INT  0  4"));
    }

    #[test]
    fn test_instruction_display() {
        let instruction = Instruction::new(Opcode::Lod, 1, 3);
        assert_eq!(format!("{}", instruction), "LOD 1 3");
    }
}
