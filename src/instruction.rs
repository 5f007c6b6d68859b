//! Types for representing instructions and their parts, and the bit layout of an instruction word.

use std::fmt;
use std::str::FromStr;

use crate::isa::OpcodeTable;

/// Position of the lowest bit of the opcode field.
pub const OPCODE_SHIFT: u32 = 22;

/// Position of the lowest bit of the `regA` field.
pub const REG_A_SHIFT: u32 = 19;

/// Position of the lowest bit of the `regB` field.
pub const REG_B_SHIFT: u32 = 16;

/// Mask for the three bit opcode and register fields.
pub const FIELD_MASK: i32 = 0b111;

/// Mask for the 16-bit offset field of I-format instructions.
pub const OFFSET_MASK: i32 = 0xFFFF;

/// Smallest value representable in the offset field.
pub const OFFSET_MIN: i64 = i16::MIN as i64;

/// Largest value representable in the offset field.
pub const OFFSET_MAX: i64 = i16::MAX as i64;

/// Reinterprets a 16-bit field as a two's-complement signed value.
///
/// Used by every I-format instruction when decoding the offset field.
pub fn sign_extend(field: u16) -> i32 {
    let field = field as i32;

    if field & (1 << 15) != 0 {
        field - (1 << 16)
    } else {
        field
    }
}

/// Extracts the opcode field of an instruction word.
pub fn opcode_of(word: i32) -> u8 {
    ((word >> OPCODE_SHIFT) & FIELD_MASK) as u8
}

/// Describes which fields of an instruction word carry operands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// Three registers: `regA`, `regB` and `destReg`.
    R,

    /// Two registers and a 16-bit signed offset.
    I,

    /// Two registers.
    J,

    /// No operands.
    O,
}

impl Format {
    /// Number of operands the instruction takes in symbolic assembly.
    pub fn operand_count(&self) -> usize {
        match self {
            Format::R | Format::I => 3,
            Format::J => 2,
            Format::O => 0,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Format::R => write!(f, "R"),
            Format::I => write!(f, "I"),
            Format::J => write!(f, "J"),
            Format::O => write!(f, "O"),
        }
    }
}

/// The execution rules the simulator knows about.
///
/// Which three bit value selects an operation is decided by the [OpcodeTable].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Adds the values of two registers.
    Add,

    /// Stores the bitwise NAND of two registers.
    Nand,

    /// Copies a memory word into a register.
    LoadWord,

    /// Copies a register into a memory word.
    StoreWord,

    /// Branches relative to the next instruction if two registers are equal.
    BranchEqual,

    /// Stores the return address and jumps to the address held by a register.
    JumpAndLink,

    /// Stops the machine.
    Halt,

    /// Does nothing besides incrementing the program counter.
    NoOperation,

    /// Divides the value of a register by another. Not part of the standard table.
    Divide,
}

impl Operation {
    /// The format used to encode the operands of this operation.
    pub fn format(&self) -> Format {
        match self {
            Operation::Add | Operation::Nand | Operation::Divide => Format::R,
            Operation::LoadWord | Operation::StoreWord | Operation::BranchEqual => Format::I,
            Operation::JumpAndLink => Format::J,
            Operation::Halt | Operation::NoOperation => Format::O,
        }
    }

    /// The conventional mnemonic of the operation.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Nand => "nand",
            Operation::LoadWord => "lw",
            Operation::StoreWord => "sw",
            Operation::BranchEqual => "beq",
            Operation::JumpAndLink => "jalr",
            Operation::Halt => "halt",
            Operation::NoOperation => "noop",
            Operation::Divide => "div",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
}

impl Register {
    /// Decodes a register from the lowest three bits of `bits`.
    pub fn from_bits(bits: i32) -> Register {
        match bits & FIELD_MASK {
            0 => Register::R0,
            1 => Register::R1,
            2 => Register::R2,
            3 => Register::R3,
            4 => Register::R4,
            5 => Register::R5,
            6 => Register::R6,
            _ => Register::R7,
        }
    }

    /// Returns the register numbered `index`, if there is one.
    pub fn from_index(index: i64) -> Option<Register> {
        if (0..8).contains(&index) {
            Some(Register::from_bits(index as i32))
        } else {
            None
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Register::R0 => 0,
            Register::R1 => 1,
            Register::R2 => 2,
            Register::R3 => 3,
            Register::R4 => 4,
            Register::R5 => 5,
            Register::R6 => 6,
            Register::R7 => 7,
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(input: &str) -> Result<Register, ()> {
        input.parse::<i64>()
            .ok()
            .and_then(Register::from_index)
            .ok_or(())
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

impl Default for Register {
    fn default() -> Register {
        Register::R0
    }
}

/// A decoded instruction.
///
/// Fields that the instruction's [Format] does not use are zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub operation: Operation,
    pub reg_a: Register,
    pub reg_b: Register,
    pub dest: Register,
    pub offset: i16,
}

impl Instruction {
    /// An instruction with all operand fields zeroed.
    pub fn new(operation: Operation) -> Instruction {
        Instruction {
            operation,
            reg_a: Register::R0,
            reg_b: Register::R0,
            dest: Register::R0,
            offset: 0,
        }
    }

    pub fn r(operation: Operation, reg_a: Register, reg_b: Register, dest: Register) -> Instruction {
        Instruction { reg_a, reg_b, dest, ..Instruction::new(operation) }
    }

    pub fn i(operation: Operation, reg_a: Register, reg_b: Register, offset: i16) -> Instruction {
        Instruction { reg_a, reg_b, offset, ..Instruction::new(operation) }
    }

    pub fn j(operation: Operation, reg_a: Register, reg_b: Register) -> Instruction {
        Instruction { reg_a, reg_b, ..Instruction::new(operation) }
    }

    pub fn format(&self) -> Format {
        self.operation.format()
    }

    /// Encodes the instruction into a word, using `table` for the opcode value.
    ///
    /// # Returns
    /// `None` if `table` has no opcode for the instruction's operation.
    pub fn encode(&self, table: &OpcodeTable) -> Option<i32> {
        let opcode = table.value_of(self.operation)? as i32;
        let mut word = opcode << OPCODE_SHIFT;

        let reg_a = (self.reg_a.index() as i32) << REG_A_SHIFT;
        let reg_b = (self.reg_b.index() as i32) << REG_B_SHIFT;

        match self.format() {
            Format::R => word |= reg_a | reg_b | self.dest.index() as i32,
            Format::I => word |= reg_a | reg_b | (self.offset as i32 & OFFSET_MASK),
            Format::J => word |= reg_a | reg_b,
            Format::O => (),
        }

        Some(word)
    }

    /// Decodes an instruction word according to the format its opcode declares in `table`.
    ///
    /// # Returns
    /// The opcode value as an error if `table` defines no operation for it.
    pub fn decode(word: i32, table: &OpcodeTable) -> Result<Instruction, u8> {
        let opcode = opcode_of(word);
        let operation = table.operation(opcode).ok_or(opcode)?;

        let reg_a = Register::from_bits(word >> REG_A_SHIFT);
        let reg_b = Register::from_bits(word >> REG_B_SHIFT);

        let instruction = match operation.format() {
            Format::R => Instruction::r(operation, reg_a, reg_b, Register::from_bits(word)),
            Format::I => Instruction::i(
                operation,
                reg_a,
                reg_b,
                sign_extend((word & OFFSET_MASK) as u16) as i16,
            ),
            Format::J => Instruction::j(operation, reg_a, reg_b),
            Format::O => Instruction::new(operation),
        };

        Ok(instruction)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.format() {
            Format::R => write!(f, "{} {} {} {}", self.operation, self.reg_a, self.reg_b, self.dest),
            Format::I => write!(f, "{} {} {} {}", self.operation, self.reg_a, self.reg_b, self.offset),
            Format::J => write!(f, "{} {} {}", self.operation, self.reg_a, self.reg_b),
            Format::O => write!(f, "{}", self.operation),
        }
    }
}

#[test]
fn test_sign_extend() {
    assert_eq!(sign_extend(0), 0);
    assert_eq!(sign_extend(1), 1);
    assert_eq!(sign_extend(0x7FFF), 32767);
    assert_eq!(sign_extend(0x8000), -32768);
    assert_eq!(sign_extend(0xFFFF), -1);
}

#[test]
fn test_offset_round_trip() {
    let table = OpcodeTable::standard();

    for &offset in &[-32768i32, -32767, -1000, -1, 0, 1, 2, 1000, 32766, 32767] {
        let ins = Instruction::i(Operation::BranchEqual, Register::R1, Register::R2, offset as i16);
        let word = ins.encode(&table).unwrap();

        assert_eq!(sign_extend((word & OFFSET_MASK) as u16), offset);
        assert_eq!(Instruction::decode(word, &table), Ok(ins));
    }
}

#[test]
fn test_known_encodings() {
    let table = OpcodeTable::standard();

    let add = Instruction::r(Operation::Add, Register::R1, Register::R2, Register::R3);
    assert_eq!(add.encode(&table), Some((1 << 19) | (2 << 16) | 3));

    let lw = Instruction::i(Operation::LoadWord, Register::R0, Register::R1, 7);
    assert_eq!(lw.encode(&table), Some(8454151));

    let beq = Instruction::i(Operation::BranchEqual, Register::R0, Register::R1, -3);
    assert_eq!(beq.encode(&table), Some(16908285));

    let halt = Instruction::new(Operation::Halt);
    assert_eq!(halt.encode(&table), Some(25165824));

    let jalr = Instruction::j(Operation::JumpAndLink, Register::R4, Register::R7);
    assert_eq!(jalr.encode(&table), Some((5 << 22) | (4 << 19) | (7 << 16)));
}

#[test]
fn test_display_disassembles() {
    let table = OpcodeTable::standard();

    let cases = [
        ("add 1 2 3", (1 << 19) | (2 << 16) | 3),
        ("lw 0 1 7", 8454151),
        ("beq 0 1 -3", 16908285),
        ("jalr 4 7", (5 << 22) | (4 << 19) | (7 << 16)),
        ("halt", 25165824),
        ("noop", 7 << 22),
    ];

    for (text, word) in cases.iter() {
        let ins = Instruction::decode(*word, &table).unwrap();
        assert_eq!(ins.to_string(), *text);
    }
}

#[test]
fn test_register_from_str() {
    assert_eq!("0".parse::<Register>(), Ok(Register::R0));
    assert_eq!("7".parse::<Register>(), Ok(Register::R7));
    assert_eq!("8".parse::<Register>(), Err(()));
    assert_eq!("-1".parse::<Register>(), Err(()));
    assert_eq!("r1".parse::<Register>(), Err(()));
}
