//! The opcode table and the configurable parts of the instruction architecture.
//!
//! Both the [compiler](crate::compiler) and the [emulator](crate::emulator) read opcodes from the
//! same [OpcodeTable], so adding an instruction means adding a single entry here.

use std::fmt;

use itertools::Itertools;
use lazy_static::lazy_static;

use crate::instruction::{Format, Operation, FIELD_MASK};

/// Default upper bound for the number of instructions a single run may execute.
pub const DEFAULT_INSTRUCTION_LIMIT: u64 = 1_000_000;

/// A single row of the [OpcodeTable].
#[derive(Clone, Debug, PartialEq)]
pub struct OpcodeEntry {
    pub mnemonic: String,
    pub value: u8,
    pub operation: Operation,
}

impl OpcodeEntry {
    pub fn format(&self) -> Format {
        self.operation.format()
    }
}

/// Mapping between mnemonics, three bit opcode values and [operations](Operation).
#[derive(Clone, Debug, PartialEq)]
pub struct OpcodeTable {
    entries: Vec<OpcodeEntry>,
}

lazy_static! {
    static ref STANDARD_TABLE: OpcodeTable = {
        let mut table = OpcodeTable::empty();

        for (value, operation) in [
            Operation::Add,
            Operation::Nand,
            Operation::LoadWord,
            Operation::StoreWord,
            Operation::BranchEqual,
            Operation::JumpAndLink,
            Operation::Halt,
            Operation::NoOperation,
        ].iter().enumerate() {
            table.insert(operation.mnemonic(), value as u8, *operation);
        }

        table
    };
}

impl OpcodeTable {
    /// A table with no instructions at all.
    pub fn empty() -> OpcodeTable {
        OpcodeTable {
            entries: Vec::new(),
        }
    }

    /// The eight instructions of the standard architecture.
    pub fn standard() -> OpcodeTable {
        STANDARD_TABLE.clone()
    }

    /// The standard table with `div` occupying opcode 7 in place of `noop`.
    pub fn with_division() -> OpcodeTable {
        let mut table = OpcodeTable::standard();
        table.insert("div", 7, Operation::Divide);
        table
    }

    /// Adds an instruction to the table.
    ///
    /// Any entry that used the same mnemonic or the same opcode value is replaced.
    /// Only the lowest three bits of `value` are significant.
    pub fn insert<S: Into<String>>(&mut self, mnemonic: S, value: u8, operation: Operation) {
        let mnemonic = mnemonic.into();
        let value = value & FIELD_MASK as u8;

        self.entries.retain(|entry| entry.mnemonic != mnemonic && entry.value != value);
        self.entries.push(OpcodeEntry { mnemonic, value, operation });
        self.entries.sort_by_key(|entry| entry.value);
    }

    /// Removes the instruction with the mnemonic `mnemonic`.
    pub fn remove(&mut self, mnemonic: &str) -> Option<OpcodeEntry> {
        let index = self.entries.iter().position(|entry| entry.mnemonic == mnemonic)?;
        Some(self.entries.remove(index))
    }

    /// Looks up an instruction by its mnemonic.
    pub fn lookup(&self, mnemonic: &str) -> Option<&OpcodeEntry> {
        self.entries.iter().find(|entry| entry.mnemonic == mnemonic)
    }

    pub fn is_mnemonic(&self, word: &str) -> bool {
        self.lookup(word).is_some()
    }

    /// Returns the operation selected by an opcode value.
    pub fn operation(&self, value: u8) -> Option<Operation> {
        self.entries.iter()
            .find(|entry| entry.value == value)
            .map(|entry| entry.operation)
    }

    /// Returns the opcode value assigned to an operation.
    pub fn value_of(&self, operation: Operation) -> Option<u8> {
        self.entries.iter()
            .find(|entry| entry.operation == operation)
            .map(|entry| entry.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpcodeEntry> {
        self.entries.iter()
    }

    pub fn mnemonics(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.mnemonic.as_str())
    }
}

impl Default for OpcodeTable {
    fn default() -> OpcodeTable {
        OpcodeTable::standard()
    }
}

impl fmt::Display for OpcodeTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rows = self.entries.iter()
            .map(|entry| format!("{:03b} {:<5} {}", entry.value, entry.mnemonic, entry.format()))
            .join("\n");

        write!(f, "{}", rows)
    }
}

/// How the assembler treats tokens beyond the operands an instruction or directive declares.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strictness {
    /// Operand counts must match exactly.
    Strict,

    /// Extra trailing tokens are ignored.
    Lenient,
}

impl Default for Strictness {
    fn default() -> Strictness {
        Strictness::Strict
    }
}

/// Everything that may differ between two variants of the architecture.
#[derive(Clone, Debug)]
pub struct IsaConfig {
    pub opcodes: OpcodeTable,
    pub strictness: Strictness,

    /// The emulator stops with an error after executing this many instructions.
    /// `None` disables the limit.
    pub instruction_limit: Option<u64>,
}

impl Default for IsaConfig {
    fn default() -> IsaConfig {
        IsaConfig {
            opcodes: OpcodeTable::standard(),
            strictness: Strictness::default(),
            instruction_limit: Some(DEFAULT_INSTRUCTION_LIMIT),
        }
    }
}

impl IsaConfig {
    pub fn with_opcodes(mut self, opcodes: OpcodeTable) -> IsaConfig {
        self.opcodes = opcodes;
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> IsaConfig {
        self.strictness = strictness;
        self
    }

    pub fn with_instruction_limit<L: Into<Option<u64>>>(mut self, limit: L) -> IsaConfig {
        self.instruction_limit = limit.into();
        self
    }
}

#[test]
fn test_standard_table() {
    let table = OpcodeTable::standard();

    let expected = [
        ("add", 0, Format::R),
        ("nand", 1, Format::R),
        ("lw", 2, Format::I),
        ("sw", 3, Format::I),
        ("beq", 4, Format::I),
        ("jalr", 5, Format::J),
        ("halt", 6, Format::O),
        ("noop", 7, Format::O),
    ];

    for &(mnemonic, value, format) in expected.iter() {
        let entry = table.lookup(mnemonic).expect("missing mnemonic");
        assert_eq!(entry.value, value);
        assert_eq!(entry.format(), format);
        assert_eq!(table.operation(value), Some(entry.operation));
        assert_eq!(table.value_of(entry.operation), Some(value));
    }

    assert!(table.lookup("div").is_none());
    assert!(table.lookup(".fill").is_none());
}

#[test]
fn test_division_replaces_noop() {
    let table = OpcodeTable::with_division();

    assert_eq!(table.operation(7), Some(Operation::Divide));
    assert_eq!(table.lookup("div").map(OpcodeEntry::format), Some(Format::R));
    assert!(table.lookup("noop").is_none());
    assert_eq!(table.value_of(Operation::NoOperation), None);
    assert_eq!(table.iter().count(), 8);
}

#[test]
fn test_remove_leaves_a_hole() {
    let mut table = OpcodeTable::standard();
    let removed = table.remove("nand").unwrap();

    assert_eq!(removed.value, 1);
    assert_eq!(table.operation(1), None);
    assert!(!table.is_mnemonic("nand"));
}
