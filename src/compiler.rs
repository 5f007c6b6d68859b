//! Two-pass assembly from symbolic source to machine code.
//!
//! The first pass assigns an address to every label, the second pass encodes every line. Both
//! passes walk the same lines in the same order and split labels off with the same rule
//! ([split_label]), so that the address a label receives in the first pass is the address of
//! the word it precedes in the output.

use std::convert::TryFrom;
use std::fmt;
use std::iter::once;

use slog::{o, debug, trace, Discard, Logger};

use crate::bytecode::Program;
use crate::emulator::MEMORY_SIZE;
use crate::instruction::{Format, Instruction, Operation, Register, OFFSET_MAX, OFFSET_MIN};
use crate::isa::{IsaConfig, OpcodeEntry, Strictness};
use crate::source_map::SourceMap;
use crate::symbol_table::{suggest, SymbolTable};
use crate::symbolic::{self, parser::split_label, Token, Word};

/// Name of the data directive.
pub const FILL_DIRECTIVE: &str = ".fill";

/// The reason an assembly failed.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyErrorKind {
    /// A label was declared a second time.
    DuplicateLabel {
        label: String,
        /// Line of the first declaration.
        previous_line: usize,
    },

    /// An operand refers to a label that is never declared.
    UndefinedLabel {
        label: String,
        suggestion: Option<String>,
    },

    /// The first word of a statement is neither a mnemonic nor a directive.
    InvalidOpcode {
        mnemonic: String,
        suggestion: Option<String>,
    },

    /// The resolved offset of an I-format instruction does not fit into 16 bits.
    OffsetOutOfRange {
        value: i64,
    },

    /// A `.fill` value does not fit into a 32-bit word.
    FillOutOfRange {
        value: i64,
    },

    /// `.fill` was given the wrong number of operands.
    MalformedDirective {
        got: usize,
    },

    /// An instruction was given the wrong number of operands.
    OperandCount {
        mnemonic: String,
        expected: usize,
        got: usize,
    },

    /// A register operand is not an integer from 0 to 7.
    InvalidRegister {
        operand: String,
    },

    /// An operand is neither a literal nor a label reference.
    InvalidOperand {
        operand: String,
    },

    /// The program has more words than fit into the memory.
    ProgramTooLarge,
}

fn did_you_mean(f: &mut fmt::Formatter, suggestion: &Option<String>) -> fmt::Result {
    match suggestion {
        Some(suggestion) => write!(f, "; did you mean '{}'?", suggestion),
        None => Ok(()),
    }
}

impl fmt::Display for AssemblyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AssemblyErrorKind::DuplicateLabel { label, previous_line } =>
                write!(f, "duplicate label '{}', first declared on line {}", label, previous_line),
            AssemblyErrorKind::UndefinedLabel { label, suggestion } => {
                write!(f, "undefined label '{}'", label)?;
                did_you_mean(f, suggestion)
            },
            AssemblyErrorKind::InvalidOpcode { mnemonic, suggestion } => {
                write!(f, "invalid opcode '{}'", mnemonic)?;
                did_you_mean(f, suggestion)
            },
            AssemblyErrorKind::OffsetOutOfRange { value } =>
                write!(f, "offset {} out of range ({} to {})", value, OFFSET_MIN, OFFSET_MAX),
            AssemblyErrorKind::FillOutOfRange { value } =>
                write!(f, "value {} does not fit into a 32-bit word", value),
            AssemblyErrorKind::MalformedDirective { got } =>
                write!(f, "'{}' expects exactly one value, got {}", FILL_DIRECTIVE, got),
            AssemblyErrorKind::OperandCount { mnemonic, expected, got } =>
                write!(f, "'{}' expects {} operands, got {}", mnemonic, expected, got),
            AssemblyErrorKind::InvalidRegister { operand } =>
                write!(f, "invalid register '{}', expected 0 to 7", operand),
            AssemblyErrorKind::InvalidOperand { operand } =>
                write!(f, "invalid operand '{}'", operand),
            AssemblyErrorKind::ProgramTooLarge =>
                write!(f, "program does not fit into {} words of memory", MEMORY_SIZE),
        }
    }
}

/// An assembly error together with the location that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyError {
    /// One-based source line.
    pub line: usize,

    /// Address of the word the line would have produced.
    pub address: usize,

    pub kind: AssemblyErrorKind,
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {} (address {}): {}", self.line, self.address, self.kind)
    }
}

impl std::error::Error for AssemblyError {}

/// Assembles a symbolic program into a machine code image.
///
/// The image carries the symbol table and a source map in addition to the words. Nothing is
/// returned if any line fails.
pub fn compile(program: &symbolic::Program, config: &IsaConfig) -> Result<Program, AssemblyError> {
    compile_with_logger(program, config, None)
}

pub fn compile_with_logger<L>(
    program: &symbolic::Program,
    config: &IsaConfig,
    logger: L,
) -> Result<Program, AssemblyError>
where
    L: Into<Option<Logger>>,
{
    let logger = logger
        .into()
        .unwrap_or_else(|| Logger::root(Discard, o!()))
        .new(o!("stage" => "assembly"));

    let symbol_table = resolve_symbols(program, config, &logger.new(o!("pass" => 1)))?;

    debug!(logger, "resolved symbols"; "count" => symbol_table.len());

    let (words, source_map) = encode_lines(program, &symbol_table, config, &logger.new(o!("pass" => 2)))?;

    debug!(logger, "assembled program"; "words" => words.len());

    Ok(Program {
        words,
        symbol_table,
        source_map,
    })
}

/// The first pass. Builds the symbol table.
fn resolve_symbols(
    program: &symbolic::Program,
    config: &IsaConfig,
    logger: &Logger,
) -> Result<SymbolTable, AssemblyError> {
    let mut symbol_table = SymbolTable::new();
    let mut address = 0;

    for line in &program.lines {
        let parts = split_label(line, &config.opcodes);

        if let Some(label) = parts.label {
            symbol_table.define_symbol(label, address, line.number)
                .map_err(|previous| AssemblyError {
                    line: line.number,
                    address,
                    kind: AssemblyErrorKind::DuplicateLabel {
                        label: label.to_string(),
                        previous_line: previous.line,
                    },
                })?;

            trace!(logger, "add a label to the symbol table"; "label" => label, "address" => address);
        }

        if parts.emits_word() {
            if address >= MEMORY_SIZE {
                return Err(AssemblyError {
                    line: line.number,
                    address,
                    kind: AssemblyErrorKind::ProgramTooLarge,
                });
            }

            address += 1;
        }
    }

    Ok(symbol_table)
}

/// The second pass. Encodes every line that produces a word.
fn encode_lines(
    program: &symbolic::Program,
    symbol_table: &SymbolTable,
    config: &IsaConfig,
    logger: &Logger,
) -> Result<(Vec<i32>, SourceMap<usize>), AssemblyError> {
    let mut words = Vec::new();
    let mut source_map = SourceMap::new();
    let mut address = 0;

    for line in &program.lines {
        let parts = split_label(line, &config.opcodes);

        let head = match parts.head() {
            Some(head) => head,
            None => continue,
        };

        let encoder = LineEncoder {
            line: line.number,
            address,
            symbol_table,
            config,
        };

        let word = encoder.encode(head, parts.operands())?;

        trace!(logger, "append word"; "address" => address, "word" => word, "source" => %line);

        words.push(word);
        source_map.insert(address, line.number);
        address += 1;
    }

    Ok((words, source_map))
}

/// Encodes the statement of a single line.
struct LineEncoder<'c> {
    line: usize,
    address: usize,
    symbol_table: &'c SymbolTable,
    config: &'c IsaConfig,
}

impl<'c> LineEncoder<'c> {
    fn error(&self, kind: AssemblyErrorKind) -> AssemblyError {
        AssemblyError {
            line: self.line,
            address: self.address,
            kind,
        }
    }

    fn encode(&self, head: &Word, operands: &[Word]) -> Result<i32, AssemblyError> {
        let table = &self.config.opcodes;

        match head.token {
            Token::Fill => self.fill(operands),
            Token::Symbol(mnemonic) => match table.lookup(mnemonic) {
                Some(entry) => self.instruction(entry, operands),
                None => Err(self.invalid_opcode(head)),
            },
            _ => Err(self.invalid_opcode(head)),
        }
    }

    fn invalid_opcode(&self, head: &Word) -> AssemblyError {
        let candidates = self.config.opcodes.mnemonics().chain(once(FILL_DIRECTIVE));

        self.error(AssemblyErrorKind::InvalidOpcode {
            mnemonic: head.text.to_string(),
            suggestion: suggest(head.text, candidates).map(String::from),
        })
    }

    /// Checks that enough operands were given and drops the trailing ones the configuration
    /// allows.
    fn expect_operands<'o, 'a>(
        &self,
        operands: &'o [Word<'a>],
        expected: usize,
        on_error: impl FnOnce(usize) -> AssemblyErrorKind,
    ) -> Result<&'o [Word<'a>], AssemblyError> {
        let got = operands.len();

        let acceptable = match self.config.strictness {
            Strictness::Strict => got == expected,
            Strictness::Lenient => got >= expected,
        };

        if !acceptable {
            return Err(self.error(on_error(got)));
        }

        Ok(&operands[..expected])
    }

    fn fill(&self, operands: &[Word]) -> Result<i32, AssemblyError> {
        let operands = self.expect_operands(operands, 1, |got| {
            AssemblyErrorKind::MalformedDirective { got }
        })?;

        let value = self.value(&operands[0])?;

        i32::try_from(value)
            .map_err(|_| self.error(AssemblyErrorKind::FillOutOfRange { value }))
    }

    fn instruction(&self, entry: &OpcodeEntry, operands: &[Word]) -> Result<i32, AssemblyError> {
        let format = entry.format();

        let operands = self.expect_operands(operands, format.operand_count(), |got| {
            AssemblyErrorKind::OperandCount {
                mnemonic: entry.mnemonic.clone(),
                expected: format.operand_count(),
                got,
            }
        })?;

        let operation = entry.operation;

        let instruction = match format {
            Format::R => Instruction::r(
                operation,
                self.register(&operands[0])?,
                self.register(&operands[1])?,
                self.register(&operands[2])?,
            ),
            Format::I => Instruction::i(
                operation,
                self.register(&operands[0])?,
                self.register(&operands[1])?,
                self.offset(&operands[2], operation == Operation::BranchEqual)?,
            ),
            Format::J => Instruction::j(
                operation,
                self.register(&operands[0])?,
                self.register(&operands[1])?,
            ),
            Format::O => Instruction::new(operation),
        };

        instruction.encode(&self.config.opcodes)
            .ok_or_else(|| self.error(AssemblyErrorKind::InvalidOpcode {
                mnemonic: entry.mnemonic.clone(),
                suggestion: None,
            }))
    }

    fn register(&self, word: &Word) -> Result<Register, AssemblyError> {
        let register = match word.token {
            Token::Literal(index) => Register::from_index(index),
            _ => None,
        };

        register.ok_or_else(|| self.error(AssemblyErrorKind::InvalidRegister {
            operand: word.text.to_string(),
        }))
    }

    /// Resolves the offset field of an I-format instruction. Labels resolve to their absolute
    /// address, or relative to the next instruction if `relative` is set. Literals are used as
    /// written.
    fn offset(&self, word: &Word, relative: bool) -> Result<i16, AssemblyError> {
        let value = match word.reference() {
            Some(_) if relative => self.value(word)? - (self.address as i64 + 1),
            _ => self.value(word)?,
        };

        if value < OFFSET_MIN || value > OFFSET_MAX {
            return Err(self.error(AssemblyErrorKind::OffsetOutOfRange { value }));
        }

        Ok(value as i16)
    }

    /// Resolves a literal or a label reference.
    fn value(&self, word: &Word) -> Result<i64, AssemblyError> {
        if let Token::Literal(value) = word.token {
            return Ok(value);
        }

        let label = word.reference()
            .ok_or_else(|| self.error(AssemblyErrorKind::InvalidOperand {
                operand: word.text.to_string(),
            }))?;

        self.symbol_table.address(label)
            .map(|address| address as i64)
            .ok_or_else(|| self.error(AssemblyErrorKind::UndefinedLabel {
                label: label.to_string(),
                suggestion: self.symbol_table.suggest(label).map(String::from),
            }))
    }
}

#[cfg(test)]
fn assemble(source: &str) -> Result<Program, AssemblyError> {
    compile(&symbolic::Program::parse(source), &IsaConfig::default())
}

#[cfg(test)]
fn error_kind(source: &str) -> AssemblyErrorKind {
    assemble(source).expect_err("assembly should have failed").kind
}

#[test]
fn test_compile() {
    let source = r#"
        lw      0       1       five    # load reg1 with 5 (uses symbolic address)
        lw      1       2       3       # load reg2 with -1 (uses numeric address)
start   add     1       2       1       # decrement reg1
        beq     0       1       2       # goto end of program when reg1==0
        beq     0       0       start   # go back to the beginning of the loop
        noop
done    halt                            # end of program
five    .fill   5
neg1    .fill   -1
stAddr  .fill   start                   # will contain the address of start (2)
    "#;

    let program = assemble(source).unwrap();

    assert_eq!(program.words, vec![
        8454151,
        9043971,
        655361,
        16842754,
        16842749,
        29360128,
        25165824,
        5,
        -1,
        2,
    ]);

    assert_eq!(program.symbol_table.address("start"), Some(2));
    assert_eq!(program.symbol_table.address("done"), Some(6));
    assert_eq!(program.symbol_table.address("five"), Some(7));
    assert_eq!(program.symbol_table.address("neg1"), Some(8));
    assert_eq!(program.symbol_table.address("stAddr"), Some(9));
}

#[test]
fn test_branch_offset_relative_to_next_instruction() {
    let program = assemble(r#"
        add 0 0 1
        beq 1 0 target
        .fill 5
target: halt
    "#).unwrap();

    assert_eq!(program.len(), 4);
    assert_eq!(program.symbol_table.address("target"), Some(3));
    assert_eq!(program.words[1] & 0xFFFF, 1);
}

#[test]
fn test_backward_branch() {
    let program = assemble("loop noop\n beq 0 0 loop\n").unwrap();
    assert_eq!(crate::instruction::sign_extend((program.words[1] & 0xFFFF) as u16), -2);
}

#[test]
fn test_load_store_use_absolute_addresses() {
    let program = assemble("lw 0 1 data\nsw 0 1 data\nhalt\ndata .fill 9\n").unwrap();

    assert_eq!(program.words[0] & 0xFFFF, 3);
    assert_eq!(program.words[1] & 0xFFFF, 3);
}

#[test]
fn test_symbols_match_emitted_addresses() {
    let source = r#"
first   noop
        # comment between
lone
second  add 1 2 3
third   .fill first
        halt
last
    "#;

    let program = assemble(source).unwrap();

    assert_eq!(program.len(), 4);
    assert_eq!(program.symbol_table.address("first"), Some(0));
    assert_eq!(program.symbol_table.address("lone"), Some(1));
    assert_eq!(program.symbol_table.address("second"), Some(1));
    assert_eq!(program.symbol_table.address("third"), Some(2));
    assert_eq!(program.symbol_table.address("last"), Some(4));

    assert_eq!(program.source_map.get_source(0), Some(&2));
    assert_eq!(program.source_map.get_source(1), Some(&5));
    assert_eq!(program.source_map.get_source(3), Some(&7));
}

#[test]
fn test_duplicate_label() {
    let err = assemble("L noop\nadd 0 0 0\nL halt\n").unwrap_err();

    assert_eq!(err.line, 3);
    assert_eq!(err.address, 2);
    assert_eq!(err.kind, AssemblyErrorKind::DuplicateLabel {
        label: "L".to_string(),
        previous_line: 1,
    });
}

#[test]
fn test_undefined_label() {
    let err = assemble("lw 0 1 counter\nhalt\ncountr .fill 1\n").unwrap_err();

    assert_eq!(err.line, 1);
    assert_eq!(err.address, 0);
    assert_eq!(err.kind, AssemblyErrorKind::UndefinedLabel {
        label: "counter".to_string(),
        suggestion: Some("countr".to_string()),
    });

    assert!(matches!(error_kind(".fill nowhere"), AssemblyErrorKind::UndefinedLabel { .. }));
}

#[test]
fn test_invalid_opcode() {
    let err = assemble("halt\nlabel ad 1 2 3\n").unwrap_err();

    assert_eq!(err.line, 2);
    assert_eq!(err.address, 1);
    assert_eq!(err.kind, AssemblyErrorKind::InvalidOpcode {
        mnemonic: "ad".to_string(),
        suggestion: Some("add".to_string()),
    });

    assert!(matches!(error_kind("5 1 2 3"), AssemblyErrorKind::InvalidOpcode { .. }));
    assert!(matches!(error_kind("div 1 2 3"), AssemblyErrorKind::InvalidOpcode { .. }));
}

#[test]
fn test_offset_range() {
    assert!(assemble("lw 0 1 32767").is_ok());
    assert!(assemble("lw 0 1 -32768").is_ok());

    assert_eq!(error_kind("lw 0 1 32768"), AssemblyErrorKind::OffsetOutOfRange { value: 32768 });
    assert_eq!(error_kind("beq 0 1 -32769"), AssemblyErrorKind::OffsetOutOfRange { value: -32769 });
}

#[test]
fn test_fill_range() {
    assert_eq!(assemble(".fill -2147483648").unwrap().words, vec![i32::MIN]);
    assert_eq!(assemble(".fill 2147483647").unwrap().words, vec![i32::MAX]);
    assert_eq!(error_kind(".fill 2147483648"), AssemblyErrorKind::FillOutOfRange { value: 2147483648 });
}

#[test]
fn test_malformed_fill() {
    assert_eq!(error_kind("x .fill"), AssemblyErrorKind::MalformedDirective { got: 0 });
    assert_eq!(error_kind(".fill 1 2"), AssemblyErrorKind::MalformedDirective { got: 2 });
}

#[test]
fn test_operands() {
    assert_eq!(error_kind("add 1 2"), AssemblyErrorKind::OperandCount {
        mnemonic: "add".to_string(),
        expected: 3,
        got: 2,
    });
    assert_eq!(error_kind("halt 1"), AssemblyErrorKind::OperandCount {
        mnemonic: "halt".to_string(),
        expected: 0,
        got: 1,
    });
    assert_eq!(error_kind("add 1 2 8"), AssemblyErrorKind::InvalidRegister { operand: "8".to_string() });
    assert_eq!(error_kind("jalr -1 2"), AssemblyErrorKind::InvalidRegister { operand: "-1".to_string() });
    assert_eq!(error_kind("nand r1 2 3"), AssemblyErrorKind::InvalidRegister { operand: "r1".to_string() });
    assert_eq!(error_kind("lw 0 1 x:"), AssemblyErrorKind::InvalidOperand { operand: "x:".to_string() });
}

#[test]
fn test_labels_with_punctuation() {
    let program = assemble(r#"
loop.1  noop
        beq     0 0 loop.1
my-label: lw    0 1 my-label
L$2     .fill   L$2
5       halt
    "#).unwrap();

    assert_eq!(program.symbol_table.address("loop.1"), Some(0));
    assert_eq!(program.symbol_table.address("my-label"), Some(2));
    assert_eq!(program.symbol_table.address("L$2"), Some(3));
    assert_eq!(program.symbol_table.address("5"), Some(4));

    assert_eq!(crate::instruction::sign_extend((program.words[1] & 0xFFFF) as u16), -2);
    assert_eq!(program.words[2] & 0xFFFF, 2);
    assert_eq!(program.words[3], 3);
    assert_eq!(program.words[4], 25165824);

    assert_eq!(error_kind("beq 0 0 loop.2"), AssemblyErrorKind::UndefinedLabel {
        label: "loop.2".to_string(),
        suggestion: None,
    });
}

#[test]
fn test_lenient_ignores_trailing_words() {
    let source = r#"
        lw      0       1       five    load reg1 with 5
done    halt                            end of program
five    .fill   5 extra words
    "#;

    assert!(assemble(source).is_err());

    let config = IsaConfig::default().with_strictness(Strictness::Lenient);
    let program = compile(&symbolic::Program::parse(source), &config).unwrap();

    assert_eq!(program.words, vec![8454146, 25165824, 5]);
}

#[test]
fn test_division_extension() {
    let config = IsaConfig::default().with_opcodes(crate::isa::OpcodeTable::with_division());
    let program = compile(&symbolic::Program::parse("div 1 2 3"), &config).unwrap();

    assert_eq!(program.words, vec![(7 << 22) | (1 << 19) | (2 << 16) | 3]);
}

#[test]
fn test_decoding_recovers_source() {
    let source = "add 1 2 3\nnand 4 5 6\nlw 7 0 -5\nsw 1 1 12\nbeq 2 3 100\njalr 6 7\nhalt\nnoop";
    let config = IsaConfig::default();
    let program = compile(&symbolic::Program::parse(source), &config).unwrap();

    let disassembled: Vec<_> = program.words.iter()
        .map(|word| Instruction::decode(*word, &config.opcodes).unwrap().to_string())
        .collect();

    assert_eq!(disassembled, source.lines().collect::<Vec<_>>());
}
