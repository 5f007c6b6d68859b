//! [Emulator] for executing [machine code images](crate::bytecode::Program).

use std::fmt;

use slog::{o, trace, warn, Discard, Logger};

use crate::bytecode::Program;
use crate::event::{Event, EventDispatcher, EventListener};
use crate::instruction::{Instruction, Operation, Register};
use crate::isa::{IsaConfig, OpcodeTable};

/// Number of words in the address space of the machine.
pub const MEMORY_SIZE: usize = 65536;

/// Number of general purpose registers.
pub const NUM_REGISTERS: usize = 8;

/// Contains the execution environment of the processor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    /// Address of the next instruction to be executed.
    pub pc: i32,

    /// Values of the eight general purpose registers.
    pub r: [i32; NUM_REGISTERS],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryErrorKind {
    /// The address lies outside of the memory.
    InvalidAddress,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryError {
    pub address: i32,
    pub kind: MemoryErrorKind,
}

impl MemoryError {
    fn invalid_address(address: i32) -> MemoryError {
        MemoryError {
            address,
            kind: MemoryErrorKind::InvalidAddress,
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            MemoryErrorKind::InvalidAddress => write!(f, "invalid memory address {}", self.address),
        }
    }
}

/// Trait for implementing the memory of the machine.
pub trait Memory {
    /// Fetch the data word from the specified address.
    ///
    /// # Returns
    /// The data word from `address` or a memory error.
    fn get_data(&self, address: i32) -> Result<i32, MemoryError>;

    /// Overwrite the data word in the specified address.
    ///
    /// # Returns
    /// A memory error if the operation cannot be performed.
    fn set_data(&mut self, address: i32, data: i32) -> Result<(), MemoryError>;
}

/// A memory the size of the whole address space, filled with zeroes past the loaded image.
#[derive(Debug, Clone)]
pub struct FixedMemory {
    inner: Vec<i32>,
    image_len: usize,
}

impl FixedMemory {
    /// Loads `words` starting at address zero.
    ///
    /// # Errors
    /// Returns the first address past the memory if the image does not fit.
    pub fn from_words(words: &[i32]) -> Result<FixedMemory, MemoryError> {
        if words.len() > MEMORY_SIZE {
            return Err(MemoryError::invalid_address(MEMORY_SIZE as i32));
        }

        let mut inner = vec![0; MEMORY_SIZE];
        inner[..words.len()].copy_from_slice(words);

        Ok(FixedMemory {
            inner,
            image_len: words.len(),
        })
    }

    pub fn from_program(program: &Program) -> Result<FixedMemory, MemoryError> {
        FixedMemory::from_words(&program.words)
    }

    /// Number of words loaded from the image.
    pub fn image_len(&self) -> usize {
        self.image_len
    }
}

fn index(address: i32, len: usize) -> Result<usize, MemoryError> {
    if address >= 0 && (address as usize) < len {
        Ok(address as usize)
    } else {
        Err(MemoryError::invalid_address(address))
    }
}

impl Memory for FixedMemory {
    fn get_data(&self, address: i32) -> Result<i32, MemoryError> {
        let index = index(address, self.inner.len())?;
        Ok(self.inner[index])
    }

    fn set_data(&mut self, address: i32, data: i32) -> Result<(), MemoryError> {
        let index = index(address, self.inner.len())?;
        self.inner[index] = data;
        Ok(())
    }
}

/// A memory exactly as large as the vector.
impl Memory for Vec<i32> {
    fn get_data(&self, address: i32) -> Result<i32, MemoryError> {
        let index = index(address, self.len())?;
        Ok(self[index])
    }

    fn set_data(&mut self, address: i32, data: i32) -> Result<(), MemoryError> {
        let index = index(address, self.len())?;
        self[index] = data;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmulationErrorKind {
    /// The fetched word has an opcode the opcode table does not define.
    UnknownOpcode(u8),

    /// The program executed the configured number of instructions without halting.
    InstructionLimitExceeded(u64),

    Memory(MemoryError),
}

/// An error that stopped the execution, together with the program counter at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct EmulationError {
    pub pc: i32,
    pub kind: EmulationErrorKind,
}

impl fmt::Display for EmulationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "at pc {}: ", self.pc)?;

        match &self.kind {
            EmulationErrorKind::UnknownOpcode(opcode) => write!(f, "unknown opcode {}", opcode),
            EmulationErrorKind::InstructionLimitExceeded(limit) =>
                write!(f, "instruction limit of {} exceeded without halting", limit),
            EmulationErrorKind::Memory(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for EmulationError {}

/// Result of a run that ended in a halt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Number of executed instructions, the final `halt` included.
    pub instructions: u64,
}

/// The emulator contains all the state needed for executing a program.
pub struct Emulator<Mem> {
    /// The memory of the emulated machine.
    /// Contains all the instructions and data required by the program.
    pub memory: Mem,

    /// The program counter and the registers.
    pub context: Context,

    /// True if the execution has been halted.
    pub halted: bool,

    /// Number of instructions executed so far.
    pub executed: u64,

    written_extent: usize,
    opcodes: OpcodeTable,
    instruction_limit: Option<u64>,
    dispatcher: EventDispatcher,
    logger: Logger,
}

impl<Mem> Emulator<Mem> where Mem: Memory {
    /// Create a new emulator with the standard instruction set.
    ///
    /// Execution starts from address zero with every register zeroed.
    pub fn new(memory: Mem) -> Emulator<Mem> {
        Emulator::with_config(memory, &IsaConfig::default())
    }

    /// Create a new emulator which decodes with the opcode table of `config` and stops after
    /// its instruction limit.
    pub fn with_config(memory: Mem, config: &IsaConfig) -> Emulator<Mem> {
        Emulator {
            memory,
            context: Context::default(),
            halted: false,
            executed: 0,
            written_extent: 0,
            opcodes: config.opcodes.clone(),
            instruction_limit: config.instruction_limit,
            dispatcher: EventDispatcher::new(),
            logger: Logger::root(Discard, o!()),
        }
    }

    pub fn with_logger<L: Into<Option<Logger>>>(mut self, logger: L) -> Emulator<Mem> {
        self.logger = logger
            .into()
            .unwrap_or_else(|| Logger::root(Discard, o!()))
            .new(o!("stage" => "emulation"));

        self
    }

    /// Registers a listener that receives every [Event] from now on.
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.dispatcher.add_listener(listener);
    }

    /// One past the highest address a `sw` has written to, or zero.
    pub fn written_extent(&self) -> usize {
        self.written_extent
    }

    fn error(&self, kind: EmulationErrorKind) -> EmulationError {
        EmulationError {
            pc: self.context.pc,
            kind,
        }
    }

    fn memory_error(&self, err: MemoryError) -> EmulationError {
        self.error(EmulationErrorKind::Memory(err))
    }

    /// Fetches and decodes the instruction pointed to by the program counter.
    pub fn current_instruction(&self) -> Result<Instruction, EmulationError> {
        let word = self.memory.get_data(self.context.pc)
            .map_err(|err| self.memory_error(err))?;

        Instruction::decode(word, &self.opcodes)
            .map_err(|opcode| self.error(EmulationErrorKind::UnknownOpcode(opcode)))
    }

    fn register(&self, register: Register) -> i32 {
        self.context.r[register.index()]
    }

    fn set_register(&mut self, register: Register, data: i32) {
        self.context.r[register.index()] = data;
        self.dispatcher.dispatch(Event::RegisterChange { register, data });
    }

    /// Address referenced by an I-format instruction.
    fn effective_address(&self, ins: &Instruction) -> i32 {
        self.register(ins.reg_a).wrapping_add(ins.offset as i32)
    }

    /// Executes `ins` as if it was fetched from the current program counter.
    ///
    /// # Errors
    /// Returns a memory error if the instruction accesses an address outside of the memory.
    pub fn emulate_instruction(&mut self, ins: &Instruction) -> Result<(), EmulationError> {
        let pc = self.context.pc;
        let mut next = pc.wrapping_add(1);

        match ins.operation {
            Operation::Add => {
                let value = self.register(ins.reg_a).wrapping_add(self.register(ins.reg_b));
                self.set_register(ins.dest, value);
            },
            Operation::Nand => {
                let value = !(self.register(ins.reg_a) & self.register(ins.reg_b));
                self.set_register(ins.dest, value);
            },
            Operation::LoadWord => {
                let address = self.effective_address(ins);
                let value = self.memory.get_data(address)
                    .map_err(|err| self.memory_error(err))?;
                self.set_register(ins.reg_b, value);
            },
            Operation::StoreWord => {
                let address = self.effective_address(ins);
                let data = self.register(ins.reg_b);
                self.memory.set_data(address, data)
                    .map_err(|err| self.memory_error(err))?;
                self.written_extent = self.written_extent.max(address as usize + 1);
                self.dispatcher.dispatch(Event::MemoryChange { address, data });
            },
            Operation::BranchEqual => {
                if self.register(ins.reg_a) == self.register(ins.reg_b) {
                    next = next.wrapping_add(ins.offset as i32);
                }
            },
            Operation::JumpAndLink => {
                // Read the target first, regA and regB may be the same register.
                let target = self.register(ins.reg_a);
                self.set_register(ins.reg_b, pc.wrapping_add(1));
                next = target;
            },
            Operation::Halt => {
                self.halted = true;
            },
            Operation::NoOperation => (),
            Operation::Divide => {
                let divisor = self.register(ins.reg_b);

                if divisor == 0 {
                    warn!(self.logger, "division by zero, registers left unchanged"; "pc" => pc);
                    self.dispatcher.dispatch(Event::DivideByZero { pc });
                } else {
                    let value = self.register(ins.reg_a).wrapping_div(divisor);
                    self.set_register(ins.dest, value);
                }
            },
        }

        self.context.pc = next;

        if self.halted {
            self.dispatcher.dispatch(Event::Halt { pc });
        }

        Ok(())
    }

    /// Fetches the next instruction and executes it. Does nothing once the machine has halted.
    ///
    /// # Errors
    /// Returns an error if the instruction cannot be fetched or decoded, if it makes an illegal
    /// memory access, or if the instruction limit has been reached.
    pub fn step(&mut self) -> Result<(), EmulationError> {
        if self.halted {
            return Ok(());
        }

        if let Some(limit) = self.instruction_limit {
            if self.executed >= limit {
                return Err(self.error(EmulationErrorKind::InstructionLimitExceeded(limit)));
            }
        }

        let ins = self.current_instruction()?;

        trace!(self.logger, "execute"; "pc" => self.context.pc, "instruction" => %ins);

        self.emulate_instruction(&ins)?;
        self.executed += 1;

        Ok(())
    }

    /// Executes the program until it halts.
    pub fn run(&mut self) -> Result<RunSummary, EmulationError> {
        while !self.halted {
            self.step()?;
        }

        Ok(RunSummary {
            instructions: self.executed,
        })
    }
}

#[cfg(test)]
macro_rules! assert_register {
    ($emulator:expr, $register:expr, $value:expr) => {
        assert_eq!($emulator.context.r[$register], $value, "Register {} != {}", $register, $value);
    };
}

#[cfg(test)]
fn emulator_for(source: &str) -> Emulator<FixedMemory> {
    let program = crate::symbolic::Program::parse(source)
        .compile()
        .expect("could not assemble program");

    let memory = FixedMemory::from_program(&program)
        .expect("program does not fit into memory");

    Emulator::new(memory)
}

#[test]
fn test_load_word() {
    let mut memory = FixedMemory::from_words(&[8454244]).unwrap();
    memory.set_data(100, 42).unwrap();

    let mut emulator = Emulator::new(memory);
    emulator.step().unwrap();

    assert_register!(emulator, 1, 42);
    assert_eq!(emulator.context.pc, 1);
}

#[test]
fn test_halt_only() {
    let mut emulator = emulator_for("halt");

    let summary = emulator.run().unwrap();

    assert_eq!(summary.instructions, 1);
    assert!(emulator.halted);
    assert_eq!(emulator.context.pc, 1);
    assert_eq!(emulator.context.r, [0; NUM_REGISTERS]);
    assert_eq!(emulator.memory.get_data(0), Ok(25165824));

    emulator.step().unwrap();
    assert_eq!(emulator.executed, 1);
}

#[test]
fn test_countdown() {
    let mut emulator = emulator_for(r#"
        lw      0       1       five
        lw      1       2       3
start   add     1       2       1
        beq     0       1       2
        beq     0       0       start
        noop
done    halt
five    .fill   5
neg1    .fill   -1
stAddr  .fill   start
    "#);

    let summary = emulator.run().unwrap();

    assert_eq!(summary.instructions, 17);
    assert_eq!(emulator.context.pc, 7);
    assert_register!(emulator, 1, 0);
    assert_register!(emulator, 2, -1);
}

#[test]
fn test_taken_branch_lands_on_label() {
    let mut emulator = emulator_for(r#"
        add 0 0 1
        beq 1 0 target
        .fill 5
target: halt
    "#);

    emulator.step().unwrap();
    emulator.step().unwrap();
    assert_eq!(emulator.context.pc, 3);

    emulator.run().unwrap();
    assert_eq!(emulator.context.pc, 4);
}

#[test]
fn test_store_word() {
    let mut emulator = emulator_for(r#"
        lw  0 1 value
        sw  0 1 slot
        halt
value   .fill -7
slot    .fill 0
    "#);

    emulator.run().unwrap();
    assert_eq!(emulator.memory.get_data(4), Ok(-7));
    assert_eq!(emulator.written_extent(), 5);
}

#[test]
fn test_written_extent_past_image() {
    let mut emulator = emulator_for("lw 0 1 value
sw 0 1 50
halt
value .fill 8");

    assert_eq!(emulator.memory.image_len(), 4);
    assert_eq!(emulator.written_extent(), 0);

    emulator.run().unwrap();

    assert_eq!(emulator.written_extent(), 51);
    assert_eq!(emulator.memory.get_data(50), Ok(8));
}

#[test]
fn test_nand_and_wrapping_add() {
    let mut emulator = Emulator::new(vec![
        (1 << 19) | (2 << 16) | 3,
        (1 << 22) | (1 << 19) | (1 << 16) | 4,
        25165824,
    ]);

    emulator.context.r[1] = i32::MAX;
    emulator.context.r[2] = 1;
    emulator.run().unwrap();

    assert_register!(emulator, 3, i32::MIN);
    assert_register!(emulator, 4, !i32::MAX);
}

#[test]
fn test_jalr_reads_target_before_link() {
    let mut emulator = emulator_for(r#"
        lw      0       3       target
        jalr    3       3
        halt
        halt
target  .fill   3
    "#);

    emulator.run().unwrap();

    assert_eq!(emulator.context.pc, 4);
    assert_register!(emulator, 3, 2);
}

#[test]
fn test_instruction_limit() {
    let program = crate::symbolic::Program::parse("loop beq 0 0 loop").compile().unwrap();
    let config = IsaConfig::default().with_instruction_limit(10u64);

    let mut emulator = Emulator::with_config(FixedMemory::from_program(&program).unwrap(), &config);

    let err = emulator.run().unwrap_err();
    assert_eq!(err.kind, EmulationErrorKind::InstructionLimitExceeded(10));
    assert_eq!(emulator.executed, 10);
    assert!(!emulator.halted);
}

#[test]
fn test_unknown_opcode() {
    let config = IsaConfig::default()
        .with_opcodes({
            let mut table = OpcodeTable::standard();
            table.remove("noop");
            table
        });

    let mut emulator = Emulator::with_config(vec![0, 7 << 22], &config);

    let err = emulator.run().unwrap_err();
    assert_eq!(err, EmulationError { pc: 1, kind: EmulationErrorKind::UnknownOpcode(7) });
}

#[test]
fn test_invalid_address() {
    let mut emulator = emulator_for("lw 0 1 -1");

    let err = emulator.step().unwrap_err();
    assert_eq!(err.pc, 0);
    assert_eq!(err.kind, EmulationErrorKind::Memory(MemoryError::invalid_address(-1)));

    // Running off the end of a vector memory.
    let mut emulator = Emulator::new(vec![7 << 22]);
    emulator.step().unwrap();
    assert_eq!(emulator.step().unwrap_err().kind, EmulationErrorKind::Memory(MemoryError::invalid_address(1)));
}

#[test]
fn test_division() {
    let program = crate::symbolic::Program::parse("div 1 2 3\ndiv 1 0 4\nhalt");
    let config = IsaConfig::default().with_opcodes(OpcodeTable::with_division());
    let program = crate::compiler::compile(&program, &config).unwrap();

    let mut emulator = Emulator::with_config(FixedMemory::from_program(&program).unwrap(), &config);
    emulator.context.r[1] = -17;
    emulator.context.r[2] = 5;
    emulator.context.r[4] = 99;

    let summary = emulator.run().unwrap();

    assert_eq!(summary.instructions, 3);
    assert_register!(emulator, 3, -3);
    assert_register!(emulator, 4, 99);
}

#[test]
fn test_events() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let events = Rc::new(RefCell::new(Vec::new()));

    let mut emulator = emulator_for("lw 0 1 data\nsw 0 1 9\nhalt\ndata .fill 12");

    {
        let events = events.clone();
        emulator.add_listener(move |event: &Event| events.borrow_mut().push(event.clone()));
    }

    emulator.run().unwrap();

    assert_eq!(*events.borrow(), vec![
        Event::RegisterChange { register: Register::R1, data: 12 },
        Event::MemoryChange { address: 9, data: 12 },
        Event::Halt { pc: 2 },
    ]);
}
