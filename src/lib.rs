//! A crate for assembling and simulating programs of LC-2K, the small 8-register teaching
//! instruction set with 25-bit instruction words.
//!
//! This crate provides the functionality to:
//! - Read `.as` files containing symbolic LC-2K assembly.
//! - Assemble them into machine code with a two-pass assembler.
//! - Read and write machine code files, one decimal word per line.
//! - Execute machine code and trace the machine state.
//!
//! The instruction set is configurable through [IsaConfig](isa::IsaConfig): opcode values can be
//! remapped (for example to replace `noop` with `div`), operand checking can be relaxed and the
//! number of executed instructions can be limited.
//!
//! # Example
//! ```
//! use lc2k::{
//!     symbolic::Program,
//!     emulator::{Emulator, FixedMemory},
//! };
//!
//! // Counts register 1 down from 5 to 0.
//! let source = r#"
//!         lw      0       1       five    # load reg1 with 5
//!         lw      0       2       neg1    # load reg2 with -1
//! start   add     1       2       1       # decrement reg1
//!         beq     0       1       done    # leave the loop when reg1 == 0
//!         beq     0       0       start
//! done    halt
//! five    .fill   5
//! neg1    .fill   -1
//! "#;
//!
//! // Split the source into lines and words.
//! let symbolic = Program::parse(source);
//!
//! // Assemble the words into machine code.
//! let compiled = symbolic.compile().expect("could not assemble the program");
//! assert_eq!(compiled.symbol_table.address("done"), Some(5));
//!
//! // Load the machine code into an emulator and run it.
//! let memory = FixedMemory::from_program(&compiled).expect("program is too large");
//! let mut emulator = Emulator::new(memory);
//!
//! let summary = emulator.run().expect("an error occured while emulating the program");
//!
//! assert_eq!(emulator.context.r[1], 0);
//! assert_eq!(summary.instructions, 17);
//! ```
//!
//! # Executables
//!
//! Both executables are built with the `tools` feature.
//!
//! ## `lc2kasm`
//!
//! Assembles a source file and writes the machine code to a file or the standard output.
//!
//! ```text
//! lc2kasm count.as -o count.mc
//! ```
//!
//! ## `lc2ksim`
//!
//! Executes a machine code file, or a source file ending in `.as` or `.s`, and prints the state
//! of the machine before every instruction.
//!
//! ```text
//! lc2ksim count.mc --limit 5000
//! ```
pub mod bytecode;
pub mod compiler;
pub mod emulator;
pub mod error;
pub mod event;
pub mod instruction;
pub mod isa;
pub mod source_map;
pub mod symbol_table;
pub mod symbolic;
pub mod trace;
