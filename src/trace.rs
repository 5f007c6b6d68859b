//! The textual state trace printed by the simulator.

use std::fmt;
use std::io::Write;

use crate::emulator::{EmulationErrorKind, Emulator, Memory, RunSummary, NUM_REGISTERS};
use crate::error::Error;

/// Snapshot of the machine state, written in the trace format:
///
/// ```text
/// @@@
/// state:
///     pc 0
///     memory:
///         mem[ 0 ] 25165824
///     registers:
///         reg[ 0 ] 0
///         ...
/// end state
/// ```
///
/// The indentation is made of tabs.
#[derive(Debug, Clone, PartialEq)]
pub struct StateDump {
    pub pc: i32,
    pub memory: Vec<i32>,
    pub registers: [i32; NUM_REGISTERS],
}

impl StateDump {
    /// Captures the program counter, the registers and the populated memory: the first
    /// `image_len` words and everything up to the highest address written since.
    pub fn capture<M: Memory>(emulator: &Emulator<M>, image_len: usize) -> StateDump {
        let len = image_len.max(emulator.written_extent());

        let memory = (0..len as i32)
            .filter_map(|address| emulator.memory.get_data(address).ok())
            .collect();

        StateDump {
            pc: emulator.context.pc,
            memory,
            registers: emulator.context.r,
        }
    }
}

impl fmt::Display for StateDump {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "@@@")?;
        writeln!(f, "state:")?;
        writeln!(f, "\tpc {}", self.pc)?;
        writeln!(f, "\tmemory:")?;

        for (address, word) in self.memory.iter().enumerate() {
            writeln!(f, "\t\tmem[ {} ] {}", address, word)?;
        }

        writeln!(f, "\tregisters:")?;

        for (index, value) in self.registers.iter().enumerate() {
            writeln!(f, "\t\treg[ {} ] {}", index, value)?;
        }

        writeln!(f, "end state")
    }
}

/// Listing of a loaded image as `memory[i]=v` lines.
pub struct ImageListing<'a>(pub &'a [i32]);

impl<'a> fmt::Display for ImageListing<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (address, word) in self.0.iter().enumerate() {
            writeln!(f, "memory[{}]={}", address, word)?;
        }

        Ok(())
    }
}

/// Runs the emulator to a halt while writing the trace to `out`.
///
/// A state dump is written before every fetch if `per_cycle` is set. The summary and the final
/// state are written after a halt, and also when the instruction limit stops the run before the
/// error is returned.
pub fn run_traced<M, W>(
    emulator: &mut Emulator<M>,
    image_len: usize,
    out: &mut W,
    per_cycle: bool,
) -> Result<RunSummary, Error>
where
    M: Memory,
    W: Write,
{
    while !emulator.halted {
        if per_cycle {
            writeln!(out)?;
            write!(out, "{}", StateDump::capture(emulator, image_len))?;
        }

        if let Err(err) = emulator.step() {
            if let EmulationErrorKind::InstructionLimitExceeded(limit) = err.kind {
                writeln!(out, "instruction limit of {} reached", limit)?;
                write_final_state(emulator, image_len, out)?;
            }

            return Err(err.into());
        }
    }

    writeln!(out, "machine halted")?;
    write_final_state(emulator, image_len, out)?;

    Ok(RunSummary {
        instructions: emulator.executed,
    })
}

fn write_final_state<M, W>(emulator: &Emulator<M>, image_len: usize, out: &mut W) -> Result<(), Error>
where
    M: Memory,
    W: Write,
{
    writeln!(out, "total of {} instructions executed", emulator.executed)?;
    writeln!(out, "final state of machine:")?;
    writeln!(out)?;
    write!(out, "{}", StateDump::capture(emulator, image_len))?;

    Ok(())
}

#[test]
fn test_image_listing() {
    assert_eq!(ImageListing(&[8454151, -1]).to_string(), "memory[0]=8454151\nmemory[1]=-1\n");
}

#[test]
fn test_trace_of_halt() {
    let mut emulator = Emulator::new(vec![25165824]);
    let mut out = Vec::new();

    let summary = run_traced(&mut emulator, 1, &mut out, true).unwrap();
    assert_eq!(summary.instructions, 1);

    let registers = |indent: &str| (0..NUM_REGISTERS)
        .map(|i| format!("{}reg[ {} ] 0\n", indent, i))
        .collect::<String>();

    let expected = format!(
        "\n@@@\nstate:\n\tpc 0\n\tmemory:\n\t\tmem[ 0 ] 25165824\n\tregisters:\n{regs}end state\n\
         machine halted\n\
         total of 1 instructions executed\n\
         final state of machine:\n\
         \n@@@\nstate:\n\tpc 1\n\tmemory:\n\t\tmem[ 0 ] 25165824\n\tregisters:\n{regs}end state\n",
        regs = registers("\t\t"),
    );

    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[test]
fn test_quiet_trace_stops_on_error() {
    let mut emulator = Emulator::new(vec![7 << 22]);
    let mut out = Vec::new();

    match run_traced(&mut emulator, 1, &mut out, false) {
        Err(Error::Emulation(err)) => assert_eq!(err.pc, 1),
        other => panic!("unexpected result: {:?}", other),
    }

    assert!(out.is_empty());
}

#[test]
fn test_trace_at_instruction_limit() {
    use crate::isa::IsaConfig;

    // loop beq 0 0 loop
    let config = IsaConfig::default().with_instruction_limit(3u64);
    let mut emulator = Emulator::with_config(vec![(4 << 22) | 0xFFFF], &config);
    let mut out = Vec::new();

    match run_traced(&mut emulator, 1, &mut out, false) {
        Err(Error::Emulation(err)) =>
            assert_eq!(err.kind, EmulationErrorKind::InstructionLimitExceeded(3)),
        other => panic!("unexpected result: {:?}", other),
    }

    let out = String::from_utf8(out).unwrap();

    assert!(out.starts_with("instruction limit of 3 reached\ntotal of 3 instructions executed\nfinal state of machine:\n"));
    assert!(out.contains("\tpc 0\n\tmemory:\n\t\tmem[ 0 ] 17039359\n\tregisters:\n"));
    assert!(!out.contains("machine halted"));
}

#[test]
fn test_dump_includes_stores_past_image() {
    // lw 0 1 3, sw 0 1 50, halt, .fill 8
    let mut memory = vec![0; 64];
    memory[..4].copy_from_slice(&[8454147, (3 << 22) | (1 << 16) | 50, 25165824, 8]);

    let mut emulator = Emulator::new(memory);
    emulator.run().unwrap();

    let dump = StateDump::capture(&emulator, 4);

    assert_eq!(dump.memory.len(), 51);
    assert_eq!(dump.memory[50], 8);
    assert!(dump.to_string().contains("\t\tmem[ 50 ] 8\n"));
}
