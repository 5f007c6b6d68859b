use slog::{o, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use lc2k::{
    bytecode,
    compiler::compile_with_logger,
    emulator::{Emulator, FixedMemory, Memory},
    isa::IsaConfig,
    symbolic::Program,
    trace::run_traced,
};

macro_rules! assert_register {
    ($emulator:expr, $register:expr, $value:expr) => {
        assert_eq!($emulator.context.r[$register], $value, "Register {} != {}", $register, $value);
    };
}

macro_rules! assert_symbol {
    ($emulator:expr, $program:expr, $symbol:expr, $value:expr) => {
        let addr = $program.symbol_table.address($symbol)
            .expect("no such symbol");
        let value = $emulator.memory.get_data(addr as i32)
            .expect("symbol points to invalid memory");
        assert_eq!(value, $value, "Symbol '{}' at {} != {}", $symbol, addr, $value);
    };
}

fn assemble(source: &str) -> bytecode::Program {
    Program::parse(source).compile().expect("could not assemble program")
}

fn emulator_for(program: &bytecode::Program) -> Emulator<FixedMemory> {
    Emulator::new(FixedMemory::from_program(program).expect("program does not fit into memory"))
}

#[test]
fn test_countdown_assembles_to_machine_code() {
    let program = assemble(include_str!("countdown.as"));
    let expected = bytecode::Program::parse(include_str!("countdown.mc")).unwrap();

    assert_eq!(program.words, expected.words);
    assert_eq!(program.to_string(), include_str!("countdown.mc"));

    assert_eq!(program.symbol_table.address("start"), Some(2));
    assert_eq!(program.symbol_table.address("stAddr"), Some(9));
    assert_eq!(program.source_map.get_source(0), Some(&2));
}

#[test]
fn test_countdown_runs_from_machine_code() {
    let program = bytecode::Program::parse(include_str!("countdown.mc")).unwrap();
    let mut emulator = emulator_for(&program);

    let summary = emulator.run().unwrap();

    assert_eq!(summary.instructions, 17);
    assert_eq!(emulator.context.pc, 7);
    assert_register!(emulator, 1, 0);
    assert_register!(emulator, 2, -1);
}

#[test]
fn test_multiply() {
    let program = assemble(include_str!("multiply.as"));
    let mut emulator = emulator_for(&program);

    emulator.run().unwrap();

    assert_register!(emulator, 1, 1103 * 7043);
    assert_symbol!(emulator, program, "mcand", 1103);
}

#[test]
fn test_subroutine_call() {
    let program = assemble(include_str!("call.as"));
    let mut emulator = emulator_for(&program);

    let summary = emulator.run().unwrap();

    assert_eq!(summary.instructions, 7);
    assert_register!(emulator, 7, 3);
    assert_register!(emulator, 6, 7);
    assert_symbol!(emulator, program, "result", 12);
    assert_symbol!(emulator, program, "fnAddr", 5);
}

#[test]
fn test_trace_output() {
    let program = assemble(include_str!("countdown.as"));
    let mut emulator = emulator_for(&program);
    let mut out = Vec::new();

    let image_len = emulator.memory.image_len();
    assert_eq!(image_len, program.len());

    run_traced(&mut emulator, image_len, &mut out, true).unwrap();

    let out = String::from_utf8(out).unwrap();

    // One dump before every instruction and the final one.
    assert_eq!(out.matches("@@@\n").count(), 18);
    assert_eq!(out.matches("end state\n").count(), 18);
    assert!(out.starts_with("\n@@@\nstate:\n\tpc 0\n\tmemory:\n\t\tmem[ 0 ] 8454151\n"));
    assert!(out.contains("machine halted\ntotal of 17 instructions executed\nfinal state of machine:\n"));
    assert!(out.ends_with("\t\treg[ 1 ] 0\n\t\treg[ 2 ] -1\n\t\treg[ 3 ] 0\n\t\treg[ 4 ] 0\n\t\treg[ 5 ] 0\n\t\treg[ 6 ] 0\n\t\treg[ 7 ] 0\nend state\n"));
}

#[test]
fn test_with_logger() {
    let decorator = TermDecorator::new().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let config = IsaConfig::default();
    let program = compile_with_logger(&Program::parse(include_str!("call.as")), &config, logger.clone())
        .unwrap();

    let mut emulator = Emulator::with_config(FixedMemory::from_program(&program).unwrap(), &config)
        .with_logger(logger);

    assert_eq!(emulator.run().unwrap().instructions, 7);
}
