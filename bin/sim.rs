use std::io::Write;

use clap::{App, Arg, ArgMatches};
use slog::{o, debug, Discard, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use lc2k::{
    bytecode,
    compiler::compile_with_logger,
    emulator::{EmulationError, EmulationErrorKind, Emulator, FixedMemory},
    error::Error,
    isa::{IsaConfig, OpcodeTable},
    symbolic,
    trace::{run_traced, ImageListing},
};

fn parse_args() -> ArgMatches<'static> {
    App::new("lc2ksim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Simulator for LC-2K machine code")
        .arg(Arg::with_name("program")
             .help("File containing machine code, or assembly source if it ends in .as or .s")
             .value_name("PROGRAM")
             .required(true)
             .index(1))
        .arg(Arg::with_name("limit")
             .help("Maximum number of instructions to execute")
             .value_name("N")
             .long("limit")
             .takes_value(true)
             .validator(|value| value.parse::<u64>()
                 .map(|_| ())
                 .map_err(|err| format!("invalid limit: {}", err))))
        .arg(Arg::with_name("div")
             .help("Replaces noop with the div instruction")
             .long("div"))
        .arg(Arg::with_name("quiet")
             .help("Prints only the final state")
             .long("quiet")
             .short("q"))
        .arg(Arg::with_name("verbose")
             .help("Enables verbose logging")
             .long("verbose")
             .short("v"))
        .get_matches()
}

fn config(args: &ArgMatches) -> IsaConfig {
    let mut config = IsaConfig::default();

    if let Some(limit) = args.value_of("limit").and_then(|limit| limit.parse::<u64>().ok()) {
        config = config.with_instruction_limit(limit);
    }

    if args.is_present("div") {
        config = config.with_opcodes(OpcodeTable::with_division());
    }

    config
}

fn logger(args: &ArgMatches) -> Logger {
    if !args.is_present("verbose") {
        return Logger::root(Discard, o!());
    }

    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

fn load(path: &str, config: &IsaConfig, logger: &Logger) -> Result<bytecode::Program, Error> {
    let file = std::fs::read_to_string(path)?;

    if path.ends_with(".as") || path.ends_with(".s") {
        debug!(logger, "assembling source"; "path" => path);

        let program = compile_with_logger(&symbolic::Program::parse(&file), config, logger.clone())?;
        return Ok(program);
    }

    bytecode::Program::parse(&file).map_err(|err| Error::from(err.verbose(&file)))
}

fn run(args: &ArgMatches, logger: Logger) -> Result<(), Error> {
    let config = config(args);

    // Required argument.
    let path = args.value_of("program").unwrap_or_default();
    let program = load(path, &config, &logger)?;

    let memory = FixedMemory::from_program(&program)
        .map_err(|err| EmulationError { pc: 0, kind: EmulationErrorKind::Memory(err) })?;

    let image_len = memory.image_len();
    let mut emulator = Emulator::with_config(memory, &config).with_logger(logger);

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();

    writeln!(stdout, "{}", ImageListing(&program.words))?;

    let result = run_traced(&mut emulator, image_len, &mut stdout, !args.is_present("quiet"));
    stdout.flush()?;

    result.map(|_| ())
}

fn main() {
    let args = parse_args();

    let code = match run(&args, logger(&args)) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err);
            1
        },
    };

    std::process::exit(code);
}
