use std::io::Write;

use clap::{App, Arg, ArgMatches};
use slog::{o, debug, Discard, Drain, Logger};
use slog_term::{FullFormat, TermDecorator};

use lc2k::{
    compiler::compile_with_logger,
    error::Error,
    isa::{IsaConfig, OpcodeTable, Strictness},
    symbolic,
};

fn parse_args() -> ArgMatches<'static> {
    App::new("lc2kasm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Assembler for LC-2K symbolic assembly")
        .arg(Arg::with_name("source")
             .help("File containing assembly source")
             .value_name("SOURCE")
             .required(true)
             .index(1))
        .arg(Arg::with_name("output")
             .help("File to write the machine code to instead of the standard output")
             .value_name("OUTPUT")
             .long("output")
             .short("o")
             .takes_value(true))
        .arg(Arg::with_name("lenient")
             .help("Ignores extra words after the operands")
             .long("lenient"))
        .arg(Arg::with_name("div")
             .help("Replaces noop with the div instruction")
             .long("div"))
        .arg(Arg::with_name("symbols")
             .help("Prints the symbol table to the standard error")
             .long("symbols"))
        .arg(Arg::with_name("verbose")
             .help("Enables verbose logging")
             .long("verbose")
             .short("v"))
        .get_matches()
}

fn config(args: &ArgMatches) -> IsaConfig {
    let mut config = IsaConfig::default();

    if args.is_present("lenient") {
        config = config.with_strictness(Strictness::Lenient);
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

fn run(args: &ArgMatches, logger: Logger) -> Result<(), Error> {
    // Required argument.
    let source_path = args.value_of("source").unwrap_or_default();
    let source = std::fs::read_to_string(source_path)?;

    debug!(logger, "read source"; "path" => source_path, "bytes" => source.len());

    let program = compile_with_logger(&symbolic::Program::parse(&source), &config(args), logger)?;

    if args.is_present("symbols") {
        eprint!("{}", program.symbol_table);
    }

    match args.value_of("output") {
        Some(path) => std::fs::write(path, program.to_string())?,
        None => {
            let stdout = std::io::stdout();
            let mut stdout = stdout.lock();
            write!(stdout, "{}", program)?;
            stdout.flush()?;
        },
    }

    Ok(())
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
