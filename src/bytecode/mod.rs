//! Parsing and storing machine code images.

mod parser;
mod program;

pub use self::parser::{ErrorKind, ParseError};
pub use self::program::Program;
