//! Reading and tokenizing symbolic assembly programs.

pub mod parser;
pub mod program;
pub mod token;

pub use self::program::{Program, SourceLine};
pub use self::token::{Token, Word};
