use std::fmt;

use super::parser::{parse_image, ParseError as BytecodeParseError};
use crate::source_map::SourceMap;
use crate::symbol_table::SymbolTable;

/// A machine code image: the words to load into memory starting at address zero.
///
/// Images produced by the [compiler](crate::compiler) also carry the symbol table and a source
/// map. Those are not part of the textual machine code format, so parsed images have them
/// empty.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub words: Vec<i32>,
    pub symbol_table: SymbolTable,
    pub source_map: SourceMap<usize>,
}

impl Program {
    pub fn from_words(words: Vec<i32>) -> Program {
        Program {
            words,
            ..Default::default()
        }
    }

    /// Parses a machine code file containing one decimal word per line.
    pub fn parse(bytecode: &str) -> Result<Program, BytecodeParseError> {
        parse_image(bytecode).map(Program::from_words)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Writes the image in the machine code format read by [Program::parse].
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for word in &self.words {
            writeln!(f, "{}", word)?;
        }

        Ok(())
    }
}

#[test]
fn test_write_then_read() {
    let program = Program::from_words(vec![8454151, -1, 0, 25165824]);
    let text = program.to_string();

    assert_eq!(text, "8454151\n-1\n0\n25165824\n");
    assert_eq!(Program::parse(&text).unwrap().words, program.words);
}
