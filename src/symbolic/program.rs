use std::fmt;

use itertools::Itertools;

use super::token::Word;

/// Character that starts a comment. Everything after it on the same line is ignored.
pub const COMMENT_CHARACTER: char = '#';

/// A non-empty source line with comments removed, split into words.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine<'a> {
    /// One-based line number in the original text.
    pub number: usize,
    pub words: Vec<Word<'a>>,
}

impl<'a> SourceLine<'a> {
    /// Normalizes a raw line.
    ///
    /// # Returns
    /// `None` if nothing but whitespace or a comment is left.
    pub fn new(number: usize, raw: &'a str) -> Option<SourceLine<'a>> {
        let code = match raw.find(COMMENT_CHARACTER) {
            Some(index) => &raw[..index],
            None => raw,
        };

        let words: Vec<_> = code.split_whitespace()
            .map(Word::classify)
            .collect();

        if words.is_empty() {
            return None;
        }

        Some(SourceLine { number, words })
    }
}

impl<'a> fmt::Display for SourceLine<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.words.iter().join(" "))
    }
}

/// A symbolic assembly program: the ordered, normalized lines of the source.
#[derive(Debug, Default, Clone)]
pub struct Program<'a> {
    pub lines: Vec<SourceLine<'a>>,
}

impl<'a> Program<'a> {
    /// Splits `source` into lines and normalizes them.
    pub fn parse(source: &'a str) -> Program<'a> {
        Program::from_lines(source.lines())
    }

    /// Builds a program from raw lines. Line numbers are assigned in iteration order, starting
    /// from one, and are kept even though blank and comment lines are dropped.
    pub fn from_lines<I>(lines: I) -> Program<'a>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let lines = lines.into_iter()
            .enumerate()
            .filter_map(|(index, raw)| SourceLine::new(index + 1, raw))
            .collect();

        Program { lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Assembles the program with the standard configuration.
    pub fn compile(&self) -> Result<crate::bytecode::Program, crate::compiler::AssemblyError> {
        crate::compiler::compile(self, &Default::default())
    }
}

#[test]
fn test_parse_strips_comments_and_blank_lines() {
    let program = Program::parse(r#"
# a full line comment
        lw 0 1 five   # load reg1 with 5

        halt
five    .fill 5#trailing
"#);

    let numbers: Vec<_> = program.lines.iter().map(|l| l.number).collect();
    assert_eq!(numbers, vec![3, 5, 6]);

    let texts: Vec<_> = program.lines.iter().map(|l| l.to_string()).collect();
    assert_eq!(texts, vec!["lw 0 1 five", "halt", "five .fill 5"]);
}

#[test]
fn test_comment_only_line_is_dropped() {
    assert!(Program::parse("   # nothing here\n\n\t\n").is_empty());
    assert!(SourceLine::new(1, "#").is_none());
}
