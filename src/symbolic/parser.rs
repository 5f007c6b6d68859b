//! The label detection rule shared by both assembler passes.

use crate::isa::OpcodeTable;

use super::program::SourceLine;
use super::token::Word;

/// A source line with its leading label, if any, separated from the statement.
#[derive(Debug, Clone, Copy)]
pub struct LineParts<'l, 'a> {
    pub label: Option<&'a str>,

    /// The mnemonic or directive followed by its operands. Empty for a line that only declares
    /// a label.
    pub statement: &'l [Word<'a>],
}

impl<'l, 'a> LineParts<'l, 'a> {
    /// Returns `true` if the line produces a word in the output.
    pub fn emits_word(&self) -> bool {
        !self.statement.is_empty()
    }

    pub fn head(&self) -> Option<&'l Word<'a>> {
        self.statement.first()
    }

    pub fn operands(&self) -> &'l [Word<'a>] {
        match self.statement {
            [] => &[],
            [_, rest @ ..] => rest,
        }
    }
}

/// Splits the leading label off a line.
///
/// The first word is a label unless it is `.fill` or a mnemonic in `table`. A trailing colon is
/// stripped from the name.
pub fn split_label<'l, 'a>(line: &'l SourceLine<'a>, table: &OpcodeTable) -> LineParts<'l, 'a> {
    let label = line.words.first()
        .filter(|word| !table.is_mnemonic(word.text))
        .and_then(|word| word.name());

    let statement = match label {
        Some(_) => &line.words[1..],
        None => &line.words[..],
    };

    LineParts { label, statement }
}

#[test]
fn test_split_label() {
    let table = OpcodeTable::standard();

    let line = SourceLine::new(1, "loop add 1 2 3").unwrap();
    let parts = split_label(&line, &table);
    assert_eq!(parts.label, Some("loop"));
    assert_eq!(parts.head().map(|w| w.text), Some("add"));
    assert_eq!(parts.operands().len(), 3);

    let line = SourceLine::new(1, "add 1 2 3").unwrap();
    let parts = split_label(&line, &table);
    assert_eq!(parts.label, None);
    assert_eq!(parts.statement.len(), 4);

    let line = SourceLine::new(1, "target: halt").unwrap();
    let parts = split_label(&line, &table);
    assert_eq!(parts.label, Some("target"));
    assert_eq!(parts.head().map(|w| w.text), Some("halt"));
    assert!(parts.operands().is_empty());

    let line = SourceLine::new(1, "five .fill 5").unwrap();
    assert_eq!(split_label(&line, &table).label, Some("five"));

    let line = SourceLine::new(1, ".fill 5").unwrap();
    assert_eq!(split_label(&line, &table).label, None);
}

#[test]
fn test_lone_label_emits_nothing() {
    let table = OpcodeTable::standard();
    let line = SourceLine::new(1, "done").unwrap();
    let parts = split_label(&line, &table);

    assert_eq!(parts.label, Some("done"));
    assert!(!parts.emits_word());
    assert!(parts.head().is_none());
}

#[test]
fn test_mnemonics_follow_the_table() {
    let line = SourceLine::new(1, "div 1 2 3").unwrap();

    assert_eq!(split_label(&line, &OpcodeTable::standard()).label, Some("div"));
    assert_eq!(split_label(&line, &OpcodeTable::with_division()).label, None);
}

#[test]
fn test_any_word_can_be_a_label() {
    let table = OpcodeTable::standard();

    for (text, label, head) in &[
        ("loop.1 noop", "loop.1", "noop"),
        ("my-label halt", "my-label", "halt"),
        ("L$2: halt", "L$2", "halt"),
        ("5 halt", "5", "halt"),
    ] {
        let line = SourceLine::new(1, text).unwrap();
        let parts = split_label(&line, &table);

        assert_eq!(parts.label, Some(*label));
        assert_eq!(parts.head().map(|w| w.text), Some(*head));
    }
}
