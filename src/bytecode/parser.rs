use std::fmt;
use std::result::Result as StdResult;

use nom::{
    IResult,
    character::complete::{char, digit1, line_ending, multispace0, space0},
    combinator::{map, map_res, opt, recognize},
    error::context,
    sequence::{pair, terminated},
};

use crate::emulator::MEMORY_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// The image has more words than fit into the memory.
    TooManyWords {
        count: usize,
    },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::TooManyWords { count } =>
                write!(f, "{} words do not fit into {} words of memory", count, MEMORY_SIZE),
        }
    }
}

pub type ParseError = crate::error::ParseError<ErrorKind>;
type Result<'a, T> = IResult<&'a str, T, ParseError>;

fn take_i32(input: &str) -> Result<i32> {
    context(
        "machine word",
        map_res(
            recognize(pair(opt(char('-')), digit1)),
            |s: &str| s.parse::<i32>(),
        ),
    )(input)
}

fn end_of_line(input: &str) -> Result<()> {
    if input.is_empty() {
        return Ok((input, ()));
    }

    map(line_ending, |_| ())(input)
}

fn take_words(mut input: &str) -> Result<Vec<i32>> {
    let mut words = Vec::new();

    loop {
        let (rest, _) = multispace0(input)?;

        if rest.is_empty() {
            return Ok((rest, words));
        }

        let (rest, word) = terminated(take_i32, space0)(rest)?;
        let (rest, _) = end_of_line(rest)?;

        words.push(word);
        input = rest;
    }
}

/// Parses a machine code image: one decimal word per line. Blank lines and whitespace around
/// the words are ignored.
pub(crate) fn parse_image(input: &str) -> StdResult<Vec<i32>, ParseError> {
    let words = match take_words(input) {
        Ok((_, words)) => words,
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => return Err(err),
        Err(nom::Err::Incomplete(_)) => return Err(ParseError::incomplete()),
    };

    if words.len() > MEMORY_SIZE {
        let kind = ErrorKind::TooManyWords { count: words.len() };
        return Err(ParseError::from_kind(&input[input.len()..], kind));
    }

    Ok(words)
}

#[test]
fn test_parse_image() {
    assert_eq!(parse_image("8454151\n9043971\n").unwrap(), vec![8454151, 9043971]);
    assert_eq!(parse_image("1\r\n-2\r\n  3  \n\n4").unwrap(), vec![1, -2, 3, 4]);
    assert_eq!(parse_image("").unwrap(), Vec::<i32>::new());
    assert_eq!(parse_image("-2147483648\n2147483647\n").unwrap(), vec![i32::MIN, i32::MAX]);
}

#[test]
fn test_parse_image_errors() {
    let input = "1\n2 3\n";
    let err = parse_image(input).unwrap_err().verbose(input);
    assert_eq!(err.line, 2);
    assert_eq!(err.column, 3);

    let input = "1\n2147483648\n";
    let err = parse_image(input).unwrap_err().verbose(input);
    assert_eq!(err.line, 2);

    let input = "1\nhalt\n";
    assert!(parse_image(input).is_err());
}

#[test]
fn test_parse_image_too_large() {
    let input = "0\n".repeat(MEMORY_SIZE + 1);
    let err = parse_image(&input).unwrap_err();

    assert_eq!(err.kind(), Some(&ErrorKind::TooManyWords { count: MEMORY_SIZE + 1 }));
}
