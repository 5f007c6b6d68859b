use std::fmt::{Display, self};
use nom::error::ErrorKind;

use crate::compiler::AssemblyError;
use crate::emulator::EmulationError;

#[derive(Debug, Clone)]
enum InnerError<Kind> {
    Incomplete,
    Context(&'static str),
    Other(Kind),
    Nom(ErrorKind),
}

impl<Kind: Display> fmt::Display for InnerError<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InnerError::Context(ctx) => write!(f, "invalid {}", ctx),
            InnerError::Nom(_err) => write!(f, "unexpected input"),
            InnerError::Other(op) => fmt::Display::fmt(op, f),
            InnerError::Incomplete => write!(f, "expected more input"),
        }
    }
}

/// Error type that contains the reason of the error and the unconsumed input.
///
/// For error location information see [ParseError::verbose].
#[derive(Clone, Debug)]
pub struct ParseError<Kind> {
    stack: Vec<(String, InnerError<Kind>)>,
}

impl<Kind> ParseError<Kind> {
    pub(crate) fn from_kind(input: &str, kind: Kind) -> ParseError<Kind> {
        ParseError {
            stack: vec![(input.to_string(), InnerError::Other(kind))],
        }
    }

    pub(crate) fn incomplete() -> ParseError<Kind> {
        ParseError {
            stack: vec![(String::new(), InnerError::Incomplete)],
        }
    }

    /// Returns the reason of the error if it was not produced by the parser combinators
    /// themselves.
    pub fn kind(&self) -> Option<&Kind> {
        self.stack.iter().find_map(|(_, inner)| match inner {
            InnerError::Other(kind) => Some(kind),
            _ => None,
        })
    }
}

/// Error type containing location information in addition to the reason of the error.
///
/// Created from a [ParseError] with [ParseError::verbose].
#[derive(Clone, Debug)]
pub struct VerboseParseError<'a, Kind> {
    /// The line number of the error location.
    pub line: usize,
    /// The column number of the error location.
    pub column: usize,
    kind: InnerError<Kind>,
    rest: &'a str,
}

impl<'a, Kind: Display> fmt::Display for VerboseParseError<'a, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "at line {} col {}: {}, at '{}'", self.line, self.column, self.kind, self.rest)
    }
}

impl<Kind> ParseError<Kind> {
    /// Calculates the error location information from the [ParseError] and the original input
    /// buffer.
    ///
    /// # Parameters
    /// - `input`: The original input buffer or an exact copy of it.
    pub fn verbose(self, input: &str) -> VerboseParseError<Kind> {
        let (rest, kind) = self.stack
            .into_iter()
            .next()
            .unwrap_or((String::new(), InnerError::Incomplete));

        let consumed = input.len().saturating_sub(rest.len());

        let mut line = 1;
        let mut column = 1;

        for ch in input[..consumed].chars() {
            if ch == '\n' {
                line += 1;
                column = 0;
            }

            column += 1;
        }

        let end = input[consumed..]
            .char_indices()
            .find(|&(i, ch)| ch == '\n' || i > 20)
            .map(|(i, _)| consumed + i)
            .unwrap_or_else(|| input.len());

        VerboseParseError {
            line,
            column,
            kind,
            rest: &input[consumed..end],
        }
    }
}

impl<Kind: Display> fmt::Display for ParseError<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (input, kind) = match self.stack.first() {
            Some(entry) => entry,
            None => return write!(f, "unknown error"),
        };

        let end = input
            .char_indices()
            .find(|&(i, c)| c == '\n' || i >= 20)
            .map(|(i, _)| i)
            .unwrap_or_else(|| input.len());

        write!(f, "{} at: {}", kind, &input[..end])
    }
}

impl<Kind> nom::error::ParseError<&str> for ParseError<Kind> {
    fn from_error_kind(input: &str, kind: ErrorKind) -> Self {
        ParseError {
            stack: vec![(input.to_string(), InnerError::Nom(kind))],
        }
    }

    fn append(input: &str, kind: ErrorKind, mut other: Self) -> Self {
        other.stack.push((input.to_string(), InnerError::Nom(kind)));
        other
    }

    fn add_context(input: &str, ctx: &'static str, mut other: Self) -> Self {
        other.stack.push((input.to_string(), InnerError::Context(ctx)));
        other
    }
}

/// Any error that the executables may run into.
#[derive(Debug)]
pub enum Error {
    /// Reading or writing a file failed.
    Io(std::io::Error),

    /// A machine code file could not be read.
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    Assembly(AssemblyError),

    Emulation(EmulationError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Parse { line, column, message } =>
                write!(f, "parse error at line {} col {}: {}", line, column, message),
            Error::Assembly(err) => write!(f, "assembly error: {}", err),
            Error::Emulation(err) => write!(f, "emulation error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl<'a, K: Display> From<VerboseParseError<'a, K>> for Error {
    fn from(e: VerboseParseError<'a, K>) -> Error {
        Error::Parse {
            line: e.line,
            column: e.column,
            message: format!("{}, at '{}'", e.kind, e.rest),
        }
    }
}

impl From<AssemblyError> for Error {
    fn from(e: AssemblyError) -> Error {
        Error::Assembly(e)
    }
}

impl From<EmulationError> for Error {
    fn from(e: EmulationError) -> Error {
        Error::Emulation(e)
    }
}

#[test]
fn test_verbose_location() {
    let input = "12\n34\nxyz\n";
    let error: ParseError<String> = ParseError::from_kind(&input[6..], "bad".to_string());
    let verbose = error.verbose(input);

    assert_eq!(verbose.line, 3);
    assert_eq!(verbose.column, 1);
    assert_eq!(verbose.to_string(), "at line 3 col 1: bad, at 'xyz'");
}
