//! Tokens and a tokenizer for the symbolic format.

use logos::{Lexer, Logos};

use std::fmt;

/// Enumeration of all tokens of the symbolic format.
///
/// A line is split on whitespace first and every word is classified as exactly one token, so a
/// word such as `12ab` is an [Error](Token::Error) rather than two tokens.
#[derive(Logos, Debug, PartialEq, Clone, Copy)]
pub enum Token<'a> {
    /// Word that could not be interpreted as any of the other variants.
    #[error]
    #[regex(r"[ \t\f\r\n]+", logos::skip)]
    Error,

    /// The `.fill` directive.
    #[token(".fill")]
    Fill,

    /// A signed decimal literal.
    #[regex("-?[0-9]+", literal_callback)]
    Literal(i64),

    /// A label declaration written with a trailing colon, eg. `loop:`. Holds the name without
    /// the colon.
    #[regex("[A-Za-z_][A-Za-z0-9_]*:", label_callback)]
    Label(&'a str),

    /// A bare name. Either a mnemonic, a label declaration or a label reference depending on its
    /// position and the opcode table.
    #[regex("[A-Za-z_][A-Za-z0-9_]*", Lexer::slice)]
    Symbol(&'a str),
}

fn literal_callback<'a>(
    lex: &mut Lexer<'a, Token<'a>>,
) -> std::result::Result<i64, std::num::ParseIntError> {
    lex.slice().parse()
}

fn label_callback<'a>(lex: &mut Lexer<'a, Token<'a>>) -> &'a str {
    let slice = lex.slice();
    &slice[..slice.len() - 1]
}

/// A whitespace separated word of a source line together with its classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub token: Token<'a>,
}

impl<'a> Word<'a> {
    /// Classifies `text`, which must not contain whitespace.
    pub fn classify(text: &'a str) -> Word<'a> {
        let mut lexer = Token::lexer(text);

        let first = lexer.next();
        let whole = lexer.span() == (0..text.len());

        let token = match (first, whole, lexer.next()) {
            (Some(token), true, None) => token,
            _ => Token::Error,
        };

        Word { text, token }
    }

    /// Returns the label name the word declares when it leads a line.
    ///
    /// Any word but `.fill` can name a label. A trailing colon is not part of the name.
    pub fn name(&self) -> Option<&'a str> {
        match self.token {
            Token::Fill => None,
            Token::Label(name) => Some(name),
            _ => match self.text.strip_suffix(':') {
                Some(name) if !name.is_empty() => Some(name),
                _ => Some(self.text),
            },
        }
    }

    /// Returns the label name the word refers to when used as an operand.
    ///
    /// Literals are values, and a name written with a colon is a declaration.
    pub fn reference(&self) -> Option<&'a str> {
        match self.token {
            Token::Symbol(name) => Some(name),
            Token::Error => Some(self.text),
            _ => None,
        }
    }
}

impl<'t> fmt::Display for Token<'t> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Error => write!(f, "<error>"),
            Token::Fill => write!(f, ".fill"),
            Token::Literal(num) => write!(f, "{}", num),
            Token::Label(label) => write!(f, "{}:", label),
            Token::Symbol(symbol) => write!(f, "{}", symbol),
        }
    }
}

impl<'a> fmt::Display for Word<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[test]
fn test_classify() {
    assert_eq!(Word::classify(".fill").token, Token::Fill);
    assert_eq!(Word::classify("42").token, Token::Literal(42));
    assert_eq!(Word::classify("-32768").token, Token::Literal(-32768));
    assert_eq!(Word::classify("loop").token, Token::Symbol("loop"));
    assert_eq!(Word::classify("loop:").token, Token::Label("loop"));
    assert_eq!(Word::classify("add").token, Token::Symbol("add"));
    assert_eq!(Word::classify("start_2").token, Token::Symbol("start_2"));
}

#[test]
fn test_classify_rejects_partial_matches() {
    assert_eq!(Word::classify("12ab").token, Token::Error);
    assert_eq!(Word::classify("a-b").token, Token::Error);
    assert_eq!(Word::classify("+5").token, Token::Error);
    assert_eq!(Word::classify(".word").token, Token::Error);
    assert_eq!(Word::classify("99999999999999999999999").token, Token::Error);
}

#[test]
fn test_label_names() {
    assert_eq!(Word::classify("loop").name(), Some("loop"));
    assert_eq!(Word::classify("loop:").name(), Some("loop"));
    assert_eq!(Word::classify("loop.1").name(), Some("loop.1"));
    assert_eq!(Word::classify("my-label:").name(), Some("my-label"));
    assert_eq!(Word::classify("5").name(), Some("5"));
    assert_eq!(Word::classify(":").name(), Some(":"));
    assert_eq!(Word::classify(".fill").name(), None);

    assert_eq!(Word::classify("L$2").reference(), Some("L$2"));
    assert_eq!(Word::classify("done").reference(), Some("done"));
    assert_eq!(Word::classify("done:").reference(), None);
    assert_eq!(Word::classify("-3").reference(), None);
}
