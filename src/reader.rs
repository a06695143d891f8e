//! Reader: tokenizer and recursive-descent parser.
//!
//! The tokenizer is built from nom combinators and recognises five token
//! kinds: `(`, `)`, the `'` quote prefix, numerals and symbols. A numeral is a
//! maximal run of digits and `.` that starts with a digit; anything else up to
//! the next whitespace or parenthesis is a symbol. Note that this means `-5`
//! is a symbol and `12abc` reads as the number `12` followed by the symbol
//! `abc`.
//!
//! `;` starts a comment only at a token boundary. Inside a symbol it is an
//! ordinary character, so `a;b` is a single symbol.
//!
//! The parser pulls one token at a time and produces one [`Value`] per
//! top-level datum. Lists become `Nil`-terminated chains of pairs, and `()`
//! reads as the `Nil` sentinel itself.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, multispace1, satisfy},
    combinator::{map, recognize, value},
    multi::many0_count,
    sequence::pair,
};

use crate::ast::Value;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Open,
    Close,
    Quote,
    Number(&'a str),
    Symbol(&'a str),
    Done,
}

/// What a single token turned into
enum Datum {
    Expr(Value),
    /// A `)`: no expression here, ends the enclosing list
    Close,
    /// End of input: no more expressions
    Done,
}

fn is_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '(' | ')')
}

/// Whitespace and comments between tokens
fn atmosphere(input: &str) -> IResult<&str, usize> {
    many0_count(alt((
        multispace1,
        recognize(pair(char(';'), take_till(|c: char| c == '\n'))),
    )))
    .parse(input)
}

fn number_text(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_digit()),
        take_while(|c: char| c.is_ascii_digit() || c == '.'),
    ))
    .parse(input)
}

fn symbol_text(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !is_delimiter(c)).parse(input)
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        value(Token::Open, char('(')),
        value(Token::Close, char(')')),
        value(Token::Quote, char('\'')),
        map(number_text, Token::Number),
        map(symbol_text, Token::Symbol),
    ))
    .parse(input)
}

/// Streaming reader over a source unit. Yields one result per top-level datum;
/// after a reader error it resumes with the token following the offending one.
pub struct Reader<'a> {
    input: &'a str,
    rest: &'a str,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a str) -> Self {
        Reader { input, rest: input }
    }

    fn offset(&self) -> usize {
        self.input.len() - self.rest.len()
    }

    fn error(&self, kind: ParseErrorKind, message: &str, found: Option<&str>) -> Error {
        Error::ParseError(ParseError::with_context(
            kind,
            message,
            self.input,
            self.offset(),
            found.map(str::to_owned),
        ))
    }

    fn next_token(&mut self) -> Result<Token<'a>, Error> {
        if let Ok((rest, _)) = atmosphere(self.rest) {
            self.rest = rest;
        }
        if self.rest.is_empty() {
            return Ok(Token::Done);
        }
        match token(self.rest) {
            Ok((rest, tok)) => {
                self.rest = rest;
                Ok(tok)
            }
            Err(_) => {
                let found: String = self.rest.chars().take(10).collect();
                let err = self.error(
                    ParseErrorKind::InvalidSyntax,
                    "Unrecognized input",
                    Some(&found),
                );
                // skip one character so the next read makes progress
                let mut chars = self.rest.chars();
                chars.next();
                self.rest = chars.as_str();
                Err(err)
            }
        }
    }

    /// Turn one already-consumed token into a datum
    fn read_datum(&mut self, token: Token<'a>, depth: usize) -> Result<Datum, Error> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(self.error(
                ParseErrorKind::TooDeeplyNested,
                &format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                None,
            ));
        }
        match token {
            Token::Done => Ok(Datum::Done),
            Token::Close => Ok(Datum::Close),
            Token::Number(text) => match text.parse::<f64>() {
                Ok(n) => Ok(Datum::Expr(Value::Number(n))),
                Err(_) => Err(self.error(
                    ParseErrorKind::InvalidSyntax,
                    "Malformed number",
                    Some(text),
                )),
            },
            Token::Symbol(text) => Ok(Datum::Expr(Value::symbol(text))),
            Token::Open => self.read_list(depth).map(Datum::Expr),
            Token::Quote => {
                let next = self.next_token()?;
                match self.read_datum(next, depth + 1)? {
                    Datum::Expr(quoted) => Ok(Datum::Expr(Value::list_from_iter([
                        Value::symbol("quote"),
                        quoted,
                    ]))),
                    Datum::Close => Err(self.error(
                        ParseErrorKind::InvalidSyntax,
                        "Expected expression after quote",
                        Some(")"),
                    )),
                    Datum::Done => Err(self.error(
                        ParseErrorKind::Incomplete,
                        "Unexpected end of input after quote",
                        None,
                    )),
                }
            }
        }
    }

    /// Read data up to the matching `)`; the `(` has been consumed
    fn read_list(&mut self, depth: usize) -> Result<Value, Error> {
        let mut items = Vec::new();
        loop {
            let tok = self.next_token()?;
            match self.read_datum(tok, depth + 1)? {
                Datum::Expr(item) => items.push(item),
                Datum::Close => return Ok(Value::list_from_iter(items)),
                Datum::Done => {
                    return Err(self.error(
                        ParseErrorKind::Incomplete,
                        "Unexpected end of input inside list",
                        None,
                    ));
                }
            }
        }
    }

    /// Read the next top-level expression, `Ok(None)` at end of input
    pub fn read(&mut self) -> Result<Option<Value>, Error> {
        let tok = self.next_token()?;
        match self.read_datum(tok, 0)? {
            Datum::Expr(v) => Ok(Some(v)),
            Datum::Done => Ok(None),
            Datum::Close => Err(self.error(
                ParseErrorKind::InvalidSyntax,
                "Unexpected ')'",
                Some(")"),
            )),
        }
    }
}

impl Iterator for Reader<'_> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

/// Parse every top-level expression in `input`, failing on the first error
pub fn parse_program(input: &str) -> Result<Vec<Value>, Error> {
    Reader::new(input).collect()
}

/// Parse exactly one expression from `input`
pub fn parse_expr(input: &str) -> Result<Value, Error> {
    let mut reader = Reader::new(input);
    let Some(expr) = reader.read()? else {
        return Err(Error::ParseError(ParseError::from_message(
            ParseErrorKind::Incomplete,
            "Unexpected end of input",
        )));
    };
    match reader.next_token()? {
        Token::Done => Ok(expr),
        _ => Err(reader.error(
            ParseErrorKind::TrailingContent,
            "Unexpected remaining input",
            None,
        )),
    }
}
