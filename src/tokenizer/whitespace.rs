//! # Whitespace Token Handling
//!
//! Spaces and tabs are kept as [`Token::Whitespace`] so the tokenizer can report exact
//! columns. Line breaks become [`Token::Newline`]; the flow parser splits the token stream
//! into logical lines on them, so they are significant.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::map,
    error::context,
};

use super::token::{ParserResult, Token};

/// Parses a run of spaces and tabs.
///
/// ```
/// # use flowchat::tokenizer::whitespace::parse_whitespace;
/// # use flowchat::tokenizer::token::Token;
/// let (rest, token) = parse_whitespace("  \treply").unwrap();
/// assert_eq!(token, Token::Whitespace("  \t".to_string()));
/// assert_eq!(rest, "reply");
/// ```
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace expected",
        map(take_while1(|c| c == ' ' || c == '\t'), |ws: &str| {
            Token::Whitespace(ws.to_string())
        }),
    )(input)
}

/// Parses `\n` or `\r\n`.
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_newline(input: &str) -> ParserResult<Token> {
    context(
        "newline expected",
        map(alt((tag("\r\n"), tag("\n"))), |_| Token::Newline),
    )(input)
}
