//! # Symbol Token Handling
//!
//! Operators and delimiters of the flow DSL.
//!
//! Symbols are matched longest-first so `>=` is never read as `>` followed by `=`.
//! Precedence is not the tokenizer's concern; see
//! [`parsers::expression`](crate::analyzer::parsers::expression).

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};
use strum::{AsRefStr, Display, EnumString};

use super::token::{ParserResult, Token};

/// Operators usable inside expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Operator {
    #[strum(serialize = "==")]
    EqualEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = "<=")]
    LessEqual,

    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,

    /// Filter pipe (`|`)
    #[strum(serialize = "|")]
    Pipe,
}

/// Structural punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Delimiter {
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    /// Separates call and filter arguments
    #[strum(serialize = ",")]
    Comma,
    /// Introduces filter arguments (`default:"x"`)
    #[strum(serialize = ":")]
    Colon,
    /// Assignment in `set`
    #[strum(serialize = "=")]
    Equal,
}

/// Parses an operator token, preferring two-character operators.
///
/// ```
/// # use flowchat::tokenizer::symbol::{parse_operator, Operator};
/// # use flowchat::tokenizer::token::Token;
/// let (rest, token) = parse_operator(">= 90").unwrap();
/// assert_eq!(token, Token::Operator(Operator::GreaterEqual));
/// assert_eq!(rest, " 90");
/// ```
#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(
            alt((
                value(Operator::EqualEqual, tag("==")),
                value(Operator::NotEqual, tag("!=")),
                value(Operator::GreaterEqual, tag(">=")),
                value(Operator::LessEqual, tag("<=")),
                value(Operator::Greater, tag(">")),
                value(Operator::Less, tag("<")),
                value(Operator::Plus, tag("+")),
                value(Operator::Minus, tag("-")),
                value(Operator::Multiply, tag("*")),
                value(Operator::Divide, tag("/")),
                value(Operator::Pipe, tag("|")),
            )),
            Token::Operator,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context(
        "delimiter",
        map(
            alt((
                value(Delimiter::OpenParen, tag("(")),
                value(Delimiter::CloseParen, tag(")")),
                value(Delimiter::Comma, tag(",")),
                value(Delimiter::Colon, tag(":")),
                value(Delimiter::Equal, tag("=")),
            )),
            Token::Delimiter,
        ),
    )(input)
}
