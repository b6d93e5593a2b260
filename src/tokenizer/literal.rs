use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, digit1, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize, value, verify},
    error::context,
    multi::fold_many0,
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

enum Fragment<'a> {
    Text(&'a str),
    Escaped(char),
}

/// `{{ ... }}` spans are kept verbatim so placeholders may carry their own quotes.
#[tracing::instrument(level = "debug", skip(input))]
fn parse_placeholder_span(input: &str) -> ParserResult<&str> {
    context(
        "template placeholder",
        recognize(tuple((
            tag("{{"),
            verify(take_until("}}"), |inner: &str| !inner.contains('\n')),
            tag("}}"),
        ))),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_escape(input: &str) -> ParserResult<char> {
    context(
        "escape sequence",
        preceded(
            char('\\'),
            alt((
                value('"', char('"')),
                value('\\', char('\\')),
                value('\n', char('n')),
                value('\t', char('t')),
            )),
        ),
    )(input)
}

fn parse_fragment(input: &str) -> ParserResult<Fragment<'_>> {
    alt((
        map(parse_placeholder_span, Fragment::Text),
        map(parse_escape, Fragment::Escaped),
        map(
            take_while1(|c| c != '"' && c != '\\' && c != '{' && c != '\n' && c != '\r'),
            Fragment::Text,
        ),
        // a brace that does not open a placeholder
        map(tag("{"), Fragment::Text),
    ))(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_string_literal(input: &str) -> ParserResult<Literal> {
    context(
        "string literal",
        map(
            delimited(
                char('"'),
                fold_many0(parse_fragment, String::new, |mut acc, fragment| {
                    match fragment {
                        Fragment::Text(text) => acc.push_str(text),
                        Fragment::Escaped(c) => acc.push(c),
                    }
                    acc
                }),
                char('"'),
            ),
            Literal::String,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_number_literal(input: &str) -> ParserResult<Literal> {
    context(
        "number literal",
        map_res(
            recognize(pair(digit1, opt(pair(char('.'), digit1)))),
            |s: &str| s.parse::<f64>().map(Literal::Number),
        ),
    )(input)
}

fn word_end(input: &str) -> ParserResult<()> {
    not(peek(satisfy(|c: char| c.is_alphanumeric() || c == '_')))(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_keyword_literal(input: &str) -> ParserResult<Literal> {
    context(
        "keyword literal",
        terminated(
            alt((
                value(Literal::Boolean(true), tag("true")),
                value(Literal::Boolean(false), tag("false")),
                value(Literal::Null, tag("null")),
            )),
            word_end,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_literal(input: &str) -> ParserResult<Token> {
    context(
        "literal",
        map(
            alt((
                parse_string_literal,
                parse_number_literal,
                parse_keyword_literal,
            )),
            Token::Literal,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_string() {
        let (rest, result) = parse_string_literal("\"hello world\"").unwrap();
        assert_eq!(rest, "");
        assert_eq!(result, Literal::String("hello world".to_string()));
    }

    #[test]
    fn test_string_with_escapes() {
        let (_, result) = parse_string_literal(r#""say \"hi\"\n""#).unwrap();
        assert_eq!(result, Literal::String("say \"hi\"\n".to_string()));
    }

    #[test]
    fn test_placeholder_keeps_inner_quotes() {
        let input = r#""您好 {{ name | default:"游客" }}!" rest"#;
        let (rest, result) = parse_string_literal(input).unwrap();
        assert_eq!(rest, " rest");
        assert_eq!(
            result,
            Literal::String(r#"您好 {{ name | default:"游客" }}!"#.to_string())
        );
    }

    #[test]
    fn test_lone_brace() {
        let (_, result) = parse_string_literal("\"a { b\"").unwrap();
        assert_eq!(result, Literal::String("a { b".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(parse_string_literal("\"open").is_err());
        assert!(parse_string_literal("\"open\nclose\"").is_err());
    }

    #[test]
    fn test_numbers() {
        let (rest, result) = parse_number_literal("12.5)").unwrap();
        assert_eq!(result, Literal::Number(12.5));
        assert_eq!(rest, ")");

        let (_, result) = parse_number_literal("100").unwrap();
        assert_eq!(result, Literal::Number(100.0));
    }

    #[test]
    fn test_keyword_literals() {
        assert_eq!(
            parse_literal("true").unwrap().1,
            Token::Literal(Literal::Boolean(true))
        );
        assert_eq!(
            parse_literal("null ").unwrap().1,
            Token::Literal(Literal::Null)
        );
        // prefix of an identifier is not a literal
        assert!(parse_literal("nullable").is_err());
        assert!(parse_literal("trueish").is_err());
    }
}
