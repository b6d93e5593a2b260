use super::super::{core::*, prelude::*};
use crate::eval::value::Value;
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

// 基本的なパーサー
pub fn parse_identifier() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            _ => None,
        }),
        "identifier",
    )
}

/// State names may be reserved words (`state end`, `goto end`).
pub fn parse_name() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            Token::Keyword(kw) => Some(kw.to_string()),
            _ => None,
        }),
        "name",
    )
}

pub fn parse_literal() -> impl Parser<Token, Value> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Literal(Literal::String(s)) => Some(Value::String(s.clone())),
            Token::Literal(Literal::Number(n)) => Some(Value::Number(*n)),
            Token::Literal(Literal::Boolean(b)) => Some(Value::Bool(*b)),
            Token::Literal(Literal::Null) => Some(Value::Null),
            _ => None,
        }),
        "literal",
    )
}

pub fn parse_string() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Literal(Literal::String(s)) => Some(s.clone()),
            _ => None,
        }),
        "string literal",
    )
}

pub fn parse_keyword(keyword: Keyword) -> impl Parser<Token, ()> {
    exact(Token::Keyword(keyword), format!("`{}`", keyword))
}

pub fn parse_operator(operator: Operator) -> impl Parser<Token, ()> {
    exact(Token::Operator(operator), format!("`{}`", operator))
}

// 区切り文字パーサー
pub fn parse_delimiter(delimiter: Delimiter) -> impl Parser<Token, ()> {
    exact(Token::Delimiter(delimiter), format!("`{}`", delimiter))
}

pub fn parse_comma() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::Comma)
}

pub fn parse_open_paren() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::OpenParen)
}

pub fn parse_close_paren() -> impl Parser<Token, ()> {
    parse_delimiter(Delimiter::CloseParen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_accepts_keywords() {
        let input = vec![Token::Keyword(Keyword::End)];
        assert_eq!(parse_name().parse(&input, 0), Ok((1, "end".to_string())));
        assert!(parse_identifier().parse(&input, 0).is_err());
    }

    #[test]
    fn test_literal_values() {
        let input = vec![
            Token::Literal(Literal::Number(3.0)),
            Token::Literal(Literal::String("x".to_string())),
        ];
        assert_eq!(parse_literal().parse(&input, 0), Ok((1, Value::Number(3.0))));
        assert_eq!(
            parse_literal().parse(&input, 1),
            Ok((2, Value::String("x".to_string())))
        );
    }
}
