use super::{
    super::{core::*, prelude::*},
    expression::*,
    *,
};
use crate::ast;
use crate::tokenizer::{keyword::Keyword, symbol::Delimiter, token::Token};

/// One logical source line after tokenization. Block structure (`if`/`elif`/`else`/`end`)
/// is assembled from these by the flow parser.
#[derive(Debug, Clone, PartialEq)]
pub enum LineItem {
    Flow(String),
    State(String),
    Reply(String),
    Ask { var: String, prompt: String },
    Set { var: String, value: ast::Expression },
    Load { var: String, path: String },
    Save { var: String, path: String },
    Goto(String),
    /// `if <expr>` opens a block; `if <expr> goto <state>` is a complete clause.
    If {
        condition: ast::Expression,
        goto: Option<String>,
    },
    Elif {
        condition: ast::Expression,
        goto: Option<String>,
    },
    Else {
        goto: Option<String>,
    },
    End,
}

impl LineItem {
    /// Target named by this line, if it jumps.
    pub fn goto_target(&self) -> Option<&str> {
        match self {
            LineItem::Goto(target) => Some(target),
            LineItem::If { goto, .. } | LineItem::Elif { goto, .. } | LineItem::Else { goto } => {
                goto.as_deref()
            }
            _ => None,
        }
    }
}

/// Parses a whole line; trailing tokens are an error.
pub fn parse_line(tokens: &[Token]) -> Result<LineItem, TokenParseError> {
    let (pos, item) = parse_line_item().parse(tokens, 0)?;
    if pos < tokens.len() {
        return Err(TokenParseError::Fail {
            message: format!("unexpected `{}` at end of statement", tokens[pos]),
            position: pos,
        });
    }
    Ok(item)
}

pub fn parse_line_item() -> impl Parser<Token, LineItem> {
    with_context(
        choice(vec![
            Box::new(parse_flow_header()),
            Box::new(parse_state_header()),
            Box::new(parse_reply_statement()),
            Box::new(parse_ask_statement()),
            Box::new(parse_set_statement()),
            Box::new(parse_load_statement()),
            Box::new(parse_save_statement()),
            Box::new(parse_goto_statement()),
            Box::new(parse_if_clause()),
            Box::new(parse_elif_clause()),
            Box::new(parse_else_clause()),
            Box::new(parse_end()),
        ]),
        "statement",
    )
}

fn parse_flow_header() -> impl Parser<Token, LineItem> {
    map(
        preceded(parse_keyword(Keyword::Flow), parse_name()),
        LineItem::Flow,
    )
}

fn parse_state_header() -> impl Parser<Token, LineItem> {
    map(
        preceded(parse_keyword(Keyword::State), parse_name()),
        LineItem::State,
    )
}

fn parse_reply_statement() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(parse_keyword(Keyword::Reply), parse_string()),
            LineItem::Reply,
        ),
        "reply statement",
    )
}

fn parse_ask_statement() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Ask),
                tuple2(parse_identifier(), parse_string()),
            ),
            |(var, prompt): (String, String)| LineItem::Ask { var, prompt },
        ),
        "ask statement",
    )
}

fn parse_set_statement() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Set),
                tuple3(
                    parse_identifier(),
                    parse_delimiter(Delimiter::Equal),
                    parse_expression(),
                ),
            ),
            |(var, _, value): (String, (), ast::Expression)| LineItem::Set { var, value },
        ),
        "set statement",
    )
}

fn parse_load_statement() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Load),
                tuple2(
                    parse_identifier(),
                    preceded(parse_keyword(Keyword::From), parse_string()),
                ),
            ),
            |(var, path): (String, String)| LineItem::Load { var, path },
        ),
        "load statement",
    )
}

fn parse_save_statement() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Save),
                tuple2(
                    parse_identifier(),
                    preceded(parse_keyword(Keyword::To), parse_string()),
                ),
            ),
            |(var, path): (String, String)| LineItem::Save { var, path },
        ),
        "save statement",
    )
}

fn parse_goto_target() -> impl Parser<Token, String> {
    preceded(parse_keyword(Keyword::Goto), parse_name())
}

fn parse_goto_statement() -> impl Parser<Token, LineItem> {
    with_context(map(parse_goto_target(), LineItem::Goto), "goto statement")
}

fn parse_if_clause() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::If),
                tuple2(parse_expression(), optional(parse_goto_target())),
            ),
            |(condition, goto): (ast::Expression, Option<String>)| LineItem::If { condition, goto },
        ),
        "if statement",
    )
}

fn parse_elif_clause() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(
                parse_keyword(Keyword::Elif),
                tuple2(parse_expression(), optional(parse_goto_target())),
            ),
            |(condition, goto): (ast::Expression, Option<String>)| LineItem::Elif {
                condition,
                goto,
            },
        ),
        "elif clause",
    )
}

fn parse_else_clause() -> impl Parser<Token, LineItem> {
    with_context(
        map(
            preceded(parse_keyword(Keyword::Else), optional(parse_goto_target())),
            |goto: Option<String>| LineItem::Else { goto },
        ),
        "else clause",
    )
}

fn parse_end() -> impl Parser<Token, LineItem> {
    map(parse_keyword(Keyword::End), |_| LineItem::End)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::value::Value;
    use crate::tokenizer::token::Tokenizer;

    fn tokens(source: &str) -> Vec<Token> {
        Tokenizer::new()
            .tokenize(source)
            .unwrap()
            .into_iter()
            .map(|span| span.token)
            .filter(|token| !token.is_trivia())
            .collect()
    }

    #[test]
    fn test_simple_statements() {
        assert_eq!(
            parse_line(&tokens("state end")).unwrap(),
            LineItem::State("end".to_string())
        );
        assert_eq!(
            parse_line(&tokens(r#"ask query "您需要什么帮助？""#)).unwrap(),
            LineItem::Ask {
                var: "query".to_string(),
                prompt: "您需要什么帮助？".to_string(),
            }
        );
        assert_eq!(
            parse_line(&tokens(r#"load balance from "data/account.json""#)).unwrap(),
            LineItem::Load {
                var: "balance".to_string(),
                path: "data/account.json".to_string(),
            }
        );
        assert_eq!(
            parse_line(&tokens("set n = 1")).unwrap(),
            LineItem::Set {
                var: "n".to_string(),
                value: ast::Expression::Literal(Value::Number(1.0)),
            }
        );
    }

    #[test]
    fn test_inline_and_block_if() {
        let inline = parse_line(&tokens(r#"if contains(query, "余额") goto balance"#)).unwrap();
        assert_eq!(inline.goto_target(), Some("balance"));

        let block = parse_line(&tokens("if total >= 90")).unwrap();
        assert!(matches!(block, LineItem::If { goto: None, .. }));

        assert_eq!(
            parse_line(&tokens("else goto end")).unwrap(),
            LineItem::Else {
                goto: Some("end".to_string())
            }
        );
        assert_eq!(parse_line(&tokens("end")).unwrap(), LineItem::End);
    }

    #[test]
    fn test_errors_point_at_offending_token() {
        let err = parse_line(&tokens("set = 1")).unwrap_err();
        assert_eq!(err.position(), 1);

        let err = parse_line(&tokens("goto a b")).unwrap_err();
        assert_eq!(err.position(), 2);

        let err = parse_line(&tokens("if x goto")).unwrap_err();
        assert_eq!(err.position(), 3);

        let err = parse_line(&tokens("frobnicate")).unwrap_err();
        assert_eq!(err.root(), &TokenParseError::NoAlternative { position: 0 });
    }
}
