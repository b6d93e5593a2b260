//! Expression grammar, lowest precedence first:
//!
//! ```text
//! pipe           := or ( "|" filter )*
//! filter         := identifier ( ":" or )?
//! or             := and ( "or" and )*
//! and            := not ( "and" not )*
//! not            := "not" not | comparison
//! comparison     := additive ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" ) additive )*
//! additive       := multiplicative ( ( "+" | "-" ) multiplicative )*
//! multiplicative := unary ( ( "*" | "/" ) unary )*
//! unary          := "-" unary | primary
//! primary        := literal | call | variable | "(" pipe ")"
//! ```

use super::{
    super::{core::*, prelude::*},
    *,
};
use crate::ast;
use crate::tokenizer::{keyword::Keyword, symbol::Delimiter, symbol::Operator, token::Token};

pub fn parse_expression() -> impl Parser<Token, ast::Expression> {
    with_context(lazy(parse_pipe), "expression")
}

/// Parses `tokens` as exactly one expression.
pub fn parse_complete_expression(tokens: &[Token]) -> Result<ast::Expression, TokenParseError> {
    let (pos, expr) = parse_expression().parse(tokens, 0)?;
    if pos < tokens.len() {
        return Err(TokenParseError::Fail {
            message: format!("unexpected `{}` after expression", tokens[pos]),
            position: pos,
        });
    }
    Ok(expr)
}

fn parse_pipe() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_or(),
                many(preceded(parse_operator(Operator::Pipe), parse_filter())),
            ),
            |(expr, filters): (ast::Expression, Vec<ast::Filter>)| {
                if filters.is_empty() {
                    expr
                } else {
                    ast::Expression::Pipe {
                        expr: Box::new(expr),
                        filters,
                    }
                }
            },
        ),
        "pipe",
    )
}

fn parse_filter() -> impl Parser<Token, ast::Filter> {
    // One argument at most, so a piped call argument never swallows the next one.
    with_context(
        map(
            tuple2(
                parse_identifier(),
                optional(preceded(
                    parse_delimiter(Delimiter::Colon),
                    lazy(parse_logical_or),
                )),
            ),
            |(name, arg): (String, Option<ast::Expression>)| ast::Filter {
                name,
                args: arg.into_iter().collect(),
            },
        ),
        "filter",
    )
}

fn fold_binary(
    (first, rest): (ast::Expression, Vec<(ast::BinaryOperator, ast::Expression)>),
) -> ast::Expression {
    rest.into_iter()
        .fold(first, |left, (op, right)| ast::Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
}

fn parse_logical_or() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_and(),
                many(tuple2(
                    map(parse_keyword(Keyword::Or), |_| ast::BinaryOperator::Or),
                    parse_logical_and(),
                )),
            ),
            fold_binary,
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_logical_not(),
                many(tuple2(
                    map(parse_keyword(Keyword::And), |_| ast::BinaryOperator::And),
                    parse_logical_not(),
                )),
            ),
            fold_binary,
        ),
        "logical and",
    )
}

fn parse_logical_not() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                preceded(parse_keyword(Keyword::Not), lazy(parse_logical_not)),
                |operand: ast::Expression| ast::Expression::UnaryOp {
                    op: ast::UnaryOperator::Not,
                    operand: Box::new(operand),
                },
            )),
            Box::new(parse_comparison()),
        ]),
        "expression",
    )
}

fn parse_comparison() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_additive(),
                many(tuple2(parse_operator_comparison(), parse_additive())),
            ),
            fold_binary,
        ),
        "comparison",
    )
}

fn binary_operator(
    operator: Operator,
    op: ast::BinaryOperator,
) -> Box<dyn Parser<Token, ast::BinaryOperator>> {
    Box::new(map(parse_operator(operator), move |_| op))
}

fn parse_operator_comparison() -> impl Parser<Token, ast::BinaryOperator> {
    with_context(
        choice(vec![
            binary_operator(Operator::EqualEqual, ast::BinaryOperator::Equal),
            binary_operator(Operator::NotEqual, ast::BinaryOperator::NotEqual),
            binary_operator(Operator::GreaterEqual, ast::BinaryOperator::GreaterThanEqual),
            binary_operator(Operator::LessEqual, ast::BinaryOperator::LessThanEqual),
            binary_operator(Operator::Greater, ast::BinaryOperator::GreaterThan),
            binary_operator(Operator::Less, ast::BinaryOperator::LessThan),
        ]),
        "comparison operator",
    )
}

fn parse_additive() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_multiplicative(),
                many(tuple2(
                    choice(vec![
                        binary_operator(Operator::Plus, ast::BinaryOperator::Add),
                        binary_operator(Operator::Minus, ast::BinaryOperator::Subtract),
                    ]),
                    parse_multiplicative(),
                )),
            ),
            fold_binary,
        ),
        "additive",
    )
}

// 乗除算 (*, /)
fn parse_multiplicative() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_unary(),
                many(tuple2(
                    choice(vec![
                        binary_operator(Operator::Multiply, ast::BinaryOperator::Multiply),
                        binary_operator(Operator::Divide, ast::BinaryOperator::Divide),
                    ]),
                    parse_unary(),
                )),
            ),
            fold_binary,
        ),
        "multiplicative",
    )
}

fn parse_unary() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(map(
                preceded(parse_operator(Operator::Minus), lazy(parse_unary)),
                |operand: ast::Expression| ast::Expression::UnaryOp {
                    op: ast::UnaryOperator::Minus,
                    operand: Box::new(operand),
                },
            )),
            Box::new(parse_primary()),
        ]),
        "expression",
    )
}

fn parse_primary() -> impl Parser<Token, ast::Expression> {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), ast::Expression::Literal)),
            Box::new(parse_call()),
            Box::new(map(parse_identifier(), ast::Expression::Variable)),
            Box::new(delimited(
                parse_open_paren(),
                lazy(parse_expression),
                parse_close_paren(),
            )),
        ]),
        "expression",
    )
}

fn parse_call() -> impl Parser<Token, ast::Expression> {
    with_context(
        map(
            tuple2(
                parse_identifier(),
                delimited(
                    parse_open_paren(),
                    separated_list(lazy(parse_expression), parse_comma()),
                    parse_close_paren(),
                ),
            ),
            |(function, arguments): (String, Vec<ast::Expression>)| ast::Expression::Call {
                function,
                arguments,
            },
        ),
        "function call",
    )
}
