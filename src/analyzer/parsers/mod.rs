pub mod common;
pub use common::*;

pub mod expression;
pub mod flow;
pub mod statement;

use super::core::TokenParseError;
use crate::tokenizer::token::Token;

/// Human readable message for a combinator failure over `tokens`.
///
/// The innermost context names what was expected; the token at the failure position
/// is what was found.
pub fn describe(err: &TokenParseError, tokens: &[Token]) -> String {
    let mut expected = None;
    let mut current = err;
    while let TokenParseError::WithContext { message, inner } = current {
        expected = Some(message.as_str());
        current = inner;
    }

    match current {
        TokenParseError::Fail { message, .. } => message.clone(),
        other => {
            let expected = expected.unwrap_or("token");
            match tokens.get(other.position()) {
                Some(found) => format!("expected {}, found `{}`", expected, found),
                None => format!("expected {}, found end of line", expected),
            }
        }
    }
}
