//! # Keyword Token Handling
//!
//! Reserved words of the flow DSL. Keywords are recognised by the word lexer in
//! [`token`](super::token): a whole word is read first and then looked up here, so
//! `states` or `endpoint` stay ordinary identifiers.
//!
//! * **Structure**: `flow`, `state`
//! * **Statements**: `reply`, `ask`, `set`, `load`/`from`, `save`/`to`, `goto`
//! * **Control flow**: `if`, `elif`, `else`, `end`
//! * **Logic**: `and`, `or`, `not`

/// Represents the keywords recognized by the flow DSL.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    /// Names the flow document.
    Flow,
    /// Opens a named state.
    State,
    /// Renders a template and sends it to the user.
    Reply,
    /// Sends a prompt and waits for the next user message.
    Ask,
    /// Rebinds a variable.
    Set,
    /// Reads a persisted scalar.
    Load,
    From,
    /// Writes a persisted scalar.
    Save,
    To,
    If,
    Elif,
    Else,
    /// Closes a block-form conditional.
    End,
    /// Transfers control to another state.
    Goto,
    And,
    Or,
    Not,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    // every keyword must round-trip through its display form
    #[test]
    fn test_all_keywords() {
        for keyword in Keyword::iter() {
            let parsed = Keyword::from_str(keyword.as_ref()).unwrap();
            assert_eq!(parsed, keyword);
        }
    }

    #[test]
    fn test_case_sensitive() {
        assert!(Keyword::from_str("Goto").is_err());
        assert_eq!(Keyword::from_str("elif").unwrap(), Keyword::Elif);
    }
}
