use thiserror::Error;

/// A parser over a slice of already tokenized input.
///
/// `pos` is the index of the next unconsumed item; on success the parser returns the
/// index just past what it consumed.
pub trait Parser<I, O> {
    fn parse(&self, input: &[I], pos: usize) -> ParseResult<O>;
}

pub type ParseResult<O> = Result<(usize, O), TokenParseError>;

/// Combinator-level failure. Positions are indices into the token slice; the flow
/// parser maps them back to source lines and columns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenParseError {
    #[error("unexpected token")]
    Unexpected { position: usize },
    #[error("unexpected end of line")]
    EOF { position: usize },
    #[error("no alternative matched")]
    NoAlternative { position: usize },
    #[error("{message}")]
    Fail { message: String, position: usize },
    #[error("{message}: {inner}")]
    WithContext {
        message: String,
        inner: Box<TokenParseError>,
    },
}

impl TokenParseError {
    /// Index of the offending token.
    pub fn position(&self) -> usize {
        match self {
            TokenParseError::Unexpected { position }
            | TokenParseError::EOF { position }
            | TokenParseError::NoAlternative { position }
            | TokenParseError::Fail { position, .. } => *position,
            TokenParseError::WithContext { inner, .. } => inner.position(),
        }
    }

    /// The innermost error, stripped of context wrappers.
    pub fn root(&self) -> &TokenParseError {
        match self {
            TokenParseError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }
}
