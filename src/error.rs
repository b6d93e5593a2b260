use thiserror::Error;

use crate::session::SessionStatus;
use crate::storage::StorageError;

/// Malformed flow source or an unresolved `goto` target. Positions are 1-based.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Undefined function: {name}/{arity}")]
    UndefinedFunction { name: String, arity: usize },
    #[error("Undefined filter: {name}/{arity}")]
    UndefinedFilter { name: String, arity: usize },
    #[error("Goto loop detected: {hops} hops without waiting for input (at state `{state}`)")]
    GotoLoopDetected { hops: usize, state: String },
    #[error("Stalled in state `{state}`: no transition and no fallback state")]
    StalledNoFallback { state: String },
    #[error("Type error: {0}")]
    EvalTypeError(String),
    #[error("Unexpected input: session is {status}")]
    UnexpectedInput { status: SessionStatus },
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),
}

impl RuntimeError {
    /// State-machine failures end the session; everything raised by a single
    /// statement is recoverable.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            RuntimeError::GotoLoopDetected { .. } | RuntimeError::StalledNoFallback { .. }
        )
    }

    pub fn type_error<S: Into<String>>(message: S) -> Self {
        RuntimeError::EvalTypeError(message.into())
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        FlowError::Config(message.into())
    }
}
