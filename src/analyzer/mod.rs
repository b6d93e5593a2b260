//! # Analyzer
//!
//! Token-level parser combinators and the flow grammar built from them.
//!
//! * [`core`]: the [`Parser`] trait and the combinator error type
//! * [`combinators`] / [`prelude`]: reusable combinators and their constructor functions
//! * [`parsers`]: expression, statement and document parsers

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseResult;
pub use core::Parser;
pub use core::TokenParseError;

use crate::ast::FlowDocument;
use crate::error::ParseError;

/// Parses flow source text. Parsing the same text twice yields equal documents.
pub fn parse(source: &str) -> Result<FlowDocument, ParseError> {
    parsers::flow::parse_flow(source)
}
