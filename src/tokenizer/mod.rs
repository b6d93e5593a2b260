//! # Tokenizer
//!
//! Turns flow source text into a stream of [`TokenSpan`](token::TokenSpan)s carrying
//! 1-based line and column positions. The tokenizer is built from small `nom` parsers,
//! one per token family, tried in a fixed order by [`Tokenizer::tokenize`](token::Tokenizer::tokenize):
//!
//! 1. whitespace, newlines and `#` comments
//! 2. literals (strings, numbers, `true`/`false`/`null`)
//! 3. words (identifiers, promoted to [`Keyword`](keyword::Keyword)s on exact match)
//! 4. operators and delimiters
//!
//! String literals copy `{{ ... }}` spans verbatim; the template compiler tokenizes
//! those spans again as expressions.

pub mod comment;
pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;
