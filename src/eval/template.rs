//! `{{ expr | filter:arg }}` templates.
//!
//! A template is compiled once into text and placeholder segments. Placeholders use the
//! expression grammar, so a pipe chain is just the lowest-precedence expression form.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use super::expression::{evaluate, Bindings};
use crate::analyzer::parsers::describe;
use crate::analyzer::parsers::expression::parse_complete_expression;
use crate::ast::Expression;
use crate::error::{RuntimeError, RuntimeResult};
use crate::tokenizer::token::{Token, Tokenizer};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Placeholder(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub source: String,
    pub segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> RuntimeResult<Self> {
        let mut segments = Vec::new();
        let mut last = 0;

        for captures in PLACEHOLDER.captures_iter(source) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder(parse_placeholder(inner.as_str())?));
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Renders every placeholder against `bindings`. Unbound variables render empty.
    pub fn render(&self, bindings: &Bindings) -> RuntimeResult<String> {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(expr) => out.push_str(&evaluate(expr, bindings)?.render()),
            }
        }
        trace!(template = %self.source, rendered = %out, "render");
        Ok(out)
    }

    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Text(_)))
    }
}

/// Compiles and renders `text` in one go.
pub fn render(text: &str, bindings: &Bindings) -> RuntimeResult<String> {
    Template::parse(text)?.render(bindings)
}

fn parse_placeholder(inner: &str) -> RuntimeResult<Expression> {
    let invalid = |message: String| RuntimeError::InvalidTemplate(format!("`{{{{{}}}}}`: {}", inner, message));

    let tokens: Vec<Token> = Tokenizer::new()
        .tokenize(inner)
        .map_err(|e| invalid(e.to_string()))?
        .into_iter()
        .map(|span| span.token)
        .filter(|token| !token.is_trivia() && *token != Token::Newline)
        .collect();

    if tokens.is_empty() {
        return Err(invalid("empty placeholder".to_string()));
    }
    parse_complete_expression(&tokens).map_err(|e| invalid(describe(&e, &tokens)))
}
