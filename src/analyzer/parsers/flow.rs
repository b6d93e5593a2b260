//! Assembles a [`FlowDocument`] from logical lines.
//!
//! Each source line is parsed on its own by [`parse_line`]; this module supplies the
//! structure the line grammar cannot see: the `flow` header, state boundaries, the
//! `if`/`elif`/`else`/`end` chain, and document-wide validation.

use std::collections::HashMap;

use tracing::debug;

use super::{
    describe,
    statement::{parse_line, LineItem},
};
use crate::ast::{ConditionalBlock, FlowDocument, State, Statement, ENTRY_STATE};
use crate::error::ParseError;
use crate::eval::template::Template;
use crate::tokenizer::token::{Token, TokenSpan, Tokenizer, TokenizerError};

#[derive(Debug, Default)]
struct SourceLine {
    number: usize,
    tokens: Vec<Token>,
    spans: Vec<TokenSpan>,
    comment: Option<String>,
}

impl SourceLine {
    fn is_blank(&self) -> bool {
        self.spans.is_empty() && self.comment.is_none()
    }
}

#[derive(Debug)]
enum LineKind {
    Comment(String),
    Item(LineItem),
}

#[derive(Debug)]
struct ParsedLine {
    source: SourceLine,
    kind: LineKind,
}

/// Parses flow source text into a validated document.
#[tracing::instrument(level = "debug", skip(source))]
pub fn parse_flow(source: &str) -> Result<FlowDocument, ParseError> {
    let spans = Tokenizer::new().tokenize(source).map_err(|e| match e {
        TokenizerError::ParseError { message, span, .. } => {
            ParseError::new(span.line, span.column, message)
        }
    })?;

    let mut parser = FlowParser {
        source,
        lines: Vec::new(),
        pos: 0,
        gotos: Vec::new(),
    };
    for line in split_lines(spans) {
        let parsed = parser.parse_source_line(line)?;
        parser.lines.push(parsed);
    }

    let document = parser.build()?;
    debug!(
        flow = %document.name,
        states = document.states.len(),
        "parsed flow"
    );
    Ok(document)
}

fn split_lines(spans: Vec<TokenSpan>) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut current = SourceLine::default();

    for span in spans {
        match &span.token {
            Token::Newline => {
                let line = std::mem::take(&mut current);
                if !line.is_blank() {
                    lines.push(line);
                }
            }
            Token::Whitespace(_) => {}
            Token::Comment(text) => {
                // trailing comments on a code line are dropped
                if current.spans.is_empty() {
                    current.number = span.line;
                    current.comment = Some(text.clone());
                }
            }
            _ => {
                if current.spans.is_empty() {
                    current.number = span.line;
                }
                current.tokens.push(span.token.clone());
                current.spans.push(span);
            }
        }
    }
    if !current.is_blank() {
        lines.push(current);
    }

    lines
}

struct FlowParser<'a> {
    source: &'a str,
    lines: Vec<ParsedLine>,
    pos: usize,
    /// Every goto target with the position of its name, in source order.
    gotos: Vec<(String, usize, usize)>,
}

impl<'a> FlowParser<'a> {
    fn parse_source_line(&self, line: SourceLine) -> Result<ParsedLine, ParseError> {
        if line.spans.is_empty() {
            let comment = line.comment.clone().unwrap_or_default();
            return Ok(ParsedLine {
                source: line,
                kind: LineKind::Comment(comment),
            });
        }

        match parse_line(&line.tokens) {
            Ok(item) => Ok(ParsedLine {
                source: line,
                kind: LineKind::Item(item),
            }),
            Err(e) => Err(self.error_at(&line, e.position(), describe(&e, &line.tokens))),
        }
    }

    /// Error located at token `index` of `line`; an index past the last token points
    /// just after it.
    fn error_at(&self, line: &SourceLine, index: usize, message: impl Into<String>) -> ParseError {
        match line.spans.get(index) {
            Some(span) => ParseError::new(span.line, span.column, message),
            None => match line.spans.last() {
                Some(last) => {
                    let width = self
                        .source
                        .get(last.start..last.end)
                        .map_or(1, |text| text.chars().count());
                    ParseError::new(last.line, last.column + width, message)
                }
                None => ParseError::new(line.number, 1, message),
            },
        }
    }

    fn error_at_line(&self, idx: usize, index: usize, message: impl Into<String>) -> ParseError {
        self.error_at(&self.lines[idx].source, index, message)
    }

    fn last_token(&self, idx: usize) -> usize {
        self.lines[idx].source.spans.len().saturating_sub(1)
    }

    fn item(&self, idx: usize) -> Option<&LineItem> {
        match self.lines.get(idx).map(|line| &line.kind) {
            Some(LineKind::Item(item)) => Some(item),
            _ => None,
        }
    }

    fn record_goto(&mut self, idx: usize, target: &str) {
        let last = self.last_token(idx);
        let span = &self.lines[idx].source.spans[last];
        self.gotos.push((target.to_string(), span.line, span.column));
    }

    fn build(mut self) -> Result<FlowDocument, ParseError> {
        let mut name: Option<(String, usize)> = None;
        let mut states: Vec<State> = Vec::new();
        let mut declared: HashMap<String, usize> = HashMap::new();

        while self.pos < self.lines.len() {
            let idx = self.pos;
            match self.item(idx).cloned() {
                None => self.pos += 1,
                Some(LineItem::Flow(flow_name)) => {
                    if name.is_some() || !states.is_empty() {
                        return Err(self.error_at_line(idx, 0, "duplicate `flow` header"));
                    }
                    name = Some((flow_name, idx));
                    self.pos += 1;
                }
                Some(LineItem::State(state_name)) => {
                    if name.is_none() {
                        return Err(self.error_at_line(
                            idx,
                            0,
                            "expected `flow` header before the first state",
                        ));
                    }
                    if declared.contains_key(&state_name) {
                        return Err(self.error_at_line(
                            idx,
                            1,
                            format!("duplicate state `{}`", state_name),
                        ));
                    }
                    declared.insert(state_name.clone(), idx);
                    self.pos += 1;
                    let statements = self.parse_block(None)?;
                    states.push(State {
                        name: state_name,
                        statements,
                    });
                }
                Some(_) => {
                    let message = if name.is_none() {
                        "expected `flow` header"
                    } else {
                        "statement outside of a state"
                    };
                    return Err(self.error_at_line(idx, 0, message));
                }
            }
        }

        let (name, header_idx) = name.ok_or_else(|| ParseError::new(1, 1, "missing `flow` header"))?;

        if !declared.contains_key(ENTRY_STATE) {
            return Err(self.error_at_line(
                header_idx,
                0,
                format!("flow `{}` has no `{}` state", name, ENTRY_STATE),
            ));
        }

        for (target, line, column) in &self.gotos {
            if !declared.contains_key(target) {
                return Err(ParseError::new(
                    *line,
                    *column,
                    format!("goto target `{}` is not a declared state", target),
                ));
            }
        }

        Ok(FlowDocument::new(name, states))
    }

    /// Statements up to the next state (top level) or the next clause keyword
    /// (inside a conditional opened at line `opened_at`).
    fn parse_block(&mut self, opened_at: Option<usize>) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();

        loop {
            let idx = self.pos;
            let Some(line) = self.lines.get(idx) else {
                return match opened_at {
                    Some(if_idx) => Err(self.unterminated(if_idx)),
                    None => Ok(statements),
                };
            };

            let item = match &line.kind {
                LineKind::Comment(text) => {
                    statements.push(Statement::Comment(text.clone()));
                    self.pos += 1;
                    continue;
                }
                LineKind::Item(item) => item.clone(),
            };

            match item {
                LineItem::State(_) | LineItem::Flow(_) => {
                    return match opened_at {
                        Some(if_idx) => Err(self.unterminated(if_idx)),
                        None => Ok(statements),
                    };
                }
                LineItem::Elif { .. } | LineItem::Else { .. } | LineItem::End => {
                    return match opened_at {
                        Some(_) => Ok(statements),
                        None => Err(self.error_at_line(idx, 0, "no matching `if`")),
                    };
                }
                LineItem::If { .. } => {
                    let statement = self.parse_conditional(opened_at.is_some())?;
                    statements.push(statement);
                }
                _ => {
                    let statement = self.simple_statement(idx, item)?;
                    statements.push(statement);
                    self.pos += 1;
                }
            }
        }
    }

    fn unterminated(&self, if_idx: usize) -> ParseError {
        self.error_at_line(if_idx, 0, "`if` block is missing its `end`")
    }

    /// `nested` is set inside an enclosing block clause, where a trailing `end` belongs
    /// to the enclosing conditional.
    fn parse_conditional(&mut self, nested: bool) -> Result<Statement, ParseError> {
        let if_idx = self.pos;
        let (condition, goto) = match self.item(if_idx) {
            Some(LineItem::If { condition, goto }) => (condition.clone(), goto.clone()),
            _ => return Err(self.error_at_line(if_idx, 0, "expected `if`")),
        };
        self.pos += 1;

        let mut last_inline = goto.is_some();
        let then_block = self.clause_body(if_idx, goto)?;
        let mut elifs = Vec::new();
        let mut else_block = None;

        loop {
            let next = if last_inline {
                self.next_clause()
            } else {
                Some(self.pos)
            };
            let Some(idx) = next else { break };

            match self.item(idx).cloned() {
                Some(LineItem::Elif { condition, goto }) => {
                    self.pos = idx + 1;
                    last_inline = goto.is_some();
                    let block = self.clause_body(idx, goto)?;
                    elifs.push(ConditionalBlock { condition, block });
                }
                Some(LineItem::Else { goto }) => {
                    self.pos = idx + 1;
                    last_inline = goto.is_some();
                    else_block = Some(self.clause_body(idx, goto)?);
                    if !last_inline {
                        self.expect_end(idx)?;
                    }
                    break;
                }
                Some(LineItem::End) if !last_inline => {
                    self.pos = idx + 1;
                    break;
                }
                _ if last_inline => break,
                _ => return Err(self.unterminated(if_idx)),
            }
        }

        // redundant `end` after an inline final clause
        if last_inline && !nested && matches!(self.item(self.pos), Some(LineItem::End)) {
            self.pos += 1;
        }

        Ok(Statement::If {
            condition,
            then_block,
            elifs,
            else_block,
        })
    }

    /// After an inline clause, the chain continues only if the next non-comment line
    /// is `elif` or `else`. Comments between clauses are dropped.
    fn next_clause(&mut self) -> Option<usize> {
        let mut idx = self.pos;
        while let Some(line) = self.lines.get(idx) {
            match &line.kind {
                LineKind::Comment(_) => idx += 1,
                LineKind::Item(LineItem::Elif { .. } | LineItem::Else { .. }) => {
                    self.pos = idx;
                    return Some(idx);
                }
                _ => return None,
            }
        }
        None
    }

    fn clause_body(
        &mut self,
        clause_idx: usize,
        goto: Option<String>,
    ) -> Result<Vec<Statement>, ParseError> {
        match goto {
            Some(target) => {
                self.record_goto(clause_idx, &target);
                Ok(vec![Statement::Goto(target)])
            }
            None => self.parse_block(Some(clause_idx)),
        }
    }

    fn expect_end(&mut self, else_idx: usize) -> Result<(), ParseError> {
        let idx = self.pos;
        match self.item(idx) {
            Some(LineItem::End) => {
                self.pos += 1;
                Ok(())
            }
            Some(LineItem::Elif { .. }) => Err(self.error_at_line(idx, 0, "`elif` after `else`")),
            Some(LineItem::Else { .. }) => Err(self.error_at_line(idx, 0, "duplicate `else`")),
            _ => Err(self.unterminated(else_idx)),
        }
    }

    fn simple_statement(&mut self, idx: usize, item: LineItem) -> Result<Statement, ParseError> {
        let statement = match item {
            LineItem::Reply(text) => Statement::Reply(self.compile_template(idx, &text)?),
            LineItem::Ask { var, prompt } => Statement::Ask {
                var,
                prompt: self.compile_template(idx, &prompt)?,
            },
            LineItem::Set { var, value } => Statement::Set { var, value },
            LineItem::Load { var, path } => Statement::Load { path, var },
            LineItem::Save { var, path } => Statement::Save { var, path },
            LineItem::Goto(target) => {
                self.record_goto(idx, &target);
                Statement::Goto(target)
            }
            _ => return Err(self.error_at_line(idx, 0, "expected statement")),
        };
        Ok(statement)
    }

    /// Templates are the last token of `reply` and `ask` lines.
    fn compile_template(&self, idx: usize, text: &str) -> Result<Template, ParseError> {
        Template::parse(text).map_err(|e| self.error_at_line(idx, self.last_token(idx), e.to_string()))
    }
}
