//! Per-conversation state owned by the runtime between turns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::Message;
use crate::ast::{FlowDocument, Statement};
use crate::eval::expression::Bindings;

pub type SessionId = String;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Document parsed, entry state not executed yet.
    Starting,
    Running,
    /// Halted on an `ask`; the next message binds its variable.
    AwaitingInput,
    Terminated,
    Faulted,
}

impl SessionStatus {
    /// No further turn can run in this session.
    pub fn is_finished(self) -> bool {
        matches!(self, SessionStatus::Terminated | SessionStatus::Faulted)
    }
}

/// One open block. The root frame walks the state's own statements; every other frame
/// walks branch `branch` of the conditional at `statement` in the enclosing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub origin: Option<(usize, usize)>,
    /// Index of the next statement to run.
    pub next: usize,
}

/// Execution position: a state plus a stack of frames, so an `ask` inside an `if`
/// resumes inside that block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub state: usize,
    pub frames: Vec<Frame>,
}

impl Cursor {
    pub fn at(state: usize) -> Self {
        Self {
            state,
            frames: vec![Frame {
                origin: None,
                next: 0,
            }],
        }
    }

    /// Statements walked by the innermost frame.
    pub fn block<'d>(&self, document: &'d FlowDocument) -> Option<&'d [Statement]> {
        let mut block = document.states.get(self.state)?.statements.as_slice();
        for frame in self.frames.iter().skip(1) {
            let (statement, branch) = frame.origin?;
            block = block.get(statement)?.branch(branch)?;
        }
        Some(block)
    }

    /// Opens branch `branch` of the conditional that was just consumed.
    pub fn enter(&mut self, branch: usize) {
        if let Some(top) = self.frames.last() {
            let statement = top.next.saturating_sub(1);
            self.frames.push(Frame {
                origin: Some((statement, branch)),
                next: 0,
            });
        }
    }

    /// Claims the next statement index of the innermost frame.
    pub fn advance(&mut self) -> Option<usize> {
        let top = self.frames.last_mut()?;
        let index = top.next;
        top.next += 1;
        Some(index)
    }

    /// Closes the innermost block. Returns false at the state's root.
    pub fn leave(&mut self) -> bool {
        if self.frames.len() > 1 {
            self.frames.pop();
            true
        } else {
            false
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: SessionId,
    pub document: Arc<FlowDocument>,
    pub status: SessionStatus,
    pub cursor: Cursor,
    pub pending_ask: Option<String>,
    pub bindings: Bindings,
    pub transcript: Vec<Message>,
    pub use_llm: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    /// New session positioned at the document's entry state.
    pub fn new(id: SessionId, document: Arc<FlowDocument>, entry: usize, use_llm: bool) -> Self {
        let now = Utc::now();
        Self {
            id,
            document,
            status: SessionStatus::Starting,
            cursor: Cursor::at(entry),
            pending_ask: None,
            bindings: Bindings::new(),
            transcript: Vec::new(),
            use_llm,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_state(&self) -> &str {
        self.document
            .states
            .get(self.cursor.state)
            .map(|state| state.name.as_str())
            .unwrap_or("")
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            flow: self.document.name.clone(),
            status: self.status,
            current_state: self.current_state().to_string(),
            pending_ask: self.pending_ask.clone(),
            bindings: self
                .bindings
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
            transcript: self.transcript.clone(),
            use_llm: self.use_llm,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only copy of a session for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub flow: String,
    pub status: SessionStatus,
    pub current_state: String,
    pub pending_ask: Option<String>,
    pub bindings: std::collections::BTreeMap<String, serde_json::Value>,
    pub transcript: Vec<Message>,
    pub use_llm: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse;

    const NESTED: &str = r#"
flow nested
state start
  if true
    reply "a"
    if true
      ask name "who?"
      reply "b"
    end
  end
  reply "c"
"#;

    #[test]
    fn test_cursor_walks_nested_blocks() {
        let document = parse(NESTED).unwrap();
        let mut cursor = Cursor::at(0);

        assert_eq!(cursor.block(&document).map(|b| b.len()), Some(2));
        assert_eq!(cursor.advance(), Some(0));
        cursor.enter(0);
        assert_eq!(cursor.block(&document).map(|b| b.len()), Some(2));
        assert_eq!(cursor.advance(), Some(0));
        assert_eq!(cursor.advance(), Some(1));
        cursor.enter(0);
        assert_eq!(cursor.depth(), 3);
        let block = cursor.block(&document).unwrap();
        assert!(matches!(&block[0], Statement::Ask { var, .. } if var == "name"));

        assert!(cursor.leave());
        assert!(cursor.leave());
        assert!(!cursor.leave());
        assert_eq!(cursor.advance(), Some(1));
    }

    #[test]
    fn test_snapshot() {
        let document = Arc::new(parse(NESTED).unwrap());
        let mut context = SessionContext::new("s1".to_string(), document, 0, false);
        context
            .bindings
            .insert("balance".to_string(), crate::eval::value::Value::Number(50.0));

        let snapshot = context.snapshot();
        assert_eq!(snapshot.flow, "nested");
        assert_eq!(snapshot.status, SessionStatus::Starting);
        assert_eq!(snapshot.current_state, "start");
        assert_eq!(snapshot.bindings["balance"], serde_json::json!(50));
        assert_eq!(SessionStatus::AwaitingInput.to_string(), "AWAITING_INPUT");
    }
}
