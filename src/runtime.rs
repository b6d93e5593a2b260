//! Session runtime: runs turns of the flow state machine.
//!
//! A turn starts at `start` or `send` and runs statements until the session waits on an
//! `ask`, reaches a terminal state, or faults. `goto` and fallthrough jumps inside one turn
//! are bounded by `max_hops`.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analyzer::parse;
use crate::api::{FlowSource, Message, Role, SendResponse, StartRequest, StartResponse};
use crate::ast::{FlowDocument, State, Statement, ENTRY_STATE, FALLBACK_STATE};
use crate::config::RuntimeConfig;
use crate::error::{FlowResult, ParseError, RuntimeError, RuntimeResult};
use crate::eval::expression::evaluate;
use crate::provider::{build_advisor, ProviderError, TransitionAdvisor};
use crate::session::{Cursor, SessionContext, SessionId, SessionSnapshot, SessionStatus};
use crate::storage::{FlowStore, InMemoryStore, LocalJsonStore};

/// What the turn loop does after a statement.
enum Step {
    Continue,
    Suspend,
    Jump(String),
}

pub struct FlowRuntime {
    config: RuntimeConfig,
    store: Arc<dyn FlowStore>,
    advisor: Option<Arc<dyn TransitionAdvisor>>,
    /// Parsed documents keyed by source text, shared by every session of that script.
    documents: DashMap<String, Arc<FlowDocument>>,
    sessions: DashMap<SessionId, Arc<Mutex<SessionContext>>>,
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default(), Arc::new(InMemoryStore::new()))
    }
}

impl FlowRuntime {
    pub fn new(config: RuntimeConfig, store: Arc<dyn FlowStore>) -> Self {
        Self {
            config,
            store,
            advisor: None,
            documents: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// JSON file store under `storage.base_dir`, plus the advisor named by `llm`.
    pub fn from_config(config: RuntimeConfig) -> Self {
        let store = Arc::new(LocalJsonStore::new(&config.storage.base_dir));
        let advisor = config.llm.as_ref().map(build_advisor);
        let mut runtime = Self::new(config, store);
        runtime.advisor = advisor;
        runtime
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn TransitionAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Parses `source` once; later calls with the same text share the document.
    pub fn document(&self, source: &str) -> Result<Arc<FlowDocument>, ParseError> {
        if let Some(document) = self.documents.get(source) {
            return Ok(document.value().clone());
        }
        let document = Arc::new(parse(source)?);
        Ok(self
            .documents
            .entry(source.to_string())
            .or_insert(document)
            .value()
            .clone())
    }

    pub async fn start(&self, request: StartRequest) -> FlowResult<StartResponse> {
        let source = match request.flow {
            FlowSource::Source(source) => source,
            FlowSource::Path(path) => tokio::fs::read_to_string(&path).await?,
        };
        self.start_source(&source, request.use_llm).await
    }

    /// Creates a session and runs its first turn. Parse errors create no session.
    #[tracing::instrument(level = "debug", skip(self, source))]
    pub async fn start_source(&self, source: &str, use_llm: bool) -> FlowResult<StartResponse> {
        let document = self.document(source)?;
        let entry = document
            .state_index(ENTRY_STATE)
            .ok_or_else(|| ParseError::new(1, 1, format!("flow `{}` has no `start` state", document.name)))?;

        let session_id = Uuid::new_v4().to_string();
        let mut context = SessionContext::new(session_id.clone(), document, entry, use_llm);
        let messages = self.run_turn(&mut context, None).await;
        info!(
            session = %session_id,
            flow = %context.document.name,
            status = %context.status,
            "session started"
        );

        self.sessions
            .insert(session_id.clone(), Arc::new(Mutex::new(context)));
        Ok(StartResponse {
            session_id,
            messages,
        })
    }

    /// Delivers a user message to a session waiting on an `ask`. Returns only the
    /// assistant messages this turn produced.
    #[tracing::instrument(level = "debug", skip(self, text))]
    pub async fn send(&self, session_id: &str, text: impl Into<String>) -> RuntimeResult<SendResponse> {
        let session = self.session(session_id)?;
        let mut context = session.lock().await;
        if context.status != SessionStatus::AwaitingInput {
            return Err(RuntimeError::UnexpectedInput {
                status: context.status,
            });
        }
        let messages = self.run_turn(&mut context, Some(text.into())).await;
        Ok(SendResponse { messages })
    }

    pub async fn inspect(&self, session_id: &str) -> RuntimeResult<SessionSnapshot> {
        let session = self.session(session_id)?;
        let context = session.lock().await;
        Ok(context.snapshot())
    }

    pub fn close(&self, session_id: &str) -> RuntimeResult<()> {
        self.sessions
            .remove(session_id)
            .map(|_| info!(session = %session_id, "session closed"))
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    /// Drops terminated and faulted sessions, then every cached document no session
    /// uses anymore. Finished sessions stay inspectable until this runs or they are
    /// closed. Returns the number of sessions removed.
    pub fn prune_finished(&self) -> usize {
        let before = self.sessions.len();
        // a session whose lock is held is mid-turn, so it is not finished
        self.sessions.retain(|_, session| {
            session
                .try_lock()
                .map_or(true, |context| !context.status.is_finished())
        });
        self.documents
            .retain(|_, document| Arc::strong_count(document) > 1);
        let removed = before - self.sessions.len();
        if removed > 0 {
            info!(removed, remaining = self.sessions.len(), "pruned finished sessions");
        }
        removed
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    fn session(&self, session_id: &str) -> RuntimeResult<Arc<Mutex<SessionContext>>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RuntimeError::SessionNotFound(session_id.to_string()))
    }

    async fn run_turn(&self, context: &mut SessionContext, input: Option<String>) -> Vec<Message> {
        let before = context.transcript.len();

        if let Some(text) = input {
            if let Some(var) = context.pending_ask.take() {
                debug!(var = %var, "binding input");
                context.bindings.insert(var, text.clone().into());
            }
            context.transcript.push(Message::user(text));
        }

        context.status = SessionStatus::Running;
        let mut hops = 0;
        context.status = match self.execute(context, &mut hops).await {
            Ok(status) => status,
            Err(e) => {
                error!(
                    session = %context.id,
                    state = %context.current_state(),
                    error = %e,
                    "session faulted"
                );
                context.pending_ask = None;
                context.transcript.push(Message::assistant(diagnostic(&e)));
                SessionStatus::Faulted
            }
        };
        context.updated_at = Utc::now();

        context.transcript[before..]
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .cloned()
            .collect()
    }

    /// Runs statements until the turn ends. A statement that fails recoverably is
    /// skipped after a diagnostic; session-fatal errors escape.
    async fn execute(&self, context: &mut SessionContext, hops: &mut usize) -> RuntimeResult<SessionStatus> {
        let document = Arc::clone(&context.document);

        loop {
            let block = context.cursor.block(&document).unwrap_or(&[]);
            let statement = context.cursor.advance().and_then(|index| block.get(index));

            let step = match statement {
                Some(statement) => match self.execute_statement(context, statement).await {
                    Ok(step) => step,
                    Err(e) if !e.is_session_fatal() => {
                        self.recover(context, e);
                        Step::Continue
                    }
                    Err(e) => return Err(e),
                },
                None if context.cursor.leave() => continue,
                None => match self.fall_through(context).await? {
                    Some(target) => Step::Jump(target),
                    None => {
                        info!(session = %context.id, state = %context.current_state(), "session terminated");
                        return Ok(SessionStatus::Terminated);
                    }
                },
            };

            match step {
                Step::Continue => {}
                Step::Suspend => return Ok(SessionStatus::AwaitingInput),
                Step::Jump(target) => self.jump(context, &target, hops)?,
            }
        }
    }

    async fn execute_statement(
        &self,
        context: &mut SessionContext,
        statement: &Statement,
    ) -> RuntimeResult<Step> {
        debug!(state = %context.current_state(), kind = statement.kind(), "execute");

        let step = match statement {
            Statement::Comment(_) => Step::Continue,
            Statement::Reply(template) => {
                let text = template.render(&context.bindings)?;
                context.transcript.push(Message::assistant(text));
                Step::Continue
            }
            Statement::Ask { var, prompt } => {
                // the session waits for input even when the prompt fails
                match prompt.render(&context.bindings) {
                    Ok(text) => context.transcript.push(Message::assistant(text)),
                    Err(e) => self.recover(context, e),
                }
                context.pending_ask = Some(var.clone());
                Step::Suspend
            }
            Statement::Set { var, value } => {
                let value = evaluate(value, &context.bindings)?;
                context.bindings.insert(var.clone(), value);
                Step::Continue
            }
            Statement::Load { path, var } => {
                match self.store.load(path, var).await? {
                    Some(value) => context.bindings.insert(var.clone(), value),
                    None => context.bindings.remove(var),
                };
                Step::Continue
            }
            Statement::Save { var, path } => {
                let value = context.bindings.get(var).cloned().unwrap_or_default();
                self.store.save(path, var, &value).await?;
                Step::Continue
            }
            Statement::If {
                condition, elifs, else_block, ..
            } => {
                let conditions =
                    std::iter::once(condition).chain(elifs.iter().map(|elif| &elif.condition));
                for (branch, condition) in conditions.enumerate() {
                    // a failing condition skips the whole conditional
                    if evaluate(condition, &context.bindings)?.is_truthy() {
                        context.cursor.enter(branch);
                        return Ok(Step::Continue);
                    }
                }
                if else_block.is_some() {
                    context.cursor.enter(elifs.len() + 1);
                }
                Step::Continue
            }
            Statement::Goto(target) => Step::Jump(target.clone()),
        };
        Ok(step)
    }

    fn jump(&self, context: &mut SessionContext, target: &str, hops: &mut usize) -> RuntimeResult<()> {
        *hops += 1;
        if *hops > self.config.max_hops {
            return Err(RuntimeError::GotoLoopDetected {
                hops: *hops,
                state: target.to_string(),
            });
        }
        let index = context
            .document
            .state_index(target)
            .ok_or_else(|| RuntimeError::StalledNoFallback {
                state: context.current_state().to_string(),
            })?;
        debug!(from = %context.current_state(), to = %target, hops = *hops, "goto");
        context.cursor = Cursor::at(index);
        Ok(())
    }

    /// Next state after running off the end of the current one. `None` ends the session.
    async fn fall_through(&self, context: &SessionContext) -> RuntimeResult<Option<String>> {
        let terminal = context
            .document
            .states
            .get(context.cursor.state)
            .map_or(true, State::is_terminal);
        if terminal {
            return Ok(None);
        }

        if let Some(target) = self.consult_advisor(context).await {
            return Ok(Some(target));
        }
        if context.document.has_state(FALLBACK_STATE) {
            debug!(state = %context.current_state(), "falling back");
            return Ok(Some(FALLBACK_STATE.to_string()));
        }
        Err(RuntimeError::StalledNoFallback {
            state: context.current_state().to_string(),
        })
    }

    /// Asks the delegate for a state. Timeouts, errors and unknown names are "no
    /// suggestion".
    async fn consult_advisor(&self, context: &SessionContext) -> Option<String> {
        if !context.use_llm {
            return None;
        }
        let advisor = self.advisor.as_ref()?;

        let current = context.current_state();
        let candidates: Vec<String> = context
            .document
            .goto_targets()
            .iter()
            .filter(|name| name.as_str() != current)
            .cloned()
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let timeout_ms = self.config.llm_timeout.as_millis() as u64;
        let call = advisor.suggest_transition(&context.transcript, &candidates);
        let outcome = tokio::time::timeout(self.config.llm_timeout, call)
            .await
            .unwrap_or(Err(ProviderError::Timeout(timeout_ms)));
        match outcome {
            Ok(Some(suggestion)) if context.document.has_state(&suggestion) => {
                info!(advisor = advisor.name(), from = %current, to = %suggestion, "advisor transition");
                Some(suggestion)
            }
            Ok(Some(suggestion)) => {
                warn!(advisor = advisor.name(), suggestion = %suggestion, "advisor suggested an unknown state");
                None
            }
            Ok(None) => {
                debug!(advisor = advisor.name(), "advisor has no suggestion");
                None
            }
            Err(e) => {
                warn!(advisor = advisor.name(), error = %e, "advisor failed");
                None
            }
        }
    }

    fn recover(&self, context: &mut SessionContext, e: RuntimeError) {
        warn!(session = %context.id, state = %context.current_state(), error = %e, "statement failed");
        context.transcript.push(Message::assistant(diagnostic(&e)));
    }
}

/// The assistant message shown for a runtime error.
pub fn diagnostic(e: &RuntimeError) -> String {
    format!("[error] {}", e)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYCLE: &str = r#"
flow cycle
state start
  reply "ping"
  goto other
state other
  goto start
"#;

    #[tokio::test]
    async fn test_goto_cycle_is_bounded() {
        let runtime = FlowRuntime::default();
        let response = runtime.start_source(CYCLE, false).await.unwrap();

        // start, then one "ping" per visit of `start`
        let pings = response.messages.iter().filter(|m| m.text == "ping").count();
        assert_eq!(pings, 17);
        assert!(response.messages.last().unwrap().text.contains("Goto loop detected"));

        let snapshot = runtime.inspect(&response.session_id).await.unwrap();
        assert_eq!(snapshot.status, SessionStatus::Faulted);
        assert!(matches!(
            runtime.send(&response.session_id, "hi").await,
            Err(RuntimeError::UnexpectedInput {
                status: SessionStatus::Faulted
            })
        ));
    }

    #[tokio::test]
    async fn test_documents_are_shared() {
        let runtime = FlowRuntime::default();
        let a = runtime.document(CYCLE).unwrap();
        let b = runtime.document(CYCLE).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_prune_finished_sessions() {
        let runtime = FlowRuntime::default();
        let faulted = runtime.start_source(CYCLE, false).await.unwrap();
        let waiting = runtime
            .start_source("flow w\nstate start\n  ask x \"x?\"\n  goto start\n", false)
            .await
            .unwrap();
        assert_eq!(runtime.session_count(), 2);
        assert_eq!(runtime.document_count(), 2);

        assert_eq!(runtime.prune_finished(), 1);
        assert_eq!(runtime.session_count(), 1);
        assert_eq!(runtime.document_count(), 1);
        assert!(runtime.inspect(&waiting.session_id).await.is_ok());
        assert_eq!(
            runtime.inspect(&faulted.session_id).await.unwrap_err(),
            RuntimeError::SessionNotFound(faulted.session_id.clone())
        );
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let runtime = FlowRuntime::default();
        assert_eq!(
            runtime.send("nope", "hi").await.unwrap_err(),
            RuntimeError::SessionNotFound("nope".to_string())
        );
        assert!(runtime.close("nope").is_err());
    }
}
