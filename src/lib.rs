//! # flowchat: a chat interpreter for flow scripts
//!
//! Authors describe a conversation as a *flow*: named states holding ordered statements
//! (`reply`, `ask`, `set`, `if`, `goto`, `load`, `save`). The runtime executes one flow per
//! session, pausing on `ask` until the next user message arrives, and consults a language
//! model delegate when a state ends without choosing where to go.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Source → Tokenizer → Analyzer → FlowDocument → Runtime (Evaluator, Templates)
//! ```
//!
//! ### Stage 1: Tokenization
//!
//! The [`tokenizer`] module turns source text into keywords, identifiers, literals and
//! symbols with their line and column.
//!
//! ### Stage 2: Parsing
//!
//! The [`analyzer`] module builds the [`ast::FlowDocument`] with token-level parser
//! combinators. Templates are compiled here and every `goto` target is checked, so a
//! document that parses never jumps to a missing state.
//!
//! ### Stage 3: Evaluation
//!
//! The [`eval`] module evaluates expressions over dynamically typed values and renders
//! `{{ expr | filter }}` templates.
//!
//! ### Stage 4: Execution
//!
//! The [`runtime`] module owns sessions ([`session`]) and runs turns against the
//! persistence ([`storage`]) and delegate ([`provider`]) collaborators.

pub mod analyzer;
pub mod api;
pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod storage;
pub mod tokenizer;

// Re-exports
pub use analyzer::parse;
pub use api::*;
pub use ast::*;
pub use error::*;
pub use eval::{evaluate, render, Bindings, Template, Value};
pub use runtime::FlowRuntime;
pub use session::{SessionSnapshot, SessionStatus};

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}
