//! Transition advisors: the delegate asked for a next state when a flow falls through.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AdvisorKind, LlmConfig};

pub mod llm;
pub mod llms;
pub mod types;

pub use llm::TransitionAdvisor;
pub use types::{ProviderError, ProviderResult};

/// Builds the advisor named by `config`. An OpenAI advisor without an API key degrades
/// to keyword matching so flows still run offline.
pub fn build_advisor(config: &LlmConfig) -> Arc<dyn TransitionAdvisor> {
    match config.provider {
        AdvisorKind::Keyword => Arc::new(llms::KeywordAdvisor::default()),
        AdvisorKind::OpenAiChat => match llms::OpenAiChatAdvisor::from_env(config) {
            Ok(advisor) => {
                info!(model = %config.model, api_base = %config.api_base, "using chat completion advisor");
                Arc::new(advisor)
            }
            Err(e) => {
                warn!(error = %e, "falling back to keyword advisor");
                Arc::new(llms::KeywordAdvisor::default())
            }
        },
    }
}
