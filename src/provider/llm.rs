use async_trait::async_trait;

use super::types::ProviderResult;
use crate::api::{Message, Role};

/// The delegate consulted when a state falls through without a transition.
///
/// `Ok(None)` is a valid answer. The runtime bounds every call with its own timeout and
/// treats errors like `None`.
#[mockall::automock]
#[async_trait]
pub trait TransitionAdvisor: Send + Sync {
    async fn suggest_transition(
        &self,
        transcript: &[Message],
        candidates: &[String],
    ) -> ProviderResult<Option<String>>;

    fn name(&self) -> &str;
}

/// Most recent user message, or an empty string before the user said anything.
pub fn last_user_text(transcript: &[Message]) -> &str {
    transcript
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.text.as_str())
        .unwrap_or("")
}

/// Maps a free-form model answer onto one of `candidates`: exact match first, then a
/// candidate contained in the answer. Both ignore case.
pub fn match_candidate(answer: &str, candidates: &[String]) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }
    let lowered = answer.to_lowercase();

    candidates
        .iter()
        .find(|c| c.to_lowercase() == lowered)
        .or_else(|| candidates.iter().find(|c| lowered.contains(&c.to_lowercase())))
        .cloned()
}
