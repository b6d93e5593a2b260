use async_trait::async_trait;
use tracing::debug;

use crate::{
    api::Message,
    provider::{
        llm::{last_user_text, TransitionAdvisor},
        types::ProviderResult,
    },
};

/// Offline advisor: picks the first candidate whose name appears in the last user
/// message, or that contains the whole message.
pub struct KeywordAdvisor {
    name: String,
}

impl KeywordAdvisor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for KeywordAdvisor {
    fn default() -> Self {
        Self::new("keyword")
    }
}

#[async_trait]
impl TransitionAdvisor for KeywordAdvisor {
    async fn suggest_transition(
        &self,
        transcript: &[Message],
        candidates: &[String],
    ) -> ProviderResult<Option<String>> {
        let text = last_user_text(transcript).trim().to_lowercase();
        if text.is_empty() {
            return Ok(None);
        }

        let suggestion = candidates
            .iter()
            .find(|c| {
                let candidate = c.to_lowercase();
                text.contains(&candidate) || candidate.contains(&text)
            })
            .cloned();
        debug!(text = %text, ?suggestion, "keyword match");
        Ok(suggestion)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_matches_state_name_in_user_text() {
        let advisor = KeywordAdvisor::default();
        let candidates = vec!["balance".to_string(), "topup".to_string()];

        let transcript = vec![Message::assistant("hi"), Message::user("please TOPUP 100")];
        assert_eq!(
            advisor
                .suggest_transition(&transcript, &candidates)
                .await
                .unwrap(),
            Some("topup".to_string())
        );

        let transcript = vec![Message::user("bal")];
        assert_eq!(
            advisor
                .suggest_transition(&transcript, &candidates)
                .await
                .unwrap(),
            Some("balance".to_string())
        );
    }

    #[tokio::test]
    async fn test_no_user_text_means_no_suggestion() {
        let advisor = KeywordAdvisor::default();
        let candidates = vec!["balance".to_string()];
        assert_eq!(
            advisor
                .suggest_transition(&[Message::assistant("hi")], &candidates)
                .await
                .unwrap(),
            None
        );
    }
}
