use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    },
    Client,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::{
    api::Message,
    config::LlmConfig,
    provider::{
        llm::{last_user_text, match_candidate, TransitionAdvisor},
        types::{ProviderError, ProviderResult},
    },
};

const SYSTEM_PROMPT: &str = "You are an intent classifier for a chat flow. \
Given the user's message and a list of candidate state names, answer with the single \
candidate that fits best. Output the state name only, without explanation.";

/// Asks an OpenAI compatible chat completion endpoint to pick a state.
pub struct OpenAiChatAdvisor {
    client: Client<OpenAIConfig>,
    name: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatAdvisor {
    pub fn new(name: impl Into<String>, config: &LlmConfig, api_key: &SecretString) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(config.api_base.clone());

        Self {
            client: Client::with_config(openai_config),
            name: name.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    /// Reads the API key from `config.api_key_env`.
    pub fn from_env(config: &LlmConfig) -> ProviderResult<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| {
                ProviderError::Authentication(format!("{} is not set", config.api_key_env))
            })?;
        Ok(Self::new("openai_chat", config, &api_key))
    }

    fn build_request(&self, user_text: &str, candidates: &[String]) -> CreateChatCompletionRequest {
        let prompt = format!(
            "Candidate states: {}\nUser message: {}\nBest matching state name:",
            candidates.join(", "),
            user_text
        );

        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(SYSTEM_PROMPT.to_string()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(prompt),
                name: None,
            }),
        ];

        CreateChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransitionAdvisor for OpenAiChatAdvisor {
    #[tracing::instrument(skip(self, transcript))]
    async fn suggest_transition(
        &self,
        transcript: &[Message],
        candidates: &[String],
    ) -> ProviderResult<Option<String>> {
        if candidates.is_empty() {
            return Ok(None);
        }
        let request = self.build_request(last_user_text(transcript), candidates);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ProviderError::ApiError(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ProviderError::ApiError("No response content".into()))?;
        debug!(answer = %content, "advisor answered");

        Ok(match_candidate(&content, candidates))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
