pub mod keyword;
pub mod openai_chat;

pub use keyword::KeywordAdvisor;
pub use openai_chat::OpenAiChatAdvisor;
