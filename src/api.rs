//! Request and response shapes at the service boundary.

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Where the flow script comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSource {
    Source(String),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub flow: FlowSource,
    #[serde(default)]
    pub use_llm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResponse {
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shapes() {
        let request: StartRequest = serde_json::from_value(json!({
            "flow": { "path": "data/carrier.flow" },
            "use_llm": true
        }))
        .unwrap();
        assert_eq!(request.flow, FlowSource::Path("data/carrier.flow".to_string()));
        assert!(request.use_llm);

        let response = SendResponse {
            messages: vec![Message::assistant("您好")],
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "messages": [{ "role": "assistant", "text": "您好" }] })
        );
    }

    #[test]
    fn test_use_llm_defaults_to_false() {
        let request: StartRequest =
            serde_json::from_value(json!({ "flow": { "source": "flow x" } })).unwrap();
        assert!(!request.use_llm);
    }
}
