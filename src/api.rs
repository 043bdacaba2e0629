//! OpenAI-compatible API types

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical;
use crate::error::Result;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat completion request
///
/// The upstream signer hashes this body in canonical (sorted-key) form, so
/// it must be sent exactly as [`ChatRequest::canonical_json`] renders it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Non-streaming request, the only mode whose hashes can be checked
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Exact request text to send and later hash
    pub fn canonical_json(&self) -> Result<String> {
        canonical::to_canonical_json(self)
    }
}

/// Chat completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub created: Option<u64>,
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Value>,
}

impl ChatResponse {
    /// Text of the first choice, empty when the model returned none
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    pub content: Option<String>,
}

/// One chunk of a streamed chat completion
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    pub id: String,
    pub created: Option<u64>,
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Some servers attach usage to the final chunk
    pub usage: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

/// Token usage in the field order the upstream server emits it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub total_tokens: u64,
    pub completion_tokens: u64,
    pub prompt_tokens_details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_canonical_json() {
        let request = ChatRequest::new(
            "phala/deepseek-chat-v3-0324",
            vec![ChatMessage::user("What is 2+2?")],
        );
        assert_eq!(
            request.canonical_json().unwrap(),
            r#"{"messages":[{"content":"What is 2+2?","role":"user"}],"model":"phala/deepseek-chat-v3-0324","stream":false}"#
        );
    }

    #[test]
    fn test_request_optional_fields() {
        let request = ChatRequest::new("m", vec![ChatMessage::system("be brief")])
            .with_max_tokens(64)
            .with_temperature(0.5);
        assert_eq!(
            request.canonical_json().unwrap(),
            r#"{"max_tokens":64,"messages":[{"content":"be brief","role":"system"}],"model":"m","stream":false,"temperature":0.5}"#
        );
    }

    #[test]
    fn test_request_temperature_keeps_decimal_digits() {
        let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]).with_temperature(0.7);
        assert_eq!(
            request.canonical_json().unwrap(),
            r#"{"messages":[{"content":"hi","role":"user"}],"model":"m","stream":false,"temperature":0.7}"#
        );
    }

    #[test]
    fn test_response_content() {
        let body = r#"{"id":"c1","object":"chat.completion","created":1,"model":"m",
            "choices":[{"index":0,"message":{"role":"assistant","content":"4"},"finish_reason":"stop"}]}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.content(), "4");
        assert!(response.usage.is_none());
    }

    #[test]
    fn test_usage_field_order() {
        let usage = Usage::default();
        assert_eq!(
            serde_json::to_string(&usage).unwrap(),
            r#"{"prompt_tokens":0,"total_tokens":0,"completion_tokens":0,"prompt_tokens_details":null}"#
        );
    }
}
