//! Model transport trait
//!
//! Abstracts one round trip to a model endpoint so that agents can be driven
//! by a real HTTP client or by a scripted fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::{Result, WireStyle};
use crate::llm::message::{ContentItem, Message, Role};

/// Raw HTTP answer. Non-2xx answers are returned as-is; only network-level
/// failures become errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 response with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for model transports
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Send already-serialized messages and return the raw answer
    async fn send(&self, messages: &[Value], timeout: Duration) -> Result<RawResponse>;

    /// Wire dialect spoken by this endpoint
    fn style(&self) -> WireStyle;

    /// Model name, for logs
    fn name(&self) -> &str;

    /// Extract the assistant message, or `None` if the answer has an
    /// unexpected shape
    fn access(&self, response: &RawResponse) -> Option<Message> {
        access_message(self.style(), response)
    }
}

#[derive(Deserialize)]
struct OpenAiBody {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicBody {
    role: String,
    content: Vec<AnthropicText>,
}

#[derive(Deserialize)]
struct AnthropicText {
    text: String,
}

/// Accessor table keyed by wire dialect
pub fn access_message(style: WireStyle, response: &RawResponse) -> Option<Message> {
    let parsed = match style {
        WireStyle::OpenAi => serde_json::from_str::<OpenAiBody>(&response.body)
            .ok()
            .and_then(|body| body.choices.into_iter().next())
            .map(|choice| (choice.message.role, choice.message.content)),
        WireStyle::Anthropic => serde_json::from_str::<AnthropicBody>(&response.body)
            .ok()
            .and_then(|body| {
                let role = body.role;
                body.content.into_iter().next().map(|part| (role, part.text))
            }),
    };

    match parsed {
        Some((role, text)) => {
            let role = Role::parse(&role)?;
            Some(Message::new(role, vec![ContentItem::text(text)]))
        }
        None => {
            debug!(
                status = response.status,
                body = %truncate(&response.body, 500),
                "Unexpected response shape"
            );
            None
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
