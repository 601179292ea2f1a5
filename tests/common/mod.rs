//! Shared test doubles

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use screenwright::agent::{Agent, LogContext, PromptKind};
use screenwright::core::{Result, ScreenwrightError, WireStyle};
use screenwright::decode::Dialect;
use screenwright::llm::{ModelTransport, RawResponse};

/// One scripted answer
pub enum Reply {
    Text(String),
    Body(String),
    Down,
}

/// Transport that answers from a script and records every payload
pub struct ScriptedTransport {
    name: String,
    replies: Mutex<VecDeque<Reply>>,
    pub requests: Mutex<Vec<Vec<Value>>>,
}

impl ScriptedTransport {
    pub fn new(name: &str, replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn texts(name: &str, texts: &[&str]) -> Arc<Self> {
        Self::new(name, texts.iter().map(|t| Reply::Text(t.to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<Value> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn send(&self, messages: &[Value], _timeout: Duration) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Text(text)) => Ok(RawResponse::ok(
                json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] })
                    .to_string(),
            )),
            Some(Reply::Body(body)) => Ok(RawResponse::new(500, body)),
            Some(Reply::Down) | None => Err(ScreenwrightError::transport("scripted outage")),
        }
    }

    fn style(&self) -> WireStyle {
        WireStyle::OpenAi
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn agent(name: &str, transport: Arc<ScriptedTransport>, prompt: PromptKind, dialect: Dialect, log: &LogContext) -> Agent {
    Agent::new(name, transport, prompt, dialect, 3, log.clone())
}
