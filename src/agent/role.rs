//! Role agent
//!
//! One model role: owns its conversation, turns observations into user turns,
//! calls the transport and decodes the reply.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::agent::conversation::Conversation;
use crate::agent::log::LogContext;
use crate::agent::prompt::{self, PromptKind};
use crate::core::{ObsKey, ObsPayload, Observation, Result, ScreenwrightError, StepDescriptor, TaskSpec};
use crate::decode::{self, Action, DecodeContext, Dialect};
use crate::llm::{ContentItem, Message, ModelTransport, Redaction};

/// A model role taking part in a community
pub struct Agent {
    name: String,
    transport: Arc<dyn ModelTransport>,
    conversation: Conversation,
    prompt: PromptKind,
    dialect: Dialect,
    hide_text: bool,
    log: LogContext,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn ModelTransport>,
        prompt: PromptKind,
        dialect: Dialect,
        context_window: usize,
        log: LogContext,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            conversation: Conversation::new(context_window),
            prompt,
            dialect,
            hide_text: false,
            log,
        }
    }

    /// Redact text slots when dumping history
    pub fn hide_text(mut self, hide: bool) -> Self {
        self.hide_text = hide;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    pub fn transport(&self) -> &Arc<dyn ModelTransport> {
        &self.transport
    }

    /// Seed the conversation with the system turn for `task`
    pub fn seed(&mut self, task: &TaskSpec, keys: &[ObsKey]) {
        let text = prompt::system_prompt(self.prompt, task, keys);
        debug!(role = %self.name, chars = text.len(), "Seeding conversation");
        self.conversation.seed(Message::system(text));
    }

    /// Build the user turn for `obs`. On the first step of a task `init`
    /// carries the task, and the conversation is seeded from the observed
    /// modalities.
    pub fn step_content(&mut self, obs: &Observation, init: Option<&TaskSpec>) -> Vec<ContentItem> {
        if let Some(task) = init {
            let keys: Vec<ObsKey> = obs.keys().collect();
            self.seed(task, &keys);
        }
        observation_content(obs)
    }

    /// Send `content` as the next user turn. The exchange is only recorded
    /// once a usable reply came back.
    pub async fn call(&mut self, content: Vec<ContentItem>, timeout: Duration) -> Result<Message> {
        let user = Message::user(content);
        let style = self.transport.style();
        let payload: Vec<Value> = self
            .conversation
            .with_pending(&user)
            .into_iter()
            .map(|m| m.to_wire(style, Redaction::NONE, false))
            .collect();

        let response = self.transport.send(&payload, timeout).await?;
        let mut reply = match self.transport.access(&response) {
            Some(reply) if reply.text().is_some() => reply,
            _ => {
                warn!(role = %self.name, status = response.status, "No usable message in response");
                return Err(ScreenwrightError::no_response(&self.name));
            }
        };
        reply.context_window = Some(self.conversation.window());

        self.conversation.push(user, reply.clone());
        Ok(reply)
    }

    /// Decode reply text with this role's dialect
    pub fn decode(&self, text: &str, ctx: &DecodeContext) -> Vec<Action> {
        decode::decode(self.dialect, text, ctx)
    }

    /// Record `text` under this role's name
    pub fn record(&self, step: StepDescriptor, text: &str) {
        self.log.record(step, &self.name, text);
    }

    /// Wire form of the whole history for audit logs
    pub fn dump_history(&self, redact: bool) -> Vec<Value> {
        let redaction = if redact {
            Redaction {
                text: self.hide_text,
                image: true,
            }
        } else {
            Redaction::NONE
        };
        self.conversation
            .wire(self.transport.style(), redaction, true)
    }
}

/// User content for an observation: text modalities as filled slots,
/// images inline, in key order
pub fn observation_content(obs: &Observation) -> Vec<ContentItem> {
    obs.iter()
        .map(|(key, payload)| match payload {
            ObsPayload::Image(image) => ContentItem::image(image.clone()),
            ObsPayload::Text(text) => {
                let slot = key.to_string();
                ContentItem::template(format!("{{{}}}", slot), [(slot, text.clone())])
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Capability, ImageData, WireStyle};
    use crate::llm::RawResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo {
        replies: Mutex<Vec<String>>,
        sent: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl ModelTransport for Echo {
        async fn send(&self, messages: &[Value], _timeout: Duration) -> Result<RawResponse> {
            self.sent.lock().unwrap().push(messages.len());
            let body = self.replies.lock().unwrap().remove(0);
            Ok(RawResponse::ok(body))
        }

        fn style(&self) -> WireStyle {
            WireStyle::OpenAi
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn reply(text: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": text } }]
        })
        .to_string()
    }

    fn agent(replies: Vec<String>) -> (Agent, Arc<Echo>) {
        let echo = Arc::new(Echo {
            replies: Mutex::new(replies),
            sent: Mutex::new(Vec::new()),
        });
        let agent = Agent::new(
            "actor",
            echo.clone(),
            PromptKind::Actor { reasoning: false },
            Dialect::Fenced,
            3,
            LogContext::new(),
        );
        (agent, echo)
    }

    #[tokio::test]
    async fn test_first_step_seeds_system_turn() {
        let (mut agent, echo) = agent(vec![reply("```DONE```")]);
        let obs = Observation::new().with(ObsKey::Screenshot, ObsPayload::Image(ImageData::from_png(vec![1])));
        let task = TaskSpec::new("click OK", Capability::vm("ChimeraX"));

        let content = agent.step_content(&obs, Some(&task));
        let message = agent.call(content, Duration::from_secs(1)).await.unwrap();

        assert_eq!(message.text(), Some("```DONE```"));
        assert_eq!(message.context_window, Some(3));
        assert_eq!(echo.sent.lock().unwrap().as_slice(), &[2]);
        assert_eq!(agent.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_shape_is_no_response_and_keeps_history() {
        let (mut agent, _) = agent(vec!["{\"unexpected\": true}".to_string()]);
        let err = agent
            .call(vec![ContentItem::text("hi")], Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, ScreenwrightError::NoResponse { .. }));
        assert!(agent.conversation().is_empty());
    }

    #[test]
    fn test_text_observations_become_slots() {
        let obs = Observation::new().with(ObsKey::A11yTree, ObsPayload::Text("<tree/>".into()));
        let content = observation_content(&obs);
        let wire = Message::user(content.clone()).to_wire(WireStyle::OpenAi, Redaction::NONE, false);
        assert_eq!(wire["content"][0]["text"], "<tree/>");

        let redacted = Message::user(content).to_wire(WireStyle::OpenAi, Redaction::ALL, false);
        assert_eq!(redacted["content"][0]["text"], crate::llm::PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_dump_history_redacts_images() {
        let (mut agent, _) = agent(vec![reply("ok")]);
        let obs = Observation::new().with(ObsKey::Screenshot, ObsPayload::Image(ImageData::from_png(vec![9, 9])));
        let content = agent.step_content(&obs, None);
        agent.call(content, Duration::from_secs(1)).await.unwrap();

        let dump = agent.dump_history(true);
        assert_eq!(dump[0]["content"][0]["image_url"]["url"], crate::llm::PLACEHOLDER);
        assert_eq!(dump[1]["context_window"], 3);
    }
}
