//! Multi-modal message model and its per-dialect wire form
//!
//! A [`Message`] is a role plus an ordered list of [`ContentItem`]s. Text items
//! may carry `{slot}` placeholders that are filled for user turns; plain text
//! is sent verbatim and images as base64 PNG. Redaction swaps payloads for
//! [`PLACEHOLDER`] so that dumps can be written to audit logs.

use std::collections::HashMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::{ImageData, WireStyle};

/// Token substituted for hidden payloads
pub const PLACEHOLDER: &str = "...";

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Parse a wire role name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of a message
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    /// Text with optional named slots and the values that fill them
    Text {
        text: String,
        args: HashMap<String, String>,
    },
    Image(ImageData),
}

impl ContentItem {
    /// Plain text without slots
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            args: HashMap::new(),
        }
    }

    /// Text whose `{name}` slots are filled from `args`
    pub fn template<K, V>(text: impl Into<String>, args: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Text {
            text: text.into(),
            args: args
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn image(image: ImageData) -> Self {
        Self::Image(image)
    }

    /// Raw text of a text item
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text, .. } => Some(text),
            ContentItem::Image(_) => None,
        }
    }

    fn to_wire(&self, style: WireStyle, fill_slots: bool, redact: Redaction) -> Value {
        match self {
            ContentItem::Text { text, args } => {
                let text = if fill_slots && !args.is_empty() {
                    fill_template(text, args, redact.text)
                } else {
                    text.clone()
                };
                json!({ "type": "text", "text": text })
            }
            ContentItem::Image(image) => {
                let data = if redact.image {
                    PLACEHOLDER.to_string()
                } else {
                    STANDARD.encode(image.as_png())
                };
                match style {
                    WireStyle::OpenAi => {
                        let url = if redact.image {
                            data
                        } else {
                            format!("data:image/png;base64,{}", data)
                        };
                        json!({
                            "type": "image_url",
                            "image_url": { "url": url, "detail": "high" }
                        })
                    }
                    WireStyle::Anthropic => json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": data
                        }
                    }),
                }
            }
        }
    }
}

/// What to hide when serializing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Redaction {
    pub text: bool,
    pub image: bool,
}

impl Redaction {
    pub const NONE: Redaction = Redaction {
        text: false,
        image: false,
    };

    pub const ALL: Redaction = Redaction {
        text: true,
        image: true,
    };
}

/// A message turn
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentItem>,
    /// Context window the message was produced under
    pub context_window: Option<usize>,
}

impl Message {
    pub fn new(role: Role, content: Vec<ContentItem>) -> Self {
        Self {
            role,
            content,
            context_window: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentItem::text(text)])
    }

    pub fn user(content: Vec<ContentItem>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentItem::text(text)])
    }

    /// The single text payload of a model reply
    pub fn text(&self) -> Option<&str> {
        match self.content.as_slice() {
            [item] => item.as_text(),
            _ => None,
        }
    }

    /// Replace the text of the first text item
    pub fn set_text(&mut self, new_text: impl Into<String>) {
        let new_text = new_text.into();
        for item in &mut self.content {
            if let ContentItem::Text { text, .. } = item {
                *text = new_text;
                return;
            }
        }
        self.content.push(ContentItem::text(new_text));
    }

    /// Serialize for the given wire dialect
    pub fn to_wire(&self, style: WireStyle, redact: Redaction, show_context: bool) -> Value {
        let fill_slots = self.role == Role::User;
        let mut value = json!({
            "role": self.role.as_str(),
            "content": self
                .content
                .iter()
                .map(|item| item.to_wire(style, fill_slots, redact))
                .collect::<Vec<_>>(),
        });

        if show_context {
            if let Some(window) = self.context_window {
                value["context_window"] = json!(window);
            }
        }

        value
    }
}

/// Fill `{name}` slots. Missing values and redacted values become the
/// placeholder; `{{` and `}}` are literal braces. An unterminated slot is
/// kept verbatim.
pub fn fill_template(text: &str, args: &HashMap<String, String>, redact: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }

                if !closed {
                    out.push('{');
                    out.push_str(&name);
                } else if redact {
                    out.push_str(PLACEHOLDER);
                } else {
                    out.push_str(args.get(&name).map(String::as_str).unwrap_or(PLACEHOLDER));
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_template() {
        let args = HashMap::from([("plan".to_string(), "click OK".to_string())]);
        assert_eq!(
            fill_template("Plan: {plan} {{literal}}", &args, false),
            "Plan: click OK {literal}"
        );
        assert_eq!(fill_template("Plan: {plan}", &args, true), "Plan: ...");
        assert_eq!(fill_template("{missing}", &args, false), "...");
        assert_eq!(fill_template("open {brace", &args, false), "open {brace");
    }

    #[test]
    fn test_slots_only_filled_for_user() {
        let item = ContentItem::template("{x}", [("x", "1")]);
        let user = Message::user(vec![item.clone()]);
        let assistant = Message::new(Role::Assistant, vec![item]);

        let user_wire = user.to_wire(WireStyle::OpenAi, Redaction::NONE, false);
        let assistant_wire = assistant.to_wire(WireStyle::OpenAi, Redaction::NONE, false);
        assert_eq!(user_wire["content"][0]["text"], "1");
        assert_eq!(assistant_wire["content"][0]["text"], "{x}");
    }

    #[test]
    fn test_plain_user_text_keeps_braces() {
        let msg = Message::user(vec![ContentItem::text(r#"set field to {"a": 1}"#)]);
        let wire = msg.to_wire(WireStyle::OpenAi, Redaction::NONE, false);
        assert_eq!(wire["content"][0]["text"], r#"set field to {"a": 1}"#);

        let redacted = msg.to_wire(WireStyle::OpenAi, Redaction::ALL, false);
        assert_eq!(redacted["content"][0]["text"], r#"set field to {"a": 1}"#);
    }

    #[test]
    fn test_openai_image_part() {
        let msg = Message::user(vec![
            ContentItem::image(ImageData::from_png(vec![0x89, b'P', b'N', b'G'])),
            ContentItem::text("what now?"),
        ]);
        let wire = msg.to_wire(WireStyle::OpenAi, Redaction::NONE, false);

        let url = wire["content"][0]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(wire["content"][0]["image_url"]["detail"], "high");
        assert_eq!(wire["content"][1]["type"], "text");
    }

    #[test]
    fn test_anthropic_image_part_redacted() {
        let msg = Message::user(vec![ContentItem::image(ImageData::from_png(vec![1, 2]))]);
        let wire = msg.to_wire(WireStyle::Anthropic, Redaction::ALL, false);

        assert_eq!(wire["content"][0]["type"], "image");
        assert_eq!(wire["content"][0]["source"]["media_type"], "image/png");
        assert_eq!(wire["content"][0]["source"]["data"], PLACEHOLDER);
    }

    #[test]
    fn test_context_window_shown_on_request() {
        let mut msg = Message::assistant("ok");
        msg.context_window = Some(3);

        assert!(msg
            .to_wire(WireStyle::OpenAi, Redaction::NONE, false)
            .get("context_window")
            .is_none());
        assert_eq!(
            msg.to_wire(WireStyle::OpenAi, Redaction::NONE, true)["context_window"],
            3
        );
    }

    #[test]
    fn test_set_text_replaces_first_text() {
        let mut msg = Message::assistant("Thought: a\nAction: b");
        msg.set_text("Thought: a\nAction: click(start_box='(1,2)')");
        assert_eq!(msg.text(), Some("Thought: a\nAction: click(start_box='(1,2)')"));
    }
}
