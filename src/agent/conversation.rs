//! Conversation history management
//!
//! Holds one role's system turn and its answered exchanges, bounded by the
//! context window.

use std::collections::VecDeque;

use serde_json::Value;

use crate::core::WireStyle;
use crate::llm::{Message, Redaction};

/// One answered round trip
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Message,
}

/// Manages conversation history
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Seeded on the first step of a task
    system: Option<Message>,
    /// Answered exchanges, oldest first
    exchanges: VecDeque<Exchange>,
    /// Maximum number of exchanges kept
    window: usize,
}

impl Conversation {
    /// Create a new conversation
    pub fn new(window: usize) -> Self {
        Self {
            system: None,
            exchanges: VecDeque::new(),
            window,
        }
    }

    /// Replace the system turn and forget previous exchanges
    pub fn seed(&mut self, system: Message) {
        self.system = Some(system);
        self.exchanges.clear();
    }

    pub fn system(&self) -> Option<&Message> {
        self.system.as_ref()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Record a completed round trip, pruning the oldest exchanges
    pub fn push(&mut self, user: Message, assistant: Message) {
        self.exchanges.push_back(Exchange { user, assistant });
        self.prune();
    }

    fn prune(&mut self) {
        while self.exchanges.len() > self.window {
            self.exchanges.pop_front();
        }
    }

    /// Messages to send with a new pending user turn appended. The history
    /// keeps only `window - 1` exchanges so that the pending turn fits.
    pub fn with_pending<'a>(&'a self, pending: &'a Message) -> Vec<&'a Message> {
        let keep = self.window.saturating_sub(1);
        let skip = self.exchanges.len().saturating_sub(keep);

        self.system
            .iter()
            .chain(
                self.exchanges
                    .iter()
                    .skip(skip)
                    .flat_map(|e| [&e.user, &e.assistant]),
            )
            .chain(std::iter::once(pending))
            .collect()
    }

    /// All stored messages, system turn first
    pub fn messages(&self) -> Vec<&Message> {
        self.system
            .iter()
            .chain(self.exchanges.iter().flat_map(|e| [&e.user, &e.assistant]))
            .collect()
    }

    /// Wire form of the whole history
    pub fn wire(&self, style: WireStyle, redact: Redaction, show_context: bool) -> Vec<Value> {
        self.messages()
            .into_iter()
            .map(|m| m.to_wire(style, redact, show_context))
            .collect()
    }

    /// Most recent assistant reply
    pub fn last_assistant_mut(&mut self) -> Option<&mut Message> {
        self.exchanges.back_mut().map(|e| &mut e.assistant)
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.exchanges.back().map(|e| &e.assistant)
    }

    /// Clear history and system turn
    pub fn clear(&mut self) {
        self.system = None;
        self.exchanges.clear();
    }

    /// Number of stored exchanges
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(3)
    }
}
