//! Conversation history and prompt-context assembly.
//!
//! The context manager owns the bounded exchange log. Every LLM call gets
//! a freshly assembled message sequence: system prompt, then the stored
//! exchanges oldest-first, then the current user message. Nothing here is
//! persisted; history lives for the process lifetime only.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One completed user/assistant turn pair.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// What the user said (after prompt enhancement).
    pub user_text: String,
    /// What the assistant answered (after persona filtering).
    pub assistant_text: String,
    /// When the exchange was recorded.
    pub timestamp: DateTime<Local>,
}

/// A single role-tagged message in a prompt context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author: `system`, `user`, or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: content.into(),
        }
    }
}

/// Observability snapshot of the history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Number of stored exchanges.
    pub count: usize,
    /// Timestamp of the oldest exchange, if any.
    pub oldest: Option<DateTime<Local>>,
    /// Timestamp of the newest exchange, if any.
    pub newest: Option<DateTime<Local>>,
}

/// Bounded, ordered log of exchanges plus prompt-context assembly.
///
/// Not internally synchronized: the orchestrator serializes access behind
/// a single-writer lock.
#[derive(Debug)]
pub struct ContextManager {
    history: VecDeque<Exchange>,
    capacity: usize,
}

impl ContextManager {
    /// Create an empty manager retaining at most `capacity` exchanges.
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a completed exchange stamped with the current time,
    /// evicting oldest entries beyond capacity.
    pub fn record(&mut self, user_text: &str, assistant_text: &str) {
        self.history.push_back(Exchange {
            user_text: user_text.to_owned(),
            assistant_text: assistant_text.to_owned(),
            timestamp: Local::now(),
        });
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    /// Assemble the prompt context for one LLM call: system prompt first,
    /// stored exchanges as user/assistant pairs oldest-first, current
    /// user message last.
    pub fn build_context(&self, current_user_text: &str, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + self.history.len() * 2);
        messages.push(ChatMessage::system(system_prompt));
        for exchange in &self.history {
            messages.push(ChatMessage::user(exchange.user_text.clone()));
            messages.push(ChatMessage::assistant(exchange.assistant_text.clone()));
        }
        messages.push(ChatMessage::user(current_user_text));
        messages
    }

    /// Flatten the stored exchanges into role-tagged messages without the
    /// system prompt or a current message.
    pub fn history_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() * 2);
        for exchange in &self.history {
            messages.push(ChatMessage::user(exchange.user_text.clone()));
            messages.push(ChatMessage::assistant(exchange.assistant_text.clone()));
        }
        messages
    }

    /// Drop all stored exchanges.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Number of stored exchanges.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Observability snapshot; not consumed by the pipeline itself.
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            count: self.history.len(),
            oldest: self.history.front().map(|e| e.timestamp),
            newest: self.history.back().map(|e| e.timestamp),
        }
    }

    /// Iterate stored exchanges oldest-first.
    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.history.iter()
    }
}
