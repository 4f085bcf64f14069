//! The seam to an external text generator.
//!
//! The engine never talks HTTP itself. It hands an ordered list of chat
//! messages and an optional system prompt to a [`TextGenerator`] and gets
//! back a [`GeneratorReply`]. Failures are carried in the reply, never
//! raised, so callers can fall back without unwinding.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Who said a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human.
    User,
    /// The model or persona.
    Assistant,
    /// Instructions.
    System,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker.
    pub role: Role,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// An assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Result of one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorReply {
    /// Generated text. Empty on failure.
    pub content: String,
    /// Failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GeneratorReply {
    /// A successful reply.
    #[must_use]
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    /// A failed reply.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            error: Some(error.into()),
        }
    }

    /// Trimmed text, if the reply carries no error and is not blank.
    #[must_use]
    pub fn usable_text(&self) -> Option<&str> {
        if self.error.is_some() {
            return None;
        }
        let text = self.content.trim();
        (!text.is_empty()).then_some(text)
    }
}

/// An external text generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply. Must not panic; failures go in
    /// [`GeneratorReply::error`].
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> GeneratorReply;

    /// Short name for logs.
    fn name(&self) -> &str {
        "generator"
    }
}

/// A generator that answers every call with the same reply and records
/// what it was asked. Handy for offline runs and tests.
#[derive(Debug, Default)]
pub struct FixedGenerator {
    reply: GeneratorReply,
    calls: Mutex<Vec<(Vec<ChatMessage>, Option<String>)>>,
}

impl FixedGenerator {
    /// Always answer with `reply`.
    #[must_use]
    pub fn new(reply: GeneratorReply) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// The system prompt of the most recent call.
    #[must_use]
    pub fn last_system_prompt(&self) -> Option<String> {
        self.calls.lock().last().and_then(|(_, prompt)| prompt.clone())
    }

    /// The messages of the most recent call.
    #[must_use]
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.calls
            .lock()
            .last()
            .map(|(messages, _)| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for FixedGenerator {
    async fn generate_response(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
    ) -> GeneratorReply {
        self.calls
            .lock()
            .push((messages.to_vec(), system_prompt.map(str::to_string)));
        self.reply.clone()
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
