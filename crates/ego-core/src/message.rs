//! Conversation messages
//!
//! Messages are created once and then only read: the session store appends
//! them and hands out shared slices, never mutable access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a chat message, `msg-<uuid>` for user messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("msg-{}", uuid::Uuid::new_v4()))
    }

    /// Id of the assistant message answering this one.
    pub fn response_id(&self) -> Self {
        Self(format!("{}-response", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to an attached image (a path or URL, never the bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, image: Option<ImageRef>, at: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::generate(),
            role: ChatRole::User,
            content: content.into(),
            image,
            timestamp: at.timestamp_millis(),
        }
    }

    /// Build the assistant reply to `prompt`.
    pub fn reply_to(prompt: &ChatMessage, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: prompt.id.response_id(),
            role: ChatRole::Assistant,
            content: content.into(),
            image: None,
            timestamp: at.timestamp_millis(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_prefixed() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("msg-"));
    }

    #[test]
    fn test_reply_links_to_prompt_id() {
        let now = Utc::now();
        let prompt = ChatMessage::user("hello", None, now);
        let reply = ChatMessage::reply_to(&prompt, "hi", now);
        assert_eq!(reply.id.as_str(), format!("{}-response", prompt.id));
        assert_eq!(reply.role, ChatRole::Assistant);
        assert_eq!(reply.timestamp, now.timestamp_millis());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
