//! Conversation messages.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::StreamId;

// ============================================================================
// Sender
// ============================================================================

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// Submitted by the user.
    User,
    /// Produced by the endpoint or by the session itself (notices).
    Ai,
}

// ============================================================================
// Message
// ============================================================================

/// One entry of the conversation log.
///
/// `stream_id` is set only while the message is still receiving deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Message body (markdown).
    pub text: String,
    /// Author.
    pub sender: Sender,
    /// Language tag of a user submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Token of the in-progress stream this message belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<StreamId>,
}

impl Message {
    /// Creates a user submission.
    #[must_use]
    pub fn user(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            language: Some(language.into()),
            stream_id: None,
        }
    }

    /// Creates a finalized AI message.
    #[must_use]
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Ai,
            language: None,
            stream_id: None,
        }
    }

    /// Creates an empty AI message that will receive deltas.
    #[must_use]
    pub fn streaming(stream_id: StreamId) -> Self {
        Self {
            text: String::new(),
            sender: Sender::Ai,
            language: None,
            stream_id: Some(stream_id),
        }
    }

    /// Returns `true` while the message is still receiving deltas.
    #[inline]
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.stream_id.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{json, to_value};

    #[test]
    fn test_constructors() {
        let user = Message::user("x", "Python");
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.language.as_deref(), Some("Python"));
        assert!(!user.is_streaming());

        let stream = Message::streaming(StreamId::generate());
        assert_eq!(stream.sender, Sender::Ai);
        assert!(stream.text.is_empty());
        assert!(stream.is_streaming());
    }

    #[test]
    fn test_serialized_shape() {
        let value = to_value(Message::ai("hi")).expect("serialize");
        assert_eq!(value, json!({ "text": "hi", "sender": "ai" }));
    }
}
