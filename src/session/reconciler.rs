//! Streaming reconciler.
//!
//! Folds decoded [`ProtocolEvent`]s into the append-only [`ConversationLog`].
//!
//! | Event | Log | Busy |
//! |-------|-----|------|
//! | `Pending` | append empty streaming AI message | `true` |
//! | `Delta` | append text to the streaming message | unchanged |
//! | `End` | finalize the streaming message | `false` |
//! | `Error` | turn the streaming message into `⚠️ ...`, or append one | `false` |
//! | `CompletedLegacy` | append finalized AI message | `false` |
//!
//! At most one message carries a stream id at any time. The log tracks that
//! message explicitly and re-checks the token before every mutation.

// ============================================================================
// Imports
// ============================================================================

use std::ops::Index;

use tracing::{debug, trace, warn};

use crate::identifiers::StreamId;
use crate::protocol::ProtocolEvent;

use super::message::Message;
use super::options::OrphanPolicy;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of every error message shown in the conversation.
pub const ERROR_PREFIX: &str = "⚠️";

// ============================================================================
// ConversationLog
// ============================================================================

/// Ordered, append-only sequence of messages.
///
/// The only in-place mutations are appending delta text to the streaming
/// message and finalizing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    messages: Vec<Message>,
    active: Option<ActiveStream>,
    /// Bumped on every mutation.
    revision: u64,
}

/// Position and token of the streaming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveStream {
    index: usize,
    id: StreamId,
}

impl ConversationLog {
    /// Creates an empty log.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all messages in order.
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the log has no messages.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the last message.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Returns the message currently receiving deltas.
    #[must_use]
    pub fn active_stream(&self) -> Option<&Message> {
        self.active_index().map(|i| &self.messages[i])
    }

    /// Returns a counter that changes whenever the log does.
    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Counts messages that still carry a stream id.
    #[must_use]
    pub fn streaming_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_streaming()).count()
    }

    /// Appends a finalized message.
    pub(crate) fn push(&mut self, message: Message) {
        debug_assert!(!message.is_streaming(), "use begin_stream for streams");
        self.messages.push(message);
        self.revision += 1;
    }

    /// Appends a new streaming message and returns its token.
    ///
    /// A stream left open (e.g. by a lost connection) is finalized first.
    pub(crate) fn begin_stream(&mut self) -> StreamId {
        if self.finalize_stream() {
            warn!("Finalized leftover stream before starting a new one");
        }

        let id = StreamId::generate();
        self.active = Some(ActiveStream {
            index: self.messages.len(),
            id,
        });
        self.messages.push(Message::streaming(id));
        self.revision += 1;
        id
    }

    /// Appends text to the streaming message. Returns `false` if none.
    pub(crate) fn append_delta(&mut self, text: &str) -> bool {
        let Some(index) = self.active_index() else {
            return false;
        };
        self.messages[index].text.push_str(text);
        self.revision += 1;
        true
    }

    /// Clears the streaming message's token. Returns `false` if none.
    pub(crate) fn finalize_stream(&mut self) -> bool {
        let Some(index) = self.active_index() else {
            return false;
        };
        self.messages[index].stream_id = None;
        self.active = None;
        self.revision += 1;
        true
    }

    /// Replaces the streaming message's text and finalizes it.
    ///
    /// Returns `false` if there is no streaming message.
    pub(crate) fn fail_stream(&mut self, text: String) -> bool {
        let Some(index) = self.active_index() else {
            return false;
        };
        let message = &mut self.messages[index];
        message.text = text;
        message.stream_id = None;
        self.active = None;
        self.revision += 1;
        true
    }

    /// Resolves the active stream, verifying the token still matches.
    fn active_index(&self) -> Option<usize> {
        let active = self.active?;
        self.messages
            .get(active.index)
            .filter(|m| m.stream_id == Some(active.id))
            .map(|_| active.index)
    }
}

impl Index<usize> for ConversationLog {
    type Output = Message;

    fn index(&self, index: usize) -> &Message {
        &self.messages[index]
    }
}

impl<'a> IntoIterator for &'a ConversationLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Owns the conversation log and the busy flag.
#[derive(Debug, Clone)]
pub struct Reconciler {
    log: ConversationLog,
    busy: bool,
    /// Shown when an `ERROR` frame carries no message.
    fallback_error: String,
}

impl Reconciler {
    /// Creates a reconciler with an empty log.
    #[must_use]
    pub fn new(fallback_error: impl Into<String>) -> Self {
        Self {
            log: ConversationLog::new(),
            busy: false,
            fallback_error: fallback_error.into(),
        }
    }

    /// Returns the conversation log.
    #[inline]
    #[must_use]
    pub const fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Returns `true` while a response is expected or streaming.
    #[inline]
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Applies one protocol event.
    pub fn apply(&mut self, event: ProtocolEvent) {
        trace!(status = event.status(), "Applying event");

        match event {
            ProtocolEvent::Pending => {
                let id = self.log.begin_stream();
                debug!(stream = %id, "Stream started");
                self.busy = true;
            }

            ProtocolEvent::Delta { text } => {
                if !self.log.append_delta(&text) {
                    debug!("Delta without active stream ignored");
                }
            }

            ProtocolEvent::End => {
                if self.log.finalize_stream() {
                    debug!("Stream finalized");
                } else {
                    debug!("End without active stream ignored");
                }
                self.busy = false;
            }

            ProtocolEvent::Error { message } => {
                let text = self.error_text(&message);
                if !self.log.fail_stream(text.clone()) {
                    self.log.push(Message::ai(text));
                }
                self.busy = false;
            }

            ProtocolEvent::CompletedLegacy { review } => {
                self.log.push(Message::ai(review));
                self.busy = false;
            }
        }
    }

    /// Records a user submission and marks the session busy.
    pub fn push_user(&mut self, text: impl Into<String>, language: impl Into<String>) {
        self.log.push(Message::user(text, language));
        self.busy = true;
    }

    /// Appends a finalized notice from the session itself.
    pub fn push_notice(&mut self, text: impl Into<String>) {
        self.log.push(Message::ai(text));
    }

    /// Handles loss of the transport.
    ///
    /// The busy flag is cleared since no response can arrive on a new
    /// transport. A streaming message is kept or failed per `policy`.
    pub fn on_disconnect(&mut self, policy: OrphanPolicy, orphaned_text: &str) {
        self.busy = false;

        if self.log.active_stream().is_none() {
            return;
        }

        match policy {
            OrphanPolicy::Keep => {
                warn!("Transport closed mid-stream; message left unfinalized");
            }
            OrphanPolicy::FinalizeAsError => {
                let text = self.error_text(orphaned_text);
                self.log.fail_stream(text);
                debug!("Orphaned stream finalized as error");
            }
        }
    }

    /// Formats an error message, falling back when `message` is blank.
    fn error_text(&self, message: &str) -> String {
        let message = if message.trim().is_empty() {
            self.fallback_error.as_str()
        } else {
            message
        };
        format!("{ERROR_PREFIX} {message}")
    }
}

// ============================================================================
// Tests
// ============================================================================
