//! Session facade.
//!
//! [`Session`] is the only type the rendering layer talks to. It forwards
//! submissions to the event loop and exposes read-only snapshots of the
//! conversation.
//!
//! # Observing
//!
//! - [`Session::snapshot`] - current state, any time
//! - [`Session::subscribe`] - `watch` receiver, wakes on every change
//! - [`Session::set_observer`] - synchronous callback on every change

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{ConnectionState, Controller};

use super::builder::SessionBuilder;
use super::event_loop::SessionLoop;
use super::message::Message;
use super::options::SessionOptions;
use super::reconciler::Reconciler;

// ============================================================================
// Types
// ============================================================================

/// Change callback type.
///
/// Called on the session's event loop after every change. Must not block
/// and must not call [`Session::set_observer`] or
/// [`Session::clear_observer`].
pub type Observer = Box<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// Shared observer slot.
pub(crate) type ObserverSlot = Arc<Mutex<Option<Observer>>>;

// ============================================================================
// SessionSnapshot
// ============================================================================

/// Read-only view of the session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection state.
    pub state: ConnectionState,
    /// Conversation log, oldest first.
    pub messages: Vec<Message>,
    /// `true` while a response is expected or streaming.
    pub busy: bool,
    /// Pending input text.
    pub draft: String,
}

impl SessionSnapshot {
    /// Snapshot of a session that has not connected yet.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            state: ConnectionState::Connecting,
            messages: Vec::new(),
            busy: false,
            draft: String::new(),
        }
    }

    /// Returns `true` if submissions can be sent.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

// ============================================================================
// SubmitOutcome
// ============================================================================

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Sent to the endpoint and recorded as a user message.
    Sent,
    /// Blank input; nothing happened.
    Empty,
    /// A response is still in progress; nothing happened.
    Busy,
    /// Not connected; a notice was added to the conversation.
    Disconnected,
}

// ============================================================================
// SessionCommand
// ============================================================================

/// Requests from the facade to the event loop.
pub(crate) enum SessionCommand {
    /// Submit `text`, or the current draft when `None`.
    Submit {
        text: Option<String>,
        language: String,
        reply: oneshot::Sender<Result<SubmitOutcome>>,
    },
    /// Replace the draft.
    SetDraft(String),
    /// Stop the session.
    Shutdown,
}

// ============================================================================
// Session
// ============================================================================

/// A resilient review session over one persistent WebSocket connection.
///
/// Dropping the session shuts it down.
pub struct Session {
    /// Channel to the event loop.
    command_tx: mpsc::UnboundedSender<SessionCommand>,
    /// Latest published snapshot.
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    /// Change callback (shared with event loop).
    observer: ObserverSlot,
    /// Event loop task.
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Starts a session for `url` with default settings.
    ///
    /// # Errors
    ///
    /// See [`SessionBuilder::build`].
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        Self::builder().url(url).connect().await
    }

    /// Spawns the event loop. Must run inside a Tokio runtime.
    pub(crate) fn start(options: SessionOptions) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::initial());
        let observer: ObserverSlot = Arc::new(Mutex::new(None));

        let (controller, events_rx) = Controller::start(options.url.clone(), options.backoff);
        let reconciler = Reconciler::new(options.notices.fallback_error.clone());

        let event_loop = SessionLoop::new(
            options,
            controller,
            reconciler,
            command_rx,
            events_rx,
            snapshot_tx,
            Arc::clone(&observer),
        );
        let task = tokio::spawn(event_loop.run());

        Self {
            command_tx,
            snapshot_rx,
            observer,
            task: Some(task),
        }
    }

    // ========================================================================
    // Submissions
    // ========================================================================

    /// Submits `text` for review in `language`.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionClosed`] if the session was shut down
    /// - [`Error::Json`] if the request could not be encoded
    pub async fn submit(
        &self,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<SubmitOutcome> {
        self.request_submit(Some(text.into()), language.into())
            .await
    }

    /// Replaces the pending input text.
    pub fn set_draft(&self, text: impl Into<String>) {
        let _ = self.command_tx.send(SessionCommand::SetDraft(text.into()));
    }

    /// Submits the pending input text.
    ///
    /// The draft is cleared only when the submission is sent.
    ///
    /// # Errors
    ///
    /// See [`Self::submit`].
    pub async fn submit_draft(&self, language: impl Into<String>) -> Result<SubmitOutcome> {
        self.request_submit(None, language.into()).await
    }

    async fn request_submit(&self, text: Option<String>, language: String) -> Result<SubmitOutcome> {
        let (reply, reply_rx) = oneshot::channel();

        self.command_tx
            .send(SessionCommand::Submit {
                text,
                language,
                reply,
            })
            .map_err(|_| Error::SessionClosed)?;

        reply_rx.await.map_err(|_| Error::SessionClosed)?
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Returns the conversation log.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.snapshot_rx.borrow().messages.clone()
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot_rx.borrow().state
    }

    /// Returns `true` while a response is expected or streaming.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.snapshot_rx.borrow().busy
    }

    /// Returns `true` if submissions can be sent.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.snapshot_rx.borrow().is_ready()
    }

    /// Returns a receiver that is notified on every change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Sets the change callback, replacing any previous one.
    pub fn set_observer(&self, observer: Observer) {
        let mut guard = self.observer.lock();
        *guard = Some(observer);
    }

    /// Clears the change callback.
    pub fn clear_observer(&self) {
        let mut guard = self.observer.lock();
        *guard = None;
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stops reconnecting, closes the connection and waits for the event
    /// loop to finish.
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(SessionCommand::Shutdown);

        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            debug!(error = %e, "Session task ended abnormally");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // No-op if shutdown() already ran.
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_snapshot() {
        let snapshot = SessionSnapshot::initial();
        assert_eq!(snapshot.state, ConnectionState::Connecting);
        assert!(snapshot.messages.is_empty());
        assert!(!snapshot.busy);
        assert!(!snapshot.is_ready());
    }

    #[tokio::test]
    async fn test_shutdown_stops_event_loop() {
        let session = Session::connect("ws://127.0.0.1:9").await.expect("valid");
        let rx = session.subscribe();

        session.shutdown().await;

        // Loop has exited and dropped its sender.
        assert!(rx.has_changed().is_err());
    }
}
