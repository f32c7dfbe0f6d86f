//! Session event loop.
//!
//! All session state changes happen on this one task: facade commands,
//! transport events and the retry timer are multiplexed with
//! `tokio::select!` and handled one at a time, so nothing here needs a lock.
//!
//! # Flow
//!
//! ```text
//! Session ──SessionCommand──► SessionLoop ──send──► Controller ──► Connection
//!                                │  ▲                    │
//!                                │  └──ControllerOutput──┘
//!                                ▼
//!                           Reconciler ──► SessionSnapshot (watch + observer)
//! ```

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::TimerId;
use crate::protocol::{decode_frame, encode_request};
use crate::transport::{Controller, ControllerOutput, ReadyKind, TransportEvent};

use super::core::{ObserverSlot, SessionCommand, SessionSnapshot, SubmitOutcome};
use super::options::SessionOptions;
use super::reconciler::Reconciler;

// ============================================================================
// SessionLoop
// ============================================================================

/// State owned by the event loop task.
pub(crate) struct SessionLoop {
    options: SessionOptions,
    controller: Controller,
    reconciler: Reconciler,
    /// Pending input text.
    draft: String,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Log revision of the last published snapshot.
    published_revision: u64,
    observer: ObserverSlot,
}

impl SessionLoop {
    pub(crate) fn new(
        options: SessionOptions,
        controller: Controller,
        reconciler: Reconciler,
        command_rx: mpsc::UnboundedReceiver<SessionCommand>,
        events_rx: mpsc::UnboundedReceiver<TransportEvent>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        observer: ObserverSlot,
    ) -> Self {
        Self {
            options,
            controller,
            reconciler,
            draft: String::new(),
            command_rx,
            events_rx,
            published_revision: 0,
            snapshot_tx,
            observer,
        }
    }

    /// Runs until shutdown is requested or the facade is dropped.
    pub(crate) async fn run(mut self) {
        info!(url = %self.options.url, "Session started");
        self.publish();

        loop {
            let retry = self.controller.retry_deadline();

            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(SessionCommand::Submit { text, language, reply }) => {
                            let outcome = self.handle_submit(text, &language);
                            // Callers must see the effect of their submission.
                            self.publish();
                            let _ = reply.send(outcome);
                        }

                        Some(SessionCommand::SetDraft(text)) => {
                            self.draft = text;
                        }

                        Some(SessionCommand::Shutdown) | None => {
                            self.controller.shutdown();
                            self.publish();
                            break;
                        }
                    }
                }

                Some(event) = self.events_rx.recv() => {
                    self.handle_transport(event);
                }

                timer = wait_for_retry(retry) => {
                    self.controller.on_retry_elapsed(timer);
                }
            }

            self.publish();
        }

        debug!("Session loop terminated");
    }

    // ========================================================================
    // Submissions
    // ========================================================================

    fn handle_submit(&mut self, text: Option<String>, language: &str) -> Result<SubmitOutcome> {
        let text = text.unwrap_or_else(|| self.draft.clone());

        if text.trim().is_empty() {
            return Ok(SubmitOutcome::Empty);
        }

        if !self.controller.is_open() {
            debug!(state = %self.controller.state(), "Submission while not connected");
            self.reconciler
                .push_notice(self.options.notices.disconnected.clone());
            return Ok(SubmitOutcome::Disconnected);
        }

        if self.reconciler.is_busy() {
            debug!("Submission while a response is in progress");
            return Ok(SubmitOutcome::Busy);
        }

        let frame = encode_request(&text, language, &self.options.instruction).map_err(|e| {
            error!(error = %e, "Failed to encode request");
            e
        })?;

        match self.controller.send(frame) {
            Ok(()) => {}
            Err(e @ (Error::NotReady { .. } | Error::ConnectionClosed)) => {
                warn!(error = %e, "Send failed");
                self.reconciler
                    .push_notice(self.options.notices.disconnected.clone());
                return Ok(SubmitOutcome::Disconnected);
            }
            Err(e) => return Err(e),
        }

        debug!(language, len = text.len(), "Submission sent");
        self.reconciler.push_user(text, language);
        self.draft.clear();
        Ok(SubmitOutcome::Sent)
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn handle_transport(&mut self, event: TransportEvent) {
        let Some(output) = self.controller.handle(event) else {
            return;
        };

        match output {
            ControllerOutput::Ready(kind) => {
                let notice = match kind {
                    ReadyKind::Welcome => &self.options.notices.welcome,
                    ReadyKind::Reconnected => &self.options.notices.reconnected,
                };
                self.reconciler.push_notice(notice.clone());
            }

            ControllerOutput::Frame(frame) => match decode_frame(&frame) {
                Ok(event) => self.reconciler.apply(event),
                Err(e @ Error::UnknownStatus { .. }) => {
                    debug!(error = %e, "Ignoring frame");
                }
                Err(e) => {
                    warn!(error = %e, frame = %frame, "Dropping malformed frame");
                }
            },

            ControllerOutput::Closed { retry_in } => {
                debug!(?retry_in, "Transport closed");
                self.reconciler.on_disconnect(
                    self.options.orphan_policy,
                    &self.options.notices.orphaned,
                );
            }
        }
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    /// Publishes a snapshot if anything changed.
    ///
    /// The log is compared by revision so unchanged state costs no copy.
    fn publish(&mut self) {
        let revision = self.reconciler.log().revision();
        let state = self.controller.state();
        let busy = self.reconciler.is_busy();

        {
            let current = self.snapshot_tx.borrow();
            if revision == self.published_revision
                && current.state == state
                && current.busy == busy
                && current.draft == self.draft
            {
                return;
            }
        }

        let snapshot = SessionSnapshot {
            state,
            messages: self.reconciler.log().messages().to_vec(),
            busy,
            draft: self.draft.clone(),
        };
        self.published_revision = revision;

        if let Some(observer) = self.observer.lock().as_ref() {
            observer(&snapshot);
        }

        self.snapshot_tx.send_replace(snapshot);
    }
}

/// Resolves when the armed retry timer fires; never resolves if none is armed.
async fn wait_for_retry(retry: Option<(TimerId, Instant)>) -> TimerId {
    match retry {
        Some((timer, deadline)) => {
            sleep_until(deadline).await;
            timer
        }
        None => std::future::pending().await,
    }
}
