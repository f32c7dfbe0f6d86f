//! Connection lifecycle state machine.
//!
//! [`Lifecycle`] holds no I/O. It is told what happened to the transport and
//! answers with what to do next; [`Controller`](super::Controller) carries
//! those decisions out.
//!
//! # Transitions
//!
//! ```text
//!             open                  close / error
//! CONNECTING ──────────────► OPEN ─────────────────► CLOSED
//!     ▲  │                                              │
//!     │  └──────────── connect failed ─────────────────►│
//!     │                                                 │
//!     └────────── retry timer elapsed (backoff) ────────┘
//! ```
//!
//! Shutdown latches `should_reconnect = false`, cancels the pending timer
//! and closes an open transport. Nothing transitions after shutdown.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::{Epoch, TimerId};

use super::Backoff;

// ============================================================================
// ConnectionState
// ============================================================================

/// State of the single logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// Handshake completed; sends are accepted.
    Open,
    /// Transport is gone; a retry may be scheduled.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ReadyKind
// ============================================================================

/// Which notice accompanies a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyKind {
    /// First successful open of the session.
    Welcome,
    /// Any later open.
    Reconnected,
}

// ============================================================================
// ScheduledRetry
// ============================================================================

/// A reconnect the caller must arm a timer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRetry {
    /// Id the timer must report back with.
    pub timer: TimerId,
    /// How long to wait before reconnecting.
    pub delay: Duration,
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Pure connection state machine.
#[derive(Debug)]
pub struct Lifecycle {
    /// Current connection state.
    state: ConnectionState,
    /// Epoch of the live (or in-flight) transport.
    epoch: Epoch,
    /// Consecutive failed attempts since the last successful open.
    retry_count: u32,
    /// Backoff policy for scheduling retries.
    backoff: Backoff,
    /// Cleared on shutdown; never set again.
    should_reconnect: bool,
    /// Whether any open has succeeded in this session.
    opened_before: bool,
    /// Last issued timer id.
    last_timer: TimerId,
    /// Timer currently allowed to fire.
    pending_timer: Option<TimerId>,
}

impl Lifecycle {
    /// Creates a lifecycle in `CONNECTING` for [`Epoch::FIRST`].
    ///
    /// The caller must dial that epoch immediately.
    #[must_use]
    pub fn new(backoff: Backoff) -> Self {
        Self {
            state: ConnectionState::Connecting,
            epoch: Epoch::FIRST,
            retry_count: 0,
            backoff,
            should_reconnect: true,
            opened_before: false,
            last_timer: TimerId::default(),
            pending_timer: None,
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the epoch of the live transport.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Returns the retry counter.
    #[inline]
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the timer currently allowed to fire.
    #[inline]
    #[must_use]
    pub const fn pending_timer(&self) -> Option<TimerId> {
        self.pending_timer
    }

    /// Returns `true` once shutdown has been requested.
    #[inline]
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        !self.should_reconnect
    }

    /// Returns `true` if `epoch` is the live transport's epoch.
    #[inline]
    #[must_use]
    pub fn is_current(&self, epoch: Epoch) -> bool {
        self.epoch == epoch
    }

    /// Checks that a send is allowed right now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReady`] unless the state is `OPEN`.
    pub fn check_send(&self) -> Result<Epoch> {
        match self.state {
            ConnectionState::Open => Ok(self.epoch),
            state => Err(Error::not_ready(state)),
        }
    }

    /// Handles a completed handshake.
    ///
    /// Returns `None` when the open must be discarded (stale epoch, wrong
    /// state or shut down); the caller closes that transport.
    pub fn on_open(&mut self, epoch: Epoch) -> Option<ReadyKind> {
        if !self.should_reconnect
            || epoch != self.epoch
            || self.state != ConnectionState::Connecting
        {
            trace!(%epoch, current = %self.epoch, state = %self.state, "Discarding open");
            return None;
        }

        self.state = ConnectionState::Open;
        self.retry_count = 0;

        let kind = if self.opened_before {
            ReadyKind::Reconnected
        } else {
            ReadyKind::Welcome
        };
        self.opened_before = true;

        debug!(%epoch, ?kind, "Connection open");
        Some(kind)
    }

    /// Handles a transport error.
    ///
    /// Errors are not transitions: they are downgraded to a closure. Returns
    /// the epoch whose transport the caller must close, so that the
    /// resulting close event takes the single closure path.
    pub fn on_error(&mut self, epoch: Epoch) -> Option<Epoch> {
        if epoch != self.epoch || self.state == ConnectionState::Closed {
            return None;
        }
        Some(epoch)
    }

    /// Handles transport closure (including a failed connect).
    ///
    /// Returns the retry to schedule, or `None` if the closure is stale,
    /// already handled or reconnection is disabled.
    pub fn on_closed(&mut self, epoch: Epoch) -> Option<ScheduledRetry> {
        if epoch != self.epoch || self.state == ConnectionState::Closed {
            trace!(%epoch, current = %self.epoch, "Ignoring stale close");
            return None;
        }

        self.state = ConnectionState::Closed;

        if !self.should_reconnect {
            debug!(%epoch, "Closed after shutdown");
            return None;
        }

        let delay = self.backoff.delay(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_timer = self.last_timer.next();
        self.pending_timer = Some(self.last_timer);

        debug!(
            %epoch,
            attempt = self.retry_count,
            delay_ms = delay.as_millis() as u64,
            "Reconnect scheduled"
        );

        Some(ScheduledRetry {
            timer: self.last_timer,
            delay,
        })
    }

    /// Handles an elapsed retry timer.
    ///
    /// Returns the epoch to dial, or `None` if the timer is stale or was
    /// cancelled.
    pub fn on_retry_elapsed(&mut self, timer: TimerId) -> Option<Epoch> {
        if !self.should_reconnect || self.pending_timer != Some(timer) {
            trace!(%timer, "Ignoring stale retry timer");
            return None;
        }

        self.pending_timer = None;
        self.epoch = self.epoch.next();
        self.state = ConnectionState::Connecting;

        debug!(epoch = %self.epoch, "Reconnecting");
        Some(self.epoch)
    }

    /// Requests shutdown.
    ///
    /// The state becomes `CLOSED` for good. Returns the epoch whose
    /// transport must be closed, if any.
    pub fn shutdown(&mut self) -> Option<Epoch> {
        if !self.should_reconnect {
            return None;
        }

        self.should_reconnect = false;
        self.pending_timer = None;

        let previous = std::mem::replace(&mut self.state, ConnectionState::Closed);
        match previous {
            ConnectionState::Open | ConnectionState::Connecting => Some(self.epoch),
            ConnectionState::Closed => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
