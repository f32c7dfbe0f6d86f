//! Session configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use code_doctor::{OrphanPolicy, SessionOptions};
//!
//! let options = SessionOptions::new(url)
//!     .with_base_delay(Duration::from_millis(500))
//!     .with_orphan_policy(OrphanPolicy::FinalizeAsError);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_INSTRUCTION;
use crate::transport::{Backoff, MAX_DELAY_LIMIT};

// ============================================================================
// OrphanPolicy
// ============================================================================

/// What happens to a streaming message when the transport closes under it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Leave the message unfinalized until a later stream replaces it.
    #[default]
    Keep,
    /// Finalize it as an error notice.
    FinalizeAsError,
}

// ============================================================================
// Notices
// ============================================================================

/// Texts the session inserts into the conversation on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notices {
    /// Shown on the first successful connection.
    pub welcome: String,
    /// Shown on every later successful connection.
    pub reconnected: String,
    /// Shown when the user submits while not connected.
    pub disconnected: String,
    /// Shown for an `ERROR` frame without a message.
    pub fallback_error: String,
    /// Shown for a stream finalized by [`OrphanPolicy::FinalizeAsError`].
    pub orphaned: String,
}

impl Default for Notices {
    fn default() -> Self {
        Self {
            welcome: "Hello! I'm the AI Code Doctor. What can I help you with?".into(),
            reconnected: "⚡ Reconnected. Carry on where you left off.".into(),
            disconnected: "🔌 Disconnected. Reconnecting automatically; \
                           please wait a moment and try again."
                .into(),
            fallback_error: "An error occurred. Please wait a while and try again.".into(),
            orphaned: "The connection was lost before the response finished.".into(),
        }
    }
}

// ============================================================================
// SessionOptions
// ============================================================================

/// Validated configuration for a [`Session`](super::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Review endpoint (`ws://` or `wss://`).
    pub url: Url,
    /// Reconnect delays.
    pub backoff: Backoff,
    /// Sent as `question` with every request.
    pub instruction: String,
    /// Session-generated message texts.
    pub notices: Notices,
    /// Handling of streams cut off by a disconnect.
    pub orphan_policy: OrphanPolicy,
}

impl SessionOptions {
    /// Creates options for `url` with reference defaults.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            backoff: Backoff::default(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            notices: Notices::default(),
            orphan_policy: OrphanPolicy::default(),
        }
    }

    /// Sets the first reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.backoff.base = delay;
        self
    }

    /// Sets the reconnect delay cap.
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.backoff.max = delay;
        self
    }

    /// Sets the instruction text.
    #[inline]
    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Sets the notice texts.
    #[inline]
    #[must_use]
    pub fn with_notices(mut self, notices: Notices) -> Self {
        self.notices = notices;
        self
    }

    /// Sets the orphaned stream policy.
    #[inline]
    #[must_use]
    pub fn with_orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = policy;
        self
    }

    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL scheme is not `ws`/`wss`, the
    /// base delay is zero or above the cap, the cap exceeds
    /// [`MAX_DELAY_LIMIT`], or the instruction is blank.
    pub fn validate(&self) -> Result<()> {
        match self.url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::config(format!(
                    "Endpoint must use ws:// or wss://, got {other}://"
                )));
            }
        }

        if self.backoff.base.is_zero() {
            return Err(Error::config("Base reconnect delay must be non-zero"));
        }

        if self.backoff.base > self.backoff.max {
            return Err(Error::config(format!(
                "Base reconnect delay ({}ms) exceeds the cap ({}ms)",
                self.backoff.base.as_millis(),
                self.backoff.max.as_millis()
            )));
        }

        if self.backoff.max > MAX_DELAY_LIMIT {
            return Err(Error::config(format!(
                "Reconnect delay cap ({}s) exceeds the limit ({}s)",
                self.backoff.max.as_secs(),
                MAX_DELAY_LIMIT.as_secs()
            )));
        }

        if self.instruction.trim().is_empty() {
            return Err(Error::config("Instruction text must not be empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
