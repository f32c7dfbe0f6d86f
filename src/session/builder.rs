//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and starting [`Session`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use code_doctor::Session;
//!
//! # async fn example() -> code_doctor::Result<()> {
//! let session = Session::builder()
//!     .url("ws://127.0.0.1:9000")
//!     .max_delay(Duration::from_secs(5))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

use super::core::Session;
use super::options::{Notices, OrphanPolicy, SessionOptions};

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`].
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct SessionBuilder {
    /// Prepared options the other settings are applied on top of.
    options: Option<SessionOptions>,
    /// Endpoint URL, unparsed.
    url: Option<String>,
    /// First reconnect delay.
    base_delay: Option<Duration>,
    /// Reconnect delay cap.
    max_delay: Option<Duration>,
    /// Instruction text.
    instruction: Option<String>,
    /// Notice texts.
    notices: Option<Notices>,
    /// Orphaned stream policy.
    orphan_policy: Option<OrphanPolicy>,
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from prepared options.
    ///
    /// Settings made on the builder, before or after, take precedence.
    /// The result is still validated by [`Self::build`].
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets the endpoint URL (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the first reconnect delay (default 1s).
    #[inline]
    #[must_use]
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Sets the reconnect delay cap (default 10s).
    #[inline]
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Sets the instruction sent with every request.
    #[inline]
    #[must_use]
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Sets the session-generated notice texts.
    #[inline]
    #[must_use]
    pub fn notices(mut self, notices: Notices) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Sets the orphaned stream policy.
    #[inline]
    #[must_use]
    pub fn orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_policy = Some(policy);
        self
    }

    /// Builds validated options without connecting.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if neither a URL nor options were set, or
    ///   validation fails
    /// - [`Error::Url`] if the URL does not parse
    pub fn build(self) -> Result<SessionOptions> {
        let mut options = match (self.options, self.url) {
            (Some(mut options), Some(url)) => {
                options.url = Url::parse(&url)?;
                options
            }
            (Some(options), None) => options,
            (None, Some(url)) => SessionOptions::new(Url::parse(&url)?),
            (None, None) => {
                return Err(Error::config(
                    "Endpoint URL is required. Use .url() to set it.\n\
                     Example: Session::builder().url(\"wss://example.com/prod\")",
                ));
            }
        };

        if let Some(delay) = self.base_delay {
            options = options.with_base_delay(delay);
        }
        if let Some(delay) = self.max_delay {
            options = options.with_max_delay(delay);
        }
        if let Some(instruction) = self.instruction {
            options = options.with_instruction(instruction);
        }
        if let Some(notices) = self.notices {
            options = options.with_notices(notices);
        }
        if let Some(policy) = self.orphan_policy {
            options = options.with_orphan_policy(policy);
        }

        options.validate()?;
        Ok(options)
    }

    /// Validates the configuration and starts the session.
    ///
    /// The first connection attempt is issued immediately; this does not
    /// wait for it to complete.
    ///
    /// # Errors
    ///
    /// See [`Self::build`].
    pub async fn connect(self) -> Result<Session> {
        let options = self.build()?;
        Ok(Session::start(options))
    }
}

// ============================================================================
// Tests
// ============================================================================
