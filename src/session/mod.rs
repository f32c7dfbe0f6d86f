//! Review session module.
//!
//! This module provides the public session surface and the state behind it:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Facade handle used by the rendering layer |
//! | [`SessionSnapshot`] | Read-only view: log, busy flag, connection state |
//! | [`Reconciler`] | Folds protocol events into the [`ConversationLog`] |
//! | [`SessionOptions`] | Endpoint, backoff and notice configuration |
//!
//! # Example
//!
//! ```no_run
//! use code_doctor::{Result, Session, SubmitOutcome};
//!
//! # async fn example() -> Result<()> {
//! let session = Session::connect("ws://127.0.0.1:9000").await?;
//! let mut updates = session.subscribe();
//!
//! updates.wait_for(|s| s.is_ready()).await.ok();
//! if session.submit("print(1)", "Python").await? == SubmitOutcome::Sent {
//!     updates.wait_for(|s| !s.busy).await.ok();
//! }
//!
//! for message in session.messages() {
//!     println!("{:?}: {}", message.sender, message.text);
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Builder for session configuration.
pub mod builder;

/// Session facade and snapshots.
pub mod core;

/// Single-task event loop.
mod event_loop;

/// Conversation messages.
pub mod message;

/// Session configuration types.
pub mod options;

/// Streaming reconciler and conversation log.
pub mod reconciler;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use self::core::{Observer, Session, SessionSnapshot, SubmitOutcome};
pub use message::{Message, Sender};
pub use options::{Notices, OrphanPolicy, SessionOptions};
pub use reconciler::{ConversationLog, ERROR_PREFIX, Reconciler};
