//! Code Doctor - resilient streamed review sessions over WebSocket.
//!
//! This library keeps one persistent WebSocket connection to a review
//! endpoint, reconnects automatically with exponential backoff, and folds
//! the endpoint's incrementally streamed answers into a stable, append-only
//! conversation.
//!
//! # Architecture
//!
//! - **Codec** ([`protocol`]): request encoding, frame decoding, no state
//! - **Controller** ([`transport`]): `CONNECTING → OPEN → CLOSED` state
//!   machine, retry timer, one live transport at a time
//! - **Reconciler** ([`session::Reconciler`]): protocol events → conversation
//!   log, at most one streaming message
//! - **Facade** ([`Session`]): submit, snapshots, change notifications
//!
//! Everything runs on one event loop task per session; the facade only reads
//! published snapshots.
//!
//! # Quick Start
//!
//! ```no_run
//! use code_doctor::{Result, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::builder()
//!         .url("ws://127.0.0.1:9000")
//!         .connect()
//!         .await?;
//!
//!     let mut updates = session.subscribe();
//!     updates.wait_for(|s| s.is_ready()).await.ok();
//!
//!     session.submit("print(1)", "Python").await?;
//!     updates.wait_for(|s| !s.busy).await.ok();
//!
//!     if let Some(answer) = session.messages().last() {
//!         println!("{}", answer.text);
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire frame types and codec |
//! | [`session`] | Facade, reconciler, configuration |
//! | [`transport`] | Connection lifecycle and WebSocket transport |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for streams, epochs and timers.
pub mod identifiers;

/// WebSocket protocol message types.
///
/// Stateless encoding of requests and decoding of status frames.
pub mod protocol;

/// Review session: facade, reconciler and configuration.
///
/// Use [`Session::builder()`] to start a configured session.
pub mod session;

/// WebSocket transport layer.
///
/// Connection lifecycle, reconnect backoff and the live transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{
    ConversationLog, Message, Notices, Observer, OrphanPolicy, Reconciler, Sender, Session,
    SessionBuilder, SessionOptions, SessionSnapshot, SubmitOutcome,
};

// Protocol types
pub use protocol::{ProtocolEvent, ReviewRequest, decode_frame, encode_request};

// Transport types
pub use transport::{Backoff, ConnectionState};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Epoch, StreamId, TimerId};
