//! WebSocket protocol message types.
//!
//! This module defines the frame format exchanged with the review endpoint.
//! It holds no state: encoding and decoding are pure functions.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ReviewRequest` | Local → Remote | One user submission |
//! | `ProtocolEvent` | Remote → Local | Streamed response status |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Inbound frames and their decoder |
//! | `request` | Outbound request and its encoder |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound event types.
pub mod event;

/// Outbound request type.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{ProtocolEvent, decode_frame};
pub use request::{DEFAULT_INSTRUCTION, ReviewRequest, encode_request};
