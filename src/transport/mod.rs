//! WebSocket transport layer.
//!
//! This module owns the single logical connection between the session and
//! the review endpoint, including automatic reconnection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌─────────────────┐
//! │  Session event loop  │                          │  Review         │
//! │                      │        WebSocket         │  endpoint       │
//! │  Controller          │◄────────────────────────►│                 │
//! │  ├─ Lifecycle        │     one live epoch       │                 │
//! │  └─ Connection       │                          │                 │
//! └──────────────────────┘                          └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Controller::start` - dial epoch 1 immediately (`CONNECTING`)
//! 2. `TransportEventKind::Opened` - handshake done (`OPEN`), retry counter reset
//! 3. Remote close / error - error is downgraded to a close (`CLOSED`)
//! 4. `Backoff::delay` - retry timer armed; on expiry a new epoch is dialled
//! 5. `Controller::shutdown` - timer cancelled, transport closed, no retry
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Exponential reconnect delays |
//! | `connection` | One WebSocket transport and its event loop |
//! | `controller` | Lifecycle + live transport + retry timer |
//! | `lifecycle` | Pure connection state machine |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect backoff policy.
pub mod backoff;

/// WebSocket connection and event loop.
pub mod connection;

/// Connection lifecycle controller.
pub mod controller;

/// Connection state machine.
pub mod lifecycle;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::{Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, MAX_DELAY_LIMIT};
pub use connection::{Connection, TransportEvent, TransportEventKind};
pub use controller::{Controller, ControllerOutput};
pub use lifecycle::{ConnectionState, Lifecycle, ReadyKind, ScheduledRetry};
