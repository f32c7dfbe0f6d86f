//! Inbound protocol events.
//!
//! Every frame from the endpoint is a JSON object discriminated by `status`.
//!
//! # Event Types
//!
//! | `status` | Payload | Variant |
//! |----------|---------|---------|
//! | `PENDING` | - | [`ProtocolEvent::Pending`] |
//! | `DELTA` | `text` | [`ProtocolEvent::Delta`] |
//! | `END` | - | [`ProtocolEvent::End`] |
//! | `ERROR` | `message` | [`ProtocolEvent::Error`] |
//! | `COMPLETED` | `review` | [`ProtocolEvent::CompletedLegacy`] |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value, from_str};

use crate::error::{Error, Result};

// ============================================================================
// ProtocolEvent
// ============================================================================

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// A streamed response is about to start.
    Pending,

    /// Incremental text belonging to the in-progress response.
    Delta {
        /// Text fragment to append.
        text: String,
    },

    /// The in-progress response is complete.
    End,

    /// The endpoint failed to produce a response.
    Error {
        /// Human-readable reason. Empty when the endpoint sent none.
        message: String,
    },

    /// Whole response delivered at once by a non-streaming endpoint.
    CompletedLegacy {
        /// Full response text.
        review: String,
    },
}

impl ProtocolEvent {
    /// Returns the wire `status` for this event.
    #[inline]
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Delta { .. } => "DELTA",
            Self::End => "END",
            Self::Error { .. } => "ERROR",
            Self::CompletedLegacy { .. } => "COMPLETED",
        }
    }

    /// Returns `true` if this event ends the current response.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::End | Self::Error { .. } | Self::CompletedLegacy { .. }
        )
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes one inbound text frame.
///
/// Missing optional fields decode as empty strings; unknown fields are
/// ignored.
///
/// # Errors
///
/// - [`Error::MalformedFrame`] if the payload is not a JSON object with a
///   string `status`
/// - [`Error::UnknownStatus`] if `status` is not one of the known values
pub fn decode_frame(text: &str) -> Result<ProtocolEvent> {
    let value: Value = from_str(text).map_err(|e| Error::malformed_frame(e.to_string()))?;

    let Value::Object(fields) = value else {
        return Err(Error::malformed_frame("frame is not a JSON object"));
    };

    let status = fields
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::malformed_frame("missing string field `status`"))?;

    match status {
        "PENDING" => Ok(ProtocolEvent::Pending),
        "DELTA" => Ok(ProtocolEvent::Delta {
            text: get_string(&fields, "text"),
        }),
        "END" => Ok(ProtocolEvent::End),
        "ERROR" => Ok(ProtocolEvent::Error {
            message: get_string(&fields, "message"),
        }),
        "COMPLETED" => Ok(ProtocolEvent::CompletedLegacy {
            review: get_string(&fields, "review"),
        }),
        other => Err(Error::unknown_status(other)),
    }
}

/// Gets a string field, returning empty string if absent or not a string.
#[inline]
fn get_string(fields: &Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Tests
// ============================================================================
