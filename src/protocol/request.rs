//! Outbound review request.
//!
//! One request frame is sent per user submission.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::to_string;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Instruction sent as `question` unless the session overrides it.
pub const DEFAULT_INSTRUCTION: &str = "Review this code. Explain the root cause of any errors \
     and suggest improvements in terms a beginner can follow.";

// ============================================================================
// ReviewRequest
// ============================================================================

/// A review request from the client to the endpoint.
///
/// # Format
///
/// ```json
/// {
///   "code": "print(1)",
///   "language": "Python",
///   "question": "Review this code..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRequest {
    /// Submitted source text.
    pub code: String,

    /// Language tag chosen by the user.
    pub language: String,

    /// Fixed instruction describing the desired response.
    pub question: String,
}

impl ReviewRequest {
    /// Creates a request carrying [`DEFAULT_INSTRUCTION`].
    #[inline]
    #[must_use]
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            question: DEFAULT_INSTRUCTION.to_string(),
        }
    }

    /// Replaces the instruction text.
    #[inline]
    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    /// Serializes the request into a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::InputRejected`] if `code` is blank
    /// - [`Error::Json`] if serialization fails
    pub fn encode(&self) -> Result<String> {
        if self.code.trim().is_empty() {
            return Err(Error::input_rejected("empty submission"));
        }
        Ok(to_string(self)?)
    }
}

/// Encodes a submission with the given instruction into a text frame.
///
/// # Errors
///
/// See [`ReviewRequest::encode`].
pub fn encode_request(code: &str, language: &str, instruction: &str) -> Result<String> {
    ReviewRequest::new(code, language)
        .with_question(instruction)
        .encode()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, from_str, json};

    #[test]
    fn test_request_wire_shape() {
        let frame = encode_request("print(1)", "Python", "Explain it").expect("encode");
        let value: Value = from_str(&frame).expect("valid json");

        assert_eq!(
            value,
            json!({
                "code": "print(1)",
                "language": "Python",
                "question": "Explain it",
            })
        );
    }

    #[test]
    fn test_default_instruction() {
        let request = ReviewRequest::new("x", "Python");
        assert_eq!(request.question, DEFAULT_INSTRUCTION);
    }

    #[test]
    fn test_code_is_sent_verbatim() {
        let code = "  fn main() {}\n";
        let frame = encode_request(code, "Rust", "q").expect("encode");
        let value: Value = from_str(&frame).expect("valid json");
        assert_eq!(value["code"], code);
    }

    #[test]
    fn test_blank_code_rejected() {
        let err = encode_request("  \n\t", "Python", "q").unwrap_err();
        assert!(matches!(err, Error::InputRejected { .. }));
    }
}
