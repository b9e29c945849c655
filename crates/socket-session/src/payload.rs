//! Outbound/inbound message payloads.
//!
//! Payloads are opaque to the session manager: the server protocol is the
//! caller's business. `Payload::json` is a convenience for callers that
//! speak JSON over text frames.

use crate::SessionResult;
use serde::Serialize;

/// An opaque message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Payload {
    /// Serialize a value to a JSON text payload.
    ///
    /// A serialization failure is a per-call error; it never affects
    /// session state.
    pub fn json<T: Serialize>(value: &T) -> SessionResult<Self> {
        Ok(Payload::Text(serde_json::to_string(value)?))
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the payload as text, if it is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Binary(data)
    }
}
