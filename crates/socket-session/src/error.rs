//! Session error types.

use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The endpoint address is malformed or uses an unsupported scheme.
    #[error("invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),

    /// Transport-level failure. Retryable; absorbed into the reconnect
    /// cycle and never returned from `send`.
    #[error("transport error: {0}")]
    Transport(String),

    /// The bounded outbound queue is at capacity.
    #[error("outbound queue full (capacity {0})")]
    QueueFull(usize),

    /// The registered message handler panicked.
    #[error("message handler failed: {0}")]
    Handler(String),

    /// Payload serialization error
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// The session was shut down with `close()`.
    #[error("session closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for SessionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SessionError::Transport(err.to_string())
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
