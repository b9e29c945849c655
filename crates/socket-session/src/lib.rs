//! socket-session: reconnecting WebSocket session manager.
//!
//! One [`Session`] owns one logical connection to a remote endpoint and
//! hides transport churn behind a stable send/receive API.
//!
//! # Core Invariants
//!
//! 1. **Ordered delivery**: outbound messages reach the transport in
//!    enqueue order, tracked by sequence numbers assigned at enqueue time.
//! 2. **At-least-once**: a message leaves the outbound queue only after
//!    the transport confirms the write; anything unconfirmed when a
//!    connection drops is retransmitted on the next one.
//! 3. **Retry until closed**: transport failures never surface to callers;
//!    the session reconnects with capped exponential backoff until
//!    `close()` is called.
//! 4. **Serialized effects**: a single event-loop task per session owns
//!    every state transition and queue drain; `send` and handler
//!    registration are safe from any task.
//!
//! # Architecture
//!
//! ```text
//! send() ──▶ OutboundQueue ──▶ Session task ──▶ Transport ──▶ endpoint
//!                                   │
//! handler ◀── deliver ◀─────────────┘ (receive path)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use socket_session::{open, SessionConfig};
//!
//! let session = open("ws://localhost:8080/socket", SessionConfig::default())?;
//! session.set_handler(|payload| println!("received: {payload:?}"));
//! session.send_json(&serde_json::json!({"msg": "helooooo"}))?;
//! // ...
//! session.close().await;
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod manager;
pub mod payload;
pub mod queue;
pub mod transport;

#[cfg(test)]
mod tests;

pub use backoff::Backoff;
pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use manager::{open, open_with_connector, Session, SessionEvent, SessionState};
pub use payload::Payload;
pub use queue::{OutboundMessage, OutboundQueue};
pub use transport::{Connector, Transport, WsConnector, WsTransport};
