//! Session configuration.

use std::time::Duration;

/// Session manager configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay before the first reconnect attempt.
    pub initial_backoff: Duration,
    /// Cap on the reconnect delay.
    pub max_backoff: Duration,
    /// Jitter fraction added to each backoff delay, in `0.0..=1.0`.
    /// `0.0` disables jitter and yields the exact doubling sequence.
    pub backoff_jitter: f64,
    /// Maximum number of queued outbound messages. `0` means unbounded;
    /// a positive bound makes `send` fail with `QueueFull` at capacity.
    pub max_queue_size: usize,
    /// Time allowed for the transport handshake before the attempt is
    /// counted as failed.
    pub handshake_timeout: Duration,
    /// WebSocket ping cadence while the session is open. `None` disables
    /// keepalive pings.
    pub heartbeat_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            backoff_jitter: 0.1,
            max_queue_size: 0,
            handshake_timeout: Duration::from_secs(10),
            heartbeat_interval: Some(Duration::from_secs(30)),
        }
    }
}
