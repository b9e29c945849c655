//! Session manager.
//!
//! One logical connection per [`Session`]. A single event-loop task owns
//! the transport and serializes every state transition and queue drain;
//! callers interact through the handle, which never blocks on network I/O.

use crate::backoff::Backoff;
use crate::queue::OutboundQueue;
use crate::transport::{Connector, Transport, WsConnector};
use crate::{Payload, SessionConfig, SessionError, SessionResult};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Interval};
use tracing::{debug, info, warn};
use url::Url;

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Transport state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A handshake is in progress.
    Connecting,
    /// The transport is up; the outbound queue drains as messages arrive.
    Open,
    /// Waiting out the backoff delay before the next handshake.
    Reconnecting,
    /// Terminal; entered only through `close()`.
    Closed,
}

/// Lifecycle events emitted by a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The transport handshake succeeded.
    Connected,
    /// The transport was lost; the reason is `None` for an orderly peer
    /// close.
    Disconnected(Option<String>),
    /// A reconnect attempt is scheduled after the given delay.
    Reconnecting { attempt: u32, delay: Duration },
    /// The registered message handler panicked on one message.
    HandlerError(String),
    /// The session reached its terminal state.
    Closed,
}

type MessageHandler = Arc<dyn Fn(Payload) + Send + Sync>;

/// Open a session to a WebSocket endpoint.
///
/// Validates the endpoint, spawns the session task, and returns the handle
/// immediately; connecting proceeds in the background.
pub fn open(endpoint: &str, config: SessionConfig) -> SessionResult<Session> {
    open_with_connector(endpoint, config, WsConnector)
}

/// Open a session with a caller-supplied connector.
pub fn open_with_connector<C: Connector>(
    endpoint: &str,
    config: SessionConfig,
    connector: C,
) -> SessionResult<Session> {
    let endpoint = parse_endpoint(endpoint)?;
    let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(SessionState::Connecting);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let shared = Arc::new(Shared {
        queue: OutboundQueue::new(config.max_queue_size),
        endpoint,
        config,
        events_tx,
        state_tx,
        handler: std::sync::Mutex::new(None),
        last_error: std::sync::Mutex::new(None),
    });

    info!(endpoint = %shared.endpoint, "Opening session");
    let task = tokio::spawn(run_session(shared.clone(), connector, shutdown_rx));

    Ok(Session {
        shared,
        state_rx,
        shutdown_tx,
        task: Mutex::new(Some(task)),
    })
}

fn parse_endpoint(endpoint: &str) -> SessionResult<Url> {
    let url = Url::parse(endpoint)
        .map_err(|e| SessionError::InvalidEndpoint(endpoint.to_string(), e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(SessionError::InvalidEndpoint(
            endpoint.to_string(),
            format!("unsupported scheme {other:?}"),
        )),
    }
}

/// Handle to one logical, reconnecting connection.
///
/// Cheap operations only; all I/O lives on the session task. Dropping the
/// handle without calling [`Session::close`] signals the task to stop but
/// does not wait for it.
pub struct Session {
    shared: Arc<Shared>,
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Current transport state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Enqueue a payload for delivery and return its sequence number.
    ///
    /// Works in every state except `Closed`: messages queued while the
    /// transport is down are delivered in enqueue order once it comes back.
    /// Fails with `QueueFull` if a bounded queue is at capacity.
    pub fn send(&self, payload: impl Into<Payload>) -> SessionResult<u64> {
        if self.state() == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        self.shared.queue.enqueue(payload.into())
    }

    /// Serialize a value as JSON and enqueue it as a text payload.
    ///
    /// A serialization failure fails this call only.
    pub fn send_json<T: Serialize>(&self, value: &T) -> SessionResult<u64> {
        self.send(Payload::json(value)?)
    }

    /// Register the message handler, replacing any previous one.
    ///
    /// The handler runs on the session task, once per received message in
    /// receipt order. A panic inside it is caught and reported as a
    /// [`SessionEvent::HandlerError`] without terminating the session.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        *self.shared.handler.lock().expect("lock poisoned") = Some(Arc::new(handler));
    }

    /// Number of messages waiting in the outbound queue.
    pub fn pending(&self) -> usize {
        self.shared.queue.len()
    }

    /// The most recent transport error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().expect("lock poisoned").clone()
    }

    /// Shut the session down.
    ///
    /// Stops reconnect attempts, cancels any in-flight handshake or backoff
    /// timer, releases the transport, and waits for the session task to
    /// finish. After this returns no further handler invocations occur.
    /// Idempotent.
    pub async fn close(&self) {
        let task = self.task.lock().await.take();
        let Some(task) = task else {
            debug!("Session already closed");
            return;
        };

        let _ = self.shutdown_tx.send(true);
        if task.await.is_err() {
            warn!("Session task terminated abnormally");
        }
        info!(endpoint = %self.shared.endpoint, "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// State shared between the handle and the session task.
struct Shared {
    endpoint: Url,
    config: SessionConfig,
    queue: OutboundQueue,
    events_tx: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    handler: std::sync::Mutex<Option<MessageHandler>>,
    last_error: std::sync::Mutex<Option<String>>,
}

impl Shared {
    fn set_state(&self, state: SessionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody subscribed is fine
        let _ = self.events_tx.send(event);
    }

    fn record_error(&self, reason: String) {
        *self.last_error.lock().expect("lock poisoned") = Some(reason);
    }

    /// Invoke the registered handler for one received message.
    fn deliver(&self, payload: Payload) {
        let handler = self.handler.lock().expect("lock poisoned").clone();
        let Some(handler) = handler else {
            debug!("No handler registered, dropping inbound message");
            return;
        };

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(payload))) {
            let reason = panic_reason(panic.as_ref());
            warn!(error = %reason, "Message handler panicked");
            self.emit(SessionEvent::HandlerError(reason));
        }
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Why an open connection stopped being driven.
enum OpenOutcome {
    /// `close()` was called.
    Shutdown,
    /// The transport failed mid-use.
    TransportLost(String),
    /// The peer closed the connection in an orderly fashion.
    PeerClosed,
}

/// The session event loop. Owns all state transitions.
async fn run_session<C: Connector>(
    shared: Arc<Shared>,
    connector: C,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff = Backoff::new(&shared.config);

    loop {
        shared.set_state(SessionState::Connecting);

        let handshake = tokio::select! {
            outcome = timeout(
                shared.config.handshake_timeout,
                connector.connect(&shared.endpoint),
            ) => Some(outcome),
            _ = shutdown_rx.changed() => None,
        };

        let transport = match handshake {
            None => break,
            Some(Ok(Ok(transport))) => Some(transport),
            Some(Ok(Err(e))) => {
                warn!(endpoint = %shared.endpoint, error = %e, "Handshake failed");
                shared.record_error(e.to_string());
                None
            }
            Some(Err(_)) => {
                let reason = format!(
                    "handshake timed out after {:?}",
                    shared.config.handshake_timeout
                );
                warn!(endpoint = %shared.endpoint, "Handshake timed out");
                shared.record_error(reason);
                None
            }
        };

        if let Some(mut transport) = transport {
            backoff.reset();
            shared.set_state(SessionState::Open);
            shared.emit(SessionEvent::Connected);
            info!(endpoint = %shared.endpoint, "Session open");

            match drive_open(&shared, &mut transport, &mut shutdown_rx).await {
                OpenOutcome::Shutdown => {
                    transport.close().await;
                    break;
                }
                OpenOutcome::TransportLost(reason) => {
                    warn!(endpoint = %shared.endpoint, error = %reason, "Transport lost");
                    shared.record_error(reason.clone());
                    shared.emit(SessionEvent::Disconnected(Some(reason)));
                }
                OpenOutcome::PeerClosed => {
                    info!(endpoint = %shared.endpoint, "Connection closed by peer");
                    shared.emit(SessionEvent::Disconnected(None));
                }
            }
        }

        if *shutdown_rx.borrow() {
            break;
        }

        let delay = backoff.next_delay();
        shared.set_state(SessionState::Reconnecting);
        shared.emit(SessionEvent::Reconnecting {
            attempt: backoff.attempt(),
            delay,
        });
        info!(
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    shared.set_state(SessionState::Closed);
    shared.emit(SessionEvent::Closed);
    debug!("Session task finished");
}

/// Drive one open connection: flush the queue in sequence order, deliver
/// received messages, send keepalive pings.
async fn drive_open<T: Transport>(
    shared: &Shared,
    transport: &mut T,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> OpenOutcome {
    let mut heartbeat = shared.config.heartbeat_interval.map(interval);
    if let Some(hb) = heartbeat.as_mut() {
        // The first interval tick completes immediately; consume it so the
        // first ping waits a full period.
        hb.tick().await;
    }

    loop {
        // Flush pending messages, oldest first. A message leaves the queue
        // only after the write is confirmed; on failure it stays put and is
        // retransmitted on the next connection.
        while let Some(message) = shared.queue.front() {
            if let Err(e) = transport.send(message.payload.clone()).await {
                return OpenOutcome::TransportLost(e.to_string());
            }
            shared.queue.ack(message.seq);
            debug!(seq = message.seq, "Delivered outbound message");
        }

        tokio::select! {
            _ = shared.queue.notified() => {}
            incoming = transport.recv() => match incoming {
                Some(Ok(payload)) => shared.deliver(payload),
                Some(Err(e)) => return OpenOutcome::TransportLost(e.to_string()),
                None => return OpenOutcome::PeerClosed,
            },
            _ = heartbeat_tick(&mut heartbeat) => {
                if let Err(e) = transport.ping().await {
                    return OpenOutcome::TransportLost(e.to_string());
                }
                debug!("Sent keepalive ping");
            }
            _ = shutdown_rx.changed() => return OpenOutcome::Shutdown,
        }
    }
}

async fn heartbeat_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_accepts_ws_and_wss() {
        assert!(parse_endpoint("ws://localhost:8080/socket").is_ok());
        assert!(parse_endpoint("wss://example.com/socket").is_ok());
    }

    #[test]
    fn test_parse_endpoint_rejects_other_schemes() {
        let err = parse_endpoint("http://localhost:8080/socket").unwrap_err();
        assert!(matches!(err, SessionError::InvalidEndpoint(_, _)));
    }

    #[test]
    fn test_parse_endpoint_rejects_garbage() {
        let err = parse_endpoint("not an endpoint").unwrap_err();
        assert!(matches!(err, SessionError::InvalidEndpoint(_, _)));
    }

    #[tokio::test]
    async fn test_open_starts_in_connecting_state() {
        let session = open("ws://localhost:1/socket", SessionConfig::default()).unwrap();
        assert_ne!(session.state(), SessionState::Closed);
        assert_eq!(session.pending(), 0);
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_open_rejects_invalid_endpoint() {
        let result = open("ftp://example.com", SessionConfig::default());
        assert!(matches!(
            result,
            Err(SessionError::InvalidEndpoint(_, _))
        ));
    }

    #[test]
    fn test_panic_reason_extracts_messages() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_reason(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom".to_string());
        assert_eq!(panic_reason(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42u32);
        assert_eq!(panic_reason(boxed.as_ref()), "unknown panic");
    }
}
