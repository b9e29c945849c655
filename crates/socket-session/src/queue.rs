//! Outbound message queue.
//!
//! Ordered buffer of messages awaiting transmission. Sequence numbers are
//! assigned at enqueue time and a message is removed only after the
//! transport confirms the write, so anything unconfirmed when a connection
//! drops is retransmitted on the next one (at-least-once, in enqueue
//! order).

use crate::{Payload, SessionError, SessionResult};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::debug;

/// A queued outbound message.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Sequence number assigned at enqueue time. Monotonically increasing
    /// for the lifetime of the session.
    pub seq: u64,
    /// The payload to transmit.
    pub payload: Payload,
}

struct Inner {
    pending: VecDeque<OutboundMessage>,
    next_seq: u64,
}

/// Outbound queue for a single session.
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    /// 0 = unbounded.
    max_size: usize,
}

impl OutboundQueue {
    /// Create a queue. `max_size` of 0 means unbounded.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                next_seq: 1,
            }),
            notify: Notify::new(),
            max_size,
        }
    }

    /// Enqueue a payload at the tail and return its sequence number.
    ///
    /// Fails with `QueueFull` if the queue is bounded and at capacity.
    pub fn enqueue(&self, payload: Payload) -> SessionResult<u64> {
        let seq = {
            let mut inner = self.inner.lock().expect("lock poisoned");
            if self.max_size > 0 && inner.pending.len() >= self.max_size {
                return Err(SessionError::QueueFull(self.max_size));
            }

            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.pending.push_back(OutboundMessage { seq, payload });
            seq
        };

        debug!(seq, "Enqueued outbound message");
        self.notify.notify_one();
        Ok(seq)
    }

    /// The message at the head of the queue, if any. The message stays
    /// queued until `ack` confirms the write.
    pub fn front(&self) -> Option<OutboundMessage> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .pending
            .front()
            .cloned()
    }

    /// Remove the head of the queue after a confirmed write.
    pub fn ack(&self, seq: u64) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.pending.front() {
            Some(front) if front.seq == seq => {
                inner.pending.pop_front();
            }
            _ => debug!(seq, "Ack for message no longer at queue head"),
        }
    }

    /// Number of pending messages.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").pending.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until `enqueue` signals new work. A signal sent while nobody
    /// is waiting is stored and consumed by the next call.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
