//! Reconnect behavior: backoff cycles, handshake timeouts, redelivery.

use super::harness::{test_config, wait_for, wait_for_state, ConnectOutcome, MockConnector};
use crate::{open_with_connector, Payload, SessionConfig, SessionState};
use std::time::Duration;

#[tokio::test]
async fn unreachable_for_three_attempts_then_open_on_fourth() {
    let connector = MockConnector::new();
    connector.script([
        ConnectOutcome::Refuse,
        ConnectOutcome::Refuse,
        ConnectOutcome::Refuse,
    ]);

    let session =
        open_with_connector("ws://mock/socket", test_config(), connector.clone()).unwrap();

    assert!(wait_for_state(&session, SessionState::Open, Duration::from_secs(2)).await);
    assert_eq!(connector.attempts(), 4);

    session.close().await;
}

#[tokio::test]
async fn handshake_hang_counts_as_failed_attempt() {
    let connector = MockConnector::new();
    connector.script([ConnectOutcome::Hang]);

    let session =
        open_with_connector("ws://mock/socket", test_config(), connector.clone()).unwrap();

    assert!(wait_for_state(&session, SessionState::Open, Duration::from_secs(2)).await);
    assert_eq!(connector.attempts(), 2);
    assert!(session
        .last_error()
        .expect("timeout should be recorded")
        .contains("timed out"));

    session.close().await;
}

#[tokio::test]
async fn failed_write_leaves_message_queued_until_redelivered() {
    let connector = MockConnector::new();
    let server = connector.server();

    let session =
        open_with_connector("ws://mock/socket", test_config(), connector.clone()).unwrap();
    assert!(wait_for_state(&session, SessionState::Open, Duration::from_secs(2)).await);

    // First write fails mid-flight; the message must stay queued
    server.set_fail_sends(true);
    session.send("a").unwrap();

    let attempts_before = connector.attempts();
    assert!(
        wait_for(|| connector.attempts() > attempts_before, Duration::from_secs(2)).await,
        "write failure should force a reconnect"
    );
    server.set_fail_sends(false);

    assert!(wait_for(|| server.delivered_count() == 1, Duration::from_secs(2)).await);
    assert_eq!(server.delivered(), vec![Payload::from("a")]);
    assert!(wait_for(|| session.pending() == 0, Duration::from_secs(2)).await);

    session.close().await;
}

#[tokio::test]
async fn dropped_connection_triggers_reconnect_and_preserves_queue() {
    let connector = MockConnector::new();
    connector.set_default(ConnectOutcome::Accept);
    let server = connector.server();

    let session =
        open_with_connector("ws://mock/socket", test_config(), connector.clone()).unwrap();
    assert!(wait_for_state(&session, SessionState::Open, Duration::from_secs(2)).await);

    session.send("before-drop").unwrap();
    assert!(wait_for(|| server.delivered_count() == 1, Duration::from_secs(2)).await);

    let attempts_before = connector.attempts();
    server.drop_connection();

    // The manager reconnects on its own and the session stays usable
    assert!(
        wait_for(|| connector.attempts() > attempts_before, Duration::from_secs(2)).await
    );
    session.send("after-drop").unwrap();
    assert!(wait_for(|| server.delivered_count() == 2, Duration::from_secs(2)).await);
    assert_eq!(
        server.delivered(),
        vec![Payload::from("before-drop"), Payload::from("after-drop")]
    );

    session.close().await;
}

#[tokio::test]
async fn reconnecting_events_carry_increasing_attempts() {
    let connector = MockConnector::new();
    connector.set_default(ConnectOutcome::Refuse);

    let session =
        open_with_connector("ws://mock/socket", test_config(), connector.clone()).unwrap();
    let mut events = session.subscribe();

    let mut last_attempt = 0;
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("expected a lifecycle event")
            .expect("event channel closed");
        if let crate::SessionEvent::Reconnecting { attempt, delay } = event {
            assert!(attempt > last_attempt);
            assert!(delay <= test_config().max_backoff);
            last_attempt = attempt;
        }
    }
    assert!(last_attempt >= 1, "expected at least one reconnecting event");

    session.close().await;
}

#[tokio::test]
async fn backoff_resets_after_successful_connection() {
    let connector = MockConnector::new();
    connector.script([ConnectOutcome::Refuse, ConnectOutcome::Refuse]);

    let session =
        open_with_connector("ws://mock/socket", test_config(), connector.clone()).unwrap();
    assert!(wait_for_state(&session, SessionState::Open, Duration::from_secs(2)).await);

    // Drop the connection; the first reconnect delay starts over at the
    // initial backoff, observable through the event stream
    let mut events = session.subscribe();
    connector.server().drop_connection();

    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("expected a lifecycle event")
            .expect("event channel closed");
        if let crate::SessionEvent::Reconnecting { attempt, delay } = event {
            assert_eq!(attempt, 1);
            assert_eq!(delay, test_config().initial_backoff);
            break;
        }
    }

    session.close().await;
}

#[tokio::test]
async fn heartbeat_pings_flow_while_open() {
    let connector = MockConnector::new();
    let server = connector.server();

    let config = SessionConfig {
        heartbeat_interval: Some(Duration::from_millis(20)),
        ..test_config()
    };
    let session = open_with_connector("ws://mock/socket", config, connector.clone()).unwrap();

    assert!(wait_for_state(&session, SessionState::Open, Duration::from_secs(2)).await);
    assert!(wait_for(|| server.ping_count() >= 2, Duration::from_secs(2)).await);

    session.close().await;
}
