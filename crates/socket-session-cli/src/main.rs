//! socket-session binary entry point.
//!
//! Opens a resilient session to a WebSocket endpoint, prints every
//! received message, optionally sends one JSON message, and keeps the
//! session alive (reconnecting as needed) until ctrl-c.

use clap::Parser;
use socket_session::{open, SessionConfig, SessionEvent};
use std::time::Duration;
use tracing::{info, warn};

/// Resilient WebSocket session client.
#[derive(Parser, Debug)]
#[command(name = "socket-session")]
#[command(about = "Connect to a WebSocket endpoint through a reconnecting session")]
struct Args {
    /// Endpoint to connect to.
    #[arg(long, env = "SOCKET_SESSION_ENDPOINT", default_value = "ws://localhost:8080/socket")]
    endpoint: String,

    /// Send this message (wrapped as {"msg": ...}) once the session opens.
    #[arg(long)]
    message: Option<String>,

    /// Delay before the first reconnect attempt, in milliseconds.
    #[arg(long, default_value = "500")]
    initial_backoff_ms: u64,

    /// Cap on the reconnect delay, in milliseconds.
    #[arg(long, default_value = "30000")]
    max_backoff_ms: u64,

    /// Outbound queue bound (0 = unbounded).
    #[arg(long, default_value = "0")]
    max_queue_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = SessionConfig {
        initial_backoff: Duration::from_millis(args.initial_backoff_ms),
        max_backoff: Duration::from_millis(args.max_backoff_ms),
        max_queue_size: args.max_queue_size,
        ..Default::default()
    };

    info!(endpoint = %args.endpoint, "Starting session");
    let session = open(&args.endpoint, config)?;

    session.set_handler(|payload| match payload.as_text() {
        Some(text) => println!("{text}"),
        None => println!("<{} binary bytes>", payload.len()),
    });

    // Surface lifecycle events in the log
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Connected => info!("Connected"),
                SessionEvent::Disconnected(reason) => {
                    warn!(reason = ?reason, "Disconnected");
                }
                SessionEvent::Reconnecting { attempt, delay } => {
                    info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");
                }
                SessionEvent::HandlerError(reason) => {
                    warn!(error = %reason, "Handler error");
                }
                SessionEvent::Closed => break,
            }
        }
    });

    if let Some(message) = &args.message {
        let seq = session.send_json(&serde_json::json!({ "msg": message }))?;
        info!(seq, "Message queued");
    }

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, closing session");
    session.close().await;

    Ok(())
}
