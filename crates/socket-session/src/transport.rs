//! Transport abstraction.
//!
//! The session loop drives a `Transport` obtained from a `Connector`; the
//! production implementation sits on `tokio-tungstenite`. Wire framing
//! beyond text/binary frames is the transport's business. The seam exists
//! so the integration tests can substitute a scripted in-memory transport.

use crate::{Payload, SessionResult};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A live bidirectional connection.
#[async_trait]
pub trait Transport: Send {
    /// Write one payload. `Ok` confirms the write was handed to the wire.
    async fn send(&mut self, payload: Payload) -> SessionResult<()>;

    /// Read the next payload. `None` means the peer closed the connection
    /// in an orderly fashion.
    async fn recv(&mut self) -> Option<SessionResult<Payload>>;

    /// Send a keepalive ping.
    async fn ping(&mut self) -> SessionResult<()>;

    /// Close the connection. Best-effort; errors are ignored.
    async fn close(&mut self);
}

/// Establishes transports for a session.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + 'static;

    /// Perform the handshake against the endpoint.
    async fn connect(&self, endpoint: &Url) -> SessionResult<Self::Transport>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, endpoint: &Url) -> SessionResult<WsTransport> {
        let (ws_stream, _) = connect_async(endpoint.as_str()).await?;
        let (write, read) = ws_stream.split();
        Ok(WsTransport { write, read })
    }
}

/// WebSocket transport over a split stream.
pub struct WsTransport {
    write: SplitSink<WsStream, Message>,
    read: SplitStream<WsStream>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, payload: Payload) -> SessionResult<()> {
        let message = match payload {
            Payload::Text(text) => Message::Text(text.into()),
            Payload::Binary(data) => Message::Binary(data.into()),
        };
        self.write.send(message).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<SessionResult<Payload>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Payload::Text(text.as_str().to_string()))),
                Ok(Message::Binary(data)) => return Some(Ok(Payload::Binary(data.to_vec()))),
                Ok(Message::Ping(data)) => {
                    if let Err(e) = self.write.send(Message::Pong(data)).await {
                        return Some(Err(e.into()));
                    }
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Peer closed the connection");
                    return None;
                }
                // Pongs and raw frames carry nothing for the session
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn ping(&mut self) -> SessionResult<()> {
        self.write.send(Message::Ping(Vec::new().into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.write.close().await;
    }
}
