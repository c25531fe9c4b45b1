//! Transport seam between the connection manager and the network.
//!
//! The manager only needs "open a stream" and "give me the next text frame".
//! Production uses a WebSocket; tests script both halves in memory.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

#[async_trait::async_trait]
pub trait FeedConnector: Send {
    type Stream: FeedStream;

    /// Perform the handshake. The caller bounds this with its own timeout.
    async fn connect(&mut self, endpoint: &str) -> Result<Self::Stream>;
}

#[async_trait::async_trait]
pub trait FeedStream: Send {
    /// Next application text frame. `Ok(None)` means the server closed the
    /// stream; control frames are handled internally.
    async fn next_message(&mut self) -> Result<Option<String>>;
}

// =============================================================================
// WEBSOCKET
// =============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait::async_trait]
impl FeedConnector for WsConnector {
    type Stream = WsFeedStream;

    async fn connect(&mut self, endpoint: &str) -> Result<WsFeedStream> {
        debug!(url = %endpoint, "connecting");
        let (ws, response) = connect_async(endpoint)
            .await
            .with_context(|| format!("websocket handshake with {} failed", endpoint))?;
        info!(status = %response.status(), "websocket_connected");
        Ok(WsFeedStream { ws })
    }
}

pub struct WsFeedStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl FeedStream for WsFeedStream {
    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => debug!("ignoring non-utf8 binary frame"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    self.ws
                        .send(Message::Pong(payload))
                        .await
                        .context("failed to answer ping")?;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "server_close");
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("websocket read failed"),
                None => return Ok(None),
            }
        }
    }
}
