//! WebSocket transport for the chat server.
//!
//! Implements [`Connector`] over `tokio-tungstenite`. Each connection is
//! split: the write half lives in the [`WsLink`] owned by the supervisor, the
//! read half is driven by a background task that forwards text frames into
//! the engine queue and reports the close.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use super::{Connector, EventSink, Link, TransportError};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens WebSocket connections.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    /// Create a connector with the given handshake timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

/// An open WebSocket connection.
pub struct WsLink {
    sender: WsSender,
    reader: JoinHandle<()>,
}

impl Connector for WsConnector {
    type Link = WsLink;

    /// Connect to `url` and spawn the reader task.
    ///
    /// # Errors
    ///
    /// - [`TransportError::Timeout`] if the handshake times out.
    /// - [`TransportError::Unreachable`] if the endpoint refuses the connection.
    /// - [`TransportError::WebSocket`] for handshake or TLS failures.
    async fn connect(&self, url: &Url, events: EventSink) -> Result<WsLink, TransportError> {
        let (ws_stream, _response) =
            tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
                .await
                .map_err(|_| {
                    tracing::warn!(url = %url, "websocket connect timed out");
                    TransportError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url = %url, err = %e, "websocket connect failed");
                    map_ws_connect_error(url, e)
                })?;

        let (sender, reader) = ws_stream.split();
        let reader = tokio::spawn(reader_loop(reader, events));
        tracing::info!(url = %url, "websocket connected");

        Ok(WsLink { sender, reader })
    }
}

impl Link for WsLink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| {
                tracing::warn!(err = %e, "websocket send failed");
                TransportError::WebSocket(e.to_string())
            })
    }

    async fn close(&mut self) {
        if let Err(e) = self.sender.close().await {
            tracing::debug!(err = %e, "websocket close handshake failed");
        }
        self.reader.abort();
    }
}

/// Background task: read frames until the socket closes.
///
/// Text frames are forwarded verbatim; the dispatcher decides what they mean.
/// Binary frames are not part of the protocol and are skipped.
async fn reader_loop(mut reader: WsReader, events: EventSink) {
    let mut code = None;
    while let Some(msg) = reader.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if !events.frame(text.to_string()).await {
                    // Engine dropped; nothing left to deliver to.
                    return;
                }
            }
            Ok(Message::Close(frame)) => {
                code = frame.map(|f| u16::from(f.code));
                tracing::info!(?code, "websocket closed by server");
                break;
            }
            Ok(Message::Binary(data)) => {
                tracing::debug!(len = data.len(), "ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(err = %e, "websocket read error");
                break;
            }
        }
    }
    events.closed(code).await;
    tracing::debug!(generation = events.generation(), "websocket reader exiting");
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(url: &Url, err: tokio_tungstenite::tungstenite::Error) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                TransportError::Unreachable(url.to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Http(response) => {
            TransportError::WebSocket(format!("HTTP error: status {}", response.status()))
        }
        other => TransportError::WebSocket(other.to_string()),
    }
}
