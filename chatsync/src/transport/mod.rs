//! Transport layer abstraction for `chatsync`.
//!
//! Defines the [`Connector`] / [`Link`] traits the connection supervisor is
//! generic over, and the closed set of [`TransportEvent`]s every transport
//! feeds into the engine's single dispatch queue. Implementations:
//! - [`ws::WsConnector`]: WebSocket via `tokio-tungstenite`
//! - [`loopback::LoopbackConnector`]: in-process connector for tests

pub mod loopback;
pub mod ws;

use tokio::sync::mpsc;
use url::Url;

/// Events a connection produces, in arrival order.
///
/// `generation` identifies which connection attempt produced the event so
/// that late events from a replaced socket can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame {
        /// Connection generation.
        generation: u64,
        /// Raw frame text.
        text: String,
    },
    /// The connection closed or failed.
    Closed {
        /// Connection generation.
        generation: u64,
        /// WebSocket close code, if the peer sent one.
        code: Option<u16>,
    },
    /// A connect attempt finished, successfully or not.
    ConnectDone {
        /// Generation of the attempt.
        generation: u64,
    },
    /// The scheduled reconnect delay has elapsed.
    RetryDue,
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Connecting took longer than the configured timeout.
    #[error("connect timed out")]
    Timeout,

    /// The endpoint refused or could not be reached.
    #[error("endpoint {0} is unreachable")]
    Unreachable(String),

    /// The WebSocket handshake or a frame operation failed.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// No websocket endpoint is known yet.
    #[error("no websocket endpoint configured")]
    NoEndpoint,

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle a connection uses to push its events into the engine queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::Sender<TransportEvent>,
}

impl EventSink {
    /// Create a sink stamping events with `generation`.
    #[must_use]
    pub const fn new(generation: u64, tx: mpsc::Sender<TransportEvent>) -> Self {
        Self { generation, tx }
    }

    /// Generation this sink stamps on its events.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Forward a received frame. Returns `false` if the engine is gone.
    pub async fn frame(&self, text: String) -> bool {
        self.tx
            .send(TransportEvent::Frame {
                generation: self.generation,
                text,
            })
            .await
            .is_ok()
    }

    /// Report that the connection closed.
    pub async fn closed(&self, code: Option<u16>) {
        let _ = self
            .tx
            .send(TransportEvent::Closed {
                generation: self.generation,
                code,
            })
            .await;
    }
}

/// An open, writable connection.
///
/// Reading is done by a task the [`Connector`] spawns, which reports through
/// the [`EventSink`] it was given.
pub trait Link: Send + 'static {
    /// Write one text frame.
    fn send_text(
        &mut self,
        text: String,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Close the connection. Never fails; errors are logged.
    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send;
}

/// Opens connections to an endpoint.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced.
    type Link: Link;

    /// Open a connection to `url`.
    ///
    /// On success the returned link is writable and every inbound frame
    /// (then a final `Closed`) is delivered through `events` in order.
    fn connect(
        &self,
        url: &Url,
        events: EventSink,
    ) -> impl std::future::Future<Output = Result<Self::Link, TransportError>> + Send;
}
