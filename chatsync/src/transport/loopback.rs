//! Loopback transport for testing.
//!
//! [`LoopbackConnector::create`] returns the connector plus a
//! [`LoopbackServer`] handle that plays the server side in-process: it
//! records every frame the client writes, pushes inbound frames, drops the
//! current connection and can refuse new ones.

use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use super::{Connector, EventSink, Link, TransportError};

#[derive(Debug, Default)]
struct Shared {
    /// Reject new connections with `Unreachable`.
    refuse: bool,
    /// Number of `connect` calls, successful or not.
    attempts: usize,
    /// Sink of the most recent accepted connection.
    current: Option<EventSink>,
    /// Whether the current connection has been severed.
    severed: bool,
    /// Every frame written, across all connections, in order.
    written: Vec<String>,
    /// URLs passed to `connect`.
    urls: Vec<Url>,
}

/// In-process [`Connector`] driven by a [`LoopbackServer`].
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    shared: Arc<Mutex<Shared>>,
}

/// Server-side handle for a [`LoopbackConnector`].
#[derive(Debug, Clone)]
pub struct LoopbackServer {
    shared: Arc<Mutex<Shared>>,
}

impl LoopbackConnector {
    /// Create a connected connector/server pair.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use chatsync::transport::loopback::LoopbackConnector;
    ///
    /// let (connector, server) = LoopbackConnector::create();
    /// server.refuse_connections(true);
    /// assert_eq!(server.connect_attempts(), 0);
    /// # drop(connector);
    /// ```
    #[must_use]
    pub fn create() -> (Self, LoopbackServer) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
            },
            LoopbackServer { shared },
        )
    }
}

/// Writable end of a loopback connection.
#[derive(Debug)]
pub struct LoopbackLink {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
}

impl Connector for LoopbackConnector {
    type Link = LoopbackLink;

    async fn connect(&self, url: &Url, events: EventSink) -> Result<LoopbackLink, TransportError> {
        let mut shared = self.shared.lock();
        shared.attempts += 1;
        shared.urls.push(url.clone());
        if shared.refuse {
            return Err(TransportError::Unreachable(url.to_string()));
        }
        let generation = events.generation();
        shared.current = Some(events);
        shared.severed = false;
        drop(shared);
        Ok(LoopbackLink {
            shared: Arc::clone(&self.shared),
            generation,
        })
    }
}

impl LoopbackLink {
    fn is_current(&self, shared: &Shared) -> bool {
        !shared.severed
            && shared
                .current
                .as_ref()
                .is_some_and(|s| s.generation() == self.generation)
    }
}

impl Link for LoopbackLink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let mut shared = self.shared.lock();
        if !self.is_current(&shared) {
            return Err(TransportError::ConnectionClosed);
        }
        shared.written.push(text);
        Ok(())
    }

    async fn close(&mut self) {
        let mut shared = self.shared.lock();
        if self.is_current(&shared) {
            shared.severed = true;
        }
    }
}

impl LoopbackServer {
    /// Make subsequent `connect` calls fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.lock().refuse = refuse;
    }

    /// Number of connection attempts so far.
    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.shared.lock().attempts
    }

    /// URLs the client tried to connect to.
    #[must_use]
    pub fn connect_urls(&self) -> Vec<Url> {
        self.shared.lock().urls.clone()
    }

    /// Every frame the client has written.
    #[must_use]
    pub fn written(&self) -> Vec<String> {
        self.shared.lock().written.clone()
    }

    /// Whether a live connection exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        let shared = self.shared.lock();
        shared.current.is_some() && !shared.severed
    }

    /// Deliver `frame` on the live connection.
    ///
    /// Returns `false` if there is none or the client is gone.
    pub async fn push(&self, frame: impl Into<String>) -> bool {
        let sink = {
            let shared = self.shared.lock();
            if shared.severed {
                return false;
            }
            shared.current.clone()
        };
        match sink {
            Some(sink) => sink.frame(frame.into()).await,
            None => false,
        }
    }

    /// Sever the live connection and report the close to the client.
    pub async fn drop_connection(&self, code: Option<u16>) {
        let sink = {
            let mut shared = self.shared.lock();
            shared.severed = true;
            shared.current.take()
        };
        if let Some(sink) = sink {
            sink.closed(code).await;
        }
    }

    /// Sink of the live connection, if any.
    #[must_use]
    pub fn current_sink(&self) -> Option<EventSink> {
        self.shared.lock().current.clone()
    }
}
