//! Connection supervisor.
//!
//! Owns the single live connection. Opens it, announces the identity as the
//! first frame, refuses sends while it is not open, and after a close
//! schedules exactly one reconnect. The retry timer is a spawned sleep that
//! posts [`TransportEvent::RetryDue`] into the engine queue; its effect is
//! decided when the engine handles that event, never in the timer task.
//!
//! Connect attempts run the same way: [`Supervisor::open`] spawns the
//! handshake and returns at once, and the attempt reports back with
//! [`TransportEvent::ConnectDone`]. The engine keeps serving callers while
//! the state is `Connecting`.

use std::fmt;
use std::sync::Arc;

use chatsync_proto::codec::{self, FrameError};
use chatsync_proto::envelope::{IdentityAnnouncement, OutboundEnvelope};
use chatsync_proto::identity::Identity;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::ReconnectConfig;
use crate::transport::{Connector, EventSink, Link, TransportError, TransportEvent};

/// Lifecycle of the supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection; a retry may be pending.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected and announced.
    Open,
    /// Retries exhausted; nothing more will be attempted.
    Degraded,
    /// Deliberately shut down.
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Degraded => "degraded",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Errors from [`Supervisor::send`].
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The connection is not open. Nothing was written or queued.
    #[error("not connected")]
    NotConnected,

    /// The envelope could not be serialized.
    #[error(transparent)]
    Encode(#[from] FrameError),

    /// The write failed; the connection is treated as closed.
    #[error("send failed: {0}")]
    Transport(#[from] TransportError),
}

/// A connect attempt running in its own task.
struct Attempt<L> {
    generation: u64,
    task: JoinHandle<Result<L, TransportError>>,
    /// The new connection reported a close before the attempt was finished.
    closed_early: bool,
}

/// Supervises one logical connection across reconnects.
pub struct Supervisor<C: Connector> {
    connector: Arc<C>,
    endpoint: Option<Url>,
    announcement: String,
    policy: ReconnectConfig,
    events: mpsc::Sender<TransportEvent>,
    link: Option<C::Link>,
    connecting: Option<Attempt<C::Link>>,
    state: ConnectionState,
    generation: u64,
    failures: u32,
    retry: Option<JoinHandle<()>>,
}

impl<C: Connector> Supervisor<C> {
    /// Create a supervisor that announces `identity` on every connection.
    ///
    /// Connection events and retry ticks are posted to `events`.
    ///
    /// # Errors
    ///
    /// [`FrameError::Serialization`] if the announcement cannot be encoded.
    pub fn new(
        connector: C,
        identity: &Identity,
        policy: ReconnectConfig,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, FrameError> {
        let announcement = codec::encode_announcement(&IdentityAnnouncement::from(identity))?;
        Ok(Self {
            connector: Arc::new(connector),
            endpoint: None,
            announcement,
            policy,
            events,
            link: None,
            connecting: None,
            state: ConnectionState::Disconnected,
            generation: 0,
            failures: 0,
            retry: None,
        })
    }

    /// Set the websocket endpoint.
    pub fn set_endpoint(&mut self, url: Url) {
        self.endpoint = Some(url);
    }

    /// The websocket endpoint, once known.
    #[must_use]
    pub const fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Generation of the most recent connection attempt.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a retry is scheduled and has not been handled yet.
    #[must_use]
    pub const fn retry_pending(&self) -> bool {
        self.retry.is_some()
    }

    /// Consecutive failed connections since the last successful open.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Start a connect attempt.
    ///
    /// Moves to `Connecting` and spawns the handshake, which connects and
    /// announces the identity before anything else is written. The outcome
    /// is posted as [`TransportEvent::ConnectDone`] and applied by
    /// [`finish_connect`](Self::finish_connect). No-op while already open or
    /// connecting.
    ///
    /// # Errors
    ///
    /// [`TransportError::NoEndpoint`] if no endpoint is set, or
    /// [`TransportError::ConnectionClosed`] after [`stop`](Self::stop).
    pub fn open(&mut self) -> Result<(), TransportError> {
        match self.state {
            ConnectionState::Open | ConnectionState::Connecting => return Ok(()),
            ConnectionState::Stopped => return Err(TransportError::ConnectionClosed),
            ConnectionState::Disconnected | ConnectionState::Degraded => {}
        }
        let Some(url) = self.endpoint.clone() else {
            return Err(TransportError::NoEndpoint);
        };

        self.generation += 1;
        self.state = ConnectionState::Connecting;
        let generation = self.generation;
        tracing::info!(%url, generation, "opening connection");

        let connector = Arc::clone(&self.connector);
        let announcement = self.announcement.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let sink = EventSink::new(generation, events.clone());
            let attempt = match connector.connect(&url, sink).await {
                Ok(mut link) => match link.send_text(announcement).await {
                    Ok(()) => Ok(link),
                    Err(e) => {
                        link.close().await;
                        Err(e)
                    }
                },
                Err(e) => Err(e),
            };
            let _ = events.send(TransportEvent::ConnectDone { generation }).await;
            attempt
        });
        self.connecting = Some(Attempt {
            generation,
            task,
            closed_early: false,
        });
        Ok(())
    }

    /// Apply the outcome of the connect attempt for `generation`.
    ///
    /// A result for an attempt that is no longer pending is ignored. A failed
    /// attempt is handled like a close: one retry is scheduled.
    ///
    /// # Errors
    ///
    /// The [`TransportError`] of the failed attempt, or
    /// [`TransportError::ConnectionClosed`] if the connection closed before
    /// the attempt finished.
    pub async fn finish_connect(&mut self, generation: u64) -> Result<(), TransportError> {
        let Some(attempt) = self.connecting.take_if(|a| a.generation == generation) else {
            tracing::debug!(generation, "ignoring result of a finished connect attempt");
            return Ok(());
        };
        let outcome = match attempt.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(err = %e, generation, "connect task failed");
                Err(TransportError::ConnectionClosed)
            }
        };

        let error = match outcome {
            Ok(mut link) if attempt.closed_early => {
                link.close().await;
                TransportError::ConnectionClosed
            }
            Ok(link) => {
                self.link = Some(link);
                self.state = ConnectionState::Open;
                self.failures = 0;
                tracing::info!(generation, "connection open, identity announced");
                return Ok(());
            }
            Err(e) => e,
        };
        tracing::warn!(err = %error, generation, "connect attempt failed");
        self.state = ConnectionState::Disconnected;
        self.schedule_retry();
        Err(error)
    }

    /// Write one envelope on the open connection.
    ///
    /// # Errors
    ///
    /// [`SendError::NotConnected`] if the state is not `Open`; no I/O is
    /// attempted and nothing is queued. [`SendError::Transport`] if the write
    /// fails, after which the connection is treated as closed.
    pub async fn send(&mut self, envelope: &OutboundEnvelope) -> Result<(), SendError> {
        if self.state != ConnectionState::Open {
            tracing::warn!(state = %self.state, "send while not connected");
            return Err(SendError::NotConnected);
        }
        let Some(link) = self.link.as_mut() else {
            return Err(SendError::NotConnected);
        };
        let text = codec::encode_outbound(envelope)?;
        if let Err(e) = link.send_text(text).await {
            tracing::warn!(err = %e, "write failed, dropping connection");
            if let Some(mut link) = self.link.take() {
                link.close().await;
            }
            self.state = ConnectionState::Disconnected;
            self.schedule_retry();
            return Err(SendError::Transport(e));
        }
        Ok(())
    }

    /// React to a close reported by the transport.
    ///
    /// Closes from an older connection, or a repeated close for the current
    /// one, are ignored. Returns `true` if the state changed.
    pub fn handle_close(&mut self, generation: u64, code: Option<u16>) -> bool {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "ignoring stale close");
            return false;
        }
        if let Some(attempt) = self.connecting.as_mut() {
            tracing::debug!(?code, generation, "connection closed during handshake");
            attempt.closed_early = true;
            return false;
        }
        if self.state != ConnectionState::Open {
            tracing::debug!(state = %self.state, "close already handled");
            return false;
        }
        tracing::warn!(?code, generation, "connection closed");
        self.link = None;
        self.state = ConnectionState::Disconnected;
        self.schedule_retry();
        true
    }

    /// React to the retry timer firing by starting a new attempt.
    ///
    /// No-op unless the supervisor is disconnected.
    ///
    /// # Errors
    ///
    /// As for [`open`](Self::open).
    pub fn on_retry_due(&mut self) -> Result<(), TransportError> {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        if self.state != ConnectionState::Disconnected {
            tracing::debug!(state = %self.state, "retry tick ignored");
            return Ok(());
        }
        self.open()
    }

    /// Shut down: cancel any pending retry or connect attempt and close the
    /// connection.
    pub async fn stop(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        if let Some(attempt) = self.connecting.take() {
            attempt.task.abort();
            // The attempt may have finished before the abort landed.
            if let Ok(Ok(mut link)) = attempt.task.await {
                link.close().await;
            }
        }
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        self.state = ConnectionState::Stopped;
        tracing::info!("supervisor stopped");
    }

    fn schedule_retry(&mut self) {
        if self.state == ConnectionState::Stopped {
            return;
        }
        if self.retry.is_some() {
            tracing::debug!("retry already pending");
            return;
        }
        self.failures = self.failures.saturating_add(1);
        if self.policy.exhausted(self.failures) {
            tracing::error!(failures = self.failures, "reconnect attempts exhausted");
            self.state = ConnectionState::Degraded;
            return;
        }
        let delay = self.policy.delay_for(self.failures);
        tracing::info!(
            attempt = self.failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnect scheduled"
        );
        let events = self.events.clone();
        self.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(TransportEvent::RetryDue).await;
        }));
    }
}

impl<C: Connector> Drop for Supervisor<C> {
    fn drop(&mut self) {
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
        if let Some(attempt) = self.connecting.take() {
            attempt.task.abort();
        }
    }
}
