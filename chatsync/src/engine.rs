//! The engine: one task that owns the supervisor and the session.
//!
//! Transport events and caller commands arrive on two queues. The loop
//! drains them one at a time, transport first, so frames are applied in
//! arrival order and no lock ever guards engine state. Connect attempts run
//! in their own task and report back on the transport queue, so callers are
//! answered while the state is `Connecting`. Callers talk to the
//! loop through a cloneable [`EngineHandle`]; dropping every handle stops the
//! engine as if [`EngineHandle::stop`] had been called.

use std::ops::ControlFlow;

use chatsync_proto::channel::ChannelId;
use chatsync_proto::codec::FrameError;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::api::ConfigLookup;
use crate::config::{ClientConfig, DEFAULT_CHANNEL_CAPACITY, ReconnectConfig};
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::encoder::{self, EncodeError};
use crate::endpoint;
use crate::render::{NoticeKind, RenderEvent, Renderer};
use crate::session::Session;
use crate::supervisor::{ConnectionState, SendError, Supervisor};
use crate::transport::{Connector, TransportEvent};

/// Settings the engine needs beyond the session itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// HTTP origin the websocket URL is derived from.
    pub origin: Url,
    /// Explicit websocket URL; skips the configuration lookup.
    pub ws_url: Option<Url>,
    /// Reconnect policy.
    pub reconnect: ReconnectConfig,
    /// Capacity of the transport and command queues.
    pub channel_capacity: usize,
}

impl EngineConfig {
    /// Defaults for everything but the origin.
    #[must_use]
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            ws_url: None,
            reconnect: ReconnectConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl From<&ClientConfig> for EngineConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            origin: config.base_url.clone(),
            ws_url: config.ws_url.clone(),
            reconnect: config.reconnect.clone(),
            channel_capacity: config.channel_capacity,
        }
    }
}

/// Why a submit or join was refused.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The input was empty.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The envelope could not be sent.
    #[error(transparent)]
    Send(#[from] SendError),

    /// The channel to join is not in the roster.
    #[error("channel {0} is not in the roster")]
    UnknownChannel(ChannelId),

    /// The engine is no longer running.
    #[error("engine has stopped")]
    Stopped,
}

impl SubmitError {
    /// Whether the refusal was because the connection is not open.
    #[must_use]
    pub const fn is_not_connected(&self) -> bool {
        matches!(self, Self::Send(SendError::NotConnected))
    }
}

/// Errors starting or querying the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The identity announcement could not be encoded.
    #[error("cannot encode identity announcement: {0}")]
    Announcement(#[from] FrameError),

    /// The engine is no longer running.
    #[error("engine has stopped")]
    Stopped,
}

/// Point-in-time copy of engine state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Connection lifecycle state.
    pub connection: ConnectionState,
    /// Session state.
    pub session: Session,
    /// Dispatch counters.
    pub stats: DispatchStats,
}

#[derive(Debug)]
enum Command {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    Join {
        channel: ChannelId,
        reply: oneshot::Sender<Result<(), SubmitError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Stop {
        reply: oneshot::Sender<Session>,
    },
}

/// Cloneable handle to a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Encode `text` and send it on the connection.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Encode`] for blank input, [`SubmitError::Send`] with
    /// [`SendError::NotConnected`] while the connection is not open (nothing
    /// is queued), [`SubmitError::Stopped`] if the engine is gone.
    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SubmitError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                text: text.into(),
                reply,
            })
            .await
            .map_err(|_| SubmitError::Stopped)?;
        rx.await.map_err(|_| SubmitError::Stopped)?
    }

    /// Make a roster channel active and ask the server to join it.
    ///
    /// # Errors
    ///
    /// [`SubmitError::UnknownChannel`] if `channel` is not in the roster,
    /// otherwise as for [`submit`](Self::submit).
    pub async fn join(&self, channel: ChannelId) -> Result<(), SubmitError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Join { channel, reply })
            .await
            .map_err(|_| SubmitError::Stopped)?;
        rx.await.map_err(|_| SubmitError::Stopped)?
    }

    /// Copy of the current engine state.
    ///
    /// # Errors
    ///
    /// [`EngineError::Stopped`] if the engine is gone.
    pub async fn snapshot(&self) -> Result<Snapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Stop the engine: cancel any pending reconnect, close the connection
    /// and return the final session.
    ///
    /// # Errors
    ///
    /// [`EngineError::Stopped`] if the engine was already stopped.
    pub async fn stop(&self) -> Result<Session, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Stop { reply })
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)
    }
}

/// Engine state, owned by the loop task.
pub struct Engine<C: Connector, L: ConfigLookup, R: Renderer> {
    supervisor: Supervisor<C>,
    lookup: L,
    origin: Url,
    session: Session,
    dispatcher: Dispatcher,
    renderer: R,
    shown_state: Option<ConnectionState>,
}

impl<C: Connector, L: ConfigLookup, R: Renderer> Engine<C, L, R> {
    /// Spawn the engine loop and return a handle to it.
    ///
    /// The loop resolves the websocket endpoint if none is configured, then
    /// opens the connection.
    ///
    /// # Errors
    ///
    /// [`EngineError::Announcement`] if the identity cannot be encoded.
    pub fn start(
        config: EngineConfig,
        session: Session,
        connector: C,
        lookup: L,
        renderer: R,
    ) -> Result<EngineHandle, EngineError> {
        let capacity = config.channel_capacity.max(1);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (commands_tx, commands_rx) = mpsc::channel(capacity);

        let mut supervisor =
            Supervisor::new(connector, session.identity(), config.reconnect, events_tx)?;
        if let Some(url) = config.ws_url {
            supervisor.set_endpoint(url);
        }

        let engine = Self {
            supervisor,
            lookup,
            origin: config.origin,
            session,
            dispatcher: Dispatcher::new(),
            renderer,
            shown_state: None,
        };
        tokio::spawn(engine.run(events_rx, commands_rx));

        Ok(EngineHandle {
            commands: commands_tx,
        })
    }

    async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) {
        tracing::info!(user_id = %self.session.identity().id, "engine started");
        if !self.session.roster().is_empty() {
            self.renderer
                .render(RenderEvent::Roster(self.session.roster().to_vec()));
        }
        self.connect().await;

        loop {
            tokio::select! {
                biased;
                Some(event) = events.recv() => self.on_transport(event).await,
                command = commands.recv() => match command {
                    Some(command) => {
                        if let ControlFlow::Break(reply) = self.on_command(command).await {
                            self.shutdown().await;
                            let _ = reply.send(self.session);
                            return;
                        }
                    }
                    None => {
                        tracing::debug!("all engine handles dropped");
                        self.shutdown().await;
                        return;
                    }
                },
            }
        }
    }

    async fn connect(&mut self) {
        if self.supervisor.endpoint().is_none() {
            match endpoint::resolve(&self.lookup, &self.origin).await {
                Ok(url) => self.supervisor.set_endpoint(url),
                Err(e) => {
                    tracing::error!(err = %e, origin = %self.origin, "cannot derive websocket endpoint");
                    self.renderer.render(RenderEvent::Notice {
                        kind: NoticeKind::Rejection,
                        text: e.to_string(),
                    });
                    return;
                }
            }
        }
        if let Err(e) = self.supervisor.open() {
            tracing::debug!(err = %e, "initial connect not started");
        }
        self.publish_state();
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame { generation, text } => {
                if generation != self.supervisor.generation() {
                    tracing::debug!(generation, "dropping frame from a replaced connection");
                    return;
                }
                self.dispatcher
                    .dispatch(&text, &mut self.session, &mut self.renderer);
            }
            TransportEvent::Closed { generation, code } => {
                self.supervisor.handle_close(generation, code);
                self.publish_state();
            }
            TransportEvent::ConnectDone { generation } => {
                if let Err(e) = self.supervisor.finish_connect(generation).await {
                    tracing::debug!(err = %e, "connect attempt failed");
                }
                self.publish_state();
            }
            TransportEvent::RetryDue => {
                if let Err(e) = self.supervisor.on_retry_due() {
                    tracing::debug!(err = %e, "reconnect not started");
                }
                self.publish_state();
            }
        }
    }

    /// Serve one caller command. `Stop` breaks the loop with its reply.
    async fn on_command(&mut self, command: Command) -> ControlFlow<oneshot::Sender<Session>> {
        match command {
            Command::Submit { text, reply } => {
                let result = self.submit(&text).await;
                let _ = reply.send(result);
            }
            Command::Join { channel, reply } => {
                let result = self.join(channel).await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(Snapshot {
                    connection: self.supervisor.state(),
                    session: self.session.clone(),
                    stats: self.dispatcher.stats(),
                });
            }
            Command::Stop { reply } => return ControlFlow::Break(reply),
        }
        ControlFlow::Continue(())
    }

    async fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        let envelope = encoder::encode(text, self.session.identity(), Utc::now())?;
        let result = self.supervisor.send(&envelope).await;
        self.publish_state();
        result.map_err(SubmitError::from)
    }

    async fn join(&mut self, id: ChannelId) -> Result<(), SubmitError> {
        let Some(channel) = self.session.channel(&id).cloned() else {
            return Err(SubmitError::UnknownChannel(id));
        };
        if self.supervisor.state() != ConnectionState::Open {
            return Err(SendError::NotConnected.into());
        }
        self.session.set_active_channel(channel.clone());
        self.renderer
            .render(RenderEvent::ActiveChannel(channel.clone()));
        self.submit(&encoder::join_command(&channel)).await
    }

    async fn shutdown(&mut self) {
        self.supervisor.stop().await;
        self.publish_state();
        tracing::info!(stats = ?self.dispatcher.stats(), "engine stopped");
    }

    fn publish_state(&mut self) {
        let state = self.supervisor.state();
        if self.shown_state != Some(state) {
            self.shown_state = Some(state);
            self.renderer.render(RenderEvent::Connection(state));
        }
    }
}
