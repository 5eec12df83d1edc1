//! Render events: everything the presentation layer needs to know.
//!
//! The engine never draws. It emits [`RenderEvent`]s through a [`Renderer`],
//! and a presentation collaborator (the terminal binary, a test recorder)
//! decides what to show.

use chatsync_proto::channel::Channel;
use chatsync_proto::message::Message;
use tokio::sync::mpsc;

use crate::supervisor::ConnectionState;

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// The message.
    pub message: Message,
    /// Whether the local user sent it.
    pub own: bool,
}

/// Category of a notice line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Server greeting.
    Welcome,
    /// System text attached to a history load.
    System,
    /// Another user connected or disconnected.
    Presence,
    /// Outcome of a slash command. `None` when the server gave no flag.
    CommandResult(Option<bool>),
    /// The server rejected something we sent.
    Rejection,
}

/// One change for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// Connection lifecycle moved.
    Connection(ConnectionState),
    /// The roster was replaced or extended.
    Roster(Vec<Channel>),
    /// The active channel changed.
    ActiveChannel(Channel),
    /// History was replaced by a full load.
    HistoryReplaced(Vec<DisplayMessage>),
    /// History was loaded and is empty.
    HistoryEmpty,
    /// History was cleared and nothing is loaded.
    HistoryCleared,
    /// A message was appended to the visible history.
    MessageAppended(DisplayMessage),
    /// A line of text outside the conversation.
    Notice {
        /// What kind of notice.
        kind: NoticeKind,
        /// Text to show.
        text: String,
    },
}

/// Receives render events, in order, from the engine loop.
pub trait Renderer: Send + 'static {
    /// Handle one event. Must not block.
    fn render(&mut self, event: RenderEvent);
}

impl Renderer for mpsc::UnboundedSender<RenderEvent> {
    fn render(&mut self, event: RenderEvent) {
        if self.send(event).is_err() {
            tracing::trace!("render receiver dropped");
        }
    }
}

impl Renderer for Vec<RenderEvent> {
    fn render(&mut self, event: RenderEvent) {
        self.push(event);
    }
}
