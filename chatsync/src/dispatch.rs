//! Inbound frame dispatch.
//!
//! Classifies each raw frame and applies it to the [`Session`], emitting
//! render events as it goes. Broken frames and unknown kinds are logged,
//! counted and dropped without touching the session.

use chatsync_proto::codec::{self, FrameError};
use chatsync_proto::command::CommandKind;
use chatsync_proto::envelope::{ChatFrame, CommandFrame, HistoryFrame, Inbound};
use chatsync_proto::message::Message;

use crate::render::{DisplayMessage, NoticeKind, RenderEvent, Renderer};
use crate::session::Session;

/// Counters for frames that were dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames applied to the session.
    pub applied: u64,
    /// Frames that were not JSON or violated their kind's contract.
    pub malformed: u64,
    /// Well-formed frames of a kind this client does not handle.
    pub unrecognized: u64,
}

/// Applies inbound frames to a session, one at a time.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    /// Create a dispatcher with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Decode `raw` and apply it.
    pub fn dispatch<R: Renderer>(&mut self, raw: &str, session: &mut Session, renderer: &mut R) {
        match codec::decode_inbound(raw) {
            Ok(frame) => {
                tracing::trace!(kind = frame.kind(), "dispatching frame");
                self.stats.applied += 1;
                apply(frame, session, renderer);
            }
            Err(FrameError::UnrecognizedKind(kind)) => {
                self.stats.unrecognized += 1;
                tracing::warn!(%kind, "dropping frame of unrecognized kind");
            }
            Err(e) => {
                self.stats.malformed += 1;
                tracing::warn!(err = %e, len = raw.len(), "dropping malformed frame");
            }
        }
    }
}

fn apply<R: Renderer>(frame: Inbound, session: &mut Session, renderer: &mut R) {
    match frame {
        Inbound::Chat(chat) => on_chat(chat, session, renderer),
        Inbound::History(history) => on_history(history, session, renderer),
        Inbound::Command(command) => on_command(command, session, renderer),
        Inbound::Welcome { text } => notice(renderer, NoticeKind::Welcome, text),
        Inbound::Presence { user, transition } => notice(
            renderer,
            NoticeKind::Presence,
            format!("{user} se ha {transition}"),
        ),
        Inbound::Rejection { reason } => {
            tracing::info!(%reason, "server rejected a request");
            notice(renderer, NoticeKind::Rejection, reason);
        }
    }
}

fn on_chat<R: Renderer>(chat: ChatFrame, session: &mut Session, renderer: &mut R) {
    reconcile(chat.roster, session, renderer);

    // Without a `canal` the server is broadcasting to the channel this socket
    // is in, which is the active one.
    if let Some(channel) = &chat.channel {
        if session.active_id() != Some(&channel.id) {
            tracing::debug!(channel = %channel.id, "message for an inactive channel");
            return;
        }
    }
    let own = session.is_own(&chat.message);
    session.append_message(chat.message.clone());
    renderer.render(RenderEvent::MessageAppended(DisplayMessage {
        message: chat.message,
        own,
    }));
}

fn on_history<R: Renderer>(history: HistoryFrame, session: &mut Session, renderer: &mut R) {
    if let Some(channel) = history.channel {
        if session.set_active_channel(channel.clone()) {
            renderer.render(RenderEvent::Roster(session.roster().to_vec()));
        }
        renderer.render(RenderEvent::ActiveChannel(channel));
    }
    if let Some(text) = history.notice {
        notice(renderer, NoticeKind::System, text);
    }

    session.replace_history(history.messages);
    if session.history().is_empty() {
        renderer.render(RenderEvent::HistoryEmpty);
    } else {
        let shown = displayed(session, session.history().messages());
        renderer.render(RenderEvent::HistoryReplaced(shown));
    }
}

fn on_command<R: Renderer>(command: CommandFrame, session: &mut Session, renderer: &mut R) {
    if command.command.mutates_roster() {
        match command.roster {
            Some(list) => reconcile(list, session, renderer),
            None => tracing::debug!(command = %command.command, "command reply without roster"),
        }
    }
    if command.command == CommandKind::Leave {
        session.clear_history();
        renderer.render(RenderEvent::HistoryCleared);
    }
    notice(
        renderer,
        NoticeKind::CommandResult(command.success),
        command.result,
    );
}

fn reconcile<R: Renderer>(
    list: Vec<chatsync_proto::channel::Channel>,
    session: &mut Session,
    renderer: &mut R,
) {
    if session.reconcile_roster(list) {
        renderer.render(RenderEvent::Roster(session.roster().to_vec()));
    }
}

fn displayed<'a>(
    session: &Session,
    messages: impl Iterator<Item = &'a Message>,
) -> Vec<DisplayMessage> {
    messages
        .map(|m| DisplayMessage {
            own: session.is_own(m),
            message: m.clone(),
        })
        .collect()
}

fn notice<R: Renderer>(renderer: &mut R, kind: NoticeKind, text: String) {
    renderer.render(RenderEvent::Notice { kind, text });
}
