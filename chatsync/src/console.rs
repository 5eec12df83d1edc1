//! Line-oriented presentation for the terminal binary.
//!
//! Parses the few commands handled locally and turns render events into
//! printable lines. Everything else typed is submitted to the engine as is.

use chatsync_proto::channel::{Channel, Visibility};
use chatsync_proto::message::Message;

use crate::encoder;
use crate::render::{DisplayMessage, NoticeKind, RenderEvent};
use crate::supervisor::ConnectionState;

/// A line the binary handles itself instead of submitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    /// `/ayuda`: print the command table.
    Help,
    /// `/canales`: print the roster with positions.
    ListChannels,
    /// `/ir <n>`: join the n-th roster channel (1-based).
    Join(usize),
    /// `/cerrar`: quit.
    Quit,
}

/// Local commands and their descriptions, for the help listing.
const LOCAL_HELP: [(&str, &str); 4] = [
    ("/ayuda", "Mostrar esta ayuda"),
    ("/canales", "Listar tus canales"),
    ("/ir número", "Abrir el canal de la lista"),
    ("/cerrar", "Salir de chatsync"),
];

impl LocalCommand {
    /// Recognise a local command, or `None` for text meant for the server.
    ///
    /// # Errors
    ///
    /// A usage message when `/ir` lacks a valid position.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(first) = words.next() else {
            return Ok(None);
        };
        let command = match first {
            "/ayuda" => Self::Help,
            "/canales" => Self::ListChannels,
            "/cerrar" => Self::Quit,
            "/ir" => {
                let position = words
                    .next()
                    .and_then(|w| w.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| "uso: /ir número (ver /canales)".to_string())?;
                Self::Join(position)
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// The help listing: server commands first, then local ones.
#[must_use]
pub fn help_lines() -> Vec<String> {
    encoder::help_table()
        .chain(LOCAL_HELP)
        .map(|(usage, description)| format!("  {usage:<28} {description}"))
        .collect()
}

/// The roster with 1-based positions for `/ir`.
#[must_use]
pub fn roster_lines(roster: &[Channel], active: Option<&Channel>) -> Vec<String> {
    if roster.is_empty() {
        return vec!["  (no tienes canales)".to_string()];
    }
    roster
        .iter()
        .enumerate()
        .map(|(i, channel)| {
            let marker = if active.is_some_and(|a| a.id == channel.id) {
                '*'
            } else {
                ' '
            };
            let mut line = format!(
                "{marker} {:>2}. {} ({})",
                i + 1,
                channel.name,
                visibility_label(channel.visibility)
            );
            if let Some(preview) = &channel.last_message {
                line.push_str(&format!(" - {}: {}", preview.author, preview.body));
            }
            line
        })
        .collect()
}

/// Lines to print for one render event.
#[must_use]
pub fn event_lines(event: &RenderEvent) -> Vec<String> {
    match event {
        RenderEvent::Connection(state) => vec![format!("* {}", state_label(*state))],
        RenderEvent::Roster(channels) => {
            let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
            vec![format!("* canales: {}", names.join(", "))]
        }
        RenderEvent::ActiveChannel(channel) => {
            vec![format!("* canal activo: {}", channel.name)]
        }
        RenderEvent::HistoryReplaced(messages) => std::iter::once("--- historial ---".to_string())
            .chain(messages.iter().map(message_line))
            .collect(),
        RenderEvent::HistoryEmpty => vec!["(todavía no hay mensajes en este canal)".to_string()],
        RenderEvent::HistoryCleared => vec!["--- historial cerrado ---".to_string()],
        RenderEvent::MessageAppended(message) => vec![message_line(message)],
        RenderEvent::Notice { kind, text } => vec![format!("[{}] {text}", notice_label(*kind))],
    }
}

fn message_line(shown: &DisplayMessage) -> String {
    let Message {
        author,
        body,
        sent_at,
        ..
    } = &shown.message;
    let time = sent_at.map_or_else(|| "--:--".to_string(), |t| t.format("%H:%M").to_string());
    let who = if shown.own { "tú" } else { author.as_str() };
    format!("[{time}] {who}: {body}")
}

const fn visibility_label(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "público",
        Visibility::Private => "privado",
    }
}

const fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Disconnected => "desconectado, reintentando",
        ConnectionState::Connecting => "conectando",
        ConnectionState::Open => "conectado",
        ConnectionState::Degraded => "sin conexión, reintentos agotados",
        ConnectionState::Stopped => "desconectado",
    }
}

const fn notice_label(kind: NoticeKind) -> &'static str {
    match kind {
        NoticeKind::Welcome => "bienvenida",
        NoticeKind::System => "sistema",
        NoticeKind::Presence => "presencia",
        NoticeKind::CommandResult(Some(false)) => "comando fallido",
        NoticeKind::CommandResult(_) => "comando",
        NoticeKind::Rejection => "error",
    }
}
