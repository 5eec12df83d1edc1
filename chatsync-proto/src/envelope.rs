//! Inbound and outbound envelope types.
//!
//! Inbound frames are a closed tagged union keyed by the `tipo` field; every
//! variant has explicit required and optional fields, and the server's
//! field-name fallbacks are resolved once in [`crate::codec`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::command::CommandKind;
use crate::identity::Identity;
use crate::message::Message;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A chat message broadcast to the channel the socket is in (`tipo: "mensaje"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFrame {
    /// The message itself.
    pub message: Message,
    /// Channel the message was posted to, when the server names it.
    pub channel: Option<Channel>,
    /// The sender's view of the roster, pushed with every message.
    pub roster: Vec<Channel>,
}

/// Full history for a channel, usually the reply to `/unir` (`tipo: "historial"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFrame {
    /// System notice such as "you joined channel X".
    pub notice: Option<String>,
    /// Channel that became active.
    pub channel: Option<Channel>,
    /// Messages oldest first. May be empty.
    pub messages: Vec<Message>,
}

/// Reply to a slash command (`tipo: "comando"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// Which command this replies to.
    pub command: CommandKind,
    /// Refreshed roster, sent for channel-mutating commands.
    pub roster: Option<Vec<Channel>>,
    /// Human-readable outcome.
    pub result: String,
    /// Explicit success flag, when the server provides one.
    pub success: Option<bool>,
}

/// Direction of a presence change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Presence {
    /// `usuario_conectado`
    Connected,
    /// `usuario_desconectado`
    Disconnected,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "conectado"),
            Self::Disconnected => write!(f, "desconectado"),
        }
    }
}

/// Every inbound frame kind this client understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `mensaje`
    Chat(ChatFrame),
    /// `historial`
    History(HistoryFrame),
    /// `comando`
    Command(CommandFrame),
    /// `bienvenida`
    Welcome {
        /// Greeting text.
        text: String,
    },
    /// `usuario_conectado` / `usuario_desconectado`
    Presence {
        /// Display name of the user.
        user: String,
        /// Which way they went.
        transition: Presence,
    },
    /// `error`: the server rejected something we sent.
    Rejection {
        /// Server-provided reason.
        reason: String,
    },
}

impl Inbound {
    /// The wire discriminant this variant was decoded from.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Chat(_) => "mensaje",
            Self::History(_) => "historial",
            Self::Command(_) => "comando",
            Self::Welcome { .. } => "bienvenida",
            Self::Presence {
                transition: Presence::Connected,
                ..
            } => "usuario_conectado",
            Self::Presence {
                transition: Presence::Disconnected,
                ..
            } => "usuario_desconectado",
            Self::Rejection { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Kind of a user-originated outbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboundKind {
    /// Slash command.
    #[serde(rename = "comando")]
    Command,
    /// Plain chat message to the active channel.
    #[serde(rename = "mensaje")]
    Message,
}

/// Envelope produced from user input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// Command or message.
    #[serde(rename = "tipo")]
    pub kind: OutboundKind,
    /// Sender id.
    #[serde(rename = "usuario_id")]
    pub user_id: String,
    /// Sender federated id, omitted when absent.
    #[serde(
        rename = "google_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub federated_id: Option<String>,
    /// Text exactly as typed.
    #[serde(rename = "contenido")]
    pub body: String,
    /// Client send time.
    #[serde(rename = "fecha", with = "crate::time::iso_millis")]
    pub sent_at: DateTime<Utc>,
}

impl OutboundEnvelope {
    /// Build an envelope for `identity`.
    pub fn new(
        kind: OutboundKind,
        identity: &Identity,
        body: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            user_id: identity.id.clone(),
            federated_id: identity.federated_id.clone(),
            body: body.into(),
            sent_at,
        }
    }
}

/// First frame on every new connection; tells the server who we are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAnnouncement {
    /// User id.
    #[serde(rename = "usuario_id")]
    pub user_id: String,
    /// Federated id, sent as `null` when absent.
    #[serde(rename = "google_id")]
    pub federated_id: Option<String>,
}

impl From<&Identity> for IdentityAnnouncement {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.id.clone(),
            federated_id: identity.federated_id.clone(),
        }
    }
}
