//! Chat message wire type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message. Messages are only ever appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub struct Message {
    /// Sender display name.
    pub author: String,
    /// Sender user id, when the server includes it.
    pub author_id: Option<String>,
    /// Message text.
    pub body: String,
    /// Send time, if present and parseable.
    pub sent_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a message with no sender id and no timestamp.
    pub fn new(author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            author_id: None,
            body: body.into(),
            sent_at: None,
        }
    }

    /// Builder-style setter for the send time.
    #[must_use]
    pub const fn at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = Some(sent_at);
        self
    }

    /// Builder-style setter for the sender id.
    #[must_use]
    pub fn from_user(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }
}

/// Message fields as they appear on the wire.
///
/// Broadcasts name the author `usuario`, history entries name it `nombre`;
/// older clients used `texto` for the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) usuario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) nombre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) usuario_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) contenido: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) texto: Option<String>,
    #[serde(default, with = "crate::time::lenient_opt")]
    pub(crate) fecha: Option<DateTime<Utc>>,
}

impl TryFrom<WireMessage> for Message {
    type Error = String;

    fn try_from(w: WireMessage) -> Result<Self, Self::Error> {
        let author = w
            .usuario
            .or(w.nombre)
            .ok_or_else(|| "message has no author (usuario/nombre)".to_string())?;
        let body = w
            .contenido
            .or(w.texto)
            .ok_or_else(|| "message has no body (contenido/texto)".to_string())?;
        Ok(Self {
            author,
            author_id: w.usuario_id,
            body,
            sent_at: w.fecha,
        })
    }
}

impl From<Message> for WireMessage {
    fn from(m: Message) -> Self {
        Self {
            usuario: Some(m.author),
            nombre: None,
            usuario_id: m.author_id,
            contenido: Some(m.body),
            texto: None,
            fecha: m.sent_at,
        }
    }
}
