//! JSON encode/decode for the `chatsync` wire protocol.
//!
//! Decoding is two-stage: the frame is parsed as a JSON value and its `tipo`
//! discriminant read, then the payload for that kind is deserialized. This
//! keeps "not JSON" / "bad payload" ([`FrameError::is_malformed`]) apart from
//! "valid JSON of a kind we don't know" ([`FrameError::UnrecognizedKind`]).

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::channel::Channel;
use crate::command::CommandKind;
use crate::envelope::{
    ChatFrame, CommandFrame, HistoryFrame, IdentityAnnouncement, Inbound, OutboundEnvelope,
    Presence,
};
use crate::message::{Message, WireMessage};

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame is not JSON at all.
    #[error("frame is not valid JSON: {0}")]
    NotJson(String),

    /// The frame is JSON but has no string `tipo` field.
    #[error("frame has no `tipo` discriminant")]
    MissingKind,

    /// The payload does not match the contract for its kind.
    #[error("invalid `{kind}` payload: {reason}")]
    InvalidPayload {
        /// The `tipo` that was being decoded.
        kind: String,
        /// What was wrong.
        reason: String,
    },

    /// The `tipo` is not one this client handles.
    #[error("unrecognized frame kind `{0}`")]
    UnrecognizedKind(String),

    /// Serialization of an outbound frame failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl FrameError {
    /// Whether this error means the frame itself was broken (as opposed to
    /// well-formed but of an unknown kind).
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::NotJson(_) | Self::MissingKind | Self::InvalidPayload { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Raw payload shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawChat {
    #[serde(flatten)]
    message: WireMessage,
    #[serde(default)]
    canal: Option<Channel>,
    lista: Vec<Channel>,
}

#[derive(Deserialize)]
struct RawHistory {
    #[serde(default)]
    contenido: Option<String>,
    #[serde(default)]
    canal: Option<Channel>,
    mensajes: Vec<Message>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawResult {
    Text(String),
    Detailed {
        #[serde(default)]
        exito: Option<bool>,
        #[serde(default)]
        mensaje: Option<String>,
    },
}

#[derive(Deserialize)]
struct RawCommand {
    comando: String,
    #[serde(default)]
    lista: Option<Vec<Channel>>,
    #[serde(default)]
    resultado: Option<RawResult>,
    #[serde(default)]
    mensaje: Option<String>,
}

#[derive(Deserialize)]
struct RawNotice {
    #[serde(default)]
    resultado: Option<String>,
    #[serde(default)]
    mensaje: Option<String>,
}

#[derive(Deserialize)]
struct RawPresence {
    usuario: String,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes one inbound text frame.
///
/// # Errors
///
/// Returns a malformed [`FrameError`] if the frame is not JSON, lacks a
/// `tipo`, or its payload violates the contract for that kind, and
/// [`FrameError::UnrecognizedKind`] for any other `tipo`.
pub fn decode_inbound(raw: &str) -> Result<Inbound, FrameError> {
    let value: Value = serde_json::from_str(raw).map_err(|e| FrameError::NotJson(e.to_string()))?;
    let kind = value
        .get("tipo")
        .and_then(Value::as_str)
        .ok_or(FrameError::MissingKind)?
        .to_string();

    match kind.as_str() {
        "mensaje" => {
            let raw: RawChat = payload(value, &kind)?;
            let message =
                Message::try_from(raw.message).map_err(|reason| invalid(&kind, reason))?;
            Ok(Inbound::Chat(ChatFrame {
                message,
                channel: raw.canal,
                roster: raw.lista,
            }))
        }
        "historial" => {
            let raw: RawHistory = payload(value, &kind)?;
            Ok(Inbound::History(HistoryFrame {
                notice: raw.contenido,
                channel: raw.canal,
                messages: raw.mensajes,
            }))
        }
        "comando" => {
            let raw: RawCommand = payload(value, &kind)?;
            let (nested, success, plain) = match raw.resultado {
                Some(RawResult::Detailed { exito, mensaje }) => (mensaje, exito, None),
                Some(RawResult::Text(text)) => (None, None, Some(text)),
                None => (None, None, None),
            };
            let result = nested
                .or(raw.mensaje)
                .or(plain)
                .ok_or_else(|| invalid(&kind, "no resultado or mensaje"))?;
            Ok(Inbound::Command(CommandFrame {
                command: CommandKind::parse(&raw.comando),
                roster: raw.lista,
                result,
                success,
            }))
        }
        "bienvenida" => {
            let raw: RawNotice = payload(value, &kind)?;
            let text = raw
                .resultado
                .or(raw.mensaje)
                .ok_or_else(|| invalid(&kind, "no resultado or mensaje"))?;
            Ok(Inbound::Welcome { text })
        }
        "usuario_conectado" | "usuario_desconectado" => {
            let raw: RawPresence = payload(value, &kind)?;
            let transition = if kind == "usuario_conectado" {
                Presence::Connected
            } else {
                Presence::Disconnected
            };
            Ok(Inbound::Presence {
                user: raw.usuario,
                transition,
            })
        }
        "error" => {
            let raw: RawNotice = payload(value, &kind)?;
            let reason = raw
                .mensaje
                .or(raw.resultado)
                .ok_or_else(|| invalid(&kind, "no mensaje"))?;
            Ok(Inbound::Rejection { reason })
        }
        _ => Err(FrameError::UnrecognizedKind(kind)),
    }
}

fn payload<T: DeserializeOwned>(value: Value, kind: &str) -> Result<T, FrameError> {
    serde_json::from_value(value).map_err(|e| invalid(kind, e.to_string()))
}

fn invalid(kind: &str, reason: impl Into<String>) -> FrameError {
    FrameError::InvalidPayload {
        kind: kind.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a user envelope as a JSON text frame.
///
/// # Errors
///
/// Returns [`FrameError::Serialization`] if serialization fails.
pub fn encode_outbound(envelope: &OutboundEnvelope) -> Result<String, FrameError> {
    serde_json::to_string(envelope).map_err(|e| FrameError::Serialization(e.to_string()))
}

/// Encodes the identity announcement as a JSON text frame.
///
/// # Errors
///
/// Returns [`FrameError::Serialization`] if serialization fails.
pub fn encode_announcement(announcement: &IdentityAnnouncement) -> Result<String, FrameError> {
    serde_json::to_string(announcement).map_err(|e| FrameError::Serialization(e.to_string()))
}
