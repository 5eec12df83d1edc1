//! Channel wire types.
//!
//! The server describes channels with Spanish field names (`_id`, `nombre`,
//! `publico`, `ultimo`, ...). [`Channel`] converts to and from that shape via
//! an internal wire struct, so the rest of the code works with typed fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, server-assigned channel identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a channel id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who may see and join a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Anyone can join with `/unir`.
    Public,
    /// Members are added by an admin.
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// Last message shown under a channel in the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// Display name of the author.
    pub author: String,
    /// Message body.
    pub body: String,
}

/// A conversation scope the user can join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireChannel", into = "WireChannel")]
pub struct Channel {
    /// Unique id.
    pub id: ChannelId,
    /// Human label, unique within the user's joined set.
    pub name: String,
    /// Public or private.
    pub visibility: Visibility,
    /// Creation time, if the server sent a parseable one.
    pub created_at: Option<DateTime<Utc>>,
    /// Most recent message in the channel.
    pub last_message: Option<Preview>,
    /// Ids of channel admins.
    pub admins: Vec<String>,
    /// Ids of channel members.
    pub members: Vec<String>,
}

impl Channel {
    /// Create a public channel with no preview and no membership data.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ChannelId::new(id),
            name: name.into(),
            visibility: Visibility::Public,
            created_at: None,
            last_message: None,
            admins: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Builder-style setter for the visibility.
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Builder-style setter for the last-message preview.
    #[must_use]
    pub fn with_preview(mut self, author: impl Into<String>, body: impl Into<String>) -> Self {
        self.last_message = Some(Preview {
            author: author.into(),
            body: body.into(),
        });
        self
    }

    /// Whether the given user id is listed as an admin of this channel.
    #[must_use]
    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admins.iter().any(|a| a == user_id)
    }
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireChannel {
    #[serde(rename = "_id")]
    id: ChannelId,
    nombre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publico: Option<bool>,
    #[serde(default, with = "crate::time::lenient_opt")]
    fecha_creacion: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ultimo: Option<WirePreview>,
    #[serde(default)]
    admins: Vec<String>,
    #[serde(default)]
    miembros: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WirePreview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usuario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usuario_nombre: Option<String>,
    #[serde(default)]
    contenido: Option<String>,
}

impl From<WireChannel> for Channel {
    fn from(w: WireChannel) -> Self {
        // A missing `publico` flag comes from channels created before private
        // channels existed; those are all public.
        let visibility = match w.publico {
            Some(false) => Visibility::Private,
            Some(true) | None => Visibility::Public,
        };
        let last_message = w.ultimo.and_then(|p| {
            let body = p.contenido?;
            Some(Preview {
                author: p.usuario.or(p.usuario_nombre).unwrap_or_default(),
                body,
            })
        });
        Self {
            id: w.id,
            name: w.nombre,
            visibility,
            created_at: w.fecha_creacion,
            last_message,
            admins: w.admins,
            members: w.miembros,
        }
    }
}

impl From<Channel> for WireChannel {
    fn from(c: Channel) -> Self {
        Self {
            id: c.id,
            nombre: c.name,
            publico: Some(c.visibility == Visibility::Public),
            fecha_creacion: c.created_at,
            ultimo: c.last_message.map(|p| WirePreview {
                usuario: Some(p.author),
                usuario_nombre: None,
                contenido: Some(p.body),
            }),
            admins: c.admins,
            miembros: c.members,
        }
    }
}
