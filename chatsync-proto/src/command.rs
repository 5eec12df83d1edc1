//! Slash-command vocabulary shared by the encoder and the dispatcher.

use std::fmt;

/// A slash command understood by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `/crear <name>`: create a public channel.
    Create,
    /// `/crear_priv <name>`: create a private channel.
    CreatePrivate,
    /// `/unir <name>`: join a channel.
    Join,
    /// `/salir`: go back to the general channel.
    Leave,
    /// `/agregar <email> <channel>`: add a member (admin only).
    AddMember,
    /// `/remover <email> <channel>`: remove a member (admin only).
    RemoveMember,
    /// `/dar_admin <email> <channel>`: grant admin (admin only).
    GrantAdmin,
    /// `/quitar_admin <email> <channel>`: revoke admin (admin only).
    RevokeAdmin,
    /// A command word this client does not know.
    Other(String),
}

/// Every known command, in help-listing order.
pub const KNOWN: [CommandKind; 8] = [
    CommandKind::Create,
    CommandKind::CreatePrivate,
    CommandKind::Join,
    CommandKind::Leave,
    CommandKind::AddMember,
    CommandKind::RemoveMember,
    CommandKind::GrantAdmin,
    CommandKind::RevokeAdmin,
];

impl CommandKind {
    /// Resolve a command word such as `"/crear"`.
    ///
    /// Matching is exact and case-sensitive; the server lowercases on its
    /// side but echoes the word back as typed.
    #[must_use]
    pub fn parse(word: &str) -> Self {
        match word {
            "/crear" => Self::Create,
            "/crear_priv" => Self::CreatePrivate,
            "/unir" => Self::Join,
            "/salir" => Self::Leave,
            "/agregar" => Self::AddMember,
            "/remover" => Self::RemoveMember,
            "/dar_admin" => Self::GrantAdmin,
            "/quitar_admin" => Self::RevokeAdmin,
            other => Self::Other(other.to_string()),
        }
    }

    /// The command word as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "/crear",
            Self::CreatePrivate => "/crear_priv",
            Self::Join => "/unir",
            Self::Leave => "/salir",
            Self::AddMember => "/agregar",
            Self::RemoveMember => "/remover",
            Self::GrantAdmin => "/dar_admin",
            Self::RevokeAdmin => "/quitar_admin",
            Self::Other(word) => word,
        }
    }

    /// Whether the server's reply to this command carries a fresh roster.
    #[must_use]
    pub const fn mutates_roster(&self) -> bool {
        matches!(self, Self::Create | Self::CreatePrivate | Self::Leave)
    }

    /// Usage line and description, for the help listing.
    #[must_use]
    pub const fn help(&self) -> (&'static str, &'static str) {
        match self {
            Self::Create => ("/crear nombre", "Crear canal público"),
            Self::CreatePrivate => ("/crear_priv nombre", "Crear canal privado"),
            Self::Join => ("/unir nombre", "Unirse a un canal"),
            Self::Leave => ("/salir", "Volver al canal general"),
            Self::AddMember => (
                "/agregar correo canal",
                "Agregar usuario a canal (solo admin)",
            ),
            Self::RemoveMember => (
                "/remover correo canal",
                "Remover usuario de canal (solo admin)",
            ),
            Self::GrantAdmin => (
                "/dar_admin correo canal",
                "Dar permisos de admin (solo admin)",
            ),
            Self::RevokeAdmin => (
                "/quitar_admin correo canal",
                "Quitar permisos de admin (solo admin)",
            ),
            Self::Other(_) => ("", ""),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `text` should be sent as a command rather than a chat message.
///
/// A case-sensitive prefix test of the trimmed input against [`KNOWN`].
#[must_use]
pub fn is_command(text: &str) -> bool {
    let trimmed = text.trim();
    KNOWN.iter().any(|k| trimmed.starts_with(k.as_str()))
}
